use clap::Parser;
use tracing_subscriber::EnvFilter;

use dfk_recon::cli::records::{self, Kind};
use dfk_recon::cli::{self, Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            data_dir,
            account_codes,
        } => cli::init::run(data_dir, account_codes),
        Commands::Sync { file } => cli::sync::run(&file),
        Commands::Invoices(opts) => records::list(Kind::Invoices, &opts),
        Commands::BankTransactions(opts) => records::list(Kind::BankTransactions, &opts),
        Commands::Invoice { id, range } => records::detail(Kind::Invoices, &id, &range),
        Commands::BankTransaction { id, range } => records::detail(Kind::BankTransactions, &id, &range),
        Commands::Donations(opts) => cli::donations::list(&opts),
        Commands::Accounts { search, page } => cli::accounts::list(&search, &page),
        Commands::Export { kind, output, filter } => cli::export::run(kind, &output, &filter),
        Commands::Backup { output } => cli::backup::run(output),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
