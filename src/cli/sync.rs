use std::path::Path;

use colored::Colorize;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::sync::sync_file;

use super::open_db;

pub fn run(file: &str) -> Result<()> {
    let (_, mut db) = open_db()?;
    let result = sync_file(&mut db, Path::new(file), &CancelToken::new())?;

    if result.repeat {
        println!("{}", "This file was synced before; records were refreshed.".yellow());
    }
    println!("Accounts:           {}", result.accounts);
    println!("Invoices:           {}", result.invoices);
    println!("Bank transactions:  {}", result.bank_transactions);
    println!("Donations:          {}", result.donations);
    Ok(())
}
