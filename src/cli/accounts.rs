use comfy_table::{Cell, Table};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::reconciler::{list_accounts, AccountListArgs};

use super::{open_db, showing, PageOpts, SearchOpts};

pub fn list(search: &SearchOpts, page: &PageOpts) -> Result<()> {
    let (settings, db) = open_db()?;
    let args = AccountListArgs {
        text_search: search.pattern()?,
        page: page.page(&settings),
    };
    let rows = match list_accounts(&db, &args, &CancelToken::new()) {
        Err(e) if e.is_no_rows() => {
            println!("No accounts found.");
            return Ok(());
        }
        other => other?,
    };

    let code_pattern = regex::Regex::new(&settings.account_codes).ok();
    let mut table = Table::new();
    table.set_header(vec!["Code", "Name", "Type", "Status", "Donation"]);
    for a in &rows {
        let is_donation = match (&code_pattern, &a.code) {
            (Some(re), Some(code)) => re.is_match(code),
            _ => false,
        };
        table.add_row(vec![
            Cell::new(a.code.as_deref().unwrap_or("")),
            Cell::new(&a.name),
            Cell::new(a.account_type.as_deref().unwrap_or("")),
            Cell::new(a.status.as_deref().unwrap_or("")),
            Cell::new(if is_donation { "yes" } else { "" }),
        ]);
    }
    println!("Accounts\n{table}");
    let total = rows.first().map(|a| a.row_count).unwrap_or(0);
    println!("{}", showing(args.page.offset, rows.len(), total));
    Ok(())
}
