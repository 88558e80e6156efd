use comfy_table::{Cell, Table};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::fmt::money;
use crate::reconciler::{list_donations, DonationListArgs};

use super::{open_db, showing, DonationListOpts};

pub fn list(opts: &DonationListOpts) -> Result<()> {
    let (settings, db) = open_db()?;
    let (date_from, date_to) = opts.range.resolve()?;
    let args = DonationListArgs {
        date_from,
        date_to,
        status: opts.linkage,
        payout_reference: opts.reference.clone(),
        text_search: opts.search.pattern()?,
        page: opts.page.page(&settings),
    };

    let rows = match list_donations(&db, &args, &CancelToken::new()) {
        Err(e) if e.is_no_rows() => {
            println!("No donations found.");
            return Ok(());
        }
        other => other?,
    };

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Close Date", "Amount", "DFK"]);
    for d in &rows {
        table.add_row(vec![
            Cell::new(&d.id),
            Cell::new(d.name.as_deref().unwrap_or("")),
            Cell::new(&d.close_date),
            Cell::new(money(d.amount)),
            Cell::new(d.dfk.as_deref().unwrap_or("")),
        ]);
    }
    println!("{table}");
    let total = rows.first().map(|d| d.row_count).unwrap_or(0);
    println!("{}", showing(args.page.offset, rows.len(), total));
    Ok(())
}
