use std::sync::Arc;

use anyhow::Result;
use comfy_table::Cell;

use super::ui;
use crate::store::CacheStore;

pub async fn run(store: Arc<dyn CacheStore>) -> Result<()> {
    let funds = store.known_funds().await?;

    if funds.is_empty() {
        println!("No funds cached yet. Run `holdings <FUND>` to fetch one.");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Cached funds")]);
    for fund in &funds {
        table.add_row(vec![Cell::new(fund)]);
    }
    println!("{table}");
    println!("{} funds", funds.len());
    Ok(())
}
