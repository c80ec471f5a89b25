use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;

use super::ui;
use crate::core::HoldingRecord;
use crate::store::CacheStore;

/// Renders one fund's snapshot as a table, heaviest holdings first.
pub fn display_holdings_table(rows: &[HoldingRecord]) -> String {
    let mut sorted: Vec<&HoldingRecord> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.holding.cmp(&b.holding))
    });

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Holding"), ui::header_cell("Weight")]);
    for row in &sorted {
        table.add_row(vec![Cell::new(&row.holding), ui::weight_cell(row.weight)]);
    }
    table.to_string()
}

pub async fn run(store: Arc<dyn CacheStore>, fund: &str, date: Option<NaiveDate>) -> Result<()> {
    let rows = store.holdings(fund, date).await?;

    let Some(first) = rows.first() else {
        println!("No holdings for {fund}");
        return Ok(());
    };

    println!(
        "{} {}",
        ui::style_text(&first.fund, ui::StyleType::Title),
        ui::style_text(&format!("as of {}", first.date), ui::StyleType::Subtle)
    );
    println!("{}", display_holdings_table(&rows));

    let total: f64 = rows.iter().map(|r| r.weight).sum();
    println!(
        "{} holdings, total weight {}",
        rows.len(),
        ui::style_text(&format!("{:.2}%", total * 100.0), ui::StyleType::TotalValue)
    );
    Ok(())
}
