use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;

use super::ui;
use crate::core::analysis::{self, SimilarityMeasure};
use crate::core::holdings::today;
use crate::query::HoldingsQuery;
use crate::store::CacheStore;

pub async fn run(
    store: Arc<dyn CacheStore>,
    funds: &[String],
    date: Option<NaiveDate>,
) -> Result<()> {
    let query = HoldingsQuery::new(store);
    let batch = query.holdings_for_tickers(funds, date).await?;
    let date = date.unwrap_or_else(today);

    if !batch.unavailable.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("Unavailable: {}", batch.unavailable.join(", ")),
                ui::StyleType::Error
            )
        );
    }

    if batch.available.len() < 2 {
        println!("Need holdings for at least two funds to compare.");
        return Ok(());
    }

    let scores: Vec<_> = SimilarityMeasure::ALL
        .iter()
        .map(|measure| analysis::pairwise(&batch.available, *measure))
        .collect();

    println!(
        "{} {}",
        ui::style_text("Holdings similarity", ui::StyleType::Title),
        ui::style_text(&format!("as of {date}"), ui::StyleType::Subtle)
    );

    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Fund A"), ui::header_cell("Fund B")];
    header.extend(
        SimilarityMeasure::ALL
            .iter()
            .map(|measure| ui::header_cell(&measure.to_string())),
    );
    table.set_header(header);

    for pair in scores[0].keys() {
        let mut row = vec![Cell::new(&pair.0), Cell::new(&pair.1)];
        for measure_scores in &scores {
            row.push(ui::score_cell(measure_scores[pair]));
        }
        table.add_row(row);
    }
    println!("{table}");
    Ok(())
}
