use std::sync::Arc;

use anyhow::Result;
use comfy_table::Cell;
use futures::{StreamExt, stream};
use tracing::debug;

use super::ui;
use crate::store::CacheStore;

/// Ensures every known fund has today's snapshot cached, fetching the
/// missing ones concurrently.
pub async fn run(store: Arc<dyn CacheStore>) -> Result<()> {
    let funds: Vec<String> = store.known_funds().await?.into_iter().collect();

    if funds.is_empty() {
        println!("No funds cached yet, nothing to refresh.");
        return Ok(());
    }

    let pb = ui::new_progress_bar(funds.len() as u64, true);
    pb.set_message("Refreshing holdings...");

    let store = store.as_ref();
    let results: Vec<(String, Result<usize, String>)> =
        stream::iter(funds.iter().map(|fund| {
            let pb = pb.clone();
            async move {
                let outcome = store
                    .holdings(fund, None)
                    .await
                    .map(|rows| rows.len())
                    .map_err(|e| e.to_string());
                pb.inc(1);
                (fund.clone(), outcome)
            }
        }))
        .buffer_unordered(store.batch_workers().max(1))
        .collect()
        .await;
    pb.finish_and_clear();

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Fund"),
        ui::header_cell("Status"),
        ui::header_cell("Holdings"),
    ]);

    let mut refreshed = 0usize;
    let mut sorted = results;
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    for (fund, outcome) in sorted {
        match outcome {
            Ok(count) => {
                refreshed += 1;
                table.add_row(vec![
                    Cell::new(&fund),
                    ui::status_cell(true, "fresh"),
                    Cell::new(count.to_string()),
                ]);
            }
            Err(reason) => {
                debug!("Refresh failed for {}: {}", fund, reason);
                table.add_row(vec![
                    Cell::new(&fund),
                    ui::status_cell(false, "unavailable"),
                    Cell::new("-"),
                ]);
            }
        }
    }
    println!("{table}");
    println!(
        "Refreshed {} of {} funds",
        ui::style_text(&refreshed.to_string(), ui::StyleType::TotalValue),
        funds.len()
    );
    Ok(())
}
