//! Terminal commands and their table rendering.

pub mod compare;
pub mod funds;
pub mod holdings;
pub mod refresh;
pub mod setup;
pub mod ui;
