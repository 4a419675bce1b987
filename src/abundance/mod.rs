//! Abundance aggregation - long-form table, read-count threshold and top-N selection

pub mod filter;
pub mod table;

pub use filter::{apply_threshold, select_top_n, ScoreMode, TaxonScore, TopNSelection};
pub use table::{AbundanceRow, AbundanceTable};
