//! Pipeline module - per-sample tool chain and the batch driver

pub mod batch;
pub mod sample;
pub mod summary;

pub use batch::{run, run_with};
pub use summary::RunSummary;
