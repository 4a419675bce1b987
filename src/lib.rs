pub mod abundance;
pub mod cli_main;
pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod tools;
pub mod visualize;

pub use error::{PipelineError, Result};
