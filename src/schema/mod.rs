//! Schema module - Configuration and report types for guided metamorphic search.

mod config;
mod report;

pub use config::*;
pub use report::*;
