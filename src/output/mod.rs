//! Report formatting.

pub mod json;
pub mod terminal;

pub use json::{to_json, to_json_pretty};
pub use terminal::{format_percentile_line, format_run_report, format_summary};
