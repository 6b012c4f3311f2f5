//! JSON serialization for benchmark results.

use crate::result::BenchmarkResult;

/// Serialize a BenchmarkResult to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for BenchmarkResult).
pub fn to_json(result: &BenchmarkResult) -> Result<String, serde_json::Error> {
    serde_json::to_string(result)
}

/// Serialize a BenchmarkResult to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for BenchmarkResult).
pub fn to_json_pretty(result: &BenchmarkResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}
