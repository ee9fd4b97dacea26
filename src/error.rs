//! Fatal error types for the analytics pipeline.
//!
//! Per-row problems (unparseable dates, activity before signup) are never
//! errors: those rows are dropped and counted. Only structural problems that
//! make the whole input unusable end up here.

use thiserror::Error;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The input file lacks a column every row needs.
    #[error("input '{source_file}' is missing required column '{column}'")]
    MissingColumn { column: String, source_file: String },
    /// The configured cutoff could not be parsed.
    #[error("invalid reference date '{0}': expected YYYY-MM-DD")]
    InvalidReferenceDate(String),
}
