//! Run configuration for the analytics pipeline

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::AnalyticsError;

/// Default cutoff: activity recorded after this instant is ignored.
pub const DEFAULT_REFERENCE_DATE: &str = "2022-12-31";

/// Settings passed explicitly into [`crate::pipeline::run_pipeline`].
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyticsConfig {
    /// Inclusive upper bound on a record's activity date.
    pub reference_date: NaiveDateTime,
}

impl AnalyticsConfig {
    /// Build a config whose cutoff is midnight at the start of `date`.
    pub fn with_reference_date(date: NaiveDate) -> Self {
        Self {
            reference_date: date.and_time(chrono::NaiveTime::MIN),
        }
    }

    /// Parse a `YYYY-MM-DD` cutoff.
    pub fn from_reference_str(value: &str) -> Result<Self, AnalyticsError> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(Self::with_reference_date)
            .map_err(|_| AnalyticsError::InvalidReferenceDate(value.to_string()))
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self::with_reference_date(
            NaiveDate::from_ymd_opt(2022, 12, 31).unwrap_or(NaiveDate::MIN),
        )
    }
}
