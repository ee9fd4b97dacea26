//! CohortLens: customer cohort retention, churn and credit-usage analytics
//!
//! Raw purchase and refund rows are normalized, collapsed into customer
//! profiles and placed into signup-year cohorts. From there the library
//! derives retention/churn matrices, yearly purchase and refund totals, and
//! average spend per active customer split by credit usage.

pub mod cli;
pub mod cohort;
pub mod config;
pub mod customer;
pub mod data;
pub mod error;
pub mod flow;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod segment;

// Re-export public items for easier access
pub use cli::Args;
pub use cohort::{CohortKey, CohortMatrix, RetentionTable};
pub use config::AnalyticsConfig;
pub use customer::{CustomerProfile, ProfileTable};
pub use data::{load_snapshot, load_transactions, RawTransaction};
pub use error::AnalyticsError;
pub use flow::YearlyFlows;
pub use pipeline::{analyze_snapshot, run_pipeline, AnalyticsReport};
pub use report::{format_summary, print_summary, write_json, write_tables};
pub use segment::CreditSegment;

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
