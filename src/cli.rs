//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::config::{AnalyticsConfig, DEFAULT_REFERENCE_DATE};

/// Cohort retention, churn and credit-usage analytics over transaction exports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the purchases CSV export
    #[arg(short, long, default_value = "purchases.csv")]
    pub purchases: String,

    /// Path to the refunds CSV export
    #[arg(short, long, default_value = "refunds.csv")]
    pub refunds: String,

    /// Reference date (YYYY-MM-DD); activity after it is ignored
    #[arg(long, default_value = DEFAULT_REFERENCE_DATE)]
    pub reference_date: String,

    /// Directory that receives the output CSV tables
    #[arg(short, long, default_value = "cohort_tables")]
    pub output_dir: String,

    /// Also write the full report as JSON to this path
    #[arg(long)]
    pub json: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the pipeline configuration from the parsed flags
    pub fn analytics_config(&self) -> crate::Result<AnalyticsConfig> {
        Ok(AnalyticsConfig::from_reference_str(&self.reference_date)?)
    }

    /// Default log filter when `COHORTLENS_LOG` is not set
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
