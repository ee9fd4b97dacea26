//! End-to-end analytics pipeline
//!
//! Every stage is a pure transformation over one in-memory snapshot, so the
//! same rows and config always yield an equal [`AnalyticsReport`].

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::cohort::{index_cohorts, RetentionTable};
use crate::config::AnalyticsConfig;
use crate::customer::{
    aggregate_customers, credit_rate_by_signup_year, credit_usage_distribution,
    spend_by_credit_usage, CreditUsageDistribution, ProfileTable, SpendByCreditUsage,
};
use crate::data::RawTransaction;
use crate::flow::{yearly_flows, YearlyFlows};
use crate::normalize::{normalize_records, DropCounts};
use crate::segment::{segment_by_credit, CreditSegment};

/// Row accounting for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub input_rows: usize,
    pub dropped: DropCounts,
    /// Rows with no customer id, counted only in the yearly flows
    pub unattributed_rows: usize,
    /// Rows kept by normalization but dropped from the cohort matrices
    pub dropped_pre_signup: usize,
    pub cohort_rows: usize,
}

/// Read-only snapshot of every table the pipeline produces.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub profiles: ProfileTable,
    pub retention: RetentionTable,
    pub yearly_flows: YearlyFlows,
    pub credit_usage: CreditUsageDistribution,
    /// Fraction of customers per signup year who used credit
    pub credit_rate_by_signup_year: BTreeMap<i32, f64>,
    pub spend_by_credit_usage: SpendByCreditUsage,
    pub credit_users: CreditSegment,
    pub non_credit_users: CreditSegment,
    pub diagnostics: Diagnostics,
}

/// Concatenate purchase and refund rows and analyze them together.
///
/// # Arguments
/// * `config` - Run settings, including the reference cutoff
/// * `purchases` - Purchase-type rows
/// * `refunds` - Refund-type rows, appended after the purchases
pub fn run_pipeline(
    config: &AnalyticsConfig,
    purchases: &[RawTransaction],
    refunds: &[RawTransaction],
) -> AnalyticsReport {
    let rows: Vec<RawTransaction> = purchases.iter().chain(refunds).cloned().collect();
    analyze_snapshot(config, &rows)
}

/// Analyze an already concatenated snapshot.
pub fn analyze_snapshot(config: &AnalyticsConfig, rows: &[RawTransaction]) -> AnalyticsReport {
    let normalized = normalize_records(rows, config);
    let records = &normalized.records;

    // Both credit consumers below read this one table.
    let profiles = aggregate_customers(records);
    let indexed = index_cohorts(records);

    let retention = RetentionTable::from_rows(&indexed.rows);
    let segmentation = segment_by_credit(&indexed.rows, &profiles);

    let report = AnalyticsReport {
        retention,
        yearly_flows: yearly_flows(records.iter().chain(&normalized.unattributed)),
        credit_usage: credit_usage_distribution(&profiles),
        credit_rate_by_signup_year: credit_rate_by_signup_year(&profiles),
        spend_by_credit_usage: spend_by_credit_usage(&profiles),
        credit_users: segmentation.credit_users,
        non_credit_users: segmentation.non_credit_users,
        diagnostics: Diagnostics {
            input_rows: rows.len(),
            dropped: normalized.dropped,
            unattributed_rows: normalized.unattributed.len(),
            dropped_pre_signup: indexed.dropped_pre_signup,
            cohort_rows: indexed.rows.len(),
        },
        profiles,
    };

    info!(
        reference_date = %config.reference_date,
        records = records.len(),
        customers = report.profiles.len(),
        cohorts = report.retention.sizes.cohort_years().len(),
        "analytics pipeline complete"
    );

    report
}
