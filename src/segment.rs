//! Cohort matrices split by credit usage

use serde::Serialize;
use tracing::debug;

use crate::cohort::{active_customer_matrix, spend_matrix, CohortMatrix, CohortRow};
use crate::customer::ProfileTable;

/// Active-customer, spend and average-spend matrices for one customer group.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CreditSegment {
    pub active: CohortMatrix<usize>,
    pub spend: CohortMatrix<f64>,
    /// `spend / active`; only present where `active` is non-zero
    pub average_spend: CohortMatrix<f64>,
}

impl CreditSegment {
    /// Build all three matrices over one partition of the cohort rows.
    pub fn from_rows(rows: &[&CohortRow<'_>]) -> Self {
        let active = active_customer_matrix(rows.iter().copied());
        let spend = spend_matrix(rows.iter().copied());
        let average_spend = average_spend(&spend, &active);
        Self {
            active,
            spend,
            average_spend,
        }
    }
}

/// Divide spend by active count cell by cell.
///
/// A cell is emitted only where both matrices have it and the count is
/// non-zero.
pub fn average_spend(spend: &CohortMatrix<f64>, active: &CohortMatrix<usize>) -> CohortMatrix<f64> {
    spend
        .iter()
        .filter_map(|(key, &sum)| match active.get(key.year, key.index) {
            Some(&count) if count > 0 => Some((*key, sum / count as f64)),
            _ => None,
        })
        .collect()
}

/// Cohort matrices for credit users and everyone else.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CreditSegmentation {
    pub credit_users: CreditSegment,
    pub non_credit_users: CreditSegment,
}

/// Partition cohort rows by their customer's credit flag and build each side.
///
/// Rows whose customer is missing from `profiles` land with the non-users.
pub fn segment_by_credit(rows: &[CohortRow<'_>], profiles: &ProfileTable) -> CreditSegmentation {
    let (users, non_users): (Vec<&CohortRow<'_>>, Vec<&CohortRow<'_>>) =
        rows.iter().partition(|row| {
            profiles
                .get(&row.record.customer_id)
                .is_some_and(|p| p.used_credit)
        });

    debug!(
        credit_rows = users.len(),
        non_credit_rows = non_users.len(),
        "partitioned cohort rows by credit usage"
    );

    CreditSegmentation {
        credit_users: CreditSegment::from_rows(&users),
        non_credit_users: CreditSegment::from_rows(&non_users),
    }
}
