//! Yearly purchase and refund totals

use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use serde::Serialize;

use crate::normalize::TransactionRecord;

/// Money flow per calendar year of activity.
///
/// The two series are indexed independently: a year with purchases but no
/// refunds has no refund entry at all.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct YearlyFlows {
    /// Sum of strictly positive amounts
    pub purchases: BTreeMap<i32, f64>,
    /// Magnitude of the sum of strictly negative amounts
    pub refunds: BTreeMap<i32, f64>,
}

impl YearlyFlows {
    /// Union of years from both series, for consumers needing one axis.
    pub fn aligned_years(&self) -> Vec<i32> {
        self.purchases
            .keys()
            .chain(self.refunds.keys())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Sum purchases and refunds by the year of each record's activity date.
/// Zero and empty amounts fall in neither series.
pub fn yearly_flows<'a, I>(records: I) -> YearlyFlows
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let mut flows = YearlyFlows::default();
    for record in records {
        let year = record.activity_date().year();
        match record.amount {
            Some(amount) if amount > 0.0 => {
                *flows.purchases.entry(year).or_insert(0.0) += amount;
            }
            Some(amount) if amount < 0.0 => {
                *flows.refunds.entry(year).or_insert(0.0) += amount.abs();
            }
            _ => {}
        }
    }
    flows
}
