//! Per-customer aggregation and credit-usage summaries

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::normalize::TransactionRecord;

/// Canonical per-customer view derived from all of a customer's rows.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomerProfile {
    pub customer_id: String,
    /// Signup date of the first row seen for the customer
    pub signup_date: NaiveDateTime,
    pub signup_year: i32,
    /// Net spend: purchases minus refunds
    pub total_spend: f64,
    /// `None` when every credit cell for the customer was empty
    pub credit_amount_sum: Option<f64>,
    pub used_credit: bool,
}

/// Profiles keyed by customer id. Each id appears exactly once.
pub type ProfileTable = BTreeMap<String, CustomerProfile>;

/// How many customers did and did not use credit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CreditUsageDistribution {
    pub credit_users: usize,
    pub non_credit_users: usize,
}

impl CreditUsageDistribution {
    pub fn total(&self) -> usize {
        self.credit_users + self.non_credit_users
    }
}

/// Net-spend summary for one credit-usage group.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SpendSummary {
    pub customers: usize,
    pub total: f64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl SpendSummary {
    fn push(&mut self, spend: f64) {
        self.customers += 1;
        self.total += spend;
        self.min = Some(self.min.map_or(spend, |m| m.min(spend)));
        self.max = Some(self.max.map_or(spend, |m| m.max(spend)));
        self.mean = Some(self.total / self.customers as f64);
    }
}

/// Net spend distribution split by credit usage.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SpendByCreditUsage {
    pub credit_users: SpendSummary,
    pub non_credit_users: SpendSummary,
}

/// `true` iff a summed credit amount exists and is non-zero.
pub fn used_credit(credit_amount_sum: Option<f64>) -> bool {
    matches!(credit_amount_sum, Some(sum) if sum != 0.0)
}

/// Collapse cleaned records into one profile per customer.
///
/// The first row seen for a customer fixes its signup date; later rows with
/// a different signup date are not checked. Empty amount cells add nothing.
pub fn aggregate_customers(records: &[TransactionRecord]) -> ProfileTable {
    struct Acc {
        signup_date: NaiveDateTime,
        total_spend: f64,
        credit_amount_sum: Option<f64>,
    }

    let mut groups: HashMap<&str, Acc> = HashMap::new();
    for record in records {
        let acc = groups.entry(record.customer_id.as_str()).or_insert(Acc {
            signup_date: record.signup_date,
            total_spend: 0.0,
            credit_amount_sum: None,
        });
        if let Some(amount) = record.amount {
            acc.total_spend += amount;
        }
        if let Some(credit) = record.credit_amount {
            acc.credit_amount_sum = Some(acc.credit_amount_sum.unwrap_or(0.0) + credit);
        }
    }

    let profiles: ProfileTable = groups
        .into_iter()
        .map(|(id, acc)| {
            let profile = CustomerProfile {
                customer_id: id.to_string(),
                signup_date: acc.signup_date,
                signup_year: acc.signup_date.year(),
                total_spend: acc.total_spend,
                credit_amount_sum: acc.credit_amount_sum,
                used_credit: used_credit(acc.credit_amount_sum),
            };
            (profile.customer_id.clone(), profile)
        })
        .collect();

    debug!(customers = profiles.len(), "aggregated customer profiles");
    profiles
}

/// Count credit users and non-users.
pub fn credit_usage_distribution(profiles: &ProfileTable) -> CreditUsageDistribution {
    profiles
        .values()
        .fold(CreditUsageDistribution::default(), |mut dist, p| {
            if p.used_credit {
                dist.credit_users += 1;
            } else {
                dist.non_credit_users += 1;
            }
            dist
        })
}

/// Fraction of each signup-year cohort that used credit, in `[0, 1]`.
pub fn credit_rate_by_signup_year(profiles: &ProfileTable) -> BTreeMap<i32, f64> {
    let mut counts: BTreeMap<i32, (usize, usize)> = BTreeMap::new();
    for profile in profiles.values() {
        let entry = counts.entry(profile.signup_year).or_default();
        entry.1 += 1;
        if profile.used_credit {
            entry.0 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(year, (users, total))| (year, users as f64 / total as f64))
        .collect()
}

/// Summarize net spend for credit users and non-users.
pub fn spend_by_credit_usage(profiles: &ProfileTable) -> SpendByCreditUsage {
    let mut out = SpendByCreditUsage::default();
    for profile in profiles.values() {
        if profile.used_credit {
            out.credit_users.push(profile.total_spend);
        } else {
            out.non_credit_users.push(profile.total_spend);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::parse_date;

    fn record(id: &str, signup: &str, amount: Option<f64>, credit: Option<f64>) -> TransactionRecord {
        let signup_date = parse_date(signup).unwrap();
        TransactionRecord {
            customer_id: id.to_string(),
            amount,
            credit_amount: credit,
            signup_date,
            last_login_date: None,
            first_order_date: signup_date,
            last_order_date: signup_date,
        }
    }

    #[test]
    fn test_one_profile_per_customer() {
        let records = vec![
            record("a", "2020-02-01", Some(100.0), None),
            record("b", "2021-03-01", Some(40.0), None),
            record("a", "2020-02-01", Some(-25.0), None),
        ];

        let profiles = aggregate_customers(&records);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles["a"].total_spend, 75.0);
        assert_eq!(profiles["a"].signup_year, 2020);
        assert_eq!(profiles["b"].total_spend, 40.0);
    }

    #[test]
    fn test_first_signup_date_wins() {
        let records = vec![
            record("a", "2019-05-05", Some(1.0), None),
            record("a", "2020-06-06", Some(1.0), None),
        ];

        let profiles = aggregate_customers(&records);
        assert_eq!(profiles["a"].signup_date, parse_date("2019-05-05").unwrap());
        assert_eq!(profiles["a"].signup_year, 2019);
    }

    #[test]
    fn test_used_credit_both_directions() {
        let records = vec![
            record("zero", "2020-01-01", Some(10.0), Some(0.0)),
            record("zero", "2020-01-01", Some(10.0), Some(0.0)),
            record("user", "2020-01-01", Some(10.0), Some(0.0)),
            record("user", "2020-01-01", Some(10.0), Some(50.0)),
            record("empty", "2020-01-01", Some(10.0), None),
            record("cancels", "2020-01-01", Some(10.0), Some(20.0)),
            record("cancels", "2020-01-01", Some(10.0), Some(-20.0)),
        ];

        let profiles = aggregate_customers(&records);
        assert!(!profiles["zero"].used_credit);
        assert!(profiles["user"].used_credit);
        assert!(!profiles["empty"].used_credit);
        assert_eq!(profiles["empty"].credit_amount_sum, None);
        assert!(!profiles["cancels"].used_credit);

        for profile in profiles.values() {
            let expected = profile.credit_amount_sum.is_some_and(|s| s != 0.0);
            assert_eq!(profile.used_credit, expected);
        }
    }

    #[test]
    fn test_credit_summaries() {
        let records = vec![
            record("a", "2020-01-01", Some(300.0), Some(50.0)),
            record("b", "2020-04-01", Some(100.0), None),
            record("c", "2021-01-01", Some(-20.0), Some(0.0)),
            record("d", "2021-01-01", Some(60.0), Some(5.0)),
        ];
        let profiles = aggregate_customers(&records);

        let dist = credit_usage_distribution(&profiles);
        assert_eq!(dist.credit_users, 2);
        assert_eq!(dist.non_credit_users, 2);
        assert_eq!(dist.total(), profiles.len());

        let rates = credit_rate_by_signup_year(&profiles);
        assert_eq!(rates[&2020], 0.5);
        assert_eq!(rates[&2021], 0.5);

        let spend = spend_by_credit_usage(&profiles);
        assert_eq!(spend.credit_users.customers, 2);
        assert_eq!(spend.credit_users.total, 360.0);
        assert_eq!(spend.credit_users.mean, Some(180.0));
        assert_eq!(spend.non_credit_users.min, Some(-20.0));
        assert_eq!(spend.non_credit_users.max, Some(100.0));
    }

    #[test]
    fn test_empty_group_has_no_mean() {
        let profiles = aggregate_customers(&[record("a", "2020-01-01", Some(5.0), None)]);
        let spend = spend_by_credit_usage(&profiles);
        assert_eq!(spend.credit_users.customers, 0);
        assert_eq!(spend.credit_users.mean, None);
    }
}
