//! Record normalization: date parsing, row validation and the reference cutoff

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::AnalyticsConfig;
use crate::data::RawTransaction;

/// Date-time layouts accepted in the export, tried in order.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Date-only layouts accepted in the export.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// A validated transaction with typed dates.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionRecord {
    pub customer_id: String,
    pub amount: Option<f64>,
    pub credit_amount: Option<f64>,
    pub signup_date: NaiveDateTime,
    pub last_login_date: Option<NaiveDateTime>,
    pub first_order_date: NaiveDateTime,
    pub last_order_date: NaiveDateTime,
}

impl TransactionRecord {
    /// Temporal anchor of the record: its last order date.
    pub fn activity_date(&self) -> NaiveDateTime {
        self.last_order_date
    }
}

/// Rows discarded during normalization, by reason.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    /// Missing signup date or first-order date
    pub malformed: usize,
    /// No parseable last-order date, so no activity date
    pub missing_activity: usize,
    /// Activity date later than the reference cutoff
    pub after_cutoff: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.malformed + self.missing_activity + self.after_cutoff
    }
}

/// Output of [`normalize_records`].
#[derive(Clone, Debug, Default)]
pub struct NormalizedRecords {
    pub records: Vec<TransactionRecord>,
    /// Otherwise valid rows with an empty customer id. They can't be grouped
    /// by customer but still count toward yearly flows.
    pub unattributed: Vec<TransactionRecord>,
    pub dropped: DropCounts,
}

/// Parse a free-text date cell, returning `None` for anything unrecognized.
///
/// Values carrying an offset are converted to UTC before the offset is
/// discarded. Date-only values resolve to midnight.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    None
}

fn parse_cell(cell: &Option<String>) -> Option<NaiveDateTime> {
    cell.as_deref().and_then(parse_date)
}

/// Clean raw rows into typed records.
///
/// Rows missing a signup date or first-order date are dropped, as are rows
/// whose activity date is absent or later than `config.reference_date`.
/// Nothing is reported as an error; the counts of each kind of drop are
/// returned alongside the records. Rows passing those checks with an empty
/// customer id go to `unattributed` instead of `records`.
pub fn normalize_records(rows: &[RawTransaction], config: &AnalyticsConfig) -> NormalizedRecords {
    let mut out = NormalizedRecords {
        records: Vec::with_capacity(rows.len()),
        unattributed: Vec::new(),
        dropped: DropCounts::default(),
    };

    for row in rows {
        let customer_id = row.member_id.trim();
        let signup = parse_cell(&row.signup_date);
        let first_order = parse_cell(&row.first_order_date);

        let (signup_date, first_order_date) = match (signup, first_order) {
            (Some(s), Some(f)) => (s, f),
            _ => {
                out.dropped.malformed += 1;
                continue;
            }
        };

        let Some(last_order_date) = parse_cell(&row.last_order_date) else {
            out.dropped.missing_activity += 1;
            continue;
        };

        if last_order_date > config.reference_date {
            out.dropped.after_cutoff += 1;
            continue;
        }

        let record = TransactionRecord {
            customer_id: customer_id.to_string(),
            amount: row.total_amount,
            credit_amount: row.credit_amount,
            signup_date,
            last_login_date: parse_cell(&row.last_login_date),
            first_order_date,
            last_order_date,
        };
        if customer_id.is_empty() {
            out.unattributed.push(record);
        } else {
            out.records.push(record);
        }
    }

    if out.dropped.total() > 0 {
        warn!(
            malformed = out.dropped.malformed,
            missing_activity = out.dropped.missing_activity,
            after_cutoff = out.dropped.after_cutoff,
            "dropped rows during normalization"
        );
    }
    debug!(
        kept = out.records.len(),
        unattributed = out.unattributed.len(),
        "normalized transaction rows"
    );

    out
}
