//! Transaction loading from CSV exports
//!
//! Purchases and refunds arrive as two files sharing one column layout. Both
//! are read into [`RawTransaction`] rows and concatenated, purchases first.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::AnalyticsError;

pub const COL_MEMBER_ID: &str = "Member ID";
pub const COL_TOTAL_AMOUNT: &str = "Total Amount";
pub const COL_CREDIT_AMOUNT: &str = "Credit Amount";
pub const COL_SIGNUP_DATE: &str = "Signup Date";
pub const COL_LAST_LOGIN_DATE: &str = "Last Login Date";
pub const COL_FIRST_ORDER_DATE: &str = "First Order Date";
pub const COL_LAST_ORDER_DATE: &str = "Last Order Date";

/// Columns that must be present in every input file.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    COL_MEMBER_ID,
    COL_TOTAL_AMOUNT,
    COL_CREDIT_AMOUNT,
    COL_SIGNUP_DATE,
    COL_LAST_LOGIN_DATE,
    COL_FIRST_ORDER_DATE,
    COL_LAST_ORDER_DATE,
];

/// One transaction row as exported, before any parsing of dates.
///
/// Numeric cells that fail to parse, or parse to `NaN`/infinity, are read as
/// `None` rather than failing the whole file. Empty cells and cells missing
/// from a short row are `None` as well.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "Member ID", default)]
    pub member_id: String,
    /// Signed amount: positive for purchases, negative for refunds
    #[serde(rename = "Total Amount", default, deserialize_with = "finite_option")]
    pub total_amount: Option<f64>,
    #[serde(rename = "Credit Amount", default, deserialize_with = "finite_option")]
    pub credit_amount: Option<f64>,
    #[serde(rename = "Signup Date", default)]
    pub signup_date: Option<String>,
    #[serde(rename = "Last Login Date", default)]
    pub last_login_date: Option<String>,
    #[serde(rename = "First Order Date", default)]
    pub first_order_date: Option<String>,
    #[serde(rename = "Last Order Date", default)]
    pub last_order_date: Option<String>,
}

/// Like `csv::invalid_option`, but non-finite numbers are null too.
fn finite_option<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = csv::invalid_option(de)?;
    Ok(value.filter(|v| v.is_finite()))
}

/// Load every row of one CSV export.
///
/// # Arguments
/// * `file_path` - Path to the CSV file
///
/// # Returns
/// * The rows in file order, or [`AnalyticsError::MissingColumn`] when the
///   header lacks one of [`REQUIRED_COLUMNS`]. Short rows are padded with
///   nulls and left for normalization to reject.
pub fn load_transactions<P: AsRef<Path>>(file_path: P) -> crate::Result<Vec<RawTransaction>> {
    let path = file_path.as_ref();
    let file = File::open(path)
        .map_err(|e| anyhow::anyhow!("failed to open '{}': {}", path.display(), e))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(AnalyticsError::MissingColumn {
                column: column.to_string(),
                source_file: path.display().to_string(),
            }
            .into());
        }
    }

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: RawTransaction = record?;
        rows.push(row);
    }

    debug!(file = %path.display(), rows = rows.len(), "loaded transaction file");
    Ok(rows)
}

/// Load the purchase and refund exports and concatenate them.
///
/// Purchases come first so that a customer's earliest-listed signup date is
/// taken from the purchase file when the two disagree.
pub fn load_snapshot<P: AsRef<Path>, Q: AsRef<Path>>(
    purchases_path: P,
    refunds_path: Q,
) -> crate::Result<Vec<RawTransaction>> {
    let mut rows = load_transactions(purchases_path)?;
    let refunds = load_transactions(refunds_path)?;
    info!(
        purchases = rows.len(),
        refunds = refunds.len(),
        "loaded transaction snapshot"
    );
    rows.extend(refunds);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Member ID,Order ID,Total Amount,Credit Amount,Signup Date,Last Login Date,First Order Date,Last Order Date";

    fn create_test_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_load_transactions() {
        let file = create_test_csv(&[
            "1001,A1,120.50,0,2020-01-05,2021-03-01,2020-01-06,2021-02-01",
            "1002,A2,-30,,2019-07-10,,2019-07-11,2020-05-20",
        ]);

        let rows = load_transactions(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].member_id, "1001");
        assert_eq!(rows[0].total_amount, Some(120.5));
        assert_eq!(rows[0].credit_amount, Some(0.0));
        assert_eq!(rows[1].credit_amount, None);
        assert_eq!(rows[1].last_login_date, None);
        assert_eq!(rows[1].last_order_date.as_deref(), Some("2020-05-20"));
    }

    #[test]
    fn test_unparseable_amount_is_null() {
        let file = create_test_csv(&["1001,A1,n/a,abc,2020-01-05,,2020-01-06,2020-02-01"]);

        let rows = load_transactions(file.path()).unwrap();
        assert_eq!(rows[0].total_amount, None);
        assert_eq!(rows[0].credit_amount, None);
    }

    #[test]
    fn test_non_finite_amount_is_null() {
        let file = create_test_csv(&[
            "1,O1,100,NaN,2020-01-05,,2020-01-06,2020-02-01",
            "2,O2,nan,inf,2020-01-05,,2020-01-06,2020-02-01",
            "3,O3,-infinity,0,2020-01-05,,2020-01-06,2020-02-01",
        ]);

        let rows = load_transactions(file.path()).unwrap();
        assert_eq!(rows[0].total_amount, Some(100.0));
        assert_eq!(rows[0].credit_amount, None);
        assert_eq!(rows[1].total_amount, None);
        assert_eq!(rows[1].credit_amount, None);
        assert_eq!(rows[2].total_amount, None);
        assert_eq!(rows[2].credit_amount, Some(0.0));
    }

    #[test]
    fn test_short_row_is_padded_with_nulls() {
        let file = create_test_csv(&[
            "1,O1,10,0,2020-01-05,,2020-01-06,2020-02-01",
            "2,O2,50,0,2020-01-01",
        ]);

        let rows = load_transactions(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].member_id, "2");
        assert_eq!(rows[1].total_amount, Some(50.0));
        assert_eq!(rows[1].signup_date.as_deref(), Some("2020-01-01"));
        assert_eq!(rows[1].first_order_date, None);
        assert_eq!(rows[1].last_order_date, None);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Member ID,Total Amount,Signup Date").unwrap();
        writeln!(file, "1001,10,2020-01-01").unwrap();

        let err = load_transactions(file.path()).unwrap_err();
        let structural = err.downcast_ref::<AnalyticsError>().unwrap();
        assert!(matches!(
            structural,
            AnalyticsError::MissingColumn { column, .. } if column == COL_CREDIT_AMOUNT
        ));
    }

    #[test]
    fn test_load_snapshot_orders_purchases_first() {
        let purchases = create_test_csv(&["1,P,10,,2020-01-01,,2020-01-01,2020-02-01"]);
        let refunds = create_test_csv(&["2,R,-5,,2020-01-01,,2020-01-01,2020-03-01"]);

        let rows = load_snapshot(purchases.path(), refunds.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].member_id, "1");
        assert_eq!(rows[1].total_amount, Some(-5.0));
    }
}
