//! Console summary and table export for downstream consumers

use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::cohort::CohortMatrix;
use crate::pipeline::AnalyticsReport;

/// Names of the files written by [`write_tables`], in write order.
pub const TABLE_FILES: [&str; 8] = [
    "customer_profiles.csv",
    "cohort_sizes.csv",
    "retention.csv",
    "churn.csv",
    "yearly_flows.csv",
    "credit_rate_by_signup_year.csv",
    "avg_spend_credit_users.csv",
    "avg_spend_non_credit_users.csv",
];

#[derive(Serialize)]
struct ProfileRow<'a> {
    customer_id: &'a str,
    signup_date: String,
    signup_year: i32,
    total_spend: f64,
    credit_amount_sum: Option<f64>,
    used_credit: bool,
}

#[derive(Serialize)]
struct FlowRow {
    year: i32,
    purchases: Option<f64>,
    refunds: Option<f64>,
}

/// Print the headline tables to stdout.
pub fn print_summary(report: &AnalyticsReport) {
    print!("{}", format_summary(report));
}

/// Render the headline tables as the text [`print_summary`] prints.
pub fn format_summary(report: &AnalyticsReport) -> String {
    let mut out = String::new();
    // Writing into a String never fails.
    let _ = write_summary(&mut out, report);
    out
}

fn write_summary<W: fmt::Write>(out: &mut W, report: &AnalyticsReport) -> fmt::Result {
    let diag = &report.diagnostics;

    writeln!(out, "\n=== Input ===")?;
    writeln!(out, "Rows read: {}", diag.input_rows)?;
    writeln!(out, "Rows dropped (malformed): {}", diag.dropped.malformed)?;
    writeln!(out, "Rows dropped (no activity date): {}", diag.dropped.missing_activity)?;
    writeln!(out, "Rows dropped (after cutoff): {}", diag.dropped.after_cutoff)?;
    writeln!(out, "Rows without customer id (flows only): {}", diag.unattributed_rows)?;
    writeln!(out, "Rows outside cohorts (activity before signup): {}", diag.dropped_pre_signup)?;
    writeln!(out, "Customers: {}", report.profiles.len())?;

    writeln!(out, "\n=== Churn Rate by Cohort (%) ===")?;
    write_matrix_grid(out, &report.retention.churn, |v| format!("{:.1}", v * 100.0))?;

    writeln!(out, "\n=== Purchases and Refunds by Year ===")?;
    writeln!(out, "  Year | Purchases    | Refunds")?;
    writeln!(out, "  -----|--------------|-------------")?;
    for year in report.yearly_flows.aligned_years() {
        let purchases = report.yearly_flows.purchases.get(&year);
        let refunds = report.yearly_flows.refunds.get(&year);
        writeln!(
            out,
            "  {:4} | {:>12} | {:>12}",
            year,
            purchases.map_or("-".to_string(), |v| format!("{:.2}", v)),
            refunds.map_or("-".to_string(), |v| format!("{:.2}", v)),
        )?;
    }

    let usage = &report.credit_usage;
    writeln!(out, "\n=== Credit Usage ===")?;
    if usage.total() > 0 {
        let share = usage.credit_users as f64 / usage.total() as f64 * 100.0;
        writeln!(
            out,
            "Used credit: {} customers ({:.1}%), did not: {}",
            usage.credit_users, share, usage.non_credit_users
        )?;
    }
    for (label, summary) in [
        ("credit users", &report.spend_by_credit_usage.credit_users),
        ("non-users", &report.spend_by_credit_usage.non_credit_users),
    ] {
        if let Some(mean) = summary.mean {
            writeln!(out, "  Mean net spend, {}: {:.2}", label, mean)?;
        }
    }
    writeln!(out, "\nCredit usage rate by signup year:")?;
    for (year, rate) in &report.credit_rate_by_signup_year {
        writeln!(out, "  {}: {:.1}%", year, rate * 100.0)?;
    }

    writeln!(out, "\n=== Average Spend per Active Customer: Credit Users ===")?;
    write_matrix_grid(out, &report.credit_users.average_spend, |v| format!("{:.0}", v))?;
    writeln!(out, "\n=== Average Spend per Active Customer: Non-Users ===")?;
    write_matrix_grid(out, &report.non_credit_users.average_spend, |v| format!("{:.0}", v))
}

/// Lay out a sparse matrix as a grid; absent cells show as blanks.
fn write_matrix_grid<W, T, F>(out: &mut W, matrix: &CohortMatrix<T>, format_cell: F) -> fmt::Result
where
    W: fmt::Write,
    F: Fn(&T) -> String,
{
    let Some(max_index) = matrix.max_index() else {
        return writeln!(out, "  (no cohorts)");
    };

    let header: String = (1..=max_index).map(|i| format!(" {:>8}", i)).collect();
    writeln!(out, "  Cohort |{}", header)?;
    for year in matrix.cohort_years() {
        let cells: String = (1..=max_index)
            .map(|i| match matrix.get(year, i) {
                Some(v) => format!(" {:>8}", format_cell(v)),
                None => format!(" {:>8}", ""),
            })
            .collect();
        writeln!(out, "  {:6} |{}", year, cells)?;
    }
    Ok(())
}

/// Write every consumer table as CSV under `dir`, creating it if needed.
///
/// # Returns
/// * Paths of the files written, in [`TABLE_FILES`] order
pub fn write_tables<P: AsRef<Path>>(report: &AnalyticsReport, dir: P) -> crate::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path_of = |name: &str| dir.join(name);

    let mut written = Vec::with_capacity(TABLE_FILES.len());

    let path = path_of(TABLE_FILES[0]);
    let mut wtr = csv::Writer::from_path(&path)?;
    for profile in report.profiles.values() {
        wtr.serialize(ProfileRow {
            customer_id: &profile.customer_id,
            signup_date: profile.signup_date.format("%Y-%m-%d").to_string(),
            signup_year: profile.signup_year,
            total_spend: profile.total_spend,
            credit_amount_sum: profile.credit_amount_sum,
            used_credit: profile.used_credit,
        })?;
    }
    wtr.flush()?;
    written.push(path);

    written.push(write_matrix(&report.retention.sizes, &path_of(TABLE_FILES[1]), "active_customers")?);
    written.push(write_matrix(&report.retention.retention, &path_of(TABLE_FILES[2]), "retention")?);
    written.push(write_matrix(&report.retention.churn, &path_of(TABLE_FILES[3]), "churn")?);

    let path = path_of(TABLE_FILES[4]);
    let mut wtr = csv::Writer::from_path(&path)?;
    for year in report.yearly_flows.aligned_years() {
        wtr.serialize(FlowRow {
            year,
            purchases: report.yearly_flows.purchases.get(&year).copied(),
            refunds: report.yearly_flows.refunds.get(&year).copied(),
        })?;
    }
    wtr.flush()?;
    written.push(path);

    let path = path_of(TABLE_FILES[5]);
    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record(["signup_year", "credit_usage_rate"])?;
    for (year, rate) in &report.credit_rate_by_signup_year {
        wtr.write_record([year.to_string(), rate.to_string()])?;
    }
    wtr.flush()?;
    written.push(path);

    written.push(write_matrix(
        &report.credit_users.average_spend,
        &path_of(TABLE_FILES[6]),
        "average_spend",
    )?);
    written.push(write_matrix(
        &report.non_credit_users.average_spend,
        &path_of(TABLE_FILES[7]),
        "average_spend",
    )?);

    debug!(dir = %dir.display(), files = written.len(), "wrote output tables");
    Ok(written)
}

/// Write a matrix long-form: one line per present cell.
fn write_matrix<T: ToString>(
    matrix: &CohortMatrix<T>,
    path: &Path,
    value_column: &str,
) -> crate::Result<PathBuf> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["cohort_year", "cohort_index", value_column])?;
    for (key, value) in matrix.iter() {
        wtr.write_record([key.year.to_string(), key.index.to_string(), value.to_string()])?;
    }
    wtr.flush()?;
    Ok(path.to_path_buf())
}

/// Write the full report as pretty-printed JSON.
pub fn write_json<P: AsRef<Path>>(report: &AnalyticsReport, path: P) -> crate::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::data::RawTransaction;
    use crate::pipeline::run_pipeline;
    use tempfile::tempdir;

    fn create_test_report() -> AnalyticsReport {
        let row = |id: &str, amount: f64, activity: &str| RawTransaction {
            member_id: id.to_string(),
            total_amount: Some(amount),
            credit_amount: Some(if id == "1" { 25.0 } else { 0.0 }),
            signup_date: Some("2020-01-15".to_string()),
            first_order_date: Some("2020-01-20".to_string()),
            last_order_date: Some(activity.to_string()),
            ..Default::default()
        };
        let purchases = vec![
            row("1", 100.0, "2020-02-01"),
            row("1", 60.0, "2021-02-01"),
            row("2", 40.0, "2020-03-01"),
        ];
        let refunds = vec![row("2", -15.0, "2020-04-01")];
        run_pipeline(&AnalyticsConfig::default(), &purchases, &refunds)
    }

    #[test]
    fn test_write_tables() {
        let report = create_test_report();
        let temp_dir = tempdir().unwrap();

        let written = write_tables(&report, temp_dir.path()).unwrap();
        assert_eq!(written.len(), TABLE_FILES.len());
        for path in &written {
            assert!(path.exists());
        }

        let churn = std::fs::read_to_string(temp_dir.path().join("churn.csv")).unwrap();
        let lines: Vec<&str> = churn.lines().collect();
        assert_eq!(lines[0], "cohort_year,cohort_index,churn");
        assert_eq!(lines[1], "2020,1,0");
        assert_eq!(lines[2], "2020,2,0.5");
        assert_eq!(lines.len(), 3);

        let flows = std::fs::read_to_string(temp_dir.path().join("yearly_flows.csv")).unwrap();
        assert!(flows.starts_with("year,purchases,refunds"));
        assert!(flows.contains("2021,60.0,"));
    }

    #[test]
    fn test_write_json() {
        let report = create_test_report();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("report.json");

        write_json(&report, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["retention"]["retention"]["2020"]["2"], 0.5);
        assert_eq!(value["credit_usage"]["credit_users"], 1);
    }

    #[test]
    fn test_format_summary() {
        let summary = format_summary(&create_test_report());

        assert!(summary.contains("Rows read: 4"));
        assert!(summary.contains("Customers: 2"));
        assert!(summary.contains("Used credit: 1 customers (50.0%), did not: 1"));
        assert!(summary.contains("  2020: 50.0%"));
        // 2020 cohort: churn 0% in its first year, 50% in its second
        let churn_row = summary
            .lines()
            .find(|line| line.trim_start().starts_with("2020 |"))
            .unwrap();
        assert_eq!(churn_row, format!("    2020 | {:>8} {:>8}", "0.0", "50.0"));
        assert!(summary.contains("  2021 |        60.00 |            -"));
    }

    #[test]
    fn test_format_summary_empty_report() {
        let summary = format_summary(&AnalyticsReport::default());

        assert!(summary.contains("Rows read: 0"));
        assert!(summary.contains("(no cohorts)"));
        assert!(!summary.contains("Used credit"));
    }
}
