//! CohortLens: cohort churn and credit-usage analytics CLI
//!
//! Loads the purchase and refund exports, runs the analytics pipeline, prints
//! a summary and writes the output tables.

use anyhow::Result;
use clap::Parser;
use cohortlens::{analyze_snapshot, load_snapshot, print_summary, write_json, write_tables, Args};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level());

    if args.verbose {
        println!("CohortLens - Cohort Retention and Credit Usage Analytics");
        println!("========================================================\n");
    }

    let config = args.analytics_config()?;
    let start_time = Instant::now();

    // Step 1: Load exports
    if args.verbose {
        println!("Step 1: Loading transactions");
        println!("  Purchases: {}", args.purchases);
        println!("  Refunds: {}", args.refunds);
    }
    let load_start = Instant::now();
    let rows = load_snapshot(&args.purchases, &args.refunds)?;
    println!("✓ Data loaded: {} rows", rows.len());
    if args.verbose {
        println!("  Loading time: {:.2}s", load_start.elapsed().as_secs_f64());
    }

    // Step 2: Compute cohort tables
    if args.verbose {
        println!("\nStep 2: Computing cohort analytics");
        println!("  Reference date: {}", config.reference_date.date());
    }
    let compute_start = Instant::now();
    let report = analyze_snapshot(&config, &rows);
    println!(
        "✓ Analytics computed: {} customers across {} cohorts",
        report.profiles.len(),
        report.retention.sizes.cohort_years().len()
    );
    if args.verbose {
        println!("  Compute time: {:.2}s", compute_start.elapsed().as_secs_f64());
    }

    print_summary(&report);

    // Step 3: Export tables
    let written = write_tables(&report, &args.output_dir)?;
    println!("\n✓ {} tables written to: {}", written.len(), args.output_dir);
    if let Some(json_path) = &args.json {
        write_json(&report, json_path)?;
        println!("✓ JSON report written to: {}", json_path);
    }

    info!(elapsed_ms = start_time.elapsed().as_millis() as u64, "run complete");
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}

/// Initialize tracing from `COHORTLENS_LOG`, falling back to `default_level`.
fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("COHORTLENS_LOG").unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
