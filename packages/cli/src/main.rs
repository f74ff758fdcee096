#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for crime trend analyses.
//!
//! Loads a tidy crime-statistics table (either a TOML source definition or
//! a bare CSV export) and runs one analysis over it. Without a subcommand
//! an interactive `dialoguer` flow asks for the analysis instead.
//!
//! Uses `indicatif-log-bridge` (via [`crime_trends_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod interactive;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crime_trends_analytics::{
    AnalyticsError, apply_filter, estimate_by_name, period_changes, reference_changes, scan,
    sweep_with_progress,
};
use crime_trends_analytics_models::{ScanFilter, ScanParams, TrendFamily};
use crime_trends_cli_utils::{IndicatifProgress, MultiProgress};
use crime_trends_crime_models::{Observation, Series, distinct_categories, distinct_statistics};
use crime_trends_source::source_def::{SourceDefinition, load_definition};

use crate::output::{FamilyEstimate, LabelRow, OutputFormat, render};

#[derive(Parser)]
#[command(
    name = "crime_trends",
    about = "Trend sensitivity and category trend scans over yearly crime statistics"
)]
struct Cli {
    /// TOML source definition describing the input table
    #[arg(long, global = true, conflicts_with = "input")]
    source: Option<PathBuf>,
    /// CSV export using the default column names (`REF_DATE`, `GEO`, ...)
    #[arg(long, global = true)]
    input: Option<PathBuf>,
    /// Keep only rows for this region (overrides the source definition)
    #[arg(long, global = true)]
    region: Option<String>,
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refit the trend on every starting period of one series
    Estimate {
        /// Violation category (e.g., "Total robbery")
        #[arg(long)]
        category: String,
        /// Statistic label (e.g., "Rate per 100,000 population")
        #[arg(long)]
        statistic: String,
        /// Regression family (`log-gamma`, `log-normal`,
        /// `log-inverse-gaussian`, `linear`, `log-poisson`)
        #[arg(long, default_value = "log-gamma")]
        family: String,
        /// Ignore periods before this one
        #[arg(long)]
        min_period: Option<i32>,
    },
    /// Compare trend curves across regression families
    Sweep {
        /// Violation category
        #[arg(long)]
        category: String,
        /// Statistic label
        #[arg(long)]
        statistic: String,
        /// Comma-separated family names. If not specified, all families
        /// are fit.
        #[arg(long, value_delimiter = ',')]
        families: Vec<String>,
    },
    /// Rank every category by its log-gamma trend over a fixed window
    Scan {
        /// First period of the window
        #[arg(long)]
        first_period: i32,
        /// Statistic label
        #[arg(long)]
        statistic: String,
        /// Period whose value is reported next to each trend (default:
        /// latest period in the window)
        #[arg(long)]
        reference_period: Option<i32>,
        /// Keep only rows with a p-value at or below this
        #[arg(long)]
        max_p_value: Option<f64>,
        /// Keep only rows whose reference value is at least this
        #[arg(long)]
        min_reference_value: Option<f64>,
    },
    /// Year-over-year changes, or changes against a reference period
    Changes {
        /// Violation category
        #[arg(long)]
        category: String,
        /// Statistic label
        #[arg(long)]
        statistic: String,
        /// Report percent change relative to this period instead
        #[arg(long)]
        reference_period: Option<i32>,
    },
    /// List the categories and statistics present in the table
    Categories,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_trends_cli_utils::init_logger();
    let cli = Cli::parse();

    let definition = resolve_definition(&cli)?;

    let Some(command) = cli.command else {
        return interactive::run(&multi, definition, cli.format);
    };

    let Some(definition) = definition else {
        return Err("either --source or --input is required".into());
    };
    let observations = crime_trends_source::load_observations(&definition)?;

    match command {
        Commands::Estimate {
            category,
            statistic,
            family,
            min_period,
        } => run_estimate(
            &observations,
            &category,
            &statistic,
            &family,
            min_period,
            cli.format,
        )?,
        Commands::Sweep {
            category,
            statistic,
            families,
        } => {
            let families = families
                .iter()
                .map(|name| TrendFamily::parse(name))
                .collect::<Result<Vec<_>, _>>()
                .map_err(AnalyticsError::from)?;
            run_sweep(
                &multi,
                &observations,
                &category,
                &statistic,
                &families,
                cli.format,
            )?;
        }
        Commands::Scan {
            first_period,
            statistic,
            reference_period,
            max_p_value,
            min_reference_value,
        } => run_scan(
            &observations,
            ScanParams {
                first_period,
                statistic,
                reference_period,
            },
            &ScanFilter {
                max_p_value,
                min_reference_value,
            },
            cli.format,
        )?,
        Commands::Changes {
            category,
            statistic,
            reference_period,
        } => run_changes(
            &observations,
            &category,
            &statistic,
            reference_period,
            cli.format,
        )?,
        Commands::Categories => run_categories(&observations, cli.format)?,
    }

    Ok(())
}

/// Builds the source definition from `--source` or `--input`, applying a
/// `--region` override. `None` when neither was given.
fn resolve_definition(
    cli: &Cli,
) -> Result<Option<SourceDefinition>, Box<dyn std::error::Error>> {
    let definition = match (&cli.source, &cli.input) {
        (Some(toml_path), _) => Some(load_definition(toml_path)?),
        (None, Some(csv_path)) => Some(SourceDefinition::from_csv_path(csv_path, None)),
        (None, None) => None,
    };

    Ok(definition.map(|mut def| {
        if cli.region.is_some() {
            def.region.clone_from(&cli.region);
        }
        def
    }))
}

/// Selects one series, failing if the table has no values for it.
fn select_series(
    observations: &[Observation],
    category: &str,
    statistic: &str,
) -> Result<Series, Box<dyn std::error::Error>> {
    let series = Series::from_observations(observations, category, statistic)?;
    if series.is_empty() {
        return Err(
            format!("no values for category '{category}' and statistic '{statistic}'").into(),
        );
    }
    log::info!(
        "Selected {} points for '{category}' / '{statistic}'",
        series.len()
    );
    Ok(series)
}

pub(crate) fn run_estimate(
    observations: &[Observation],
    category: &str,
    statistic: &str,
    family: &str,
    min_period: Option<i32>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut series = select_series(observations, category, statistic)?;
    if let Some(min_period) = min_period {
        series = Series::new(series.since(min_period).to_vec())?;
    }

    let estimates = estimate_by_name(&series, family)?;
    println!("{}", render(&estimates, format)?);
    Ok(())
}

pub(crate) fn run_sweep(
    multi: &MultiProgress,
    observations: &[Observation],
    category: &str,
    statistic: &str,
    families: &[TrendFamily],
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let series = select_series(observations, category, statistic)?;
    let families = if families.is_empty() {
        TrendFamily::all()
    } else {
        families
    };

    let progress = IndicatifProgress::steps_bar(multi, "Fitting families");
    let curves = sweep_with_progress(&series, families, progress.as_ref());

    let rows: Vec<FamilyEstimate> = curves
        .into_iter()
        .flat_map(|curve| {
            let family = curve.family;
            curve
                .estimates
                .into_iter()
                .map(move |estimate| FamilyEstimate { family, estimate })
        })
        .collect();

    println!("{}", render(&rows, format)?);
    Ok(())
}

pub(crate) fn run_scan(
    observations: &[Observation],
    params: ScanParams,
    filter: &ScanFilter,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let results = scan(observations, &params);
    let scanned = results.len();
    let results = apply_filter(results, filter);
    log::info!("{} of {scanned} categories pass the filter", results.len());

    println!("{}", render(&results, format)?);
    Ok(())
}

pub(crate) fn run_changes(
    observations: &[Observation],
    category: &str,
    statistic: &str,
    reference_period: Option<i32>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let series = select_series(observations, category, statistic)?;

    let rendered = match reference_period {
        Some(period) => render(&reference_changes(&series, period)?, format)?,
        None => render(&period_changes(&series), format)?,
    };
    println!("{rendered}");
    Ok(())
}

pub(crate) fn run_categories(
    observations: &[Observation],
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows: Vec<LabelRow> = distinct_categories(observations)
        .into_iter()
        .map(|label| LabelRow {
            kind: "category",
            label,
        })
        .chain(
            distinct_statistics(observations)
                .into_iter()
                .map(|label| LabelRow {
                    kind: "statistic",
                    label,
                }),
        )
        .collect();

    println!("{}", render(&rows, format)?);
    Ok(())
}
