//! Interactive flow for running an analysis without memorizing flags.

use std::path::Path;
use std::str::FromStr;

use crime_trends_analytics_models::{ScanFilter, ScanParams, TrendFamily};
use crime_trends_cli_utils::MultiProgress;
use crime_trends_crime_models::{Observation, distinct_categories, distinct_statistics};
use crime_trends_source::source_def::{SourceDefinition, load_definition};
use dialoguer::{Input, MultiSelect, Select};

use crate::output::OutputFormat;

/// Analyses offered by the interactive menu.
enum Analysis {
    Estimate,
    Sweep,
    Scan,
    Changes,
    Categories,
}

impl Analysis {
    const ALL: &[Self] = &[
        Self::Estimate,
        Self::Sweep,
        Self::Scan,
        Self::Changes,
        Self::Categories,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Estimate => "Trend sensitivity to the starting year",
            Self::Sweep => "Compare regression families",
            Self::Scan => "Scan categories for trends",
            Self::Changes => "Year-over-year changes",
            Self::Categories => "List categories and statistics",
        }
    }
}

/// Prompts for any missing input, then for an analysis and its settings,
/// and prints the result.
///
/// # Errors
///
/// Returns an error if a prompt fails, the table cannot be loaded, or the
/// selected analysis fails.
pub fn run(
    multi: &MultiProgress,
    definition: Option<SourceDefinition>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let definition = match definition {
        Some(definition) => definition,
        None => prompt_definition()?,
    };
    let observations = crime_trends_source::load_observations(&definition)?;
    if observations.is_empty() {
        let path = definition.path.display();
        return Err(format!("no observations loaded from {path}").into());
    }

    let labels: Vec<&str> = Analysis::ALL.iter().map(Analysis::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Analysis::ALL[idx] {
        Analysis::Estimate => {
            let category = pick("Category", &distinct_categories(&observations))?;
            let statistic = pick("Statistic", &distinct_statistics(&observations))?;
            let family = pick_family()?;
            let min_period = optional_input("Ignore periods before (empty for none)")?;
            crate::run_estimate(
                &observations,
                &category,
                &statistic,
                family.as_ref(),
                min_period,
                format,
            )?;
        }
        Analysis::Sweep => {
            let category = pick("Category", &distinct_categories(&observations))?;
            let statistic = pick("Statistic", &distinct_statistics(&observations))?;
            let families = pick_families()?;
            crate::run_sweep(
                multi,
                &observations,
                &category,
                &statistic,
                &families,
                format,
            )?;
        }
        Analysis::Scan => {
            let statistic = pick("Statistic", &distinct_statistics(&observations))?;
            let first_period: i32 = Input::new()
                .with_prompt("First period of the window")
                .default(default_first_period(&observations))
                .interact_text()?;
            let reference_period =
                optional_input("Reference period (empty for latest in window)")?;
            let max_p_value = optional_input("Maximum p-value (empty for no limit)")?;
            let min_reference_value =
                optional_input("Minimum reference value (empty for no limit)")?;

            crate::run_scan(
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
                format,
            )?;
        }
        Analysis::Changes => {
            let category = pick("Category", &distinct_categories(&observations))?;
            let statistic = pick("Statistic", &distinct_statistics(&observations))?;
            let reference_period =
                optional_input("Reference period (empty for year-over-year)")?;
            crate::run_changes(
                &observations,
                &category,
                &statistic,
                reference_period,
                format,
            )?;
        }
        Analysis::Categories => crate::run_categories(&observations, format)?,
    }

    Ok(())
}

/// Asks for a `.toml` source definition or a CSV export and a region.
fn prompt_definition() -> Result<SourceDefinition, Box<dyn std::error::Error>> {
    let path: String = Input::new()
        .with_prompt("Source definition (.toml) or CSV export")
        .interact_text()?;
    let path = path.trim();

    let mut definition = if path.ends_with(".toml") {
        load_definition(Path::new(path))?
    } else {
        SourceDefinition::from_csv_path(path, None)
    };

    let region: String = Input::new()
        .with_prompt("Region (empty to keep the definition's)")
        .allow_empty(true)
        .interact_text()?;
    if !region.trim().is_empty() {
        definition.region = Some(region.trim().to_string());
    }

    Ok(definition)
}

fn pick(prompt: &str, items: &[String]) -> Result<String, Box<dyn std::error::Error>> {
    if items.is_empty() {
        return Err(format!("nothing to choose for '{prompt}'").into());
    }

    let idx = Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .max_length(20)
        .interact()?;

    Ok(items[idx].clone())
}

fn pick_family() -> Result<TrendFamily, Box<dyn std::error::Error>> {
    let families = TrendFamily::all();
    let labels: Vec<&str> = families.iter().map(AsRef::as_ref).collect();

    let idx = Select::new()
        .with_prompt("Regression family")
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(families[idx])
}

fn pick_families() -> Result<Vec<TrendFamily>, Box<dyn std::error::Error>> {
    let families = TrendFamily::all();
    let labels: Vec<&str> = families.iter().map(AsRef::as_ref).collect();
    let defaults = vec![true; families.len()];

    let selected = MultiSelect::new()
        .with_prompt("Families to fit (space=toggle, a=all, enter=confirm)")
        .items(&labels)
        .defaults(&defaults)
        .interact()?;

    Ok(selected.into_iter().map(|idx| families[idx]).collect())
}

/// Reads an optional value; an empty answer is `None`.
fn optional_input<T>(prompt: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::error::Error + 'static,
{
    let answer: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    let answer = answer.trim();

    if answer.is_empty() {
        Ok(None)
    } else {
        Ok(Some(answer.parse()?))
    }
}

/// Start of a ten-period window ending at the latest period.
fn default_first_period(observations: &[Observation]) -> i32 {
    observations
        .iter()
        .map(|o| o.period)
        .max()
        .map_or(0, |latest| latest.saturating_sub(9))
}
