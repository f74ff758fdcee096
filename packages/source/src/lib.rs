#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Loading of tidy crime-statistics tables.
//!
//! Reads a local CSV export (one row per period, region, category and
//! statistic) into [`Observation`]s for a single region. Fetching and
//! unpacking the export is left to the caller.

pub mod parsing;
pub mod source_def;

use std::collections::BTreeSet;
use std::io::Read;

use crime_trends_crime_models::Observation;

use crate::parsing::{is_missing_marker, normalize_header, parse_period, parse_value};
use crate::source_def::SourceDefinition;

/// Errors that can occur while loading observations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Source definition TOML is invalid.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configured column is not in the header row.
    #[error("Column '{column}' not found in header")]
    MissingColumn {
        /// Configured column name.
        column: String,
    },

    /// A period cell does not start with a four-digit year.
    #[error("Invalid period '{value}' on line {line}")]
    InvalidPeriod {
        /// 1-based line number.
        line: u64,
        /// Raw cell text.
        value: String,
    },

    /// A value cell is neither a number nor a missing marker.
    #[error("Invalid value '{value}' on line {line}")]
    InvalidValue {
        /// 1-based line number.
        line: u64,
        /// Raw cell text.
        value: String,
    },

    /// The same `(period, category, statistic)` triple appears twice.
    #[error("Duplicate observation for {period} / '{category}' / '{statistic}'")]
    DuplicateObservation {
        /// Period of the repeated triple.
        period: i32,
        /// Category of the repeated triple.
        category: String,
        /// Statistic of the repeated triple.
        statistic: String,
    },
}

/// Column positions resolved from the header row.
struct Columns {
    period: usize,
    region: Option<usize>,
    category: usize,
    statistic: usize,
    value: usize,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord, def: &SourceDefinition) -> Result<Self, SourceError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| normalize_header(h) == name)
                .ok_or_else(|| SourceError::MissingColumn {
                    column: name.to_string(),
                })
        };

        Ok(Self {
            period: find(&def.fields.period)?,
            region: def
                .region
                .as_ref()
                .map(|_| find(&def.fields.region))
                .transpose()?,
            category: find(&def.fields.category)?,
            statistic: find(&def.fields.statistic)?,
            value: find(&def.fields.value)?,
        })
    }
}

/// Loads the observations described by `def` from disk.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be opened or any row fails
/// to parse.
pub fn load_observations(def: &SourceDefinition) -> Result<Vec<Observation>, SourceError> {
    log::info!("[{}] Reading {}", def.id, def.path.display());
    let file = std::fs::File::open(&def.path)?;
    read_observations(file, def)
}

/// Reads observations from any CSV reader using the columns in `def`.
///
/// Rows outside `def.region` are skipped. Missing-value markers become
/// observations with `value: None`.
///
/// # Errors
///
/// Returns [`SourceError`] if a column is missing, a cell cannot be parsed,
/// or a `(period, category, statistic)` triple repeats.
pub fn read_observations<R: Read>(
    reader: R,
    def: &SourceDefinition,
) -> Result<Vec<Observation>, SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(def.delimiter_byte())
        .from_reader(reader);

    let columns = Columns::resolve(csv_reader.headers()?, def)?;

    let mut seen = BTreeSet::new();
    let mut observations = Vec::new();
    let mut skipped: u64 = 0;

    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map_or(0, csv::Position::line);
        let cell = |idx: usize| record.get(idx).unwrap_or_default();

        if let (Some(region), Some(idx)) = (def.region.as_deref(), columns.region)
            && cell(idx).trim() != region
        {
            skipped += 1;
            continue;
        }

        let raw_period = cell(columns.period);
        let period = parse_period(raw_period).ok_or_else(|| SourceError::InvalidPeriod {
            line,
            value: raw_period.to_string(),
        })?;

        let raw_value = cell(columns.value);
        let value = if is_missing_marker(raw_value) {
            None
        } else {
            Some(parse_value(raw_value).ok_or_else(|| SourceError::InvalidValue {
                line,
                value: raw_value.to_string(),
            })?)
        };

        let category = cell(columns.category).trim().to_string();
        let statistic = cell(columns.statistic).trim().to_string();

        if !seen.insert((period, category.clone(), statistic.clone())) {
            return Err(SourceError::DuplicateObservation {
                period,
                category,
                statistic,
            });
        }

        observations.push(Observation {
            period,
            category,
            statistic,
            value,
        });
    }

    log::info!(
        "[{}] Loaded {} observations ({skipped} rows outside region skipped)",
        def.id,
        observations.len()
    );

    Ok(observations)
}
