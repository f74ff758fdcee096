//! Config-driven description of a tidy statistics table.
//!
//! A [`SourceDefinition`] names the file to read, the region to keep and
//! which columns hold the period, category, statistic and value. The
//! defaults match the column headers of the Statistics Canada
//! police-reported crime tables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::SourceError;

/// A local table of observations and how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier (e.g., `"statcan_35100177"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Path to the CSV file. Relative paths in a TOML file are resolved
    /// against the directory holding that file by [`load_definition`].
    pub path: PathBuf,
    /// Keep only rows whose region column equals this value.
    #[serde(default)]
    pub region: Option<String>,
    /// Field delimiter (default: comma).
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Column names.
    #[serde(default)]
    pub fields: FieldMapping,
}

impl SourceDefinition {
    /// A definition for a CSV file with the default column names.
    #[must_use]
    pub fn from_csv_path(path: impl Into<PathBuf>, region: Option<String>) -> Self {
        let path = path.into();
        let id = path
            .file_stem()
            .map_or_else(|| "input".to_string(), |s| s.to_string_lossy().into_owned());
        Self {
            name: id.clone(),
            id,
            path,
            region,
            delimiter: None,
            fields: FieldMapping::default(),
        }
    }

    /// Delimiter byte, falling back to a comma.
    #[must_use]
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter
            .as_deref()
            .and_then(|d| d.as_bytes().first().copied())
            .unwrap_or(b',')
    }
}

/// Column names in the source table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    /// Reference period column.
    pub period: String,
    /// Geography column, used with [`SourceDefinition::region`].
    pub region: String,
    /// Violation category column.
    pub category: String,
    /// Statistic label column.
    pub statistic: String,
    /// Value column.
    pub value: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            period: "REF_DATE".to_string(),
            region: "GEO".to_string(),
            category: "Violations".to_string(),
            statistic: "Statistics".to_string(),
            value: "VALUE".to_string(),
        }
    }
}

/// Parses a [`SourceDefinition`] from a TOML string.
///
/// # Errors
///
/// Returns [`SourceError::Toml`] if the TOML is malformed or missing
/// required fields.
pub fn parse_definition(toml_str: &str) -> Result<SourceDefinition, SourceError> {
    Ok(toml::de::from_str(toml_str)?)
}

/// Reads a [`SourceDefinition`] from a TOML file, resolving a relative
/// `path` against the file's directory.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be read or parsed.
pub fn load_definition(toml_path: &Path) -> Result<SourceDefinition, SourceError> {
    let contents = std::fs::read_to_string(toml_path)?;
    let mut definition = parse_definition(&contents)?;

    if definition.path.is_relative()
        && let Some(dir) = toml_path.parent()
    {
        definition.path = dir.join(&definition.path);
    }

    log::debug!(
        "Loaded source definition '{}' from {}",
        definition.id,
        toml_path.display()
    );

    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_definition_with_defaults() {
        let def = parse_definition(
            r#"
            id = "statcan"
            name = "Incident-based crime statistics"
            path = "35100177.csv"
            region = "British Columbia [59]"
            "#,
        )
        .unwrap();

        assert_eq!(def.id, "statcan");
        assert_eq!(def.region.as_deref(), Some("British Columbia [59]"));
        assert_eq!(def.fields, FieldMapping::default());
        assert_eq!(def.delimiter_byte(), b',');
    }

    #[test]
    fn parses_custom_fields() {
        let def = parse_definition(
            r#"
            id = "custom"
            name = "Custom"
            path = "data.tsv"
            delimiter = "\t"

            [fields]
            period = "year"
            category = "offence"
            "#,
        )
        .unwrap();

        assert_eq!(def.fields.period, "year");
        assert_eq!(def.fields.category, "offence");
        assert_eq!(def.fields.value, "VALUE");
        assert_eq!(def.delimiter_byte(), b'\t');
    }

    #[test]
    fn rejects_missing_path() {
        let err = parse_definition("id = \"x\"\nname = \"x\"").unwrap_err();
        assert!(matches!(err, SourceError::Toml(_)));
    }

    #[test]
    fn csv_path_definition_uses_file_stem() {
        let def = SourceDefinition::from_csv_path("data/35100177.csv", None);
        assert_eq!(def.id, "35100177");
        assert_eq!(def.region, None);
    }
}
