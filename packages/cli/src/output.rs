//! Rendering of result rows as aligned tables, CSV or JSON.

use clap::ValueEnum;
use crime_trends_analytics_models::{
    PeriodChange, ReferenceChange, ScanResult, TrendEstimate, TrendFamily,
};
use serde::Serialize;

/// Output format for result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns for terminals (default)
    Table,
    /// Pretty-printed JSON array
    Json,
    /// CSV with a header row
    Csv,
}

/// A result row that can be laid out as columns.
pub trait TableRow {
    /// Column headers, in cell order.
    fn headers() -> &'static [&'static str];

    /// Formatted cells for this row.
    fn cells(&self) -> Vec<String>;
}

/// One row of a family sweep: the family next to its estimate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyEstimate {
    pub family: TrendFamily,
    #[serde(flatten)]
    pub estimate: TrendEstimate,
}

/// A label found in the loaded table.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRow {
    pub kind: &'static str,
    pub label: String,
}

fn number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{value:.4}")
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(number).unwrap_or_default()
}

impl TableRow for TrendEstimate {
    fn headers() -> &'static [&'static str] {
        &["START", "N", "ESTIMATE", "LOWER", "UPPER", "FAILURE"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.start_period.to_string(),
            self.observations.to_string(),
            number(self.point_estimate),
            number(self.lower_bound),
            number(self.upper_bound),
            self.failure
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        ]
    }
}

impl TableRow for FamilyEstimate {
    fn headers() -> &'static [&'static str] {
        &[
            "FAMILY", "START", "N", "ESTIMATE", "LOWER", "UPPER", "FAILURE",
        ]
    }

    fn cells(&self) -> Vec<String> {
        let mut cells = vec![self.family.to_string()];
        cells.extend(self.estimate.cells());
        cells
    }
}

impl TableRow for ScanResult {
    fn headers() -> &'static [&'static str] {
        &["CATEGORY", "TREND", "REFERENCE", "P-VALUE"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.category.clone(),
            number(self.multiplicative_trend),
            optional(self.reference_value),
            format!("{:.3e}", self.p_value),
        ]
    }
}

impl TableRow for PeriodChange {
    fn headers() -> &'static [&'static str] {
        &["PERIOD", "VALUE", "PREVIOUS", "CHANGE", "PERCENT"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.period.to_string(),
            number(self.value),
            optional(self.previous_value),
            optional(self.change),
            optional(self.percent_change),
        ]
    }
}

impl TableRow for ReferenceChange {
    fn headers() -> &'static [&'static str] {
        &["PERIOD", "VALUE", "REFERENCE", "PERCENT"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.period.to_string(),
            number(self.value),
            number(self.reference_value),
            number(self.percent_change),
        ]
    }
}

impl TableRow for LabelRow {
    fn headers() -> &'static [&'static str] {
        &["KIND", "LABEL"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.kind.to_string(), self.label.clone()]
    }
}

/// Renders `rows` in the requested format.
///
/// # Errors
///
/// Returns an error if CSV or JSON serialization fails.
pub fn render<T: TableRow + Serialize>(
    rows: &[T],
    format: OutputFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Table => Ok(render_table(rows)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(rows)?),
        OutputFormat::Csv => render_csv(rows),
    }
}

fn render_table<T: TableRow>(rows: &[T]) -> String {
    let headers = T::headers();
    let cells: Vec<Vec<String>> = rows.iter().map(TableRow::cells).collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |row: &[String]| {
        row.iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header: Vec<String> = headers.iter().map(ToString::to_string).collect();
    let total_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);

    let mut out = vec![line(&header), "-".repeat(total_width)];
    out.extend(cells.iter().map(|row| line(row)));
    out.join("\n")
}

fn render_csv<T: TableRow>(rows: &[T]) -> Result<String, Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(T::headers())?;
    for row in rows {
        writer.write_record(row.cells())?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}
