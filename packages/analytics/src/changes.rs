//! Year-over-year and reference-year changes.
//!
//! A missing previous year is reported as `None` instead of being treated
//! as zero, so gaps in a series never turn into spurious changes.

use crime_trends_analytics_models::{PeriodChange, ReferenceChange};
use crime_trends_crime_models::Series;

use crate::AnalyticsError;

/// Change of each point against the immediately preceding period.
#[must_use]
pub fn period_changes(series: &Series) -> Vec<PeriodChange> {
    series
        .points()
        .iter()
        .map(|point| {
            let previous_value = point
                .period
                .checked_sub(1)
                .and_then(|prev| series.value_at(prev));
            let change = previous_value.map(|prev| point.value - prev);
            let percent_change = previous_value
                .filter(|prev| *prev != 0.0)
                .map(|prev| (point.value / prev - 1.0) * 100.0);

            PeriodChange {
                period: point.period,
                value: point.value,
                previous_value,
                change,
                percent_change,
            }
        })
        .collect()
}

/// Percent change of each point relative to the value at
/// `reference_period`.
///
/// # Errors
///
/// Returns [`AnalyticsError::MissingReference`] if the series has no value
/// at `reference_period` or that value is zero.
pub fn reference_changes(
    series: &Series,
    reference_period: i32,
) -> Result<Vec<ReferenceChange>, AnalyticsError> {
    let reference_value = series
        .value_at(reference_period)
        .filter(|v| *v != 0.0)
        .ok_or(AnalyticsError::MissingReference {
            period: reference_period,
        })?;

    Ok(series
        .points()
        .iter()
        .map(|point| ReferenceChange {
            period: point.period,
            value: point.value,
            reference_value,
            percent_change: (point.value / reference_value - 1.0) * 100.0,
        })
        .collect())
}
