#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Crime statistic observation and time-series types.
//!
//! An [`Observation`] is one cell of a published crime-statistics table:
//! a yearly value for a violation category under a named statistic (for
//! example "Rate per 100,000 population"). A [`Series`] is the univariate
//! `(period, value)` projection of those observations for one category
//! and statistic, which is what the trend analyses consume.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One published value for a `(period, category, statistic)` triple.
///
/// Within a dataset there is at most one observation per triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Reference year.
    pub period: i32,
    /// Violation label (e.g. "Total robbery").
    pub category: String,
    /// Statistic label (e.g. "Actual incidents").
    pub statistic: String,
    /// Published value, `None` when suppressed or not available.
    pub value: Option<f64>,
}

impl Observation {
    /// Creates an observation with a present value.
    #[must_use]
    pub fn new(
        period: i32,
        category: impl Into<String>,
        statistic: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            period,
            category: category.into(),
            statistic: statistic.into(),
            value: Some(value),
        }
    }

    /// Creates an observation whose value is missing.
    #[must_use]
    pub fn missing(
        period: i32,
        category: impl Into<String>,
        statistic: impl Into<String>,
    ) -> Self {
        Self {
            period,
            category: category.into(),
            statistic: statistic.into(),
            value: None,
        }
    }
}

/// Returns the sorted, de-duplicated category labels in `observations`.
#[must_use]
pub fn distinct_categories(observations: &[Observation]) -> Vec<String> {
    observations
        .iter()
        .map(|o| o.category.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Returns the sorted, de-duplicated statistic labels in `observations`.
#[must_use]
pub fn distinct_statistics(observations: &[Observation]) -> Vec<String> {
    observations
        .iter()
        .map(|o| o.statistic.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// A single `(period, value)` point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    /// Reference year.
    pub period: i32,
    /// Observed value.
    pub value: f64,
}

/// Errors raised while building a [`Series`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    /// Two points share the same period.
    #[error("duplicate period {period} in series")]
    DuplicatePeriod {
        /// The repeated period.
        period: i32,
    },

    /// A value is NaN or infinite.
    #[error("non-finite value {value} at period {period}")]
    NonFiniteValue {
        /// Period of the offending point.
        period: i32,
        /// The offending value.
        value: f64,
    },
}

/// A univariate yearly series, ordered by period with unique periods.
///
/// Periods need not be contiguous.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    points: Vec<SeriesPoint>,
}

impl Series {
    /// Builds a series from points in any order.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError`] if a period appears twice or a value is not
    /// finite.
    pub fn new(mut points: Vec<SeriesPoint>) -> Result<Self, SeriesError> {
        points.sort_by_key(|p| p.period);

        for pair in points.windows(2) {
            if pair[0].period == pair[1].period {
                return Err(SeriesError::DuplicatePeriod {
                    period: pair[0].period,
                });
            }
        }

        if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(SeriesError::NonFiniteValue {
                period: bad.period,
                value: bad.value,
            });
        }

        Ok(Self { points })
    }

    /// Convenience constructor from `(period, value)` tuples.
    ///
    /// # Errors
    ///
    /// See [`Series::new`].
    pub fn from_pairs(pairs: &[(i32, f64)]) -> Result<Self, SeriesError> {
        Self::new(
            pairs
                .iter()
                .map(|&(period, value)| SeriesPoint { period, value })
                .collect(),
        )
    }

    /// Projects the observations for one category and statistic into a
    /// series. Observations with a missing value are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError`] if the selected observations repeat a
    /// period or hold a non-finite value.
    pub fn from_observations(
        observations: &[Observation],
        category: &str,
        statistic: &str,
    ) -> Result<Self, SeriesError> {
        Self::new(
            observations
                .iter()
                .filter(|o| o.category == category && o.statistic == statistic)
                .filter_map(|o| {
                    o.value.map(|value| SeriesPoint {
                        period: o.period,
                        value,
                    })
                })
                .collect(),
        )
    }

    /// Points in increasing period order.
    #[must_use]
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    /// Number of points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Earliest period, if any.
    #[must_use]
    pub fn min_period(&self) -> Option<i32> {
        self.points.first().map(|p| p.period)
    }

    /// Latest period, if any.
    #[must_use]
    pub fn max_period(&self) -> Option<i32> {
        self.points.last().map(|p| p.period)
    }

    /// The suffix of points with `period >= start`.
    #[must_use]
    pub fn since(&self, start: i32) -> &[SeriesPoint] {
        let idx = self.points.partition_point(|p| p.period < start);
        &self.points[idx..]
    }

    /// Value recorded at `period`, if present.
    #[must_use]
    pub fn value_at(&self, period: i32) -> Option<f64> {
        self.points
            .binary_search_by_key(&period, |p| p.period)
            .ok()
            .map(|idx| self.points[idx].value)
    }
}
