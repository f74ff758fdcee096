#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Trend family definitions and trend analysis result types.
//!
//! A [`TrendFamily`] binds an error distribution to a link function at
//! compile time. The remaining types are the plain tabular rows produced by
//! the trend estimator and the category scanner and handed to whatever
//! renders charts or reports.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Error distribution of a generalized linear model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorDistribution {
    /// Normal errors, constant variance.
    Gaussian,
    /// Gamma errors, variance proportional to `mu^2`.
    Gamma,
    /// Inverse-Gaussian errors, variance proportional to `mu^3`.
    InverseGaussian,
    /// Poisson errors, variance equal to `mu`.
    Poisson,
}

/// Link between the linear predictor and the expected response.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LinkFunction {
    /// `eta = mu`
    Identity,
    /// `eta = ln(mu)`
    Log,
}

/// Regression family used to fit a trend.
///
/// String forms (`log-gamma`, `linear`, ...) are only accepted at the
/// boundary through [`TrendFamily::parse`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TrendFamily {
    /// Gamma errors, log link.
    LogGamma,
    /// Gaussian errors, log link.
    LogNormal,
    /// Inverse-Gaussian errors, log link.
    LogInverseGaussian,
    /// Gaussian errors, identity link (ordinary least squares).
    Linear,
    /// Poisson errors, log link. Intended for counts.
    LogPoisson,
}

impl TrendFamily {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::LogGamma,
            Self::LogNormal,
            Self::LogInverseGaussian,
            Self::Linear,
            Self::LogPoisson,
        ]
    }

    /// Parses a family name such as `"log-gamma"`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFamilyError`] naming the allowed set if `name` is
    /// not a known family.
    pub fn parse(name: &str) -> Result<Self, InvalidFamilyError> {
        name.trim()
            .parse::<Self>()
            .map_err(|_| InvalidFamilyError {
                value: name.to_string(),
            })
    }

    /// Error distribution bound to this family.
    #[must_use]
    pub const fn distribution(self) -> ErrorDistribution {
        match self {
            Self::LogGamma => ErrorDistribution::Gamma,
            Self::LogNormal | Self::Linear => ErrorDistribution::Gaussian,
            Self::LogInverseGaussian => ErrorDistribution::InverseGaussian,
            Self::LogPoisson => ErrorDistribution::Poisson,
        }
    }

    /// Link function bound to this family.
    #[must_use]
    pub const fn link(self) -> LinkFunction {
        match self {
            Self::Linear => LinkFunction::Identity,
            Self::LogGamma | Self::LogNormal | Self::LogInverseGaussian | Self::LogPoisson => {
                LinkFunction::Log
            }
        }
    }

    /// Whether the fitted slope is a log-scale growth rate reported as a
    /// percentage rather than a raw additive slope.
    #[must_use]
    pub const fn is_multiplicative(self) -> bool {
        matches!(self.link(), LinkFunction::Log)
    }
}

/// Error returned when a family name is not one of [`TrendFamily::all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFamilyError {
    /// The rejected name.
    pub value: String,
}

impl std::fmt::Display for InvalidFamilyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let allowed: Vec<&str> = TrendFamily::all().iter().map(AsRef::as_ref).collect();
        write!(
            f,
            "unknown trend family '{}': expected one of {}",
            self.value,
            allowed.join(", ")
        )
    }
}

impl std::error::Error for InvalidFamilyError {}

/// Reason a single regression fit could not produce a slope and standard
/// error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FitFailure {
    /// Predictor and response lengths differ.
    #[error("predictor has {x} values but response has {y}")]
    MismatchedLengths {
        /// Predictor length.
        x: usize,
        /// Response length.
        y: usize,
    },

    /// Too few points to estimate a slope and its standard error.
    #[error("{observations} observations is too few to estimate a slope and its standard error")]
    InsufficientData {
        /// Points available to the fit.
        observations: usize,
    },

    /// The predictor has no spread, so the design matrix is singular.
    #[error("design matrix is singular (predictor has zero variance)")]
    SingularDesign,

    /// The response is constant.
    #[error("response has zero variance")]
    ConstantResponse,

    /// A log-link family received a zero or negative response.
    #[error("log link requires positive responses, found {value}")]
    NonPositiveResponse {
        /// The offending value.
        value: f64,
    },

    /// An input value is NaN or infinite.
    #[error("input contains non-finite values")]
    NonFiniteInput,

    /// IRLS did not reach the deviance tolerance.
    #[error("fit did not converge within {iterations} iterations")]
    NonConvergence {
        /// Iterations performed.
        iterations: u32,
    },

    /// The fitted mean or weights became non-finite during iteration.
    #[error("numerical breakdown at iteration {iteration}")]
    NumericalBreakdown {
        /// Iteration at which the breakdown was detected.
        iteration: u32,
    },
}

/// Trend fitted on the suffix of a series starting at `start_period`.
///
/// For multiplicative families the values are percentages per period; for
/// [`TrendFamily::Linear`] they are raw slopes. All three value fields are
/// `NaN` when `failure` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendEstimate {
    /// Earliest period included in the fit.
    pub start_period: i32,
    /// Number of points the fit used.
    pub observations: usize,
    /// Fitted trend.
    pub point_estimate: f64,
    /// Lower end of the approximate 95% interval.
    pub lower_bound: f64,
    /// Upper end of the approximate 95% interval.
    pub upper_bound: f64,
    /// Why this window could not be fit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FitFailure>,
}

impl TrendEstimate {
    /// A row for a window whose fit failed.
    #[must_use]
    pub const fn failed(start_period: i32, observations: usize, failure: FitFailure) -> Self {
        Self {
            start_period,
            observations,
            point_estimate: f64::NAN,
            lower_bound: f64::NAN,
            upper_bound: f64::NAN,
            failure: Some(failure),
        }
    }

    /// Whether the row carries fitted values.
    #[must_use]
    pub const fn is_defined(&self) -> bool {
        self.failure.is_none()
    }
}

/// The trend curve for one family, used to compare distributional
/// assumptions side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyTrendCurve {
    /// Family the curve was fit with.
    pub family: TrendFamily,
    /// One row per candidate start period.
    pub estimates: Vec<TrendEstimate>,
}

/// Parameters for a fixed-window scan across categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanParams {
    /// Earliest period to include.
    pub first_period: i32,
    /// Statistic label to select.
    pub statistic: String,
    /// Period whose value is reported as `reference_value`. Defaults to the
    /// latest period in the window.
    #[serde(default)]
    pub reference_period: Option<i32>,
}

/// Log-gamma trend for one category over the scan window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Violation label.
    pub category: String,
    /// `exp(slope)`: 1.05 means +5% per period.
    pub multiplicative_trend: f64,
    /// Value at the reference period.
    pub reference_value: Option<f64>,
    /// Two-sided p-value of the slope.
    pub p_value: f64,
}

/// Post-scan thresholds. Unset thresholds keep everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFilter {
    /// Keep rows with `p_value <= max_p_value`.
    #[serde(default)]
    pub max_p_value: Option<f64>,
    /// Keep rows with `reference_value >= min_reference_value`.
    #[serde(default)]
    pub min_reference_value: Option<f64>,
}

/// Change of a value against the immediately preceding period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodChange {
    /// Reference year.
    pub period: i32,
    /// Value at `period`.
    pub value: f64,
    /// Value at `period - 1`, `None` when that period is absent.
    pub previous_value: Option<f64>,
    /// `value - previous_value`.
    pub change: Option<f64>,
    /// Percentage change, `None` when the previous value is absent or zero.
    pub percent_change: Option<f64>,
}

/// Change of a value relative to a fixed reference period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceChange {
    /// Reference year of this row.
    pub period: i32,
    /// Value at `period`.
    pub value: f64,
    /// Value at the reference period.
    pub reference_value: f64,
    /// `(value / reference_value - 1) * 100`.
    pub percent_change: f64,
}
