#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Single-predictor generalized linear model fitting.
//!
//! The trend analyses only ever regress a value on its period, so the
//! engine here is specialised to a design matrix of `[1, x]`. Fitting is
//! done by iteratively reweighted least squares ([`Irls`]) and exposed
//! through the [`RegressionEngine`] trait so callers can inject a
//! different implementation.

mod family;
pub mod irls;

use crime_trends_analytics_models::{ErrorDistribution, FitFailure, LinkFunction};

pub use irls::Irls;

/// Result of fitting `g(E[y]) = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlmFit {
    /// Intercept on the link scale.
    pub intercept: f64,
    /// Slope on the link scale.
    pub slope: f64,
    /// Standard error of the slope.
    pub slope_std_error: f64,
    /// Wald statistic `slope / slope_std_error` (a t statistic when the
    /// dispersion is estimated).
    pub z_statistic: f64,
    /// Two-sided p-value of the slope: Student t on `n - 2` degrees of
    /// freedom for estimated dispersion, standard normal for Poisson.
    pub p_value: f64,
    /// Dispersion used for the covariance (1 for Poisson).
    pub scale: f64,
    /// Residual deviance at convergence.
    pub deviance: f64,
    /// IRLS iterations performed.
    pub iterations: u32,
    /// Number of points fit.
    pub observations: usize,
}

/// A capability that fits a one-predictor GLM.
pub trait RegressionEngine {
    /// Fits `y` on `x` under the given error distribution and link.
    ///
    /// # Errors
    ///
    /// Returns [`FitFailure`] if the data cannot support a slope and its
    /// standard error or the fit does not converge.
    fn fit(
        &self,
        x: &[f64],
        y: &[f64],
        distribution: ErrorDistribution,
        link: LinkFunction,
    ) -> Result<GlmFit, FitFailure>;
}

impl<T: RegressionEngine + ?Sized> RegressionEngine for &T {
    fn fit(
        &self,
        x: &[f64],
        y: &[f64],
        distribution: ErrorDistribution,
        link: LinkFunction,
    ) -> Result<GlmFit, FitFailure> {
        (**self).fit(x, y, distribution, link)
    }
}
