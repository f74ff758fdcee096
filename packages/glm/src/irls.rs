//! Iteratively reweighted least squares for a `[1, x]` design.
//!
//! The predictor is centred before fitting so that large period values
//! (e.g. 2009..2021) do not make the normal equations ill-conditioned.
//! Centring moves the intercept but leaves the slope and its standard
//! error unchanged; the reported intercept is shifted back afterwards.
//!
//! Conventions follow the usual exponential-family setup:
//! - working response `z = eta + (y - mu) g'(mu)`
//! - weights `w = 1 / (g'(mu)^2 V(mu))`
//! - dispersion is Pearson chi-square over `n - 2`, except Poisson which
//!   is fixed at 1.
//! - the slope p-value is a Student t tail on `n - 2` degrees of freedom
//!   when the dispersion is estimated, and a standard normal tail for
//!   Poisson.

use crime_trends_analytics_models::{ErrorDistribution, FitFailure, LinkFunction};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::erf::erfc;

use crate::family::{Link as _, Variance as _};
use crate::{GlmFit, RegressionEngine};

/// Fewest points that leave a residual degree of freedom for the
/// dispersion estimate.
pub const MIN_OBSERVATIONS: usize = 3;

/// IRLS fitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Irls {
    /// Iteration cap.
    pub max_iterations: u32,
    /// Deviance tolerance, relative to `1 + |deviance|`.
    pub tolerance: f64,
}

impl Default for Irls {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
        }
    }
}

/// Weighted sums of the centred normal equations.
struct NormalEquations {
    sw: f64,
    swx: f64,
    det: f64,
}

impl NormalEquations {
    fn accumulate(xc: &[f64], w: &[f64]) -> Result<Self, FitFailure> {
        let (mut sw, mut swx, mut swxx) = (0.0, 0.0, 0.0);
        for (&x, &w) in xc.iter().zip(w) {
            sw += w;
            swx += w * x;
            swxx += w * x * x;
        }
        let det = sw.mul_add(swxx, -(swx * swx));

        if !det.is_finite() || det <= f64::EPSILON * sw * swxx {
            return Err(FitFailure::SingularDesign);
        }

        Ok(Self { sw, swx, det })
    }

    /// `[(X'WX)^-1]_{11}`, the slope entry of the unscaled covariance.
    fn slope_variance(&self) -> f64 {
        self.sw / self.det
    }
}

#[allow(clippy::float_cmp)]
fn validate(
    x: &[f64],
    y: &[f64],
    distribution: ErrorDistribution,
    link: LinkFunction,
) -> Result<(), FitFailure> {
    if x.len() != y.len() {
        return Err(FitFailure::MismatchedLengths {
            x: x.len(),
            y: y.len(),
        });
    }
    if x.len() < MIN_OBSERVATIONS {
        return Err(FitFailure::InsufficientData {
            observations: x.len(),
        });
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(FitFailure::NonFiniteInput);
    }
    if x.iter().all(|&v| v == x[0]) {
        return Err(FitFailure::SingularDesign);
    }
    if y.iter().all(|&v| v == y[0]) {
        return Err(FitFailure::ConstantResponse);
    }
    if (link == LinkFunction::Log || distribution.requires_positive_mean())
        && let Some(&value) = y.iter().find(|&&v| v <= 0.0)
    {
        return Err(FitFailure::NonPositiveResponse { value });
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn total_deviance(distribution: ErrorDistribution, y: &[f64], mu: &[f64]) -> f64 {
    y.iter()
        .zip(mu)
        .map(|(&y, &mu)| distribution.unit_deviance(y, mu))
        .sum()
}

fn weights(distribution: ErrorDistribution, link: LinkFunction, mu: &[f64]) -> Vec<f64> {
    mu.iter()
        .map(|&m| 1.0 / (link.derivative(m).powi(2) * distribution.variance(m)))
        .collect()
}

fn mean_is_valid(distribution: ErrorDistribution, mu: &[f64]) -> bool {
    mu.iter()
        .all(|&m| m.is_finite() && (!distribution.requires_positive_mean() || m > 0.0))
}

/// Two-sided tail probability of `statistic`: Student t with
/// `residual_df` degrees of freedom, or standard normal when `None`.
fn two_sided_p_value(statistic: f64, residual_df: Option<f64>) -> Option<f64> {
    let magnitude = statistic.abs();
    match residual_df {
        None => Some(erfc(magnitude / std::f64::consts::SQRT_2)),
        Some(df) => {
            let t = StudentsT::new(0.0, 1.0, df).ok()?;
            Some((2.0 * t.sf(magnitude)).min(1.0))
        }
    }
}

impl RegressionEngine for Irls {
    #[allow(clippy::cast_precision_loss)]
    fn fit(
        &self,
        x: &[f64],
        y: &[f64],
        distribution: ErrorDistribution,
        link: LinkFunction,
    ) -> Result<GlmFit, FitFailure> {
        validate(x, y, distribution, link)?;

        let n = x.len();
        let x_mean = mean(x);
        let xc: Vec<f64> = x.iter().map(|v| v - x_mean).collect();

        let y_mean = mean(y);
        let mut mu: Vec<f64> = y.iter().map(|v| (v + y_mean) / 2.0).collect();
        let mut eta: Vec<f64> = mu.iter().map(|&m| link.link(m)).collect();
        let mut deviance = total_deviance(distribution, y, &mu);

        let mut b0 = 0.0;
        let mut b1 = 0.0;
        let mut converged_at = None;

        for iteration in 1..=self.max_iterations {
            let w = weights(distribution, link, &mu);
            if w.iter().any(|v| !v.is_finite()) {
                return Err(FitFailure::NumericalBreakdown { iteration });
            }
            let z: Vec<f64> = (0..n)
                .map(|i| (y[i] - mu[i]).mul_add(link.derivative(mu[i]), eta[i]))
                .collect();

            let eq = NormalEquations::accumulate(&xc, &w)?;
            let (mut swz, mut swxz) = (0.0, 0.0);
            for ((&w, &x), &z) in w.iter().zip(&xc).zip(&z) {
                swz += w * z;
                swxz += w * x * z;
            }
            b1 = eq.sw.mul_add(swxz, -(eq.swx * swz)) / eq.det;
            b0 = b1.mul_add(-eq.swx, swz) / eq.sw;

            for ((eta, mu), &x) in eta.iter_mut().zip(mu.iter_mut()).zip(&xc) {
                *eta = b1.mul_add(x, b0);
                *mu = link.inverse(*eta);
            }
            if !mean_is_valid(distribution, &mu) {
                return Err(FitFailure::NumericalBreakdown { iteration });
            }

            let previous = deviance;
            deviance = total_deviance(distribution, y, &mu);
            if !deviance.is_finite() {
                return Err(FitFailure::NumericalBreakdown { iteration });
            }
            if (deviance - previous).abs() <= self.tolerance * (1.0 + deviance.abs()) {
                converged_at = Some(iteration);
                break;
            }
        }

        let Some(iterations) = converged_at else {
            return Err(FitFailure::NonConvergence {
                iterations: self.max_iterations,
            });
        };

        let eq = NormalEquations::accumulate(&xc, &weights(distribution, link, &mu))?;
        log::trace!(
            "IRLS {distribution}/{link} converged in {iterations} iterations (deviance {deviance:.6})"
        );

        let scale = match distribution {
            ErrorDistribution::Poisson => 1.0,
            ErrorDistribution::Gaussian
            | ErrorDistribution::Gamma
            | ErrorDistribution::InverseGaussian => {
                let pearson: f64 = y
                    .iter()
                    .zip(&mu)
                    .map(|(&y, &m)| (y - m).powi(2) / distribution.variance(m))
                    .sum();
                pearson / (n - 2) as f64
            }
        };

        let slope_std_error = (scale * eq.slope_variance()).sqrt();
        if !slope_std_error.is_finite() {
            return Err(FitFailure::NumericalBreakdown { iteration: iterations });
        }
        let z_statistic = b1 / slope_std_error;
        let residual_df = match distribution {
            ErrorDistribution::Poisson => None,
            ErrorDistribution::Gaussian
            | ErrorDistribution::Gamma
            | ErrorDistribution::InverseGaussian => Some((n - 2) as f64),
        };
        let p_value = two_sided_p_value(z_statistic, residual_df)
            .ok_or(FitFailure::NumericalBreakdown { iteration: iterations })?;

        Ok(GlmFit {
            intercept: b1.mul_add(-x_mean, b0),
            slope: b1,
            slope_std_error,
            z_statistic,
            p_value,
            scale,
            deviance,
            iterations,
            observations: n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEARS: [f64; 5] = [2009.0, 2010.0, 2011.0, 2012.0, 2013.0];
    const VALUES: [f64; 5] = [10.0, 12.0, 9.0, 20.0, 25.0];

    fn fit(x: &[f64], y: &[f64], d: ErrorDistribution, l: LinkFunction) -> GlmFit {
        Irls::default().fit(x, y, d, l).unwrap()
    }

    /// Checks the score equations `sum (y - mu) / V(mu) * dmu/deta * [1, x] = 0`
    /// for a log-link fit.
    fn assert_log_link_score_is_zero(x: &[f64], y: &[f64], dist: ErrorDistribution) {
        let f = fit(x, y, dist, LinkFunction::Log);
        let (mut s0, mut s1) = (0.0, 0.0);
        let mut norm = 0.0;
        for (&xi, &yi) in x.iter().zip(y) {
            let mu = f.slope.mul_add(xi, f.intercept).exp();
            let xc = xi - 2011.0;
            let term = (yi - mu) / dist.variance(mu) * mu;
            s0 += term;
            s1 += term * xc;
            norm += (yi * mu / dist.variance(mu)).abs() * (1.0 + xc.abs());
        }
        assert!(s0.abs() < 1e-4 * norm, "{dist}: intercept score {s0}");
        assert!(s1.abs() < 1e-4 * norm, "{dist}: slope score {s1}");
    }

    #[test]
    fn linear_matches_ordinary_least_squares() {
        let f = fit(
            &YEARS,
            &VALUES,
            ErrorDistribution::Gaussian,
            LinkFunction::Identity,
        );
        assert!((f.slope - 3.8).abs() < 1e-9);
        assert!((f.slope_std_error - 1.68_f64.sqrt()).abs() < 1e-9);
        assert!((f.intercept - 3.8_f64.mul_add(-2011.0, 15.2)).abs() < 1e-6);
        assert!((f.scale - 16.8).abs() < 1e-9);
    }

    #[test]
    fn linear_on_suffix_matches_ordinary_least_squares() {
        let f = fit(
            &YEARS[1..],
            &VALUES[1..],
            ErrorDistribution::Gaussian,
            LinkFunction::Identity,
        );
        assert!((f.slope - 5.0).abs() < 1e-9);
        assert!((f.slope_std_error - 3.6_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn linear_accepts_negative_values() {
        let y = [-3.0, -1.0, 0.0, 2.5, 1.0];
        let f = fit(&YEARS, &y, ErrorDistribution::Gaussian, LinkFunction::Identity);
        assert!(f.slope > 0.0);
    }

    #[test]
    fn log_gamma_recovers_exact_growth() {
        let y: Vec<f64> = (0..5).map(|i| 10.0 * 1.1_f64.powi(i)).collect();
        let f = fit(&YEARS, &y, ErrorDistribution::Gamma, LinkFunction::Log);
        assert!((f.slope - 1.1_f64.ln()).abs() < 1e-6);
        assert!(f.slope_std_error < 1e-6);
    }

    #[test]
    fn log_link_fits_satisfy_score_equations() {
        for dist in [
            ErrorDistribution::Gaussian,
            ErrorDistribution::Gamma,
            ErrorDistribution::InverseGaussian,
            ErrorDistribution::Poisson,
        ] {
            assert_log_link_score_is_zero(&YEARS, &VALUES, dist);
        }
    }

    #[test]
    fn poisson_scale_is_fixed() {
        let f = fit(&YEARS, &VALUES, ErrorDistribution::Poisson, LinkFunction::Log);
        assert!((f.scale - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn estimated_dispersion_uses_student_t_tail() {
        // With 2 residual degrees of freedom the t tail has the closed form
        // `1 - |t| / sqrt(2 + t^2)`.
        let years = [2018.0, 2019.0, 2020.0, 2021.0];
        let values = [10.0, 12.0, 11.0, 15.0];
        let f = fit(&years, &values, ErrorDistribution::Gamma, LinkFunction::Log);

        let t = f.z_statistic.abs();
        let expected = 1.0 - t / (2.0 + t * t).sqrt();
        assert!((f.p_value - expected).abs() < 1e-9);
        assert!((f.z_statistic - 2.304).abs() < 1e-3);
        assert!((f.p_value - 0.1477).abs() < 1e-3);

        let normal_tail = erfc(t / std::f64::consts::SQRT_2);
        assert!(normal_tail < 0.05);
        assert!(f.p_value > 0.05);
    }

    #[test]
    fn poisson_uses_normal_tail() {
        let f = fit(&YEARS, &VALUES, ErrorDistribution::Poisson, LinkFunction::Log);
        assert!((0.0..=1.0).contains(&f.p_value));
        let expected = erfc(f.z_statistic.abs() / std::f64::consts::SQRT_2);
        assert!((f.p_value - expected).abs() < 1e-12);
    }

    #[test]
    fn weaker_trend_has_larger_p_value() {
        let strong = fit(&YEARS, &VALUES, ErrorDistribution::Gamma, LinkFunction::Log);
        let noisy = [10.0, 14.0, 9.0, 13.0, 10.5];
        let weak = fit(&YEARS, &noisy, ErrorDistribution::Gamma, LinkFunction::Log);
        assert!((0.0..=1.0).contains(&weak.p_value));
        assert!(weak.p_value > strong.p_value);
    }

    #[test]
    fn two_points_are_insufficient() {
        let err = Irls::default()
            .fit(
                &[2020.0, 2021.0],
                &[5.0, 6.0],
                ErrorDistribution::Gaussian,
                LinkFunction::Identity,
            )
            .unwrap_err();
        assert_eq!(err, FitFailure::InsufficientData { observations: 2 });
    }

    #[test]
    fn constant_predictor_is_singular() {
        let err = Irls::default()
            .fit(
                &[2020.0, 2020.0, 2020.0],
                &[1.0, 2.0, 3.0],
                ErrorDistribution::Gamma,
                LinkFunction::Log,
            )
            .unwrap_err();
        assert_eq!(err, FitFailure::SingularDesign);
    }

    #[test]
    fn constant_response_is_rejected() {
        let err = Irls::default()
            .fit(
                &YEARS,
                &[4.0; 5],
                ErrorDistribution::Gaussian,
                LinkFunction::Identity,
            )
            .unwrap_err();
        assert_eq!(err, FitFailure::ConstantResponse);
    }

    #[test]
    fn log_link_rejects_zero() {
        let err = Irls::default()
            .fit(
                &YEARS,
                &[3.0, 0.0, 4.0, 5.0, 6.0],
                ErrorDistribution::Gaussian,
                LinkFunction::Log,
            )
            .unwrap_err();
        assert_eq!(err, FitFailure::NonPositiveResponse { value: 0.0 });
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = Irls::default()
            .fit(
                &YEARS,
                &VALUES[..4],
                ErrorDistribution::Gaussian,
                LinkFunction::Identity,
            )
            .unwrap_err();
        assert_eq!(err, FitFailure::MismatchedLengths { x: 5, y: 4 });
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let err = Irls::default()
            .fit(
                &YEARS,
                &[1.0, 2.0, f64::INFINITY, 4.0, 5.0],
                ErrorDistribution::Gaussian,
                LinkFunction::Identity,
            )
            .unwrap_err();
        assert_eq!(err, FitFailure::NonFiniteInput);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let engine = Irls {
            max_iterations: 1,
            tolerance: 1e-8,
        };
        let err = engine
            .fit(&YEARS, &VALUES, ErrorDistribution::Gamma, LinkFunction::Log)
            .unwrap_err();
        assert_eq!(err, FitFailure::NonConvergence { iterations: 1 });
    }
}
