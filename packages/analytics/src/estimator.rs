//! Trend sensitivity to the choice of starting year.
//!
//! For every candidate start period the series is truncated to the points
//! at or after that period and a trend is refit. The resulting curve shows
//! how much the headline trend depends on where the analysis begins.

use std::ops::Range;

use crime_trends_analytics_models::{FamilyTrendCurve, TrendEstimate, TrendFamily};
use crime_trends_crime_models::{Series, SeriesPoint};
use crime_trends_glm::{Irls, RegressionEngine};

use crate::AnalyticsError;
use crate::progress::{NullProgress, ProgressCallback};

/// Normal critical value used for the approximate 95% interval.
pub const CRITICAL_VALUE: f64 = 2.0;

/// Periods that are tried as the first year of a fit.
///
/// Runs from the earliest period up to, but excluding, `max - 2`. A
/// contiguous series therefore needs at least four periods to produce a
/// row, and its shortest window holds four points: a series spanning three
/// periods yields no rows at all.
///
/// This follows the five-point worked example (2009..=2013 gives starts
/// 2009 and 2010). It disagrees with the inclusive reading "`min` to
/// `max - 2`", whose row count `(max - 2) - min + 1` would add a final
/// three-point window.
#[must_use]
pub fn candidate_starts(series: &Series) -> Range<i32> {
    match (series.min_period(), series.max_period()) {
        (Some(min), Some(max)) => min..max.saturating_sub(2),
        _ => Range::default(),
    }
}

/// Fits the trend curve with the default [`Irls`] engine.
#[must_use]
pub fn estimate(series: &Series, family: TrendFamily) -> Vec<TrendEstimate> {
    estimate_with(&Irls::default(), series, family)
}

/// Fits the trend curve with a caller-supplied regression engine.
///
/// Windows that cannot be fit produce a row with `failure` set and `NaN`
/// values; the remaining windows are unaffected.
#[must_use]
pub fn estimate_with(
    engine: &impl RegressionEngine,
    series: &Series,
    family: TrendFamily,
) -> Vec<TrendEstimate> {
    let estimates: Vec<TrendEstimate> = candidate_starts(series)
        .map(|start| fit_window(engine, series.since(start), start, family))
        .collect();

    log::debug!(
        "{family}: {} windows, {} fit",
        estimates.len(),
        estimates.iter().filter(|e| e.is_defined()).count()
    );

    estimates
}

/// Parses `family` and fits the trend curve.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidConfiguration`] if `family` is not a
/// known family name.
pub fn estimate_by_name(
    series: &Series,
    family: &str,
) -> Result<Vec<TrendEstimate>, AnalyticsError> {
    let family = TrendFamily::parse(family)?;
    Ok(estimate(series, family))
}

/// Fits one trend curve per family, in the order given.
#[must_use]
pub fn sweep(series: &Series, families: &[TrendFamily]) -> Vec<FamilyTrendCurve> {
    sweep_with_progress(series, families, &NullProgress)
}

/// Like [`sweep`], advancing `progress` once per family.
#[must_use]
pub fn sweep_with_progress(
    series: &Series,
    families: &[TrendFamily],
    progress: &dyn ProgressCallback,
) -> Vec<FamilyTrendCurve> {
    progress.set_total(families.len() as u64);

    let curves = families
        .iter()
        .map(|&family| {
            progress.set_message(format!("Fitting {family}"));
            let estimates = estimate(series, family);
            progress.inc(1);
            FamilyTrendCurve { family, estimates }
        })
        .collect();

    progress.finish(format!("Fitted {} families", families.len()));
    curves
}

fn fit_window(
    engine: &impl RegressionEngine,
    window: &[SeriesPoint],
    start_period: i32,
    family: TrendFamily,
) -> TrendEstimate {
    let x: Vec<f64> = window.iter().map(|p| f64::from(p.period)).collect();
    let y: Vec<f64> = window.iter().map(|p| p.value).collect();

    match engine.fit(&x, &y, family.distribution(), family.link()) {
        Ok(fit) => to_estimate(
            start_period,
            window.len(),
            fit.slope,
            fit.slope_std_error,
            family,
        ),
        Err(failure) => {
            log::warn!("{family}: window starting {start_period} could not be fit: {failure}");
            TrendEstimate::failed(start_period, window.len(), failure)
        }
    }
}

fn to_estimate(
    start_period: i32,
    observations: usize,
    beta: f64,
    se: f64,
    family: TrendFamily,
) -> TrendEstimate {
    let lower = CRITICAL_VALUE.mul_add(-se, beta);
    let upper = CRITICAL_VALUE.mul_add(se, beta);

    let (point_estimate, lower_bound, upper_bound) = if family.is_multiplicative() {
        (as_percent(beta), as_percent(lower), as_percent(upper))
    } else {
        (beta, lower, upper)
    };

    TrendEstimate {
        start_period,
        observations,
        point_estimate,
        lower_bound,
        upper_bound,
        failure: None,
    }
}

/// `(exp(beta) - 1) * 100`
fn as_percent(beta: f64) -> f64 {
    beta.exp_m1() * 100.0
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use crime_trends_analytics_models::{ErrorDistribution, FitFailure, LinkFunction};
    use crime_trends_glm::GlmFit;

    use super::*;

    fn scenario() -> Series {
        Series::from_pairs(&[
            (2009, 10.0),
            (2010, 12.0),
            (2011, 9.0),
            (2012, 20.0),
            (2013, 25.0),
        ])
        .unwrap()
    }

    /// Always reports the same slope and standard error.
    struct FixedEngine {
        slope: f64,
        se: f64,
    }

    impl RegressionEngine for FixedEngine {
        fn fit(
            &self,
            x: &[f64],
            _y: &[f64],
            _distribution: ErrorDistribution,
            _link: LinkFunction,
        ) -> Result<GlmFit, FitFailure> {
            Ok(GlmFit {
                intercept: 0.0,
                slope: self.slope,
                slope_std_error: self.se,
                z_statistic: self.slope / self.se,
                p_value: 0.5,
                scale: 1.0,
                deviance: 0.0,
                iterations: 1,
                observations: x.len(),
            })
        }
    }

    #[test]
    fn linear_scenario_has_two_windows() {
        let rows = estimate(&scenario(), TrendFamily::Linear);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].start_period, 2009);
        assert_eq!(rows[0].observations, 5);
        assert_eq!(rows[1].start_period, 2010);
        assert_eq!(rows[1].observations, 4);

        assert!((rows[0].point_estimate - 3.8).abs() < 1e-9);
        assert!((rows[1].point_estimate - 5.0).abs() < 1e-9);
    }

    #[test]
    fn linear_interval_is_symmetric_two_standard_errors() {
        let rows = estimate(&scenario(), TrendFamily::Linear);
        let expected_se = [1.68_f64.sqrt(), 3.6_f64.sqrt()];
        for (row, se) in rows.iter().zip(expected_se) {
            let above = row.upper_bound - row.point_estimate;
            let below = row.point_estimate - row.lower_bound;
            assert!((above - below).abs() < 1e-9);
            assert!((above - 2.0 * se).abs() < 1e-9);
        }
    }

    #[test]
    fn row_count_matches_period_span() {
        let cases: &[(&[(i32, f64)], usize)] = &[
            (&[], 0),
            (&[(2020, 1.0)], 0),
            (&[(2020, 1.0), (2021, 2.0)], 0),
            (&[(2019, 1.0), (2020, 2.0), (2021, 3.0)], 0),
            (&[(2018, 1.0), (2019, 4.0), (2020, 2.0), (2021, 3.0)], 1),
            (&[(2000, 1.0), (2005, 2.0), (2006, 3.0)], 4),
        ];
        for (pairs, expected) in cases {
            let series = Series::from_pairs(pairs).unwrap();
            let rows = estimate(&series, TrendFamily::Linear);
            assert_eq!(rows.len(), *expected, "series {pairs:?}");
            assert!(rows.windows(2).all(|w| w[0].start_period < w[1].start_period));
        }
    }

    #[test]
    fn two_point_windows_fail_without_aborting() {
        let series = Series::from_pairs(&[(2000, 1.0), (2005, 2.0), (2006, 4.0)]).unwrap();
        let rows = estimate(&series, TrendFamily::Linear);

        assert!(rows[0].is_defined());
        for row in &rows[1..] {
            assert_eq!(row.observations, 2);
            assert_eq!(
                row.failure,
                Some(FitFailure::InsufficientData { observations: 2 })
            );
            assert!(row.point_estimate.is_nan());
        }
    }

    #[test]
    fn last_periods_never_start_a_window() {
        let series = scenario();
        let rows = estimate(&series, TrendFamily::LogGamma);
        let last = rows.last().unwrap();
        assert_eq!(last.start_period, 2010);
        assert_eq!(last.observations, 4);
        assert!(rows.iter().all(|r| r.start_period < 2011));

        let window = series.since(2012);
        assert_eq!(window.len(), 2);
        let x: Vec<f64> = window.iter().map(|p| f64::from(p.period)).collect();
        let y: Vec<f64> = window.iter().map(|p| p.value).collect();
        let err = Irls::default()
            .fit(&x, &y, ErrorDistribution::Gamma, LinkFunction::Log)
            .unwrap_err();
        assert_eq!(err, FitFailure::InsufficientData { observations: 2 });
    }

    #[test]
    fn log_families_report_ordered_percentages() {
        for &family in TrendFamily::all() {
            if !family.is_multiplicative() {
                continue;
            }
            for row in estimate(&scenario(), family) {
                assert!(row.is_defined(), "{family} failed at {}", row.start_period);
                assert!(row.lower_bound <= row.point_estimate);
                assert!(row.point_estimate <= row.upper_bound);
                assert!(row.lower_bound > -100.0);
            }
        }
    }

    #[test]
    fn log_transform_matches_fitted_slope() {
        let series = scenario();
        let rows = estimate(&series, TrendFamily::LogGamma);
        let x: Vec<f64> = series.points().iter().map(|p| f64::from(p.period)).collect();
        let y: Vec<f64> = series.points().iter().map(|p| p.value).collect();
        let fit = Irls::default()
            .fit(&x, &y, ErrorDistribution::Gamma, LinkFunction::Log)
            .unwrap();

        let pct = |b: f64| (b.exp() - 1.0) * 100.0;
        assert!((rows[0].point_estimate - pct(fit.slope)).abs() < 1e-9);
        assert!((rows[0].lower_bound - pct(fit.slope - 2.0 * fit.slope_std_error)).abs() < 1e-9);
        assert!((rows[0].upper_bound - pct(fit.slope + 2.0 * fit.slope_std_error)).abs() < 1e-9);
    }

    #[test]
    fn injected_engine_drives_the_transform() {
        let engine = FixedEngine {
            slope: 1.1_f64.ln(),
            se: 0.0,
        };
        let rows = estimate_with(&engine, &scenario(), TrendFamily::LogNormal);
        for row in rows {
            assert!((row.point_estimate - 10.0).abs() < 1e-9);
            assert!((row.lower_bound - 10.0).abs() < 1e-9);
            assert!((row.upper_bound - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn non_positive_value_only_fails_windows_containing_it() {
        let series = Series::from_pairs(&[
            (2009, 0.0),
            (2010, 5.0),
            (2011, 6.0),
            (2012, 8.0),
            (2013, 9.0),
            (2014, 11.0),
        ])
        .unwrap();
        let rows = estimate(&series, TrendFamily::LogGamma);
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0].failure,
            Some(FitFailure::NonPositiveResponse { value: 0.0 })
        );
        assert!(rows[1].is_defined());
        assert!(rows[2].is_defined());

        let linear = estimate(&series, TrendFamily::Linear);
        assert!(linear.iter().all(TrendEstimate::is_defined));
    }

    #[test]
    fn unknown_family_name_is_invalid_configuration() {
        let err = estimate_by_name(&scenario(), "log-cauchy").unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("log-gamma"));

        let rows = estimate_by_name(&scenario(), "linear").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn sweep_keeps_family_order() {
        let families = [TrendFamily::LogPoisson, TrendFamily::Linear];
        let curves = sweep(&scenario(), &families);
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0].family, TrendFamily::LogPoisson);
        assert_eq!(curves[1].family, TrendFamily::Linear);
        assert_eq!(curves[1].estimates, estimate(&scenario(), TrendFamily::Linear));
    }

    #[derive(Default)]
    struct CountingProgress {
        total: AtomicU64,
        done: AtomicU64,
    }

    impl ProgressCallback for CountingProgress {
        fn set_total(&self, total: u64) {
            self.total.store(total, Ordering::SeqCst);
        }
        fn inc(&self, delta: u64) {
            self.done.fetch_add(delta, Ordering::SeqCst);
        }
        fn set_message(&self, _msg: String) {}
        fn finish(&self, _msg: String) {}
    }

    #[test]
    fn sweep_reports_one_step_per_family() {
        let progress = CountingProgress::default();
        let curves = sweep_with_progress(&scenario(), TrendFamily::all(), &progress);
        assert_eq!(curves.len(), TrendFamily::all().len());
        assert_eq!(progress.total.load(Ordering::SeqCst), 5);
        assert_eq!(progress.done.load(Ordering::SeqCst), 5);
    }
}
