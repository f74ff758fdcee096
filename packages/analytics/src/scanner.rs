//! Fixed-window trend scan across violation categories.
//!
//! Every category with a positive value in each period of the window gets
//! a log-gamma trend. Categories with gaps are left out entirely rather
//! than reported with empty values.

use std::collections::{BTreeMap, BTreeSet};

use crime_trends_analytics_models::{ScanFilter, ScanParams, ScanResult, TrendFamily};
use crime_trends_crime_models::Observation;
use crime_trends_glm::{Irls, RegressionEngine};

/// Family every scanned category is fit with.
pub const SCAN_FAMILY: TrendFamily = TrendFamily::LogGamma;

/// Scans `dataset` with the default [`Irls`] engine.
#[must_use]
pub fn scan(dataset: &[Observation], params: &ScanParams) -> Vec<ScanResult> {
    scan_with(&Irls::default(), dataset, params)
}

/// Scans `dataset` with a caller-supplied regression engine.
///
/// The completeness threshold is the number of distinct periods present in
/// the window, not the calendar span, so a period missing from the whole
/// dataset lowers it for every category. Non-positive values are dropped
/// before the completeness check. Results are sorted by ascending
/// `multiplicative_trend`.
#[must_use]
pub fn scan_with(
    engine: &impl RegressionEngine,
    dataset: &[Observation],
    params: &ScanParams,
) -> Vec<ScanResult> {
    let window: Vec<&Observation> = dataset
        .iter()
        .filter(|o| o.period >= params.first_period && o.statistic == params.statistic)
        .collect();

    let periods: BTreeSet<i32> = window.iter().map(|o| o.period).collect();
    let expected_count = periods.len();
    let reference_period = params
        .reference_period
        .or_else(|| periods.last().copied());

    let mut by_category: BTreeMap<&str, Vec<(i32, f64)>> = BTreeMap::new();
    for obs in &window {
        let entry = by_category.entry(obs.category.as_str()).or_default();
        if let Some(value) = obs.value.filter(|v| *v > 0.0) {
            entry.push((obs.period, value));
        }
    }

    log::info!(
        "Scanning {} categories of '{}' over {expected_count} periods since {}",
        by_category.len(),
        params.statistic,
        params.first_period
    );

    let mut results: Vec<ScanResult> = by_category
        .into_iter()
        .filter_map(|(category, points)| {
            if points.len() != expected_count {
                log::debug!(
                    "Skipping '{category}': {} of {expected_count} periods have positive values",
                    points.len()
                );
                return None;
            }

            let x: Vec<f64> = points.iter().map(|&(p, _)| f64::from(p)).collect();
            let y: Vec<f64> = points.iter().map(|&(_, v)| v).collect();
            let fit = match engine.fit(&x, &y, SCAN_FAMILY.distribution(), SCAN_FAMILY.link()) {
                Ok(fit) => fit,
                Err(e) => {
                    log::warn!("Skipping '{category}': {e}");
                    return None;
                }
            };

            let reference_value = reference_period.and_then(|r| {
                points
                    .iter()
                    .find(|&&(p, _)| p == r)
                    .map(|&(_, v)| v)
            });

            Some(ScanResult {
                category: category.to_string(),
                multiplicative_trend: fit.slope.exp(),
                reference_value,
                p_value: fit.p_value,
            })
        })
        .collect();

    results.sort_by(|a, b| a.multiplicative_trend.total_cmp(&b.multiplicative_trend));
    results
}

/// Keeps the rows that pass every threshold set in `filter`, preserving
/// order. A row without a reference value fails a minimum-reference
/// threshold.
#[must_use]
pub fn apply_filter(results: Vec<ScanResult>, filter: &ScanFilter) -> Vec<ScanResult> {
    results
        .into_iter()
        .filter(|r| filter.max_p_value.is_none_or(|max| r.p_value <= max))
        .filter(|r| {
            filter
                .min_reference_value
                .is_none_or(|min| r.reference_value.is_some_and(|v| v >= min))
        })
        .collect()
}
