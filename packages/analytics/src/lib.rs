#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Trend analyses over yearly crime statistics.
//!
//! - [`estimator`] refits a trend on every suffix of a series to show how
//!   the conclusion depends on the starting year and the regression family.
//! - [`scanner`] fits one fixed-window trend per violation category and
//!   ranks categories by growth.
//! - [`changes`] computes year-over-year and reference-year changes.
//! - [`progress`] lets long multi-fit runs report progress.
//!
//! All functions are pure: they take in-memory data and return fresh
//! result rows.

pub mod changes;
pub mod estimator;
pub mod progress;
pub mod scanner;

use crime_trends_analytics_models::InvalidFamilyError;
use thiserror::Error;

pub use changes::{period_changes, reference_changes};
pub use estimator::{estimate, estimate_by_name, estimate_with, sweep, sweep_with_progress};
pub use scanner::{apply_filter, scan, scan_with};

/// Errors that can occur during trend analyses.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A family name supplied at the boundary is not supported.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] InvalidFamilyError),

    /// The requested reference period has no usable value.
    #[error("No non-zero value at reference period {period}")]
    MissingReference {
        /// The reference period that was requested.
        period: i32,
    },
}
