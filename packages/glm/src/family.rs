//! Variance, deviance, and link transforms for the supported families.

use crime_trends_analytics_models::{ErrorDistribution, LinkFunction};

pub(crate) trait Variance {
    /// `V(mu)`, up to the dispersion.
    fn variance(self, mu: f64) -> f64;

    /// Contribution of one point to the residual deviance.
    fn unit_deviance(self, y: f64, mu: f64) -> f64;

    /// Whether the fitted mean must stay strictly positive.
    fn requires_positive_mean(self) -> bool;
}

impl Variance for ErrorDistribution {
    fn variance(self, mu: f64) -> f64 {
        match self {
            Self::Gaussian => 1.0,
            Self::Gamma => mu * mu,
            Self::InverseGaussian => mu * mu * mu,
            Self::Poisson => mu,
        }
    }

    fn unit_deviance(self, y: f64, mu: f64) -> f64 {
        match self {
            Self::Gaussian => (y - mu).powi(2),
            Self::Gamma => 2.0 * (-(y / mu).ln() + (y - mu) / mu),
            Self::InverseGaussian => (y - mu).powi(2) / (y * mu * mu),
            Self::Poisson => {
                if y == 0.0 {
                    2.0 * mu
                } else {
                    2.0 * (y * (y / mu).ln() - (y - mu))
                }
            }
        }
    }

    fn requires_positive_mean(self) -> bool {
        !matches!(self, Self::Gaussian)
    }
}

pub(crate) trait Link {
    /// `eta = g(mu)`
    fn link(self, mu: f64) -> f64;

    /// `mu = g^-1(eta)`
    fn inverse(self, eta: f64) -> f64;

    /// `g'(mu)`
    fn derivative(self, mu: f64) -> f64;
}

impl Link for LinkFunction {
    fn link(self, mu: f64) -> f64 {
        match self {
            Self::Identity => mu,
            Self::Log => mu.ln(),
        }
    }

    fn inverse(self, eta: f64) -> f64 {
        match self {
            Self::Identity => eta,
            Self::Log => eta.exp(),
        }
    }

    fn derivative(self, mu: f64) -> f64 {
        match self {
            Self::Identity => 1.0,
            Self::Log => 1.0 / mu,
        }
    }
}
