use crate::error::{BanditError, Result};
use crate::logistic::LogisticRegression;
use crate::policies::SgdTs;
use crate::sampling::CovarianceSchedule;

/// Construction-time parameters of the SGD-TS estimator
///
/// All fields are fixed for the lifetime of an estimator. [`SgdTsConfig::validate`]
/// checks every constraint; the estimator constructors call it for you.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SgdTsConfig {
    /// Context dimension `d`
    pub dimension: usize,
    /// Number of arms `K` offered each round
    pub num_arms: usize,
    /// Warm-up length, also the SGD window length
    pub tau: usize,
    /// SGD step-size and covariance scale
    pub alpha: f64,
    /// Sub-Gaussian reward scale `R`
    pub reward_scale: f64,
    /// Covariance tuning constant `c1`
    pub c1: f64,
    /// Covariance tuning constant `c3`
    pub c3: f64,
    /// Horizon constant `T` inside the `ln(T)` term. Not a cap on rounds.
    pub horizon: usize,
    /// Radius of the confidence ball around the warm-up estimate
    pub radius: f64,
    /// Step size of the warm-up maximum-likelihood fit
    pub mle_learning_rate: f64,
    /// Iteration count of the warm-up maximum-likelihood fit
    pub mle_iterations: usize,
}

impl Default for SgdTsConfig {
    fn default() -> Self {
        Self {
            dimension: 1,
            num_arms: 2,
            tau: 100,
            alpha: 5.0,
            reward_scale: 1.0,
            c1: 1.0,
            c3: 0.25,
            horizon: 10_000,
            radius: 2.0,
            mle_learning_rate: 0.1,
            mle_iterations: 200,
        }
    }
}

impl SgdTsConfig {
    /// Default configuration for contexts of length `dimension`
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    /// Check every parameter against its constraint
    pub fn validate(&self) -> Result<()> {
        positive_count("dimension", self.dimension)?;
        positive_count("num_arms", self.num_arms)?;
        positive_count("tau", self.tau)?;
        positive_count("horizon", self.horizon)?;
        positive_count("mle_iterations", self.mle_iterations)?;
        positive_real("alpha", self.alpha)?;
        positive_real("reward_scale", self.reward_scale)?;
        positive_real("c1", self.c1)?;
        positive_real("c3", self.c3)?;
        positive_real("radius", self.radius)?;
        positive_real("mle_learning_rate", self.mle_learning_rate)?;
        Ok(())
    }

    pub(crate) fn schedule(&self) -> CovarianceSchedule {
        CovarianceSchedule {
            dimension: self.dimension,
            tau: self.tau,
            alpha: self.alpha,
            reward_scale: self.reward_scale,
            c1: self.c1,
            c3: self.c3,
            horizon: self.horizon,
        }
    }

    pub(crate) fn mle(&self) -> LogisticRegression {
        LogisticRegression::new(self.mle_learning_rate, self.mle_iterations)
    }
}

fn positive_count(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(BanditError::config(format!("{name} must be positive")));
    }
    Ok(())
}

fn positive_real(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(BanditError::config(format!(
            "{name} must be a finite positive number, got {value}"
        )));
    }
    Ok(())
}

/// Builder for [`SgdTs`] with a fluent API
#[derive(Debug, Clone)]
pub struct SgdTsBuilder {
    config: SgdTsConfig,
}

impl SgdTsBuilder {
    /// Start from the defaults for contexts of length `dimension`
    pub fn new(dimension: usize) -> Self {
        Self {
            config: SgdTsConfig::new(dimension),
        }
    }

    /// Set the number of arms per round
    pub fn num_arms(mut self, num_arms: usize) -> Self {
        self.config.num_arms = num_arms;
        self
    }

    /// Set the warm-up and window length
    pub fn tau(mut self, tau: usize) -> Self {
        self.config.tau = tau;
        self
    }

    /// Set the step-size / covariance scale
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.alpha = alpha;
        self
    }

    /// Set the sub-Gaussian reward scale
    pub fn reward_scale(mut self, reward_scale: f64) -> Self {
        self.config.reward_scale = reward_scale;
        self
    }

    /// Set the covariance constants `c1` and `c3`
    pub fn constants(mut self, c1: f64, c3: f64) -> Self {
        self.config.c1 = c1;
        self.config.c3 = c3;
        self
    }

    /// Set the horizon constant `T`
    pub fn horizon(mut self, horizon: usize) -> Self {
        self.config.horizon = horizon;
        self
    }

    /// Set the confidence-ball radius
    pub fn radius(mut self, radius: f64) -> Self {
        self.config.radius = radius;
        self
    }

    /// Tune the warm-up maximum-likelihood fit
    pub fn mle(mut self, learning_rate: f64, iterations: usize) -> Self {
        self.config.mle_learning_rate = learning_rate;
        self.config.mle_iterations = iterations;
        self
    }

    /// The configuration assembled so far
    pub fn config(&self) -> &SgdTsConfig {
        &self.config
    }

    /// Validate the configuration and build the estimator
    pub fn build(self) -> Result<SgdTs> {
        SgdTs::new(self.config)
    }
}
