//! Thompson-sampling covariance schedule and isotropic Gaussian draws.
//!
//! The sampling covariance is always a scalar multiple of the identity:
//!
//! ```text
//!   g1 = (R / c1) * sqrt(d * (2 ln(1 + 2 j tau / d) + 2 ln T))
//!   g2 = (tau / alpha) * sqrt(1 + ln j)
//!   A  = ((2 c3 g1^2) / (alpha j) + 2 g2^2 / j) * I_d
//! ```
//!
//! so a multivariate normal draw reduces to independent per-coordinate normals
//! with standard deviation `sqrt(a)`.

use ndarray::{Array1, ArrayView1};
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{BanditError, Result};

/// Constants of the covariance formula, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CovarianceSchedule {
    pub dimension: usize,
    pub tau: usize,
    pub alpha: f64,
    pub reward_scale: f64,
    pub c1: f64,
    pub c3: f64,
    pub horizon: usize,
}

impl CovarianceSchedule {
    /// Confidence-width term `g1` at window `j`
    pub fn g1(&self, j: usize) -> f64 {
        let d = self.dimension as f64;
        let growth = 2.0 * (1.0 + 2.0 * j as f64 * self.tau as f64 / d).ln();
        let horizon = 2.0 * (self.horizon as f64).ln();
        (self.reward_scale / self.c1) * (d * (growth + horizon)).sqrt()
    }

    /// SGD-error term `g2` at window `j`
    pub fn g2(&self, j: usize) -> f64 {
        (self.tau as f64 / self.alpha) * (1.0 + (j as f64).ln()).sqrt()
    }

    /// Diagonal entry `a` of the isotropic covariance `a * I_d` at window `j`
    ///
    /// Fails with [`BanditError::NumericalInstability`] when the result is not a
    /// finite positive number, which would make the draw degenerate.
    pub fn variance(&self, j: usize) -> Result<f64> {
        if j == 0 {
            return Err(BanditError::numerical(
                "covariance requested for window 0; windows are numbered from 1",
            ));
        }
        let jf = j as f64;
        let g1 = self.g1(j);
        let g2 = self.g2(j);
        let a = (2.0 * self.c3 * g1 * g1) / (self.alpha * jf) + 2.0 * g2 * g2 / jf;
        if !a.is_finite() || a <= 0.0 {
            return Err(BanditError::numerical(format!(
                "sampling variance {a} at window {j} is not a finite positive number"
            )));
        }
        Ok(a)
    }
}

/// Draw one sample from `N(mean, variance * I)`
pub fn sample_isotropic(
    mean: ArrayView1<'_, f64>,
    variance: f64,
    rng: &mut dyn RngCore,
) -> Result<Array1<f64>> {
    if !variance.is_finite() || variance <= 0.0 {
        return Err(BanditError::numerical(format!(
            "cannot sample with variance {variance}"
        )));
    }
    if mean.iter().any(|m| !m.is_finite()) {
        return Err(BanditError::numerical("sampling mean is not finite"));
    }

    let std_dev = variance.sqrt();
    let sample = mean.mapv(|m| {
        let z: f64 = StandardNormal.sample(rng);
        m + std_dev * z
    });
    Ok(sample)
}
