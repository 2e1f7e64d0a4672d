use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::Rng;

use crate::error::{BanditError, Result};
use crate::policy::{Policy, check_contexts, check_observation};

/// Random selection policy - selects arms uniformly at random
///
/// Learns nothing. Useful as a regret baseline next to [`super::SgdTs`].
#[derive(Clone, Debug)]
pub struct Random {
    num_arms: usize,
    dimension: usize,
}

impl Random {
    /// Creates a uniform policy over `num_arms` arms with contexts of length `dimension`
    pub fn new(num_arms: usize, dimension: usize) -> Result<Self> {
        if num_arms == 0 {
            return Err(BanditError::config("num_arms must be positive"));
        }
        if dimension == 0 {
            return Err(BanditError::config("dimension must be positive"));
        }
        Ok(Self {
            num_arms,
            dimension,
        })
    }
}

impl Policy for Random {
    fn select_arm(
        &mut self,
        contexts: ArrayView2<'_, f64>,
        rng: &mut dyn rand::RngCore,
    ) -> Result<usize> {
        check_contexts(contexts, self.num_arms, self.dimension)?;
        Ok(rng.random_range(0..self.num_arms))
    }

    fn update(
        &mut self,
        context: ArrayView1<'_, f64>,
        reward: f64,
        _rng: &mut dyn rand::RngCore,
    ) -> Result<()> {
        // Random policy doesn't learn from feedback
        check_observation(context, reward, self.dimension)
    }

    fn expectations(&self, contexts: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_contexts(contexts, self.num_arms, self.dimension)?;
        Ok(Array1::from_elem(self.num_arms, 0.5))
    }

    fn num_arms(&self) -> usize {
        self.num_arms
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn reset(&mut self) {
        // No state to reset
    }
}
