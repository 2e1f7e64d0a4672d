//! Policy trait definition for contextual bandit learners

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::{BanditError, Result};

/// Common interface of the learners in this crate
///
/// Each round the caller offers a `K x d` matrix of arm contexts, receives the
/// index of the chosen arm, observes a binary reward and feeds the chosen row
/// back through [`Policy::update`]. Calls must alternate select, update,
/// select, ...; [`crate::Bandit`] enforces that discipline for you.
///
/// Note: this trait uses `dyn rand::RngCore` instead of a generic parameter to
/// stay object-safe, so `Box<dyn Policy>` can be used.
pub trait Policy {
    /// Choose an arm given the contexts of all `K` arms for this round
    ///
    /// # Returns
    /// An index in `0..K`
    fn select_arm(
        &mut self,
        contexts: ArrayView2<'_, f64>,
        rng: &mut dyn rand::RngCore,
    ) -> Result<usize>;

    /// Record the reward observed for the context of the chosen arm
    ///
    /// # Arguments
    /// - `context`: the row of the context matrix that was chosen
    /// - `reward`: the observed reward, 0 or 1
    /// - `rng`: random source for any posterior draw the update triggers
    fn update(
        &mut self,
        context: ArrayView1<'_, f64>,
        reward: f64,
        rng: &mut dyn rand::RngCore,
    ) -> Result<()>;

    /// Expected reward of each arm under the current model, without side effects
    fn expectations(&self, contexts: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    /// Number of arms offered per round
    fn num_arms(&self) -> usize;

    /// Context dimension
    fn dimension(&self) -> usize;

    /// Forget everything learned, keeping the configuration
    fn reset(&mut self);
}

/// Check that `contexts` is `num_arms x dimension` with finite entries
pub(crate) fn check_contexts(
    contexts: ArrayView2<'_, f64>,
    num_arms: usize,
    dimension: usize,
) -> Result<()> {
    let (rows, cols) = contexts.dim();
    if rows != num_arms {
        return Err(BanditError::dimension("context matrix rows", num_arms, rows));
    }
    if cols != dimension {
        return Err(BanditError::dimension(
            "context matrix columns",
            dimension,
            cols,
        ));
    }
    if contexts.iter().any(|v| !v.is_finite()) {
        return Err(BanditError::input("context matrix contains non-finite values"));
    }
    Ok(())
}

/// Check that `context` has length `dimension` with finite entries and that
/// `reward` is exactly 0 or 1
pub(crate) fn check_observation(
    context: ArrayView1<'_, f64>,
    reward: f64,
    dimension: usize,
) -> Result<()> {
    if context.len() != dimension {
        return Err(BanditError::dimension(
            "context length",
            dimension,
            context.len(),
        ));
    }
    if context.iter().any(|v| !v.is_finite()) {
        return Err(BanditError::input("context contains non-finite values"));
    }
    if reward != 0.0 && reward != 1.0 {
        return Err(BanditError::input(format!(
            "reward must be 0 or 1, got {reward}"
        )));
    }
    Ok(())
}
