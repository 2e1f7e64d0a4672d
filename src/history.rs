use ndarray::{ArrayView1, ArrayView2};

use crate::error::{BanditError, Result};

/// Append-only record of observed `(context, reward)` pairs
///
/// Contexts are stored row-major in one flat buffer so that any suffix of the
/// history can be viewed as an `n x d` matrix without copying.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct History {
    dimension: usize,
    contexts: Vec<f64>,
    rewards: Vec<f64>,
}

impl History {
    /// Create an empty history for contexts of length `dimension`
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            contexts: Vec::new(),
            rewards: Vec::new(),
        }
    }

    /// Append one observation. The caller has already validated the shape.
    pub(crate) fn push(&mut self, context: ArrayView1<'_, f64>, reward: f64) {
        debug_assert_eq!(context.len(), self.dimension);
        self.contexts.extend(context.iter().copied());
        self.rewards.push(reward);
    }

    /// Drop the most recent observation
    pub(crate) fn pop(&mut self) {
        if self.rewards.pop().is_some() {
            let len = self.rewards.len() * self.dimension;
            self.contexts.truncate(len);
        }
    }

    /// Number of recorded observations
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Context dimension of every row
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// All observations as `(contexts, rewards)`
    pub fn all(&self) -> Result<(ArrayView2<'_, f64>, ArrayView1<'_, f64>)> {
        self.last(self.len())
    }

    /// The most recent `n` observations (fewer if the history is shorter)
    pub fn last(&self, n: usize) -> Result<(ArrayView2<'_, f64>, ArrayView1<'_, f64>)> {
        let start = self.len().saturating_sub(n);
        let rows = self.len() - start;
        let contexts = self
            .contexts
            .get(start * self.dimension..)
            .ok_or_else(|| BanditError::input("history context buffer is truncated"))?;
        let x = ArrayView2::from_shape((rows, self.dimension), contexts).map_err(|e| {
            BanditError::input(format!("history context buffer is malformed: {e}"))
        })?;
        let y = ArrayView1::from(&self.rewards[start..]);
        Ok((x, y))
    }

    /// Whether the stored buffers agree with the declared dimension
    pub(crate) fn is_consistent(&self) -> bool {
        self.contexts.len() == self.rewards.len() * self.dimension
            && self.rewards.iter().all(|&r| r == 0.0 || r == 1.0)
    }
}
