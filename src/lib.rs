//! sgd-ts: online stochastic gradient descent with Thompson Sampling for
//! logistic contextual bandits.
//!
//! Each round the learner sees a `K x d` matrix of arm contexts, picks one arm,
//! and is told whether it paid off (reward 0 or 1). The [`SgdTs`] estimator
//! explores uniformly for `tau` rounds, seeds its parameters with a logistic
//! maximum-likelihood fit, then refines them with one projected SGD step every
//! `tau` rounds while acting greedily on a Thompson sample.
//!
//! # Quick Start
//!
//! ```
//! use ndarray::array;
//! use sgd_ts::prelude::*;
//!
//! let policy = SgdTs::builder(2)
//!     .num_arms(2)
//!     .tau(10)
//!     .horizon(1_000)
//!     .build()
//!     .unwrap();
//! let mut bandit = Bandit::with_seed(policy, 42);
//!
//! for round in 0..50 {
//!     let contexts = array![[1.0, 0.5], [0.2, -1.0]];
//!     let arm = bandit.predict(contexts.view()).unwrap();
//!     let reward = if arm == 0 && round % 3 != 0 { 1.0 } else { 0.0 };
//!     bandit.reward(reward).unwrap();
//! }
//!
//! assert_eq!(bandit.policy().phase(), Phase::Refine);
//! ```

mod bandit;
mod confidence;
mod config;
mod error;
mod history;
pub mod logistic;
pub mod policies;
mod policy;
pub mod sampling;

// Re-export main types
pub use bandit::{Bandit, BanditBuilder};
pub use confidence::ConfidenceBall;
pub use config::{SgdTsBuilder, SgdTsConfig};
pub use error::{BanditError, Result};
pub use history::History;
pub use policies::{Phase, Random, SgdTs, SgdTsState};
pub use policy::Policy;

/// Prelude module for convenient imports.
///
/// # Examples
///
/// ```
/// use sgd_ts::prelude::*;
/// ```
pub mod prelude {
    pub use crate::policies::{Phase, Random, SgdTs, SgdTsState};
    pub use crate::{Bandit, BanditError, Policy, Result, SgdTsConfig};
}
