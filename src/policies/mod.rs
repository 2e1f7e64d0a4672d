//! Bandit learners implementing [`crate::Policy`]

mod random;
mod sgd_ts;

pub use random::Random;
pub use sgd_ts::{Phase, SgdTs, SgdTsState};
