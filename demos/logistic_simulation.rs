//! Simulated logistic environment: SGD-TS against a uniform baseline.
//!
//! Run with `RUST_LOG=sgd_ts=debug cargo run --example logistic_simulation` to
//! see warm-up close-out and window refreshes.

use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use sgd_ts::logistic::sigmoid;
use sgd_ts::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DIMENSION: usize = 5;
const ARMS: usize = 4;
const ROUNDS: usize = 5_000;

struct Environment {
    theta: Array1<f64>,
    rng: Xoshiro256PlusPlus,
}

impl Environment {
    fn contexts(&mut self) -> Array2<f64> {
        let rng = &mut self.rng;
        Array2::from_shape_fn((ARMS, DIMENSION), |_| rng.random_range(-1.0..1.0))
    }

    fn probability(&self, context: ArrayView1<'_, f64>) -> f64 {
        sigmoid(context.dot(&self.theta))
    }

    fn reward(&mut self, context: ArrayView1<'_, f64>) -> f64 {
        let p = self.probability(context);
        if self.rng.random_bool(p) { 1.0 } else { 0.0 }
    }

    /// Expected reward of the best arm minus that of the chosen one
    fn regret(&self, contexts: &Array2<f64>, arm: usize) -> f64 {
        let best = contexts
            .rows()
            .into_iter()
            .map(|row| self.probability(row))
            .fold(f64::NEG_INFINITY, f64::max);
        best - self.probability(contexts.row(arm))
    }
}

fn run<P: Policy>(name: &str, policy: P, seed: u64) -> Result<f64> {
    let mut env = Environment {
        theta: Array1::from(vec![1.0, -0.5, 0.8, 0.0, -1.2]),
        rng: Xoshiro256PlusPlus::seed_from_u64(seed),
    };
    let mut bandit = Bandit::with_seed(policy, seed);
    let mut regret = 0.0;

    for round in 1..=ROUNDS {
        let contexts = env.contexts();
        let arm = bandit.predict(contexts.view())?;
        regret += env.regret(&contexts, arm);
        let reward = env.reward(contexts.row(arm));
        bandit.reward(reward)?;

        if round % 1_000 == 0 {
            info!(policy = name, round, regret, reward = bandit.total_reward(), "progress");
        }
    }
    Ok(regret)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let sgd_ts = SgdTs::builder(DIMENSION)
        .num_arms(ARMS)
        .tau(100)
        .horizon(ROUNDS)
        .build()?;
    let random = Random::new(ARMS, DIMENSION)?;

    let sgd_ts_regret = run("sgd-ts", sgd_ts, 42)?;
    let random_regret = run("random", random, 42)?;

    info!(sgd_ts_regret, random_regret, rounds = ROUNDS, "cumulative regret");
    Ok(())
}
