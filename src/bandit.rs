use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::error::{BanditError, Result};
use crate::policy::Policy;

/// A bandit session driving a policy one round at a time
///
/// The `Bandit` owns a seedable random source and remembers the context of the
/// arm it last chose, so callers only hand back the observed reward. It rejects
/// a second prediction before the reward of the first has arrived, and a reward
/// with no prediction outstanding, keeping the policy's select/update calls in
/// strict alternation.
#[derive(Clone, Debug)]
pub struct Bandit<P> {
    policy: P,
    rng: StdRng,
    pending: Option<Array1<f64>>,
    rounds: usize,
    total_reward: f64,
}

impl<P> Bandit<P>
where
    P: Policy,
{
    /// Creates a session seeded from the operating system
    pub fn new(policy: P) -> Self {
        Self::from_rng(policy, StdRng::from_os_rng())
    }

    /// Creates a session with a deterministic random stream
    pub fn with_seed(policy: P, seed: u64) -> Self {
        Self::from_rng(policy, StdRng::seed_from_u64(seed))
    }

    fn from_rng(policy: P, rng: StdRng) -> Self {
        Self {
            policy,
            rng,
            pending: None,
            rounds: 0,
            total_reward: 0.0,
        }
    }

    /// Choose an arm for this round's `K x d` contexts
    pub fn predict(&mut self, contexts: ArrayView2<'_, f64>) -> Result<usize> {
        if self.pending.is_some() {
            return Err(BanditError::input(
                "previous decision is still awaiting its reward",
            ));
        }
        let arm = self.policy.select_arm(contexts, &mut self.rng)?;
        self.pending = Some(contexts.row(arm).to_owned());
        Ok(arm)
    }

    /// Feed back the reward observed for the last prediction
    pub fn reward(&mut self, reward: f64) -> Result<()> {
        let context = self
            .pending
            .take()
            .ok_or_else(|| BanditError::input("no decision is awaiting a reward"))?;
        if let Err(err) = self.policy.update(context.view(), reward, &mut self.rng) {
            // Keep the decision open so the reward can be retried
            self.pending = Some(context);
            return Err(err);
        }
        self.rounds += 1;
        self.total_reward += reward;
        Ok(())
    }

    /// Expected reward per arm under the policy's current model
    pub fn predict_expectations(&self, contexts: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.policy.expectations(contexts)
    }

    /// Context of the decision awaiting its reward, if any
    pub fn pending_context(&self) -> Option<ArrayView1<'_, f64>> {
        self.pending.as_ref().map(|c| c.view())
    }

    /// Number of completed rounds (prediction followed by reward)
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Sum of all rewards fed back so far
    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    /// Gets a reference to the policy
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Consumes the session, returning the policy
    pub fn into_policy(self) -> P {
        self.policy
    }

    /// Reset the policy and the session counters
    pub fn reset(&mut self) {
        debug!(rounds = self.rounds, "resetting bandit session");
        self.policy.reset();
        self.pending = None;
        self.rounds = 0;
        self.total_reward = 0.0;
    }
}

/// Builder for creating bandit sessions with a fluent API
pub struct BanditBuilder<P> {
    policy: Option<P>,
    seed: Option<u64>,
}

impl<P> Default for BanditBuilder<P> {
    fn default() -> Self {
        Self {
            policy: None,
            seed: None,
        }
    }
}

impl<P> BanditBuilder<P>
where
    P: Policy,
{
    /// Set the policy for the session
    pub fn policy(mut self, policy: P) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Seed the session's random stream
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the session
    pub fn build(self) -> Result<Bandit<P>> {
        let policy = self
            .policy
            .ok_or_else(|| BanditError::config("policy not specified"))?;

        Ok(match self.seed {
            Some(seed) => Bandit::with_seed(policy, seed),
            None => Bandit::new(policy),
        })
    }
}

impl<P> Bandit<P> {
    /// Create a new builder for constructing a bandit session
    pub fn builder() -> BanditBuilder<P> {
        BanditBuilder::default()
    }
}
