//! Online SGD with Thompson Sampling for logistic contextual bandits.
//!
//! The estimator runs in two phases:
//!
//! 1. **Warm-up** (rounds `1..=tau`): arms are chosen uniformly at random and
//!    every observation is recorded. The `update` that closes round `tau` fits a
//!    logistic maximum-likelihood estimate `theta_hat` over the warm-up data,
//!    centers the confidence ball on it and draws the first Thompson sample.
//! 2. **Refine** (rounds `> tau`): at rounds `tau + 1, 2 tau + 1, ...` one
//!    projected SGD step is taken over the last `tau` observations and a fresh
//!    Thompson sample is drawn around the mean of the projected trajectory. Every
//!    round scores the arms with `sigmoid(X theta_ts)` and picks the best.

use std::cmp::Reverse;

use ndarray::{Array1, ArrayView1, ArrayView2};
use ordered_float::OrderedFloat;
use rand::Rng;
use tracing::{debug, trace, warn};

use crate::confidence::ConfidenceBall;
use crate::config::{SgdTsBuilder, SgdTsConfig};
use crate::error::{BanditError, Result};
use crate::history::History;
use crate::logistic::{log_loss_gradient, scores};
use crate::policy::{Policy, check_contexts, check_observation};
use crate::sampling::{CovarianceSchedule, sample_isotropic};

/// Tolerance used when checking that restored iterates lie in the confidence ball
const BALL_TOLERANCE: f64 = 1e-9;

/// Phase of the estimator, derived from the round counter and the warm-up fit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Uniform random exploration, collecting the data for the initial fit
    WarmUp,
    /// Periodic projected SGD with Thompson-sampling arm selection
    Refine,
}

/// State created when warm-up closes
#[derive(Debug, Clone, PartialEq)]
struct RefineState {
    theta_hat: Array1<f64>,
    confidence: ConfidenceBall,
    /// Projected iterates; the first entry is `theta_hat`, the last is the current iterate
    trajectory: Vec<Array1<f64>>,
    /// Number of windows so far, equal to `trajectory.len()`
    window: usize,
    theta_ts: Array1<f64>,
}

impl RefineState {
    fn theta(&self) -> &Array1<f64> {
        // The trajectory always starts with theta_hat
        self.trajectory.last().unwrap_or(&self.theta_hat)
    }

    fn trajectory_mean_with(&self, next: &Array1<f64>) -> Array1<f64> {
        let mut sum = next.clone();
        for theta in &self.trajectory {
            sum += theta;
        }
        sum / (self.trajectory.len() + 1) as f64
    }

    /// Compute the next window: one projected SGD step over `(x, y)` and a fresh draw
    ///
    /// Nothing is written until the step is passed to [`RefineState::commit`].
    fn step(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        alpha: f64,
        schedule: &CovarianceSchedule,
        rng: &mut dyn rand::RngCore,
    ) -> Result<WindowStep> {
        let window = self.window + 1;
        let eta = 1.0 / (alpha * window as f64);

        let mut stepped = self.theta().clone();
        let grad = log_loss_gradient(x, y, stepped.view());
        stepped.scaled_add(-eta, &grad);
        if stepped.iter().any(|v| !v.is_finite()) {
            return Err(BanditError::numerical(format!(
                "SGD step at window {window} produced a non-finite iterate"
            )));
        }

        let clipped = !self.confidence.contains(stepped.view(), 0.0);
        let theta = self.confidence.project(stepped);

        let mean = self.trajectory_mean_with(&theta);
        let variance = schedule.variance(window)?;
        let theta_ts = sample_isotropic(mean.view(), variance, rng)?;

        Ok(WindowStep {
            window,
            eta,
            variance,
            clipped,
            samples: x.nrows(),
            theta,
            theta_ts,
        })
    }

    fn commit(&mut self, step: WindowStep) {
        debug!(
            window = step.window,
            eta = step.eta,
            variance = step.variance,
            clipped = step.clipped,
            samples = step.samples,
            "opened sgd window"
        );
        self.window = step.window;
        self.trajectory.push(step.theta);
        self.theta_ts = step.theta_ts;
    }
}

/// A computed but not yet applied SGD window
struct WindowStep {
    window: usize,
    eta: f64,
    variance: f64,
    clipped: bool,
    samples: usize,
    theta: Array1<f64>,
    theta_ts: Array1<f64>,
}

/// SGD-TS: online logistic bandit with projected SGD and Thompson sampling
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use rand::SeedableRng;
/// use sgd_ts::prelude::*;
///
/// let mut estimator = SgdTs::builder(2).num_arms(2).tau(5).horizon(50).build().unwrap();
/// let mut rng = rand::rngs::StdRng::seed_from_u64(42);
///
/// let contexts = array![[1.0, 0.0], [0.0, 1.0]];
/// for round in 0..12 {
///     let arm = estimator.select_arm(contexts.view(), &mut rng).unwrap();
///     let reward = if arm == 0 { 1.0 } else { (round % 2) as f64 };
///     estimator.update(contexts.row(arm), reward, &mut rng).unwrap();
/// }
/// assert_eq!(estimator.phase(), Phase::Refine);
/// assert_eq!(estimator.window(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct SgdTs {
    config: SgdTsConfig,
    schedule: CovarianceSchedule,
    /// Round counter `t`, advanced by every `select_arm`
    round: usize,
    history: History,
    refine: Option<RefineState>,
}

impl SgdTs {
    /// Create an estimator from a validated configuration
    pub fn new(config: SgdTsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            schedule: config.schedule(),
            history: History::new(config.dimension),
            round: 0,
            refine: None,
            config,
        })
    }

    /// Start a builder for contexts of length `dimension`
    pub fn builder(dimension: usize) -> SgdTsBuilder {
        SgdTsBuilder::new(dimension)
    }

    pub fn config(&self) -> &SgdTsConfig {
        &self.config
    }

    /// Round counter `t`: the number of successful `select_arm` calls
    pub fn round(&self) -> usize {
        self.round
    }

    /// Window index `j`; 0 during warm-up, 1 right after it closes
    pub fn window(&self) -> usize {
        self.refine.as_ref().map_or(0, |s| s.window)
    }

    pub fn phase(&self) -> Phase {
        if self.refine.is_some() {
            Phase::Refine
        } else {
            Phase::WarmUp
        }
    }

    /// The warm-up maximum-likelihood estimate, once warm-up has closed
    pub fn theta_hat(&self) -> Option<ArrayView1<'_, f64>> {
        self.refine.as_ref().map(|s| s.theta_hat.view())
    }

    /// The current projected SGD iterate
    pub fn theta(&self) -> Option<ArrayView1<'_, f64>> {
        self.refine.as_ref().map(|s| s.theta().view())
    }

    /// The Thompson sample used for scoring until the next window opens
    pub fn theta_ts(&self) -> Option<ArrayView1<'_, f64>> {
        self.refine.as_ref().map(|s| s.theta_ts.view())
    }

    /// All projected iterates, starting with `theta_hat`. Empty during warm-up.
    pub fn trajectory(&self) -> &[Array1<f64>] {
        match &self.refine {
            Some(state) => state.trajectory.as_slice(),
            None => &[],
        }
    }

    pub fn confidence_set(&self) -> Option<&ConfidenceBall> {
        self.refine.as_ref().map(|s| &s.confidence)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Whether round `t` opens a new SGD window: `tau + 1, 2 tau + 1, ...`
    fn opens_window(&self, t: usize) -> bool {
        t > self.config.tau && (t - 1) % self.config.tau == 0
    }

    /// Fit `theta_hat` on the warm-up history and enter the refine phase
    fn close_warm_up(&mut self, rng: &mut dyn rand::RngCore) -> Result<()> {
        let (x, y) = self.history.all()?;
        if x.nrows() < self.config.tau {
            warn!(
                samples = x.nrows(),
                tau = self.config.tau,
                "closing warm-up with fewer observations than rounds"
            );
        }

        let theta_hat = self.config.mle().fit(x, y);
        if theta_hat.iter().any(|v| !v.is_finite()) {
            return Err(BanditError::numerical(
                "maximum-likelihood fit produced a non-finite estimate",
            ));
        }

        let variance = self.schedule.variance(1)?;
        let theta_ts = sample_isotropic(theta_hat.view(), variance, rng)?;

        debug!(
            t = self.round,
            samples = x.nrows(),
            norm = theta_hat.dot(&theta_hat).sqrt(),
            variance,
            "warm-up closed"
        );

        self.refine = Some(RefineState {
            confidence: ConfidenceBall::new(theta_hat.clone(), self.config.radius),
            trajectory: vec![theta_hat.clone()],
            window: 1,
            theta_ts,
            theta_hat,
        });
        Ok(())
    }

    /// Capture the learning state for persistence
    pub fn snapshot(&self) -> SgdTsState {
        let refine = self.refine.as_ref();
        SgdTsState {
            round: self.round,
            history: self.history.clone(),
            theta_hat: refine.map(|s| s.theta_hat.clone()),
            trajectory: refine.map(|s| s.trajectory.clone()).unwrap_or_default(),
            window: self.window(),
            theta_ts: refine.map(|s| s.theta_ts.clone()),
        }
    }

    /// Rebuild an estimator from a configuration and a previously captured state
    ///
    /// The state is checked against the configuration and the invariants of the
    /// phase it claims to be in.
    pub fn restore(config: SgdTsConfig, state: SgdTsState) -> Result<Self> {
        let mut estimator = Self::new(config)?;
        let d = estimator.config.dimension;
        let tau = estimator.config.tau;

        if state.history.dimension() != d || !state.history.is_consistent() {
            return Err(BanditError::input(
                "snapshot history does not match the configured dimension",
            ));
        }
        // Between calls the history holds one row per round, or one fewer while
        // a selection awaits its reward
        let recorded = state.history.len();
        if recorded > state.round || recorded + 1 < state.round {
            return Err(BanditError::input(format!(
                "snapshot records {recorded} observations over {} rounds",
                state.round
            )));
        }

        let refine = match (state.theta_hat, state.theta_ts) {
            (None, None) => {
                if !state.trajectory.is_empty()
                    || state.window != 0
                    || state.round > tau
                    || recorded >= tau
                {
                    return Err(BanditError::input(
                        "warm-up snapshot carries refine-phase state",
                    ));
                }
                None
            }
            (Some(theta_hat), Some(theta_ts)) => {
                let finite_d = |v: &Array1<f64>| v.len() == d && v.iter().all(|x| x.is_finite());
                if state.round < tau
                    || recorded < tau
                    || state.window != windows_opened(state.round, tau)
                    || state.window != state.trajectory.len()
                    || state.trajectory.first() != Some(&theta_hat)
                    || !finite_d(&theta_hat)
                    || !finite_d(&theta_ts)
                    || !state.trajectory.iter().all(finite_d)
                {
                    return Err(BanditError::input("refine snapshot is inconsistent"));
                }
                let confidence = ConfidenceBall::new(theta_hat.clone(), estimator.config.radius);
                if !state
                    .trajectory
                    .iter()
                    .all(|theta| confidence.contains(theta.view(), BALL_TOLERANCE))
                {
                    return Err(BanditError::input(
                        "snapshot iterate lies outside the confidence ball",
                    ));
                }
                Some(RefineState {
                    theta_hat,
                    confidence,
                    trajectory: state.trajectory,
                    window: state.window,
                    theta_ts,
                })
            }
            _ => {
                return Err(BanditError::input(
                    "snapshot must carry both theta_hat and theta_ts or neither",
                ));
            }
        };

        estimator.round = state.round;
        estimator.history = state.history;
        estimator.refine = refine;
        Ok(estimator)
    }
}

impl Policy for SgdTs {
    fn select_arm(
        &mut self,
        contexts: ArrayView2<'_, f64>,
        rng: &mut dyn rand::RngCore,
    ) -> Result<usize> {
        check_contexts(contexts, self.config.num_arms, self.config.dimension)?;
        let t = self.round + 1;

        if t <= self.config.tau {
            self.round = t;
            let arm = rng.random_range(0..self.config.num_arms);
            trace!(t, arm, "warm-up selection");
            return Ok(arm);
        }

        let opens_window = self.opens_window(t);
        let Some(state) = self.refine.as_mut() else {
            return Err(BanditError::input(format!(
                "round {t} is past warm-up but only {} observations were recorded; \
                 call update after every select_arm",
                self.history.len()
            )));
        };

        let step = if opens_window {
            let (x, y) = self.history.last(self.config.tau)?;
            Some(state.step(x, y, self.config.alpha, &self.schedule, rng)?)
        } else {
            None
        };
        let theta_ts = step.as_ref().map_or(&state.theta_ts, |s| &s.theta_ts);
        let arm = argmax(&finite_scores(contexts, theta_ts.view())?);

        if let Some(step) = step {
            state.commit(step);
        }
        self.round = t;
        trace!(t, arm, window = state.window, "thompson selection");
        Ok(arm)
    }

    fn update(
        &mut self,
        context: ArrayView1<'_, f64>,
        reward: f64,
        rng: &mut dyn rand::RngCore,
    ) -> Result<()> {
        check_observation(context, reward, self.config.dimension)?;
        self.history.push(context, reward);

        if self.round == self.config.tau && self.refine.is_none() {
            if let Err(err) = self.close_warm_up(rng) {
                self.history.pop();
                return Err(err);
            }
        }
        Ok(())
    }

    fn expectations(&self, contexts: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_contexts(contexts, self.config.num_arms, self.config.dimension)?;
        Ok(match &self.refine {
            Some(state) => finite_scores(contexts, state.theta_ts.view())?,
            None => Array1::from_elem(self.config.num_arms, 0.5),
        })
    }

    fn num_arms(&self) -> usize {
        self.config.num_arms
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn reset(&mut self) {
        debug!(t = self.round, "resetting estimator");
        self.round = 0;
        self.history = History::new(self.config.dimension);
        self.refine = None;
    }
}

/// Window index `j` in effect at round `t >= tau`: 1 after warm-up, plus one
/// for each of the rounds `tau + 1, 2 tau + 1, ...` up to `t`
fn windows_opened(t: usize, tau: usize) -> usize {
    if t <= tau { 1 } else { (t - tau - 1) / tau + 2 }
}

/// Logistic scores, failing instead of returning NaN or infinite entries
fn finite_scores(
    contexts: ArrayView2<'_, f64>,
    theta: ArrayView1<'_, f64>,
) -> Result<Array1<f64>> {
    let scores = scores(contexts, theta);
    if let Some(arm) = scores.iter().position(|s| !s.is_finite()) {
        return Err(BanditError::numerical(format!("score for arm {arm} is not finite")));
    }
    Ok(scores)
}

/// Index of the highest score; ties go to the lowest index
fn argmax(scores: &Array1<f64>) -> usize {
    scores
        .iter()
        .enumerate()
        .max_by_key(|&(i, &s)| (OrderedFloat(s), Reverse(i)))
        .map_or(0, |(i, _)| i)
}

/// Learning state of an [`SgdTs`] estimator, for callers that persist it
///
/// `theta_hat` and `theta_ts` are `None` and `trajectory` is empty while the
/// estimator is still warming up.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SgdTsState {
    pub round: usize,
    pub history: History,
    pub theta_hat: Option<Array1<f64>>,
    pub trajectory: Vec<Array1<f64>>,
    pub window: usize,
    pub theta_ts: Option<Array1<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, arr1, arr2, s};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn small() -> SgdTs {
        SgdTs::builder(2)
            .num_arms(2)
            .tau(5)
            .alpha(5.0)
            .horizon(50)
            .build()
            .unwrap()
    }

    /// Run `rounds` select/update pairs with a fixed context and alternating rewards
    fn drive(estimator: &mut SgdTs, rounds: usize, rng: &mut StdRng) {
        let contexts = arr2(&[[1.0, 0.0], [1.0, 0.0]]);
        for i in 0..rounds {
            let arm = estimator.select_arm(contexts.view(), rng).unwrap();
            let reward = (i % 2) as f64;
            estimator.update(contexts.row(arm), reward, rng).unwrap();
        }
    }

    #[test]
    fn test_argmax_prefers_lowest_index() {
        assert_eq!(argmax(&arr1(&[0.2, 0.7, 0.7, 0.1])), 1);
        assert_eq!(argmax(&arr1(&[0.5, 0.5])), 0);
        assert_eq!(argmax(&arr1(&[0.1, 0.2, 0.9])), 2);
    }

    #[test]
    fn test_warm_up_state() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(estimator.phase(), Phase::WarmUp);
        assert_eq!(estimator.window(), 0);

        drive(&mut estimator, 4, &mut rng);
        assert_eq!(estimator.round(), 4);
        assert_eq!(estimator.history_len(), 4);
        assert_eq!(estimator.phase(), Phase::WarmUp);
        assert!(estimator.theta_hat().is_none());
        assert!(estimator.trajectory().is_empty());
    }

    #[test]
    fn test_transition_matches_direct_fit() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(42);
        drive(&mut estimator, 5, &mut rng);

        assert_eq!(estimator.phase(), Phase::Refine);
        assert_eq!(estimator.window(), 1);

        let (x, y) = estimator.history().all().unwrap();
        let expected = estimator.config().mle().fit(x, y);
        let theta_hat = estimator.theta_hat().unwrap();
        assert_eq!(theta_hat, expected.view());
        assert_eq!(estimator.theta().unwrap(), theta_hat);
        assert_eq!(estimator.trajectory().len(), 1);
        assert_eq!(estimator.confidence_set().unwrap().center(), theta_hat);
        assert_eq!(estimator.confidence_set().unwrap().radius(), 2.0);
    }

    #[test]
    fn test_sgd_step_matches_formula() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(7);
        drive(&mut estimator, 5, &mut rng);
        let theta_hat = estimator.theta_hat().unwrap().to_owned();

        drive(&mut estimator, 1, &mut rng);
        assert_eq!(estimator.window(), 2);

        // The first window reuses the five warm-up rows
        let (x, y) = estimator.history().all().unwrap();
        let (wx, wy) = (x.slice(s![0..5, ..]), y.slice(s![0..5]));
        let grad = log_loss_gradient(wx, wy, theta_hat.view());
        let stepped = &theta_hat - &(grad * (1.0 / (5.0 * 2.0)));
        let ball = estimator.confidence_set().unwrap();
        let expected = ball.project(stepped);

        let theta = estimator.theta().unwrap();
        assert_abs_diff_eq!(theta[0], expected[0], epsilon = 1e-12);
        assert_abs_diff_eq!(theta[1], expected[1], epsilon = 1e-12);
    }

    #[test]
    fn test_projection_clips_large_steps() {
        let mut estimator = SgdTs::builder(2)
            .tau(4)
            .alpha(0.01)
            .radius(0.1)
            .horizon(50)
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let contexts = arr2(&[[3.0, -2.0], [-1.0, 4.0]]);

        for i in 0..40 {
            let arm = estimator.select_arm(contexts.view(), &mut rng).unwrap();
            estimator
                .update(contexts.row(arm), (i % 3 == 0) as u8 as f64, &mut rng)
                .unwrap();
            if let (Some(ball), Some(theta)) = (estimator.confidence_set(), estimator.theta()) {
                assert!(ball.distance(theta) <= ball.radius() + 1e-9);
            }
        }
        assert!(estimator.window() > 1);
    }

    #[test]
    fn test_transition_draw_centers_on_theta_hat() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(21);
        drive(&mut estimator, 4, &mut rng);

        let contexts = arr2(&[[1.0, 0.0], [1.0, 0.0]]);
        let arm = estimator.select_arm(contexts.view(), &mut rng).unwrap();
        let mut shadow = rng.clone();
        estimator.update(contexts.row(arm), 1.0, &mut rng).unwrap();

        let theta_hat = estimator.theta_hat().unwrap();
        let variance = estimator.config().schedule().variance(1).unwrap();
        let expected = sample_isotropic(theta_hat, variance, &mut shadow).unwrap();
        assert_eq!(estimator.theta_ts().unwrap(), expected.view());
    }

    #[test]
    fn test_window_draw_centers_on_trajectory_mean() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(21);
        drive(&mut estimator, 10, &mut rng);
        assert_eq!(estimator.window(), 2);

        let contexts = arr2(&[[1.0, 0.0], [1.0, 0.0]]);
        let mut shadow = rng.clone();
        estimator.select_arm(contexts.view(), &mut rng).unwrap();
        assert_eq!(estimator.window(), 3);

        let trajectory = estimator.trajectory();
        let mut mean = Array1::<f64>::zeros(2);
        for theta in trajectory {
            mean += theta;
        }
        mean /= trajectory.len() as f64;
        let variance = estimator.config().schedule().variance(3).unwrap();
        let expected = sample_isotropic(mean.view(), variance, &mut shadow).unwrap();

        let theta_ts = estimator.theta_ts().unwrap();
        assert_abs_diff_eq!(theta_ts[0], expected[0], epsilon = 1e-12);
        assert_abs_diff_eq!(theta_ts[1], expected[1], epsilon = 1e-12);
    }

    #[test]
    fn test_failed_transition_rolls_back_observation() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(4);
        let contexts = Array2::<f64>::zeros((2, 2));
        let huge = arr1(&[1e308, 1e308]);
        let unit = arr1(&[1.0, 0.0]);

        for row in [&huge, &huge, &huge, &unit] {
            estimator.select_arm(contexts.view(), &mut rng).unwrap();
            estimator.update(row.view(), 0.0, &mut rng).unwrap();
        }
        estimator.select_arm(contexts.view(), &mut rng).unwrap();

        // Four large rows overflow the warm-up gradient
        let err = estimator.update(huge.view(), 0.0, &mut rng).unwrap_err();
        assert!(matches!(err, BanditError::NumericalInstability { .. }));
        assert_eq!(estimator.history_len(), 4);
        assert_eq!(estimator.round(), 5);
        assert_eq!(estimator.phase(), Phase::WarmUp);

        estimator.update(unit.view(), 1.0, &mut rng).unwrap();
        assert_eq!(estimator.history_len(), 5);
        assert_eq!(estimator.phase(), Phase::Refine);

        let (x, y) = estimator.history().all().unwrap();
        assert_eq!(x.row(4), unit);
        let expected = estimator.config().mle().fit(x, y);
        assert_eq!(estimator.theta_hat().unwrap(), expected.view());
    }

    /// Refine-phase estimator (tau 5) at `round` whose iterates and Thompson
    /// sample all sit at `theta`
    fn refining_at(round: usize, theta: Array1<f64>) -> SgdTs {
        let mut history = History::new(2);
        for i in 0..round {
            history.push(arr1(&[1.0, 0.0]).view(), (i % 2) as f64);
        }
        let window = windows_opened(round, 5);
        let state = SgdTsState {
            round,
            history,
            theta_hat: Some(theta.clone()),
            trajectory: vec![theta.clone(); window],
            window,
            theta_ts: Some(theta),
        };
        SgdTs::restore(small().config().clone(), state).unwrap()
    }

    #[test]
    fn test_windows_opened() {
        assert_eq!(windows_opened(5, 5), 1);
        assert_eq!(windows_opened(6, 5), 2);
        assert_eq!(windows_opened(10, 5), 2);
        assert_eq!(windows_opened(11, 5), 3);
        assert_eq!(windows_opened(2, 1), 2);
        assert_eq!(windows_opened(3, 1), 3);
    }

    #[test]
    fn test_non_finite_scores_are_rejected() {
        let mut state = refining_at(7, arr1(&[0.0, 0.0])).snapshot();
        state.theta_ts = Some(arr1(&[5.0, -5.0]));
        let mut estimator = SgdTs::restore(small().config().clone(), state).unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        // 5e308 - 5e308 overflows to inf - inf
        let contexts = arr2(&[[0.0, 0.0], [1e308, 1e308]]);
        let err = estimator.select_arm(contexts.view(), &mut rng).unwrap_err();
        assert!(matches!(err, BanditError::NumericalInstability { .. }));
        assert_eq!(estimator.round(), 7);
        assert!(matches!(
            estimator.expectations(contexts.view()),
            Err(BanditError::NumericalInstability { .. })
        ));

        let contexts = arr2(&[[0.0, 1.0], [1.0, 0.0]]);
        assert_eq!(estimator.select_arm(contexts.view(), &mut rng).unwrap(), 1);
        assert_eq!(estimator.round(), 8);
    }

    #[test]
    fn test_failed_window_selection_keeps_state() {
        let mut estimator = refining_at(10, arr1(&[10.0, 10.0]));
        let mut rng = StdRng::seed_from_u64(13);
        let before = estimator.snapshot();
        assert_eq!(before.window, 2);

        // Round 11 opens a window; a positive sample scores this row as inf - inf
        let contexts = arr2(&[[1e308, -1e308], [0.0, 0.0]]);
        let err = estimator.select_arm(contexts.view(), &mut rng).unwrap_err();
        assert!(matches!(err, BanditError::NumericalInstability { .. }));
        assert_eq!(estimator.snapshot(), before);

        let contexts = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        estimator.select_arm(contexts.view(), &mut rng).unwrap();
        assert_eq!(estimator.round(), 11);
        assert_eq!(estimator.window(), 3);
        assert_eq!(estimator.trajectory().len(), 3);
    }

    #[test]
    fn test_select_past_warm_up_without_updates_fails() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(1);
        let contexts = Array2::<f64>::zeros((2, 2));

        for _ in 0..5 {
            estimator.select_arm(contexts.view(), &mut rng).unwrap();
        }
        let err = estimator.select_arm(contexts.view(), &mut rng).unwrap_err();
        assert!(matches!(err, BanditError::InvalidInput { .. }));
        assert_eq!(estimator.round(), 5);
    }

    #[test]
    fn test_update_does_not_touch_round() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(1);
        estimator.update(arr1(&[1.0, 1.0]).view(), 1.0, &mut rng).unwrap();
        estimator.update(arr1(&[1.0, 1.0]).view(), 0.0, &mut rng).unwrap();
        assert_eq!(estimator.round(), 0);
        assert_eq!(estimator.history_len(), 2);
    }

    #[test]
    fn test_invalid_inputs_leave_state_untouched() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(1);

        let wrong = Array2::<f64>::zeros((3, 2));
        assert!(estimator.select_arm(wrong.view(), &mut rng).is_err());
        assert_eq!(estimator.round(), 0);

        assert!(estimator.update(arr1(&[1.0]).view(), 1.0, &mut rng).is_err());
        assert!(estimator.update(arr1(&[1.0, 0.0]).view(), 2.0, &mut rng).is_err());
        assert_eq!(estimator.history_len(), 0);
    }

    #[test]
    fn test_expectations() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(11);
        let contexts = arr2(&[[1.0, 0.0], [0.0, 1.0]]);

        let prior = estimator.expectations(contexts.view()).unwrap();
        assert_eq!(prior, arr1(&[0.5, 0.5]));

        drive(&mut estimator, 5, &mut rng);
        let theta_ts = estimator.theta_ts().unwrap().to_owned();
        let expected = scores(contexts.view(), theta_ts.view());
        assert_eq!(estimator.expectations(contexts.view()).unwrap(), expected);
    }

    #[test]
    fn test_reset() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(5);
        drive(&mut estimator, 7, &mut rng);
        assert_eq!(estimator.phase(), Phase::Refine);

        estimator.reset();
        assert_eq!(estimator.round(), 0);
        assert_eq!(estimator.history_len(), 0);
        assert_eq!(estimator.phase(), Phase::WarmUp);
        assert_eq!(estimator.window(), 0);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(9);
        drive(&mut estimator, 8, &mut rng);

        let state = estimator.snapshot();
        assert_eq!(state.window, 2);
        assert_eq!(state.trajectory.len(), 2);

        let mut restored = SgdTs::restore(estimator.config().clone(), state).unwrap();
        assert_eq!(restored.snapshot(), estimator.snapshot());

        // Both continue identically from the same random stream
        let mut a = StdRng::seed_from_u64(100);
        let mut b = StdRng::seed_from_u64(100);
        drive(&mut estimator, 6, &mut a);
        drive(&mut restored, 6, &mut b);
        assert_eq!(restored.snapshot(), estimator.snapshot());
    }

    #[test]
    fn test_restore_rejects_inconsistent_state() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(9);
        drive(&mut estimator, 6, &mut rng);
        let config = estimator.config().clone();

        let mut state = estimator.snapshot();
        state.window = 5;
        assert!(SgdTs::restore(config.clone(), state).is_err());

        let mut state = estimator.snapshot();
        state.theta_ts = None;
        assert!(SgdTs::restore(config.clone(), state).is_err());

        let mut state = estimator.snapshot();
        state.trajectory[1] = arr1(&[100.0, 100.0]);
        assert!(SgdTs::restore(config.clone(), state).is_err());

        let state = estimator.snapshot();
        assert!(SgdTs::restore(SgdTsConfig::new(3), state).is_err());
    }

    #[test]
    fn test_restore_checks_window_cadence() {
        let mut estimator = small();
        let mut rng = StdRng::seed_from_u64(9);
        drive(&mut estimator, 11, &mut rng);
        let config = estimator.config().clone();
        assert_eq!(estimator.window(), 3);

        // Round 11 belongs to window 3, not 2
        let mut state = estimator.snapshot();
        state.window = 2;
        state.trajectory.pop();
        assert!(SgdTs::restore(config.clone(), state).is_err());

        // History must hold one row per round
        let mut state = estimator.snapshot();
        state.round = 14;
        assert!(SgdTs::restore(config.clone(), state).is_err());

        // A warm-up snapshot holding tau rows should already have been fitted
        let mut fresh = small();
        drive(&mut fresh, 4, &mut rng);
        let mut state = fresh.snapshot();
        state.round = 5;
        assert!(SgdTs::restore(config.clone(), state.clone()).is_ok());
        state.history.push(arr1(&[1.0, 0.0]).view(), 1.0);
        assert!(SgdTs::restore(config, state).is_err());
    }
}
