//! Annealing of the importance sampling exponent.
use serde::{Deserialize, Serialize};

/// Linear schedule of $\beta$ over optimization steps.
///
/// $\beta$ belongs to the learner: the buffer only returns probabilities, and
/// [`PrioritizedBatch::weights`](super::PrioritizedBatch::weights) takes the current
/// value from this schedule.
///
/// ```rust
/// use border_per::replay_buffer::BetaScheduler;
///
/// let mut beta = BetaScheduler::new(0.4, 1.0, 2);
/// assert_eq!(beta.beta(), 0.4);
/// beta.step();
/// assert!((beta.beta() - 0.7).abs() < 1e-6);
/// beta.step();
/// beta.step();
/// assert_eq!(beta.beta(), 1.0);
/// ```
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct BetaScheduler {
    /// $\beta$ at the first optimization step.
    pub beta_0: f32,

    /// $\beta$ once `n_opts_final` steps have been taken.
    pub beta_final: f32,

    /// Number of steps over which $\beta$ moves from `beta_0` to `beta_final`.
    pub n_opts_final: usize,

    n_opts: usize,
}

impl Default for BetaScheduler {
    fn default() -> Self {
        Self::new(0.4, 1.0, 500_000)
    }
}

impl BetaScheduler {
    /// Creates a schedule at step zero.
    pub fn new(beta_0: f32, beta_final: f32, n_opts_final: usize) -> Self {
        Self {
            beta_0,
            beta_final,
            n_opts_final,
            n_opts: 0,
        }
    }

    /// Current value of $\beta$.
    pub fn beta(&self) -> f32 {
        if self.n_opts >= self.n_opts_final {
            return self.beta_final;
        }
        let progress = self.n_opts as f32 / self.n_opts_final as f32;
        self.beta_0 + (self.beta_final - self.beta_0) * progress
    }

    /// Number of optimization steps taken.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Advances the schedule by one optimization step.
    pub fn step(&mut self) {
        self.n_opts = self.n_opts.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::BetaScheduler;

    #[test]
    fn test_zero_length_schedule() {
        let beta = BetaScheduler::new(0.4, 1.0, 0);
        assert_eq!(beta.beta(), 1.0);
    }

    #[test]
    fn test_monotone() {
        let mut beta = BetaScheduler::new(0.4, 1.0, 10);
        let mut prev = beta.beta();
        for _ in 0..20 {
            beta.step();
            assert!(beta.beta() >= prev);
            prev = beta.beta();
        }
        assert_eq!(beta.n_opts(), 20);
        assert_eq!(beta.beta(), 1.0);
    }
}
