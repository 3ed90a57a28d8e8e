//! Transitions pushed into the buffer and batches sampled from it.

/// A transition together with the error used to compute its initial priority.
///
/// This is the item pushed through
/// [`ExperienceBufferBase`](crate::ExperienceBufferBase).
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State before the transition, flattened in row-major order.
    pub state: Vec<f32>,

    /// Action taken in `state`.
    pub action: Vec<f32>,

    /// Reward received.
    pub reward: f32,

    /// `true` if the episode ended entering this slot.
    pub terminal: bool,

    /// Training error; its priority seeds the running maximum.
    pub error: f32,
}

/// A batch sampled with priorities.
///
/// States and actions are flattened row-major, one row per sample. The next state of
/// sample `i` is the state stored in the slot after it, and `terminals[i]` is the
/// terminal flag of that following slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PrioritizedBatch {
    /// States, `len() * state_dim` elements.
    pub states: Vec<f32>,

    /// Actions, `len() * action_size` elements.
    pub actions: Vec<f32>,

    /// Rewards.
    pub rewards: Vec<f32>,

    /// Next states, `len() * state_dim` elements.
    pub next_states: Vec<f32>,

    /// Terminal flags of the next states.
    pub terminals: Vec<bool>,

    /// Tree indices of the samples, to be passed back with new errors.
    pub tree_indices: Vec<usize>,

    /// Sampling probability `P_i = p_i / total` of each sample.
    pub probabilities: Vec<f32>,

    /// `P_min = min_priority / total`.
    pub min_probability: f32,

    /// Number of transitions in the buffer when the batch was drawn.
    pub n_stored: usize,

    pub(super) state_dim: usize,
    pub(super) action_size: usize,
}

impl PrioritizedBatch {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Returns `true` if the batch has no samples.
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// State of sample `i`.
    pub fn state(&self, i: usize) -> &[f32] {
        &self.states[i * self.state_dim..(i + 1) * self.state_dim]
    }

    /// Next state of sample `i`.
    pub fn next_state(&self, i: usize) -> &[f32] {
        &self.next_states[i * self.state_dim..(i + 1) * self.state_dim]
    }

    /// Action of sample `i`.
    pub fn action(&self, i: usize) -> &[f32] {
        &self.actions[i * self.action_size..(i + 1) * self.action_size]
    }

    /// Importance sampling weights for exponent `beta`.
    ///
    /// The weight is $w_i=\left(N P(i)\right)^{-\beta}$ normalized by
    /// $\left(N P_{min}\right)^{-\beta}$, where $N$ is the number of stored transitions.
    /// Since `P_min` bounds every sampling probability from below, the weights are at
    /// most 1.
    pub fn weights(&self, beta: f32) -> Vec<f32> {
        let n = self.n_stored as f32;
        let w_max = (n * self.min_probability).powf(-beta);
        self.probabilities
            .iter()
            .map(|&p| (n * p).powf(-beta) / w_max)
            .collect()
    }
}
