//! Configuration of [`PrioritizedReplayBuffer`](super::PrioritizedReplayBuffer).
use crate::ReplayError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Parameters of the transform from errors to priorities, `p = (|error| + eps)^alpha`.
///
/// # Examples
///
/// ```rust
/// use border_per::replay_buffer::PerConfig;
///
/// let config = PerConfig::default().eps(1e-3).alpha(0.7);
/// assert_eq!(config.alpha, 0.7);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PerConfig {
    /// Added to the absolute error so that no transition gets zero priority.
    /// Must be positive.
    pub eps: f32,

    /// Exponent for prioritization, in `[0, 1]`. A value of 0 results in uniform
    /// sampling.
    pub alpha: f32,
}

impl Default for PerConfig {
    fn default() -> Self {
        Self {
            eps: 0.01,
            alpha: 0.6,
        }
    }
}

impl PerConfig {
    /// Sets the priority floor `eps`.
    pub fn eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    /// Sets the prioritization exponent `alpha`.
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }
}

/// Configuration of [`PrioritizedReplayBuffer`](super::PrioritizedReplayBuffer).
///
/// # Examples
///
/// ```rust
/// use border_per::replay_buffer::{PerConfig, PrioritizedReplayBufferConfig};
///
/// let config = PrioritizedReplayBufferConfig::default()
///     .capacity(100_000)
///     .state_shape(vec![4, 84, 84])
///     .action_size(1)
///     .seed(42)
///     .per_config(PerConfig::default().alpha(0.6));
/// assert!(config.check().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PrioritizedReplayBufferConfig {
    /// Maximum number of transitions. When the buffer is full, new transitions
    /// replace the oldest ones.
    ///
    /// Must be at least 2, since the newest transition can only be sampled once
    /// the transition after it has been stored.
    pub capacity: usize,

    /// Shape of a state. The buffer stores states flattened in row-major order, so
    /// appended states must have `state_shape.iter().product()` elements.
    pub state_shape: Vec<usize>,

    /// Number of elements of an action vector.
    pub action_size: usize,

    /// Seed of the random number generator owned by the buffer.
    ///
    /// Only [`PrioritizedReplayBuffer::sample_batch`] draws from that generator;
    /// [`PrioritizedReplayBuffer::sample_batch_with`] takes the caller's.
    ///
    /// [`PrioritizedReplayBuffer::sample_batch`]: super::PrioritizedReplayBuffer::sample_batch
    /// [`PrioritizedReplayBuffer::sample_batch_with`]: super::PrioritizedReplayBuffer::sample_batch_with
    pub seed: u64,

    /// Priority transform.
    pub per_config: PerConfig,
}

impl Default for PrioritizedReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            state_shape: vec![1],
            action_size: 1,
            seed: 42,
            per_config: PerConfig::default(),
        }
    }
}

impl PrioritizedReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the shape of states.
    pub fn state_shape(mut self, state_shape: Vec<usize>) -> Self {
        self.state_shape = state_shape;
        self
    }

    /// Sets the size of action vectors.
    pub fn action_size(mut self, action_size: usize) -> Self {
        self.action_size = action_size;
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the priority transform.
    pub fn per_config(mut self, per_config: PerConfig) -> Self {
        self.per_config = per_config;
        self
    }

    /// Number of `f32` elements of a flattened state.
    pub fn state_dim(&self) -> usize {
        self.state_shape.iter().product()
    }

    /// Checks that every parameter is in its valid range.
    ///
    /// # Returns
    ///
    /// [`ReplayError::InvalidConfig`] naming the first out-of-range parameter.
    /// Out-of-range values are reported, never clamped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use border_per::{replay_buffer::PrioritizedReplayBufferConfig, ReplayError};
    ///
    /// let config = PrioritizedReplayBufferConfig::default().capacity(1);
    /// assert!(matches!(config.check(), Err(ReplayError::InvalidConfig(_))));
    /// ```
    pub fn check(&self) -> std::result::Result<(), ReplayError> {
        let invalid = |msg: String| -> std::result::Result<(), ReplayError> {
            Err(ReplayError::InvalidConfig(msg))
        };

        // The newest transition is only drawable once its successor is written.
        if self.capacity < 2 {
            return invalid(format!("capacity must be at least 2, got {}", self.capacity));
        }
        if self.state_shape.is_empty() {
            return invalid("state_shape must not be empty".to_string());
        }
        if self.state_shape.iter().any(|&d| d == 0) {
            return invalid(format!(
                "state_shape must not contain zero, got {:?}",
                self.state_shape
            ));
        }
        if self.action_size == 0 {
            return invalid("action_size must be positive".to_string());
        }

        let PerConfig { eps, alpha } = self.per_config;
        if !(eps.is_finite() && eps > 0.0) {
            return invalid(format!("eps must be positive, got {}", eps));
        }
        if !(0.0..=1.0).contains(&alpha) {
            return invalid(format!("alpha must be in [0, 1], got {}", alpha));
        }
        Ok(())
    }

    /// Loads the configuration from a YAML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the YAML file
    ///
    /// The loaded values are not checked; [`PrioritizedReplayBuffer::new`] does that.
    ///
    /// [`PrioritizedReplayBuffer::new`]: super::PrioritizedReplayBuffer::new
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the YAML file, created or truncated
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
