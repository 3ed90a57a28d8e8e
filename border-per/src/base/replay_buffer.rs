//! Replay buffer interface.
//!
//! The two traits separate the side that fills a buffer (environment interaction)
//! from the side that draws training batches from it (the learner). A single type
//! usually implements both, as [`PrioritizedReplayBuffer`] does.
//!
//! [`PrioritizedReplayBuffer`]: crate::replay_buffer::PrioritizedReplayBuffer
use anyhow::Result;

/// Interface for buffers that store experiences from environments.
///
/// # Type Parameters
///
/// * `Item` - The type of experience stored in the buffer
///
/// # Examples
///
/// ```rust
/// use border_per::{
///     replay_buffer::{PrioritizedReplayBuffer, PrioritizedReplayBufferConfig, Transition},
///     ExperienceBufferBase,
/// };
///
/// # fn main() -> anyhow::Result<()> {
/// let config = PrioritizedReplayBufferConfig::default().capacity(8);
/// let mut buffer = PrioritizedReplayBuffer::new(&config)?;
/// buffer.push(Transition {
///     state: vec![0.0],
///     action: vec![1.0],
///     reward: 1.0,
///     terminal: false,
///     error: 1.0,
/// })?;
/// assert_eq!(ExperienceBufferBase::len(&buffer), 1);
/// # Ok(())
/// # }
/// ```
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer.
    ///
    /// # Arguments
    ///
    /// * `tr` - The experience to store
    ///
    /// # Returns
    ///
    /// `Ok(())` if the experience was stored, or an error if it was rejected, for
    /// example because of a wrong row length. A rejected experience leaves the
    /// buffer unchanged.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the current number of experiences in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if nothing has been pushed yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for replay buffers that generate batches for training.
///
/// # Associated Types
///
/// * `Config` - Configuration parameters for the buffer
/// * `Batch` - The type of batch generated for training
pub trait ReplayBufferBase: Sized {
    /// Configuration parameters for the replay buffer.
    ///
    /// `Clone` allows building several buffers from one configuration.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Builds a new replay buffer from the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration parameters
    ///
    /// # Returns
    ///
    /// A new, empty replay buffer, or an error if a parameter is out of range
    fn build(config: &Self::Config) -> Result<Self>;

    /// Constructs a batch of experiences for training.
    ///
    /// # Arguments
    ///
    /// * `size` - The number of experiences to include in the batch
    ///
    /// # Returns
    ///
    /// A batch of exactly `size` experiences, or an error if `size` is zero or
    /// nothing can be sampled yet
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;

    /// Updates the priorities of experiences in the buffer.
    ///
    /// # Arguments
    ///
    /// * `ixs` - Sample indices carried by a batch returned from
    ///   [`ReplayBufferBase::batch`]
    /// * `errs` - New errors of those experiences, one per index
    ///
    /// # Returns
    ///
    /// An error if the lengths differ or an index does not refer to a stored
    /// experience. Updates before the offending index are kept.
    fn update_priority(&mut self, ixs: &[usize], errs: &[f32]) -> Result<()>;
}
