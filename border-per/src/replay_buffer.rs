//! Prioritized experience replay.
//!
//! [`PrioritizedReplayBuffer`] stores transitions in fixed-capacity circular arrays and
//! keeps their priorities in a [`SumTree`](crate::SumTree), so that inserting,
//! re-prioritizing and sampling a transition all take $O(\log N)$ time.
//!
//! A typical training loop appends one transition per environment step, samples a
//! batch per optimization step and pushes the new errors of the batch back:
//!
//! ```rust
//! use border_per::replay_buffer::{
//!     BetaScheduler, PerConfig, PrioritizedReplayBuffer, PrioritizedReplayBufferConfig,
//! };
//!
//! # fn main() -> Result<(), border_per::ReplayError> {
//! let config = PrioritizedReplayBufferConfig::default()
//!     .capacity(1000)
//!     .state_shape(vec![4])
//!     .action_size(1)
//!     .seed(42)
//!     .per_config(PerConfig::default().eps(0.01).alpha(0.6));
//! let mut buffer = PrioritizedReplayBuffer::new(&config)?;
//! let mut beta = BetaScheduler::new(0.4, 1.0, 1000);
//!
//! for t in 0..100 {
//!     let state = [t as f32; 4];
//!     buffer.append(&state, &[0.0], 1.0, t % 10 == 9, 1.0)?;
//! }
//!
//! let batch = buffer.sample_batch(32)?;
//! let weights = batch.weights(beta.beta());
//! assert!(weights.iter().all(|&w| w <= 1.0 + 1e-6));
//! for &ix in batch.tree_indices.iter() {
//!     buffer.update_priority(ix, 0.5)?;
//! }
//! beta.step();
//! # Ok(())
//! # }
//! ```
mod base;
mod batch;
mod beta_scheduler;
mod config;
mod priority;
mod shared;
mod storage;
pub use base::PrioritizedReplayBuffer;
pub use batch::{PrioritizedBatch, Transition};
pub use beta_scheduler::BetaScheduler;
pub use config::{PerConfig, PrioritizedReplayBufferConfig};
pub use priority::PriorityTransform;
pub use shared::SharedReplayBuffer;
