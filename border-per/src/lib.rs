#![warn(missing_docs)]
//! Prioritized experience replay for reinforcement learning.
//!
//! The crate pairs a [`SumTree`], which samples leaves in proportion to their
//! priorities, with a fixed-capacity circular store of transitions
//! ([`replay_buffer::PrioritizedReplayBuffer`]). Errors reported by the learner are
//! turned into priorities `(|error| + eps)^alpha`, batches are drawn by stratified
//! sampling over the priority mass and come with the probabilities needed for
//! importance sampling weights.
pub mod error;
pub mod replay_buffer;

mod base;
pub use base::{ExperienceBufferBase, ReplayBufferBase};
pub use error::ReplayError;

mod sum_tree;
pub use sum_tree::SumTree;
