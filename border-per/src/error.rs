//! Errors in the library.
use thiserror::Error;

/// Errors raised by the replay buffer and its sum tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplayError {
    /// A construction parameter is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Sampling was requested before any transition could be drawn. The newest
    /// transition is never drawn, so this holds until two transitions are appended.
    #[error("Cannot sample from an empty replay buffer")]
    EmptyBuffer,

    /// The requested batch size was zero.
    #[error("Batch size must be positive, got {0}")]
    InvalidBatchSize(usize),

    /// The tree index does not refer to a stored transition.
    #[error("Tree index {0} does not refer to a stored transition")]
    IndexOutOfRange(usize),

    /// A row or slice had an unexpected length.
    #[error("Length of {what} must be {expected}, got {got}")]
    ShapeMismatch {
        /// Name of the mismatched value.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },

    /// The error value used to compute a priority was NaN or infinite.
    #[error("Error value must be finite, got {0}")]
    NonFiniteError(f32),

    /// Another thread panicked while holding the shared buffer.
    #[error("Replay buffer lock was poisoned")]
    Poisoned,
}
