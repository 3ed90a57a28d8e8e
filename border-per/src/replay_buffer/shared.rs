//! A replay buffer shared between threads.
use super::{PrioritizedBatch, PrioritizedReplayBuffer, PrioritizedReplayBufferConfig};
use crate::ReplayError;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloneable handle to a [`PrioritizedReplayBuffer`] behind a single lock.
///
/// An update touches every node on a leaf-to-root path, which any concurrent sampling
/// descent may also read, so every operation holds the one lock for its whole
/// duration. Only one thread is expected to append and update priorities; others may
/// sample.
#[derive(Clone)]
pub struct SharedReplayBuffer {
    inner: Arc<Mutex<PrioritizedReplayBuffer>>,
}

impl SharedReplayBuffer {
    /// Wraps an existing buffer.
    pub fn new(buffer: PrioritizedReplayBuffer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    /// Builds a buffer from `config` and wraps it.
    pub fn build(config: &PrioritizedReplayBufferConfig) -> Result<Self, ReplayError> {
        Ok(Self::new(PrioritizedReplayBuffer::new(config)?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, PrioritizedReplayBuffer>, ReplayError> {
        self.inner.lock().map_err(|_| ReplayError::Poisoned)
    }

    /// See [`PrioritizedReplayBuffer::append`].
    pub fn append(
        &self,
        state: &[f32],
        action: &[f32],
        reward: f32,
        terminal: bool,
        error: f32,
    ) -> Result<usize, ReplayError> {
        self.lock()?.append(state, action, reward, terminal, error)
    }

    /// See [`PrioritizedReplayBuffer::sample_batch`].
    pub fn sample_batch(&self, batch_size: usize) -> Result<PrioritizedBatch, ReplayError> {
        self.lock()?.sample_batch(batch_size)
    }

    /// See [`PrioritizedReplayBuffer::sample_batch_with`].
    pub fn sample_batch_with<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<PrioritizedBatch, ReplayError> {
        self.lock()?.sample_batch_with(batch_size, rng)
    }

    /// See [`PrioritizedReplayBuffer::update_priority`].
    pub fn update_priority(&self, tree_index: usize, error: f32) -> Result<(), ReplayError> {
        self.lock()?.update_priority(tree_index, error)
    }

    /// Updates the priorities of a whole batch under one lock acquisition.
    ///
    /// Stops at the first invalid index; updates before it are kept.
    pub fn update_priorities(&self, ixs: &[usize], errs: &[f32]) -> Result<(), ReplayError> {
        if ixs.len() != errs.len() {
            return Err(ReplayError::ShapeMismatch {
                what: "errs",
                expected: ixs.len(),
                got: errs.len(),
            });
        }
        let mut buffer = self.lock()?;
        for (&ix, &err) in ixs.iter().zip(errs.iter()) {
            buffer.update_priority(ix, err)?;
        }
        Ok(())
    }

    /// See [`PrioritizedReplayBuffer::len`].
    pub fn len(&self) -> Result<usize, ReplayError> {
        Ok(self.lock()?.len())
    }

    /// See [`PrioritizedReplayBuffer::is_empty`].
    pub fn is_empty(&self) -> Result<bool, ReplayError> {
        Ok(self.lock()?.is_empty())
    }

    /// See [`PrioritizedReplayBuffer::total`].
    pub fn total(&self) -> Result<f32, ReplayError> {
        Ok(self.lock()?.total())
    }

    /// Runs `f` on the buffer while holding the lock.
    pub fn with<T>(&self, f: impl FnOnce(&mut PrioritizedReplayBuffer) -> T) -> Result<T, ReplayError> {
        let mut buffer = self.lock()?;
        Ok(f(&mut buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::SharedReplayBuffer;
    use crate::{replay_buffer::PrioritizedReplayBufferConfig, ReplayError};
    use std::thread;

    #[test]
    fn test_poisoned_lock() {
        let config = PrioritizedReplayBufferConfig::default().capacity(4);
        let buffer = SharedReplayBuffer::build(&config).unwrap();

        let buffer_ = buffer.clone();
        let _ = thread::spawn(move || {
            buffer_
                .with(|_| panic!("panic while holding the replay buffer"))
                .unwrap();
        })
        .join();

        assert_eq!(buffer.len(), Err(ReplayError::Poisoned));
    }

    #[test]
    fn test_update_priorities_length_mismatch() {
        let config = PrioritizedReplayBufferConfig::default().capacity(4);
        let buffer = SharedReplayBuffer::build(&config).unwrap();
        let ix = buffer.append(&[0.0], &[0.0], 0.0, false, 1.0).unwrap();
        assert!(matches!(
            buffer.update_priorities(&[ix], &[0.1, 0.2]),
            Err(ReplayError::ShapeMismatch { .. })
        ));
    }
}
