//! Prioritized replay buffer.
use super::{
    priority::PriorityTransform, storage::TransitionStorage, PrioritizedBatch,
    PrioritizedReplayBufferConfig, Transition,
};
use crate::{ExperienceBufferBase, ReplayBufferBase, ReplayError, SumTree};
use anyhow::Result;
use log::{debug, info, trace};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A fixed-capacity circular store of transitions with prioritized sampling.
///
/// Transitions are written at a circular cursor `position`; the sum tree leaf written
/// with each transition refers to the same slot, so a sampled leaf maps directly to
/// the row it was inserted for. The next state of the transition at slot `i` is the
/// state at slot `i + 1` (mod capacity).
///
/// New transitions enter with the largest priority produced so far, so that each is
/// likely to be replayed at least once before its error is known.
///
/// The newest transition has no next state yet: its successor slot holds zeros before
/// the first wrap and the oldest, unrelated state after it. Its leaf is therefore held
/// at zero mass, and never drawn, until the following append writes the successor and
/// releases the held priority.
///
/// # Examples
///
/// ```rust
/// use border_per::replay_buffer::{PrioritizedReplayBuffer, PrioritizedReplayBufferConfig};
///
/// # fn main() -> Result<(), border_per::ReplayError> {
/// let config = PrioritizedReplayBufferConfig::default()
///     .capacity(4)
///     .state_shape(vec![2])
///     .action_size(1);
/// let mut buffer = PrioritizedReplayBuffer::new(&config)?;
///
/// buffer.append(&[0.0, 1.0], &[0.0], 1.0, false, 1.0)?;
/// buffer.append(&[1.0, 2.0], &[1.0], 0.0, false, 0.5)?;
/// buffer.append(&[2.0, 3.0], &[0.0], 0.0, false, 0.2)?;
///
/// let batch = buffer.sample_batch(2)?;
/// for (&ix, &error) in batch.tree_indices.iter().zip([0.3f32, 0.1].iter()) {
///     buffer.update_priority(ix, error)?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct PrioritizedReplayBuffer {
    capacity: usize,
    state_shape: Vec<usize>,

    /// Slot written by the next append.
    position: usize,

    /// Set once `position` has wrapped around.
    full: bool,

    /// Tree index and priority of the newest transition, whose leaf holds zero until
    /// its successor is written.
    held: Option<(usize, f32)>,

    storage: TransitionStorage,
    sum_tree: SumTree,
    priority: PriorityTransform,
    rng: StdRng,
}

impl PrioritizedReplayBuffer {
    /// Creates a buffer, allocating every array at full capacity.
    pub fn new(config: &PrioritizedReplayBufferConfig) -> Result<Self, ReplayError> {
        config.check()?;
        let capacity = config.capacity;
        info!(
            "Construct prioritized replay buffer with capacity = {}, state_shape = {:?}, action_size = {}",
            capacity, config.state_shape, config.action_size
        );

        Ok(Self {
            capacity,
            state_shape: config.state_shape.clone(),
            position: 0,
            full: false,
            held: None,
            storage: TransitionStorage::new(capacity, config.state_dim(), config.action_size),
            sum_tree: SumTree::new(capacity),
            priority: PriorityTransform::new(&config.per_config),
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    fn check_error(error: f32) -> Result<(), ReplayError> {
        if error.is_finite() {
            Ok(())
        } else {
            Err(ReplayError::NonFiniteError(error))
        }
    }

    /// Appends a transition, overwriting the oldest one when the buffer is full.
    ///
    /// The transition gets the running maximum priority, which includes the priority
    /// of `error` itself. That priority is held until the next append; in the meantime
    /// the transition cannot be sampled. The previously newest transition, whose next
    /// state is now in place, becomes drawable with its held priority.
    ///
    /// Returns the tree index of the new transition.
    pub fn append(
        &mut self,
        state: &[f32],
        action: &[f32],
        reward: f32,
        terminal: bool,
        error: f32,
    ) -> Result<usize, ReplayError> {
        self.storage.check_row(state, action)?;
        Self::check_error(error)?;

        let p = self.priority.priority_for(error);
        let p = self.priority.max().map_or(p, |max_p| max_p.max(p));

        let i = self.position;
        self.storage.write(i, state, action, reward, terminal);
        debug_assert_eq!(self.sum_tree.cursor(), i);
        let ix = self.sum_tree.add(0.0, i);
        if let Some((prev_ix, prev_p)) = self.held.replace((ix, p)) {
            let released = self.sum_tree.update(prev_ix, prev_p);
            debug_assert!(released && prev_ix != ix);
        }
        trace!("append: slot = {}, tree index = {}, priority = {}", i, ix, p);

        self.position = self.storage.next(i);
        if self.position == 0 && !self.full {
            self.full = true;
            debug!("Replay buffer is full, capacity = {}", self.capacity);
        }

        Ok(ix)
    }

    /// Samples a batch with the random number generator owned by the buffer.
    ///
    /// The generator is seeded from the config, so sampling is reproducible for a
    /// fixed sequence of calls.
    pub fn sample_batch(&mut self, batch_size: usize) -> Result<PrioritizedBatch, ReplayError> {
        let n_stored = self.len();
        sample_stratified(
            &self.sum_tree,
            &self.storage,
            &self.priority,
            n_stored,
            batch_size,
            &mut self.rng,
        )
    }

    /// Samples a batch with stratified sampling, drawing from `rng`.
    ///
    /// `[0, total)` is split into `batch_size` segments of equal mass and one value is
    /// drawn uniformly from each segment, so that the batch spreads over the whole
    /// priority mass. The newest transition is never drawn, so at least two
    /// transitions must have been appended; otherwise [`ReplayError::EmptyBuffer`] is
    /// returned.
    ///
    /// # Panics
    ///
    /// Panics if `min_priority / total > 1`, which means the priority bookkeeping is
    /// broken.
    pub fn sample_batch_with<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<PrioritizedBatch, ReplayError> {
        sample_stratified(
            &self.sum_tree,
            &self.storage,
            &self.priority,
            self.len(),
            batch_size,
            rng,
        )
    }

    /// Sets the priority of the transition at `tree_index` from its new error.
    ///
    /// For the newest transition, the held priority is replaced and the leaf stays at
    /// zero until the next append.
    ///
    /// Returns [`ReplayError::IndexOutOfRange`] without touching the tree if
    /// `tree_index` does not refer to a stored transition.
    pub fn update_priority(&mut self, tree_index: usize, error: f32) -> Result<(), ReplayError> {
        Self::check_error(error)?;
        if self.sum_tree.priority(tree_index).is_none() {
            return Err(ReplayError::IndexOutOfRange(tree_index));
        }

        let p = self.priority.priority_for(error);
        match self.held.as_mut() {
            Some((ix, held_p)) if *ix == tree_index => *held_p = p,
            _ => {
                let updated = self.sum_tree.update(tree_index, p);
                debug_assert!(updated);
            }
        }
        trace!("update_priority: tree index = {}, priority = {}", tree_index, p);
        Ok(())
    }

    /// Tree index and priority of the newest transition, which is held out of
    /// sampling until the next append.
    pub fn held(&self) -> Option<(usize, f32)> {
        self.held
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity
        } else {
            self.position
        }
    }

    /// Returns `true` if nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot written by the next append.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns `true` once the buffer has wrapped around.
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Shape of stored states.
    pub fn state_shape(&self) -> &[usize] {
        &self.state_shape
    }

    /// Total priority mass.
    pub fn total(&self) -> f32 {
        self.sum_tree.total()
    }

    /// Largest priority computed so far; never decreases.
    pub fn max_priority(&self) -> Option<f32> {
        self.priority.max()
    }

    /// Smallest priority computed so far; never increases.
    pub fn min_priority(&self) -> Option<f32> {
        self.priority.min()
    }

    /// The sum tree holding the priorities.
    pub fn sum_tree(&self) -> &SumTree {
        &self.sum_tree
    }

    /// State stored at `slot`, if the slot holds a transition.
    pub fn state(&self, slot: usize) -> Option<&[f32]> {
        if slot < self.len() {
            Some(self.storage.state(slot))
        } else {
            None
        }
    }

    /// Action stored at `slot`, if the slot holds a transition.
    pub fn action(&self, slot: usize) -> Option<&[f32]> {
        if slot < self.len() {
            Some(self.storage.action(slot))
        } else {
            None
        }
    }

    /// Sum of the stored rewards.
    pub fn sum_rewards(&self) -> f32 {
        self.storage.sum_rewards(self.len())
    }

    /// Number of stored transitions with the terminal flag set.
    pub fn num_terminal_flags(&self) -> usize {
        self.storage.num_terminal_flags(self.len())
    }
}

/// Stratified sampling over the drawable priority mass.
///
/// Takes the fields it reads separately from the generator, so that the buffer can
/// lend its own generator mutably while the tree and storage are borrowed.
fn sample_stratified<R: Rng + ?Sized>(
    sum_tree: &SumTree,
    storage: &TransitionStorage,
    priority: &PriorityTransform,
    n_stored: usize,
    batch_size: usize,
    rng: &mut R,
) -> Result<PrioritizedBatch, ReplayError> {
    if batch_size == 0 {
        return Err(ReplayError::InvalidBatchSize(batch_size));
    }
    // The newest transition is held at zero mass.
    let min_priority = match priority.min() {
        Some(p) if n_stored > 1 => p,
        _ => return Err(ReplayError::EmptyBuffer),
    };

    let total = sum_tree.total();
    let segment = total / batch_size as f32;
    let state_dim = storage.state_dim();
    let action_size = storage.action_size();

    let mut states = Vec::with_capacity(batch_size * state_dim);
    let mut next_states = Vec::with_capacity(batch_size * state_dim);
    let mut actions = Vec::with_capacity(batch_size * action_size);
    let mut rewards = Vec::with_capacity(batch_size);
    let mut terminals = Vec::with_capacity(batch_size);
    let mut tree_indices = Vec::with_capacity(batch_size);
    let mut probabilities = Vec::with_capacity(batch_size);

    for k in 0..batch_size {
        let a = segment * k as f32;
        let b = segment * (k + 1) as f32;
        let s = a + rng.gen::<f32>() * (b - a);
        let (ix, p, i) = sum_tree.get(s);
        let j = storage.next(i);

        states.extend_from_slice(storage.state(i));
        next_states.extend_from_slice(storage.state(j));
        actions.extend_from_slice(storage.action(i));
        rewards.push(storage.reward(i));
        terminals.push(storage.terminal(j));
        tree_indices.push(ix);
        probabilities.push(p / total);
    }

    let min_probability = min_priority / total;
    assert!(
        min_probability <= 1.0,
        "P_min violates cdf: min_priority = {}, total = {}",
        min_priority,
        total
    );
    trace!("sample_batch: tree indices = {:?}", tree_indices);

    Ok(PrioritizedBatch {
        states,
        actions,
        rewards,
        next_states,
        terminals,
        tree_indices,
        probabilities,
        min_probability,
        n_stored,
        state_dim,
        action_size,
    })
}

impl ExperienceBufferBase for PrioritizedReplayBuffer {
    type Item = Transition;

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        self.append(&tr.state, &tr.action, tr.reward, tr.terminal, tr.error)?;
        Ok(())
    }

    fn len(&self) -> usize {
        PrioritizedReplayBuffer::len(self)
    }
}

impl ReplayBufferBase for PrioritizedReplayBuffer {
    type Config = PrioritizedReplayBufferConfig;
    type Batch = PrioritizedBatch;

    fn build(config: &Self::Config) -> Result<Self> {
        Ok(Self::new(config)?)
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        Ok(self.sample_batch(size)?)
    }

    fn update_priority(&mut self, ixs: &[usize], errs: &[f32]) -> Result<()> {
        if ixs.len() != errs.len() {
            return Err(ReplayError::ShapeMismatch {
                what: "errs",
                expected: ixs.len(),
                got: errs.len(),
            }
            .into());
        }
        for (&ix, &err) in ixs.iter().zip(errs.iter()) {
            PrioritizedReplayBuffer::update_priority(self, ix, err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::PrioritizedReplayBuffer;
    use crate::{
        replay_buffer::{PerConfig, PrioritizedReplayBufferConfig, Transition},
        ExperienceBufferBase, ReplayBufferBase, ReplayError,
    };
    use anyhow::Result;
    use rand::{rngs::StdRng, SeedableRng};
    use test_log::test;

    fn config(capacity: usize) -> PrioritizedReplayBufferConfig {
        PrioritizedReplayBufferConfig::default()
            .capacity(capacity)
            .state_shape(vec![1])
            .action_size(1)
            .per_config(PerConfig::default().eps(0.01).alpha(0.6))
    }

    fn append_value(buffer: &mut PrioritizedReplayBuffer, v: f32, error: f32) -> usize {
        buffer.append(&[v], &[v], v, false, error).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        for &capacity in [0usize, 1].iter() {
            assert!(matches!(
                PrioritizedReplayBuffer::new(&config(capacity)),
                Err(ReplayError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_sample_errors() {
        let mut buffer = PrioritizedReplayBuffer::new(&config(4)).unwrap();
        assert_eq!(buffer.sample_batch(1), Err(ReplayError::EmptyBuffer));

        // A single transition has no next state yet.
        append_value(&mut buffer, 0.0, 1.0);
        assert_eq!(buffer.sample_batch(1), Err(ReplayError::EmptyBuffer));
        assert_eq!(buffer.sample_batch(0), Err(ReplayError::InvalidBatchSize(0)));

        append_value(&mut buffer, 1.0, 1.0);
        assert!(buffer.sample_batch(1).is_ok());
    }

    #[test]
    fn test_append_rejects_bad_rows() {
        let mut buffer = PrioritizedReplayBuffer::new(&config(4)).unwrap();
        assert!(matches!(
            buffer.append(&[0.0, 1.0], &[0.0], 0.0, false, 1.0),
            Err(ReplayError::ShapeMismatch { what: "state", .. })
        ));
        assert_eq!(
            buffer.append(&[0.0], &[0.0], 0.0, false, f32::NAN).err().map(|e| e.to_string()),
            Some("Error value must be finite, got NaN".to_string())
        );
        assert!(buffer.is_empty());
        assert_eq!(buffer.total(), 0.0);
    }

    #[test]
    fn test_new_transition_gets_max_priority() {
        let mut buffer = PrioritizedReplayBuffer::new(&config(4)).unwrap();
        let ix0 = append_value(&mut buffer, 0.0, 2.0);
        let ix1 = append_value(&mut buffer, 1.0, 0.0);

        let p_max = (2.0f32 + 0.01).powf(0.6);
        assert_eq!(buffer.sum_tree().priority(ix0), Some(p_max));
        assert_eq!(buffer.sum_tree().priority(ix1), Some(0.0));
        assert_eq!(buffer.held(), Some((ix1, p_max)));
        assert_eq!(buffer.min_priority(), Some(0.01f32.powf(0.6)));

        let ix2 = append_value(&mut buffer, 2.0, 0.0);
        assert_eq!(buffer.sum_tree().priority(ix1), Some(p_max));
        assert_eq!(buffer.held(), Some((ix2, p_max)));
        assert_eq!(buffer.total(), 2.0 * p_max);
    }

    #[test]
    fn test_update_priority_of_newest_transition() {
        let mut buffer = PrioritizedReplayBuffer::new(&config(4)).unwrap();
        append_value(&mut buffer, 0.0, 2.0);
        let ix = append_value(&mut buffer, 1.0, 2.0);
        let total = buffer.total();

        buffer.update_priority(ix, 0.5).unwrap();
        let p = (0.5f32 + 0.01).powf(0.6);
        assert_eq!(buffer.held(), Some((ix, p)));
        assert_eq!(buffer.sum_tree().priority(ix), Some(0.0));
        assert_eq!(buffer.total(), total);

        append_value(&mut buffer, 2.0, 2.0);
        assert_eq!(buffer.sum_tree().priority(ix), Some(p));
    }

    #[test]
    fn test_update_priority() {
        let mut buffer = PrioritizedReplayBuffer::new(&config(4)).unwrap();
        let ix = append_value(&mut buffer, 0.0, 2.0);
        append_value(&mut buffer, 1.0, 2.0);

        buffer.update_priority(ix, 0.5).unwrap();
        assert_eq!(buffer.sum_tree().priority(ix), Some((0.5f32 + 0.01).powf(0.6)));

        let total = buffer.total();
        let nodes = buffer.sum_tree().nodes().to_vec();
        buffer.update_priority(ix, 0.5).unwrap();
        assert_eq!(buffer.total(), total);
        assert_eq!(buffer.sum_tree().nodes(), nodes.as_slice());
    }

    #[test]
    fn test_update_priority_out_of_range() {
        let mut buffer = PrioritizedReplayBuffer::new(&config(4)).unwrap();
        append_value(&mut buffer, 0.0, 1.0);
        let nodes = buffer.sum_tree().nodes().to_vec();
        let max_p = buffer.max_priority();

        // Internal node, a leaf never written and past the end of the tree.
        for &ix in [0usize, 4, 100].iter() {
            assert_eq!(
                buffer.update_priority(ix, 10.0),
                Err(ReplayError::IndexOutOfRange(ix))
            );
        }
        assert_eq!(buffer.sum_tree().nodes(), nodes.as_slice());
        assert_eq!(buffer.max_priority(), max_p);
    }

    #[test]
    #[should_panic(expected = "P_min violates cdf")]
    fn test_min_probability_above_one_panics() {
        let mut buffer = PrioritizedReplayBuffer::new(&config(4)).unwrap();
        append_value(&mut buffer, 0.0, 1.0);
        append_value(&mut buffer, 1.0, 1.0);
        buffer.priority.force_min(buffer.total() * 2.0);
        let _ = buffer.sample_batch(1);
    }

    #[test]
    fn test_sampling_is_reproducible() {
        let mut buffer = PrioritizedReplayBuffer::new(&config(16)).unwrap();
        for i in 0..16 {
            let ix = append_value(&mut buffer, i as f32, 1.0);
            buffer.update_priority(ix, i as f32).unwrap();
        }

        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);
        let b1 = buffer.sample_batch_with(8, &mut rng1).unwrap();
        let b2 = buffer.sample_batch_with(8, &mut rng2).unwrap();
        assert_eq!(b1, b2);
    }

    #[test]
    fn test_own_rng_advances() {
        let mut buffer = PrioritizedReplayBuffer::new(&config(64)).unwrap();
        for i in 0..64 {
            append_value(&mut buffer, i as f32, 1.0);
        }

        let b1 = buffer.sample_batch(4).unwrap();
        let b2 = buffer.sample_batch(4).unwrap();
        assert_ne!(b1.tree_indices, b2.tree_indices);

        // Same seed, same sequence.
        let mut buffer_ = PrioritizedReplayBuffer::new(&config(64)).unwrap();
        for i in 0..64 {
            append_value(&mut buffer_, i as f32, 1.0);
        }
        assert_eq!(buffer_.sample_batch(4).unwrap(), b1);
    }

    #[test]
    fn test_trait_interface() -> Result<()> {
        let mut buffer = PrioritizedReplayBuffer::build(&config(8))?;
        for i in 0..3 {
            buffer.push(Transition {
                state: vec![i as f32],
                action: vec![0.0],
                reward: 1.0,
                terminal: i == 2,
                error: 1.0,
            })?;
        }
        assert_eq!(ExperienceBufferBase::len(&buffer), 3);
        assert_eq!(buffer.num_terminal_flags(), 1);
        assert_eq!(buffer.sum_rewards(), 3.0);

        let batch = buffer.batch(4)?;
        let errs = vec![0.1; batch.len()];
        ReplayBufferBase::update_priority(&mut buffer, &batch.tree_indices, &errs)?;
        assert!(ReplayBufferBase::update_priority(&mut buffer, &batch.tree_indices, &[]).is_err());
        Ok(())
    }
}
