//! Fixed-capacity parallel arrays of transition fields.
use crate::ReplayError;

/// Rows of states, actions, rewards and terminal flags, addressed by slot.
///
/// States and actions are stored flattened, one row of `state_dim` or `action_size`
/// elements per slot. All arrays are allocated once and overwritten in place.
pub(super) struct TransitionStorage {
    capacity: usize,
    state_dim: usize,
    action_size: usize,
    states: Vec<f32>,
    actions: Vec<f32>,
    rewards: Vec<f32>,
    terminals: Vec<bool>,
}

impl TransitionStorage {
    pub fn new(capacity: usize, state_dim: usize, action_size: usize) -> Self {
        Self {
            capacity,
            state_dim,
            action_size,
            states: vec![0f32; capacity * state_dim],
            actions: vec![0f32; capacity * action_size],
            rewards: vec![0f32; capacity],
            terminals: vec![false; capacity],
        }
    }

    /// Checks the row lengths of a transition before anything is written.
    pub fn check_row(&self, state: &[f32], action: &[f32]) -> Result<(), ReplayError> {
        if state.len() != self.state_dim {
            return Err(ReplayError::ShapeMismatch {
                what: "state",
                expected: self.state_dim,
                got: state.len(),
            });
        }
        if action.len() != self.action_size {
            return Err(ReplayError::ShapeMismatch {
                what: "action",
                expected: self.action_size,
                got: action.len(),
            });
        }
        Ok(())
    }

    /// Overwrites slot `i`. Row lengths must have been checked with `check_row`.
    pub fn write(&mut self, i: usize, state: &[f32], action: &[f32], reward: f32, terminal: bool) {
        debug_assert!(i < self.capacity);
        let s = i * self.state_dim;
        self.states[s..s + self.state_dim].copy_from_slice(state);
        let a = i * self.action_size;
        self.actions[a..a + self.action_size].copy_from_slice(action);
        self.rewards[i] = reward;
        self.terminals[i] = terminal;
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn action_size(&self) -> usize {
        self.action_size
    }

    /// Slot following `i` in circular order.
    #[inline]
    pub fn next(&self, i: usize) -> usize {
        (i + 1) % self.capacity
    }

    pub fn state(&self, i: usize) -> &[f32] {
        let s = i * self.state_dim;
        &self.states[s..s + self.state_dim]
    }

    pub fn action(&self, i: usize) -> &[f32] {
        let a = i * self.action_size;
        &self.actions[a..a + self.action_size]
    }

    pub fn reward(&self, i: usize) -> f32 {
        self.rewards[i]
    }

    pub fn terminal(&self, i: usize) -> bool {
        self.terminals[i]
    }

    /// Sum of the rewards of the first `len` slots.
    pub fn sum_rewards(&self, len: usize) -> f32 {
        self.rewards[..len].iter().sum()
    }

    /// Number of set terminal flags among the first `len` slots.
    pub fn num_terminal_flags(&self, len: usize) -> usize {
        self.terminals[..len].iter().filter(|&&t| t).count()
    }
}

#[cfg(test)]
mod tests {
    use super::TransitionStorage;
    use crate::ReplayError;

    #[test]
    fn test_write_and_read_rows() {
        let mut storage = TransitionStorage::new(3, 2, 1);
        storage.write(1, &[1.0, 2.0], &[3.0], 0.5, true);

        assert_eq!(storage.state(1), &[1.0, 2.0]);
        assert_eq!(storage.action(1), &[3.0]);
        assert_eq!(storage.reward(1), 0.5);
        assert!(storage.terminal(1));
        assert_eq!(storage.state(0), &[0.0, 0.0]);
        assert_eq!(storage.next(2), 0);
        assert_eq!(storage.num_terminal_flags(3), 1);
        assert_eq!(storage.sum_rewards(3), 0.5);
    }

    #[test]
    fn test_check_row() {
        let storage = TransitionStorage::new(3, 2, 1);
        assert_eq!(storage.check_row(&[0.0, 0.0], &[0.0]), Ok(()));
        assert_eq!(
            storage.check_row(&[0.0], &[0.0]),
            Err(ReplayError::ShapeMismatch {
                what: "state",
                expected: 2,
                got: 1
            })
        );
        assert_eq!(
            storage.check_row(&[0.0, 0.0], &[]),
            Err(ReplayError::ShapeMismatch {
                what: "action",
                expected: 1,
                got: 0
            })
        );
    }
}
