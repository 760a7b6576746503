use crate::{
    env::{State, ACTION_COUNT},
    error::Result,
    replay::Transition,
};

pub type ActionValues = [f32; ACTION_COUNT];

/// Action value estimator that can be trained toward one step TD targets.
///
/// Calls block until they finish; the trainer relies on this to keep every
/// tick's evaluation and training ahead of its physics step.
pub trait Policy {
    fn q_values(&self, state: &State) -> Result<ActionValues>;

    /// Moves `Q(state, action)` toward `reward + discount * max Q(next_state)`
    /// for every transition in the batch.
    fn train_batch(&mut self, batch: &[&Transition]) -> Result<()>;

    fn save(&self) -> Result<Vec<u8>>;

    fn load(&mut self, bytes: &[u8]) -> Result<()>;
}
