use rand::Rng;
use ringbuffer::{AllocRingBuffer, RingBuffer};

use crate::{
    env::{Action, State},
    error::{Error, Result},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: State,
    pub action: Action,
    pub reward: f32,
    pub next_state: State,
}

/// Fixed capacity experience memory. Once full, every insertion evicts the
/// oldest transition.
pub struct ReplayBuffer {
    memory: AllocRingBuffer<Transition>,
}

impl ReplayBuffer {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            memory: AllocRingBuffer::new(capacity),
        }
    }

    pub fn store(&mut self, transition: Transition) {
        self.memory.push(transition);
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.memory.iter()
    }

    /// Draws `n` distinct transitions uniformly at random.
    pub fn sample_batch<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Vec<&Transition>> {
        if n > self.len() {
            return Err(Error::InsufficientExperience {
                requested: n,
                available: self.len(),
            });
        }
        Ok(rand::seq::index::sample(rng, self.len(), n)
            .into_iter()
            .filter_map(|i| self.memory.get(i))
            .collect())
    }
}
