use rand::Rng;

use crate::{
    config,
    env::{Action, State, ACTION_COUNT},
    error::{Error, Result},
    policy::Policy,
    replay::{ReplayBuffer, Transition},
};

/// Epsilon schedule decaying exponentially from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exploration {
    pub start: f32,
    pub end: f32,
    pub decay: f32,
}

impl Exploration {
    #[cfg(test)]
    pub fn greedy() -> Self {
        Self {
            start: 0.0,
            end: 0.0,
            decay: 1.0,
        }
    }

    pub fn eps_threshold(&self, step: u64) -> f32 {
        self.end + (self.start - self.end) * f32::exp(-(step as f32) / self.decay)
    }
}

pub struct Agent<P> {
    pub policy: P,
    replay: ReplayBuffer,
    batch_size: usize,
    exploration: Exploration,
    steps: u64,
    last_action: Option<Action>,
}

impl<P: Policy> Agent<P> {
    pub fn new(policy: P, capacity: usize, batch_size: usize, exploration: Exploration) -> Self {
        Self {
            policy,
            replay: ReplayBuffer::new(capacity),
            batch_size,
            exploration,
            steps: 0,
            last_action: None,
        }
    }

    pub fn from_settings(policy: P, settings: &config::Dqn) -> Self {
        Self::new(
            policy,
            settings.replay_buffer_size as usize,
            settings.batch_size as usize,
            Exploration {
                start: settings.eps_start,
                end: settings.eps_end,
                decay: settings.eps_decay,
            },
        )
    }

    pub fn replay(&self) -> &ReplayBuffer {
        &self.replay
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn last_action(&self) -> Option<Action> {
        self.last_action
    }

    pub fn eps_threshold(&self) -> f32 {
        self.exploration.eps_threshold(self.steps)
    }

    pub fn choose_action<R: Rng>(&mut self, state: &State, rng: &mut R) -> Result<Action> {
        let action = if rng.gen::<f32>() < self.eps_threshold() {
            Action::from_index(rng.gen_range(0..ACTION_COUNT))
        } else {
            let values = self.policy.q_values(state)?;
            Action::from_index(argmax(&values))
        };
        self.steps += 1;
        self.last_action = Some(action);
        Ok(action)
    }

    pub fn store_experience(&mut self, state: State, action: Action, reward: f32, next_state: State) {
        self.replay.store(Transition {
            state,
            action,
            reward,
            next_state,
        });
    }

    pub fn ready_to_train(&self) -> bool {
        self.replay.len() > self.batch_size
    }

    /// Callers must check [`Agent::ready_to_train`] first.
    pub fn train<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        if !self.ready_to_train() {
            return Err(Error::InsufficientExperience {
                requested: self.batch_size + 1,
                available: self.replay.len(),
            });
        }
        let batch = self.replay.sample_batch(self.batch_size, rng)?;
        self.policy.train_batch(&batch)
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        self.policy.save()
    }

    pub fn load(&mut self, bytes: &[u8]) -> Result<()> {
        self.policy.load(bytes)
    }
}

/// Index of the largest value, first one on ties.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
