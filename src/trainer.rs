use rand::Rng;
use rapier2d::prelude::{nalgebra, vector};

use crate::{
    agent::Agent,
    arena::Arena,
    combatant::{Combatant, Facing, Intent, Side},
    config::{self, Config},
    env::{compute_reward, encode_state, Action},
    error::Result,
    geometry::Rect,
    policy::Policy,
    render::{Scene, Shape, BLUE, MARKER, RED},
    store::{self, BlobStore},
};

const SIDES: [Side; 2] = [Side::One, Side::Two];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    Restarted { round: u64 },
}

pub struct Trainer<P, S> {
    agents: [Agent<P>; 2],
    combatants: [Combatant; 2],
    arena: Arena,
    store: S,
    config: Config,
    round: u64,
}

impl<P: Policy, S: BlobStore> Trainer<P, S> {
    /// Restores the round counter and any saved policies, then sets up the
    /// first episode.
    pub fn new(config: Config, mut agents: [Agent<P>; 2], store: S) -> Self {
        let prefix = &config.storage.prefix;
        let round = store::load_round(&store, prefix).unwrap_or_else(|e| {
            log::warn!("Starting round count from 0: {}", e);
            0
        });
        for (agent, side) in agents.iter_mut().zip(SIDES) {
            let key = store::agent_key(prefix, side);
            match store.get(&key) {
                Ok(Some(bytes)) => match agent.load(&bytes) {
                    Ok(()) => log::info!("Loaded policy from {}", key),
                    Err(e) => log::warn!("Ignoring stored policy {}: {}", key, e),
                },
                Ok(None) => log::debug!("No stored policy under {}", key),
                Err(e) => log::warn!("Failed to read {}: {}", key, e),
            }
        }
        let arena = Arena::new(&config.arena);
        let combatants = spawn(&arena, &config.combatant);
        log::info!("Starting at round {}", round);
        Self {
            agents,
            combatants,
            arena,
            store,
            config,
            round,
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    #[cfg(test)]
    pub fn combatant(&self, side: Side) -> &Combatant {
        &self.combatants[side.index()]
    }

    #[cfg(test)]
    pub fn combatant_mut(&mut self, side: Side) -> &mut Combatant {
        &mut self.combatants[side.index()]
    }

    #[cfg(test)]
    pub fn agent(&self, side: Side) -> &Agent<P> {
        &self.agents[side.index()]
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reward settings apply immediately; arena and combatant settings from
    /// the next episode on.
    pub fn reconfigure(&mut self, config: &Config) {
        self.config.reward = config.reward;
        self.config.arena = config.arena.clone();
        self.config.combatant = config.combatant;
    }

    pub fn is_terminal(&self) -> bool {
        self.combatants
            .iter()
            .any(|c| self.arena.fell_off(&c.rect()) || c.is_defeated())
    }

    /// Runs one fixed timestep. Each tick completes before the next begins:
    /// both agents choose, both transitions are stored and trained on, and
    /// only then does physics advance. A terminal state instead persists both
    /// agents and starts a new episode.
    pub fn tick<R: Rng>(&mut self, dt: f32, rng: &mut R) -> Result<TickOutcome> {
        if self.is_terminal() {
            self.restart();
            return Ok(TickOutcome::Restarted { round: self.round });
        }

        let [one, two] = &self.combatants;
        let states = [encode_state(one, two), encode_state(two, one)];
        let before = self.combatants.clone();

        let mut actions = [Action::Attack; 2];
        for (i, agent) in self.agents.iter_mut().enumerate() {
            actions[i] = agent.choose_action(&states[i], rng)?;
        }

        let [one, two] = &mut self.combatants;
        apply(actions[0], one, two);
        apply(actions[1], two, one);

        let [one, two] = &self.combatants;
        let next_states = [encode_state(one, two), encode_state(two, one)];

        for i in 0..2 {
            let reward = compute_reward(
                actions[i],
                &before[i],
                &before[1 - i],
                &self.arena,
                &self.config.reward,
            );
            let agent = &mut self.agents[i];
            agent.store_experience(states[i], actions[i], reward, next_states[i]);
            if agent.ready_to_train() {
                agent.train(rng)?;
            }
            log::trace!("player {} {:?} reward {}", i + 1, actions[i], reward);
        }

        for c in self.combatants.iter_mut() {
            c.update(dt, &self.arena);
        }

        let [one, two] = &self.agents;
        if one.steps() % 10_000 == 0 {
            log::debug!(
                "step {}: memory {}/{} of {}, eps {}/{}, last actions {:?}/{:?}",
                one.steps(),
                one.replay().len(),
                two.replay().len(),
                one.replay().capacity(),
                one.eps_threshold(),
                two.eps_threshold(),
                one.last_action(),
                two.last_action()
            );
        }
        Ok(TickOutcome::Running)
    }

    /// Saves both agents and the round counter, then starts a fresh episode.
    /// Save failures are logged and do not block the restart.
    fn restart(&mut self) {
        let [one, two] = &self.combatants;
        log::info!(
            "Round {} over: player 1 health {:.1}, player 2 health {:.1}",
            self.round,
            one.display_health(),
            two.display_health()
        );

        let prefix = self.config.storage.prefix.clone();
        for (agent, side) in self.agents.iter().zip(SIDES) {
            let key = store::agent_key(&prefix, side);
            if let Err(e) = agent.save().and_then(|bytes| self.store.put(&key, &bytes)) {
                log::warn!("Failed to save {}: {}", key, e);
            }
        }
        self.round += 1;
        if let Err(e) = store::save_round(&mut self.store, &prefix, self.round) {
            log::warn!("Failed to save round counter: {}", e);
        }

        self.arena = Arena::new(&self.config.arena);
        self.combatants = spawn(&self.arena, &self.config.combatant);
    }

    pub fn scene(&self) -> Scene {
        let mut shapes: Vec<Shape> = self
            .arena
            .platforms
            .iter()
            .map(|p| Shape {
                rect: p.rect(),
                color: p.color,
            })
            .collect();

        for c in &self.combatants {
            let color = match c.side() {
                Side::One => RED,
                Side::Two => BLUE,
            };
            shapes.push(Shape {
                rect: c.rect(),
                color,
            });
            let eye_x = match c.facing {
                Facing::Left => c.pos.x,
                Facing::Right => c.pos.x + c.dim.x - 10.0,
            };
            shapes.push(Shape {
                rect: Rect::new(eye_x, c.pos.y + 20.0, 10.0, 10.0),
                color: MARKER,
            });
            shapes.push(Shape {
                rect: health_bar(c, self.arena.width),
                color,
            });
        }

        Scene {
            width: self.arena.width,
            height: self.arena.height,
            round: self.round,
            shapes,
        }
    }
}

fn spawn(arena: &Arena, stats: &config::Combatant) -> [Combatant; 2] {
    SIDES.map(|side| Combatant::new(arena.spawns[side.index()], side, *stats))
}

fn apply(action: Action, actor: &mut Combatant, opponent: &mut Combatant) {
    match action {
        Action::MoveLeft => actor.set_intent(Intent::Left),
        Action::MoveRight => actor.set_intent(Intent::Right),
        Action::Jump => actor.jump(),
        Action::Attack => actor.attack(opponent),
    }
}

/// Player one's bar shrinks toward the left corner, player two's toward the
/// right one.
fn health_bar(c: &Combatant, arena_width: f32) -> Rect {
    let w = 2.0 * c.display_health();
    let x = match c.side() {
        Side::One => 50.0,
        Side::Two => arena_width - 50.0 - w,
    };
    Rect {
        pos: vector![x, 50.0],
        dim: vector![w, 50.0],
    }
}
