use crate::{arena::Arena, combatant::Combatant, config};

pub const STATE_SIZE: usize = 12;
pub const ACTION_COUNT: usize = 4;

/// `[pos x, pos y, vel x, vel y, attack cooldown, health]` for self, then the
/// same six fields for the opponent.
pub type State = [f32; STATE_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft = 0,
    MoveRight = 1,
    Jump = 2,
    Attack = 3,
}

impl Action {
    #[cfg(test)]
    pub const ALL: [Action; ACTION_COUNT] = [
        Action::MoveLeft,
        Action::MoveRight,
        Action::Jump,
        Action::Attack,
    ];

    /// Unknown indices map to `Attack` so a bad policy output never stalls
    /// the loop.
    pub fn from_index(index: usize) -> Action {
        match index {
            0 => Action::MoveLeft,
            1 => Action::MoveRight,
            2 => Action::Jump,
            _ => Action::Attack,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

pub fn encode_state(me: &Combatant, opponent: &Combatant) -> State {
    let mut state = [0.0; STATE_SIZE];
    for (chunk, c) in state.chunks_exact_mut(6).zip([me, opponent]) {
        chunk.copy_from_slice(&[
            c.pos.x,
            c.pos.y,
            c.vel.x,
            c.vel.y,
            c.attack_cooldown,
            c.health,
        ]);
    }
    state
}

/// Hand tuned shaping signal for `me` having taken `action`.
pub fn compute_reward(
    action: Action,
    me: &Combatant,
    opponent: &Combatant,
    arena: &Arena,
    cfg: &config::Reward,
) -> f32 {
    let in_range = me.distance_squared(opponent) < cfg.proximity_squared;
    // Close enough to hit and able to, but doing something else.
    let idle_penalty = if in_range && me.attack_ready() {
        cfg.idle_in_range
    } else {
        0.0
    };

    match action {
        Action::MoveLeft | Action::MoveRight => {
            let direction = if action == Action::MoveLeft { -1.0 } else { 1.0 };
            let away = (me.pos.x - opponent.pos.x) * direction > 0.0;
            let base = if away { cfg.move_away } else { cfg.move_toward };
            let at_edge = if direction < 0.0 {
                me.pos.x <= 0.0
            } else {
                me.pos.x + me.dim.x >= arena.width
            };
            let bonus = if away && at_edge {
                cfg.boundary_bonus
            } else {
                0.0
            };
            base + idle_penalty + bonus
        }
        Action::Jump => {
            let base = if me.pos.y < opponent.pos.y {
                cfg.move_away
            } else {
                cfg.move_toward
            };
            base + idle_penalty
        }
        Action::Attack => {
            if in_range && me.attack_ready() {
                cfg.attack_in_range
            } else {
                0.0
            }
        }
    }
}
