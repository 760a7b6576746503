use crate::{
    arena::Arena,
    config,
    geometry::{Rect, Vec2},
};
use rapier2d::prelude::{nalgebra, vector};

// Knockback scales with 100 / health; keep the divisor away from zero.
const MIN_KNOCKBACK_HEALTH: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    One,
    Two,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::One => 0,
            Side::Two => 1,
        }
    }

    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Left,
    Right,
    None,
}

#[derive(Debug, Clone)]
pub struct Combatant {
    pub pos: Vec2,
    pub dim: Vec2,
    pub vel: Vec2,
    pub grounded: bool,
    pub health: f32,
    pub attack_cooldown: f32,
    pub facing: Facing,
    pub intent: Intent,
    side: Side,
    stats: config::Combatant,
}

impl Combatant {
    pub fn new(pos: Vec2, side: Side, stats: config::Combatant) -> Self {
        Self {
            pos,
            dim: vector![stats.width, stats.height],
            vel: vector![0.0, 0.0],
            grounded: false,
            health: stats.health,
            attack_cooldown: 0.0,
            facing: Facing::Left,
            intent: Intent::None,
            side,
            stats,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn rect(&self) -> Rect {
        Rect {
            pos: self.pos,
            dim: self.dim,
        }
    }

    pub fn display_health(&self) -> f32 {
        self.health.max(0.0)
    }

    pub fn is_defeated(&self) -> bool {
        self.health <= 0.0
    }

    pub fn attack_ready(&self) -> bool {
        self.attack_cooldown <= 0.0
    }

    pub fn set_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Left => self.facing = Facing::Left,
            Intent::Right => self.facing = Facing::Right,
            Intent::None => {}
        }
        self.intent = intent;
    }

    pub fn jump(&mut self) {
        if !self.grounded {
            return;
        }
        self.grounded = false;
        self.vel.y -= self.stats.jump_power;
    }

    pub fn distance_squared(&self, other: &Combatant) -> f32 {
        (self.pos - other.pos).norm_squared()
    }

    /// Hits `target` if it is within range. Damage grows with distance, up to
    /// the full amount at the edge of the range. The cooldown restarts even
    /// when the target is out of range.
    pub fn attack(&mut self, target: &mut Combatant) {
        if self.attack_cooldown > 0.0 || target.health <= 0.0 {
            return;
        }
        let range_squared = self.stats.attack_range * self.stats.attack_range;
        let distance_squared = self.distance_squared(target);
        if distance_squared < range_squared {
            let scale = self.stats.knockback * (100.0 / target.health.max(MIN_KNOCKBACK_HEALTH));
            target.vel += (target.pos - self.pos) * scale;
            target.health -= self.stats.damage * (distance_squared / range_squared);
            log::trace!(
                "player {} hit player {} at d2={}, health now {}",
                self.side.number(),
                target.side.number(),
                distance_squared,
                target.health
            );
        }
        self.attack_cooldown = self.stats.attack_cooldown;
    }

    pub fn update(&mut self, dt: f32, arena: &Arena) {
        self.vel *= f32::exp(-dt);
        self.attack_cooldown -= dt;

        // Integrate before applying this tick's movement so input shows up one
        // tick later.
        self.pos += self.vel * dt;
        match self.intent {
            Intent::Left => self.vel.x -= self.stats.move_speed * dt,
            Intent::Right => self.vel.x += self.stats.move_speed * dt,
            Intent::None => {}
        }

        // Landing grounds the combatant until its next jump, even after it
        // walks past the platform's end.
        if arena.supports(&self.rect()) {
            self.grounded = true;
            // No sinking, but a jump impulse survives.
            self.vel.y = self.vel.y.min(0.0);
        }
        if !self.grounded {
            self.vel.y += self.stats.gravity * dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn fighter(x: f32, y: f32, side: Side) -> Combatant {
        Combatant::new(vector![x, y], side, config::Combatant::default())
    }

    fn arena() -> Arena {
        Arena::new(&config::Arena::default())
    }

    #[test]
    fn resting_on_top_edge_is_grounded() {
        let arena = arena();
        // Platform top is at y = 540 and the combatant is 100 tall.
        let mut c = fighter(300.0, 440.0, Side::One);
        c.update(DT, &arena);
        assert!(c.grounded);
        assert_eq!(c.vel.y, 0.0);
        assert_eq!(c.pos.y, 440.0);
    }

    #[test]
    fn gravity_applies_in_the_air() {
        let arena = arena();
        let mut c = fighter(300.0, 100.0, Side::One);
        c.update(DT, &arena);
        assert!(!c.grounded);
        assert!((c.vel.y - 500.0 * DT).abs() < 1e-4);
    }

    #[test]
    fn movement_input_lags_one_tick() {
        let arena = arena();
        let mut c = fighter(300.0, 440.0, Side::One);
        c.set_intent(Intent::Right);
        assert_eq!(c.facing, Facing::Right);
        c.update(DT, &arena);
        assert_eq!(c.pos.x, 300.0);
        assert!(c.vel.x > 0.0);
        c.update(DT, &arena);
        assert!(c.pos.x > 300.0);
    }

    #[test]
    fn velocity_decays_exponentially() {
        let arena = arena();
        let mut c = fighter(300.0, 440.0, Side::One);
        c.vel.x = 100.0;
        c.update(DT, &arena);
        assert!((c.vel.x - 100.0 * f32::exp(-DT)).abs() < 1e-4);
    }

    #[test]
    fn walking_off_ledge_stays_grounded() {
        let arena = arena();
        // Platform spans x in [140, 1140].
        let mut c = fighter(1030.0, 440.0, Side::One);
        c.update(DT, &arena);
        assert!(c.grounded);

        c.set_intent(Intent::Right);
        let mut ticks = 0;
        while c.pos.x <= 1200.0 {
            c.update(DT, &arena);
            ticks += 1;
            assert!(ticks < 600, "never walked off the platform");
        }
        assert!(!arena.supports(&c.rect()));
        assert!(c.grounded);
        assert_eq!(c.vel.y, 0.0);
        assert_eq!(c.pos.y, 440.0);

        // Only a jump clears it.
        c.jump();
        c.update(DT, &arena);
        assert!(!c.grounded);
        c.update(DT, &arena);
        assert!(c.vel.y > -600.0);
    }

    #[test]
    fn jump_requires_ground() {
        let mut c = fighter(300.0, 100.0, Side::One);
        c.jump();
        assert_eq!(c.vel.y, 0.0);

        c.grounded = true;
        c.jump();
        assert!(!c.grounded);
        assert_eq!(c.vel.y, -600.0);
    }

    #[test]
    fn jump_lifts_off_platform() {
        let arena = arena();
        let mut c = fighter(300.0, 440.0, Side::One);
        c.update(DT, &arena);
        c.jump();
        c.update(DT, &arena);
        assert!(c.pos.y < 440.0);
        c.update(DT, &arena);
        assert!(!c.grounded);
    }

    #[test]
    fn damage_scales_with_distance() {
        let mut a = fighter(0.0, 0.0, Side::One);
        let mut b = fighter(50.0, 50.0, Side::Two);
        a.attack(&mut b);
        assert_eq!(b.health, 80.0);
        assert_eq!(a.attack_cooldown, 1.0);
        // Knockback pushes away from the attacker, scaled by 100 / health.
        assert_eq!(b.vel, vector![250.0, 250.0]);
    }

    #[test]
    fn point_blank_attack_deals_nothing() {
        let mut a = fighter(10.0, 10.0, Side::One);
        let mut b = fighter(10.0, 10.0, Side::Two);
        a.attack(&mut b);
        assert_eq!(b.health, 100.0);
        assert_eq!(b.vel, vector![0.0, 0.0]);
        assert_eq!(a.attack_cooldown, 1.0);
    }

    #[test]
    fn out_of_range_attack_still_starts_cooldown() {
        let mut a = fighter(0.0, 0.0, Side::One);
        let mut b = fighter(100.0, 0.0, Side::Two);
        a.attack(&mut b);
        assert_eq!(b.health, 100.0);
        assert_eq!(b.vel, vector![0.0, 0.0]);
        assert_eq!(a.attack_cooldown, 1.0);
    }

    #[test]
    fn second_attack_within_cooldown_is_ignored() {
        let arena = arena();
        let mut a = fighter(0.0, 0.0, Side::One);
        let mut b = fighter(50.0, 50.0, Side::Two);
        a.attack(&mut b);
        a.update(0.5, &arena);
        let cooldown = a.attack_cooldown;
        let health = b.health;
        let vel = b.vel;

        a.attack(&mut b);
        assert_eq!(a.attack_cooldown, cooldown);
        assert_eq!(b.health, health);
        assert_eq!(b.vel, vel);
    }

    #[test]
    fn defeated_target_is_not_attacked() {
        let mut a = fighter(0.0, 0.0, Side::One);
        let mut b = fighter(50.0, 50.0, Side::Two);
        b.health = 0.0;
        a.attack(&mut b);
        assert_eq!(a.attack_cooldown, 0.0);
        assert_eq!(b.vel, vector![0.0, 0.0]);
    }

    #[test]
    fn knockback_stays_finite_near_zero_health() {
        let mut a = fighter(0.0, 0.0, Side::One);
        let mut b = fighter(50.0, 0.0, Side::Two);
        b.health = 1e-9;
        a.attack(&mut b);
        assert!(b.vel.x.is_finite());
        assert!(b.health < 0.0);
        assert_eq!(b.display_health(), 0.0);
        assert!(b.is_defeated());
    }
}
