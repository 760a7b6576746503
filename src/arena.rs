use crate::{
    config,
    geometry::{rests_on, Rect, Vec2},
    render::Rgba,
};
use rapier2d::prelude::{nalgebra, vector};

pub const PLATFORM_COLOR: Rgba = [105, 105, 105, 255];

#[derive(Debug, Clone, PartialEq)]
pub struct Platform {
    rect: Rect,
    pub color: Rgba,
}

impl Platform {
    pub fn new(x: f32, y: f32, w: f32, h: f32, color: Rgba) -> Self {
        Self {
            rect: Rect::new(x, y, w, h),
            color,
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }
}

#[derive(Debug, Clone)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
    pub spawns: [Vec2; 2],
    pub platforms: Vec<Platform>,
}

impl Arena {
    pub fn new(config: &config::Arena) -> Self {
        let platforms = config
            .platforms
            .iter()
            .map(|p| Platform::new(p.x, p.y, p.w, p.h, PLATFORM_COLOR))
            .collect();
        let [one, two] = config.spawns;
        Self {
            width: config.width,
            height: config.height,
            spawns: [vector![one[0], one[1]], vector![two[0], two[1]]],
            platforms,
        }
    }

    /// Whether `rect` stands on the top face of any platform.
    pub fn supports(&self, rect: &Rect) -> bool {
        self.platforms.iter().any(|p| rests_on(rect, &p.rect))
    }

    /// Fallen far enough below the arena to count as out of play.
    pub fn fell_off(&self, rect: &Rect) -> bool {
        rect.pos.y > 2.0 * self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_config() {
        let arena = Arena::new(&config::Arena::default());
        assert_eq!(arena.width, 1280.0);
        assert_eq!(arena.platforms.len(), 1);
        assert_eq!(arena.platforms[0].rect(), Rect::new(140.0, 540.0, 1000.0, 60.0));
        assert_eq!(arena.spawns[1], vector![880.0, 400.0]);
    }

    #[test]
    fn supports_resting_rect() {
        let arena = Arena::new(&config::Arena::default());
        assert!(arena.supports(&Rect::new(300.0, 440.0, 100.0, 100.0)));
        assert!(!arena.supports(&Rect::new(300.0, 400.0, 100.0, 100.0)));
        // Past the platform's right end.
        assert!(!arena.supports(&Rect::new(1200.0, 440.0, 50.0, 100.0)));
    }

    #[test]
    fn platform_walls_do_not_support() {
        let arena = Arena::new(&config::Arena::default());
        // Falling past the left wall at x = 140, overlapping it vertically.
        assert!(!arena.supports(&Rect::new(40.0, 520.0, 100.0, 100.0)));
        // Past the right wall at x = 1140.
        assert!(!arena.supports(&Rect::new(1140.0, 520.0, 100.0, 100.0)));
        // Below the platform, head against its underside at y = 600.
        assert!(!arena.supports(&Rect::new(300.0, 600.0, 100.0, 100.0)));
    }

    #[test]
    fn fell_off_below_twice_height() {
        let arena = Arena::new(&config::Arena::default());
        assert!(!arena.fell_off(&Rect::new(0.0, 1440.0, 10.0, 10.0)));
        assert!(arena.fell_off(&Rect::new(0.0, 1440.5, 10.0, 10.0)));
    }
}
