use std::time::{Duration, Instant};

/// Paces fixed `dt` updates, either at wall-clock rate or back to back.
pub struct Ticker {
    dt: f32,
    period: Duration,
    speed_up: bool,
    next: Instant,
}

impl Ticker {
    pub fn new(ticks_per_second: u32, speed_up: bool) -> Self {
        let ticks_per_second = ticks_per_second.max(1);
        Self {
            dt: 1.0 / ticks_per_second as f32,
            period: Duration::from_secs(1) / ticks_per_second,
            speed_up,
            next: Instant::now(),
        }
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn set_speed_up(&mut self, speed_up: bool) {
        self.speed_up = speed_up;
        self.next = Instant::now();
    }

    /// Blocks until the next tick is due.
    pub fn wait(&mut self) {
        if self.speed_up {
            return;
        }
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
            self.next += self.period;
        } else {
            // Fell behind; don't try to catch up with a burst of ticks.
            self.next = now + self.period;
        }
    }
}
