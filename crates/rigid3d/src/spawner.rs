//! Active instance count as a function of simulated time.
//!
//! The first instance appears at t = 0 and one more every `interval`, so
//! `active(t) = min(target, floor(t / interval) + 1)`. The count never
//! decreases until [`Spawner::reset`].

use std::ops::Range;

#[derive(Clone, Debug)]
pub struct Spawner {
    interval: f64,
    target: usize,
    /// Simulated time since the last reset (s)
    elapsed: f64,
    active: usize,
}

impl Spawner {
    /// `target` above `capacity` is clamped with a warning.
    pub fn new(interval: f32, target: usize, capacity: usize) -> Self {
        let clamped = target.min(capacity);
        if clamped < target {
            log::warn!(
                "Target count {} exceeds capacity {}, clamping",
                target,
                capacity
            );
        }
        Self {
            interval: interval as f64,
            target: clamped,
            elapsed: 0.0,
            active: 0,
        }
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Number of instances due at the current time.
    pub fn due(&self) -> usize {
        if self.interval <= 0.0 {
            return self.target;
        }
        let spawned = (self.elapsed / self.interval).floor() as usize + 1;
        spawned.min(self.target)
    }

    /// Activate every instance due now; returns the newly activated slots.
    pub fn spawn_due(&mut self) -> Range<usize> {
        let due = self.due().max(self.active);
        let range = self.active..due;
        self.active = due;
        range
    }

    /// Advance simulated time by one tick.
    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt as f64;
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.active = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_spawn_at_zero() {
        let mut spawner = Spawner::new(1.0, 4, 16);
        assert_eq!(spawner.spawn_due(), 0..1);
        assert_eq!(spawner.spawn_due(), 1..1);
    }

    #[test]
    fn test_one_spawn_per_interval() {
        let mut spawner = Spawner::new(0.5, 10, 16);
        let mut spawned = Vec::new();
        for _ in 0..100 {
            spawned.extend(spawner.spawn_due());
            spawner.advance(0.01);
        }
        // t in [0, 1): spawns at 0, 0.5
        assert_eq!(spawned, vec![0, 1]);
    }

    #[test]
    fn test_capped_at_target() {
        let mut spawner = Spawner::new(0.1, 3, 16);
        for _ in 0..100 {
            spawner.spawn_due();
            spawner.advance(0.1);
        }
        assert_eq!(spawner.active(), 3);
    }

    #[test]
    fn test_target_clamped_to_capacity() {
        let spawner = Spawner::new(1.0, 100, 8);
        assert_eq!(spawner.target(), 8);
    }

    #[test]
    fn test_large_step_spawns_batch() {
        let mut spawner = Spawner::new(1.0, 10, 16);
        spawner.spawn_due();
        spawner.advance(3.5);
        assert_eq!(spawner.spawn_due(), 1..4);
    }

    #[test]
    fn test_reset() {
        let mut spawner = Spawner::new(1.0, 10, 16);
        spawner.advance(5.0);
        spawner.spawn_due();
        spawner.reset();
        assert_eq!(spawner.active(), 0);
        assert_eq!(spawner.elapsed(), 0.0);
        assert_eq!(spawner.spawn_due(), 0..1);
    }
}
