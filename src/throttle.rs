//! Adaptive concurrency control for the worker pool.
//!
//! The remote server is opaque: the only stress signal the crawler gets is a
//! failed fetch (timeout, reset, non-2xx). The controller therefore follows
//! the additive-increase/multiplicative-decrease pattern from network flow
//! control: grow the permitted concurrency by one slot per tick while the
//! pool is saturated and healthy, halve it the moment anything fails.

use std::time::Instant;

/// Bookkeeping for in-flight work and the current concurrency allowance.
///
/// Invariants: `1 <= limit <= cap` and `0 <= active`. All mutation happens
/// under the run's state mutex; the controller task and the workers never
/// touch this concurrently.
#[derive(Debug)]
pub struct ConcurrencyController {
    active: usize,
    limit: usize,
    cap: usize,
    last_sample: Instant,
    last_bytes: u64,
    speed_bps: f64,
}

/// Starting allowance for a fresh controller. Deliberately conservative;
/// additive increase finds the real capacity within a few ticks.
const INITIAL_LIMIT: usize = 2;

impl ConcurrencyController {
    /// Creates a controller with the given user-configured ceiling.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            active: 0,
            limit: INITIAL_LIMIT.min(cap),
            cap,
            last_sample: Instant::now(),
            last_bytes: 0,
            speed_bps: 0.0,
        }
    }

    /// Claims a worker slot if one is available under the current limit.
    pub fn try_acquire(&mut self) -> bool {
        if self.active < self.limit {
            self.active += 1;
            true
        } else {
            false
        }
    }

    /// Returns a worker slot. Every successful `try_acquire` must be paired
    /// with exactly one `release`, on every exit route.
    pub fn release(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    /// Multiplicative decrease: a fetch failed, so assume network stress and
    /// cut the allowance in half. Never drops below one slot.
    pub fn record_failure(&mut self) {
        self.limit = (self.limit / 2).max(1);
    }

    /// Periodic controller tick. Samples throughput from the cumulative byte
    /// counter and applies additive increase when the pool is nearly
    /// saturated, signalling that the current allowance is not the
    /// bottleneck. The throughput number feeds reporting only, never control
    /// decisions.
    pub fn tick(&mut self, total_bytes: u64) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_sample).as_secs_f64();
        if elapsed > 0.0 {
            let delta = total_bytes.saturating_sub(self.last_bytes);
            self.speed_bps = delta as f64 / elapsed;
        }
        self.last_sample = now;
        self.last_bytes = total_bytes;

        if self.active + 1 >= self.limit && self.limit < self.cap {
            self.limit += 1;
        }

        self.speed_bps
    }

    /// Number of in-flight work items.
    pub fn active(&self) -> usize {
        self.active
    }

    /// Current permitted concurrency.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// User-configured ceiling.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Most recent throughput sample in bytes per second.
    pub fn speed_bps(&self) -> f64 {
        self.speed_bps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_respects_limit() {
        let mut ctl = ConcurrencyController::new(8);
        assert!(ctl.try_acquire());
        assert!(ctl.try_acquire());
        // Initial limit is 2: the third claim must be refused.
        assert!(!ctl.try_acquire());
        assert_eq!(ctl.active(), 2);

        ctl.release();
        assert!(ctl.try_acquire());
    }

    #[test]
    fn additive_increase_needs_near_saturation() {
        let mut ctl = ConcurrencyController::new(8);
        // Idle pool: no growth.
        ctl.tick(0);
        assert_eq!(ctl.limit(), 2);

        // One active out of two is "nearly saturated" (active >= limit - 1).
        assert!(ctl.try_acquire());
        ctl.tick(0);
        assert_eq!(ctl.limit(), 3);
        ctl.tick(0);
        // active(1) + 1 < limit(3): growth stops until workers catch up.
        assert_eq!(ctl.limit(), 3);
    }

    #[test]
    fn limit_grows_one_per_tick_up_to_cap() {
        let mut ctl = ConcurrencyController::new(4);
        while ctl.try_acquire() {}
        for expected in [3, 4, 4, 4] {
            while ctl.try_acquire() {}
            ctl.tick(0);
            assert_eq!(ctl.limit(), expected);
        }
        assert_eq!(ctl.limit(), ctl.cap());
    }

    #[test]
    fn failures_halve_down_to_one() {
        let mut ctl = ConcurrencyController::new(64);
        while ctl.limit() < 40 {
            while ctl.try_acquire() {}
            ctl.tick(0);
        }
        assert_eq!(ctl.limit(), 40);

        for expected in [20, 10, 5, 2, 1, 1, 1] {
            ctl.record_failure();
            assert_eq!(ctl.limit(), expected);
        }
    }

    #[test]
    fn bounds_hold_under_mixed_traffic() {
        let mut ctl = ConcurrencyController::new(10);
        for step in 0..200 {
            match step % 5 {
                0 => {
                    ctl.try_acquire();
                }
                1 => {
                    while ctl.try_acquire() {}
                    ctl.tick(step as u64 * 1024);
                }
                2 => ctl.record_failure(),
                3 => ctl.release(),
                _ => {
                    ctl.tick(step as u64 * 1024);
                }
            }
            assert!(ctl.limit() >= 1);
            assert!(ctl.limit() <= ctl.cap());
        }
    }

    #[test]
    fn throughput_reflects_byte_delta() {
        let mut ctl = ConcurrencyController::new(4);
        std::thread::sleep(std::time::Duration::from_millis(20));
        let speed = ctl.tick(1_000_000);
        assert!(speed > 0.0);
        // No new bytes: the next sample reports zero.
        std::thread::sleep(std::time::Duration::from_millis(20));
        let speed = ctl.tick(1_000_000);
        assert_eq!(speed, 0.0);
    }
}
