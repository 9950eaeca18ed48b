//! Monotonic nanosecond clock
//!
//! One process-wide epoch, fixed at first use and immutable afterwards.
//! Every timestamp in the system is nanoseconds since this epoch, so
//! subtraction is always valid and never observes clock adjustments.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds since the process epoch. The first call fixes the epoch.
#[inline]
pub fn now_ns() -> i64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as i64
}

/// Fix the epoch explicitly (startup), so later calls never pay the
/// initialization branch from the hot path's perspective.
pub fn calibrate() {
    let _ = EPOCH.get_or_init(Instant::now);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        calibrate();
        let a = now_ns();
        let b = now_ns();
        assert!(b >= a);
    }

    #[test]
    fn test_progresses() {
        let a = now_ns();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_ns();
        assert!(b - a >= 1_000_000, "clock did not advance: {} -> {}", a, b);
    }
}
