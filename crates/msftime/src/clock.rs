//! Clock and carrier-input facades
//!
//! The acquisition pipeline touches the outside world through exactly
//! two seams: a monotonic millisecond clock with short-delay and
//! bounded-random primitives, and a one-bit carrier-detect input. Both
//! are traits so the same pipeline runs against real hardware, the
//! host's wall clock, or the deterministic playback in
//! [`sim`](crate::sim).

use std::time::{Duration, Instant};

use rand::rngs::ThreadRng;
use rand::Rng;

/// Monotonic millisecond clock with delay and random primitives
///
/// `now_millis` is a free-running `u32` millisecond counter and is
/// allowed to wrap (every ~49.7 days). Every consumer in this crate
/// measures spans as `a.wrapping_sub(b)`, which is wrap-safe while the
/// span stays under half the counter width. Keep that discipline in
/// implementations; do not widen to signed differences.
pub trait MonotonicClock {
    /// Milliseconds since some fixed origin; strictly non-decreasing
    /// modulo wraparound
    fn now_millis(&self) -> u32;

    /// Sleep or yield for at least `ms` milliseconds
    fn delay_millis(&mut self, ms: u32);

    /// Short busy-wait or yield; `us` does not exceed 1000
    fn delay_micros(&mut self, us: u32);

    /// Bounded pseudo-random draw in `[lo, hi)`
    ///
    /// Quality does not matter here. The pipeline only uses this to
    /// de-correlate successive minute-marker scans.
    fn rand_range(&mut self, lo: u32, hi: u32) -> u32;
}

/// One-bit carrier-detect input
///
/// Returns a snapshot of the radio module's output: `true` while the
/// 60 kHz carrier is detected, `false` during a transmitted off
/// period. The read must be fast relative to the sample period and
/// safe to call at up to ~2 kHz.
pub trait CarrierReader {
    /// Read the current carrier state
    fn read(&mut self) -> bool;
}

/// Any `FnMut() -> bool` closure is a carrier reader
impl<F> CarrierReader for F
where
    F: FnMut() -> bool,
{
    fn read(&mut self) -> bool {
        (self)()
    }
}

/// Clock backed by `std::time` and `std::thread`
///
/// Suitable when the pipeline runs on a hosted target with a real
/// radio attached. The millisecond counter starts at zero when the
/// clock is created.
#[derive(Clone, Debug)]
pub struct StdClock {
    origin: Instant,
    rng: ThreadRng,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            rng: rand::thread_rng(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for StdClock {
    fn now_millis(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }

    fn delay_millis(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms.into()));
    }

    fn delay_micros(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(us.into()));
    }

    fn rand_range(&mut self, lo: u32, hi: u32) -> u32 {
        self.rng.gen_range(lo..hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_clock_advances() {
        let mut clock = StdClock::new();
        let start = clock.now_millis();
        clock.delay_millis(2);
        assert!(clock.now_millis().wrapping_sub(start) >= 2);
    }

    #[test]
    fn test_rand_range_bounds() {
        let mut clock = StdClock::new();
        for _ in 0..100 {
            let draw = clock.rand_range(1000, 5000);
            assert!((1000..5000).contains(&draw));
        }
    }

    #[test]
    fn test_closure_reader() {
        let mut state = false;
        let mut reader = || {
            state = !state;
            state
        };
        assert!(CarrierReader::read(&mut reader));
        assert!(!CarrierReader::read(&mut reader));
    }
}
