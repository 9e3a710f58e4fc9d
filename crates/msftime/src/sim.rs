//! Deterministic playback of recorded carrier tapes
//!
//! [`SimulatedRadio`] implements both facade traits over a tape of
//! carrier samples. Virtual time advances only when the pipeline
//! yields through a delay call, so a full two-minute acquisition runs
//! in host microseconds and two identical runs are bit-for-bit
//! identical. The random pre-scan sleep resolves to the low bound of
//! its range for the same reason.
//!
//! ```
//! use msftime::{MsfReceiverBuilder, SimulatedRadio, waveform};
//!
//! let mut tape = vec![true; 2000];
//! for _ in 0..3 {
//!     tape.extend(waveform::encode_minute(24, 3, 17, 6, 14, 5));
//! }
//!
//! let radio = SimulatedRadio::new(tape);
//! let mut rx = MsfReceiverBuilder::new()
//!     .with_sample_period_ms(20)
//!     .build(radio.clone(), radio.carrier());
//! let time = rx.acquire_once();
//! assert!(time.checksum_passed);
//! assert_eq!("2024-03-17 14:05:00", time.to_string());
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::clock::{CarrierReader, MonotonicClock};

// Shared playback state: the tape and the virtual clock
#[derive(Debug)]
struct Playback {
    tape: Vec<bool>,
    rate: u32,
    now_micros: u64,
}

impl Playback {
    fn carrier(&self) -> bool {
        let index = (self.now_micros / 1000) * self.rate as u64 / 1000;
        self.tape.get(index as usize).copied().unwrap_or(true)
    }
}

/// Playback clock and carrier source for recorded tapes
///
/// Cloning is cheap and shares the underlying tape and clock; pass a
/// clone as the receiver's clock and [`carrier()`](SimulatedRadio::carrier)
/// as its reader. A read past the end of the tape holds steady
/// carrier.
#[derive(Clone, Debug)]
pub struct SimulatedRadio(Rc<RefCell<Playback>>);

impl SimulatedRadio {
    /// Wrap a tape sampled at one millisecond per entry
    ///
    /// Entry `i` is the carrier state during millisecond `i`, `true`
    /// for carrier present.
    pub fn new(tape: Vec<bool>) -> Self {
        Self::with_rate(tape, 1000)
    }

    /// Wrap a tape sampled at `rate` entries per second
    pub fn with_rate(tape: Vec<bool>, rate: u32) -> Self {
        Self(Rc::new(RefCell::new(Playback {
            tape,
            rate,
            now_micros: 0,
        })))
    }

    /// A carrier reader bound to this radio's virtual clock
    pub fn carrier(&self) -> SimulatedCarrier {
        SimulatedCarrier(Rc::clone(&self.0))
    }

    /// Virtual milliseconds elapsed since playback began
    pub fn elapsed_millis(&self) -> u32 {
        self.now_millis()
    }
}

impl MonotonicClock for SimulatedRadio {
    fn now_millis(&self) -> u32 {
        (self.0.borrow().now_micros / 1000) as u32
    }

    fn delay_millis(&mut self, ms: u32) {
        self.0.borrow_mut().now_micros += u64::from(ms) * 1000;
    }

    fn delay_micros(&mut self, us: u32) {
        self.0.borrow_mut().now_micros += u64::from(us);
    }

    fn rand_range(&mut self, lo: u32, _hi: u32) -> u32 {
        lo
    }
}

/// Carrier input half of a [`SimulatedRadio`]
#[derive(Clone, Debug)]
pub struct SimulatedCarrier(Rc<RefCell<Playback>>);

impl CarrierReader for SimulatedCarrier {
    fn read(&mut self) -> bool {
        self.0.borrow().carrier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_advances_only_on_delay() {
        let mut radio = SimulatedRadio::new(vec![true; 10]);
        assert_eq!(0, radio.now_millis());
        radio.now_millis();
        assert_eq!(0, radio.now_millis());

        radio.delay_millis(3);
        radio.delay_micros(500);
        assert_eq!(3, radio.now_millis());
        radio.delay_micros(500);
        assert_eq!(4, radio.now_millis());
    }

    #[test]
    fn test_tape_indexing() {
        let radio = SimulatedRadio::new(vec![true, false, true]);
        let mut carrier = radio.carrier();
        let mut clock = radio.clone();

        assert!(carrier.read());
        clock.delay_millis(1);
        assert!(!carrier.read());
        clock.delay_millis(1);
        assert!(carrier.read());

        // past the end: steady carrier
        clock.delay_millis(100);
        assert!(carrier.read());
    }

    #[test]
    fn test_slow_tape_rate() {
        // ten samples per second: each entry covers 100 ms
        let radio = SimulatedRadio::with_rate(vec![true, false], 10);
        let mut carrier = radio.carrier();
        let mut clock = radio.clone();

        clock.delay_millis(99);
        assert!(carrier.read());
        clock.delay_millis(1);
        assert!(!carrier.read());
    }

    #[test]
    fn test_random_draw_is_low_bound() {
        let mut radio = SimulatedRadio::new(Vec::new());
        assert_eq!(1000, radio.rand_range(1000, 5000));
    }
}
