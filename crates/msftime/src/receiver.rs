//! Full acquisition pipeline
//!
//! One acquisition attempt is strictly sequential: a short random
//! sleep, a 65 s minute-marker scan, alignment to the next minute
//! boundary, 60 s of per-second bit voting, and a parity/sanity
//! decode. The receiver blocks its caller for the duration; there is
//! no internal concurrency and no shared state beyond its own fields,
//! which are reinitialized at the start of every attempt.

#[cfg(not(test))]
use log::{debug, info, trace, warn};

#[cfg(test)]
use std::{println as debug, println as trace, println as info, println as warn};

use crate::bits::PayloadBits;
use crate::builder::MsfReceiverBuilder;
use crate::clock::{CarrierReader, MonotonicClock};
use crate::frame::MsfTime;
use crate::marker::MarkerCorrelator;
use crate::waveform::{
    BIT_A_WINDOW_MS, BIT_B_WINDOW_MS, MARKER_SILENCE_MS, SYNC_SCAN_MS,
};

/// A complete MSF receiver
///
/// The receiver owns a [`MonotonicClock`] and a [`CarrierReader`] and
/// turns the one-bit carrier-detect line into calendar timestamps:
///
/// 1. Minute-marker search over a rolling sampled window
/// 2. Alignment to the next minute boundary
/// 3. Per-second majority voting of the A and B payload bits
/// 4. BCD decode with four odd-parity groups and a range check
///
/// Create one via the [builder](MsfReceiverBuilder):
///
/// ```
/// use msftime::{MsfReceiverBuilder, SimulatedRadio, waveform};
///
/// let mut tape = vec![true; 2000];
/// for _ in 0..3 {
///     tape.extend(waveform::encode_minute(24, 3, 17, 6, 14, 5));
/// }
/// let radio = SimulatedRadio::new(tape);
///
/// let mut rx = MsfReceiverBuilder::new()
///     .with_sample_period_ms(20)
///     .build(radio.clone(), radio.carrier());
///
/// let time = rx.acquire_once();
/// assert!(time.checksum_passed);
/// ```
///
/// An attempt takes roughly two minutes against a real clock
/// (~125 s worst case) and never fails outright: inspect
/// [`checksum_passed`](MsfTime::checksum_passed) on the result, or use
/// [`acquire_blocking()`](MsfReceiver::acquire_blocking) to retry
/// until a frame validates. Do not call either concurrently on the
/// same receiver.
#[derive(Clone, Debug)]
pub struct MsfReceiver<C, R> {
    clock: C,
    reader: R,

    correlator: MarkerCorrelator,
    sample_period_ms: u32,
    vote_threshold_pct: u32,
    sync_sleep_ms: (u32, u32),

    // payload registers, cleared at the start of each bit pass
    bits_a: PayloadBits,
    bits_b: PayloadBits,

    // lifetime count of attempts that failed validation
    failed_attempts: u32,
}

impl<C, R> MsfReceiver<C, R>
where
    C: MonotonicClock,
    R: CarrierReader,
{
    /// New receiver with default settings
    ///
    /// Equivalent to building with an unconfigured
    /// [`MsfReceiverBuilder`].
    pub fn new(clock: C, reader: R) -> Self {
        MsfReceiverBuilder::new().build(clock, reader)
    }

    pub(crate) fn from_builder(builder: &MsfReceiverBuilder, clock: C, reader: R) -> Self {
        Self {
            clock,
            reader,
            correlator: MarkerCorrelator::new(builder.sample_period_ms()),
            sample_period_ms: builder.sample_period_ms(),
            vote_threshold_pct: builder.vote_threshold_pct(),
            sync_sleep_ms: builder.sync_sleep_ms(),
            bits_a: PayloadBits::new(),
            bits_b: PayloadBits::new(),
            failed_attempts: 0,
        }
    }

    /// One best-effort acquisition attempt
    ///
    /// Runs the full pipeline once and always returns a timestamp;
    /// a failed attempt comes back with
    /// [`checksum_passed`](MsfTime::checksum_passed) unset. Blocks for
    /// roughly two minutes against a real clock.
    pub fn acquire_once(&mut self) -> MsfTime {
        let result = self.attempt();
        if !result.checksum_passed {
            self.failed_attempts = self.failed_attempts.saturating_add(1);
        }
        result
    }

    /// Acquire until a frame validates
    ///
    /// Repeats [`acquire_once()`](MsfReceiver::acquire_once)
    /// indefinitely and returns the first result whose checksum
    /// passes. On a dead or jammed signal this never returns; watch
    /// [`failed_attempts()`](MsfReceiver::failed_attempts) from the
    /// caller if you need an escape hatch.
    pub fn acquire_blocking(&mut self) -> MsfTime {
        loop {
            info!("acquiring MSF time");
            let result = self.acquire_once();
            if result.checksum_passed {
                info!("acquired {}", result);
                return result;
            }
            warn!(
                "checksum failed ({} failed attempts); retrying",
                self.failed_attempts
            );
        }
    }

    /// Lifetime count of attempts that failed validation
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Sample period the receiver was built with (ms)
    pub fn sample_period_ms(&self) -> u32 {
        self.sample_period_ms
    }

    fn attempt(&mut self) -> MsfTime {
        let marker = match self.sync_to_minute_marker() {
            Some(marker) => marker,
            None => {
                // nothing resembling a marker in 65 s; hand back an
                // empty frame, which cannot pass the range check
                warn!("sync: no minute marker found");
                return MsfTime::default();
            }
        };

        let start = self.align_to_minute(marker);
        self.sample_minute(start);
        MsfTime::decode(&self.bits_a, &self.bits_b)
    }

    // Scan for the minute marker and estimate when the minute began.
    //
    // Feeds the correlator one sample per period for 65 s of wall
    // time and tracks the instant of the highest confidence. The
    // peak lands when the silence window covers the marker's 500 ms
    // silence, and the minute began at the start of that silence.
    fn sync_to_minute_marker(&mut self) -> Option<u32> {
        let (sleep_lo, sleep_hi) = self.sync_sleep_ms;
        let sleep = self.clock.rand_range(sleep_lo, sleep_hi);
        debug!("sync: sleeping {} ms to de-correlate the scan phase", sleep);
        let sleep_start = self.clock.now_millis();
        while self.clock.now_millis().wrapping_sub(sleep_start) < sleep {
            self.clock.delay_millis(1);
        }

        self.correlator.reset();
        info!("sync: scanning {} s for the minute marker", SYNC_SCAN_MS / 1000);

        let start_scan = self.clock.now_millis();
        let mut last_sample = start_scan.wrapping_sub(self.sample_period_ms);
        let mut last_report = start_scan;
        let mut score = 0u32;
        let mut best_score = 0u32;
        let mut time_of_best = 0u32;

        loop {
            let now = self.clock.now_millis();
            if now.wrapping_sub(start_scan) >= SYNC_SCAN_MS {
                break;
            }

            if now.wrapping_sub(last_sample) >= self.sample_period_ms {
                last_sample = now;
                score = self.correlator.input(self.reader.read());
                if score > best_score {
                    best_score = score;
                    time_of_best = now;
                }
            }

            if now.wrapping_sub(last_report) >= 100 {
                last_report = now;
                trace!(
                    "sync: T+{} ms score {} best {}",
                    now.wrapping_sub(start_scan),
                    score,
                    best_score
                );
            }

            self.clock.delay_micros(250);
        }

        debug!(
            "sync: peak score {} of {}",
            best_score,
            self.correlator.max_score()
        );
        if best_score == 0 {
            return None;
        }

        Some(time_of_best.wrapping_sub(MARKER_SILENCE_MS))
    }

    // Busy-wait until the next minute boundary after `marker`.
    //
    // The peak may have been found anywhere inside the 65 s scan, so
    // the next boundary is up to a full minute away.
    fn align_to_minute(&mut self, marker: u32) -> u32 {
        let elapsed = self.clock.now_millis().wrapping_sub(marker);
        let wait = 60_000 - (elapsed % 60_000);
        let start = self.clock.now_millis().wrapping_add(wait);
        debug!("sync: waiting {} ms for the minute boundary", wait);

        while (start.wrapping_sub(self.clock.now_millis()) as i32) > 0 {
            self.clock.delay_millis(1);
        }
        start
    }

    // Sample 60 seconds of payload bits starting at the minute
    // boundary `start`.
    //
    // Sampling free-runs at roughly 2 kHz. Inside each second, reads
    // landing in the two voting windows accumulate into per-window
    // counters; at each second boundary the counters resolve to one
    // A bit and one B bit by majority vote.
    fn sample_minute(&mut self, start: u32) {
        self.bits_a.reset();
        self.bits_b.reset();
        info!("reading 60 s of payload bits");

        let mut second = 0usize;
        let mut next_boundary = 1000u32;
        let (mut high_a, mut total_a) = (0u32, 0u32);
        let (mut high_b, mut total_b) = (0u32, 0u32);

        while second < 60 {
            // pacing keeps the counters far from overflow and yields
            // to the host scheduler
            self.clock.delay_micros(500);

            let elapsed = self.clock.now_millis().wrapping_sub(start);
            let ms_in_second = elapsed % 1000;

            // payload semantics invert the carrier: silence reads 1
            let bit = !self.reader.read();

            if (BIT_A_WINDOW_MS.0..=BIT_A_WINDOW_MS.1).contains(&ms_in_second) {
                total_a += 1;
                high_a += bit as u32;
            } else if (BIT_B_WINDOW_MS.0..=BIT_B_WINDOW_MS.1).contains(&ms_in_second) {
                total_b += 1;
                high_b += bit as u32;
            }

            if elapsed >= next_boundary {
                let pct_a = percentage(high_a, total_a);
                let pct_b = percentage(high_b, total_b);
                let val_a = pct_a > self.vote_threshold_pct;
                let val_b = pct_b > self.vote_threshold_pct;
                self.bits_a.set(second, val_a);
                self.bits_b.set(second, val_b);

                debug!(
                    "second {:02}: A:{} [{}%] B:{} [{}%]{}",
                    second,
                    val_a as u8,
                    pct_a,
                    val_b as u8,
                    pct_b,
                    if is_noisy(pct_a) || is_noisy(pct_b) {
                        " (noisy)"
                    } else {
                        ""
                    }
                );

                second += 1;
                next_boundary += 1000;
                high_a = 0;
                total_a = 0;
                high_b = 0;
                total_b = 0;
            }
        }
    }
}

#[inline]
fn percentage(high: u32, total: u32) -> u32 {
    if total > 0 {
        high * 100 / total
    } else {
        0
    }
}

// A clean bit dwells near 0% or 100%; anything in between means RF
// noise landed inside the voting window.
#[inline]
fn is_noisy(pct: u32) -> bool {
    pct > 10 && pct < 90
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedRadio;
    use crate::waveform;

    // Three identical minutes behind a steady-carrier prelude. The
    // scan finds the marker at the head of the first minute and the
    // bit pass lands on the third.
    fn broadcast_tape(year: u8, month: u8, day: u8, dow: u8, hour: u8, minute: u8) -> Vec<bool> {
        let mut tape = vec![true; 2000];
        let one_minute = waveform::encode_minute(year, month, day, dow, hour, minute);
        for _ in 0..3 {
            tape.extend_from_slice(&one_minute);
        }
        tape
    }

    fn receiver_for(tape: Vec<bool>) -> MsfReceiver<SimulatedRadio, crate::sim::SimulatedCarrier> {
        let radio = SimulatedRadio::new(tape);
        MsfReceiverBuilder::new()
            .with_sample_period_ms(20)
            .build(radio.clone(), radio.carrier())
    }

    #[test]
    fn test_acquire_perfect_broadcast() {
        let mut rx = receiver_for(broadcast_tape(24, 3, 17, 6, 14, 5));
        let time = rx.acquire_once();

        assert!(time.checksum_passed);
        assert_eq!(24, time.year);
        assert_eq!(3, time.month);
        assert_eq!(17, time.day);
        assert_eq!(14, time.hour);
        assert_eq!(5, time.minute);
        assert_eq!(0, time.second);
        assert_eq!(7, time.day_of_week);
        assert_eq!(0, rx.failed_attempts());
    }

    #[test]
    fn test_acquire_is_deterministic() {
        let first = receiver_for(broadcast_tape(24, 3, 17, 6, 14, 5)).acquire_once();
        let second = receiver_for(broadcast_tape(24, 3, 17, 6, 14, 5)).acquire_once();
        assert_eq!(first, second);
    }

    #[test]
    fn test_flatline_carrier_fails_checksum() {
        // a stuck-high carrier line: the scan still "finds" a best
        // instant, but every payload bit votes 0 and the empty frame
        // fails the range check
        let mut rx = receiver_for(vec![true; 1000]);
        let time = rx.acquire_once();

        assert!(!time.checksum_passed);
        assert_eq!(1, rx.failed_attempts());
    }

    #[test]
    fn test_marker_estimate_within_one_sample_period() {
        // a single marker whose silence ends 12 345 ms after the scan
        // starts; the minute therefore began at scan start + 11 845
        const PERIOD: u32 = 10;
        const SLEEP: u32 = 1000;
        const SILENCE_END: u32 = SLEEP + 12_345;

        let mut tape = vec![true; 80_000];
        for ms in SILENCE_END - MARKER_SILENCE_MS..SILENCE_END {
            tape[ms as usize] = false;
        }

        let radio = SimulatedRadio::new(tape);
        let mut rx = MsfReceiverBuilder::new()
            .with_sample_period_ms(PERIOD)
            .with_sync_sleep_ms(SLEEP, SLEEP + 1)
            .build(radio.clone(), radio.carrier());

        let marker = rx.sync_to_minute_marker().expect("marker must be found");
        let expect = SLEEP + 11_845;
        let error = marker as i64 - expect as i64;
        assert!(
            error.unsigned_abs() as u32 <= PERIOD,
            "estimate {} expected {} (error {})",
            marker,
            expect,
            error
        );
    }

    #[test]
    fn test_noisy_window_below_threshold_votes_zero() {
        // second 10: silence covers ms 135..=151 of window A, putting
        // 34 of the 62 votes (54.8%) at 1, under the 60% threshold
        let mut tape = vec![true; 60_000];
        for ms in 10_135..=10_151 {
            tape[ms] = false;
        }

        let radio = SimulatedRadio::new(tape);
        let mut rx = MsfReceiverBuilder::new().build(radio.clone(), radio.carrier());
        rx.sample_minute(0);

        assert!(!rx.bits_a.get(10));
    }

    #[test]
    fn test_noisy_window_above_threshold_votes_one() {
        // second 10: silence covers ms 135..=153, 38 of 62 votes
        // (61.3%) at 1, over the threshold
        let mut tape = vec![true; 60_000];
        for ms in 10_135..=10_153 {
            tape[ms] = false;
        }

        let radio = SimulatedRadio::new(tape);
        let mut rx = MsfReceiverBuilder::new().build(radio.clone(), radio.carrier());
        rx.sample_minute(0);

        assert!(rx.bits_a.get(10));
    }

    #[test]
    fn test_sample_minute_reads_clean_bits() {
        let (a, b) = waveform::encode_payload(24, 3, 17, 6, 14, 5);
        let tape = waveform::render_minute(&a, &b);

        let radio = SimulatedRadio::new(tape);
        let mut rx = MsfReceiverBuilder::new().build(radio.clone(), radio.carrier());
        rx.sample_minute(0);

        for second in 0..60 {
            if second == 0 {
                // the minute marker's silence spans both windows
                assert!(rx.bits_a.get(0));
                assert!(rx.bits_b.get(0));
            } else {
                assert_eq!(a.get(second), rx.bits_a.get(second), "A bit {}", second);
                assert_eq!(b.get(second), rx.bits_b.get(second), "B bit {}", second);
            }
        }
    }

    #[test]
    fn test_acquire_blocking_returns_valid_frame() {
        // six broadcast minutes; the one the first attempt lands on
        // carries a flipped bit, so attempt one fails and attempt two
        // reads a clean minute
        let mut tape = vec![true; 2000];
        let one_minute = waveform::encode_minute(24, 3, 17, 6, 14, 5);
        for _ in 0..6 {
            tape.extend_from_slice(&one_minute);
        }
        // force bit A of second 39 high in the third minute (the one
        // the first attempt reads): the weight-20 hour bit flips and
        // time parity fails
        for ms in 100..200 {
            tape[2000 + 2 * 60_000 + 39_000 + ms] = false;
        }

        let mut rx = receiver_for(tape);
        let time = rx.acquire_blocking();

        assert!(time.checksum_passed);
        assert_eq!(14, time.hour);
        assert_eq!(1, rx.failed_attempts());
    }
}
