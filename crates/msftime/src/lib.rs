//! # msftime: MSF 60 kHz broadcast receiver
//!
//! This crate decodes the United Kingdom's MSF time-and-date broadcast
//! into a calendar timestamp. Its only input is a one-bit
//! carrier-detect line from an external 60 kHz receiver module: `true`
//! while the carrier is present, `false` while it is suppressed. From
//! that single bit the receiver finds the minute marker, votes each of
//! the 120 payload bits, and validates the result against the
//! broadcast's four parity groups.
//!
//! ## Disclaimer
//!
//! This crate is dual-licensed MIT and Apache 2.0. Read these licenses
//! carefully as they may affect your rights.
//!
//! MSF reception degrades with distance from Anthorn and with local
//! interference; a validated frame is strong evidence of the correct
//! time but is not a certified time source. Do not use this crate as
//! the sole clock for anything safety-critical.
//!
//! ## Example
//!
//! You will first need a receiver module that turns the 60 kHz
//! broadcast into a carrier-detect level, such as any of the common
//! MSF/DCF77 ferrite-antenna boards. Wiring the module's output to a
//! GPIO and exposing it as a closure is all the integration required:
//!
//! ```no_run
//! use msftime::{MsfReceiverBuilder, StdClock};
//!
//! # fn read_gpio() -> bool { true }
//! let mut rx = MsfReceiverBuilder::new()
//!     .with_sample_period_ms(20)  // minute-marker search rate
//!     .with_vote_threshold_pct(60) // per-bit majority threshold
//!     .build(StdClock::new(), || read_gpio());
//!
//! // blocks for ~2 minutes per attempt until a frame validates
//! let time = rx.acquire_blocking();
//! println!("MSF says {}", time);
//! ```
//!
//! A single attempt is available as
//! [`acquire_once()`](MsfReceiver::acquire_once), which always returns
//! a timestamp and reports failure through
//! [`checksum_passed`](MsfTime::checksum_passed).
//!
//! Recorded or synthetic carrier tapes replay through
//! [`SimulatedRadio`], which drives the identical pipeline against a
//! virtual clock; see [`sim`] and the [`waveform`] synthesizer.
//!
//! ## Background
//!
//! MSF transmits from Anthorn, Cumbria. Every UTC second begins with a
//! carrier-off pulse; the start of each minute is marked by a long
//! 500 ms off period. Two payload bits ride in each second, and over a
//! minute they spell out year, month, day, day-of-week, hour, and
//! minute in weighted BCD, each field covered by an odd-parity bit.
//! The broadcast carries no seconds field: the timestamp *is* the
//! minute boundary the receiver synchronized to.
//!
//! ## Crate features
//!
//! * `chrono`: convert decoded timestamps to
//!   [chrono](https://crates.io/crates/chrono) `DateTime<Utc>` via
//!   [`MsfTime::to_datetime`]. If enabled, `chrono` becomes part of
//!   this crate's public API.

mod bits;
mod builder;
mod clock;
mod frame;
mod marker;
mod receiver;
pub mod sim;
pub mod waveform;

pub use bits::PayloadBits;
pub use builder::MsfReceiverBuilder;
pub use clock::{CarrierReader, MonotonicClock, StdClock};
pub use frame::{InvalidTimeErr, MsfTime};
pub use receiver::MsfReceiver;
pub use sim::{SimulatedCarrier, SimulatedRadio};
