//! Payload decoding and validation

use std::fmt;

use thiserror::Error;

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

#[cfg(feature = "chrono")]
use chrono::{DateTime, TimeZone, Utc};

use crate::bits::PayloadBits;
use crate::waveform::{
    BcdField, ParityGroup, DAY, DAY_OF_WEEK, HOUR, MINUTE, MONTH, PARITY_DATE, PARITY_DAY_OF_WEEK,
    PARITY_TIME, PARITY_YEAR, YEAR,
};

/// A decoded MSF timestamp
///
/// One acquisition attempt always produces an `MsfTime`, valid or not.
/// Check [`checksum_passed`](MsfTime::checksum_passed) before trusting
/// the fields; a failed attempt leaves them at whatever the corrupted
/// bits decoded to.
///
/// The timestamp refers to the top of the minute that was just
/// received, so `second` is structurally zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MsfTime {
    /// Year as broadcast: an offset from 2000, 0..=99
    pub year: u8,

    /// Month of year, 1..=12
    pub month: u8,

    /// Day of month, 1..=31
    pub day: u8,

    /// Hour of day, 0..=23
    pub hour: u8,

    /// Minute of hour, 0..=59
    pub minute: u8,

    /// Always zero: the bit stream is aligned to the minute boundary
    pub second: u8,

    /// Broadcast three-bit day-of-week value, offset by one to 1..=7
    pub day_of_week: u8,

    /// All four parity groups totalled odd and the calendar fields
    /// are in range
    pub checksum_passed: bool,
}

impl MsfTime {
    /// Decode the two payload registers into a timestamp
    ///
    /// A pure function of the registers: the same bits always decode
    /// to the same result. Parity and range failures are reported
    /// through `checksum_passed`, never as an error.
    pub fn decode(a: &PayloadBits, b: &PayloadBits) -> Self {
        let year = decode_bcd(a, &YEAR);
        let month = decode_bcd(a, &MONTH);
        let day = decode_bcd(a, &DAY);
        let day_of_week = decode_bcd(a, &DAY_OF_WEEK) + 1;
        let hour = decode_bcd(a, &HOUR);
        let minute = decode_bcd(a, &MINUTE);

        let parity_year = parity_ok(a, b, &PARITY_YEAR);
        let parity_date = parity_ok(a, b, &PARITY_DATE);
        let parity_day_of_week = parity_ok(a, b, &PARITY_DAY_OF_WEEK);
        let parity_time = parity_ok(a, b, &PARITY_TIME);

        let sane = (1..=12).contains(&month)
            && (1..=31).contains(&day)
            && hour <= 23
            && minute <= 59;

        if !(parity_year && parity_date && parity_day_of_week && parity_time) {
            debug!(
                "frame: parity year:{} date:{} dow:{} time:{}",
                parity_year, parity_date, parity_day_of_week, parity_time
            );
        }
        if !sane {
            debug!(
                "frame: fields out of range: month {} day {} hour {} minute {}",
                month, day, hour, minute
            );
        }

        Self {
            year,
            month,
            day,
            hour,
            minute,
            second: 0,
            day_of_week,
            checksum_passed: parity_year
                && parity_date
                && parity_day_of_week
                && parity_time
                && sane,
        }
    }

    /// Four-digit year
    ///
    /// The broadcast carries only two year digits; MSF time is defined
    /// relative to 2000.
    pub fn full_year(&self) -> u16 {
        2000 + self.year as u16
    }

    /// Convert to a UTC calendar timestamp
    ///
    /// Fails if the checksum did not pass or if the fields do not name
    /// a real calendar date (the broadcast-level sanity check accepts
    /// e.g. 31 February).
    #[cfg(feature = "chrono")]
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, InvalidTimeErr> {
        if !self.checksum_passed {
            return Err(InvalidTimeErr {});
        }

        Utc.with_ymd_and_hms(
            self.full_year().into(),
            self.month.into(),
            self.day.into(),
            self.hour.into(),
            self.minute.into(),
            0,
        )
        .single()
        .ok_or(InvalidTimeErr {})
    }
}

impl fmt::Display for MsfTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.full_year(),
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second
        )
    }
}

/// A decoded timestamp which cannot become a calendar time
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash)]
#[error("decoded timestamp is not a valid calendar time")]
pub struct InvalidTimeErr {}

// Sum the weights of the set bits in a BCD field
fn decode_bcd(bits: &PayloadBits, field: &BcdField) -> u8 {
    field
        .weights
        .iter()
        .enumerate()
        .filter(|&(i, _)| bits.get(field.start + i))
        .map(|(_, &weight)| weight)
        .sum()
}

// Odd parity over the group's A bits plus its B parity bit
fn parity_ok(a: &PayloadBits, b: &PayloadBits, group: &ParityGroup) -> bool {
    let ones = a.count_ones(group.start, group.count) + b.get(group.parity_bit) as u32;
    ones % 2 != 0
}
