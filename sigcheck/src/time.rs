// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use core::fmt::{self, Display, Formatter};
use core::time::Duration;
use serde::Serialize;

/// Seconds between 1601-01-01 (the Windows epoch) and 1970-01-01.
pub const SECONDS_TO_UNIX_EPOCH: u64 = 11_644_473_600;

/// 100-nanosecond ticks per second.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

const NANOS_PER_TICK: u32 = 100;

/// A time outside the range a [`FileTime`] or calendar value can hold.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimestampConversionError;

impl Display for TimestampConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "timestamp is out of the representable range")
    }
}

impl std::error::Error for TimestampConversionError {}

/// Absolute time in 100-nanosecond ticks since 1601-01-01 UTC.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct FileTime(pub u64);

impl FileTime {
    /// Convert a duration since the Unix epoch.
    pub fn from_unix_duration(
        since_unix: Duration,
    ) -> Result<Self, TimestampConversionError> {
        let ticks = since_unix
            .as_secs()
            .checked_add(SECONDS_TO_UNIX_EPOCH)
            .and_then(|secs| secs.checked_mul(TICKS_PER_SECOND))
            .and_then(|ticks| {
                ticks.checked_add(u64::from(
                    since_unix.subsec_nanos() / NANOS_PER_TICK,
                ))
            })
            .ok_or(TimestampConversionError)?;
        Ok(Self(ticks))
    }

    /// Convert a header build timestamp (seconds since the Unix epoch).
    pub fn from_unix_seconds(
        seconds: u32,
    ) -> Result<Self, TimestampConversionError> {
        Self::from_unix_duration(Duration::from_secs(u64::from(seconds)))
    }

    /// The instant as a UTC date and time.
    pub fn to_utc(self) -> Result<DateTime<Utc>, TimestampConversionError> {
        let secs = self.0 / TICKS_PER_SECOND;
        let ticks = self.0 % TICKS_PER_SECOND;
        // `ticks` is below 10^7, so the product fits in a u32.
        let nanos = u32::try_from(ticks)
            .ok()
            .and_then(|t| t.checked_mul(NANOS_PER_TICK))
            .ok_or(TimestampConversionError)?;
        let unix_secs = i64::try_from(secs)
            .ok()
            .and_then(|s| s.checked_sub(SECONDS_TO_UNIX_EPOCH as i64))
            .ok_or(TimestampConversionError)?;
        DateTime::from_timestamp(unix_secs, nanos).ok_or(TimestampConversionError)
    }

    /// The instant as calendar fields in the local time zone.
    pub fn to_local(self) -> Result<NaiveDateTime, TimestampConversionError> {
        Ok(self.to_utc()?.with_timezone(&Local).naive_local())
    }
}

/// Where the timestamp of a report came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum TimestampSource {
    /// Signing time of a counter-signer.
    SecureCounterSignature,
    /// Build time from the PE file header.
    HeaderFallback,
    /// No time could be determined; the value is the sentinel.
    Unavailable,
}

/// Calendar time of signing, in the local time zone.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct TimestampInfo {
    /// Local calendar date and time.
    pub value: NaiveDateTime,
    /// Origin of `value`.
    pub source: TimestampSource,
}

impl TimestampInfo {
    /// The `1970-01-01 00:00` placeholder used when no time is known.
    pub fn unavailable() -> Self {
        Self {
            value: sentinel(),
            source: TimestampSource::Unavailable,
        }
    }

    /// Format as `HH:MM DD/MM/YYYY`.
    pub fn display(&self) -> String {
        self.value.format("%H:%M %d/%m/%Y").to_string()
    }
}

/// `1970-01-01 00:00`, the value reported when no time can be derived.
pub fn sentinel() -> NaiveDateTime {
    // The default calendar value is the Unix epoch.
    NaiveDateTime::default()
}

/// Convert a header build timestamp to local calendar time.
pub fn try_derive(
    header_timestamp: u32,
) -> Result<NaiveDateTime, TimestampConversionError> {
    FileTime::from_unix_seconds(header_timestamp)?.to_local()
}

/// Convert a header build timestamp to local calendar time, or the
/// sentinel if the conversion fails.
pub fn derive(header_timestamp: u32) -> NaiveDateTime {
    try_derive(header_timestamp).unwrap_or_else(|err| {
        tracing::warn!(header_timestamp, %err, "using sentinel timestamp");
        sentinel()
    })
}
