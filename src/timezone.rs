//! Conversion between epoch-millisecond timestamps and local calendar dates.

use std::fmt::Debug;

use time::{Date, OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone, Tz};

/// The number of nanoseconds in a millisecond.
const NANOS_PER_MILLI: i128 = 1_000_000;

/// The timezone that calendar days and months are evaluated in.
#[derive(Clone, Copy)]
pub enum LocalZone {
    /// A fixed offset from UTC, mostly useful for tests.
    Fixed(UtcOffset),
    /// A canonical IANA timezone, e.g. "Asia/Seoul", with daylight saving rules.
    Named(&'static Tz),
}

impl LocalZone {
    /// Look up a canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// Returns `None` if the name is not a known timezone.
    pub fn from_name(canonical_timezone: &str) -> Option<Self> {
        time_tz::timezones::get_by_name(canonical_timezone).map(LocalZone::Named)
    }

    /// The UTC offset in effect at the instant `utc`.
    pub fn offset_at(&self, utc: OffsetDateTime) -> UtcOffset {
        match self {
            LocalZone::Fixed(offset) => *offset,
            LocalZone::Named(tz) => tz.get_offset_utc(&utc).to_utc(),
        }
    }

    /// The current local date time.
    pub fn now(&self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        now.to_offset(self.offset_at(now))
    }

    /// The current local calendar date.
    pub fn today(&self) -> Date {
        self.now().date()
    }

    /// The local calendar date of an epoch-millisecond timestamp.
    ///
    /// Returns `None` if the timestamp is outside the supported date range.
    pub fn date_of(&self, timestamp_millis: i64) -> Option<Date> {
        let utc = from_timestamp_millis(timestamp_millis)?;
        Some(utc.to_offset(self.offset_at(utc)).date())
    }

    /// The epoch-millisecond timestamp of local midnight at the start of `date`.
    ///
    /// On days where the offset changes the offset at UTC midnight may differ
    /// from the offset at local midnight, so the guess is corrected once. If
    /// midnight is skipped by a daylight saving gap, the earliest instant that
    /// falls on `date` is used.
    pub fn midnight_millis(&self, date: Date) -> i64 {
        let midnight = date.midnight();
        let guess = midnight.assume_offset(self.offset_at(midnight.assume_utc()));
        let corrected = midnight.assume_offset(self.offset_at(guess));

        [guess, corrected]
            .into_iter()
            .filter(|candidate| candidate.to_offset(self.offset_at(*candidate)).date() == date)
            .min()
            .map_or_else(|| to_timestamp_millis(corrected), to_timestamp_millis)
    }
}

impl Debug for LocalZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocalZone::Fixed(offset) => f.debug_tuple("Fixed").field(offset).finish(),
            LocalZone::Named(tz) => f.debug_tuple("Named").field(&tz.name()).finish(),
        }
    }
}

/// Convert epoch milliseconds to a UTC date time.
pub fn from_timestamp_millis(timestamp_millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(timestamp_millis as i128 * NANOS_PER_MILLI).ok()
}

/// Convert a date time to epoch milliseconds.
pub fn to_timestamp_millis(date_time: OffsetDateTime) -> i64 {
    (date_time.unix_timestamp_nanos() / NANOS_PER_MILLI) as i64
}

/// The current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    to_timestamp_millis(OffsetDateTime::now_utc())
}
