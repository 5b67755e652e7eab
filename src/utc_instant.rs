//! Leap-second-aware UTC instants.

use core::fmt;
#[cfg(feature = "std")]
use core::str::FromStr;

use chrono::TimeDelta;

use crate::date_time;
use crate::errors::{DateTimeField, InstantError, ParseDateTimeError, ParseErrorKind};
use crate::leap_seconds::{tai_parts, utc_from_tai_parts, LeapSecondTable, SECS_PER_DAY};
#[cfg(feature = "std")]
use crate::leap_seconds::LeapSeconds;
use crate::{split_time_delta, time_delta_between, TaiInstant, NANOS_PER_SEC};

/// Modified Julian Day of the Unix epoch, 1970-01-01.
const UNIX_EPOCH_MJD: i64 = 40_587;

/// Number of UTC seconds at the end of a leap day over which the leap second
/// is smoothed when mapping to Unix time.
const SLS_WINDOW_SECS: i64 = 1000;

/// Number of nanoseconds in a day without leap second.
const NANOS_PER_DAY: u64 = SECS_PER_DAY as u64 * NANOS_PER_SEC as u64;

/// Nanosecond-precision UTC timestamp with leap seconds.
///
/// An instant is a Modified Julian Day number (days counted from 1858-11-17)
/// and a number of nanoseconds elapsed since the start of that day. The
/// nano-of-day is always smaller than the actual length of the day as given
/// by the [`LeapSecondTable`] the instant was validated against, so that
/// `23:59:60` exists only on days ending with a positive leap second.
///
/// Instants are ordered by day, then by nano-of-day.
///
/// # Examples
///
/// ```
/// use chrono::TimeDelta;
/// use tai_utc::{LeapSeconds, UtcInstant};
///
/// let mut table = LeapSeconds::new();
/// table.register(41_682, 1).unwrap(); // 1972-12-31
///
/// let t0 = UtcInstant::from_modified_julian_day(41_683, 0, &table).unwrap();
/// let t1 = UtcInstant::from_modified_julian_day(41_682, 0, &table).unwrap();
///
/// // Day 41682 lasts one second more than usual.
/// assert_eq!(t0.duration_until(t1, &table), Ok(TimeDelta::seconds(-86_401)));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(into = "alloc::string::String")
)]
#[cfg_attr(
    all(feature = "serde", feature = "std"),
    derive(serde::Deserialize),
    serde(try_from = "alloc::string::String")
)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UtcInstant {
    // Must be declared before `nano_of_day` for the derived ordering.
    mjd: i64,
    nano_of_day: u64,
}

impl UtcInstant {
    /// Creates an instant without checking the nano-of-day.
    pub(crate) const fn new_unchecked(mjd: i64, nano_of_day: u64) -> Self {
        Self { mjd, nano_of_day }
    }

    /// Creates an instant from a Modified Julian Day and a nano-of-day.
    ///
    /// Returns an error if the nano-of-day is not smaller than the length of
    /// the day according to the provided table.
    ///
    /// # Examples
    ///
    /// ```
    /// use tai_utc::{InstantError, LeapSeconds, UtcInstant};
    ///
    /// let mut table = LeapSeconds::new();
    /// table.register(41_682, 1).unwrap();
    ///
    /// // 1972-12-31T23:59:60Z
    /// let t = UtcInstant::from_modified_julian_day(41_682, 86_400_000_000_000, &table).unwrap();
    /// assert!(t.is_leap_second());
    ///
    /// // 1972-12-30 has no leap second.
    /// assert_eq!(
    ///     UtcInstant::from_modified_julian_day(41_681, 86_400_000_000_000, &table),
    ///     Err(InstantError::InvalidNanoOfDay { mjd: 41_681, nano_of_day: 86_400_000_000_000 })
    /// );
    /// ```
    pub fn from_modified_julian_day<T: LeapSecondTable + ?Sized>(
        mjd: i64,
        nano_of_day: u64,
        table: &T,
    ) -> Result<Self, InstantError> {
        table.validate(mjd, nano_of_day)?;

        Ok(Self { mjd, nano_of_day })
    }

    /// Creates an instant from a TAI timestamp.
    pub fn from_tai_instant<T: LeapSecondTable + ?Sized>(
        tai: TaiInstant,
        table: &T,
    ) -> Result<Self, InstantError> {
        table.tai_to_utc(tai)
    }

    /// Returns the Modified Julian Day.
    pub const fn modified_julian_day(&self) -> i64 {
        self.mjd
    }

    /// Returns the number of nanoseconds elapsed since the start of the day.
    pub const fn nano_of_day(&self) -> u64 {
        self.nano_of_day
    }

    /// Returns `true` if the instant lies within a leap second.
    pub const fn is_leap_second(&self) -> bool {
        self.nano_of_day >= NANOS_PER_DAY
    }

    /// Returns a copy of this instant moved to another day.
    ///
    /// The nano-of-day is kept, so moving a leap second onto a day without
    /// leap second is an error.
    pub fn with_modified_julian_day<T: LeapSecondTable + ?Sized>(
        self,
        mjd: i64,
        table: &T,
    ) -> Result<Self, InstantError> {
        Self::from_modified_julian_day(mjd, self.nano_of_day, table)
    }

    /// Returns a copy of this instant with another nano-of-day.
    pub fn with_nano_of_day<T: LeapSecondTable + ?Sized>(
        self,
        nano_of_day: u64,
        table: &T,
    ) -> Result<Self, InstantError> {
        Self::from_modified_julian_day(self.mjd, nano_of_day, table)
    }

    /// Converts this instant to TAI.
    ///
    /// Returns an error if the TAI seconds are outside the `i64` range.
    pub fn to_tai_instant<T: LeapSecondTable + ?Sized>(
        self,
        table: &T,
    ) -> Result<TaiInstant, InstantError> {
        table.utc_to_tai(self)
    }

    /// Adds a signed duration, checking for overflow.
    ///
    /// The duration is elapsed time: the addition is performed on the TAI
    /// time scale, so the result may fall inside a leap second.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::TimeDelta;
    /// use tai_utc::{LeapSeconds, UtcInstant};
    ///
    /// let mut table = LeapSeconds::new();
    /// table.register(41_682, 1).unwrap();
    ///
    /// let t = UtcInstant::parse("1972-12-31T12:00:00Z", &table).unwrap();
    /// let t = t.checked_add(TimeDelta::days(1), &table).unwrap();
    ///
    /// assert_eq!(t.to_string(), "1973-01-01T11:59:59Z");
    /// ```
    pub fn checked_add<T: LeapSecondTable + ?Sized>(
        self,
        delta: TimeDelta,
        table: &T,
    ) -> Result<Self, InstantError> {
        let (secs, nanos) = tai_parts(table, self);
        let (delta_secs, delta_nanos) = split_time_delta(delta);

        let mut secs = secs + i128::from(delta_secs);
        let mut nanos = nanos + delta_nanos;
        if nanos >= NANOS_PER_SEC {
            secs += 1;
            nanos -= NANOS_PER_SEC;
        }

        utc_from_tai_parts(table, secs, nanos)
    }

    /// Subtracts a signed duration, checking for overflow.
    ///
    /// See [`checked_add`](Self::checked_add).
    pub fn checked_sub<T: LeapSecondTable + ?Sized>(
        self,
        delta: TimeDelta,
        table: &T,
    ) -> Result<Self, InstantError> {
        let (secs, nanos) = tai_parts(table, self);
        let (delta_secs, delta_nanos) = split_time_delta(delta);

        let mut secs = secs - i128::from(delta_secs);
        let mut nanos = nanos;
        if nanos < delta_nanos {
            secs -= 1;
            nanos += NANOS_PER_SEC;
        }
        nanos -= delta_nanos;

        utc_from_tai_parts(table, secs, nanos)
    }

    /// Computes the elapsed time from this instant to another one.
    ///
    /// The result is negative if `other` lies in the past of `self`. Returns an
    /// error if the duration cannot be represented by a `TimeDelta`.
    pub fn duration_until<T: LeapSecondTable + ?Sized>(
        self,
        other: Self,
        table: &T,
    ) -> Result<TimeDelta, InstantError> {
        time_delta_between(tai_parts(table, self), tai_parts(table, other))
    }

    /// Parses an ISO 8601 UTC date-time such as `1972-12-31T23:59:60.25Z`.
    ///
    /// The format is `[±]YYYY-MM-DDThh:mm:ss[.f]Z` where the year has at least
    /// 4 digits and the optional fraction has between 1 and 9 digits. The
    /// seconds may be 60 only within a positive leap second.
    ///
    /// # Examples
    ///
    /// ```
    /// use tai_utc::{DateTimeField, LeapSeconds, ParseErrorKind, UtcInstant};
    ///
    /// let mut table = LeapSeconds::new();
    /// table.register(41_682, 1).unwrap();
    ///
    /// let t = UtcInstant::parse("1972-12-31T23:59:60.25Z", &table).unwrap();
    /// assert_eq!(t.modified_julian_day(), 41_682);
    /// assert_eq!(t.nano_of_day(), 86_400_250_000_000);
    ///
    /// let err = UtcInstant::parse("1972-12-30T23:59:60Z", &table).unwrap_err();
    /// assert_eq!(err.field(), Some(DateTimeField::Second));
    /// assert_eq!(err.kind(), &ParseErrorKind::InvalidLeapSecond);
    /// ```
    pub fn parse<T: LeapSecondTable + ?Sized>(
        text: &str,
        table: &T,
    ) -> Result<Self, ParseDateTimeError> {
        let err = |field: Option<DateTimeField>, kind: ParseErrorKind| {
            ParseDateTimeError::new(text, field, kind)
        };

        let fields = date_time::parse_date_time(text).map_err(|(field, kind)| err(field, kind))?;
        let (mjd, second_of_day) = fields
            .validate()
            .map_err(|e| err(Some(e.field()), e.into()))?;

        let nano_of_day =
            u64::from(second_of_day) * u64::from(NANOS_PER_SEC) + u64::from(fields.nano);

        // Either a leap second that did not happen or a second removed by a
        // negative leap second.
        Self::from_modified_julian_day(mjd, nano_of_day, table)
            .map_err(|_| err(Some(DateTimeField::Second), ParseErrorKind::InvalidLeapSecond))
    }

    /// Converts this instant to a Unix timestamp using UTC-SLS.
    ///
    /// Unix time has no leap seconds. On a day ending with a leap second, the
    /// last 1000 UTC seconds of the day are mapped linearly onto the last
    /// `1000 - adjustment` seconds of the Unix day; all other instants map
    /// exactly.
    ///
    /// The returned pair is a number of seconds since 1970-01-01 00:00:00 UTC
    /// and a number of nanoseconds in the future of these seconds.
    ///
    /// Returns an error if the number of seconds overflows an `i64`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tai_utc::{LeapSeconds, UtcInstant};
    ///
    /// let mut table = LeapSeconds::new();
    /// table.register(41_682, 1).unwrap();
    ///
    /// // The middle of the leap second of 1972-12-31.
    /// let t = UtcInstant::parse("1972-12-31T23:59:60.5Z", &table).unwrap();
    /// assert_eq!(t.to_unix_timestamp(&table), Ok((94_694_399, 500_500_000)));
    /// ```
    pub fn to_unix_timestamp<T: LeapSecondTable + ?Sized>(
        &self,
        table: &T,
    ) -> Result<(i64, u32), InstantError> {
        let adjustment = i128::from(table.leap_second_adjustment(self.mjd));
        let mut nano_of_day = i128::from(self.nano_of_day);

        if adjustment != 0 {
            let sls_start = sls_start(adjustment);
            if nano_of_day > sls_start {
                nano_of_day -= adjustment * (nano_of_day - sls_start) / i128::from(SLS_WINDOW_SECS);
            }
        }

        let nanos_per_sec = i128::from(NANOS_PER_SEC);
        let secs = (i128::from(self.mjd) - i128::from(UNIX_EPOCH_MJD)) * i128::from(SECS_PER_DAY)
            + nano_of_day / nanos_per_sec;

        let secs = secs
            .try_into()
            .map_err(|_| InstantError::ArithmeticOverflow)?;

        Ok((secs, (nano_of_day % nanos_per_sec) as u32))
    }

    /// Creates an instant from a Unix timestamp using UTC-SLS.
    ///
    /// This is the inverse of [`to_unix_timestamp`](Self::to_unix_timestamp),
    /// up to the nanosecond rounding within the smoothing window.
    ///
    /// Returns an error if the number of nanoseconds is greater than or equal
    /// to 1 second.
    pub fn from_unix_timestamp<T: LeapSecondTable + ?Sized>(
        secs: i64,
        subsec_nanos: u32,
        table: &T,
    ) -> Result<Self, InstantError> {
        if subsec_nanos >= NANOS_PER_SEC {
            return Err(InstantError::InvalidNano(subsec_nanos));
        }

        let secs_per_day = i64::from(SECS_PER_DAY);
        let mjd = secs.div_euclid(secs_per_day) + UNIX_EPOCH_MJD;
        let second_of_day = secs.rem_euclid(secs_per_day);

        let mut nano_of_day = i128::from(second_of_day) * i128::from(NANOS_PER_SEC)
            + i128::from(subsec_nanos);

        let adjustment = i128::from(table.leap_second_adjustment(mjd));
        if adjustment != 0 {
            let sls_start = sls_start(adjustment);
            if nano_of_day > sls_start {
                let window = i128::from(SLS_WINDOW_SECS);
                nano_of_day = sls_start + (nano_of_day - sls_start) * window / (window - adjustment);
            }
        }

        Self::from_modified_julian_day(mjd, nano_of_day as u64, table)
    }

    /// Returns a `chrono::DateTime` for this instant.
    ///
    /// A leap second is represented the `chrono` way, as `23:59:59` with a
    /// nanosecond field greater than or equal to 1 second. No table is needed
    /// since `chrono` keeps leap seconds apart rather than smoothing them.
    ///
    /// Returns an error if the date is outside the range supported by
    /// `chrono`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tai_utc::{LeapSeconds, UtcInstant};
    ///
    /// let mut table = LeapSeconds::new();
    /// table.register(41_682, 1).unwrap();
    ///
    /// let t = UtcInstant::parse("1972-12-31T23:59:60.5Z", &table).unwrap();
    /// let date_time = t.to_chrono_date_time().unwrap();
    ///
    /// assert_eq!(date_time.to_string(), "1972-12-31 23:59:60.500 UTC");
    /// ```
    pub fn to_chrono_date_time(&self) -> Result<chrono::DateTime<chrono::Utc>, InstantError> {
        let nanos_per_sec = u64::from(NANOS_PER_SEC);
        let (second_of_day, subsec_nanos) = if self.is_leap_second() {
            (
                u64::from(SECS_PER_DAY) - 1,
                self.nano_of_day - NANOS_PER_DAY + nanos_per_sec,
            )
        } else {
            (
                self.nano_of_day / nanos_per_sec,
                self.nano_of_day % nanos_per_sec,
            )
        };
        // `chrono` only has room for a single leap second.
        if subsec_nanos >= 2 * nanos_per_sec {
            return Err(InstantError::ArithmeticOverflow);
        }

        self.mjd
            .checked_sub(UNIX_EPOCH_MJD)
            .and_then(|days| days.checked_mul(SECS_PER_DAY.into()))
            .and_then(|secs| secs.checked_add(second_of_day as i64))
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, subsec_nanos as u32))
            .ok_or(InstantError::ArithmeticOverflow)
    }

    /// Creates an instant from a `chrono::DateTime`.
    ///
    /// A `chrono` leap second is only accepted at `23:59:59` UTC, and only on
    /// a day which ends with a leap second according to the table.
    pub fn from_chrono_date_time<Tz: chrono::TimeZone, T: LeapSecondTable + ?Sized>(
        date_time: &chrono::DateTime<Tz>,
        table: &T,
    ) -> Result<Self, InstantError> {
        let secs = date_time.timestamp();
        let subsec_nanos = date_time.timestamp_subsec_nanos();

        let secs_per_day = i64::from(SECS_PER_DAY);
        let mjd = secs.div_euclid(secs_per_day) + UNIX_EPOCH_MJD;
        let second_of_day = secs.rem_euclid(secs_per_day);
        let nano_of_day =
            second_of_day as u64 * u64::from(NANOS_PER_SEC) + u64::from(subsec_nanos);

        if subsec_nanos >= NANOS_PER_SEC && second_of_day != secs_per_day - 1 {
            return Err(InstantError::InvalidNanoOfDay { mjd, nano_of_day });
        }

        Self::from_modified_julian_day(mjd, nano_of_day, table)
    }
}

#[cfg(feature = "std")]
impl UtcInstant {
    /// Returns the current UTC time from the system clock.
    ///
    /// The system clock is assumed to smooth leap seconds over the last 1000
    /// seconds of the day, see [`from_unix_timestamp`](Self::from_unix_timestamp).
    pub fn now<T: LeapSecondTable + ?Sized>(table: &T) -> Result<Self, InstantError> {
        Self::from_system_time(&std::time::SystemTime::now(), table)
    }

    /// Creates an instant from a `SystemTime`.
    ///
    /// The system time is interpreted as a Unix timestamp, see
    /// [`from_unix_timestamp`](Self::from_unix_timestamp).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::{Duration, SystemTime};
    /// use tai_utc::{LeapSeconds, UtcInstant};
    ///
    /// let system_time = SystemTime::UNIX_EPOCH + Duration::new(1_000_530_300, 5_000_000);
    /// let t = UtcInstant::from_system_time(&system_time, &LeapSeconds::new()).unwrap();
    ///
    /// assert_eq!(t.to_string(), "2001-09-15T05:05:00.005Z");
    /// ```
    pub fn from_system_time<T: LeapSecondTable + ?Sized>(
        system_time: &std::time::SystemTime,
        table: &T,
    ) -> Result<Self, InstantError> {
        let (secs, nanos) = match system_time.duration_since(std::time::SystemTime::UNIX_EPOCH) {
            Ok(unix_time) => (
                i64::try_from(unix_time.as_secs()).map_err(|_| InstantError::ArithmeticOverflow)?,
                unix_time.subsec_nanos(),
            ),
            Err(err) => {
                // Before the Unix epoch: round the seconds towards `-∞`.
                let unix_time = err.duration();
                let nanos = unix_time.subsec_nanos();
                let secs = 0i64
                    .checked_sub_unsigned(unix_time.as_secs())
                    .and_then(|secs| if nanos == 0 { Some(secs) } else { secs.checked_sub(1) })
                    .ok_or(InstantError::ArithmeticOverflow)?;

                (secs, if nanos == 0 { 0 } else { NANOS_PER_SEC - nanos })
            }
        };

        Self::from_unix_timestamp(secs, nanos, table)
    }

    /// Returns a `SystemTime` for this instant.
    ///
    /// See [`to_unix_timestamp`](Self::to_unix_timestamp) for the treatment of
    /// leap seconds.
    pub fn to_system_time<T: LeapSecondTable + ?Sized>(
        &self,
        table: &T,
    ) -> Result<std::time::SystemTime, InstantError> {
        use std::time::{Duration, SystemTime};

        let (secs, nanos) = self.to_unix_timestamp(table)?;

        if secs >= 0 {
            SystemTime::UNIX_EPOCH.checked_add(Duration::new(secs.unsigned_abs(), nanos))
        } else {
            SystemTime::UNIX_EPOCH
                .checked_sub(Duration::from_secs(secs.unsigned_abs()))
                .and_then(|t| t.checked_add(Duration::from_nanos(nanos.into())))
        }
        .ok_or(InstantError::ArithmeticOverflow)
    }
}

/// Returns the nano-of-day at which UTC-SLS smoothing starts on a leap day.
fn sls_start(adjustment: i128) -> i128 {
    (i128::from(SECS_PER_DAY) + adjustment - i128::from(SLS_WINDOW_SECS))
        * i128::from(NANOS_PER_SEC)
}

impl fmt::Display for UtcInstant {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos_per_sec = u64::from(NANOS_PER_SEC);
        let second_of_day = self.nano_of_day / nanos_per_sec;
        let nano = (self.nano_of_day % nanos_per_sec) as u32;

        date_time::write_date(fmt, self.mjd)?;
        if self.is_leap_second() {
            write!(fmt, "T23:59:{:02}", 60 + (second_of_day - u64::from(SECS_PER_DAY)))?;
        } else {
            write!(
                fmt,
                "T{:02}:{:02}:{:02}",
                second_of_day / 3600,
                (second_of_day / 60) % 60,
                second_of_day % 60
            )?;
        }
        date_time::write_fraction(fmt, nano)?;

        fmt.write_str("Z")
    }
}

#[cfg(feature = "std")]
impl FromStr for UtcInstant {
    type Err = ParseDateTimeError;

    /// Parses a UTC date-time validated against [`LeapSeconds::system`].
    ///
    /// See [`UtcInstant::parse`] for the format.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, LeapSeconds::system())
    }
}

#[cfg(feature = "std")]
impl TryFrom<alloc::string::String> for UtcInstant {
    type Error = ParseDateTimeError;

    fn try_from(s: alloc::string::String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<UtcInstant> for alloc::string::String {
    fn from(t: UtcInstant) -> Self {
        alloc::string::ToString::to_string(&t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{DateTimeError, LeapSeconds};

    const NANOS: u64 = NANOS_PER_SEC as u64;

    // 1972-06-30, 1972-12-31 and 1973-12-31.
    fn table() -> LeapSeconds {
        let mut table = LeapSeconds::new();
        table.register(41_498, 1).unwrap();
        table.register(41_682, 1).unwrap();
        table.register(42_047, 1).unwrap();

        table
    }

    // 1995-10-10, a fictitious negative leap second.
    fn negative_table() -> LeapSeconds {
        let mut table = LeapSeconds::new();
        table.register(50_000, -1).unwrap();

        table
    }

    fn utc(mjd: i64, nano_of_day: u64) -> UtcInstant {
        UtcInstant::from_modified_julian_day(mjd, nano_of_day, &table()).unwrap()
    }

    #[test]
    fn leap_second_smoke() {
        let table = table();
        let t = UtcInstant::from_modified_julian_day(41_682, 86_400 * NANOS, &table).unwrap();

        assert!(t.is_leap_second());
        assert_eq!(t.to_string(), "1972-12-31T23:59:60Z");
        assert_eq!(
            t.with_modified_julian_day(41_681, &table),
            Err(InstantError::InvalidNanoOfDay {
                mjd: 41_681,
                nano_of_day: 86_400 * NANOS
            })
        );
        assert_eq!(
            t.with_modified_julian_day(42_047, &table),
            Ok(utc(42_047, 86_400 * NANOS))
        );
    }

    #[test]
    fn duration_across_leap_second() {
        let table = table();

        let t0 = utc(41_683, 0);
        let t1 = utc(41_682, 0);
        assert_eq!(t0.duration_until(t1, &table), Ok(TimeDelta::seconds(-86_401)));
        assert_eq!(t1.duration_until(t0, &table), Ok(TimeDelta::seconds(86_401)));

        let t2 = utc(41_681, 0);
        assert_eq!(t2.duration_until(t1, &table), Ok(TimeDelta::seconds(86_400)));
    }

    #[test]
    fn with_nano_of_day_bounds() {
        let table = table();

        let leap_day = utc(41_682, 0);
        assert!(leap_day
            .with_nano_of_day(86_401 * NANOS - 1, &table)
            .is_ok());
        assert_eq!(
            leap_day.with_nano_of_day(86_401 * NANOS, &table),
            Err(InstantError::InvalidNanoOfDay {
                mjd: 41_682,
                nano_of_day: 86_401 * NANOS
            })
        );

        let ordinary_day = utc(41_681, 0);
        assert!(ordinary_day
            .with_nano_of_day(86_400 * NANOS - 1, &table)
            .is_ok());
        assert!(ordinary_day
            .with_nano_of_day(86_400 * NANOS, &table)
            .is_err());

        let negative_table = negative_table();
        let short_day = UtcInstant::from_modified_julian_day(50_000, 0, &negative_table).unwrap();
        assert!(short_day
            .with_nano_of_day(86_399 * NANOS - 1, &negative_table)
            .is_ok());
        assert!(short_day
            .with_nano_of_day(86_399 * NANOS, &negative_table)
            .is_err());
    }

    #[test]
    fn ordering() {
        let t0 = utc(41_682, 86_400 * NANOS);
        let t1 = utc(41_683, 0);
        let t2 = utc(41_682, 86_399 * NANOS);

        assert!(t0 < t1);
        assert!(t2 < t0);
        assert!(utc(-5, 0) < utc(5, 0));
    }

    #[test]
    fn add_smoke() {
        let table = table();

        // 1972-12-31T23:59:59.5Z + 1s lands inside the leap second.
        let t = utc(41_682, 86_399 * NANOS + 500_000_000);
        let t1 = t.checked_add(TimeDelta::seconds(1), &table).unwrap();
        assert_eq!(t1, utc(41_682, 86_400 * NANOS + 500_000_000));

        let t2 = t1.checked_add(TimeDelta::seconds(1), &table).unwrap();
        assert_eq!(t2, utc(41_683, 500_000_000));

        assert_eq!(t2.checked_sub(TimeDelta::seconds(2), &table), Ok(t));
        assert_eq!(
            t.checked_add(TimeDelta::seconds(-2), &table),
            Ok(utc(41_682, 86_397 * NANOS + 500_000_000))
        );
    }

    #[test]
    fn add_across_negative_leap_second() {
        let table = negative_table();

        let t = UtcInstant::parse("1995-10-10T23:59:58.25Z", &table).unwrap();
        let t1 = t.checked_add(TimeDelta::milliseconds(1_000), &table).unwrap();

        assert_eq!(t1.to_string(), "1995-10-11T00:00:00.250Z");
        assert_eq!(t1.checked_sub(TimeDelta::milliseconds(1_000), &table), Ok(t));
    }

    #[test]
    fn add_overflow() {
        let table = table();

        let max = UtcInstant::from_modified_julian_day(i64::MAX, 86_400 * NANOS - 1, &table).unwrap();
        assert_eq!(
            max.checked_add(TimeDelta::nanoseconds(1), &table),
            Err(InstantError::ArithmeticOverflow)
        );
        assert!(max.checked_sub(TimeDelta::nanoseconds(1), &table).is_ok());

        let min = UtcInstant::from_modified_julian_day(i64::MIN, 0, &table).unwrap();
        assert_eq!(
            min.checked_sub(TimeDelta::nanoseconds(1), &table),
            Err(InstantError::ArithmeticOverflow)
        );
        assert_eq!(
            min.duration_until(max, &table),
            Err(InstantError::ArithmeticOverflow)
        );
    }

    #[test]
    fn tai_conversion() {
        let table = table();

        // 1972-01-01T00:00:00Z is 1972-01-01T00:00:10 TAI.
        let t = utc(41_317, 0);
        let tai = t.to_tai_instant(&table).unwrap();
        assert_eq!(tai, TaiInstant::new(441_763_210, 0).unwrap());
        assert_eq!(UtcInstant::from_tai_instant(tai, &table), Ok(t));

        // The leap second of 1972-12-31 and the following second are two
        // distinct TAI seconds.
        let leap = utc(41_682, 86_400 * NANOS).to_tai_instant(&table).unwrap();
        let next = utc(41_683, 0).to_tai_instant(&table).unwrap();
        assert_eq!(leap.duration_until(next), Ok(TimeDelta::seconds(1)));
        assert_eq!(tai.to_utc_instant(&table), Ok(t));
    }

    #[test]
    fn display() {
        let table = table();
        let cases = [
            (utc(51_544, 0), "2000-01-01T00:00:00Z"),
            (utc(51_544, 45_296_700_000_000), "2000-01-01T12:34:56.700Z"),
            (utc(51_544, 45_296_000_120_000), "2000-01-01T12:34:56.000120Z"),
            (utc(51_544, 45_296_000_000_001), "2000-01-01T12:34:56.000000001Z"),
            (utc(41_682, 86_400_999_999_999), "1972-12-31T23:59:60.999999999Z"),
            (utc(0, 0), "1858-11-17T00:00:00Z"),
        ];
        for (t, expected) in cases {
            assert_eq!(t.to_string(), expected);
            assert_eq!(UtcInstant::parse(expected, &table), Ok(t));
        }
    }

    #[test]
    fn display_extended_years() {
        let table = table();
        let cases = [
            ("+10000-01-01T00:00:00Z", "+10000-01-01T00:00:00Z"),
            ("10000-01-01T00:00:00Z", "+10000-01-01T00:00:00Z"),
            ("-0001-12-31T23:59:59.5Z", "-0001-12-31T23:59:59.500Z"),
            ("0000-01-01T00:00:00Z", "0000-01-01T00:00:00Z"),
            ("+2000-01-01T00:00:00Z", "2000-01-01T00:00:00Z"),
        ];
        for (text, expected) in cases {
            let t = UtcInstant::parse(text, &table).unwrap();
            assert_eq!(t.to_string(), expected, "{text}");
        }
    }

    #[test]
    fn parse_leap_second() {
        let table = table();

        let t = UtcInstant::parse("1972-06-30T23:59:60.123Z", &table).unwrap();
        assert_eq!(t, utc(41_498, 86_400_123_000_000));

        let err = UtcInstant::parse("1972-12-30T23:59:60Z", &table).unwrap_err();
        assert_eq!(err.text(), "1972-12-30T23:59:60Z");
        assert_eq!(err.field(), Some(DateTimeField::Second));
        assert_eq!(err.kind(), &ParseErrorKind::InvalidLeapSecond);

        let err = UtcInstant::parse("1972-12-31T23:58:60Z", &table).unwrap_err();
        assert_eq!(err.field(), Some(DateTimeField::Second));
        assert_eq!(
            err.kind(),
            &ParseErrorKind::RangeError(DateTimeError::InvalidSecond(60))
        );

        // The second removed by a negative leap second does not exist.
        let negative_table = negative_table();
        assert!(UtcInstant::parse("1995-10-10T23:59:58.999Z", &negative_table).is_ok());
        let err = UtcInstant::parse("1995-10-10T23:59:59Z", &negative_table).unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::InvalidLeapSecond);
    }

    #[test]
    fn double_leap_second_roundtrip() {
        // 1972-12-31 ends with 2 leap seconds.
        struct DoubleLeap;

        impl LeapSecondTable for DoubleLeap {
            fn leap_second_adjustment(&self, mjd: i64) -> i8 {
                if mjd == 41_682 {
                    2
                } else {
                    0
                }
            }

            fn tai_offset(&self, mjd: i64) -> i64 {
                if mjd > 41_682 {
                    12
                } else {
                    10
                }
            }
        }

        let t = UtcInstant::from_modified_julian_day(41_682, 86_401 * NANOS + 5, &DoubleLeap)
            .unwrap();
        assert_eq!(t.to_string(), "1972-12-31T23:59:61.000000005Z");
        assert_eq!(UtcInstant::parse(&t.to_string(), &DoubleLeap), Ok(t));

        let err = UtcInstant::parse("1972-12-31T23:59:62Z", &DoubleLeap).unwrap_err();
        assert_eq!(err.field(), Some(DateTimeField::Second));
        assert_eq!(err.kind(), &ParseErrorKind::InvalidLeapSecond);

        let err = UtcInstant::parse("1972-12-30T23:59:61Z", &DoubleLeap).unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::InvalidLeapSecond);
    }

    #[test]
    fn parse_invalid() {
        let table = table();
        let cases = [
            ("1972-02-30T00:00:00Z", DateTimeField::Day),
            ("1972-13-01T00:00:00Z", DateTimeField::Month),
            ("1972-01-01T24:00:00Z", DateTimeField::Hour),
            ("1972-01-01T00:00:00", DateTimeField::Designator),
            ("1972-01-01 00:00:00Z", DateTimeField::Day),
            ("1972-01-01T00:00:00.Z", DateTimeField::Fraction),
            ("1972-01-01T00:00:00.1234567890Z", DateTimeField::Fraction),
            ("72-01-01T00:00:00Z", DateTimeField::Year),
        ];
        for (text, field) in cases {
            let err = UtcInstant::parse(text, &table).unwrap_err();
            assert_eq!(err.field(), Some(field), "{text}");
        }
    }

    #[test]
    fn unix_timestamp_outside_window() {
        let table = table();

        assert_eq!(utc(40_587, 0).to_unix_timestamp(&table), Ok((0, 0)));
        assert_eq!(
            utc(40_586, 86_399 * NANOS + 1).to_unix_timestamp(&table),
            Ok((-1, 1))
        );
        // Start of the smoothing window on 1972-12-31.
        assert_eq!(
            utc(41_682, 85_401 * NANOS).to_unix_timestamp(&table),
            Ok((94_608_000 + 85_401, 0))
        );
        assert_eq!(
            utc(41_683, 0).to_unix_timestamp(&table),
            Ok((94_694_400, 0))
        );
        assert_eq!(
            UtcInstant::from_unix_timestamp(94_694_400, 0, &table),
            Ok(utc(41_683, 0))
        );
        assert_eq!(
            UtcInstant::from_unix_timestamp(94_608_000 + 85_401, 0, &table),
            Ok(utc(41_682, 85_401 * NANOS))
        );
        assert_eq!(
            UtcInstant::from_unix_timestamp(0, 1_000_000_000, &table),
            Err(InstantError::InvalidNano(1_000_000_000))
        );
    }

    #[test]
    fn unix_timestamp_smoothing() {
        let table = table();

        let t = utc(41_682, 86_400 * NANOS + 500_000_000);
        assert_eq!(t.to_unix_timestamp(&table), Ok((94_694_399, 500_500_000)));
        assert_eq!(
            UtcInstant::from_unix_timestamp(94_694_399, 500_500_000, &table),
            Ok(t)
        );

        let negative_table = negative_table();
        let t = UtcInstant::from_modified_julian_day(50_000, 86_398 * NANOS + 500_000_000, &negative_table)
            .unwrap();
        let base = (50_000 - UNIX_EPOCH_MJD) * i64::from(SECS_PER_DAY);
        assert_eq!(
            t.to_unix_timestamp(&negative_table),
            Ok((base + 86_399, 499_500_000))
        );
        assert_eq!(
            UtcInstant::from_unix_timestamp(base + 86_399, 499_500_000, &negative_table),
            Ok(t)
        );
    }

    #[test]
    fn unix_timestamp_monotonic() {
        let table = table();

        let mut last = (i64::MIN, 0);
        for secs in 85_000..=86_400 {
            for nano in [0, 250_000_000, 500_000_000, 750_000_000] {
                let t = utc(41_682, secs * NANOS + nano);
                let unix = t.to_unix_timestamp(&table).unwrap();
                assert!(unix > last, "{t}");
                last = unix;
            }
        }
        assert!(utc(41_683, 0).to_unix_timestamp(&table).unwrap() > last);
    }

    #[test]
    fn chrono_conversion() {
        use chrono::DateTime;

        let table = table();

        let leap = utc(41_682, 86_400 * NANOS + 500_000_000);
        let date_time = leap.to_chrono_date_time().unwrap();
        assert_eq!(date_time, DateTime::from_timestamp(94_694_399, 1_500_000_000).unwrap());
        assert_eq!(UtcInstant::from_chrono_date_time(&date_time, &table), Ok(leap));

        let ordinary = utc(41_682, 3_600 * NANOS + 7);
        let date_time = ordinary.to_chrono_date_time().unwrap();
        assert_eq!(date_time, DateTime::from_timestamp(94_611_600, 7).unwrap());
        assert_eq!(UtcInstant::from_chrono_date_time(&date_time, &table), Ok(ordinary));

        // A `chrono` leap second at the end of an hour.
        let date_time = DateTime::from_timestamp(94_611_599, 1_500_000_000).unwrap();
        assert_eq!(
            UtcInstant::from_chrono_date_time(&date_time, &table),
            Err(InstantError::InvalidNanoOfDay {
                mjd: 41_682,
                nano_of_day: 3_600 * NANOS + 500_000_000
            })
        );

        // A `chrono` leap second on a day without leap second.
        let date_time = DateTime::from_timestamp(94_607_999, 1_500_000_000).unwrap();
        assert_eq!(
            UtcInstant::from_chrono_date_time(&date_time, &table),
            Err(InstantError::InvalidNanoOfDay {
                mjd: 41_681,
                nano_of_day: 86_400 * NANOS + 500_000_000
            })
        );

        assert_eq!(
            utc(i64::MAX, 0).to_chrono_date_time(),
            Err(InstantError::ArithmeticOverflow)
        );
    }

    #[cfg(feature = "std")]
    #[test]
    fn system_time_conversion() {
        use std::time::{Duration, SystemTime};

        let table = table();

        let t = utc(41_683, 250_000_000);
        let system_time = t.to_system_time(&table).unwrap();
        assert_eq!(system_time, SystemTime::UNIX_EPOCH + Duration::new(94_694_400, 250_000_000));
        assert_eq!(UtcInstant::from_system_time(&system_time, &table), Ok(t));

        // Before the Unix epoch.
        let t = utc(40_586, 86_399 * NANOS + 250_000_000);
        let system_time = t.to_system_time(&table).unwrap();
        assert_eq!(system_time, SystemTime::UNIX_EPOCH - Duration::from_millis(750));
        assert_eq!(UtcInstant::from_system_time(&system_time, &table), Ok(t));
    }

    #[cfg(feature = "std")]
    #[test]
    fn now_smoke() {
        // 2022-01-01 and 2100-01-01.
        const MJD_2022: i64 = 59_580;
        const MJD_2100: i64 = 88_069;

        let now = UtcInstant::now(&table()).unwrap();

        assert!(now.modified_julian_day() > MJD_2022);
        assert!(now.modified_julian_day() < MJD_2100);
    }

    #[cfg(all(feature = "serde", feature = "std"))]
    #[test]
    fn serde_smoke() {
        let t = utc(51_544, 45_296_700_000_000);

        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"2000-01-01T12:34:56.700Z\"");
        assert_eq!(serde_json::from_str::<UtcInstant>(&json).unwrap(), t);
        assert!(serde_json::from_str::<UtcInstant>("\"2000-01-01T12:34:56\"").is_err());
    }

    fn arbitrary_utc(table: &LeapSeconds, day: u16, nano: u64) -> UtcInstant {
        // Days around the first leap seconds.
        let mjd = 41_400 + i64::from(day % 1_000);
        let nano_of_day = nano % table.nanos_in_day(mjd);

        UtcInstant::from_modified_julian_day(mjd, nano_of_day, table).unwrap()
    }

    quickcheck::quickcheck! {
        fn prop_display_parse_roundtrip(day: u16, nano: u64) -> bool {
            let table = table();
            let t = arbitrary_utc(&table, day, nano);

            UtcInstant::parse(&t.to_string(), &table) == Ok(t)
        }

        fn prop_display_parse_roundtrip_any_day(mjd: i64, nano: u64) -> bool {
            let table = table();
            let t = UtcInstant::from_modified_julian_day(mjd, nano % NANOS_PER_DAY, &table).unwrap();

            UtcInstant::parse(&t.to_string(), &table) == Ok(t)
        }

        fn prop_tai_roundtrip(day: u16, nano: u64) -> bool {
            let table = table();
            let t = arbitrary_utc(&table, day, nano);

            t.to_tai_instant(&table).and_then(|tai| tai.to_utc_instant(&table)) == Ok(t)
        }

        fn prop_add_sub_inverse(day: u16, nano: u64, delta_millis: i64) -> bool {
            let table = table();
            let t = arbitrary_utc(&table, day, nano);
            // Up to about 3 years.
            let delta = TimeDelta::milliseconds(delta_millis % 100_000_000_000);

            let t1 = t.checked_add(delta, &table).unwrap();

            t1.checked_sub(delta, &table) == Ok(t) && t.duration_until(t1, &table) == Ok(delta)
        }
    }
}
