//! Nanosecond-precision UTC and TAI instants with exact leap second handling.
//!
//! # Overview
//!
//! UTC days do not all have the same length: a day ending with a leap second
//! lasts 86401 seconds. Timestamps which ignore this fact, such as Unix time,
//! cannot represent the leap second itself and silently stretch or repeat
//! seconds around it.
//!
//! This crate provides two immutable timestamps which model time exactly:
//!
//! - [`UtcInstant`] is a Modified Julian Day number and a nanosecond offset
//!   within that day. The offset is bounded by the actual length of the day, so
//!   `1972-12-31T23:59:60.5Z` is a valid instant while
//!   `1972-12-30T23:59:60.5Z` is not.
//! - [`TaiInstant`] is a uniform count of seconds and nanoseconds since
//!   1958-01-01 00:00:00 TAI, without leap seconds.
//!
//! The correspondence between both is given by a [`LeapSecondTable`], which is
//! always passed explicitly. [`LeapSeconds`] is the provided table: it can be
//! built programmatically, parsed from the leap second files of the IANA time
//! zone database or, with the `std` feature, discovered on the host system.
//!
//! Arithmetic with [`chrono::TimeDelta`] durations is performed in TAI, so
//! adding one day to an instant preceding a leap second yields an instant one
//! second earlier on the wall clock than a naive calendar addition.
//!
//!
//! # Design choices and limitations
//!
//! The leap second table is never implicit. This is intentional: leap seconds
//! cannot be predicted far in the future and a table silently embedded in this
//! library would eventually become stale. The same table must be used for all
//! operations on a given set of instants.
//!
//! Before the first registered leap second, TAI - UTC is taken to be 10s. No
//! attempt is made at modeling the rubber seconds used prior to 1972.
//!
//!
//! # Features flags
//!
//! ### Support for `no-std`
//!
//! By default, this crate enables the `std` feature to access the operating
//! system clock and leap second files, but specifying
//! `default-features = false` makes it `no-std`-compatible (an allocator is
//! still required).
//!
//! ### Logging
//!
//! The `logging` feature emits diagnostics through the [`log`] crate, mostly
//! when locating and parsing leap second files.
//!
//! ### TAI system clock
//!
//! On Linux, the `tai_clock` feature provides
//! [`TaiInstant::now_from_tai_clock`], which reads `CLOCK_TAI`.
//!
//! ### Serialization
//!
//! `TaiInstant` and `UtcInstant` can be (de)serialized with `serde` by
//! activating the `serde` feature. Both use their textual representation.
//! Deserializing a `UtcInstant` requires the `std` feature since it is
//! validated against [`LeapSeconds::system`].
//!
//! [`log`]: https://crates.io/crates/log
//!
//!
//! # Examples
//!
//! ```
//! use chrono::TimeDelta;
//! use tai_utc::{LeapSeconds, UtcInstant};
//!
//! let mut table = LeapSeconds::new();
//! table.register(41_682, 1).unwrap(); // 1972-12-31
//!
//! let t0 = UtcInstant::parse("1972-12-31T23:59:59.5Z", &table).unwrap();
//! let t1 = t0.checked_add(TimeDelta::seconds(1), &table).unwrap();
//!
//! assert!(t1.is_leap_second());
//! assert_eq!(t1.to_string(), "1972-12-31T23:59:60.500Z");
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

#[macro_use]
mod logging;

mod date_time;
mod errors;
mod leap_seconds;
#[cfg(feature = "std")]
mod tai_clock;
mod utc_instant;

use core::fmt;
use core::ops::{Add, AddAssign, Sub, SubAssign};
use core::str::FromStr;
use core::time::Duration;

use chrono::TimeDelta;

pub use errors::{
    DateTimeError, DateTimeField, InstantError, LeapSecondTableError, ParseDateTimeError,
    ParseErrorKind,
};
#[cfg(feature = "std")]
pub use leap_seconds::LEAP_SECONDS_ENV;
pub use leap_seconds::{
    LeapSecondTable, LeapSeconds, INITIAL_TAI_OFFSET, SECS_PER_DAY, TAI_EPOCH_MJD,
};
#[cfg(feature = "std")]
pub use tai_clock::TaiClock;
pub use utc_instant::UtcInstant;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Nanosecond-precision TAI timestamp.
///
/// A timestamp specifies a [TAI] point in time. It is represented as a 64-bit
/// signed number of seconds and a positive number of nanoseconds counted from
/// 1958-01-01 00:00:00 TAI.
///
/// Its canonical textual representation is `<seconds>.<nanoseconds>s(TAI)`
/// where the nanoseconds always have 9 digits.
///
/// [TAI]: https://en.wikipedia.org/wiki/International_Atomic_Time
///
/// # Examples
///
/// ```
/// use chrono::TimeDelta;
/// use tai_utc::TaiInstant;
///
/// let timestamp = TaiInstant::new(1_234_567_890, 333_333_333).unwrap();
///
/// // Increment the timestamp by 123.456s.
/// let timestamp = timestamp + TimeDelta::milliseconds(123_456);
///
/// assert_eq!(timestamp, TaiInstant::new(1_234_568_013, 789_333_333).unwrap());
/// assert_eq!(timestamp.to_string(), "1234568013.789333333s(TAI)");
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "alloc::string::String", into = "alloc::string::String")
)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaiInstant {
    /// The number of whole seconds in the future (if positive) or in the past
    /// (if negative) of 1958-01-01 00:00:00 TAI.
    ///
    /// Note that the automatic derivation of `PartialOrd` relies on
    /// lexicographical comparison so the `secs` field must appear before
    /// `nanos` in declaration order to be given higher priority.
    secs: i64,
    /// The sub-second number of nanoseconds in the future of the point in time
    /// defined by `secs`.
    nanos: u32,
}

impl TaiInstant {
    /// The reference epoch, 1958-01-01 00:00:00 TAI.
    pub const EPOCH: Self = Self { secs: 0, nanos: 0 };

    /// The minimum possible `TaiInstant` timestamp.
    pub const MIN: Self = Self {
        secs: i64::MIN,
        nanos: 0,
    };

    /// The maximum possible `TaiInstant` timestamp.
    pub const MAX: Self = Self {
        secs: i64::MAX,
        nanos: NANOS_PER_SEC - 1,
    };

    /// Creates a timestamp relative to the epoch.
    ///
    /// The number of seconds is negative for dates in the past of the epoch.
    /// The number of nanoseconds is always positive and always points towards
    /// the future.
    ///
    /// Returns an error if the number of nanoseconds is greater than or equal
    /// to 1 second.
    pub const fn new(secs: i64, subsec_nanos: u32) -> Result<Self, InstantError> {
        if subsec_nanos >= NANOS_PER_SEC {
            return Err(InstantError::InvalidNano(subsec_nanos));
        }

        Ok(Self {
            secs,
            nanos: subsec_nanos,
        })
    }

    /// Creates a timestamp from a number of seconds and an arbitrary
    /// nanosecond adjustment.
    ///
    /// The adjustment may be negative or exceed one second; it is normalized
    /// so that the sub-second part always lies in `[0, 1e9)`.
    ///
    /// Returns an error if the normalized number of seconds overflows.
    ///
    /// # Examples
    ///
    /// ```
    /// use tai_utc::TaiInstant;
    ///
    /// let t = TaiInstant::from_tai_seconds(10, -500).unwrap();
    /// assert_eq!((t.as_secs(), t.subsec_nanos()), (9, 999_999_500));
    ///
    /// let t = TaiInstant::from_tai_seconds(10, 1_000_000_500).unwrap();
    /// assert_eq!((t.as_secs(), t.subsec_nanos()), (11, 500));
    /// ```
    pub const fn from_tai_seconds(secs: i64, nano_adjustment: i64) -> Result<Self, InstantError> {
        let carry = nano_adjustment.div_euclid(NANOS_PER_SEC as i64);
        let nanos = nano_adjustment.rem_euclid(NANOS_PER_SEC as i64) as u32;

        match secs.checked_add(carry) {
            Some(secs) => Ok(Self { secs, nanos }),
            None => Err(InstantError::ArithmeticOverflow),
        }
    }

    /// Returns the current TAI time from the UTC system clock.
    ///
    /// The system clock is assumed to follow UTC with leap seconds smeared
    /// over the last 1000 seconds of the day, see
    /// [`UtcInstant::from_unix_timestamp`].
    #[cfg(feature = "std")]
    pub fn now<T: LeapSecondTable + ?Sized>(table: &T) -> Result<Self, InstantError> {
        UtcInstant::now(table)?.to_tai_instant(table)
    }

    /// Returns the current TAI time from the Linux `CLOCK_TAI` clock.
    ///
    /// Beware that `CLOCK_TAI` is only meaningful if the kernel was informed of
    /// the current TAI - UTC offset, which is typically done by an NTP or PTP
    /// daemon. Otherwise, this clock returns UTC time.
    #[cfg(all(feature = "tai_clock", target_os = "linux"))]
    pub fn now_from_tai_clock() -> std::io::Result<Self> {
        use nix::time::{clock_gettime, ClockId};

        // Seconds between 1958-01-01 00:00:00 TAI and the `CLOCK_TAI` epoch,
        // 1970-01-01 00:00:00 TAI.
        const CLOCK_TAI_EPOCH_REF: i64 = 378_691_200;

        let time = clock_gettime(ClockId::CLOCK_TAI).map_err(std::io::Error::from)?;

        #[allow(clippy::useless_conversion)]
        let secs = i64::from(time.tv_sec()).checked_add(CLOCK_TAI_EPOCH_REF);
        #[allow(clippy::useless_conversion)]
        let nanos = i64::from(time.tv_nsec());

        secs.ok_or(InstantError::ArithmeticOverflow)
            .and_then(|secs| Self::from_tai_seconds(secs, nanos))
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))
    }

    /// Returns the signed number of whole seconds relative to the epoch.
    ///
    /// This number is negative for timestamps in the past of the epoch, in
    /// which case the number of nanoseconds returned by
    /// [`subsec_nanos`](Self::subsec_nanos) counts forward from it.
    pub const fn as_secs(&self) -> i64 {
        self.secs
    }

    /// Returns the sub-second fractional part in nanoseconds.
    pub const fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// Returns a copy of this timestamp with the number of seconds replaced.
    pub const fn with_tai_seconds(self, secs: i64) -> Self {
        Self {
            secs,
            nanos: self.nanos,
        }
    }

    /// Returns a copy of this timestamp with the number of nanoseconds
    /// replaced.
    ///
    /// Returns an error if the number of nanoseconds is greater than or equal
    /// to 1 second.
    pub const fn with_nano(self, nano: u32) -> Result<Self, InstantError> {
        Self::new(self.secs, nano)
    }

    /// Converts this timestamp to UTC.
    pub fn to_utc_instant<T: LeapSecondTable + ?Sized>(
        self,
        table: &T,
    ) -> Result<UtcInstant, InstantError> {
        table.tai_to_utc(self)
    }

    /// Adds a signed duration to a timestamp, checking for overflow.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::TimeDelta;
    /// use tai_utc::{InstantError, TaiInstant};
    ///
    /// let timestamp = TaiInstant::new(1_234_567_890, 987_654_321).unwrap();
    /// assert!(timestamp.checked_add(TimeDelta::seconds(-10)).is_ok());
    /// assert_eq!(
    ///     TaiInstant::MAX.checked_add(TimeDelta::seconds(1)),
    ///     Err(InstantError::ArithmeticOverflow)
    /// );
    /// ```
    pub fn checked_add(self, rhs: TimeDelta) -> Result<Self, InstantError> {
        let (delta_secs, delta_nanos) = split_time_delta(rhs);

        self.offset_by(delta_secs.into(), delta_nanos.into())
            .ok_or(InstantError::ArithmeticOverflow)
    }

    /// Subtracts a signed duration from a timestamp, checking for overflow.
    pub fn checked_sub(self, rhs: TimeDelta) -> Result<Self, InstantError> {
        let (delta_secs, delta_nanos) = split_time_delta(rhs);

        self.offset_by(-i128::from(delta_secs), -i64::from(delta_nanos))
            .ok_or(InstantError::ArithmeticOverflow)
    }

    /// Computes the signed duration from this timestamp to another one.
    ///
    /// The result is negative if `other` lies in the past of `self`. Returns an
    /// error if the duration cannot be represented by a `TimeDelta`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::TimeDelta;
    /// use tai_utc::TaiInstant;
    ///
    /// let earlier = TaiInstant::new(1_234_567_879, 987_654_321).unwrap();
    /// let later = TaiInstant::new(1_234_567_900, 123_456_789).unwrap();
    /// assert_eq!(
    ///     earlier.duration_until(later),
    ///     Ok(TimeDelta::new(20, 135_802_468).unwrap())
    /// );
    /// assert_eq!(
    ///     later.duration_until(earlier),
    ///     Ok(-TimeDelta::new(20, 135_802_468).unwrap())
    /// );
    /// ```
    pub fn duration_until(self, other: Self) -> Result<TimeDelta, InstantError> {
        time_delta_between(
            (self.secs.into(), self.nanos),
            (other.secs.into(), other.nanos),
        )
    }

    /// Shifts the timestamp by a number of seconds and nanoseconds of
    /// arbitrary signs, returning `None` if the result is out of range.
    ///
    /// Only the final number of seconds needs to fit in an `i64`.
    fn offset_by(self, secs: i128, nanos: i64) -> Option<Self> {
        let nanos = i128::from(self.nanos) + i128::from(nanos);
        let nanos_per_sec = i128::from(NANOS_PER_SEC);
        let secs = i128::from(self.secs) + secs + nanos.div_euclid(nanos_per_sec);

        Some(Self {
            secs: i64::try_from(secs).ok()?,
            nanos: nanos.rem_euclid(nanos_per_sec) as u32,
        })
    }
}

/// Splits a `TimeDelta` into whole seconds rounded towards negative infinity
/// and a positive number of nanoseconds.
pub(crate) fn split_time_delta(delta: TimeDelta) -> (i64, u32) {
    let secs = delta.num_seconds();
    let nanos = delta.subsec_nanos();

    if nanos < 0 {
        (secs - 1, (nanos + NANOS_PER_SEC as i32) as u32)
    } else {
        (secs, nanos as u32)
    }
}

/// Returns the `TimeDelta` from the first to the second TAI timestamp, both
/// given as seconds and nanoseconds.
pub(crate) fn time_delta_between(
    from: (i128, u32),
    to: (i128, u32),
) -> Result<TimeDelta, InstantError> {
    let (mut secs, mut nanos) = (to.0 - from.0, to.1);
    if nanos < from.1 {
        secs -= 1;
        nanos += NANOS_PER_SEC;
    }
    nanos -= from.1;

    i64::try_from(secs)
        .ok()
        .and_then(|secs| TimeDelta::new(secs, nanos))
        .ok_or(InstantError::ArithmeticOverflow)
}

impl Add<TimeDelta> for TaiInstant {
    type Output = Self;

    /// Adds a signed duration to a timestamp.
    ///
    /// # Panics
    ///
    /// This function panics if the resulting timestamp cannot be
    /// represented. See [`TaiInstant::checked_add`] for a panic-free
    /// version.
    fn add(self, other: TimeDelta) -> Self {
        self.checked_add(other)
            .expect("overflow when adding duration to timestamp")
    }
}

impl Sub<TimeDelta> for TaiInstant {
    type Output = Self;

    /// Subtracts a signed duration from a timestamp.
    ///
    /// # Panics
    ///
    /// This function panics if the resulting timestamp cannot be
    /// represented. See [`TaiInstant::checked_sub`] for a panic-free
    /// version.
    fn sub(self, other: TimeDelta) -> Self {
        self.checked_sub(other)
            .expect("overflow when subtracting duration from timestamp")
    }
}

impl AddAssign<TimeDelta> for TaiInstant {
    /// Increments the timestamp by a signed duration.
    ///
    /// # Panics
    ///
    /// This function panics if the resulting timestamp cannot be represented.
    fn add_assign(&mut self, other: TimeDelta) {
        *self = *self + other;
    }
}

impl SubAssign<TimeDelta> for TaiInstant {
    /// Decrements the timestamp by a signed duration.
    ///
    /// # Panics
    ///
    /// This function panics if the resulting timestamp cannot be represented.
    fn sub_assign(&mut self, other: TimeDelta) {
        *self = *self - other;
    }
}

impl Add<Duration> for TaiInstant {
    type Output = Self;

    /// Adds a duration to a timestamp.
    ///
    /// # Panics
    ///
    /// This function panics if the resulting timestamp cannot be
    /// represented.
    fn add(self, other: Duration) -> Self {
        self.offset_by(other.as_secs().into(), other.subsec_nanos().into())
            .expect("overflow when adding duration to timestamp")
    }
}

impl Sub<Duration> for TaiInstant {
    type Output = Self;

    /// Subtracts a duration from a timestamp.
    ///
    /// # Panics
    ///
    /// This function panics if the resulting timestamp cannot be
    /// represented.
    fn sub(self, other: Duration) -> Self {
        self.offset_by(-i128::from(other.as_secs()), -i64::from(other.subsec_nanos()))
            .expect("overflow when subtracting duration from timestamp")
    }
}

impl fmt::Display for TaiInstant {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}.{:09}s(TAI)", self.secs, self.nanos)
    }
}

impl FromStr for TaiInstant {
    type Err = ParseDateTimeError;

    /// Parses the canonical `<seconds>.<nanoseconds>s(TAI)` representation.
    ///
    /// The seconds may have a leading minus sign but no plus sign, and the
    /// nanoseconds must have exactly 9 digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |field, kind| ParseDateTimeError::new(s, Some(field), kind);

        let stream = s
            .strip_suffix("s(TAI)")
            .ok_or_else(|| err(DateTimeField::Designator, ParseErrorKind::MissingField))?;
        let (secs, nanos) = stream
            .split_once('.')
            .ok_or_else(|| err(DateTimeField::Fraction, ParseErrorKind::MissingField))?;

        let digits = secs.strip_prefix('-').unwrap_or(secs);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err(DateTimeField::TaiSeconds, ParseErrorKind::InvalidFieldValue));
        }
        let secs = secs
            .parse()
            .map_err(|_| err(DateTimeField::TaiSeconds, ParseErrorKind::InvalidFieldValue))?;

        if nanos.len() != 9 {
            return Err(err(DateTimeField::Fraction, ParseErrorKind::InvalidFieldWidth));
        }
        if !nanos.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err(DateTimeField::Fraction, ParseErrorKind::InvalidFieldValue));
        }
        let nanos = nanos
            .parse()
            .map_err(|_| err(DateTimeField::Fraction, ParseErrorKind::InvalidFieldValue))?;

        Ok(Self { secs, nanos })
    }
}

impl TryFrom<alloc::string::String> for TaiInstant {
    type Error = ParseDateTimeError;

    fn try_from(s: alloc::string::String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TaiInstant> for alloc::string::String {
    fn from(t: TaiInstant) -> Self {
        alloc::string::ToString::to_string(&t)
    }
}
