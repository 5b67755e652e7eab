//! Error types.

use alloc::string::String;
use core::fmt;

/// The error type returned when an instant cannot be constructed or when an
/// operation on an instant would produce an unrepresentable value.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum InstantError {
    /// The nano-of-day is not smaller than the actual length of the day, as
    /// reported by the leap second table.
    #[error("nano-of-day {nano_of_day} is not valid for MJD {mjd}")]
    InvalidNanoOfDay {
        /// The Modified Julian Day.
        mjd: i64,
        /// The offending nano-of-day.
        nano_of_day: u64,
    },
    /// The nanosecond-of-second is greater than 999 999 999.
    #[error("nanosecond value '{0}' is not valid")]
    InvalidNano(u32),
    /// The result of the operation is outside the representable range.
    #[error("arithmetic overflow: timestamp out of representable range")]
    ArithmeticOverflow,
}

/// The error type returned when date-time components are invalid or correspond
/// to a date outside the representable range.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DateTimeError {
    /// The month is not between 1 and 12.
    #[error("month numeral '{0}' is not valid")]
    InvalidMonth(u8),
    /// The day of the month is less than 1, or more than the maximum value for
    /// this combination of year and month.
    #[error("day of month '{0}' is not valid for this date")]
    InvalidDayOfMonth(u8),
    /// The hour field value is not between 0 and 23.
    #[error("hour numeral '{0}' is not valid")]
    InvalidHour(u8),
    /// The minute field value is not between 0 and 59.
    #[error("minute numeral '{0}' is not valid")]
    InvalidMinute(u8),
    /// The second field value is not between 0 and 59, or is 60 at any other
    /// time than 23:59.
    #[error("second numeral '{0}' is not valid")]
    InvalidSecond(u8),
    /// The nanosecond field value is more than 999 999 999.
    #[error("nanosecond value '{0}' is not valid")]
    InvalidNanosecond(u32),
    /// The date cannot be represented as a Modified Julian Day.
    #[error("date outside representable range")]
    OutOfRange,
}

impl DateTimeError {
    /// Returns the field which holds the invalid value.
    pub const fn field(&self) -> DateTimeField {
        match self {
            Self::InvalidMonth(_) => DateTimeField::Month,
            Self::InvalidDayOfMonth(_) => DateTimeField::Day,
            Self::InvalidHour(_) => DateTimeField::Hour,
            Self::InvalidMinute(_) => DateTimeField::Minute,
            Self::InvalidSecond(_) => DateTimeField::Second,
            Self::InvalidNanosecond(_) => DateTimeField::Fraction,
            Self::OutOfRange => DateTimeField::Year,
        }
    }
}

/// A field of a textual date-time or TAI timestamp.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DateTimeField {
    /// The year of a date.
    Year,
    /// The month of a date.
    Month,
    /// The day of the month.
    Day,
    /// The hour of a time.
    Hour,
    /// The minute of a time.
    Minute,
    /// The second of a time.
    Second,
    /// The sub-second digits.
    Fraction,
    /// The whole number of seconds of a TAI timestamp.
    TaiSeconds,
    /// A separator or a suffix such as `T`, `Z` or `s(TAI)`.
    Designator,
}

impl fmt::Display for DateTimeField {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::Fraction => "fraction",
            Self::TaiSeconds => "TAI seconds",
            Self::Designator => "designator",
        };

        name.fmt(fmt)
    }
}

/// The reason why a date-time string was rejected.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum ParseErrorKind {
    /// A field value is either not of the expected numeric type or is out of
    /// range for the expected numeric type.
    #[error("the field value is invalid")]
    InvalidFieldValue,
    /// The width of a fixed-width or minimum-width field is invalid.
    #[error("the width of the field is invalid")]
    InvalidFieldWidth,
    /// A field is missing.
    #[error("the field is missing")]
    MissingField,
    /// One of the field value is out of its expected range, or the
    /// corresponding date is outside the representable range.
    #[error(transparent)]
    RangeError(#[from] DateTimeError),
    /// The time designates a leap second that the leap second table does not
    /// know about, or a second that was removed by a negative leap second.
    #[error("no such second exists on this date")]
    InvalidLeapSecond,
}

/// The error type returned when a date-time or TAI timestamp string is
/// invalid.
///
/// The error carries the offending text together with, where it could be
/// determined, the field that caused the rejection.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
#[error("cannot parse {text:?}{}: {kind}", FieldContext(.field))]
pub struct ParseDateTimeError {
    text: String,
    field: Option<DateTimeField>,
    kind: ParseErrorKind,
}

impl ParseDateTimeError {
    pub(crate) fn new(text: &str, field: Option<DateTimeField>, kind: ParseErrorKind) -> Self {
        Self {
            text: text.into(),
            field,
            kind,
        }
    }

    /// The text that could not be parsed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The offending field, if known.
    pub fn field(&self) -> Option<DateTimeField> {
        self.field
    }

    /// The reason for the rejection.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }
}

struct FieldContext<'a>(&'a Option<DateTimeField>);

impl fmt::Display for FieldContext<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(field) => write!(fmt, " (in {} field)", field),
            None => Ok(()),
        }
    }
}

/// The error type returned when a leap second table cannot be built.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum LeapSecondTableError {
    /// The adjustment is neither -1 nor +1.
    #[error("leap second adjustment must be -1 or +1, got {0}")]
    InvalidAdjustment(i64),
    /// A leap second was already registered for this day with a different
    /// adjustment.
    #[error("leap second on MJD {mjd} conflicts with an existing entry")]
    Conflict {
        /// The day of the rejected leap second.
        mjd: i64,
    },
    /// Leap seconds can only be appended after the last registered one.
    #[error("leap second on MJD {mjd} precedes the last registered leap second on MJD {last}")]
    OutOfOrder {
        /// The day of the rejected leap second.
        mjd: i64,
        /// The day of the last registered leap second.
        last: i64,
    },
    /// The cumulative TAI - UTC offset does not fit in 64 bits.
    #[error("cumulative TAI - UTC offset overflow")]
    OffsetOverflow,
    /// A line of a leap second data file is malformed.
    #[error("line {line}: {reason}")]
    Syntax {
        /// The 1-based line number.
        line: usize,
        /// A description of the problem.
        reason: String,
    },
    /// A leap second data file could not be read.
    #[cfg(feature = "std")]
    #[error("failed to read {}: {kind}", .path.display())]
    Io {
        /// The path of the file.
        path: std::path::PathBuf,
        /// The kind of I/O error.
        kind: std::io::ErrorKind,
    },
}
