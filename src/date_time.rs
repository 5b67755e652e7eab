//! Date-time processing.

use core::fmt;

use crate::errors::{DateTimeError, DateTimeField, ParseErrorKind};

const DAYS_IN_MONTH: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const DAYS_IN_MONTH_LEAP: [u8; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const DOY_AT_MONTH: [i32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
const DOY_AT_MONTH_LEAP: [i32; 12] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335];

/// Number of days from 0000-01-01 to the MJD epoch 1858-11-17.
const MJD_EPOCH_FROM_YEAR_0: i128 = 678_941;

const DAYS_PER_400_YEARS: i128 = 146_097;

/// Returns whether the year is a leap year for a 64-bit signed year.
///
/// The argument is the proleptic Gregorian year, with the ISO 8601
/// interpretation of year 0 as year 1 BC. Year 0 does not obey the usual rule
/// and is considered a leap year.
///
/// The whole `i64` value range is supported.
pub(crate) const fn is_leap(year: i64) -> bool {
    (year & 0b11) == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Calculates the number of days in a month.
pub(crate) const fn days_in_month(year: i64, month: u8) -> u8 {
    let month_idx = (month - 1) as usize;

    if is_leap(year) {
        DAYS_IN_MONTH_LEAP[month_idx]
    } else {
        DAYS_IN_MONTH[month_idx]
    }
}

/// Calculates the 0-based day of the year.
pub(crate) const fn day_of_year(year: i64, month: u8, day: u8) -> i32 {
    let month_idx = (month - 1) as usize;
    let table = if is_leap(year) {
        &DOY_AT_MONTH_LEAP
    } else {
        &DOY_AT_MONTH
    };

    (day - 1) as i32 + table[month_idx]
}

/// Calculates the month and the day of the month for a 0-based day of the year.
pub(crate) fn month_and_day_of_month(year: i64, doy: i32) -> (u8, u8) {
    let table = if is_leap(year) {
        &DOY_AT_MONTH_LEAP
    } else {
        &DOY_AT_MONTH
    };

    let idx = table.binary_search(&doy).unwrap_or_else(|e| e - 1);
    let month = idx as u8 + 1;
    let day = (doy - table[idx]) as u8 + 1;

    (month, day)
}

/// Returns the number of elapsed days since the first day of year 0 to the
/// first day of the provided year.
///
/// The argument is the proleptic Gregorian year, with the ISO 8601
/// interpretation of year 0 as year 1 BC.
///
/// The result is negative for negative years.
pub(crate) const fn days_from_year_0(year: i64) -> i128 {
    let year = year as i128;
    let offset = (year > 0) as i128;
    let y = year - offset;
    let m4 = y / 4 + offset;
    let m100 = y / 100;
    let m400 = m100 / 4;

    year * 365 + m4 - m100 + m400
}

/// Returns the year and the 0-based day of the year for the provided number
/// of days elapsed since the first day of year 0.
///
/// This will not overflow for any day count derived from an `i64` Modified
/// Julian Day.
pub(crate) fn days_to_year_and_day(days_from_year_0: i128) -> (i64, i32) {
    // Find the nearest 400-year boundary that is before or at the date. This
    // requires a division with rounding-down behavior even when the day count
    // is negative.
    let n_period = days_from_year_0.div_euclid(DAYS_PER_400_YEARS) as i64;
    let mut day = days_from_year_0.rem_euclid(DAYS_PER_400_YEARS) as i64;

    // -- `day` is now guaranteed to be positive.

    let mut year = 400 * n_period;
    if day < 366 {
        return (year, day as i32);
    }

    // Find the nearest 100-year, 4-year and 1-year boundaries that are before
    // or at the date.
    for (years_in_period, days_in_period, starts_with_non_leap_year) in
        [(100, 36524, 1), (4, 1461, 0), (1, 365, 1)]
    {
        day -= starts_with_non_leap_year;
        let n_period = day / days_in_period;
        year += years_in_period * n_period;
        day -= n_period * days_in_period;
        if day < (366 - starts_with_non_leap_year) {
            return (year, day as i32);
        }
        day += starts_with_non_leap_year;
    }

    unreachable!();
}

/// Converts a Modified Julian Day to a proleptic Gregorian date.
pub(crate) fn date_from_mjd(mjd: i64) -> (i64, u8, u8) {
    let (year, doy) = days_to_year_and_day(mjd as i128 + MJD_EPOCH_FROM_YEAR_0);
    let (month, day) = month_and_day_of_month(year, doy);

    (year, month, day)
}

/// Converts a proleptic Gregorian date to a Modified Julian Day.
pub(crate) fn mjd_from_date(year: i64, month: u8, day: u8) -> Result<i64, DateTimeError> {
    if !(1..=12).contains(&month) {
        return Err(DateTimeError::InvalidMonth(month));
    }
    if day < 1 || day > days_in_month(year, month) {
        return Err(DateTimeError::InvalidDayOfMonth(day));
    }

    let days = days_from_year_0(year) + day_of_year(year, month, day) as i128;

    (days - MJD_EPOCH_FROM_YEAR_0)
        .try_into()
        .map_err(|_| DateTimeError::OutOfRange)
}

/// The components of a parsed ISO 8601 UTC date-time.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct DateTimeFields {
    pub(crate) year: i64,
    pub(crate) month: u8,
    pub(crate) day: u8,
    pub(crate) hour: u8,
    pub(crate) min: u8,
    pub(crate) sec: u8,
    pub(crate) nano: u32,
}

impl DateTimeFields {
    /// Validates the ranges of all fields and returns the Modified Julian Day
    /// and the second of the day.
    ///
    /// A second field equal to 60 is accepted at 23:59 only, in which case the
    /// returned second of the day is 86400. Whether the date actually has a
    /// leap second is up to the caller.
    pub(crate) fn validate(&self) -> Result<(i64, u32), DateTimeError> {
        let mjd = mjd_from_date(self.year, self.month, self.day)?;
        if self.hour > 23 {
            return Err(DateTimeError::InvalidHour(self.hour));
        }
        if self.min > 59 {
            return Err(DateTimeError::InvalidMinute(self.min));
        }
        // Seconds past 59 are only checked against the length of the day
        // once it is known.
        if self.sec >= 60 && (self.hour != 23 || self.min != 59) {
            return Err(DateTimeError::InvalidSecond(self.sec));
        }
        if self.nano >= 1_000_000_000 {
            return Err(DateTimeError::InvalidNanosecond(self.nano));
        }

        let second_of_day =
            self.hour as u32 * 3600 + self.min as u32 * 60 + self.sec as u32;

        Ok((mjd, second_of_day))
    }
}

/// Parses an ISO 8601 extended UTC date-time with signed years.
///
/// Expected format:
///
/// `[±][Y]...[Y]YYYY-MM-DD'T'hh:mm:ss[.d[d]...[d]]'Z'`
///
/// where the fraction has between 1 and 9 digits. The `Z` designator is
/// mandatory.
///
/// Range checks are left to [`DateTimeFields::validate`].
pub(crate) fn parse_date_time(
    stream: &str,
) -> Result<DateTimeFields, (Option<DateTimeField>, ParseErrorKind)> {
    type FieldError = (Option<DateTimeField>, ParseErrorKind);

    // Expect 2 leading digits optionally followed by one of the provided
    // delimiters, and return them as a single `u8`, together with the remaining part
    // of the stream if a delimiter was found.
    fn pull_two_digits<'a, E>(
        stream: &'a str,
        delimiter: char,
        field: DateTimeField,
        missing_delimiter_error: E,
    ) -> Result<(u8, Result<&'a str, E>), FieldError> {
        let (token, stream) = stream
            .split_once(delimiter)
            .map(|(t, s)| (t, Ok(s)))
            .unwrap_or((stream, Err(missing_delimiter_error)));

        if token.len() != 2 {
            return Err((Some(field), ParseErrorKind::InvalidFieldWidth));
        }
        if !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err((Some(field), ParseErrorKind::InvalidFieldValue));
        }

        token
            .parse()
            .map_err(|_| (Some(field), ParseErrorKind::InvalidFieldValue))
            .map(|token| (token, stream))
    }

    let missing = |field| (Some(field), ParseErrorKind::MissingField);

    // The UTC designator is mandatory.
    let stream = stream
        .strip_suffix('Z')
        .ok_or(missing(DateTimeField::Designator))?;

    // Pull the leading sign of the year, if any.
    let (stream, negative) = match stream.as_bytes().first() {
        Some(b'+') => (&stream[1..], false),
        Some(b'-') => (&stream[1..], true),
        _ => (stream, false),
    };

    // Pull the year.
    let (year, stream) = stream
        .split_once('-')
        .ok_or(missing(DateTimeField::Month))?;
    if year.len() < 4 {
        return Err((Some(DateTimeField::Year), ParseErrorKind::InvalidFieldWidth));
    }
    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err((Some(DateTimeField::Year), ParseErrorKind::InvalidFieldValue));
    }
    // Parse the magnitude as unsigned so that `i64::MIN` years remain
    // representable.
    let year: u64 = year
        .parse()
        .map_err(|_| (Some(DateTimeField::Year), ParseErrorKind::InvalidFieldValue))?;
    let year = if negative {
        0i64.checked_sub_unsigned(year)
    } else {
        i64::try_from(year).ok()
    }
    .ok_or((Some(DateTimeField::Year), ParseErrorKind::InvalidFieldValue))?;

    // Pull month, day, hour, minute and second.
    let (month, stream) = pull_two_digits(
        stream,
        '-',
        DateTimeField::Month,
        missing(DateTimeField::Day),
    )?;
    let (day, stream) = pull_two_digits(
        stream?,
        'T',
        DateTimeField::Day,
        missing(DateTimeField::Designator),
    )?;
    let (hour, stream) = pull_two_digits(
        stream?,
        ':',
        DateTimeField::Hour,
        missing(DateTimeField::Minute),
    )?;
    let (min, stream) = pull_two_digits(
        stream?,
        ':',
        DateTimeField::Minute,
        missing(DateTimeField::Second),
    )?;
    let (sec, stream) = pull_two_digits(stream?, '.', DateTimeField::Second, ())?;

    // Parse the fraction.
    let mut nano = 0u32;
    match stream {
        Ok("") => return Err(missing(DateTimeField::Fraction)),
        Ok(stream) => {
            if stream.len() > 9 {
                return Err((
                    Some(DateTimeField::Fraction),
                    ParseErrorKind::InvalidFieldWidth,
                ));
            }
            let mut weight = 100_000_000;
            for c in stream.chars() {
                let digit = c.to_digit(10).ok_or((
                    Some(DateTimeField::Fraction),
                    ParseErrorKind::InvalidFieldValue,
                ))?;
                nano += digit * weight;
                weight /= 10;
            }
        }
        Err(_) => {}
    }

    Ok(DateTimeFields {
        year,
        month,
        day,
        hour,
        min,
        sec,
        nano,
    })
}

/// Writes a date in ISO 8601 extended format.
///
/// Years outside `0000..=9999` are written with an explicit sign.
pub(crate) fn write_date(fmt: &mut fmt::Formatter<'_>, mjd: i64) -> fmt::Result {
    let (year, month, day) = date_from_mjd(mjd);

    if year > 9999 {
        write!(fmt, "+{}", year)?;
    } else if year < 0 {
        write!(fmt, "-{:04}", year.unsigned_abs())?;
    } else {
        write!(fmt, "{:04}", year)?;
    }

    write!(fmt, "-{:02}-{:02}", month, day)
}

/// Writes the sub-second part of a time, if any.
///
/// Nothing is written for a null fraction; otherwise the fraction is written
/// with 3, 6 or 9 digits, whichever is the shortest exact representation.
pub(crate) fn write_fraction(fmt: &mut fmt::Formatter<'_>, nano: u32) -> fmt::Result {
    if nano == 0 {
        Ok(())
    } else if nano % 1_000_000 == 0 {
        write!(fmt, ".{:03}", nano / 1_000_000)
    } else if nano % 1_000 == 0 {
        write!(fmt, ".{:06}", nano / 1_000)
    } else {
        write!(fmt, ".{:09}", nano)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leap_years() {
        assert!(is_leap(0));
        assert!(is_leap(1972));
        assert!(is_leap(2000));
        assert!(!is_leap(1900));
        assert!(!is_leap(1973));
        assert!(is_leap(-4));
        assert!(!is_leap(-100));
        assert!(is_leap(-400));
    }

    #[test]
    fn mjd_epoch() {
        assert_eq!(mjd_from_date(1858, 11, 17), Ok(0));
        assert_eq!(date_from_mjd(0), (1858, 11, 17));
    }

    #[test]
    fn mjd_smoke() {
        assert_eq!(mjd_from_date(1958, 1, 1), Ok(36_204));
        assert_eq!(mjd_from_date(1970, 1, 1), Ok(40_587));
        assert_eq!(mjd_from_date(1972, 12, 31), Ok(41_682));
        assert_eq!(mjd_from_date(1973, 1, 1), Ok(41_683));
        assert_eq!(mjd_from_date(2000, 2, 29), Ok(51_603));

        assert_eq!(date_from_mjd(41_682), (1972, 12, 31));
        assert_eq!(date_from_mjd(41_683), (1973, 1, 1));
        assert_eq!(date_from_mjd(51_603), (2000, 2, 29));
        assert_eq!(date_from_mjd(-678_941), (0, 1, 1));
        assert_eq!(date_from_mjd(-678_942), (-1, 12, 31));
    }

    #[test]
    fn mjd_extreme() {
        for mjd in [i64::MIN, i64::MIN + 1, -1, 1, i64::MAX - 1, i64::MAX] {
            let (year, month, day) = date_from_mjd(mjd);
            assert_eq!(mjd_from_date(year, month, day), Ok(mjd));
        }
    }

    #[test]
    fn mjd_invalid() {
        assert_eq!(
            mjd_from_date(1973, 2, 29),
            Err(DateTimeError::InvalidDayOfMonth(29))
        );
        assert_eq!(mjd_from_date(1973, 13, 1), Err(DateTimeError::InvalidMonth(13)));
        assert_eq!(mjd_from_date(1973, 0, 1), Err(DateTimeError::InvalidMonth(0)));
        assert_eq!(mjd_from_date(i64::MAX, 1, 1), Err(DateTimeError::OutOfRange));
    }

    #[test]
    fn parse_smoke() {
        assert_eq!(
            parse_date_time("1972-12-31T23:59:60.5Z"),
            Ok(DateTimeFields {
                year: 1972,
                month: 12,
                day: 31,
                hour: 23,
                min: 59,
                sec: 60,
                nano: 500_000_000,
            })
        );
        assert_eq!(
            parse_date_time("-0001-03-04T05:06:07Z").map(|f| (f.year, f.nano)),
            Ok((-1, 0))
        );
        assert_eq!(
            parse_date_time("+123456-01-01T00:00:00.000000001Z").map(|f| (f.year, f.nano)),
            Ok((123_456, 1))
        );
    }

    #[test]
    fn parse_invalid() {
        use DateTimeField::*;
        use ParseErrorKind::*;

        let cases = [
            ("1972-12-31T23:59:60", Some(Designator), MissingField),
            ("72-12-31T23:59:60Z", Some(Year), InvalidFieldWidth),
            ("19x2-12-31T23:59:60Z", Some(Year), InvalidFieldValue),
            ("1972-1-31T23:59:60Z", Some(Month), InvalidFieldWidth),
            ("1972-12-31 23:59:60Z", Some(Day), InvalidFieldWidth),
            ("1972-12-31T23:59Z", Some(Second), MissingField),
            ("1972-12-31T23:+9:00Z", Some(Minute), InvalidFieldValue),
            ("1972-12-31T23:59:00.Z", Some(Fraction), MissingField),
            ("1972-12-31T23:59:00.1234567890Z", Some(Fraction), InvalidFieldWidth),
            ("1972-12-31T23:59:00.12a4Z", Some(Fraction), InvalidFieldValue),
        ];

        for (text, field, kind) in cases {
            assert_eq!(parse_date_time(text), Err((field, kind)), "{text}");
        }
    }

    #[test]
    fn validate_ranges() {
        let fields = |hour, min, sec| DateTimeFields {
            year: 1972,
            month: 12,
            day: 31,
            hour,
            min,
            sec,
            nano: 0,
        };

        assert_eq!(fields(23, 59, 60).validate(), Ok((41_682, 86_400)));
        assert_eq!(fields(0, 0, 0).validate(), Ok((41_682, 0)));
        assert_eq!(fields(24, 0, 0).validate(), Err(DateTimeError::InvalidHour(24)));
        assert_eq!(fields(0, 60, 0).validate(), Err(DateTimeError::InvalidMinute(60)));
        assert_eq!(fields(23, 59, 61).validate(), Ok((41_682, 86_401)));
        assert_eq!(fields(0, 0, 61).validate(), Err(DateTimeError::InvalidSecond(61)));
        assert_eq!(fields(12, 59, 60).validate(), Err(DateTimeError::InvalidSecond(60)));
    }
}
