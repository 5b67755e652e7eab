//! Leap second tables and the UTC/TAI conversion.
//!
//! A [`LeapSecondTable`] tells the length of each UTC day and the offset
//! between TAI and UTC at the start of each day. These two quantities are
//! sufficient to convert losslessly between [`UtcInstant`] and [`TaiInstant`].
//!
//! [`LeapSeconds`] is the provided implementation. It can be built
//! programmatically with [`LeapSeconds::register`], parsed from the leap
//! second files distributed with the IANA time zone database, or discovered on
//! the host system with [`LeapSeconds::system`].

use alloc::format;
use alloc::vec::Vec;

use crate::date_time;
use crate::errors::{InstantError, LeapSecondTableError};
use crate::{TaiInstant, UtcInstant, NANOS_PER_SEC};

/// Number of seconds in a day without leap second.
pub const SECS_PER_DAY: u32 = 86_400;

/// The TAI - UTC offset, in seconds, before the first leap second.
///
/// This is the offset adopted on 1972-01-01. It is applied to all earlier
/// dates as well.
pub const INITIAL_TAI_OFFSET: i64 = 10;

/// Modified Julian Day of the TAI epoch, 1958-01-01.
pub const TAI_EPOCH_MJD: i64 = 36_204;

/// Modified Julian Day of the NTP epoch, 1900-01-01.
const NTP_EPOCH_MJD: i64 = 15_020;

/// Environment variable pointing to a leap second file.
#[cfg(feature = "std")]
pub const LEAP_SECONDS_ENV: &str = "TAI_UTC_LEAPSECONDS";

/// Locations searched for leap second files when neither `TAI_UTC_LEAPSECONDS`
/// nor `TZDIR` provide one.
#[cfg(feature = "std")]
const ZONEINFO_DIRECTORIES: &[&str] = &[
    "/usr/share/zoneinfo",
    "/usr/share/lib/zoneinfo",
    "/etc/zoneinfo",
];

/// File names of the NIST and IANA leap second files, by order of preference.
#[cfg(feature = "std")]
const LEAP_SECONDS_FILES: &[&str] = &["leap-seconds.list", "leapseconds"];

/// A source of leap second information.
///
/// Implementors must answer consistently: the offset returned by
/// [`tai_offset`](Self::tai_offset) for day `mjd + 1` must equal the offset
/// for day `mjd` plus its [`leap_second_adjustment`](Self::leap_second_adjustment).
///
/// The conversion between [`UtcInstant`] and [`TaiInstant`] and the
/// validation of UTC values are provided on top of these two queries. The
/// same table must be used for all operations on a given set of instants.
pub trait LeapSecondTable {
    /// Returns the number of seconds added at the end of the given day.
    ///
    /// This is `1` for a day ending with `23:59:60`, `-1` for a day ending with
    /// `23:59:58` and `0` for an ordinary day.
    fn leap_second_adjustment(&self, mjd: i64) -> i8;

    /// Returns TAI - UTC, in seconds, at the start of the given day.
    fn tai_offset(&self, mjd: i64) -> i64;

    /// Returns the number of seconds in the given day.
    fn seconds_in_day(&self, mjd: i64) -> u32 {
        SECS_PER_DAY.wrapping_add_signed(self.leap_second_adjustment(mjd).into())
    }

    /// Returns the number of nanoseconds in the given day.
    fn nanos_in_day(&self, mjd: i64) -> u64 {
        u64::from(self.seconds_in_day(mjd)) * u64::from(NANOS_PER_SEC)
    }

    /// Returns the net number of leap seconds inserted before the given day.
    fn cumulative_leap_seconds_before(&self, mjd: i64) -> i64 {
        self.tai_offset(mjd) - INITIAL_TAI_OFFSET
    }

    /// Checks that the nano-of-day is within the given day.
    fn validate(&self, mjd: i64, nano_of_day: u64) -> Result<(), InstantError> {
        if nano_of_day < self.nanos_in_day(mjd) {
            Ok(())
        } else {
            Err(InstantError::InvalidNanoOfDay { mjd, nano_of_day })
        }
    }

    /// Converts a UTC instant to TAI.
    ///
    /// Returns an error if the TAI seconds do not fit in an `i64`.
    fn utc_to_tai(&self, utc: UtcInstant) -> Result<TaiInstant, InstantError> {
        let (secs, nanos) = tai_parts(self, utc);

        secs.try_into()
            .map(|secs| TaiInstant { secs, nanos })
            .map_err(|_| InstantError::ArithmeticOverflow)
    }

    /// Converts a TAI instant to UTC.
    fn tai_to_utc(&self, tai: TaiInstant) -> Result<UtcInstant, InstantError> {
        utc_from_tai_parts(self, tai.secs.into(), tai.nanos)
    }
}

impl<T: LeapSecondTable + ?Sized> LeapSecondTable for &T {
    fn leap_second_adjustment(&self, mjd: i64) -> i8 {
        (**self).leap_second_adjustment(mjd)
    }

    fn tai_offset(&self, mjd: i64) -> i64 {
        (**self).tai_offset(mjd)
    }
}

/// Returns the TAI second at which the given UTC day starts.
fn day_start<T: LeapSecondTable + ?Sized>(table: &T, mjd: i64) -> i128 {
    (i128::from(mjd) - i128::from(TAI_EPOCH_MJD)) * i128::from(SECS_PER_DAY)
        + i128::from(table.tai_offset(mjd))
}

/// Returns the TAI seconds and nanoseconds of a UTC instant.
///
/// The seconds are computed with 128 bits and cannot overflow.
pub(crate) fn tai_parts<T: LeapSecondTable + ?Sized>(table: &T, utc: UtcInstant) -> (i128, u32) {
    let nano_of_day = utc.nano_of_day();
    let secs = day_start(table, utc.modified_julian_day())
        + i128::from(nano_of_day / u64::from(NANOS_PER_SEC));
    let nanos = (nano_of_day % u64::from(NANOS_PER_SEC)) as u32;

    (secs, nanos)
}

/// Returns the UTC instant at the given TAI seconds and nanoseconds.
///
/// Returns an error if the day of the result does not fit in an `i64`.
pub(crate) fn utc_from_tai_parts<T: LeapSecondTable + ?Sized>(
    table: &T,
    tai_secs: i128,
    nanos: u32,
) -> Result<UtcInstant, InstantError> {
    // Guesses are saturated: an actual overflow is only detected while walking
    // to the right day.
    let guess = |days: i128| -> i64 {
        (days + i128::from(TAI_EPOCH_MJD)).clamp(i64::MIN.into(), i64::MAX.into()) as i64
    };

    // Make a first guess assuming the offset of the day that would be obtained
    // without leap seconds, then walk to the right day. Since a day is never
    // shorter than 86399s, this takes at most a couple of steps.
    let mut mjd = guess(tai_secs.div_euclid(SECS_PER_DAY.into()));
    mjd = guess((tai_secs - i128::from(table.tai_offset(mjd))).div_euclid(SECS_PER_DAY.into()));

    let mut start = day_start(table, mjd);
    while tai_secs < start {
        mjd = mjd.checked_sub(1).ok_or(InstantError::ArithmeticOverflow)?;
        start = day_start(table, mjd);
    }
    loop {
        let day_length = i128::from(table.seconds_in_day(mjd));
        if tai_secs - start < day_length {
            break;
        }
        mjd = mjd.checked_add(1).ok_or(InstantError::ArithmeticOverflow)?;
        start += day_length;
    }

    let nano_of_day = (tai_secs - start) as u64 * u64::from(NANOS_PER_SEC) + u64::from(nanos);

    Ok(UtcInstant::new_unchecked(mjd, nano_of_day))
}

/// A leap second, with the TAI - UTC offset applicable after it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct LeapSecond {
    mjd: i64,
    adjustment: i8,
    tai_offset: i64,
}

/// A table of leap seconds.
///
/// Entries are kept sorted by date; lookups are binary searches. The table
/// only grows at its end: leap seconds must be registered in chronological
/// order.
///
/// # Examples
///
/// ```
/// use tai_utc::{LeapSecondTable, LeapSeconds};
///
/// let mut table = LeapSeconds::new();
/// table.register(41_498, 1).unwrap(); // 1972-06-30
/// table.register(41_682, 1).unwrap(); // 1972-12-31
///
/// assert_eq!(table.seconds_in_day(41_682), 86_401);
/// assert_eq!(table.tai_offset(41_683), 12);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeapSeconds {
    entries: Vec<LeapSecond>,
    expires: Option<i64>,
}

impl LeapSeconds {
    /// Creates a table without leap seconds.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            expires: None,
        }
    }

    /// Registers a leap second at the end of the given day.
    ///
    /// The adjustment must be `1` for an inserted second or `-1` for a removed
    /// one. Registering again an existing leap second is a no-op, but the day
    /// must otherwise come after all registered leap seconds.
    pub fn register(&mut self, mjd: i64, adjustment: i8) -> Result<(), LeapSecondTableError> {
        if adjustment != 1 && adjustment != -1 {
            return Err(LeapSecondTableError::InvalidAdjustment(adjustment.into()));
        }
        if let Ok(idx) = self.entries.binary_search_by_key(&mjd, |ls| ls.mjd) {
            return if self.entries[idx].adjustment == adjustment {
                Ok(())
            } else {
                Err(LeapSecondTableError::Conflict { mjd })
            };
        }
        if let Some(last) = self.entries.last() {
            if mjd < last.mjd {
                return Err(LeapSecondTableError::OutOfOrder {
                    mjd,
                    last: last.mjd,
                });
            }
        }

        let tai_offset = self
            .tai_offset(mjd)
            .checked_add(adjustment.into())
            .ok_or(LeapSecondTableError::OffsetOverflow)?;
        trace!("registered leap second {adjustment:+} on MJD {mjd}, TAI - UTC = {tai_offset}s");
        self.entries.push(LeapSecond {
            mjd,
            adjustment,
            tai_offset,
        });

        Ok(())
    }

    /// Returns the days with a leap second, in chronological order.
    pub fn leap_second_dates(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().map(|ls| ls.mjd)
    }

    /// Returns the number of leap seconds in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no leap seconds.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the expiration day of the table, if it was loaded from a file
    /// which specifies one.
    ///
    /// Leap seconds announced after the table was published may occur after
    /// this date.
    pub fn expires(&self) -> Option<i64> {
        self.expires
    }

    /// Parses a leap second table in the format of the IANA `leapseconds`
    /// file.
    ///
    /// Each leap second is described by a line such as
    /// `Leap 1972 Dec 31 23:59:60 + S`. The expiration date is read from an
    /// `Expires` or `#Expires` line, if any.
    pub fn from_iana(data: &str) -> Result<Self, LeapSecondTableError> {
        let mut table = Self::new();

        for (idx, line) in data.lines().enumerate() {
            let syntax = |reason: &str| LeapSecondTableError::Syntax {
                line: idx + 1,
                reason: reason.into(),
            };
            let line = line.trim();

            if let Some(expires) = line
                .strip_prefix("#Expires")
                .or_else(|| line.strip_prefix("Expires"))
            {
                if table.expires.is_some() {
                    return Err(syntax("found multiple expiration lines"));
                }
                let mut fields = expires.split_whitespace();
                table.expires = Some(parse_iana_date(&mut fields).map_err(|e| syntax(e.as_str()))?);
            } else if line.is_empty() || line.starts_with('#') {
                continue;
            } else {
                let mut fields = line.split_whitespace();
                if fields.next() != Some("Leap") {
                    return Err(syntax("expected 'Leap' keyword"));
                }
                let mjd = parse_iana_date(&mut fields).map_err(|e| syntax(e.as_str()))?;
                let adjustment = match (fields.next(), fields.next()) {
                    (Some("23:59:60"), Some("+")) => 1,
                    (Some("23:59:59"), Some("-")) => -1,
                    _ => return Err(syntax("expected '23:59:60 +' or '23:59:59 -'")),
                };
                table.register(mjd, adjustment)?;
            }
        }
        debug!("parsed {} leap seconds from IANA data", table.len());

        Ok(table)
    }

    /// Parses a leap second table in the format of the NIST
    /// `leap-seconds.list` file.
    ///
    /// Each line gives the NTP timestamp of the first day following a leap
    /// second together with the new TAI - UTC offset. The expiration date is
    /// read from the `#@` line, if any.
    pub fn from_nist(data: &str) -> Result<Self, LeapSecondTableError> {
        let mut table = Self::new();
        let mut tai_offset = INITIAL_TAI_OFFSET;

        for (idx, line) in data.lines().enumerate() {
            let syntax = |reason: &str| LeapSecondTableError::Syntax {
                line: idx + 1,
                reason: reason.into(),
            };

            if let Some(expires) = line.strip_prefix("#@") {
                if table.expires.is_some() {
                    return Err(syntax("found multiple expiration lines"));
                }
                table.expires = Some(ntp_to_mjd(expires.trim()).map_err(syntax)?);
            } else if line.starts_with('#') || line.trim().is_empty() {
                continue;
            } else {
                let mut fields = line.split_whitespace();
                let mjd_after = fields
                    .next()
                    .ok_or_else(|| syntax("missing NTP timestamp"))
                    .and_then(|ntp| ntp_to_mjd(ntp).map_err(syntax))?;
                let new_offset: i64 = fields
                    .next()
                    .ok_or_else(|| syntax("missing TAI - UTC offset"))?
                    .parse()
                    .map_err(|_| syntax("invalid TAI - UTC offset"))?;

                // The first entry of the NIST file is the initial 10s offset.
                let adjustment = new_offset - tai_offset;
                if adjustment == 0 {
                    continue;
                }
                let adjustment = i8::try_from(adjustment)
                    .map_err(|_| LeapSecondTableError::InvalidAdjustment(adjustment))?;
                table.register(mjd_after - 1, adjustment)?;
                tai_offset = new_offset;
            }
        }
        debug!("parsed {} leap seconds from NIST data", table.len());

        Ok(table)
    }

    /// Reads a leap second file in either the NIST or the IANA format.
    #[cfg(feature = "std")]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, LeapSecondTableError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|err| LeapSecondTableError::Io {
            path: path.to_path_buf(),
            kind: err.kind(),
        })?;

        if data
            .lines()
            .any(|line| line.trim_start().starts_with("Leap"))
        {
            Self::from_iana(&data)
        } else {
            Self::from_nist(&data)
        }
    }

    /// Returns the leap second table of the host system.
    ///
    /// The table is loaded once, on first use, from the first readable file
    /// among:
    ///
    /// 1. the file named by the `TAI_UTC_LEAPSECONDS` environment variable,
    /// 2. `leap-seconds.list` or `leapseconds` in the `TZDIR` directory,
    /// 3. `leap-seconds.list` or `leapseconds` in the usual zoneinfo
    ///    directories (`/usr/share/zoneinfo`, ...).
    ///
    /// If no file can be loaded, the table is empty.
    #[cfg(feature = "std")]
    pub fn system() -> &'static Self {
        use std::sync::OnceLock;

        static SYSTEM: OnceLock<LeapSeconds> = OnceLock::new();

        SYSTEM.get_or_init(Self::from_env)
    }

    #[cfg(feature = "std")]
    fn from_env() -> Self {
        use std::path::PathBuf;

        if let Some(path) = std::env::var_os(LEAP_SECONDS_ENV) {
            let path = PathBuf::from(path);
            debug!("loading leap seconds from {}={}", LEAP_SECONDS_ENV, path.display());
            match Self::from_file(&path) {
                Ok(table) => return table,
                Err(_err) => {
                    warn!("failed loading {}={}: {_err}", LEAP_SECONDS_ENV, path.display());
                    // fall through to attempt default directories
                }
            }
        }

        let tzdir = std::env::var_os("TZDIR").map(PathBuf::from);
        let dirs = tzdir
            .into_iter()
            .chain(ZONEINFO_DIRECTORIES.iter().map(PathBuf::from));
        for dir in dirs {
            for file in LEAP_SECONDS_FILES {
                let path = dir.join(file);
                match Self::from_file(&path) {
                    Ok(table) => {
                        debug!("loaded {} leap seconds from {}", table.len(), path.display());
                        return table;
                    }
                    Err(_err) => {
                        debug!("failed loading leap seconds from {}: {_err}", path.display());
                    }
                }
            }
        }

        warn!(
            "could not find leap second data in any of the following \
             directories: {}; assuming no leap seconds",
            ZONEINFO_DIRECTORIES.join(", "),
        );

        Self::new()
    }
}

impl LeapSecondTable for LeapSeconds {
    fn leap_second_adjustment(&self, mjd: i64) -> i8 {
        match self.entries.binary_search_by_key(&mjd, |ls| ls.mjd) {
            Ok(idx) => self.entries[idx].adjustment,
            Err(_) => 0,
        }
    }

    fn tai_offset(&self, mjd: i64) -> i64 {
        // Number of leap seconds strictly before `mjd`.
        let idx = self.entries.partition_point(|ls| ls.mjd < mjd);

        match idx.checked_sub(1) {
            Some(idx) => self.entries[idx].tai_offset,
            None => INITIAL_TAI_OFFSET,
        }
    }
}

/// Parses a date such as `1972 Dec 31` into a Modified Julian Day.
fn parse_iana_date<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
) -> Result<i64, alloc::string::String> {
    let (Some(year), Some(month), Some(day)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err("expected a date such as '1972 Dec 31'".into());
    };

    let year: i64 = year
        .parse()
        .map_err(|_| format!("invalid year {year:?}"))?;
    let month = match month {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return Err(format!("invalid month {month:?}")),
    };
    let day: u8 = day.parse().map_err(|_| format!("invalid day {day:?}"))?;

    date_time::mjd_from_date(year, month, day).map_err(|e| format!("{e}"))
}

/// Converts an NTP timestamp falling at midnight into a Modified Julian Day.
fn ntp_to_mjd(ntp: &str) -> Result<i64, &'static str> {
    let ntp: i64 = ntp.parse().map_err(|_| "invalid NTP timestamp")?;
    if ntp % i64::from(SECS_PER_DAY) != 0 {
        return Err("NTP timestamp does not fall at midnight");
    }

    Ok(ntp / i64::from(SECS_PER_DAY) + NTP_EPOCH_MJD)
}
