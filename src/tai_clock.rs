use std::time::{Duration, Instant, SystemTime};

use chrono::TimeDelta;

use crate::{InstantError, LeapSecondTable, TaiInstant, UtcInstant};

/// A monotonic clock that generates [`TaiInstant`] timestamps.
///
/// The clock is anchored once, either at a given TAI timestamp or at the UTC
/// system clock, and then advances with [`Instant::now`]. It therefore works
/// on systems without a TAI clock, and never jumps or stalls around leap
/// seconds the way the UTC system clock may.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use tai_utc::{LeapSeconds, TaiClock};
///
/// let clock = TaiClock::init_from_utc(LeapSeconds::system()).unwrap();
///
/// // The clock is `Copy` and can be handed to other threads.
/// let t1 = thread::spawn(move || clock.now()).join().unwrap();
/// let t2 = clock.now();
///
/// assert!(t2 >= t1);
/// ```
#[derive(Copy, Clone, Debug, Hash)]
pub struct TaiClock {
    timestamp_ref: TaiInstant,
    wall_clock_ref: Instant,
}

impl TaiClock {
    /// Creates a clock that reads `now` at the current wall clock time.
    pub fn init_at(now: TaiInstant) -> Self {
        Self::init_from_instant(now, Instant::now())
    }

    /// Creates a clock from the UTC system clock, with TAI - UTC taken from
    /// the provided table.
    ///
    /// `SystemTime` is not monotonic, so the system time is sampled between
    /// a few pairs of [`Instant::now`] calls and the tightest pair is kept as
    /// the reference. Readings of the system clock during a leap second are
    /// unreliable.
    ///
    /// Returns an error if the system time cannot be represented.
    pub fn init_from_utc<T: LeapSecondTable + ?Sized>(table: &T) -> Result<Self, InstantError> {
        let (system_time_ref, instant_ref) = correlated_time_refs();

        let timestamp_ref =
            UtcInstant::from_system_time(&system_time_ref, table)?.to_tai_instant(table)?;
        debug!("TAI clock initialized from the system clock at {timestamp_ref}");

        Ok(Self::init_from_instant(timestamp_ref, instant_ref))
    }

    /// Creates a clock that reads `timestamp_ref` when the monotonic clock
    /// reads `wall_clock_ref`, which may lie in the past or in the future.
    pub fn init_from_instant(timestamp_ref: TaiInstant, wall_clock_ref: Instant) -> Self {
        Self {
            timestamp_ref,
            wall_clock_ref,
        }
    }

    /// Creates a clock that reads `timestamp_ref` when the system clock reads
    /// `wall_clock_ref`, which may lie in the past or in the future.
    ///
    /// Returns an error if the clock reading at the current time cannot be
    /// represented.
    pub fn init_from_system_time(
        timestamp_ref: TaiInstant,
        wall_clock_ref: SystemTime,
    ) -> Result<Self, InstantError> {
        let (system_time_ref, instant_ref) = correlated_time_refs();

        let timestamp_ref = match system_time_ref.duration_since(wall_clock_ref) {
            Ok(elapsed) => timestamp_ref.checked_add(to_time_delta(elapsed)?),
            Err(err) => timestamp_ref.checked_sub(to_time_delta(err.duration())?),
        }?;

        Ok(Self::init_from_instant(timestamp_ref, instant_ref))
    }

    /// Returns the TAI timestamp at the current wall clock time.
    ///
    /// Successive calls return non-decreasing timestamps.
    ///
    /// # Panics
    ///
    /// This function panics if the timestamp cannot be represented, which
    /// requires a reference timestamp within centuries of
    /// [`TaiInstant::MIN`] or [`TaiInstant::MAX`].
    pub fn now(&self) -> TaiInstant {
        let now = Instant::now();

        let timestamp = match now.checked_duration_since(self.wall_clock_ref) {
            Some(elapsed) => to_time_delta(elapsed).and_then(|d| self.timestamp_ref.checked_add(d)),
            None => to_time_delta(self.wall_clock_ref - now)
                .and_then(|d| self.timestamp_ref.checked_sub(d)),
        };

        timestamp.expect("TAI clock reading out of range")
    }

    /// Returns the UTC instant at the current wall clock time.
    pub fn now_utc<T: LeapSecondTable + ?Sized>(
        &self,
        table: &T,
    ) -> Result<UtcInstant, InstantError> {
        self.now().to_utc_instant(table)
    }

    /// Returns the time elapsed since `timestamp`, negative if `timestamp`
    /// lies ahead of the clock.
    pub fn elapsed_since(&self, timestamp: TaiInstant) -> Result<TimeDelta, InstantError> {
        timestamp.duration_until(self.now())
    }
}

fn to_time_delta(duration: Duration) -> Result<TimeDelta, InstantError> {
    TimeDelta::from_std(duration).map_err(|_| InstantError::ArithmeticOverflow)
}

/// A `SystemTime` reading bracketed by two `Instant` readings.
struct Sample {
    system_time: SystemTime,
    midpoint: Instant,
    uncertainty: Duration,
}

/// Returns a `SystemTime` and the `Instant` at which it was most likely
/// read.
fn correlated_time_refs() -> (SystemTime, Instant) {
    const SAMPLES: usize = 3;

    let mut before = Instant::now();
    let mut samples: [Sample; SAMPLES] = core::array::from_fn(|_| {
        let system_time = SystemTime::now();
        let after = Instant::now();
        let uncertainty = after.saturating_duration_since(before);
        let midpoint = before + uncertainty / 2;
        before = after;

        Sample {
            system_time,
            midpoint,
            uncertainty,
        }
    });

    // A null uncertainty most likely points to a platform bug, so such
    // samples come last.
    samples.sort_unstable_by_key(|s| (s.uncertainty.is_zero(), s.uncertainty));

    (samples[0].system_time, samples[0].midpoint)
}
