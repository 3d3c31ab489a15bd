//! The counters making up the stopwatch time, and the arithmetic on their readings.

use std::fmt::{Display, Formatter};
use time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Unit {
    Tenths,
    Seconds,
    Minutes,
    Hours,
}

impl Unit {
    pub const ALL: [Unit; 4] = [Unit::Tenths, Unit::Seconds, Unit::Minutes, Unit::Hours];

    /// Gets the value at which the counter wraps back to 0.
    pub fn modulus(self) -> u8 {
        match self {
            Unit::Tenths => 10,
            Unit::Seconds | Unit::Minutes => 60,
            Unit::Hours => 24,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Four independent wrapping counters.
///
/// They don't carry into each other. Each one is ticked by its own periodic thread, so with the
/// default periods they read as a clock.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Clock {
    values: [u8; 4],
}

impl Clock {
    pub fn tick(&mut self, unit: Unit) {
        let value = &mut self.values[unit.index()];
        *value = (*value + 1) % unit.modulus();
    }

    pub fn reading(&self) -> Reading {
        let [tenths, seconds, minutes, hours] = self.values;
        Reading {
            hours,
            minutes,
            seconds,
            tenths,
        }
    }
}

/// The counter values at one moment.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Reading {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub tenths: u8,
}

impl Reading {
    pub fn as_duration(&self) -> Duration {
        Duration::hours(self.hours.into())
            + Duration::minutes(self.minutes.into())
            + Duration::seconds(self.seconds.into())
            + Duration::milliseconds(i64::from(self.tenths) * 100)
    }

    /// Builds a reading from a duration within a day. Anything below a tenth is dropped.
    pub fn from_duration(duration: Duration) -> Self {
        Reading {
            hours: (duration.whole_hours() % 24) as u8,
            minutes: (duration.whole_minutes() % 60) as u8,
            seconds: (duration.whole_seconds() % 60) as u8,
            tenths: (duration.subsec_milliseconds() / 100) as u8,
        }
    }

    /// Gets the time from `start` to `self`. A finish reading below the start one is taken as the
    /// next day.
    pub fn since(&self, start: &Reading) -> Reading {
        let mut elapsed = self.as_duration() - start.as_duration();
        if elapsed.is_negative() {
            elapsed += Duration::DAY;
        }
        Reading::from_duration(elapsed)
    }
}

impl Display for Reading {
    /// Formats as `h:m:s:t`, no padding.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}:{}", self.hours, self.minutes, self.seconds, self.tenths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(hours: u8, minutes: u8, seconds: u8, tenths: u8) -> Reading {
        Reading {
            hours,
            minutes,
            seconds,
            tenths,
        }
    }

    #[test]
    fn counters_wrap_at_their_modulus() {
        let mut clock = Clock::default();
        for _ in 0..12 {
            clock.tick(Unit::Tenths);
        }
        for _ in 0..61 {
            clock.tick(Unit::Seconds);
        }
        for _ in 0..59 {
            clock.tick(Unit::Minutes);
        }
        for _ in 0..24 {
            clock.tick(Unit::Hours);
        }
        assert_eq!(clock.reading(), reading(0, 59, 1, 2));
    }

    #[test]
    fn counters_do_not_carry() {
        let mut clock = Clock::default();
        for _ in 0..10 {
            clock.tick(Unit::Tenths);
        }
        assert_eq!(clock.reading(), Reading::default());
    }

    #[test]
    fn elapsed_borrows_across_units() {
        let start = reading(1, 2, 58, 7);
        let finish = reading(1, 4, 3, 2);
        assert_eq!(finish.since(&start), reading(0, 1, 4, 5));
    }

    #[test]
    fn elapsed_wraps_past_midnight() {
        let start = reading(23, 59, 59, 9);
        let finish = reading(0, 0, 0, 1);
        assert_eq!(finish.since(&start), reading(0, 0, 0, 2));
        assert_eq!(start.since(&start), Reading::default());
    }

    #[test]
    fn duration_conversion_keeps_every_unit() {
        let r = reading(13, 45, 30, 6);
        assert_eq!(r.as_duration(), Duration::milliseconds(49_530_600));
        assert_eq!(Reading::from_duration(r.as_duration()), r);
    }

    #[test]
    fn displays_without_padding() {
        assert_eq!(reading(0, 5, 12, 3).to_string(), "0:5:12:3");
    }
}
