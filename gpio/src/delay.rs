//! Blocking delay providers for the host.
//!
//! The LCD drivers never sleep on their own, they take an [embedded-hal](embedded_hal) [DelayNs]
//! instead. The providers here implement it with the standard library clock, and
//! [MockDelay](crate::mock::MockDelay) implements it for the tests.

pub use embedded_hal::delay::DelayNs;
use std::hint::spin_loop;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Delays by putting the current thread to sleep.
///
/// The OS scheduler may oversleep by quite a bit, which is fine for the HD44780 as all the
/// timings are minimums.
#[derive(Copy, Clone, Debug, Default)]
pub struct SleepDelay;

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        sleep(Duration::from_nanos(ns.into()));
    }

    fn delay_us(&mut self, us: u32) {
        sleep(Duration::from_micros(us.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        sleep(Duration::from_millis(ms.into()));
    }
}

/// Delays by spinning on [Instant] until the duration passes.
///
/// Keeps a core busy, but doesn't oversleep. Durations of at least `sleep_threshold` are handed
/// over to the scheduler instead.
#[derive(Copy, Clone, Debug)]
pub struct SpinDelay {
    pub sleep_threshold: Duration,
}

impl SpinDelay {
    pub fn new() -> Self {
        Self {
            sleep_threshold: Duration::from_millis(1),
        }
    }

    pub fn with_sleep_threshold(mut self, sleep_threshold: Duration) -> Self {
        self.sleep_threshold = sleep_threshold;
        self
    }

    fn wait(&self, duration: Duration) {
        if duration >= self.sleep_threshold {
            sleep(duration);
            return;
        }

        let start = Instant::now();
        while start.elapsed() < duration {
            spin_loop();
        }
    }
}

impl Default for SpinDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.wait(Duration::from_nanos(ns.into()));
    }

    fn delay_us(&mut self, us: u32) {
        self.wait(Duration::from_micros(us.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.wait(Duration::from_millis(ms.into()));
    }
}

/// Runs `duration` through `delay` with the finest unit that fits in its `u32` argument.
pub fn delay_for<D: DelayNs + ?Sized>(delay: &mut D, duration: Duration) {
    if let Ok(ns) = u32::try_from(duration.as_nanos()) {
        delay.delay_ns(ns);
    } else if let Ok(us) = u32::try_from(duration.as_micros()) {
        delay.delay_us(us);
    } else {
        delay.delay_ms(u32::try_from(duration.as_millis()).unwrap_or(u32::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_delay_waits_at_least_the_duration() {
        let mut delay = SpinDelay::new();
        let start = Instant::now();
        delay.delay_us(200);
        assert!(start.elapsed() >= Duration::from_micros(200));
    }

    #[test]
    fn sleep_delay_waits_at_least_the_duration() {
        let start = Instant::now();
        SleepDelay.delay_ms(2);
        assert!(start.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn spin_delay_hands_long_waits_to_sleep() {
        let mut delay = SpinDelay::new().with_sleep_threshold(Duration::from_micros(50));
        let start = Instant::now();
        delay.delay_ns(100_000);
        assert!(start.elapsed() >= Duration::from_micros(100));
    }

    #[derive(Default)]
    struct Calls(Vec<(&'static str, u32)>);

    impl DelayNs for Calls {
        fn delay_ns(&mut self, ns: u32) {
            self.0.push(("ns", ns));
        }

        fn delay_us(&mut self, us: u32) {
            self.0.push(("us", us));
        }

        fn delay_ms(&mut self, ms: u32) {
            self.0.push(("ms", ms));
        }
    }

    #[test]
    fn delay_for_picks_a_unit_that_fits() {
        let mut calls = Calls::default();
        delay_for(&mut calls, Duration::from_micros(100));
        delay_for(&mut calls, Duration::from_secs(5));
        delay_for(&mut calls, Duration::from_secs(5_000));
        assert_eq!(
            calls.0,
            vec![("ns", 100_000), ("us", 5_000_000), ("ms", 5_000_000)]
        );
    }
}
