//! Recording GPIO backend.
//!
//! [MockGpioDriver] doesn't touch any hardware. It records every line configuration, write and
//! release in order, and [MockDelay] records the delays into the same log. Used by the tests and by
//! the dry-run mode of the binaries, usually together with the
//! [HD44780 emulator](crate::lcd::hd44780::emulator::HD44780Emulator).

use crate::delay::DelayNs;
use crate::{GpioDriveMode, GpioDriver, GpioError, GpioOutput, GpioResult, PinAssignment};
use log::trace;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A single recorded action.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MockEvent {
    /// The line was claimed and configured as an output, driven low.
    Configure { pin: PinAssignment, drive_mode: GpioDriveMode },
    /// The line was driven to `value`.
    Write { pin: PinAssignment, value: bool },
    /// The line was released.
    Release { pin: PinAssignment },
    /// A delay was requested.
    Delay(Duration),
}

type EventLog = Arc<Mutex<Vec<MockEvent>>>;

#[derive(Copy, Clone, Debug)]
struct Line {
    drive_mode: GpioDriveMode,
    value: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MockGpioDriver {
    ports: usize,
    pins_per_port: usize,
    events: EventLog,
    claimed: Mutex<HashSet<PinAssignment>>,
    lines: Mutex<HashMap<PinAssignment, Line>>,
    failing: Mutex<Option<PinAssignment>>,
}

impl MockGpioDriver {
    /// Creates a backend with `ports` ports of `pins_per_port` pins each.
    pub fn new(ports: usize, pins_per_port: usize) -> Self {
        Self {
            ports,
            pins_per_port,
            events: EventLog::default(),
            claimed: Mutex::default(),
            lines: Mutex::default(),
            failing: Mutex::default(),
        }
    }

    /// Creates a [MockDelay] recording into this backend's log.
    pub fn delay(&self) -> MockDelay {
        MockDelay {
            events: Arc::clone(&self.events),
        }
    }

    /// Gets a copy of the recorded events.
    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.events).clone()
    }

    /// Takes the recorded events out of the log, leaving it empty.
    pub fn take_events(&self) -> Vec<MockEvent> {
        std::mem::take(&mut *lock(&self.events))
    }

    pub fn clear_events(&self) {
        lock(&self.events).clear();
    }

    /// Checks whether the line is currently claimed.
    pub fn is_claimed(&self, pin: PinAssignment) -> bool {
        lock(&self.claimed).contains(&pin)
    }

    /// Gets the level the line is actually driven to, taking its drive mode into account.
    ///
    /// `None` if the line is floating or not claimed.
    pub fn level(&self, pin: PinAssignment) -> Option<bool> {
        lock(&self.lines)
            .get(&pin)
            .and_then(|line| line.drive_mode.get_state(line.value))
    }

    /// Makes every following write to `pin` fail with an IO error. `None` makes writes succeed
    /// again.
    pub fn set_failing(&self, pin: Option<PinAssignment>) {
        *lock(&self.failing) = pin;
    }

    fn record(&self, event: MockEvent) {
        trace!("{:?}", event);
        lock(&self.events).push(event);
    }
}

impl Debug for MockGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockGpioDriver({}x{})", self.ports, self.pins_per_port)
    }
}

impl GpioDriver for MockGpioDriver {
    fn port_count(&self) -> usize {
        self.ports
    }

    fn pin_count(&self, port: usize) -> GpioResult<usize> {
        if port >= self.port_count() {
            return Err(GpioError::InvalidArgument);
        }
        Ok(self.pins_per_port)
    }

    fn output(
        &self,
        pin: PinAssignment,
        drive_mode: GpioDriveMode,
    ) -> GpioResult<Box<dyn GpioOutput + '_>> {
        self.check_pin(pin)?;

        if !lock(&self.claimed).insert(pin) {
            return Err(GpioError::AlreadyInUse);
        }

        let line = Line {
            drive_mode,
            value: false,
        };
        lock(&self.lines).insert(pin, line);
        self.record(MockEvent::Configure { pin, drive_mode });

        Ok(Box::new(MockOutput { driver: self, pin }))
    }
}

struct MockOutput<'a> {
    driver: &'a MockGpioDriver,
    pin: PinAssignment,
}

impl Debug for MockOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.pin)
    }
}

impl GpioOutput for MockOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        if *lock(&self.driver.failing) == Some(self.pin) {
            return Err(GpioError::Io(std::io::ErrorKind::BrokenPipe));
        }

        if let Some(line) = lock(&self.driver.lines).get_mut(&self.pin) {
            line.value = value;
        }
        self.driver.record(MockEvent::Write {
            pin: self.pin,
            value,
        });
        Ok(())
    }
}

impl Drop for MockOutput<'_> {
    fn drop(&mut self) {
        lock(&self.driver.claimed).remove(&self.pin);
        lock(&self.driver.lines).remove(&self.pin);
        self.driver.record(MockEvent::Release { pin: self.pin });
    }
}

/// A [DelayNs] that returns immediately and only records the requested duration.
#[derive(Clone)]
pub struct MockDelay {
    events: EventLog,
}

impl MockDelay {
    /// Creates a delay with a log of its own, not shared with any backend.
    pub fn new() -> Self {
        Self {
            events: EventLog::default(),
        }
    }

    /// Sums up all the recorded delays.
    pub fn total(&self) -> Duration {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                MockEvent::Delay(duration) => Some(*duration),
                _ => None,
            })
            .sum()
    }
}

impl Default for MockDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for MockDelay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockDelay")
    }
}

impl MockDelay {
    fn record(&self, duration: Duration) {
        lock(&self.events).push(MockEvent::Delay(duration));
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(Duration::from_nanos(ns.into()));
    }

    fn delay_us(&mut self, us: u32) {
        self.record(Duration::from_micros(us.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(Duration::from_millis(ms.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_configured_low_and_released_on_drop() {
        let gpio = MockGpioDriver::new(2, 16);
        let pin = PinAssignment::new(1, 5);
        {
            let output = gpio.output(pin, GpioDriveMode::PushPull).unwrap();
            assert!(gpio.is_claimed(pin));
            assert_eq!(gpio.level(pin), Some(false));
            output.write(true).unwrap();
            assert_eq!(gpio.level(pin), Some(true));
        }
        assert!(!gpio.is_claimed(pin));
        assert_eq!(
            gpio.events(),
            vec![
                MockEvent::Configure { pin, drive_mode: GpioDriveMode::PushPull },
                MockEvent::Write { pin, value: true },
                MockEvent::Release { pin },
            ]
        );
    }

    #[test]
    fn claimed_line_cannot_be_requested_twice() {
        let gpio = MockGpioDriver::new(1, 8);
        let pin = PinAssignment::new(0, 3);
        let _output = gpio.output(pin, GpioDriveMode::PushPull).unwrap();
        assert_eq!(
            gpio.output(pin, GpioDriveMode::PushPull).err(),
            Some(GpioError::AlreadyInUse)
        );
    }

    #[test]
    fn out_of_range_lines_are_rejected() {
        let gpio = MockGpioDriver::new(1, 8);
        assert_eq!(
            gpio.output(PinAssignment::new(0, 8), GpioDriveMode::PushPull).err(),
            Some(GpioError::InvalidArgument)
        );
        assert_eq!(
            gpio.output(PinAssignment::new(1, 0), GpioDriveMode::PushPull).err(),
            Some(GpioError::InvalidArgument)
        );
        assert!(gpio.events().is_empty());
    }

    #[test]
    fn failing_line_reports_io_error() {
        let gpio = MockGpioDriver::new(1, 8);
        let pin = PinAssignment::new(0, 1);
        let output = gpio.output(pin, GpioDriveMode::PushPull).unwrap();
        gpio.set_failing(Some(pin));
        assert_eq!(
            output.write(true),
            Err(GpioError::Io(std::io::ErrorKind::BrokenPipe))
        );
        gpio.set_failing(None);
        assert_eq!(output.write(true), Ok(()));
    }

    #[test]
    fn delays_share_the_backend_log() {
        let gpio = MockGpioDriver::new(1, 8);
        let mut delay = gpio.delay();
        delay.delay_ms(2);
        delay.delay_us(100);
        assert_eq!(
            gpio.take_events(),
            vec![
                MockEvent::Delay(Duration::from_millis(2)),
                MockEvent::Delay(Duration::from_micros(100)),
            ]
        );
        assert!(gpio.events().is_empty());
    }

    #[test]
    fn standalone_delay_sums_up() {
        let mut delay = MockDelay::new();
        delay.delay_ms(10);
        delay.delay_ns(5_000_000);
        assert_eq!(delay.total(), Duration::from_millis(15));
    }

    #[test]
    fn level_follows_the_drive_mode() {
        let gpio = MockGpioDriver::new(1, 8);
        let drain = PinAssignment::new(0, 0);
        let source = PinAssignment::new(0, 1);
        let drain_output = gpio.output(drain, GpioDriveMode::OpenDrain).unwrap();
        let source_output = gpio.output(source, GpioDriveMode::OpenSource).unwrap();

        assert_eq!(gpio.level(drain), Some(false));
        assert_eq!(gpio.level(source), None);

        drain_output.write(true).unwrap();
        source_output.write(true).unwrap();
        assert_eq!(gpio.level(drain), None);
        assert_eq!(gpio.level(source), Some(true));

        drop(drain_output);
        assert_eq!(gpio.level(drain), None);
        assert!(!gpio.is_claimed(drain));
    }

    #[test]
    fn check_pin_uses_the_port_and_pin_counts() {
        let gpio = MockGpioDriver::new(2, 4);
        assert_eq!(gpio.port_count(), 2);
        assert_eq!(gpio.check_pin(PinAssignment::new(1, 3)), Ok(()));
        assert_eq!(
            gpio.check_pin(PinAssignment::new(2, 0)),
            Err(GpioError::InvalidArgument)
        );
        assert_eq!(
            gpio.check_pin(PinAssignment::new(0, 4)),
            Err(GpioError::InvalidArgument)
        );
    }
}
