//! The counter threads, the lap server, and what the laps look like on the display.

use crate::clock::{Clock, Reading, Unit};
use crate::config::{Config, MIN_PERIOD};
use charlcd_gpio::lcd::hd44780::driver::{CursorDirection, HD44780Driver, HD44780PrintExt};
use charlcd_gpio::GpioResult;
use eyre::eyre;
use log::{debug, info};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Everything guarded by the one mutex: the counters and the display.
#[derive(Debug)]
pub struct Shared<D> {
    pub clock: Clock,
    pub lcd: D,
}

impl<D> Shared<D> {
    pub fn new(lcd: D) -> Self {
        Shared {
            clock: Clock::default(),
            lcd,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LapEvent {
    Lap,
    Quit,
}

/// Which of the three screens the next lap shows.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LapState {
    /// The next lap records the start time on the first line.
    #[default]
    Start,
    /// The next lap records the finish time on the second line.
    Finish { start: Reading },
    /// The next lap clears the display and shows the time between the two.
    Elapsed { start: Reading, finish: Reading },
}

impl LapState {
    /// Takes a lap at `now`, drawing it, and moves on to the next state.
    pub fn lap(self, now: Reading, lcd: &mut dyn HD44780Driver) -> GpioResult<LapState> {
        let next = match self {
            LapState::Start => {
                lcd.clear_display()?;
                lcd.move_to_row1()?;
                lcd.print("S: ")?;
                print_reading(lcd, &now)?;
                LapState::Finish { start: now }
            }
            LapState::Finish { start } => {
                lcd.move_to_row2()?;
                lcd.print("F: ")?;
                print_reading(lcd, &now)?;
                LapState::Elapsed { start, finish: now }
            }
            LapState::Elapsed { start, finish } => {
                let elapsed = finish.since(&start);
                info!("Elapsed {}", elapsed);
                lcd.clear_display()?;
                lcd.move_to_row1()?;
                lcd.print("Time: ")?;
                lcd.move_to_row2()?;
                print_reading(lcd, &elapsed)?;
                LapState::Start
            }
        };

        // Overwrite the trailing separator
        lcd.move_cursor(CursorDirection::Left)?;
        lcd.print(" ")?;
        lcd.cursor_off()?;

        Ok(next)
    }
}

/// Prints every counter followed by a `:`, hours first.
fn print_reading(lcd: &mut dyn HD44780Driver, reading: &Reading) -> GpioResult<()> {
    for value in [reading.hours, reading.minutes, reading.seconds, reading.tenths] {
        lcd.print(&value.to_string())?;
        lcd.print(":")?;
    }
    Ok(())
}

/// Lets sleeping threads be woken up early to finish.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    pub fn stop(&self) {
        *self.stopped.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.condvar.notify_all();
    }

    /// Sleeps until `deadline`. Returns `false` if stopped in the meantime.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            stopped = match self.condvar.wait_timeout(stopped, deadline - now) {
                Ok((stopped, _)) => stopped,
                Err(e) => e.into_inner().0,
            };
        }
        false
    }
}

fn lock<D>(shared: &Mutex<Shared<D>>) -> eyre::Result<MutexGuard<'_, Shared<D>>> {
    shared.lock().map_err(|_| eyre!("A thread panicked while holding the display"))
}

/// Ticks one counter every `period`, on a fixed schedule so the lock waits don't add up.
fn run_counter<D>(
    shared: &Mutex<Shared<D>>,
    stop: &StopSignal,
    unit: Unit,
    period: Duration,
) -> eyre::Result<()> {
    let period = period.max(MIN_PERIOD);
    debug!("{:?} counter started, period {:?}.", unit, period);
    let mut next_wake = Instant::now();
    loop {
        next_wake += period;
        if !stop.sleep_until(next_wake) {
            return Ok(());
        }
        lock(shared)?.clock.tick(unit);
    }
}

/// Sends a lap every `period`.
fn run_lap_timer(stop: &StopSignal, period: Duration, laps: Sender<LapEvent>) {
    let period = period.max(MIN_PERIOD);
    let mut next_wake = Instant::now();
    loop {
        next_wake += period;
        if !stop.sleep_until(next_wake) || laps.send(LapEvent::Lap).is_err() {
            return;
        }
    }
}

/// Takes a lap for every [LapEvent::Lap] received, until [LapEvent::Quit], the configured amount
/// of laps, or until all the senders are gone.
fn run_server<D: HD44780Driver>(
    shared: &Mutex<Shared<D>>,
    config: &Config,
    events: Receiver<LapEvent>,
) -> eyre::Result<u32> {
    let mut state = LapState::default();
    let mut laps = 0;
    while config.max_laps.is_none_or(|max| laps < max) {
        match events.recv() {
            Ok(LapEvent::Lap) => {}
            Ok(LapEvent::Quit) | Err(_) => break,
        }

        thread::sleep(config.debounce());
        {
            let mut shared = lock(shared)?;
            let now = shared.clock.reading();
            debug!("Lap {} at {} ({:?})", laps + 1, now, state);
            state = state.lap(now, &mut shared.lcd)?;
        }
        laps += 1;
        thread::sleep(config.settle());
    }
    Ok(laps)
}

/// Runs the stopwatch until the server finishes, returning the amount of laps taken.
///
/// Laps come from `events`, and additionally from a timer if [Config::lap_period_ms] is set.
pub fn run<D: HD44780Driver + Send>(
    shared: &Mutex<Shared<D>>,
    config: &Config,
    events: Receiver<LapEvent>,
    lap_sender: Sender<LapEvent>,
) -> eyre::Result<u32> {
    let stop = StopSignal::default();

    thread::scope(|s| -> eyre::Result<u32> {
        let counters: Vec<_> = Unit::ALL
            .into_iter()
            .zip(config.periods())
            .map(|(unit, period)| {
                let stop = &stop;
                s.spawn(move || run_counter(shared, stop, unit, period))
            })
            .collect();

        if let Some(period) = config.lap_period() {
            let stop = &stop;
            s.spawn(move || run_lap_timer(stop, period, lap_sender));
        } else {
            drop(lap_sender);
        }

        let laps = run_server(shared, config, events);
        stop.stop();
        info!("Stopped after {} laps.", laps.as_ref().copied().unwrap_or(0));

        for counter in counters {
            counter
                .join()
                .map_err(|_| eyre!("Counter thread panicked"))??;
        }
        laps
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use charlcd_gpio::lcd::hd44780::driver::{GpioHD44780Driver, HD44780Pins};
    use charlcd_gpio::lcd::hd44780::emulator::HD44780Emulator;
    use charlcd_gpio::mock::MockGpioDriver;
    use charlcd_gpio::PinAssignment;
    use std::sync::mpsc::channel;

    fn pins() -> HD44780Pins {
        let p = PinAssignment::new;
        HD44780Pins::four_bit(p(0, 0), p(0, 1), p(0, 2), [p(0, 7), p(0, 6), p(0, 5), p(0, 4)])
    }

    fn reading(hours: u8, minutes: u8, seconds: u8, tenths: u8) -> Reading {
        Reading {
            hours,
            minutes,
            seconds,
            tenths,
        }
    }

    fn panel(gpio: &MockGpioDriver) -> HD44780Emulator {
        let mut emulator = HD44780Emulator::new(pins());
        emulator.feed_all(&gpio.events());
        emulator
    }

    #[test]
    fn laps_cycle_through_start_finish_and_elapsed() {
        let gpio = MockGpioDriver::new(1, 8);
        let mut lcd = GpioHD44780Driver::init(&gpio, gpio.delay(), pins()).unwrap();

        let state = LapState::Start.lap(reading(0, 1, 2, 3), &mut lcd).unwrap();
        assert_eq!(state, LapState::Finish { start: reading(0, 1, 2, 3) });
        assert_eq!(panel(&gpio).lines()[0].trim_end(), "S: 0:1:2:3");
        assert!(!panel(&gpio).state().cursor_on);

        let state = state.lap(reading(0, 2, 0, 1), &mut lcd).unwrap();
        assert!(matches!(state, LapState::Elapsed { .. }));
        let lines = panel(&gpio).lines();
        assert_eq!(lines[0].trim_end(), "S: 0:1:2:3");
        assert_eq!(lines[1].trim_end(), "F: 0:2:0:1");

        let state = state.lap(reading(0, 9, 9, 9), &mut lcd).unwrap();
        assert_eq!(state, LapState::Start);
        let lines = panel(&gpio).lines();
        assert_eq!(lines[0].trim_end(), "Time:");
        assert_eq!(lines[1].trim_end(), "0:0:57:8");
    }

    #[test]
    fn lap_display_failure_is_reported() {
        let gpio = MockGpioDriver::new(1, 8);
        let mut lcd = GpioHD44780Driver::init(&gpio, gpio.delay(), pins()).unwrap();
        gpio.set_failing(Some(PinAssignment::new(0, 2)));
        assert!(LapState::Start.lap(Reading::default(), &mut lcd).is_err());
    }

    #[test]
    fn stop_signal_wakes_sleepers() {
        let stop = StopSignal::default();
        let started = Instant::now();
        thread::scope(|s| {
            let sleeper = s.spawn(|| stop.sleep_until(Instant::now() + Duration::from_secs(60)));
            thread::sleep(Duration::from_millis(10));
            stop.stop();
            assert!(!sleeper.join().unwrap());
        });
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(!stop.sleep_until(Instant::now() + Duration::from_secs(60)));
    }

    #[test]
    fn sleep_until_past_deadline_returns_at_once() {
        let stop = StopSignal::default();
        assert!(stop.sleep_until(Instant::now()));
    }

    #[test]
    fn zero_lap_period_does_not_flood_the_channel() {
        let stop = StopSignal::default();
        let (sender, receiver) = channel();
        let started = Instant::now();
        thread::scope(|s| {
            let stop = &stop;
            s.spawn(move || run_lap_timer(stop, Duration::ZERO, sender));
            thread::sleep(Duration::from_millis(20));
            stop.stop();
        });
        let elapsed = started.elapsed();

        let queued = receiver.try_iter().count() as u128;
        assert!(queued > 0);
        assert!(queued <= elapsed.as_millis() + 1, "{} laps in {:?}", queued, elapsed);
    }

    #[test]
    fn run_takes_laps_until_quit() {
        let gpio = MockGpioDriver::new(1, 8);
        let lcd = GpioHD44780Driver::init(&gpio, gpio.delay(), pins()).unwrap();
        let shared = Mutex::new(Shared::new(lcd));
        let config = Config {
            periods_ms: [3_600_000; 4],
            debounce_ms: 0,
            settle_ms: 0,
            ..Config::default()
        };

        let (sender, receiver) = channel();
        for event in [LapEvent::Lap, LapEvent::Lap, LapEvent::Quit, LapEvent::Lap] {
            sender.send(event).unwrap();
        }
        let laps = run(&shared, &config, receiver, sender).unwrap();
        assert_eq!(laps, 2);

        let lines = panel(&gpio).lines();
        assert_eq!(lines[0].trim_end(), "S: 0:0:0:0");
        assert_eq!(lines[1].trim_end(), "F: 0:0:0:0");
    }

    #[test]
    fn run_stops_after_max_laps_from_timer() {
        let gpio = MockGpioDriver::new(1, 8);
        let lcd = GpioHD44780Driver::init(&gpio, gpio.delay(), pins()).unwrap();
        let shared = Mutex::new(Shared::new(lcd));
        let config = Config {
            periods_ms: [3_600_000; 4],
            lap_period_ms: Some(1),
            max_laps: Some(3),
            debounce_ms: 0,
            settle_ms: 0,
        };

        let (sender, receiver) = channel();
        let laps = run(&shared, &config, receiver, sender).unwrap();
        assert_eq!(laps, 3);

        let lines = panel(&gpio).lines();
        assert_eq!(lines[0].trim_end(), "Time:");
        assert_eq!(lines[1].trim_end(), "0:0:0:0");
    }
}
