mod clock;
mod config;
mod stopwatch;

use crate::config::Config;
use crate::stopwatch::{LapEvent, Shared};
use charlcd_gpio::delay::SleepDelay;
use charlcd_gpio::gpiod::GpiodDriver;
use charlcd_gpio::lcd::hd44780::driver::{GpioHD44780Driver, HD44780Driver};
use charlcd_gpio::lcd::hd44780::emulator::HD44780Emulator;
use charlcd_gpio::mock::MockGpioDriver;
use charlcd_gpio::wiring::{Backend, Wiring};
use dotenv::dotenv;
use log::{debug, info, warn};
use std::io::BufRead;
use std::sync::mpsc::{channel, Sender};
use std::sync::Mutex;
use std::thread;

/// Turns the lines typed on stdin into laps. `q` quits, and so does closing stdin.
fn spawn_stdin_reader(laps: Sender<LapEvent>) {
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let event = match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => LapEvent::Quit,
                Ok(_) => LapEvent::Lap,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    LapEvent::Quit
                }
            };
            if laps.send(event).is_err() || event == LapEvent::Quit {
                return;
            }
        }
        let _ = laps.send(LapEvent::Quit);
    });
}

fn run_stopwatch<D: HD44780Driver + Send>(lcd: D, config: &Config) -> eyre::Result<()> {
    let shared = Mutex::new(Shared::new(lcd));
    let (sender, receiver) = channel();

    if config.lap_period().is_none() {
        info!("Press Enter to take a lap, q to quit.");
        spawn_stdin_reader(sender.clone());
    }

    let laps = stopwatch::run(&shared, config, receiver, sender)?;
    info!("{} laps taken.", laps);
    Ok(())
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("Stopwatch starting...");

    let wiring = Wiring::from_env()?;
    info!("LCD @ {:?} ({:?})", wiring.pins, wiring.backend);

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved to {}.", Config::path().display());
        config
    };
    debug!("{:?}", config);

    match wiring.backend {
        Backend::Gpiod => {
            debug!("Initializing GPIO driver...");
            let gpio = GpiodDriver::open(&wiring.chips)?;
            debug!("Initializing LCD driver...");
            let lcd = GpioHD44780Driver::init(&gpio, SleepDelay, wiring.pins)?;
            debug!("{:?} initialized.", lcd);
            run_stopwatch(lcd, &config)?;
        }
        Backend::Mock => {
            let (ports, pins) = wiring.mock_size();
            let gpio = MockGpioDriver::new(ports, pins);
            let lcd = GpioHD44780Driver::init(&gpio, gpio.delay(), wiring.pins)?;
            run_stopwatch(lcd, &config)?;

            let mut emulator = HD44780Emulator::new(wiring.pins);
            emulator.feed_all(&gpio.events());
            for line in emulator.lines() {
                info!("|{}|", line);
            }
        }
    }

    Ok(())
}
