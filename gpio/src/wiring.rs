//! Display wiring shared by the binaries, read from the `CHARLCD_*` environment variables.
//!
//! - `CHARLCD_BACKEND`: `gpiod` (default) or `mock`.
//! - `CHARLCD_CHIPS`: chip paths, one per port. Defaults to [DEFAULT_CHIP].
//! - `CHARLCD_PIN_RS`, `CHARLCD_PIN_RW`, `CHARLCD_PIN_E`: single pins.
//! - `CHARLCD_PINS_DATA`: 4 or 8 data pins, D7 first.
//!
//! Lists may be separated by commas, semicolons or whitespace.

use crate::lcd::hd44780::driver::{DataPins, HD44780Pins};
use crate::{parse_pin_list, GpioError, PinAssignment};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_CHIP: &str = "/dev/gpiochip0";

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum WiringError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid pin in {var}: {source}")]
    InvalidPin {
        var: &'static str,
        #[source]
        source: GpioError,
    },
    #[error("CHARLCD_PINS_DATA needs 4 or 8 pins, got {0}")]
    DataPinCount(usize),
    #[error("unknown backend {0:?}, expected gpiod or mock")]
    UnknownBackend(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Backend {
    /// Linux GPIO character devices.
    Gpiod,
    /// Nothing is driven, the bus activity is recorded and decoded instead.
    Mock,
}

impl FromStr for Backend {
    type Err = WiringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpiod" => Ok(Backend::Gpiod),
            "mock" => Ok(Backend::Mock),
            other => Err(WiringError::UnknownBackend(other.to_string())),
        }
    }
}

/// Where the display is connected.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Wiring {
    pub backend: Backend,
    /// Chip paths, one per port.
    pub chips: Vec<String>,
    pub pins: HD44780Pins,
}

impl Wiring {
    pub fn from_env() -> Result<Self, WiringError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the wiring through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WiringError> {
        let required = |var: &'static str| lookup(var).ok_or(WiringError::Missing(var));
        let pin = |var: &'static str| -> Result<PinAssignment, WiringError> {
            required(var)?
                .parse()
                .map_err(|source| WiringError::InvalidPin { var, source })
        };

        let backend = match lookup("CHARLCD_BACKEND") {
            Some(backend) => backend.parse()?,
            None => Backend::Gpiod,
        };
        let chips = lookup("CHARLCD_CHIPS")
            .map(|chips| split_list(&chips).map(str::to_string).collect::<Vec<_>>())
            .filter(|chips| !chips.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_CHIP.to_string()]);

        let data = parse_pin_list(&required("CHARLCD_PINS_DATA")?).map_err(|source| {
            WiringError::InvalidPin {
                var: "CHARLCD_PINS_DATA",
                source,
            }
        })?;
        let data =
            DataPins::from_slice(&data).map_err(|_| WiringError::DataPinCount(data.len()))?;

        let pins = HD44780Pins {
            rs: pin("CHARLCD_PIN_RS")?,
            rw: pin("CHARLCD_PIN_RW")?,
            e: pin("CHARLCD_PIN_E")?,
            data,
        };

        Ok(Wiring {
            backend,
            chips,
            pins,
        })
    }

    /// Gets the smallest `(ports, pins per port)` fitting every pin in use.
    pub fn mock_size(&self) -> (usize, usize) {
        self.pins
            .assignments()
            .iter()
            .fold((0, 0), |(ports, pins), &(_, pin)| {
                (ports.max(pin.port + 1), pins.max(pin.pin + 1))
            })
    }
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split([',', ';', ' ', '\t'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}
