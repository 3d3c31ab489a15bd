pub mod delay;
pub mod gpiod;
pub mod lcd;
pub mod mock;
pub mod soft;
pub mod wiring;

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Identifies a single GPIO line as a `(port, pin)` pair.
///
/// What a port is depends on the backend. For [gpiod::GpiodDriver] it's the index of the GPIO chip
/// in the list the driver was opened with, and the pin is the line offset on that chip.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PinAssignment {
    pub port: usize,
    pub pin: usize,
}

impl PinAssignment {
    pub const fn new(port: usize, pin: usize) -> Self {
        PinAssignment { port, pin }
    }
}

impl From<(usize, usize)> for PinAssignment {
    fn from((port, pin): (usize, usize)) -> Self {
        PinAssignment { port, pin }
    }
}

impl Display for PinAssignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.port, self.pin)
    }
}

impl FromStr for PinAssignment {
    type Err = GpioError;

    /// Parses `port:pin`. A bare number is taken as a pin on port 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |s: &str| s.trim().parse::<usize>().map_err(|_| GpioError::InvalidArgument);
        match s.split_once(':') {
            Some((port, pin)) => Ok(PinAssignment::new(parse(port)?, parse(pin)?)),
            None => Ok(PinAssignment::new(0, parse(s)?)),
        }
    }
}

/// Parses a list of `port:pin` entries separated by commas, semicolons or whitespace.
pub fn parse_pin_list(s: &str) -> GpioResult<Vec<PinAssignment>> {
    s.split([',', ';', ' ', '\t'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// A GPIO backend able to hand out output lines.
///
/// Lines stay claimed for as long as the returned [GpioOutput] lives. Requesting a claimed line
/// again fails with [GpioError::AlreadyInUse].
pub trait GpioDriver: Debug + Sync {
    /// Gets the amount of ports (banks, chips) available.
    fn port_count(&self) -> usize;

    /// Gets the amount of pins available on the given port.
    fn pin_count(&self, port: usize) -> GpioResult<usize>;

    /// Configures the pin as an output with the given drive mode, initially driven low.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the port or pin doesn't exist.
    /// - `GpioError::AlreadyInUse` if the pin is already claimed.
    /// - `GpioError::NotSupported` if the drive mode is not supported.
    fn output(
        &self,
        pin: PinAssignment,
        drive_mode: GpioDriveMode,
    ) -> GpioResult<Box<dyn GpioOutput + '_>>;

    /// Checks that both the port and the pin exist on this backend.
    fn check_pin(&self, pin: PinAssignment) -> GpioResult<()> {
        if pin.port >= self.port_count() || pin.pin >= self.pin_count(pin.port)? {
            return Err(GpioError::InvalidArgument);
        }
        Ok(())
    }
}

/// Specifies the drive mode of the GPIO pin.
///
/// By default, the drive mode is push-pull, which drives the pin high or low with low impedance.
/// There's also open-drain and open-source modes, that leave the pin floating when the output is
/// high or low, respectively.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioDriveMode {
    /// GPIO pin is driven high or low with low impedance.
    #[default]
    PushPull,
    /// GPIO pin is driven low or left floating when high.
    OpenDrain,
    /// GPIO pin is driven high or left floating when low.
    OpenSource,
}

impl GpioDriveMode {
    /// Gets the real state that will be outputted on the GPIO pin based on the drive mode and the
    /// value.
    ///
    /// # Returns
    /// - `Some(true)` if the pin will be driven high.
    /// - `Some(false)` if the pin will be driven low.
    /// - `None` if the pin will be left floating.
    pub fn get_state(&self, value: bool) -> Option<bool> {
        match self {
            GpioDriveMode::PushPull => Some(value),
            GpioDriveMode::OpenDrain => {
                if value {
                    None
                } else {
                    Some(false)
                }
            }
            GpioDriveMode::OpenSource => {
                if value {
                    Some(true)
                } else {
                    None
                }
            }
        }
    }
}

pub trait GpioOutput: Debug + Send {
    /// Writes the state of the GPIO pin.
    fn write(&self, value: bool) -> GpioResult<()>;
}

pub trait GpioBusOutput<const N: usize>: Debug + Send {
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

impl dyn GpioBusOutput<8> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a byte, LSb first.
    pub fn write_byte(&self, value: u8) -> GpioResult<()> {
        let mut values = [false; 8];
        for i in 0..8 {
            values[i] = (value & (1 << i)) != 0;
        }
        self.write(&values)
    }
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a nibble, LSb first.
    pub fn write_nibble(&self, value: u8) -> GpioResult<()> {
        if value > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }

        let mut values = [false; 4];
        for i in 0..4 {
            values[i] = (value & (1 << i)) != 0;
        }
        self.write(&values)
    }
}
