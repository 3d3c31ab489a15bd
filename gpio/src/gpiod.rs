//! GpiodDriver implementation for driving GPIO lines through the Linux GPIO character devices,
//! using the gpiod library.
//!
//! Every opened `/dev/gpiochipN` is one port, in the order given to [GpiodDriver::new], and the pin
//! is the line offset on that chip.
use crate::{GpioDriveMode, GpioDriver, GpioError, GpioOutput, GpioResult, PinAssignment};
use bitvec::vec::BitVec;
use log::debug;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO lines of one or more
/// chips.
pub struct GpiodDriver {
    chips: Vec<gpiod::Chip>,
    used_pins: Vec<BitVec<AtomicU8>>,
}

impl GpiodDriver {
    pub fn new(chips: Vec<gpiod::Chip>) -> Self {
        let used_pins = chips
            .iter()
            .map(|chip| BitVec::repeat(false, chip.num_lines() as usize))
            .collect();
        Self { chips, used_pins }
    }

    /// Opens the chips at the given paths, e.g. `/dev/gpiochip0`. The first path becomes port 0.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> GpioResult<Self> {
        let chips = paths
            .iter()
            .map(|path| gpiod::Chip::new(path.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let driver = Self::new(chips);
        debug!("{:?} opened.", driver);
        Ok(driver)
    }

    fn chip(&self, port: usize) -> GpioResult<&gpiod::Chip> {
        self.chips.get(port).ok_or(GpioError::InvalidArgument)
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.chips.iter().map(|chip| chip.name()).collect();
        write!(f, "GpiodDriver({})", names.join(", "))
    }
}

impl From<GpioDriveMode> for gpiod::Drive {
    fn from(mode: GpioDriveMode) -> Self {
        match mode {
            GpioDriveMode::PushPull => gpiod::Drive::PushPull,
            GpioDriveMode::OpenDrain => gpiod::Drive::OpenDrain,
            GpioDriveMode::OpenSource => gpiod::Drive::OpenSource,
        }
    }
}

impl GpioDriver for GpiodDriver {
    fn port_count(&self) -> usize {
        self.chips.len()
    }

    fn pin_count(&self, port: usize) -> GpioResult<usize> {
        Ok(self.chip(port)?.num_lines() as usize)
    }

    fn output(
        &self,
        pin: PinAssignment,
        drive_mode: GpioDriveMode,
    ) -> GpioResult<Box<dyn GpioOutput + '_>> {
        self.check_pin(pin)?;

        let used_pins = &self.used_pins[pin.port];
        if used_pins[pin.pin] {
            return Err(GpioError::AlreadyInUse);
        }

        let line = self.chip(pin.port)?.request_lines(
            gpiod::Options::output([pin.pin as u32])
                .consumer(env!("CARGO_PKG_NAME"))
                .drive(drive_mode.into())
                .values([false]),
        )?;

        used_pins.set_aliased(pin.pin, true);

        Ok(Box::new(GpiodOutput {
            driver: self,
            pin,
            line,
        }))
    }
}

struct GpiodOutput<'a> {
    driver: &'a GpiodDriver,
    pin: PinAssignment,
    line: gpiod::Lines<gpiod::Output>,
}

impl Debug for GpiodOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.pin)
    }
}

impl GpioOutput for GpiodOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.line.set_values([value])?;
        Ok(())
    }
}

impl Drop for GpiodOutput<'_> {
    fn drop(&mut self) {
        self.driver.used_pins[self.pin.port].set_aliased(self.pin.pin, false);
    }
}
