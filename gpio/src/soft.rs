//! Buses assembled in software from independent output lines.
use crate::{
    GpioBusOutput, GpioDriveMode, GpioDriver, GpioError, GpioOutput, GpioResult, PinAssignment,
};
use std::fmt::Debug;

/// A bus of `N` outputs, written one line after another. Index 0 is the least significant bit.
///
/// Since the lines are written sequentially, the bus is not glitch-free. That's fine for strobed
/// buses like the HD44780 one, where the data is only latched on the enable edge.
pub struct SoftGpioBusOutput<'a, const N: usize> {
    pins: [Box<dyn GpioOutput + 'a>; N],
}

impl<'a, const N: usize> SoftGpioBusOutput<'a, N> {
    pub fn new(pins: [Box<dyn GpioOutput + 'a>; N]) -> Self {
        Self { pins }
    }

    /// Requests all the `pins` from the `driver` as outputs and groups them into a bus, LSb first.
    ///
    /// If any of the requests fail, the lines claimed so far are released again.
    pub fn request<G: GpioDriver + ?Sized>(
        driver: &'a G,
        pins: [PinAssignment; N],
        drive_mode: GpioDriveMode,
    ) -> GpioResult<Self> {
        let mut outputs = Vec::with_capacity(N);
        for pin in pins {
            outputs.push(driver.output(pin, drive_mode)?);
        }
        let pins = outputs
            .try_into()
            .map_err(|_| GpioError::Other("bus size mismatch".to_string()))?;
        Ok(Self::new(pins))
    }
}

impl<const N: usize> Debug for SoftGpioBusOutput<'_, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoftGpioBusOutput({:?})", self.pins)
    }
}

impl<const N: usize> GpioBusOutput<N> for SoftGpioBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        for (pin, &value) in self.pins.iter().zip(values) {
            pin.write(value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEvent, MockGpioDriver};

    #[test]
    fn nibble_is_written_lsb_first() {
        let gpio = MockGpioDriver::new(1, 8);
        let pins = [0, 1, 2, 3].map(|pin| PinAssignment::new(0, pin));
        let bus = SoftGpioBusOutput::request(&gpio, pins, GpioDriveMode::PushPull).unwrap();
        gpio.clear_events();

        let bus: &dyn GpioBusOutput<4> = &bus;
        bus.write_nibble(0b0110).unwrap();

        assert_eq!(
            gpio.events(),
            vec![
                MockEvent::Write { pin: PinAssignment::new(0, 0), value: false },
                MockEvent::Write { pin: PinAssignment::new(0, 1), value: true },
                MockEvent::Write { pin: PinAssignment::new(0, 2), value: true },
                MockEvent::Write { pin: PinAssignment::new(0, 3), value: false },
            ]
        );
    }

    #[test]
    fn nibble_out_of_range_is_rejected() {
        let gpio = MockGpioDriver::new(1, 8);
        let pins = [4, 5, 6, 7].map(|pin| PinAssignment::new(0, pin));
        let bus = SoftGpioBusOutput::request(&gpio, pins, GpioDriveMode::PushPull).unwrap();
        gpio.clear_events();

        let bus: &dyn GpioBusOutput<4> = &bus;
        assert_eq!(bus.write_nibble(0x10), Err(GpioError::InvalidArgument));
        assert!(gpio.events().is_empty());
    }

    #[test]
    fn failed_request_releases_claimed_lines() {
        let gpio = MockGpioDriver::new(1, 4);
        let pins = [0, 1, 2, 9].map(|pin| PinAssignment::new(0, pin));
        let result = SoftGpioBusOutput::request(&gpio, pins, GpioDriveMode::PushPull);
        assert_eq!(result.err(), Some(GpioError::InvalidArgument));

        assert!(gpio.output(PinAssignment::new(0, 0), GpioDriveMode::PushPull).is_ok());
    }
}
