use crate::delay::{delay_for, DelayNs};
use crate::lcd::hd44780::driver::{
    command, DataPins, HD44780Driver, HD44780Error, HD44780Pins, HD44780PrintExt, InterfaceMode,
};
use crate::soft::SoftGpioBusOutput;
use crate::{GpioBusOutput, GpioDriveMode, GpioDriver, GpioOutput, GpioResult, PinAssignment};
use log::{debug, trace};
use std::fmt;
use std::time::Duration;

/// Delays used on the bus. All of them are minimums, so being late is harmless.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HD44780Timing {
    /// Wait before talking to a freshly powered controller.
    pub power_on: Duration,
    /// Wait after each synchronization pulse and each byte of the power-on sequence.
    pub wake_up: Duration,
    /// Wait after the nibble switching the controller to the 4-bit interface.
    pub mode_switch: Duration,
    /// How long E is held high.
    pub enable_pulse: Duration,
    /// Wait after every command or data write. Covers the slowest commands (clear, home), as the
    /// busy flag is never polled.
    pub command_settle: Duration,
}

impl Default for HD44780Timing {
    fn default() -> Self {
        HD44780Timing {
            power_on: Duration::from_millis(50),
            wake_up: Duration::from_millis(10),
            mode_switch: Duration::from_millis(5),
            enable_pulse: Duration::from_micros(100),
            command_settle: Duration::from_millis(2),
        }
    }
}

#[derive(Debug)]
enum GpioHD44780Bus<'a> {
    Bus8Bit(Box<dyn GpioBusOutput<8> + 'a>),
    Bus4Bit(Box<dyn GpioBusOutput<4> + 'a>),
}

/// Driver for an HD44780 controller wired to plain GPIO lines, bit-banging the parallel bus.
///
/// The lines are claimed from the [GpioDriver] for the whole life of the driver, and released when
/// it's dropped. RW is always driven low, so nothing is ever read back and every write is followed
/// by a fixed [settle time](HD44780Timing::command_settle) instead of polling the busy flag.
///
/// All the waiting goes through the owned [DelayNs]. Pass a `&mut` to keep using the delay
/// elsewhere.
///
/// Every bus operation takes `&mut self`. To share one display between threads, put the driver
/// behind a mutex and hold the lock for the whole sequence of commands, as a command interleaved
/// from somewhere else would end up in the middle of e.g. a cursor move and a print.
pub struct GpioHD44780Driver<'a, D> {
    pins: HD44780Pins,
    timing: HD44780Timing,
    pin_rs: Box<dyn GpioOutput + 'a>,
    pin_rw: Box<dyn GpioOutput + 'a>,
    pin_e: Box<dyn GpioOutput + 'a>,
    data_bus: GpioHD44780Bus<'a>,
    delay: D,
}

impl<D> fmt::Debug for GpioHD44780Driver<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpioHD44780Driver")
            .field("pins", &self.pins)
            .field("timing", &self.timing)
            .field("data_bus", &self.data_bus)
            .finish_non_exhaustive()
    }
}

impl<'a, D: DelayNs> GpioHD44780Driver<'a, D> {
    /// Initializes a display on the 4-bit interface, with default timing.
    ///
    /// `data` is `[D7, D6, D5, D4]`. The pins can be anything convertible to a [PinAssignment],
    /// like `(port, pin)` tuples.
    pub fn new_4bit<G, P>(
        gpio: &'a G,
        delay: D,
        rs: P,
        rw: P,
        e: P,
        data: [P; 4],
    ) -> Result<Self, HD44780Error>
    where
        G: GpioDriver + ?Sized,
        P: Into<PinAssignment>,
    {
        Self::init(gpio, delay, HD44780Pins::four_bit(rs, rw, e, data))
    }

    /// Initializes a display on the 8-bit interface, with default timing.
    ///
    /// `data` is `[D7, D6, D5, D4, D3, D2, D1, D0]`.
    pub fn new_8bit<G, P>(
        gpio: &'a G,
        delay: D,
        rs: P,
        rw: P,
        e: P,
        data: [P; 8],
    ) -> Result<Self, HD44780Error>
    where
        G: GpioDriver + ?Sized,
        P: Into<PinAssignment>,
    {
        Self::init(gpio, delay, HD44780Pins::eight_bit(rs, rw, e, data))
    }

    /// Initializes a display with default timing. See [Self::init_with_timing].
    pub fn init<G: GpioDriver + ?Sized>(
        gpio: &'a G,
        delay: D,
        pins: HD44780Pins,
    ) -> Result<Self, HD44780Error> {
        Self::init_with_timing(gpio, delay, pins, HD44780Timing::default())
    }

    /// Claims the lines, and brings the controller into a known state.
    ///
    /// The wiring is validated first. If two signals share a pin, [HD44780Error::PinConflict] is
    /// returned before any line is requested from `gpio`.
    ///
    /// Then every line is configured as a push-pull output, driven low, and the power-on sequence
    /// runs. It starts with three `0011` synchronization pulses, which put the controller into
    /// 8-bit mode no matter which mode it was in. On the 4-bit interface, a single `0010` nibble
    /// then switches it to 4-bit mode. After that, it's function set (2 lines, 5x8 font), display
    /// off, clear, entry mode increment without shift, and finally display on with a blinking
    /// cursor.
    pub fn init_with_timing<G: GpioDriver + ?Sized>(
        gpio: &'a G,
        delay: D,
        pins: HD44780Pins,
        timing: HD44780Timing,
    ) -> Result<Self, HD44780Error> {
        pins.validate()?;

        debug!("Configuring HD44780 lines on {:?}...", gpio);
        let pin_rs = gpio.output(pins.rs, GpioDriveMode::PushPull)?;
        let pin_rw = gpio.output(pins.rw, GpioDriveMode::PushPull)?;
        let pin_e = gpio.output(pins.e, GpioDriveMode::PushPull)?;

        // The bus takes the data lines LSb first
        let data_bus = match pins.data {
            DataPins::FourBit(mut data) => {
                data.reverse();
                GpioHD44780Bus::Bus4Bit(Box::new(SoftGpioBusOutput::request(
                    gpio,
                    data,
                    GpioDriveMode::PushPull,
                )?))
            }
            DataPins::EightBit(mut data) => {
                data.reverse();
                GpioHD44780Bus::Bus8Bit(Box::new(SoftGpioBusOutput::request(
                    gpio,
                    data,
                    GpioDriveMode::PushPull,
                )?))
            }
        };

        let mut driver = GpioHD44780Driver {
            pins,
            timing,
            pin_rs,
            pin_rw,
            pin_e,
            data_bus,
            delay,
        };
        driver.power_on()?;

        debug!("{:?} initialized.", driver.pins);
        Ok(driver)
    }

    /// Gets the wiring of the display.
    pub fn pins(&self) -> &HD44780Pins {
        &self.pins
    }

    pub fn mode(&self) -> InterfaceMode {
        self.pins.mode()
    }

    pub fn timing(&self) -> &HD44780Timing {
        &self.timing
    }

    fn power_on(&mut self) -> GpioResult<()> {
        debug!("Running HD44780 power-on sequence ({:?})...", self.mode());

        self.wait(self.timing.power_on);

        // Synchronize
        self.pin_rs.write(false)?;
        self.pin_rw.write(false)?;
        self.write_high_nibble(0b0011)?;
        for _ in 0..3 {
            self.pulse_e()?;
            self.wait(self.timing.wake_up);
        }

        let function_set = match self.data_bus {
            GpioHD44780Bus::Bus8Bit(_) => command::FUNCTION_SET_8BIT,
            GpioHD44780Bus::Bus4Bit(_) => {
                self.write_high_nibble(0b0010)?;
                self.pulse_e()?;
                self.wait(self.timing.mode_switch);
                command::FUNCTION_SET_4BIT
            }
        };

        for byte in [
            function_set,
            command::DISPLAY_OFF,
            command::CLEAR_DISPLAY,
            command::ENTRY_INCREMENT,
            command::DISPLAY_ON_CURSOR_BLINK,
        ] {
            self.write_byte(byte)?;
            self.wait(self.timing.wake_up);
        }

        Ok(())
    }

    fn wait(&mut self, duration: Duration) {
        delay_for(&mut self.delay, duration);
    }

    fn pulse_e(&mut self) -> GpioResult<()> {
        self.pin_e.write(true)?;
        self.wait(self.timing.enable_pulse);
        self.pin_e.write(false)?;
        Ok(())
    }

    /// Puts `nibble` on `D7`..`D4` without pulsing. On the 8-bit interface the lower lines go low.
    fn write_high_nibble(&self, nibble: u8) -> GpioResult<()> {
        match &self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => bus.write_byte(nibble << 4),
            GpioHD44780Bus::Bus4Bit(bus) => bus.write_nibble(nibble),
        }
    }

    fn write_byte(&mut self, byte: u8) -> GpioResult<()> {
        match &self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => {
                bus.write_byte(byte)?;
                self.pulse_e()?;
            }
            GpioHD44780Bus::Bus4Bit(_) => {
                let high_nibble = (byte >> 4) & 0x0F;
                let low_nibble = byte & 0x0F;
                trace!("Writing HN: {:04b}", high_nibble);
                self.write_high_nibble(high_nibble)?;
                self.pulse_e()?;
                trace!("Writing LN: {:04b}", low_nibble);
                self.write_high_nibble(low_nibble)?;
                self.pulse_e()?;
            }
        }
        Ok(())
    }

    /// Puts the byte on the data bus and latches it: once on the 8-bit interface, or as the high
    /// and then the low nibble on the 4-bit one, with an E pulse after each.
    ///
    /// RS and RW are left as they are, and there's no settle time afterwards. Use
    /// [HD44780Driver::write_command] or [HD44780Driver::write_data] for complete transfers.
    pub fn set_byte(&mut self, byte: u8) -> GpioResult<()> {
        self.write_byte(byte)
    }

    fn send(&mut self, data: u8, rs: bool) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {}", data, rs);

        // Set RW pin to write
        self.pin_rw.write(false)?;
        // Set RS pin
        self.pin_rs.write(rs)?;

        self.write_byte(data)?;
        self.wait(self.timing.command_settle);

        Ok(())
    }
}

impl<D: DelayNs> HD44780Driver for GpioHD44780Driver<'_, D> {
    fn write_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, false)
    }

    fn write_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, true)
    }
}

impl<D: DelayNs> fmt::Write for GpioHD44780Driver<'_, D> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s).map_err(|_| fmt::Error)
    }
}
