use crate::lcd::hd44780::driver::HD44780Error;
use crate::{GpioError, GpioResult, PinAssignment};
use std::fmt::{Display, Formatter};

/// The role of a line on the HD44780 bus.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Signal {
    /// Register select: command (low) or data (high).
    Rs,
    /// Read/write: write (low) or read (high).
    Rw,
    /// Enable strobe.
    E,
    /// Data line `D0`..`D7`.
    Data(u8),
}

impl Display for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Rs => write!(f, "RS"),
            Signal::Rw => write!(f, "RW"),
            Signal::E => write!(f, "E"),
            Signal::Data(n) => write!(f, "D{}", n),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InterfaceMode {
    /// Only `D7`..`D4` are wired, bytes go over as two nibbles.
    FourBit,
    /// All eight data lines are wired.
    EightBit,
}

/// The data lines, most significant first.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataPins {
    /// `[D7, D6, D5, D4]`
    FourBit([PinAssignment; 4]),
    /// `[D7, D6, D5, D4, D3, D2, D1, D0]`
    EightBit([PinAssignment; 8]),
}

impl DataPins {
    /// Builds the data lines from 4 or 8 assignments, most significant first.
    pub fn from_slice(pins: &[PinAssignment]) -> GpioResult<Self> {
        if let Ok(pins) = <[PinAssignment; 4]>::try_from(pins) {
            Ok(DataPins::FourBit(pins))
        } else if let Ok(pins) = <[PinAssignment; 8]>::try_from(pins) {
            Ok(DataPins::EightBit(pins))
        } else {
            Err(GpioError::InvalidArgument)
        }
    }

    pub fn mode(&self) -> InterfaceMode {
        match self {
            DataPins::FourBit(_) => InterfaceMode::FourBit,
            DataPins::EightBit(_) => InterfaceMode::EightBit,
        }
    }

    pub fn as_slice(&self) -> &[PinAssignment] {
        match self {
            DataPins::FourBit(pins) => pins,
            DataPins::EightBit(pins) => pins,
        }
    }
}

/// The complete wiring of one display.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HD44780Pins {
    pub rs: PinAssignment,
    pub rw: PinAssignment,
    pub e: PinAssignment,
    pub data: DataPins,
}

impl HD44780Pins {
    /// Wiring for the 4-bit interface. `data` is `[D7, D6, D5, D4]`.
    pub fn four_bit<P: Into<PinAssignment>>(rs: P, rw: P, e: P, data: [P; 4]) -> Self {
        HD44780Pins {
            rs: rs.into(),
            rw: rw.into(),
            e: e.into(),
            data: DataPins::FourBit(data.map(Into::into)),
        }
    }

    /// Wiring for the 8-bit interface. `data` is `[D7, D6, D5, D4, D3, D2, D1, D0]`.
    pub fn eight_bit<P: Into<PinAssignment>>(rs: P, rw: P, e: P, data: [P; 8]) -> Self {
        HD44780Pins {
            rs: rs.into(),
            rw: rw.into(),
            e: e.into(),
            data: DataPins::EightBit(data.map(Into::into)),
        }
    }

    pub fn mode(&self) -> InterfaceMode {
        self.data.mode()
    }

    /// Lists every line in use with its role: RS, RW, E, then the data lines from `D7` down.
    pub fn assignments(&self) -> Vec<(Signal, PinAssignment)> {
        let data = self.data.as_slice();
        let mut assignments = Vec::with_capacity(3 + data.len());
        assignments.push((Signal::Rs, self.rs));
        assignments.push((Signal::Rw, self.rw));
        assignments.push((Signal::E, self.e));
        for (i, &pin) in data.iter().enumerate() {
            assignments.push((Signal::Data(7 - i as u8), pin));
        }
        assignments
    }

    /// Checks that no two lines in use share a pin.
    pub fn validate(&self) -> Result<(), HD44780Error> {
        validate_pins(&self.assignments())
    }
}

/// Checks that all the assignments are pairwise distinct, reporting the first collision found.
pub fn validate_pins(assignments: &[(Signal, PinAssignment)]) -> Result<(), HD44780Error> {
    for (i, &(first, pin)) in assignments.iter().enumerate() {
        for &(second, other) in &assignments[i + 1..] {
            if pin == other {
                return Err(HD44780Error::PinConflict { pin, first, second });
            }
        }
    }
    Ok(())
}
