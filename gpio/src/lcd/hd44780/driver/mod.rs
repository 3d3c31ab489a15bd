//! HD44780 LCD driver module.
//!
//! See [HD44780Driver] trait for the command set, [GpioHD44780Driver] for the implementation of the
//! driver using GPIO pins, and [HD44780PrintExt] for printing text and numbers.

mod gpio;
mod pins;
mod print;

use crate::{GpioError, GpioResult, PinAssignment};
pub use gpio::*;
pub use pins::*;
pub use print::*;
use std::fmt::Debug;
use thiserror::Error;

/// Raw command bytes used by the power-on sequence.
pub mod command {
    pub const CLEAR_DISPLAY: u8 = 0b00000001;
    pub const RETURN_HOME: u8 = 0b00000010;
    /// Entry mode: increment, no display shift.
    pub const ENTRY_INCREMENT: u8 = 0b00000110;
    pub const DISPLAY_OFF: u8 = 0b00001000;
    /// Display on, cursor on, cursor blinking.
    pub const DISPLAY_ON_CURSOR_BLINK: u8 = 0b00001111;
    /// Function set: 8-bit bus, 2 lines, 5x8 font.
    pub const FUNCTION_SET_8BIT: u8 = 0b00111000;
    /// Function set: 4-bit bus, 2 lines, 5x8 font.
    pub const FUNCTION_SET_4BIT: u8 = 0b00101000;
}

/// DDRAM address of the first cell of each line on a two-line display.
pub const ROW_ADDRESSES: [u8; 2] = [0x00, 0x40];

/// Cells per line in DDRAM on a two-line display, most of which are off-screen on the usual 16x2
/// panel.
pub const ROW_LENGTH: usize = 40;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum HD44780Error {
    #[error("pin {pin} is assigned to both {first} and {second}")]
    PinConflict {
        pin: PinAssignment,
        first: Signal,
        second: Signal,
    },
    #[error(transparent)]
    Gpio(#[from] GpioError),
}

/// The HD44780 command set, built on top of the two raw writes.
///
/// All the commands are blocking and return once the controller had time to execute them.
pub trait HD44780Driver: Debug {
    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.write_command(command::CLEAR_DISPLAY)
    }

    /// Sets the cursor to the home position, without clearing.
    fn return_home(&mut self) -> GpioResult<()> {
        self.write_command(command::RETURN_HOME)
    }

    /// Sets the direction the cursor moves in after writing data, and whether the display shifts
    /// along.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> GpioResult<()> {
        let mut command = 0b00000100;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.write_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> GpioResult<()> {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.write_command(command)
    }

    /// Turns the whole display off. DDRAM is kept.
    fn display_off(&mut self) -> GpioResult<()> {
        self.set_display_control(false, false, false)
    }

    /// Display on, cursor hidden.
    fn cursor_off(&mut self) -> GpioResult<()> {
        self.set_display_control(true, false, false)
    }

    /// Display on, cursor shown.
    fn cursor_on(&mut self) -> GpioResult<()> {
        self.set_display_control(true, true, false)
    }

    /// Display on, cursor shown and blinking.
    fn cursor_blink(&mut self) -> GpioResult<()> {
        self.set_display_control(true, true, true)
    }

    /// Moves the cursor or shifts the display.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> GpioResult<()> {
        let mut command = 0b00010000;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.write_command(command)
    }

    /// Moves the cursor by one cell without writing anything.
    fn move_cursor(&mut self, direction: CursorDirection) -> GpioResult<()> {
        self.cursor_shift(false, direction)
    }

    /// Scrolls the content of both lines by one cell.
    fn scroll_display(&mut self, direction: CursorDirection) -> GpioResult<()> {
        self.cursor_shift(true, direction)
    }

    /// Sets the CGRAM address.
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b00111111 {
            return Err(GpioError::InvalidArgument);
        }
        let command = 0b01000000 | address;
        self.write_command(command)
    }

    /// Sets the DDRAM address.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b01111111 {
            return Err(GpioError::InvalidArgument);
        }
        let command = 0b10000000 | address;
        self.write_command(command)
    }

    /// Moves the cursor to the start of the first line.
    fn move_to_row1(&mut self) -> GpioResult<()> {
        self.set_ddram_address(ROW_ADDRESSES[0])
    }

    /// Moves the cursor to the start of the second line.
    fn move_to_row2(&mut self) -> GpioResult<()> {
        self.set_ddram_address(ROW_ADDRESSES[1])
    }

    /// Moves the cursor to the given zero-based `row` and `col`.
    fn set_cursor(&mut self, row: usize, col: usize) -> GpioResult<()> {
        if row >= ROW_ADDRESSES.len() || col >= ROW_LENGTH {
            return Err(GpioError::InvalidArgument);
        }
        self.set_ddram_address(ROW_ADDRESSES[row] + col as u8)
    }

    /// Stores a custom 5x8 glyph in one of the 8 CGRAM slots. Each byte is one row, top first,
    /// using the 5 lowest bits. The glyph is then printed by writing its `index` as data.
    ///
    /// Leaves the address counter in CGRAM, so set a DDRAM position before printing again.
    fn create_char(&mut self, index: u8, glyph: &[u8; 8]) -> GpioResult<()> {
        if index > 7 {
            return Err(GpioError::InvalidArgument);
        }
        self.set_cgram_address(index << 3)?;
        for &row in glyph {
            self.write_data(row & 0b00011111)?;
        }
        Ok(())
    }

    // Low-level writes.
    // Everything above goes through these two, implemented by the specific driver.

    /// Writes a command byte. Sets the RS pin to 0 (command).
    fn write_command(&mut self, command: u8) -> GpioResult<()>;

    /// Writes a data byte at the cursor position. Sets the RS pin to 1 (data).
    fn write_data(&mut self, data: u8) -> GpioResult<()>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    Left,
    Right,
}
