use crate::lcd::hd44780::driver::HD44780Driver;
use crate::GpioResult;
use log::warn;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Text and number rendering on top of [HD44780Driver::write_data].
///
/// Everything is written at the current cursor position, one data write per character.
pub trait HD44780PrintExt {
    /// Writes a single character. Anything outside of ASCII is written as `?`.
    fn print_char(&mut self, c: char) -> GpioResult<()>;

    /// Writes the text up to the first NUL character, if there is one.
    fn print(&mut self, s: &str) -> GpioResult<()>;

    /// Writes raw character codes, as they are in the character ROM or CGRAM.
    fn print_bytes(&mut self, bytes: &[u8]) -> GpioResult<()>;

    /// Writes the 8 bits of the value as `0`s and `1`s, most significant first.
    fn print_binary8(&mut self, value: u8) -> GpioResult<()>;
    fn print_binary32(&mut self, value: u32) -> GpioResult<()>;
    fn print_binary64(&mut self, value: u64) -> GpioResult<()>;

    /// Writes the value as 2 uppercase hex digits, most significant first.
    fn print_hex8(&mut self, value: u8) -> GpioResult<()>;
    fn print_hex32(&mut self, value: u32) -> GpioResult<()>;
    fn print_hex64(&mut self, value: u64) -> GpioResult<()>;
}

impl<T: ?Sized + HD44780Driver> HD44780PrintExt for T {
    fn print_char(&mut self, c: char) -> GpioResult<()> {
        if c.is_ascii() {
            self.write_data(c as u8)
        } else {
            warn!("Non-ASCII character: {}", c);
            self.write_data(b'?')
        }
    }

    fn print(&mut self, s: &str) -> GpioResult<()> {
        for c in s.chars().take_while(|&c| c != '\0') {
            self.print_char(c)?;
        }
        Ok(())
    }

    fn print_bytes(&mut self, bytes: &[u8]) -> GpioResult<()> {
        for &byte in bytes {
            self.write_data(byte)?;
        }
        Ok(())
    }

    fn print_binary8(&mut self, value: u8) -> GpioResult<()> {
        print_binary(self, value.into(), 8)
    }

    fn print_binary32(&mut self, value: u32) -> GpioResult<()> {
        print_binary(self, value.into(), 32)
    }

    fn print_binary64(&mut self, value: u64) -> GpioResult<()> {
        print_binary(self, value, 64)
    }

    fn print_hex8(&mut self, value: u8) -> GpioResult<()> {
        print_hex(self, value.into(), 2)
    }

    fn print_hex32(&mut self, value: u32) -> GpioResult<()> {
        print_hex(self, value.into(), 8)
    }

    fn print_hex64(&mut self, value: u64) -> GpioResult<()> {
        print_hex(self, value, 16)
    }
}

fn print_binary<T: ?Sized + HD44780Driver>(
    driver: &mut T,
    value: u64,
    bits: u32,
) -> GpioResult<()> {
    for i in (0..bits).rev() {
        let bit = (value >> i) & 1;
        driver.write_data(if bit == 1 { b'1' } else { b'0' })?;
    }
    Ok(())
}

fn print_hex<T: ?Sized + HD44780Driver>(driver: &mut T, value: u64, digits: u32) -> GpioResult<()> {
    for i in (0..digits).rev() {
        let nibble = (value >> (i * 4)) & 0xF;
        driver.write_data(HEX_DIGITS[nibble as usize])?;
    }
    Ok(())
}
