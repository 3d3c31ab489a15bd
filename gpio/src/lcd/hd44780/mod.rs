//! HD44780 character LCD module.
//!
//! See [driver::HD44780Driver] for the controller interface and [driver::GpioHD44780Driver] for the
//! implementation bit-banging the parallel bus over plain GPIO lines. The [emulator] decodes
//! recorded bus activity back into the controller state, which is what the tests and dry runs look
//! at.

pub mod driver;
pub mod emulator;
