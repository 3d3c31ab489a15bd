//! Latch-level model of an HD44780 controller.
//!
//! [HD44780Emulator] watches the line activity recorded by
//! [MockGpioDriver](crate::mock::MockGpioDriver) for one display's wiring. Every falling edge of E
//! with RW low latches RS and the data lines, nibbles are paired up on the 4-bit interface, and the
//! resulting commands and characters are applied to a model of DDRAM, CGRAM and the control flags.
//! Nothing electrical is modelled, and reads are ignored.

use crate::lcd::hd44780::driver::{HD44780Pins, ROW_ADDRESSES, ROW_LENGTH};
use crate::mock::MockEvent;
use crate::PinAssignment;
use log::trace;
use std::collections::HashMap;

/// Visible characters per line on the panel.
pub const VISIBLE_COLUMNS: usize = 16;

/// What the controller saw on the bus at one falling edge of E.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Latch {
    pub rs: bool,
    /// `D7`..`D0`. Lines that aren't wired read as 0.
    pub data: u8,
}

/// A complete byte received by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Transfer {
    Command(u8),
    Data(u8),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AddressTarget {
    Ddram,
    Cgram,
}

/// The internal state of the controller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HD44780State {
    pub eight_bit: bool,
    pub two_lines: bool,
    pub display_on: bool,
    pub cursor_on: bool,
    pub blink_on: bool,
    /// Entry mode: address increments (or decrements) after each data write.
    pub increment: bool,
    /// Entry mode: the display shifts along with each data write.
    pub shift: bool,
    /// Address counter, pointing into [Self::target].
    pub address: u8,
    pub target: AddressTarget,
    /// How many cells the display is shifted to the left.
    pub display_offset: usize,
    /// Both lines, [ROW_LENGTH] cells each.
    pub ddram: [u8; 2 * ROW_LENGTH],
    pub cgram: [u8; 64],
}

impl Default for HD44780State {
    /// The state after the internal reset circuit ran.
    fn default() -> Self {
        HD44780State {
            eight_bit: true,
            two_lines: false,
            display_on: false,
            cursor_on: false,
            blink_on: false,
            increment: true,
            shift: false,
            address: 0,
            target: AddressTarget::Ddram,
            display_offset: 0,
            ddram: [b' '; 2 * ROW_LENGTH],
            cgram: [0; 64],
        }
    }
}

#[derive(Debug)]
pub struct HD44780Emulator {
    pins: HD44780Pins,
    levels: HashMap<PinAssignment, bool>,
    pending_nibble: Option<u8>,
    latches: Vec<Latch>,
    transfers: Vec<Transfer>,
    state: HD44780State,
}

impl HD44780Emulator {
    /// Creates an emulator for a display wired as `pins`, starting in the reset state.
    pub fn new(pins: HD44780Pins) -> Self {
        HD44780Emulator {
            pins,
            levels: HashMap::new(),
            pending_nibble: None,
            latches: Vec::new(),
            transfers: Vec::new(),
            state: HD44780State::default(),
        }
    }

    /// Puts the controller on the 4-bit interface, for following a log that starts after
    /// initialization.
    pub fn set_four_bit(&mut self) {
        self.state.eight_bit = false;
        self.pending_nibble = None;
    }

    pub fn feed_all(&mut self, events: &[MockEvent]) {
        for event in events {
            self.feed(event);
        }
    }

    /// Processes one recorded event. Events for lines not in the wiring only update their level.
    pub fn feed(&mut self, event: &MockEvent) {
        match *event {
            MockEvent::Configure { pin, .. } => {
                self.levels.insert(pin, false);
            }
            MockEvent::Write { pin, value } => {
                let was_high = self.level(pin);
                self.levels.insert(pin, value);
                if pin == self.pins.e && was_high && !value {
                    self.latch();
                }
            }
            MockEvent::Release { pin } => {
                self.levels.remove(&pin);
            }
            MockEvent::Delay(_) => {}
        }
    }

    /// Every latch seen so far, including both halves of bytes sent over the 4-bit interface.
    pub fn latches(&self) -> &[Latch] {
        &self.latches
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn state(&self) -> &HD44780State {
        &self.state
    }

    /// Gets the visible part of both lines, taking the display shift into account.
    ///
    /// Characters outside of printable ASCII, including the custom ones, show as `?`.
    pub fn lines(&self) -> [String; 2] {
        [0, 1].map(|row| {
            (0..VISIBLE_COLUMNS)
                .map(|col| {
                    let cell = (self.state.display_offset + col) % ROW_LENGTH;
                    match self.state.ddram[row * ROW_LENGTH + cell] {
                        c @ 0x20..=0x7E => c as char,
                        _ => '?',
                    }
                })
                .collect()
        })
    }

    fn level(&self, pin: PinAssignment) -> bool {
        self.levels.get(&pin).copied().unwrap_or(false)
    }

    fn latch(&mut self) {
        if self.level(self.pins.rw) {
            trace!("Ignoring read latch");
            return;
        }

        let rs = self.level(self.pins.rs);
        let data = self
            .pins
            .data
            .as_slice()
            .iter()
            .enumerate()
            .filter(|&(_, &pin)| self.level(pin))
            .fold(0u8, |byte, (i, _)| byte | (0x80 >> i));
        self.latches.push(Latch { rs, data });

        if self.state.eight_bit {
            self.receive(rs, data);
        } else if let Some(high) = self.pending_nibble.take() {
            self.receive(rs, high | (data >> 4));
        } else {
            self.pending_nibble = Some(data & 0xF0);
        }
    }

    fn receive(&mut self, rs: bool, byte: u8) {
        trace!("Received {:08b}, RS: {}", byte, rs);
        if rs {
            self.transfers.push(Transfer::Data(byte));
            self.write_data(byte);
        } else {
            self.transfers.push(Transfer::Command(byte));
            self.execute(byte);
        }
    }

    fn execute(&mut self, command: u8) {
        let state = &mut self.state;
        match command.leading_zeros() {
            0 => {
                state.target = AddressTarget::Ddram;
                state.address = command & 0x7F;
            }
            1 => {
                state.target = AddressTarget::Cgram;
                state.address = command & 0x3F;
            }
            2 => {
                state.eight_bit = command & 0b10000 != 0;
                state.two_lines = command & 0b01000 != 0;
            }
            3 => {
                let right = command & 0b0100 != 0;
                if command & 0b1000 != 0 {
                    self.shift_display(right);
                } else {
                    self.step_address(right);
                }
            }
            4 => {
                state.display_on = command & 0b100 != 0;
                state.cursor_on = command & 0b010 != 0;
                state.blink_on = command & 0b001 != 0;
            }
            5 => {
                state.increment = command & 0b10 != 0;
                state.shift = command & 0b01 != 0;
            }
            6 => {
                state.target = AddressTarget::Ddram;
                state.address = 0;
                state.display_offset = 0;
            }
            7 => {
                state.ddram = [b' '; 2 * ROW_LENGTH];
                state.target = AddressTarget::Ddram;
                state.address = 0;
                state.display_offset = 0;
                state.increment = true;
            }
            _ => trace!("Ignoring NUL command"),
        }
    }

    fn write_data(&mut self, byte: u8) {
        match self.state.target {
            AddressTarget::Ddram => {
                let index = ddram_index(self.state.address);
                self.state.ddram[index] = byte;
                if self.state.shift {
                    // Shifting left keeps the cursor in place while writing forward
                    self.shift_display(!self.state.increment);
                }
            }
            AddressTarget::Cgram => {
                self.state.cgram[self.state.address as usize] = byte;
            }
        }
        self.step_address(self.state.increment);
    }

    fn step_address(&mut self, forward: bool) {
        let state = &mut self.state;
        state.address = match state.target {
            AddressTarget::Cgram => {
                if forward {
                    (state.address + 1) & 0x3F
                } else {
                    state.address.wrapping_sub(1) & 0x3F
                }
            }
            AddressTarget::Ddram => {
                let index = ddram_index(state.address);
                let len = 2 * ROW_LENGTH;
                let index = if forward {
                    (index + 1) % len
                } else {
                    (index + len - 1) % len
                };
                ddram_address(index)
            }
        };
    }

    fn shift_display(&mut self, right: bool) {
        let offset = &mut self.state.display_offset;
        *offset = if right {
            (*offset + ROW_LENGTH - 1) % ROW_LENGTH
        } else {
            (*offset + 1) % ROW_LENGTH
        };
    }
}

/// Maps a DDRAM address to a cell. Addresses past the end of a line land on its last cell.
fn ddram_index(address: u8) -> usize {
    let row = if address >= ROW_ADDRESSES[1] { 1 } else { 0 };
    let col = ((address - ROW_ADDRESSES[row]) as usize).min(ROW_LENGTH - 1);
    row * ROW_LENGTH + col
}

fn ddram_address(index: usize) -> u8 {
    ROW_ADDRESSES[index / ROW_LENGTH] + (index % ROW_LENGTH) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const E: PinAssignment = PinAssignment::new(0, 2);

    fn p(port: usize, pin: usize) -> PinAssignment {
        PinAssignment::new(port, pin)
    }

    fn pins() -> HD44780Pins {
        HD44780Pins::four_bit(p(0, 0), p(0, 1), E, [p(1, 3), p(1, 2), p(1, 1), p(1, 0)])
    }

    fn write(pin: PinAssignment, value: bool) -> MockEvent {
        MockEvent::Write { pin, value }
    }

    /// Events putting `nibble` on the bus with RS as given, followed by an E pulse.
    fn nibble(rs: bool, nibble: u8) -> Vec<MockEvent> {
        let mut events = vec![write(p(0, 0), rs)];
        for (i, pin) in [p(1, 3), p(1, 2), p(1, 1), p(1, 0)].into_iter().enumerate() {
            events.push(write(pin, nibble & (0b1000 >> i) != 0));
        }
        events.push(write(E, true));
        events.push(write(E, false));
        events
    }

    fn byte(emulator: &mut HD44780Emulator, rs: bool, byte: u8) {
        emulator.feed_all(&nibble(rs, byte >> 4));
        emulator.feed_all(&nibble(rs, byte & 0x0F));
    }

    fn four_bit_emulator() -> HD44780Emulator {
        let mut emulator = HD44780Emulator::new(pins());
        emulator.set_four_bit();
        emulator
    }

    #[test]
    fn starts_in_reset_state() {
        let emulator = HD44780Emulator::new(pins());
        let state = emulator.state();
        assert!(state.eight_bit);
        assert!(!state.display_on);
        assert!(state.increment);
        assert_eq!(emulator.lines(), [" ".repeat(16), " ".repeat(16)]);
    }

    #[test]
    fn latches_only_on_falling_edge_of_e() {
        let mut emulator = HD44780Emulator::new(pins());
        emulator.feed(&write(E, false));
        emulator.feed(&write(E, true));
        assert!(emulator.latches().is_empty());
        emulator.feed(&write(E, false));
        assert_eq!(emulator.latches(), &[Latch { rs: false, data: 0 }]);
    }

    #[test]
    fn reads_are_ignored() {
        let mut emulator = HD44780Emulator::new(pins());
        emulator.feed(&write(p(0, 1), true));
        emulator.feed_all(&nibble(false, 0b0011));
        assert!(emulator.latches().is_empty());
    }

    #[test]
    fn switching_to_four_bit_pairs_nibbles() {
        let mut emulator = HD44780Emulator::new(pins());
        emulator.feed_all(&nibble(false, 0b0010));
        assert!(!emulator.state().eight_bit);

        byte(&mut emulator, false, 0x28);
        assert!(emulator.state().two_lines);
        assert_eq!(emulator.transfers(), &[Transfer::Command(0x20), Transfer::Command(0x28)]);
    }

    #[test]
    fn data_is_written_at_the_address_counter() {
        let mut emulator = four_bit_emulator();
        for &c in b"Hi" {
            byte(&mut emulator, true, c);
        }
        byte(&mut emulator, false, 0xC0 | 3);
        byte(&mut emulator, true, b'!');

        assert_eq!(
            emulator.lines(),
            ["Hi              ".to_string(), "   !            ".to_string()]
        );
        assert_eq!(emulator.state().address, 0x44);
    }

    #[test]
    fn end_of_first_line_wraps_to_second() {
        let mut emulator = four_bit_emulator();
        byte(&mut emulator, false, 0x80 | 39);
        byte(&mut emulator, true, b'a');
        assert_eq!(emulator.state().address, 0x40);
        byte(&mut emulator, false, 0xC0 | 39);
        byte(&mut emulator, true, b'b');
        assert_eq!(emulator.state().address, 0x00);
    }

    #[test]
    fn cursor_shift_moves_the_address_counter() {
        let mut emulator = four_bit_emulator();
        byte(&mut emulator, true, b'x');
        byte(&mut emulator, false, 0x10);
        byte(&mut emulator, true, b'y');
        assert_eq!(emulator.lines()[0].trim_end(), "y");
        byte(&mut emulator, false, 0x14);
        assert_eq!(emulator.state().address, 2);
    }

    #[test]
    fn display_shift_scrolls_the_visible_window() {
        let mut emulator = four_bit_emulator();
        for &c in b"abc" {
            byte(&mut emulator, true, c);
        }
        byte(&mut emulator, false, 0x18);
        assert_eq!(emulator.state().display_offset, 1);
        assert!(emulator.lines()[0].starts_with("bc "));
        byte(&mut emulator, false, 0x1C);
        byte(&mut emulator, false, 0x1C);
        assert_eq!(emulator.state().display_offset, ROW_LENGTH - 1);
        assert!(emulator.lines()[0].starts_with(" abc"));
    }

    #[test]
    fn clear_and_home() {
        let mut emulator = four_bit_emulator();
        byte(&mut emulator, false, 0x04);
        byte(&mut emulator, false, 0x85);
        byte(&mut emulator, true, b'z');
        assert_eq!(emulator.state().address, 4);

        byte(&mut emulator, false, 0x02);
        assert_eq!(emulator.state().address, 0);
        assert_eq!(emulator.lines()[0].trim(), "z");

        byte(&mut emulator, false, 0x01);
        assert_eq!(emulator.lines()[0].trim(), "");
        assert!(emulator.state().increment);
    }

    #[test]
    fn display_control_flags() {
        let mut emulator = four_bit_emulator();
        byte(&mut emulator, false, 0x0E);
        let state = emulator.state();
        assert!(state.display_on && state.cursor_on && !state.blink_on);
    }

    #[test]
    fn custom_characters_land_in_cgram() {
        let mut emulator = four_bit_emulator();
        byte(&mut emulator, false, 0x40 | 8);
        byte(&mut emulator, true, 0b10101);
        byte(&mut emulator, true, 0b01010);
        assert_eq!(emulator.state().target, AddressTarget::Cgram);
        assert_eq!(&emulator.state().cgram[8..10], &[0b10101, 0b01010]);

        byte(&mut emulator, false, 0x80);
        byte(&mut emulator, true, 1);
        assert_eq!(emulator.lines()[0].chars().next(), Some('?'));
    }

    #[test]
    fn eight_bit_wiring_latches_whole_bytes() {
        let data = [7, 6, 5, 4, 3, 2, 1, 0].map(|pin| p(1, pin));
        let pins = HD44780Pins::eight_bit(p(0, 0), p(0, 1), E, data);
        let mut emulator = HD44780Emulator::new(pins);
        emulator.feed(&write(p(0, 0), true));
        for (i, pin) in data.into_iter().enumerate() {
            emulator.feed(&write(pin, b'K' & (0x80 >> i) != 0));
        }
        emulator.feed(&write(E, true));
        emulator.feed(&write(E, false));
        assert_eq!(emulator.transfers(), &[Transfer::Data(b'K')]);
        assert!(emulator.lines()[0].starts_with('K'));
    }

    #[test]
    fn ddram_addresses_map_to_cells() {
        assert_eq!(ddram_index(0x00), 0);
        assert_eq!(ddram_index(0x27), 39);
        assert_eq!(ddram_index(0x30), 39);
        assert_eq!(ddram_index(0x40), 40);
        assert_eq!(ddram_address(40), 0x40);
        assert_eq!(ddram_address(79), 0x67);
    }
}
