mod pcf8574;

use crate::{I2cError, I2cResult};
pub use pcf8574::*;
use std::fmt::Debug;

// HD44780 instruction set. The highest set bit selects the instruction, the
// bits below it are that instruction's flags.
const CLEAR_DISPLAY: u8 = 0x01;
const RETURN_HOME: u8 = 0x02;
const ENTRY_MODE_SET: u8 = 0x04;
const DISPLAY_CONTROL: u8 = 0x08;
const CURSOR_SHIFT: u8 = 0x10;
const FUNCTION_SET: u8 = 0x20;
const SET_CGRAM_ADDR: u8 = 0x40;
const SET_DDRAM_ADDR: u8 = 0x80;

// Instruction flags.
const ENTRY_INCREMENT: u8 = 0x02;
const ENTRY_SHIFT: u8 = 0x01;
const DISPLAY_ON: u8 = 0x04;
const CURSOR_ON: u8 = 0x02;
const BLINK_ON: u8 = 0x01;
const DISPLAY_MOVE: u8 = 0x08;
const MOVE_RIGHT: u8 = 0x04;
const DATA_LENGTH_8BIT: u8 = 0x10;
const TWO_LINES: u8 = 0x08;
const FONT_5X10: u8 = 0x04;

/// Command set of the HD44780 controller.
///
/// The provided methods encode the documented instructions; a bus-specific
/// driver only has to implement the two raw register writes.
pub trait Hd44780Driver: Debug {
    /// Clears the display and returns the cursor to the home position.
    fn clear_display(&mut self) -> I2cResult<()> {
        self.send_command(CLEAR_DISPLAY)
    }

    /// Returns the cursor to the home position, undoing any display shift.
    fn return_home(&mut self) -> I2cResult<()> {
        self.send_command(RETURN_HOME)
    }

    /// Sets the direction the address counter moves after each write, and
    /// whether the whole display shifts along with it.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> I2cResult<()> {
        let mut command = ENTRY_MODE_SET;
        if cursor_direction == CursorDirection::Right {
            command |= ENTRY_INCREMENT;
        }
        if shift {
            command |= ENTRY_SHIFT;
        }
        self.send_command(command)
    }

    /// Sets display on/off, cursor on/off and cursor blinking in one
    /// control-register write.
    ///
    /// The control register is write-only: every call must carry all three
    /// flags, the controller keeps nothing from previous writes.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> I2cResult<()> {
        let mut command = DISPLAY_CONTROL;
        if display_on {
            command |= DISPLAY_ON;
        }
        if cursor_on {
            command |= CURSOR_ON;
        }
        if blink_on {
            command |= BLINK_ON;
        }
        self.send_command(command)
    }

    /// Moves the cursor, or shifts the whole display, one position.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> I2cResult<()> {
        let mut command = CURSOR_SHIFT;
        if display_shift {
            command |= DISPLAY_MOVE;
        }
        if direction == CursorDirection::Right {
            command |= MOVE_RIGHT;
        }
        self.send_command(command)
    }

    /// Sets the interface width, line count and font.
    fn function_set(&mut self, data_length_8bit: bool, two_lines: bool, alt_font: bool) -> I2cResult<()> {
        let mut command = FUNCTION_SET;
        if data_length_8bit {
            command |= DATA_LENGTH_8BIT;
        }
        if two_lines {
            command |= TWO_LINES;
        }
        if alt_font {
            command |= FONT_5X10;
        }
        self.send_command(command)
    }

    /// Sets the CGRAM address. Subsequent data writes define glyph rows.
    fn set_cgram_address(&mut self, address: u8) -> I2cResult<()> {
        if address > 0b00111111 {
            return Err(I2cError::InvalidArgument);
        }
        self.send_command(SET_CGRAM_ADDR | address)
    }

    /// Sets the DDRAM address. Subsequent data writes put characters there.
    fn set_ddram_address(&mut self, address: u8) -> I2cResult<()> {
        if address > 0b01111111 {
            return Err(I2cError::InvalidArgument);
        }
        self.send_command(SET_DDRAM_ADDR | address)
    }

    // Raw register writes, implemented by the bus-specific driver.

    /// Writes `command` to the instruction register (RS low).
    fn send_command(&mut self, command: u8) -> I2cResult<()>;

    /// Writes `data` to the data register (RS high).
    fn send_data(&mut self, data: u8) -> I2cResult<()>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// The cursor moves to the left after writing data.
    Left,
    /// The cursor moves to the right after writing data.
    Right,
}
