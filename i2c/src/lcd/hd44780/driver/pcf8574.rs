use crate::lcd::hd44780::driver::{CursorDirection, Hd44780Driver};
use crate::{I2cBus, I2cDriver, I2cError, I2cResult};
use log::{debug, info, trace, warn};
use std::thread::sleep;
use std::time::Duration;

/// Factory-default slave address of the PCF8574 backpack.
pub const DEFAULT_ADDRESS: u8 = 0x27;

// PCF8574 port mapping: P0 = RS, P2 = E, P3 = backlight, P4..P7 = D4..D7.
const REGISTER_SELECT: u8 = 0x01;
const ENABLE: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

// DDRAM base address of each display row. Rows 2 and 3 continue rows 0 and 1
// within the controller's 40-byte lines, hence the interleaved offsets.
const ROW_ADDRESSES: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

// The controller ignores writes arriving faster than its execute cycle.
const SETTLE_TIME: Duration = Duration::from_millis(2);

/// HD44780 display behind a PCF8574 I2C expander.
///
/// Borrows an [`I2cDriver`] at construction; no bus I/O happens until
/// [`Self::begin`] opens the connection and runs the controller's 4-bit-mode
/// handshake. [`Self::close`] releases the connection and allows a later
/// `begin` to start over.
#[derive(Debug)]
pub struct I2cHD44780Driver<'a> {
    i2c: &'a dyn I2cDriver,
    address: u8,
    cols: u8,
    rows: u8,
    bus: Option<Box<dyn I2cBus + 'a>>,
    backlight: bool,
    cursor: bool,
    blink: bool,
}

impl<'a> I2cHD44780Driver<'a> {
    /// Creates a driver for a 16x2 display at the default backpack address.
    pub fn new(i2c: &'a dyn I2cDriver) -> Self {
        I2cHD44780Driver {
            i2c,
            address: DEFAULT_ADDRESS,
            cols: 16,
            rows: 2,
            bus: None,
            backlight: true,
            cursor: false,
            blink: false,
        }
    }

    /// Sets the expander's slave address.
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Sets the display geometry.
    pub fn with_geometry(mut self, cols: u8, rows: u8) -> Self {
        self.cols = cols;
        self.rows = rows;
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    /// Whether [`Self::begin`] has completed and the connection is open.
    pub fn is_initialized(&self) -> bool {
        self.bus.is_some()
    }

    /// Character that [`Self::print`] will send as the byte `code`.
    ///
    /// Useful for embedding CGRAM glyphs (codes 0..=7, see
    /// [`Self::create_char`]) in a string.
    pub fn glyph(code: u8) -> char {
        code as char
    }

    /// Opens the bus and initializes the controller.
    ///
    /// # Errors
    /// - `I2cError::AlreadyInitialized` if `begin` already ran without a
    ///   `close` in between.
    pub fn begin(&mut self) -> I2cResult<()> {
        if self.bus.is_some() {
            return Err(I2cError::AlreadyInitialized);
        }

        debug!("Opening bus for LCD at 0x{:02x}", self.address);
        self.bus = Some(self.i2c.open(self.address)?);
        self.backlight = true;
        self.cursor = false;
        self.blink = false;

        // Synchronize: the controller powers up in 8-bit mode and latches
        // one nibble per strobe here, so this fixed sequence lands it in
        // 4-bit, 2-line mode regardless of its prior state.
        self.write4(0x33, false)?;
        self.write4(0x32, false)?;
        self.write4(0x06, false)?;
        self.write4(0x28, false)?;
        self.write4(0x01, false)?;
        self.write4(0x2C, false)?;

        self.set_display_control(true, false, false)?;
        self.set_entry_mode(CursorDirection::Right, false)?;
        self.clear_display()?;
        // Data write whose payload is the backlight bit itself; any write
        // would do, the transaction is what re-asserts the backlight line.
        self.send_data(BACKLIGHT)?;

        info!(
            "LCD at 0x{:02x} initialized ({}x{})",
            self.address, self.cols, self.rows
        );
        Ok(())
    }

    /// Releases the bus connection. A later [`Self::begin`] re-runs the
    /// initialization handshake.
    pub fn close(&mut self) -> I2cResult<()> {
        self.ensure_open()?;
        debug!("Closing bus for LCD at 0x{:02x}", self.address);
        // Dropping the handle closes the device.
        self.bus = None;
        Ok(())
    }

    /// Moves the cursor to the zero-based (column, row) position.
    ///
    /// Columns past the visible area are allowed (the DDRAM lines are 40
    /// bytes wide); rows outside the configured geometry are rejected.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> I2cResult<()> {
        self.ensure_open()?;
        if row >= self.rows || row as usize >= ROW_ADDRESSES.len() {
            return Err(I2cError::InvalidArgument);
        }
        let address = ROW_ADDRESSES[row as usize]
            .checked_add(col)
            .ok_or(I2cError::InvalidArgument)?;
        self.set_ddram_address(address)
    }

    /// Returns the cursor to the top-left corner without clearing content.
    pub fn home(&mut self) -> I2cResult<()> {
        self.set_ddram_address(0)
    }

    /// Writes `text` at the current cursor position. No wrapping: writes run
    /// off the visible row if the text is longer than the remaining columns.
    pub fn print(&mut self, text: &str) -> I2cResult<()> {
        self.ensure_open()?;
        for c in text.chars() {
            if (c as u32) <= 0xFF {
                self.send_data(c as u8)?;
            } else {
                warn!("Character {:?} does not fit the display charset", c);
                self.send_data(b'?')?;
            }
        }
        Ok(())
    }

    /// Repositions to the start of `row` and prints `text` truncated to the
    /// configured column count.
    pub fn print_line(&mut self, row: u8, text: &str) -> I2cResult<()> {
        self.set_cursor(0, row)?;
        let end = text
            .char_indices()
            .nth(self.cols as usize)
            .map_or(text.len(), |(i, _)| i);
        self.print(&text[..end])
    }

    /// Shows the underline cursor.
    pub fn cursor(&mut self) -> I2cResult<()> {
        self.ensure_open()?;
        self.cursor = true;
        self.set_display_control(true, self.cursor, self.blink)
    }

    /// Hides the underline cursor.
    pub fn no_cursor(&mut self) -> I2cResult<()> {
        self.ensure_open()?;
        self.cursor = false;
        self.set_display_control(true, self.cursor, self.blink)
    }

    /// Blinks the character cell at the cursor position.
    pub fn blink(&mut self) -> I2cResult<()> {
        self.ensure_open()?;
        self.blink = true;
        self.set_display_control(true, self.cursor, self.blink)
    }

    /// Stops blinking the cursor cell.
    pub fn no_blink(&mut self) -> I2cResult<()> {
        self.ensure_open()?;
        self.blink = false;
        self.set_display_control(true, self.cursor, self.blink)
    }

    /// Turns the display and the backlight on.
    ///
    /// The backlight bit rides along on every expander write, so the latch
    /// set here affects all subsequent transactions.
    pub fn display(&mut self) -> I2cResult<()> {
        self.ensure_open()?;
        self.backlight = true;
        self.set_display_control(true, self.cursor, self.blink)
    }

    /// Turns the display and the backlight off.
    pub fn no_display(&mut self) -> I2cResult<()> {
        self.ensure_open()?;
        self.backlight = false;
        self.set_display_control(false, self.cursor, self.blink)
    }

    /// Shifts the whole display contents one position to the left.
    pub fn scroll_display_left(&mut self) -> I2cResult<()> {
        self.cursor_shift(true, CursorDirection::Left)
    }

    /// Shifts the whole display contents one position to the right.
    pub fn scroll_display_right(&mut self) -> I2cResult<()> {
        self.cursor_shift(true, CursorDirection::Right)
    }

    /// Text flows left to right (the default).
    pub fn left_to_right(&mut self) -> I2cResult<()> {
        self.set_entry_mode(CursorDirection::Right, false)
    }

    /// Text flows right to left.
    pub fn right_to_left(&mut self) -> I2cResult<()> {
        self.set_entry_mode(CursorDirection::Left, false)
    }

    /// Uploads a 5x8 glyph bitmap into one of the eight CGRAM slots.
    ///
    /// `slot` is masked to 0..=7. Each `pattern` byte is one glyph row, top
    /// to bottom, low five bits used. Print the glyph afterwards via
    /// [`Self::glyph`].
    pub fn create_char(&mut self, slot: u8, pattern: [u8; 8]) -> I2cResult<()> {
        self.ensure_open()?;
        let slot = slot & 0b111;
        self.set_cgram_address(slot << 3)?;
        for row in pattern {
            self.send_data(row)?;
        }
        // The address counter now points into CGRAM; redirect subsequent
        // writes back to the display RAM.
        self.set_ddram_address(0)
    }

    fn ensure_open(&self) -> I2cResult<()> {
        if self.bus.is_none() {
            return Err(I2cError::NotInitialized);
        }
        Ok(())
    }

    /// Emits the high nibble of `data` with the current backlight latch and
    /// the register-select bit, strobing enable low-high-low.
    fn write4(&mut self, data: u8, rs: bool) -> I2cResult<()> {
        let mut byte = data & 0xF0;
        if self.backlight {
            byte |= BACKLIGHT;
        }
        if rs {
            byte |= REGISTER_SELECT;
        }

        let bus = self.bus.as_mut().ok_or(I2cError::NotInitialized)?;
        bus.write(&[byte])?;
        bus.write(&[byte | ENABLE])?;
        bus.write(&[byte])?;
        sleep(SETTLE_TIME);
        Ok(())
    }

    /// Sends a full byte as two nibble writes, high nibble first.
    fn write(&mut self, data: u8, rs: bool) -> I2cResult<()> {
        trace!("Sending byte: {:08b}, RS: {}", data, rs);
        self.write4(data, rs)?;
        self.write4(data << 4, rs)
    }
}

impl Hd44780Driver for I2cHD44780Driver<'_> {
    fn send_command(&mut self, command: u8) -> I2cResult<()> {
        self.write(command, false)
    }

    fn send_data(&mut self, data: u8) -> I2cResult<()> {
        self.write(data, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct MockI2cDriver {
        written: Rc<RefCell<Vec<u8>>>,
        opened: RefCell<u32>,
    }

    impl MockI2cDriver {
        fn transactions(&self) -> Vec<u8> {
            self.written.borrow().clone()
        }

        fn clear(&self) {
            self.written.borrow_mut().clear();
        }
    }

    impl I2cDriver for MockI2cDriver {
        fn open(&self, _address: u8) -> I2cResult<Box<dyn I2cBus + '_>> {
            *self.opened.borrow_mut() += 1;
            Ok(Box::new(MockI2cBus {
                written: Rc::clone(&self.written),
            }))
        }
    }

    #[derive(Debug)]
    struct MockI2cBus {
        written: Rc<RefCell<Vec<u8>>>,
    }

    impl I2cBus for MockI2cBus {
        fn write(&mut self, data: &[u8]) -> I2cResult<()> {
            self.written.borrow_mut().extend_from_slice(data);
            Ok(())
        }
    }

    /// Begins the display and drops the handshake transactions from the log.
    fn init_lcd(mock: &MockI2cDriver) -> I2cHD44780Driver<'_> {
        let mut lcd = I2cHD44780Driver::new(mock);
        lcd.begin().unwrap();
        mock.clear();
        lcd
    }

    /// Reassembles full register writes from the transaction log: every six
    /// single-byte transactions are one byte (two nibbles, each strobed
    /// low-high-low). Returns (byte, rs) pairs.
    fn decode(transactions: &[u8]) -> Vec<(u8, bool)> {
        assert_eq!(transactions.len() % 6, 0);
        transactions
            .chunks(6)
            .map(|chunk| {
                let high = chunk[0] & 0xF0;
                let low = chunk[3] & 0xF0;
                (high | (low >> 4), chunk[0] & REGISTER_SELECT != 0)
            })
            .collect()
    }

    #[test]
    fn begin_runs_init_handshake() {
        let mock = MockI2cDriver::default();
        let mut lcd = I2cHD44780Driver::new(&mock);
        lcd.begin().unwrap();
        assert!(lcd.is_initialized());

        let log = mock.transactions();
        // Six raw nibbles, then four full command/data bytes.
        assert_eq!(log.len(), 6 * 3 + 4 * 6);
        // Sync nibbles 0x33, 0x32, 0x06, 0x28, 0x01, 0x2C; backlight bit
        // (0x08) is set throughout, enable (0x04) strobes in the middle.
        #[rustfmt::skip]
        let handshake = [
            0x38, 0x3C, 0x38,
            0x38, 0x3C, 0x38,
            0x08, 0x0C, 0x08,
            0x28, 0x2C, 0x28,
            0x08, 0x0C, 0x08,
            0x28, 0x2C, 0x28,
        ];
        assert_eq!(log[..18], handshake);
        // Display control, entry mode, clear, backlight-on data write.
        assert_eq!(
            decode(&log[18..]),
            vec![(0x0C, false), (0x06, false), (0x01, false), (0x08, true)]
        );
    }

    #[test]
    fn begin_twice_fails_without_bus_traffic() {
        let mock = MockI2cDriver::default();
        let mut lcd = I2cHD44780Driver::new(&mock);
        lcd.begin().unwrap();
        let after_first = mock.transactions().len();

        assert_eq!(lcd.begin(), Err(I2cError::AlreadyInitialized));
        assert_eq!(mock.transactions().len(), after_first);
        assert_eq!(*mock.opened.borrow(), 1);
    }

    #[test]
    fn operations_before_begin_fail_without_bus_traffic() {
        let mock = MockI2cDriver::default();
        let mut lcd = I2cHD44780Driver::new(&mock);

        assert_eq!(lcd.clear_display(), Err(I2cError::NotInitialized));
        assert_eq!(lcd.print("hi"), Err(I2cError::NotInitialized));
        assert_eq!(lcd.print(""), Err(I2cError::NotInitialized));
        assert_eq!(lcd.print_line(0, "hi"), Err(I2cError::NotInitialized));
        assert_eq!(lcd.set_cursor(0, 0), Err(I2cError::NotInitialized));
        assert_eq!(lcd.cursor(), Err(I2cError::NotInitialized));
        assert_eq!(lcd.no_display(), Err(I2cError::NotInitialized));
        assert_eq!(lcd.create_char(0, [0; 8]), Err(I2cError::NotInitialized));
        assert_eq!(lcd.close(), Err(I2cError::NotInitialized));
        assert!(mock.transactions().is_empty());
    }

    #[test]
    fn close_releases_and_begin_restarts() {
        let mock = MockI2cDriver::default();
        let mut lcd = I2cHD44780Driver::new(&mock);
        lcd.begin().unwrap();
        let handshake = mock.transactions();

        lcd.close().unwrap();
        assert!(!lcd.is_initialized());
        assert_eq!(lcd.clear_display(), Err(I2cError::NotInitialized));

        mock.clear();
        lcd.begin().unwrap();
        assert_eq!(mock.transactions(), handshake);
        assert_eq!(*mock.opened.borrow(), 2);
    }

    #[test]
    fn byte_write_emits_six_transactions() {
        let mock = MockI2cDriver::default();
        let mut lcd = init_lcd(&mock);

        lcd.send_data(b'h').unwrap();
        let log = mock.transactions();
        assert_eq!(log.len(), 6);
        // 'h' = 0x68: high nibble 0x6, low nibble 0x8, backlight and RS set.
        assert_eq!(log, vec![0x69, 0x6D, 0x69, 0x89, 0x8D, 0x89]);
        // Within each nibble the three transactions differ only in enable.
        for nibble in log.chunks(3) {
            assert_eq!(nibble[0], nibble[2]);
            assert_eq!(nibble[1], nibble[0] | ENABLE);
        }
    }

    #[test]
    fn set_cursor_addresses_ddram() {
        let mock = MockI2cDriver::default();
        let mut lcd = init_lcd(&mock);

        lcd.set_cursor(3, 1).unwrap();
        lcd.print("X").unwrap();
        assert_eq!(
            decode(&mock.transactions()),
            vec![(0x80 | (0x40 + 3), false), (b'X', true)]
        );
    }

    #[test]
    fn set_cursor_covers_all_four_row_bases() {
        let mock = MockI2cDriver::default();
        let mut lcd = I2cHD44780Driver::new(&mock).with_geometry(20, 4);
        lcd.begin().unwrap();
        mock.clear();

        for row in 0..4u8 {
            lcd.set_cursor(7, row).unwrap();
        }
        let expected: Vec<(u8, bool)> = [0x00u8, 0x40, 0x14, 0x54]
            .iter()
            .map(|base| (0x80 | (base + 7), false))
            .collect();
        assert_eq!(decode(&mock.transactions()), expected);
    }

    #[test]
    fn set_cursor_rejects_out_of_range_row() {
        let mock = MockI2cDriver::default();
        let mut lcd = init_lcd(&mock);

        assert_eq!(lcd.set_cursor(0, 2), Err(I2cError::InvalidArgument));
        assert_eq!(lcd.print_line(2, "nope"), Err(I2cError::InvalidArgument));
        assert!(mock.transactions().is_empty());
    }

    #[test]
    fn cursor_and_blink_flags_are_latched_together() {
        let mock = MockI2cDriver::default();
        let mut lcd = init_lcd(&mock);

        lcd.cursor().unwrap();
        lcd.blink().unwrap();
        // Turning the cursor back off must leave blink set.
        lcd.no_cursor().unwrap();
        lcd.no_blink().unwrap();
        assert_eq!(
            decode(&mock.transactions()),
            vec![(0x0E, false), (0x0F, false), (0x0D, false), (0x0C, false)]
        );
    }

    #[test]
    fn no_display_drops_backlight_from_every_transaction() {
        let mock = MockI2cDriver::default();
        let mut lcd = init_lcd(&mock);

        lcd.no_display().unwrap();
        assert_eq!(decode(&mock.transactions()), vec![(0x08, false)]);
        assert!(mock.transactions().iter().all(|t| t & BACKLIGHT == 0));

        mock.clear();
        lcd.clear_display().unwrap();
        assert!(mock.transactions().iter().all(|t| t & BACKLIGHT == 0));

        mock.clear();
        lcd.display().unwrap();
        assert_eq!(decode(&mock.transactions()), vec![(0x0C, false)]);
        assert!(mock.transactions().iter().all(|t| t & BACKLIGHT != 0));
    }

    #[test]
    fn print_line_truncates_to_configured_columns() {
        let mock = MockI2cDriver::default();
        let mut lcd = init_lcd(&mock);

        lcd.print_line(0, "Hello, world! this is long").unwrap();
        let decoded = decode(&mock.transactions());
        // One DDRAM address write, then exactly 16 character writes.
        assert_eq!(decoded.len(), 17);
        assert_eq!(decoded[0], (0x80, false));
        let printed: Vec<u8> = decoded[1..].iter().map(|&(byte, _)| byte).collect();
        assert_eq!(printed, b"Hello, world! th");
        assert!(decoded[1..].iter().all(|&(_, rs)| rs));
    }

    #[test]
    fn print_substitutes_unmappable_characters() {
        let mock = MockI2cDriver::default();
        let mut lcd = init_lcd(&mock);

        lcd.print("a\u{2603}b").unwrap();
        let printed: Vec<u8> = decode(&mock.transactions())
            .iter()
            .map(|&(byte, _)| byte)
            .collect();
        assert_eq!(printed, b"a?b");
    }

    #[test]
    fn create_char_clamps_slot_and_restores_ddram() {
        let mock = MockI2cDriver::default();
        let mut lcd = init_lcd(&mock);

        let pattern = [0x00, 0x0A, 0x1F, 0x1F, 0x0E, 0x04, 0x00, 0x00];
        lcd.create_char(8, pattern).unwrap();

        let decoded = decode(&mock.transactions());
        // Slot 8 wraps to slot 0.
        assert_eq!(decoded[0], (0x40, false));
        for (i, &row) in pattern.iter().enumerate() {
            assert_eq!(decoded[1 + i], (row, true));
        }
        assert_eq!(decoded[9], (0x80, false));
    }

    #[test]
    fn command_encodings() {
        let mock = MockI2cDriver::default();
        let mut lcd = init_lcd(&mock);

        lcd.home().unwrap();
        lcd.scroll_display_left().unwrap();
        lcd.scroll_display_right().unwrap();
        lcd.left_to_right().unwrap();
        lcd.right_to_left().unwrap();
        lcd.return_home().unwrap();
        lcd.function_set(false, true, false).unwrap();
        assert_eq!(
            decode(&mock.transactions()),
            vec![
                (0x80, false),
                (0x18, false),
                (0x1C, false),
                (0x06, false),
                (0x04, false),
                (0x02, false),
                (0x28, false),
            ]
        );
    }

    #[test]
    fn glyph_maps_codes_to_chars() {
        assert_eq!(I2cHD44780Driver::glyph(0), '\u{0}');
        assert_eq!(I2cHD44780Driver::glyph(7), '\u{7}');
        assert_eq!(I2cHD44780Driver::glyph(b'A'), 'A');
    }
}
