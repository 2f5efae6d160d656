use dotenv::dotenv;
use log::{debug, info};
use pilcd_i2c::dev::LinuxI2cDriver;
use pilcd_i2c::lcd::hd44780::driver::{Hd44780Driver, I2cHD44780Driver, DEFAULT_ADDRESS};
use std::env::var;
use std::thread::sleep;
use std::time::Duration;
use sysinfo::System;

/// Reads a numeric env var, accepting `0x`-prefixed hex. Unset means default.
fn env_u8(name: &str, default: u8) -> eyre::Result<u8> {
    match var(name) {
        Ok(s) => {
            let s = s.trim().to_string();
            let value = match s.strip_prefix("0x") {
                Some(hex) => u8::from_str_radix(hex, 16)?,
                None => s.parse()?,
            };
            Ok(value)
        }
        Err(_) => Ok(default),
    }
}

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR)
    );

    let bus_no = env_u8("PILCD_I2C_BUS", 1)?;
    let address = env_u8("PILCD_LCD_ADDRESS", DEFAULT_ADDRESS)?;
    let cols = env_u8("PILCD_LCD_COLS", 16)?;
    let rows = env_u8("PILCD_LCD_ROWS", 2)?;

    info!(
        "LCD @ bus {}, address 0x{:02x}, {}x{}",
        bus_no, address, cols, rows
    );

    let i2c = LinuxI2cDriver::new(bus_no);
    debug!("{:?} initialized.", i2c);

    debug!("Initializing LCD driver...");
    let mut lcd = I2cHD44780Driver::new(&i2c)
        .with_address(address)
        .with_geometry(cols, rows);
    lcd.begin()?;

    // Heart glyph in CGRAM slot 0.
    lcd.create_char(
        0,
        [0x00, 0x0A, 0x1F, 0x1F, 0x0E, 0x04, 0x00, 0x00],
    )?;

    lcd.print_line(0, "pilcd smoke test")?;
    lcd.set_cursor(0, 1)?;
    lcd.print(&format!("Rust {}", I2cHD44780Driver::glyph(0)))?;

    lcd.cursor()?;
    lcd.blink()?;
    sleep(Duration::from_secs(2));
    lcd.no_blink()?;
    lcd.no_cursor()?;

    for count in 0..30 {
        lcd.print_line(1, &format!("count: {}", count))?;
        sleep(Duration::from_secs(1));
    }

    for _ in 0..cols {
        lcd.scroll_display_left()?;
        sleep(Duration::from_millis(250));
    }

    lcd.clear_display()?;
    lcd.print_line(0, "bye")?;
    lcd.close()?;
    Ok(())
}
