#![no_std]

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

/// HD44780 compatible character LCD driven in 4-bit mode behind an I2C
/// port expander.
///
/// The expander port carries the four data lines in the low nibble, the
/// register-select line on bit 5 and the enable strobe on bit 6. Every
/// byte reaching the controller is split into two nibbles and each
/// nibble is clocked in by pulsing the enable bit.
pub struct I2cLcd<I2C, D> {
    i2c: I2C,
    address: u8,
    delay: D,
}

/// Enable strobe bit on the expander port.
const ENABLE: u8 = 0b0100_0000;
/// Register-select mask for command transfers.
const COMMAND: u8 = 0b0000_0000;
/// Register-select mask for data transfers.
const DATA: u8 = 0b0010_0000;
/// Nibble that switches the controller into 4-bit mode.
const INIT_4BIT_MODE: u8 = 0b0000_0010;

// HD44780 command set used by the init sequence.
const FUNCTION_SET_4BIT_2LINE: u8 = 0x28;
const DISPLAY_ON: u8 = 0x0C;
const ENTRY_MODE_INCREMENT: u8 = 0x06;
const CLEAR_DISPLAY: u8 = 0x01;
const CURSOR_ON_BLINK: u8 = 0x0F;

/// Settle time after a command.
const COMMAND_SETTLE_MS: u32 = 5;

impl<I2C, D, E> I2cLcd<I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
{
    /// Create a new instance and run the init sequence.
    pub fn new(i2c: I2C, address: u8, delay: D) -> Result<Self, E> {
        let mut lcd = I2cLcd { i2c, address, delay };
        lcd.initialize()?;
        Ok(lcd)
    }

    /// Switch the controller into 4-bit mode and configure the display.
    pub fn initialize(&mut self) -> Result<(), E> {
        self.write_raw(INIT_4BIT_MODE)?;
        self.write_command(FUNCTION_SET_4BIT_2LINE)?;
        self.write_command(DISPLAY_ON)?;
        self.write_command(ENTRY_MODE_INCREMENT)?;
        self.write_command(CLEAR_DISPLAY)?;
        self.write_command(CURSOR_ON_BLINK)?;
        Ok(())
    }

    /// Print a string at the current cursor position.
    pub fn write_str(&mut self, text: &str) -> Result<(), E> {
        for byte in text.bytes() {
            self.write_data(byte)?;
        }
        Ok(())
    }

    /// Clear the display and return the cursor home.
    pub fn clear(&mut self) -> Result<(), E> {
        self.write_command(CLEAR_DISPLAY)
    }

    /// Clock one port byte into the controller: enable high, then low.
    ///
    /// Public so applications can drive extra expander lines (backlight
    /// and the like) that are not part of the nibble framing.
    pub fn write_raw(&mut self, data: u8) -> Result<(), E> {
        self.i2c.write(self.address, &[data | ENABLE])?;
        self.i2c.write(self.address, &[data & !ENABLE])?;
        Ok(())
    }

    /// Send a full byte as two nibbles under the given register-select
    /// mask, high nibble first.
    fn write_nibbles(&mut self, data: u8, mask: u8) -> Result<(), E> {
        self.write_raw(mask | ((data & 0xF0) >> 4))?;
        self.write_raw(mask | (data & 0x0F))
    }

    fn write_command(&mut self, command: u8) -> Result<(), E> {
        self.write_nibbles(command, COMMAND)?;
        self.delay.delay_ms(COMMAND_SETTLE_MS);
        Ok(())
    }

    fn write_data(&mut self, data: u8) -> Result<(), E> {
        self.write_nibbles(data, DATA)
    }
}
