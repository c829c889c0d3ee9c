use core::convert::Infallible;

use embedded_graphics::{pixelcolor::BinaryColor, prelude::*};
use embedded_hal::i2c::I2c;
use thiserror::Error;

pub const DEFAULT_ADDRESS: u8 = 0x3C;

pub const CONTROL_COMMAND: u8 = 0x80;
pub const CONTROL_DATA: u8 = 0x40;

pub const CMD_PAGE_ADDRESS: u8 = 0xB0;
// The 1.3" module maps RAM column 2 to the first visible pixel.
pub const CMD_COLUMN_OFFSET: u8 = 0x02;
pub const CMD_COLUMN_HIGH_RESET: u8 = 0x10;
pub const CMD_DISPLAY_OFF: u8 = 0xAE;
pub const CMD_DISPLAY_ON: u8 = 0xAF;

pub const INIT_SEQUENCE: [u8; 12] = [
    CMD_DISPLAY_OFF,
    0xA1, // segment remap
    0xC8, // COM scan direction
    0x81, 0xFF, // contrast max
    0xA4, 0xA6, // follow RAM, non-inverted
    0xD5, 0x80, // clock divide ratio
    0x8D, 0x14, // charge pump
    CMD_DISPLAY_ON,
];

#[derive(Debug, Error)]
pub enum DisplayError<E> {
    #[error("i2c transaction failed: {0:?}")]
    Bus(E),
}

pub struct Sh1106<I2C> {
    i2c: I2C,
    address: u8,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl<I2C> Sh1106<I2C> {
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let (index, mask) = self.locate(x, y);
        self.buffer[index] & mask != 0
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn pages(&self) -> u32 {
        self.height / 8
    }

    fn locate(&self, x: u32, y: u32) -> (usize, u8) {
        ((x + (y / 8) * self.width) as usize, 1 << (y % 8))
    }
}

impl<I2C: I2c> Sh1106<I2C> {
    pub fn new(
        i2c: I2C,
        address: u8,
        width: u32,
        height: u32,
    ) -> Result<Self, DisplayError<I2C::Error>> {
        let mut display = Self {
            i2c,
            address,
            width,
            height,
            buffer: vec![0; (width * (height / 8)) as usize],
        };

        for cmd in INIT_SEQUENCE {
            display.write_command(cmd)?;
        }
        Ok(display)
    }

    pub fn power_off(&mut self) -> Result<(), DisplayError<I2C::Error>> {
        self.write_command(CMD_DISPLAY_OFF)
    }

    pub fn flush(&mut self) -> Result<(), DisplayError<I2C::Error>> {
        let width = self.width as usize;
        let mut packet = Vec::with_capacity(width + 1);

        for page in 0..self.pages() {
            self.write_command(CMD_PAGE_ADDRESS + page as u8)?;
            self.write_command(CMD_COLUMN_OFFSET)?;
            self.write_command(CMD_COLUMN_HIGH_RESET)?;

            let start = page as usize * width;
            packet.clear();
            packet.push(CONTROL_DATA);
            packet.extend_from_slice(&self.buffer[start..start + width]);
            self.i2c
                .write(self.address, &packet)
                .map_err(DisplayError::Bus)?;
        }
        Ok(())
    }

    fn write_command(&mut self, cmd: u8) -> Result<(), DisplayError<I2C::Error>> {
        self.i2c
            .write(self.address, &[CONTROL_COMMAND, cmd])
            .map_err(DisplayError::Bus)
    }
}

impl<I2C> OriginDimensions for Sh1106<I2C> {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl<I2C> DrawTarget for Sh1106<I2C> {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(coord.x), u32::try_from(coord.y)) else {
                continue;
            };
            if x >= self.width || y >= self.height {
                continue;
            }

            let (index, mask) = self.locate(x, y);
            if color.is_on() {
                self.buffer[index] |= mask;
            } else {
                self.buffer[index] &= !mask;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = if color.is_on() { 0xFF } else { 0x00 };
        self.buffer.fill(fill);
        Ok(())
    }
}
