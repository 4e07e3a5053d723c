//! Boot EEPROM programming.
//!
//! The ADAU1401 self-boots from a 24xx-series EEPROM on the same bus. A
//! SigmaStudio image is written in 32-byte pages while the board's
//! write-protect pin is held low; the DSP picks up the new image on its
//! next power cycle.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::i2c::I2c;

use crate::constants::EEPROM_I2C_ADDR;
use crate::control::Verbosity;
use crate::error::Error;

/// EEPROM page size in bytes.
pub const PAGE_SIZE: usize = 32;

/// Internal write cycle time allowed per page, in milliseconds.
pub const PAGE_WRITE_MS: u32 = 200;

/// Largest image addressable with a 16-bit memory address.
pub const MAX_IMAGE_LEN: usize = 0x1_0000;

/// Fill byte for the unused tail of the last page (erased state).
const FILL: u8 = 0xFF;

/// EEPROM image loader.
///
/// Owns the bus, a delay and the write-protect pin for the duration of an
/// upload.
pub struct EepromLoader<I2C, D, WP> {
    i2c: I2C,
    delay: D,
    write_protect: WP,
    address: u8,
}

impl<I2C, D, WP> EepromLoader<I2C, D, WP>
where
    I2C: I2c,
    D: DelayNs,
    WP: OutputPin,
{
    /// Loader for the EEPROM at the default address.
    pub fn new(i2c: I2C, delay: D, write_protect: WP) -> Self {
        Self {
            i2c,
            delay,
            write_protect,
            address: EEPROM_I2C_ADDR,
        }
    }

    /// Use a different 7-bit EEPROM address.
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Write `image` from EEPROM address 0. Returns the number of pages.
    ///
    /// Write protect is released before the first page and restored after
    /// the last, including when a page write fails.
    pub fn load(&mut self, image: &[u8], verbosity: Verbosity) -> Result<usize, Error> {
        if image.len() > MAX_IMAGE_LEN {
            return Err(Error::OutOfRange {
                what: "image length",
                value: image.len() as u32,
                max: MAX_IMAGE_LEN as u32,
            });
        }

        if verbosity.reports() {
            log::info!("setting WP low");
        }
        self.write_protect.set_low().map_err(pin_error)?;

        let written = self.write_pages(image, verbosity);
        let restored = self.write_protect.set_high().map_err(pin_error);

        let pages = written?;
        restored?;
        if verbosity.reports() {
            log::info!("wrote {} pages ({} bytes)", pages, image.len());
        }
        Ok(pages)
    }

    fn write_pages(&mut self, image: &[u8], verbosity: Verbosity) -> Result<usize, Error> {
        let mut frame = [FILL; PAGE_SIZE + 2];
        let mut pages = 0;
        for (n, chunk) in image.chunks(PAGE_SIZE).enumerate() {
            let addr = (n * PAGE_SIZE) as u16;
            if verbosity.details() {
                log::debug!("writing page to 0x{:04x}", addr);
            }
            frame[..2].copy_from_slice(&addr.to_be_bytes());
            frame[2..2 + chunk.len()].copy_from_slice(chunk);
            frame[2 + chunk.len()..].fill(FILL);
            self.i2c.write(self.address, &frame)?;
            self.delay.delay_ms(PAGE_WRITE_MS);
            pages += 1;
        }
        Ok(pages)
    }

    /// Consume the loader and return its peripherals.
    pub fn release(self) -> (I2C, D, WP) {
        (self.i2c, self.delay, self.write_protect)
    }
}

fn pin_error<E: digital::Error>(e: E) -> Error {
    Error::Pin(e.kind())
}
