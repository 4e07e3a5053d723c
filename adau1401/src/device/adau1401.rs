//! ADAU1401 control-port driver.
//!
//! Owns the I2C bus and delay provider for one session with the DSP. All
//! transactions are blocking and strictly sequential; the SigmaDSP control
//! port has no way to multiplex requests.
//!
//! # Example
//!
//! ```ignore
//! let mut dsp = Adau1401::new(i2c, delay);
//! dsp.set_tone(SIN_ADDR, 1000.0)?;
//! let ms = dsp.capture(registers::CAPTURE_0, LEVEL_NODE)?;
//! let (i2c, delay) = dsp.release();
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::registers as reg;
use crate::constants::{DSP_I2C_ADDR, MAX_DELAY_MS, READBACK_SETTLE_MS};
use crate::error::Error;
use crate::fixed::{decode_5_19, pack_address};

/// ADAU1401 driver.
///
/// Generic over the I2C bus and delay provider. Dropping the driver drops
/// both; [`release`](Self::release) hands them back instead.
pub struct Adau1401<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    /// Wait between arming a capture and reading it back.
    readback_settle_ms: u32,
}

impl<I2C, D> Adau1401<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Default 7-bit I2C address of the DSP.
    pub const DEFAULT_ADDRESS: u8 = DSP_I2C_ADDR;

    /// Create a driver talking to the default address.
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::new_with_address(i2c, delay, Self::DEFAULT_ADDRESS)
    }

    /// Create a driver talking to a specific address.
    pub fn new_with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            readback_settle_ms: READBACK_SETTLE_MS,
        }
    }

    /// Override the capture settling time (empirical, 100 ms by default).
    pub fn with_readback_settle_ms(mut self, ms: u32) -> Self {
        self.readback_settle_ms = ms;
        self
    }

    /// Current capture settling time in milliseconds.
    pub fn readback_settle_ms(&self) -> u32 {
        self.readback_settle_ms
    }

    // ── Bus primitives ─────────────────────────────────────────────────

    /// Write a raw addressed frame.
    pub(crate) fn write_frame(&mut self, frame: &[u8]) -> Result<(), Error> {
        log::trace!("write {:02x?}", frame);
        self.i2c.write(self.address, frame)?;
        Ok(())
    }

    /// Write a 4-byte payload to a parameter or control register.
    pub fn write_param(&mut self, addr: u16, payload: [u8; 4]) -> Result<(), Error> {
        let [a0, a1] = pack_address(addr);
        let [p0, p1, p2, p3] = payload;
        self.write_frame(&[a0, a1, p0, p1, p2, p3])
    }

    /// Write a 4-byte payload through the safeload registers.
    ///
    /// Stages the data and target address, then sets IST in the core
    /// control register so the DSP swaps the value in between frames.
    pub fn safeload(&mut self, addr: u16, payload: [u8; 4]) -> Result<(), Error> {
        let [d0, d1] = pack_address(reg::SAFELOAD_DATA_0);
        let [p0, p1, p2, p3] = payload;
        self.write_frame(&[d0, d1, 0x00, p0, p1, p2, p3])?;

        let [s0, s1] = pack_address(reg::SAFELOAD_ADDR_0);
        let [t0, t1] = pack_address(addr);
        self.write_frame(&[s0, s1, t0, t1])?;

        let [c0, c1] = pack_address(reg::CORE_CONTROL);
        let [v0, v1] = reg::CORE_CONTROL_SAFELOAD.to_be_bytes();
        self.write_frame(&[c0, c1, v0, v1])
    }

    /// Read a level node through a data capture register.
    ///
    /// Writes the node selector, waits for the capture to settle, then reads
    /// the 3-byte 5.19 result with a repeated start.
    pub fn capture(&mut self, capture_reg: u16, node: u16) -> Result<f64, Error> {
        let [a0, a1] = pack_address(capture_reg);
        let [n0, n1] = pack_address(node);
        self.write_frame(&[a0, a1, n0, n1])?;
        self.delay_ms(self.readback_settle_ms);

        let mut raw = [0u8; reg::CAPTURE_LEN];
        self.i2c.write_read(self.address, &[a0, a1], &mut raw)?;
        let value = decode_5_19(raw);
        log::debug!(
            "capture 0x{:04x} node 0x{:04x}: {:02x?} = {}",
            capture_reg,
            node,
            raw,
            value
        );
        Ok(value)
    }

    /// Block for `ms` milliseconds, clamped to the bus layer's 999 ms limit.
    pub fn delay_ms(&mut self, ms: u32) {
        let ms = if ms > MAX_DELAY_MS {
            log::warn!("delay of {} ms clamped to {} ms", ms, MAX_DELAY_MS);
            MAX_DELAY_MS
        } else {
            ms
        };
        self.delay.delay_ms(ms);
    }

    /// Block for `ms` milliseconds in chunks the bus layer accepts.
    pub fn settle(&mut self, mut ms: u32) {
        while ms > 0 {
            let chunk = ms.min(MAX_DELAY_MS);
            self.delay.delay_ms(chunk);
            ms -= chunk;
        }
    }

    // ── Release ────────────────────────────────────────────────────────

    /// Consume the driver and return the I2C bus and delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}
