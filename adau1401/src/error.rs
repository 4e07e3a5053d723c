//! Crate error type.

use embedded_hal::{digital, i2c};

/// Errors raised while driving the DSP board.
///
/// Measurements that land outside their plausible range are not errors:
/// analyzer reports carry a validity flag and still return their numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The I2C transport reported a failure. The current operation was
    /// aborted; writes issued before the failure stay applied.
    #[error("I2C bus error: {0:?}")]
    Bus(i2c::ErrorKind),
    /// The EEPROM write-protect pin could not be driven.
    #[error("write-protect pin error: {0:?}")]
    Pin(digital::ErrorKind),
    /// A caller-supplied index or parameter is outside its fixed table.
    /// Raised before any bus traffic.
    #[error("{what} {value} is out of range (max {max})")]
    OutOfRange {
        /// Name of the rejected parameter.
        what: &'static str,
        /// The value supplied.
        value: u32,
        /// Largest accepted value.
        max: u32,
    },
}

impl<E: i2c::Error> From<E> for Error {
    fn from(value: E) -> Self {
        Self::Bus(value.kind())
    }
}

impl Error {
    /// Check a 1-based table index, returning the 0-based position.
    pub(crate) fn check_index(what: &'static str, index: usize, len: usize) -> Result<usize, Self> {
        if index == 0 || index > len {
            return Err(Self::OutOfRange {
                what,
                value: index as u32,
                max: len as u32,
            });
        }
        Ok(index - 1)
    }
}
