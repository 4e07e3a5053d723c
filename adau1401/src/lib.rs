//! # adau1401
//!
//! A `no_std` driver and measurement toolkit for the Analog Devices
//! [ADAU1401](https://www.analog.com/en/products/adau1401a.html) SigmaDSP on
//! an I²C control port. It programs the algorithm blocks of a SigmaStudio
//! firmware image (oscillators, filters, gain, mute, pitch) and turns level
//! detector readbacks into calibrated measurements: RMS/Vpp/dBu, total
//! harmonic distortion and complex impedance.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Format | [`fixed`] | 5.23 / 5.19 / 28.0 fixed-point codec |
//! | Driver | [`device`] | Bus primitives, safeload, capture, block programming |
//! | Units | [`units`] | Mean square to RMS, Vpp, dBu |
//! | Analysis | [`analysis`] | Impedance, THD and level sequences (feature-gated) |
//! | Boot | [`eeprom`] | Firmware image upload to the boot EEPROM (feature-gated) |
//!
//! The bus is anything implementing the `embedded-hal` 1.0
//! [`I2c`](embedded_hal::i2c::I2c) and [`DelayNs`](embedded_hal::delay::DelayNs)
//! traits.
//!
//! ## Quick start
//!
//! ```ignore
//! use adau1401::analysis::{ThdAnalyzer, ThdMap};
//! use adau1401::{Adau1401, Verbosity};
//!
//! let mut dsp = Adau1401::new(i2c, delay);
//!
//! // 1 kHz fundamental at half amplitude
//! let report = ThdAnalyzer::new(ThdMap::THD_BIN)
//!     .measure(&mut dsp, 6, Some(0.5), Verbosity::Normal)?;
//! if report.valid {
//!     let db = report.db;
//! }
//!
//! let (i2c, delay) = dsp.release();
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `analysis` | yes | Impedance, THD and level analyzers |
//! | `eeprom` | yes | EEPROM image loader |
//! | `serde` | no | `Serialize`/`Deserialize` for maps, calibration and reports |
//!
//! ## Known limitations
//!
//! - Values outside `[-16, 16)` wrap when encoded; scale first.
//! - Settling delays and calibration constants are empirical.

#![no_std]

pub mod constants;
pub mod control;
pub mod device;
pub mod error;
pub mod fixed;
pub mod units;

#[cfg(feature = "analysis")]
pub mod analysis;

#[cfg(feature = "eeprom")]
pub mod eeprom;

#[cfg(test)]
mod mock;

pub use control::Verbosity;
pub use device::Adau1401;
pub use error::Error;
