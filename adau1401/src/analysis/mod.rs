//! Measurement sequences built on top of the driver.
//!
//! Each analyzer pairs with one firmware image: the register map it needs
//! is a plain struct supplied by the caller, with the addresses of the
//! published images shipped as associated consts.
//!
//! | Module | Firmware | Measures |
//! |--------|----------|----------|
//! | [`impedance`] | `imp.bin` | Complex impedance, parallel R/C/L |
//! | [`thd`] | `thd.bin` | Total harmonic distortion |
//! | [`level`] | `freqresp.bin`, `level.bin`, `rms.bin` | RMS, Vpp, dBu, peak |

pub mod impedance;
pub mod level;
pub mod thd;

pub use impedance::{ImpedanceAnalyzer, ImpedanceCalibration, ImpedanceMap, ImpedanceReport};
pub use level::{LevelMap, LevelMeter, LevelReport, RmsMeter, RmsMeterMap};
pub use thd::{ThdAnalyzer, ThdMap, ThdReport};

/// Analog settling times used by the analyzers, in milliseconds.
///
/// All values are empirical. Waits longer than the bus layer's 999 ms
/// limit are split into several delay calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Settling {
    /// After switching the impedance stimulus frequency.
    pub stimulus_ms: u32,
    /// After loading a THD filter bank.
    pub filter_ms: u32,
    /// Between THD attempts on an out-of-range harmonic.
    pub retry_ms: u32,
    /// After loading a THD filter bank in single-harmonic test mode.
    pub single_harmonic_ms: u32,
    /// After programming the tone for a level reading.
    pub tone_ms: u32,
}

impl Default for Settling {
    fn default() -> Self {
        Self {
            stimulus_ms: 900,
            filter_ms: 900,
            retry_ms: 900,
            single_harmonic_ms: 1800,
            tone_ms: 600,
        }
    }
}
