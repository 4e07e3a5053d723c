//! Conversions from raw mean-square detector readings to physical units.
//!
//! The level detectors in the measurement firmwares output the mean square
//! of the signal at half scale, hence the factor of 2 in [`ms_to_rms`].
//! A reading of 0 gives `rms = 0` and `dbu = -inf`; callers that print or
//! compare dBu guard against that themselves.

use core::f64::consts::SQRT_2;

/// dBu reference: 1 mW into 600 Ω, as an RMS voltage squared.
const DBU_REF_SQUARED: f64 = 0.001 * 600.0;

/// Full-scale output of the DAC in volts peak-to-peak.
pub const OUTPUT_FULL_SCALE_VPP: f64 = 2.6;

/// Mean-square reading to volts RMS.
#[inline]
pub fn ms_to_rms(ms: f64) -> f64 {
    libm::sqrt(ms) * 2.0
}

/// Mean-square reading to volts peak-to-peak.
#[inline]
pub fn ms_to_pp(ms: f64) -> f64 {
    SQRT_2 * ms_to_rms(ms)
}

/// Mean-square reading to dBu.
#[inline]
pub fn ms_to_dbu(ms: f64) -> f64 {
    20.0 * libm::log10(ms_to_rms(ms) / libm::sqrt(DBU_REF_SQUARED))
}

/// Requested output amplitude in Vpp to an oscillator gain (0.0–1.0).
#[inline]
pub fn vpp_to_gain(vpp: f64) -> f64 {
    vpp / OUTPUT_FULL_SCALE_VPP
}
