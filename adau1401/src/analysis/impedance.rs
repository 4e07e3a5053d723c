//! Complex impedance measurement (LCR meter).
//!
//! The `imp` firmware drives the device under test through a 1 kΩ series
//! resistor with one of four quadrature stimulus tones, and demodulates the
//! voltage across the device into in-phase (I) and quadrature (Q) mean-square
//! readings.
//!
//! The detector outputs span a wide range, so one measurement runs as a
//! small sequence:
//!
//! 1. select the stimulus and let the loop settle
//! 2. freeze the detectors (hold = 0, safeloaded)
//! 3. coarse read of I and Q
//! 4. subtract the integer parts inside the DSP (safeloaded) and re-read
//!    the remainder from a ×10 node, or ×100 when both remainders are
//!    below 0.1; `value = zoomed / scale + integer`
//! 5. read the stimulus level, then unfreeze (hold = 1)
//!
//! The readings are then calibrated and solved for the parallel-equivalent
//! circuit, see [`solve`].

use core::f64::consts::{FRAC_PI_2, PI};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::Settling;
use crate::control::Verbosity;
use crate::device::Adau1401;
use crate::error::Error;
use crate::units::ms_to_pp;

/// Stimulus frequencies selectable on the `imp` firmware, indexed 1..=4.
pub const FREQUENCIES: [f64; 4] = [100.0, 120.0, 1000.0, 10000.0];

/// Remainders below this are re-read from the ×100 nodes.
const ZOOM_X100_BELOW: f64 = 0.1;

/// Register map of the impedance firmware.
///
/// `hold`, `subtract_i` and `subtract_q` are DC entries written through
/// safeload; every other field is a level-detector node read through
/// `capture_reg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImpedanceMap {
    /// DC entry selecting the stimulus frequency (0-based).
    pub source_select: u16,
    /// Data capture register used for every read.
    pub capture_reg: u16,
    /// Detector hold control: 0.0 freezes, 1.0 runs.
    pub hold: u16,
    /// Offset subtracted from I before the zoom stages.
    pub subtract_i: u16,
    /// Offset subtracted from Q before the zoom stages.
    pub subtract_q: u16,
    /// Coarse I and Q detector nodes.
    pub coarse_i: u16,
    pub coarse_q: u16,
    /// ×10 zoom nodes.
    pub x10_i: u16,
    pub x10_q: u16,
    /// ×100 zoom nodes.
    pub x100_i: u16,
    pub x100_q: u16,
    /// Stimulus level node, taken at the top of the series resistor.
    pub stimulus: u16,
}

/// Calibration of the measurement topology.
///
/// Determined once against a known resistor. The magnitude scale-down
/// undoes the analog gain ahead of the demodulator; the phase offset
/// undoes the delay through the signal chain.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImpedanceCalibration {
    /// Divisor applied to the I/Q peak-to-peak voltages.
    pub magnitude_scale_down: f64,
    /// Phase offset in radians.
    pub phase_offset_rad: f64,
    /// Series reference resistor in ohms.
    pub reference_ohms: f64,
}

impl Default for ImpedanceCalibration {
    fn default() -> Self {
        Self {
            magnitude_scale_down: 28.3,
            phase_offset_rad: 0.391420,
            reference_ohms: 1000.0,
        }
    }
}

/// Raw mean-square readings from one frozen acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComplexReading {
    /// Reconstructed in-phase reading.
    pub real: f64,
    /// Reconstructed quadrature reading.
    pub imag: f64,
    /// Stimulus reading.
    pub stimulus: f64,
    /// Zoom factor used for the remainders (10 or 100).
    pub zoom: f64,
}

/// Parallel-equivalent reactive element.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reactance {
    /// `Xp <= 0`.
    Capacitive { farads: f64 },
    /// `Xp > 0`.
    Inductive { henries: f64 },
}

impl Reactance {
    /// Interpret a parallel reactance at `frequency_hz`.
    ///
    /// Zero reactance counts as capacitive.
    pub fn classify(parallel_reactance: f64, frequency_hz: f64) -> Self {
        let omega = 2.0 * PI * frequency_hz;
        if parallel_reactance <= 0.0 {
            Reactance::Capacitive {
                farads: -1.0 / (omega * parallel_reactance),
            }
        } else {
            Reactance::Inductive {
                henries: parallel_reactance / omega,
            }
        }
    }
}

/// Series resistance and reactance of the device.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesEquivalent {
    /// Series resistance in ohms.
    pub resistance: f64,
    /// Magnitude of the series reactance in ohms.
    pub reactance: f64,
}

/// Result of one impedance measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImpedanceReport {
    /// Stimulus frequency.
    pub frequency_hz: f64,
    /// Raw detector values the report was solved from.
    pub reading: ComplexReading,
    /// Calibrated voltage magnitude across the device, Vpp.
    pub magnitude: f64,
    /// Calibrated phase in radians.
    pub phase: f64,
    /// In-phase part of the calibrated voltage across the device, Vpp.
    pub real: f64,
    /// Quadrature part of the calibrated voltage across the device, Vpp.
    pub imag: f64,
    /// Stimulus voltage, Vpp.
    pub stimulus_vpp: f64,
    /// Current through the series resistor, peak-to-peak amperes.
    pub current: f64,
    /// |Z| in ohms.
    pub impedance: f64,
    /// Parallel-equivalent resistance in ohms.
    pub parallel_resistance: f64,
    /// Parallel-equivalent reactance in ohms.
    pub parallel_reactance: f64,
    /// `None` when `Rp < Z` or `X > Z`. Past 45° of phase the series form
    /// is undefined even for a good reading.
    pub series: Option<SeriesEquivalent>,
    /// Parallel capacitance or inductance.
    pub reactance: Reactance,
    /// `false` when `Rp < Z`, when `Z` or `Rp` is not finite, or when `Xp` is NaN.
    pub valid: bool,
}

/// Calibrate a reading and solve for the device impedance.
pub fn solve(
    reading: ComplexReading,
    frequency_hz: f64,
    calibration: &ImpedanceCalibration,
) -> ImpedanceReport {
    let re = ms_to_pp(reading.real) / calibration.magnitude_scale_down;
    let im = ms_to_pp(reading.imag) / calibration.magnitude_scale_down;

    let magnitude = libm::sqrt(re * re + im * im);
    let raw_phase = if im >= 0.0 {
        FRAC_PI_2 - libm::atan(re / im)
    } else {
        -FRAC_PI_2 - libm::atan(re / im)
    };
    let phase = -(raw_phase - calibration.phase_offset_rad);
    let real = magnitude * libm::cos(phase);
    let imag = magnitude * libm::sin(phase);

    let stimulus_vpp = ms_to_pp(reading.stimulus);
    let dr = stimulus_vpp - real;
    let current = libm::sqrt(dr * dr + imag * imag) / calibration.reference_ohms;

    let impedance = magnitude / current;
    let parallel_resistance = magnitude / (current * libm::cos(phase));
    let parallel_reactance = magnitude / (current * libm::sin(phase));

    let series = series_equivalent(impedance, parallel_resistance);
    let reactance = Reactance::classify(parallel_reactance, frequency_hz);

    // Xp is infinite for a pure resistance
    let valid = impedance.is_finite()
        && parallel_resistance.is_finite()
        && !parallel_reactance.is_nan()
        && parallel_resistance >= impedance;

    ImpedanceReport {
        frequency_hz,
        reading,
        magnitude,
        phase,
        real,
        imag,
        stimulus_vpp,
        current,
        impedance,
        parallel_resistance,
        parallel_reactance,
        series,
        reactance,
        valid,
    }
}

fn series_equivalent(impedance: f64, parallel_resistance: f64) -> Option<SeriesEquivalent> {
    let x_sq = parallel_resistance * parallel_resistance - impedance * impedance;
    if x_sq.is_nan() || x_sq < 0.0 {
        return None;
    }
    let reactance = libm::sqrt(x_sq);
    let r_sq = impedance * impedance - reactance * reactance;
    if r_sq < 0.0 {
        return None;
    }
    Some(SeriesEquivalent {
        resistance: libm::sqrt(r_sq),
        reactance,
    })
}

/// Impedance measurement on the `imp` firmware.
#[derive(Debug, Clone, Copy)]
pub struct ImpedanceAnalyzer {
    map: ImpedanceMap,
    calibration: ImpedanceCalibration,
    settling: Settling,
}

impl ImpedanceAnalyzer {
    /// Analyzer for `map` with the default calibration and settling.
    pub fn new(map: ImpedanceMap) -> Self {
        Self {
            map,
            calibration: ImpedanceCalibration::default(),
            settling: Settling::default(),
        }
    }

    /// Replace the calibration constants.
    pub fn with_calibration(mut self, calibration: ImpedanceCalibration) -> Self {
        self.calibration = calibration;
        self
    }

    /// Replace the settling times.
    pub fn with_settling(mut self, settling: Settling) -> Self {
        self.settling = settling;
        self
    }

    pub fn calibration(&self) -> &ImpedanceCalibration {
        &self.calibration
    }

    /// Select stimulus `index` (1..=4) and return its frequency.
    pub fn select_stimulus<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
        index: usize,
        verbosity: Verbosity,
    ) -> Result<f64, Error> {
        let pos = Error::check_index("frequency index", index, FREQUENCIES.len())?;
        let frequency_hz = FREQUENCIES[pos];
        if verbosity.reports() {
            log::info!("selecting stimulus {} Hz", frequency_hz);
        }
        dsp.set_dc_int(self.map.source_select, pos as u32)?;
        Ok(frequency_hz)
    }

    /// Select stimulus `index` (1..=4), settle, acquire and solve.
    pub fn measure<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
        index: usize,
        verbosity: Verbosity,
    ) -> Result<ImpedanceReport, Error> {
        let frequency_hz = self.select_stimulus(dsp, index, verbosity)?;
        dsp.settle(self.settling.stimulus_ms);

        let reading = self.acquire(dsp, verbosity)?;
        let report = solve(reading, frequency_hz, &self.calibration);

        if verbosity.details() {
            log::debug!(
                "magnitude {} Vpp, phase {} rad, phasor [{}, {}]",
                report.magnitude,
                report.phase,
                report.real,
                report.imag
            );
            log::debug!(
                "stimulus {} Vpp, current {} mA pp",
                report.stimulus_vpp,
                report.current * 1000.0
            );
        }
        if verbosity.reports() {
            log::info!(
                "Z = {} ohm, Rp = {} ohm, Xp = {} ohm at {} Hz",
                report.impedance,
                report.parallel_resistance,
                report.parallel_reactance,
                frequency_hz
            );
            match report.reactance {
                Reactance::Capacitive { farads } => log::info!("Cp = {} nF", farads * 1e9),
                Reactance::Inductive { henries } => log::info!("Lp = {} uH", henries * 1e6),
            }
        }
        if !report.valid && verbosity.reports() {
            log::warn!("impedance result is not physically valid");
        }
        Ok(report)
    }

    /// Run the frozen freeze/coarse/zoom/unfreeze acquisition.
    pub fn acquire<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
        verbosity: Verbosity,
    ) -> Result<ComplexReading, Error> {
        let map = &self.map;

        dsp.set_dc_float_safeload(map.hold, 0.0)?;

        let coarse_i = dsp.capture(map.capture_reg, map.coarse_i)?;
        let coarse_q = dsp.capture(map.capture_reg, map.coarse_q)?;
        let int_i = libm::trunc(coarse_i);
        let int_q = libm::trunc(coarse_q);
        dsp.set_dc_float_safeload(map.subtract_i, int_i)?;
        dsp.set_dc_float_safeload(map.subtract_q, int_q)?;

        let fine = libm::fabs(coarse_i - int_i) < ZOOM_X100_BELOW
            && libm::fabs(coarse_q - int_q) < ZOOM_X100_BELOW;
        let (node_i, node_q, zoom) = if fine {
            (map.x100_i, map.x100_q, 100.0)
        } else {
            (map.x10_i, map.x10_q, 10.0)
        };
        if verbosity.details() {
            log::debug!("coarse [{}, {}], zoom x{}", coarse_i, coarse_q, zoom);
        }

        let real = dsp.capture(map.capture_reg, node_i)? / zoom + int_i;
        let imag = dsp.capture(map.capture_reg, node_q)? / zoom + int_q;
        let stimulus = dsp.capture(map.capture_reg, map.stimulus)?;

        dsp.set_dc_float_safeload(map.hold, 1.0)?;

        Ok(ComplexReading {
            real,
            imag,
            stimulus,
            zoom,
        })
    }
}
