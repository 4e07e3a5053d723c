//! Level readings: tone response, peak and filtered RMS.
//!
//! Three small firmwares share this module. `freqresp` plays a tone and
//! reads the level of the return, `level` exposes a raw peak detector, and
//! `rms` measures an external signal through selectable high-pass and
//! low-pass Butterworth filters.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::Settling;
use crate::control::Verbosity;
use crate::device::blocks::nth_order_2ch;
use crate::device::{registers, Adau1401};
use crate::error::Error;
use crate::units::{ms_to_dbu, ms_to_pp, ms_to_rms};

/// Peak detector node of the `level` firmware.
pub const LEVEL_BIN_PEAK_NODE: u16 = 0x010A;

/// Register map of the tone response firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LevelMap {
    /// Sine Tone block.
    pub tone: u16,
    /// Single Volume block setting the tone amplitude.
    pub amplitude: u16,
    pub capture_reg: u16,
    pub level_node: u16,
}

impl LevelMap {
    /// Addresses of the published `freqresp.bin` image.
    pub const FREQRESP_BIN: LevelMap = LevelMap {
        tone: 0x0000,
        amplitude: 0x0003,
        capture_reg: registers::CAPTURE_0,
        level_node: 0x00FE,
    };
}

impl Default for LevelMap {
    fn default() -> Self {
        Self::FREQRESP_BIN
    }
}

/// One level reading in every unit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LevelReport {
    /// Raw mean-square reading.
    pub ms: f64,
    pub rms: f64,
    pub vpp: f64,
    pub dbu: f64,
}

impl LevelReport {
    pub fn from_ms(ms: f64) -> Self {
        Self {
            ms,
            rms: ms_to_rms(ms),
            vpp: ms_to_pp(ms),
            dbu: ms_to_dbu(ms),
        }
    }
}

/// Read a level node without conversion.
pub fn read_peak<I2C: I2c, D: DelayNs>(
    dsp: &mut Adau1401<I2C, D>,
    capture_reg: u16,
    node: u16,
) -> Result<f64, Error> {
    dsp.capture(capture_reg, node)
}

/// Tone response measurement on the `freqresp` firmware.
#[derive(Debug, Clone, Copy)]
pub struct LevelMeter {
    map: LevelMap,
    settling: Settling,
}

impl LevelMeter {
    /// Meter for `map` with the default settling.
    pub fn new(map: LevelMap) -> Self {
        Self {
            map,
            settling: Settling::default(),
        }
    }

    /// Replace the settling times.
    pub fn with_settling(mut self, settling: Settling) -> Self {
        self.settling = settling;
        self
    }

    /// Optionally retune the tone, wait for the detector and read the level.
    pub fn measure_response<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
        frequency_hz: Option<f64>,
        amplitude: Option<f64>,
        verbosity: Verbosity,
    ) -> Result<LevelReport, Error> {
        if let Some(gain) = amplitude {
            if verbosity.reports() {
                log::info!("setting amplitude to {}", gain);
            }
            dsp.set_gain(self.map.amplitude, gain)?;
        }
        if let Some(hz) = frequency_hz {
            if verbosity.reports() {
                log::info!("setting frequency to {} Hz", hz);
            }
            dsp.set_tone(self.map.tone, hz)?;
        }
        dsp.settle(self.settling.tone_ms);

        let ms = dsp.capture(self.map.capture_reg, self.map.level_node)?;
        let report = LevelReport::from_ms(ms);
        if verbosity.reports() {
            log::info!(
                "level {} V RMS, {} Vpp, {} dBu",
                report.rms,
                report.vpp,
                report.dbu
            );
        }
        Ok(report)
    }
}

/// High-pass corner frequencies; 0 is bypass.
pub const HIGHPASS_HZ: [u32; 4] = [0, 10, 20, 100];

/// Low-pass corner frequencies; 0 is bypass.
pub const LOWPASS_HZ: [u32; 5] = [0, 100, 1000, 10000, 20000];

/// Readings of the ×100 node below this RMS level are used directly.
const AMPLIFIED_BELOW_RMS: f64 = 0.06;

/// Mean-square gain of the amplified node.
const AMPLIFIED_NODE_GAIN: f64 = 100.0 * 100.0;

/// Empirical correction applied to every RMS result.
const RMS_ADJUSTMENT: f64 = 1.07491;

/// 6th-order Butterworth sections for the Nth Order filter blocks.
///
/// Rows 0..3 are high-pass, rows 3..7 low-pass, in the order of
/// [`HIGHPASS_HZ`] and [`LOWPASS_HZ`] without the bypass entries. Feedback
/// terms already carry the DSP's sign.
#[allow(clippy::excessive_precision)]
const BUTTERWORTH: [[f64; nth_order_2ch::COEFFS]; 7] = [
    // 10 Hz HP
    [
        0.99873673915863, -1.99747359752655, 0.99873673915863, 1.99747264385223, -0.997474431991577,
        0.999074816703796, -1.99814963340759, 0.999074816703796, 1.99814879894257, -0.99815046787262,
        0.999660849571228, -1.99932181835175, 0.999660849571228, 1.99932098388672, -0.999322652816772,
    ],
    // 20 Hz HP
    [
        0.997475862503052, -1.9949517250061, 0.997475862503052, 1.994948387146, -0.9949551820755,
        0.99815046787262, -1.99630105495453, 0.99815046787262, 1.99629759788513, -0.996304392814636,
        0.999321103096008, -1.99864232540131, 0.999321103096008, 1.99863886833191, -0.998645782470703,
    ],
    // 100 Hz HP
    [
        0.98747193813324, -1.97494399547577, 0.98747193813324, 1.97485935688019, -0.975028514862061,
        0.990786671638489, -1.98157334327698, 0.990786671638489, 1.98148846626282, -0.981658339500427,
        0.996580958366394, -1.9931617975235, 0.996580958366394, 1.99307644367218, -0.993247151374817,
    ],
    // 100 Hz LP
    [
        4.23192977905273e-05, 8.46385955810547e-05, 4.23192977905273e-05, 1.97485935688019, -0.975028514862061,
        4.24385070800781e-05, 8.48770141601563e-05, 4.24385070800781e-05, 1.98148846626282, -0.98165833950042,
        4.26769256591797e-05, 8.53538513183594e-05, 4.26769256591797e-05, 1.99307644367218, -0.993247151374817,
    ],
    // 1000 Hz LP
    [
        0.00379860401153564, 0.00759732723236084, 0.00379860401153564, 1.76088035106659, -0.776074886322021,
        0.00391614437103271, 0.00783228874206543, 0.00391614437103271, 1.81534111499786, -0.831005573272705,
        0.00413775444030762, 0.00827550888061523, 0.00413775444030762, 1.91809153556824, -0.934642672538757,
    ],
    // 10000 Hz LP
    [
        0.191716551780701, 0.383433103561401, 0.191716551780701, 0.267788290977478, -0.0346543788909912,
        0.220194697380066, 0.440389394760132, 0.220194697380066, 0.307566404342651, -0.188345193862915,
        0.296472430229187, 0.592944741249084, 0.296472430229187, 0.414110422134399, -0.600000023841858,
    ],
    // 20000 Hz LP
    [
        0.629154443740845, 1.25830888748169, 0.629154443740845, -1.16796636581421, -0.34865140914917,
        0.689306139945984, 1.37861227989197, 0.689306139945984, -1.27963244915009, -0.47759222984314,
        0.826106667518616, 1.65221321582794, 0.826106667518616, -1.53358972072601, -0.77083683013916,
    ],
];

/// Register map of the RMS firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RmsMeterMap {
    /// Nth Order filter block used as high-pass.
    pub highpass: u16,
    /// Nth Order filter block used as low-pass.
    pub lowpass: u16,
    pub capture_reg: u16,
    /// Unamplified level node.
    pub level_node: u16,
    /// Level node after ×100 gain.
    pub amplified_node: u16,
}

impl RmsMeterMap {
    /// Addresses of the published `rms.bin` image.
    pub const RMS_BIN: RmsMeterMap = RmsMeterMap {
        highpass: 0x0006,
        lowpass: 0x0015,
        capture_reg: registers::CAPTURE_0,
        level_node: 0x028A,
        amplified_node: 0x031E,
    };
}

impl Default for RmsMeterMap {
    fn default() -> Self {
        Self::RMS_BIN
    }
}

/// Filtered AC RMS voltmeter on the `rms` firmware.
#[derive(Debug, Clone, Copy)]
pub struct RmsMeter {
    map: RmsMeterMap,
}

impl RmsMeter {
    /// Meter for `map`; the filters stay as the firmware loaded them.
    pub fn new(map: RmsMeterMap) -> Self {
        Self { map }
    }

    /// Select the high-pass filter by index into [`HIGHPASS_HZ`].
    pub fn set_highpass<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
        index: usize,
        verbosity: Verbosity,
    ) -> Result<(), Error> {
        check_filter("high-pass index", index, HIGHPASS_HZ.len())?;
        if verbosity.reports() {
            log::info!("setting high-pass to {} Hz", HIGHPASS_HZ[index]);
        }
        match index {
            0 => dsp.bypass_cascaded_filter(self.map.highpass),
            i => dsp.set_cascaded_filter(self.map.highpass, &BUTTERWORTH[i - 1]),
        }
    }

    /// Select the low-pass filter by index into [`LOWPASS_HZ`].
    pub fn set_lowpass<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
        index: usize,
        verbosity: Verbosity,
    ) -> Result<(), Error> {
        check_filter("low-pass index", index, LOWPASS_HZ.len())?;
        if verbosity.reports() {
            log::info!("setting low-pass to {} Hz", LOWPASS_HZ[index]);
        }
        match index {
            0 => dsp.bypass_cascaded_filter(self.map.lowpass),
            i => dsp.set_cascaded_filter(self.map.lowpass, &BUTTERWORTH[i + 2]),
        }
    }

    /// Measure volts RMS, auto-ranging between the two level nodes.
    pub fn measure_rms<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
        verbosity: Verbosity,
    ) -> Result<f64, Error> {
        let amplified = dsp.capture(self.map.capture_reg, self.map.amplified_node)?;
        let mut rms = ms_to_rms(amplified / AMPLIFIED_NODE_GAIN);
        if rms >= AMPLIFIED_BELOW_RMS {
            if verbosity.details() {
                log::debug!("amplified node out of range at {} V, using direct node", rms);
            }
            rms = ms_to_rms(dsp.capture(self.map.capture_reg, self.map.level_node)?);
        }

        let rms = rms / RMS_ADJUSTMENT;
        if verbosity.reports() {
            log::info!("value (RMS) is {:.2} mV", rms * 1000.0);
        }
        Ok(rms)
    }
}

fn check_filter(what: &'static str, index: usize, len: usize) -> Result<(), Error> {
    if index >= len {
        return Err(Error::OutOfRange {
            what,
            value: index as u32,
            max: (len - 1) as u32,
        });
    }
    Ok(())
}
