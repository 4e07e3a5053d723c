//! Total harmonic distortion.
//!
//! The `thd` firmware plays a sine tone through the device under test and
//! feeds the return through four identical peak filters in cascade. The
//! filters are tuned in turn to the fundamental and its first six
//! harmonics; each setting gives one level reading. Harmonic readings come
//! from a node amplified ×100 (×10000 in mean square) and saturate near
//! 0.08 V RMS, so a saturated harmonic is re-read a bounded number of times
//! before the whole result is marked invalid.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::Settling;
use crate::control::Verbosity;
use crate::device::blocks::gen_2nd_order;
use crate::device::{registers, Adau1401};
use crate::error::Error;
use crate::units::ms_to_rms;

/// Fundamental plus six harmonics.
pub const HARMONICS: usize = 7;

/// Fundamentals supported by the filter tables, indexed 1..=6.
pub const FREQUENCIES: [u32; 6] = [20, 50, 100, 200, 500, 1000];

/// Harmonic readings at or above this RMS level are saturated.
pub const SATURATION_RMS: f64 = 0.07999;

/// Attempts per harmonic before giving up on a saturated reading.
pub const MAX_ATTEMPTS: usize = 10;

/// Mean-square gain of the harmonic level node.
const HARMONIC_NODE_GAIN: f64 = 10_000.0;

/// Register map of the THD firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThdMap {
    /// Sine Tone block.
    pub tone: u16,
    /// Single Volume block setting the tone amplitude.
    pub amplitude: u16,
    /// Data capture register.
    pub capture_reg: u16,
    /// Level node read for the fundamental.
    pub fundamental_node: u16,
    /// Amplified level node read for the harmonics.
    pub harmonic_node: u16,
    /// First of the cascaded peak filters.
    pub filter_base: u16,
    /// Number of identical filters in the cascade.
    pub filter_count: u16,
    /// Address distance between consecutive filters.
    pub filter_stride: u16,
}

impl ThdMap {
    /// Addresses of the published `thd.bin` image.
    pub const THD_BIN: ThdMap = ThdMap {
        tone: 0x0000,
        amplitude: 0x0003,
        capture_reg: registers::CAPTURE_0,
        fundamental_node: 0x019E,
        harmonic_node: 0x01DA,
        filter_base: 0x0004,
        filter_count: 4,
        filter_stride: gen_2nd_order::COEFFS as u16,
    };
}

impl Default for ThdMap {
    fn default() -> Self {
        Self::THD_BIN
    }
}

/// Result of a THD sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThdReport {
    /// Fundamental frequency of the sweep in Hz.
    pub fundamental_hz: u32,
    /// RMS volts of the fundamental (index 0) and each harmonic.
    pub rms: [f64; HARMONICS],
    /// Harmonic RMS sum over the fundamental.
    pub ratio: f64,
    /// `ratio` in percent.
    pub percent: f64,
    /// `ratio` in dB; `-inf` for a pure tone.
    pub db: f64,
    /// `false` if any harmonic stayed out of range after all attempts, or
    /// the fundamental was zero or unreadable.
    pub valid: bool,
}

impl ThdReport {
    /// Aggregate per-harmonic RMS levels.
    pub fn from_rms(fundamental_hz: u32, rms: [f64; HARMONICS], valid: bool) -> Self {
        let ratio = thd_ratio(&rms);
        Self {
            fundamental_hz,
            rms,
            ratio,
            percent: ratio * 100.0,
            db: 20.0 * libm::log10(ratio),
            valid,
        }
    }
}

/// `sqrt(sum of harmonic squares) / fundamental`.
pub fn thd_ratio(rms: &[f64; HARMONICS]) -> f64 {
    let sum: f64 = rms[1..].iter().map(|h| h * h).sum();
    libm::sqrt(sum) / rms[0]
}

/// Fundamentals with filter tables, in index order.
pub fn allowed_frequencies() -> &'static [u32] {
    &FREQUENCIES
}

/// Peak-filter coefficient rows `[b0, b1, b2, a1, a2]`, per fundamental and
/// harmonic. Feedback terms are in filter-design sign convention.
#[allow(clippy::excessive_precision)]
const PEAK_FILTERS: [[[f64; 5]; HARMONICS]; 6] = [
    // 20 Hz
    [
        [3.739851385908821e-05, 0.0, -3.739851385908821e-05, -1.999918349340577, 9.999252029722818e-01],
        [7.479423062972668e-05, 0.0, -7.479423062972668e-05, -1.999822998084116, 9.998504115387405e-01],
        [1.121871507301364e-04, 0.0, -1.121871507301364e-04, -1.999713947908351, 9.997756256985397e-01],
        [1.495772745788715e-04, 0.0, -1.495772745788715e-04, -1.999591200584700, 9.997008454508423e-01],
        [1.869646025939309e-04, 0.0, -1.869646025939309e-04, -1.999454757978248, 9.996260707948121e-01],
        [2.243491351938687e-04, 0.0, -2.243491351938687e-04, -1.999304622047726, 9.995513017296123e-01],
        [2.617308727964618e-04, 0.0, -2.617308727964618e-04, -1.999140794845490, 9.994765382544071e-01],
    ],
    // 50 Hz
    [
        [9.349104023748112e-05, 0.0, -9.349104023748112e-05, -1.999770185252628, 9.998130179195250e-01],
        [1.869646025939309e-04, 0.0, -1.869646025939309e-04, -1.999454757978248, 9.996260707948121e-01],
        [2.804206936044551e-04, 0.0, -2.804206936044551e-04, -1.999053747684436, 9.994391586127911e-01],
        [3.738593197999407e-04, 0.0, -3.738593197999407e-04, -1.998567187536018, 9.992522813604001e-01],
        [4.672804877093872e-04, 0.0, -4.672804877093872e-04, -1.997995114352963, 9.990654390245812e-01],
        [5.606842038575754e-04, 0.0, -5.606842038575754e-04, -1.997337568608134, 9.988786315922848e-01],
        [6.540704747675097e-04, 0.0, -6.540704747675097e-04, -1.996594594424869, 9.986918590504650e-01],
    ],
    // 100 Hz
    [
        [1.869646025939309e-04, 0.0, -1.869646025939309e-04, -1.999454757978248, 9.996260707948121e-01],
        [3.738593197999407e-04, 0.0, -3.738593197999407e-04, -1.998567187536018, 9.992522813604001e-01],
        [5.606842038575754e-04, 0.0, -5.606842038575754e-04, -1.997337568608134, 9.988786315922848e-01],
        [7.474393069581975e-04, 0.0, -7.474393069581975e-04, -1.995766239574418, 9.985051213860836e-01],
        [9.341246812443194e-04, 0.0, -9.341246812443194e-04, -1.993853597180013, 9.981317506375114e-01],
        [1.120740378809382e-03, 0.0, -1.120740378809382e-03, -1.991600096445757, 9.977585192423812e-01],
        [1.307286451698753e-03, 0.0, -1.307286451698753e-03, -1.989006250568617, 9.973854270966025e-01],
    ],
    // 200 Hz
    [
        [3.738593197999407e-04, 0.0, -3.738593197999407e-04, -1.998567187536018, 9.992522813604001e-01],
        [7.474393069581975e-04, 0.0, -7.474393069581975e-04, -1.995766239574418, 9.985051213860836e-01],
        [1.120740378809382e-03, 0.0, -1.120740378809382e-03, -1.991600096445757, 9.977585192423812e-01],
        [1.493762951909172e-03, 0.0, -1.493762951909172e-03, -1.986072630812219, 9.970124740961817e-01],
        [1.866507442035759e-03, 0.0, -1.866507442035759e-03, -1.979188644323376, 9.962669851159285e-01],
        [2.238974264193061e-03, 0.0, -2.238974264193061e-03, -1.970953863639003, 9.955220514716139e-01],
        [2.611163832610841e-03, 0.0, -2.611163832610841e-03, -1.961374935822173, 9.947776723347783e-01],
    ],
    // 500 Hz
    [
        [9.341246812443194e-04, 0.0, -9.341246812443194e-04, -1.993853597180013, 9.981317506375114e-01],
        [1.866507442035759e-03, 0.0, -1.866507442035759e-03, -1.979188644323376, 9.962669851159285e-01],
        [2.797154775903699e-03, 0.0, -2.797154775903699e-03, -1.956083744344029, 9.944056904481926e-01],
        [3.726073146169351e-03, 0.0, -3.726073146169351e-03, -1.924653432013082, 9.925478537076613e-01],
        [4.653268986126946e-03, 0.0, -4.653268986126946e-03, -1.885047617782994, 9.906934620277461e-01],
        [5.578748699221037e-03, 0.0, -5.578748699221037e-03, -1.837450881542105, 9.888425026015579e-01],
        [6.502518659224243e-03, 0.0, -6.502518659224243e-03, -1.782081619591845, 9.869949626815515e-01],
    ],
    // 1000 Hz
    [
        [1.866507442035759e-03, 0.0, -1.866507442035759e-03, -1.979188644323376, 9.962669851159285e-01],
        [3.726073146169351e-03, 0.0, -3.726073146169351e-03, -1.924653432013082, 9.925478537076613e-01],
        [5.578748699221037e-03, 0.0, -5.578748699221037e-03, -1.837450881542105, 9.888425026015579e-01],
        [7.424585210413115e-03, 0.0, -7.424585210413115e-03, -1.719191048759317, 9.851508295791738e-01],
        [9.263633317018072e-03, 0.0, -9.263633317018072e-03, -1.572008011711891, 9.814727333659639e-01],
        [1.109594318993079e-02, 0.0, -1.109594318993079e-02, -1.398521529026574, 9.778081136201384e-01],
        [1.292156453915949e-02, 0.0, -1.292156453915949e-02, -1.201790557829667, 9.741568709216810e-01],
    ],
];

/// THD measurement on the `thd` firmware.
#[derive(Debug, Clone, Copy)]
pub struct ThdAnalyzer {
    map: ThdMap,
    settling: Settling,
}

impl ThdAnalyzer {
    /// Create an analyzer for `map` with the default settling times.
    pub fn new(map: ThdMap) -> Self {
        Self {
            map,
            settling: Settling::default(),
        }
    }

    /// Override the settling times.
    pub fn with_settling(mut self, settling: Settling) -> Self {
        self.settling = settling;
        self
    }

    /// Sweep the fundamental at `index` (1..=6) and its harmonics.
    ///
    /// `amplitude` sets the tone gain first when given. A harmonic that is
    /// still saturated after [`MAX_ATTEMPTS`] reads marks the report
    /// invalid; the sweep continues and the numbers are still returned.
    pub fn measure<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
        index: usize,
        amplitude: Option<f64>,
        verbosity: Verbosity,
    ) -> Result<ThdReport, Error> {
        let pos = Error::check_index("frequency index", index, FREQUENCIES.len())?;
        self.start_tone(dsp, pos, amplitude, verbosity)?;

        let mut rms = [0.0; HARMONICS];
        let mut valid = true;
        for harmonic in 0..HARMONICS {
            self.load_filters(dsp, pos, harmonic, verbosity)?;
            dsp.settle(self.settling.filter_ms);

            if harmonic == 0 {
                rms[0] = self.read_fundamental(dsp)?;
                if !(rms[0] > 0.0 && rms[0].is_finite()) {
                    if verbosity.reports() {
                        log::warn!("fundamental reads {}, result invalid", rms[0]);
                    }
                    valid = false;
                }
                continue;
            }

            for attempt in 1..=MAX_ATTEMPTS {
                rms[harmonic] = self.read_harmonic(dsp)?;
                if rms[harmonic] < SATURATION_RMS {
                    break;
                }
                if verbosity.details() {
                    log::debug!(
                        "harmonic {} out of range on attempt {}, retrying",
                        harmonic + 1,
                        attempt
                    );
                }
                dsp.settle(self.settling.retry_ms);
            }
            // NaN from a negative capture fails this too
            if !(rms[harmonic] < SATURATION_RMS) {
                if verbosity.reports() {
                    log::warn!("harmonic {} out of range, result invalid", harmonic + 1);
                }
                valid = false;
            }
        }

        let report = ThdReport::from_rms(FREQUENCIES[pos], rms, valid);
        if verbosity.reports() {
            log::info!("values (RMS) are {:?}", report.rms);
            log::info!("thd is {} percent ({} dB)", report.percent, report.db);
        }
        Ok(report)
    }

    /// Tune the filters to a single harmonic (1 = fundamental) and read it.
    ///
    /// Returns volts RMS. Used to check the filter bank and level ranges.
    pub fn measure_single<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
        index: usize,
        harmonic: usize,
        amplitude: Option<f64>,
        verbosity: Verbosity,
    ) -> Result<f64, Error> {
        let pos = Error::check_index("frequency index", index, FREQUENCIES.len())?;
        let harmonic = Error::check_index("harmonic", harmonic, HARMONICS)?;
        self.start_tone(dsp, pos, amplitude, verbosity)?;

        self.load_filters(dsp, pos, harmonic, verbosity)?;
        dsp.settle(self.settling.single_harmonic_ms);

        let rms = if harmonic == 0 {
            self.read_fundamental(dsp)?
        } else {
            self.read_harmonic(dsp)?
        };
        if verbosity.reports() {
            log::info!("value (RMS) of harmonic #{} is {}", harmonic + 1, rms);
        }
        Ok(rms)
    }

    fn start_tone<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
        pos: usize,
        amplitude: Option<f64>,
        verbosity: Verbosity,
    ) -> Result<(), Error> {
        if let Some(gain) = amplitude {
            if verbosity.reports() {
                log::info!("setting amplitude to {}", gain);
            }
            dsp.set_gain(self.map.amplitude, gain)?;
        }
        let hz = FREQUENCIES[pos];
        if verbosity.reports() {
            log::info!("setting frequency to {} Hz", hz);
        }
        dsp.set_tone(self.map.tone, hz as f64)
    }

    fn load_filters<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
        pos: usize,
        harmonic: usize,
        verbosity: Verbosity,
    ) -> Result<(), Error> {
        let coeffs = &PEAK_FILTERS[pos][harmonic];
        // The filters are identical; only narrate the first.
        if verbosity.details() {
            log::debug!("peak filters to harmonic {}: {:?}", harmonic + 1, coeffs);
        }
        for j in 0..self.map.filter_count {
            let base = self
                .map
                .filter_base
                .wrapping_add(j.wrapping_mul(self.map.filter_stride));
            dsp.set_biquad(base, coeffs)?;
        }
        Ok(())
    }

    fn read_fundamental<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
    ) -> Result<f64, Error> {
        let ms = dsp.capture(self.map.capture_reg, self.map.fundamental_node)?;
        Ok(ms_to_rms(ms))
    }

    fn read_harmonic<I2C: I2c, D: DelayNs>(
        &self,
        dsp: &mut Adau1401<I2C, D>,
    ) -> Result<f64, Error> {
        let ms = dsp.capture(self.map.capture_reg, self.map.harmonic_node)?;
        Ok(ms_to_rms(ms / HARMONIC_NODE_GAIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{decode_5_23, encode_5_23};
    use crate::mock::{MockDelay, MockI2c};

    const MAP: ThdMap = ThdMap::THD_BIN;

    fn make_dsp(i2c: MockI2c) -> Adau1401<MockI2c, MockDelay> {
        Adau1401::new(i2c, MockDelay::new())
    }

    /// Mean-square capture value of the harmonic node for `rms` volts.
    fn harmonic_capture(rms: f64) -> f64 {
        (rms / 2.0) * (rms / 2.0) * HARMONIC_NODE_GAIN
    }

    #[test]
    fn aggregate_of_known_levels() {
        let rms = [1.0, 0.1, 0.05, 0.02, 0.01, 0.01, 0.01];
        let report = ThdReport::from_rms(1000, rms, true);
        assert!((report.ratio - 0.114_891_253).abs() < 1e-8);
        assert!((report.percent - 11.489_125_3).abs() < 1e-6);
        assert!((report.db + 18.794_26).abs() < 1e-4);
    }

    #[test]
    fn pure_tone_is_minus_infinity_db() {
        let report = ThdReport::from_rms(20, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], true);
        assert_eq!(report.ratio, 0.0);
        assert_eq!(report.db, f64::NEG_INFINITY);
    }

    #[test]
    fn frequency_table() {
        assert_eq!(allowed_frequencies(), &[20, 50, 100, 200, 500, 1000]);
        assert_eq!(PEAK_FILTERS.len(), FREQUENCIES.len());
    }

    #[test]
    fn full_sweep() {
        let i2c = MockI2c::new()
            .with_reading(MAP.fundamental_node, 0.25)
            .with_reading(MAP.harmonic_node, harmonic_capture(0.01));
        let mut dsp = make_dsp(i2c);

        let report = ThdAnalyzer::new(MAP)
            .measure(&mut dsp, 6, Some(0.5), Verbosity::Quiet)
            .unwrap();
        assert!(report.valid);
        assert_eq!(report.fundamental_hz, 1000);
        assert_eq!(report.rms[0], 1.0);
        for h in &report.rms[1..] {
            assert!((h - 0.01).abs() < 1e-4);
        }
        // sqrt(6 * 0.01^2) / 1.0
        assert!((report.ratio - 0.024_494_9).abs() < 1e-4);

        let (i2c, delay) = dsp.release();
        // Amplitude, then tone, then 7 x (4 filters x 5 coefficients)
        assert_eq!(i2c.frame(0).addr(), MAP.amplitude);
        assert_eq!(i2c.frame(0).payload(), &encode_5_23(0.5));
        assert_eq!(i2c.frame(1).addr(), MAP.tone);
        assert_eq!(i2c.param_writes(0x0004), 7);
        assert_eq!(i2c.param_writes(0x0004 + 15), 7);
        assert_eq!(i2c.captured().len(), 7);
        assert_eq!(i2c.captured()[0], MAP.fundamental_node);
        assert!(i2c.captured()[1..].iter().all(|&n| n == MAP.harmonic_node));
        // Filter settle and readback wait per step, no retries
        assert_eq!(delay.total_ms(), 7 * (900 + 100));
    }

    #[test]
    fn filters_get_harmonic_rows_with_inverted_feedback() {
        let mut dsp = make_dsp(MockI2c::new().with_reading(MAP.fundamental_node, 0.25));
        ThdAnalyzer::new(MAP)
            .measure_single(&mut dsp, 3, 2, None, Verbosity::Quiet)
            .unwrap();

        let (i2c, _) = dsp.release();
        let row = &PEAK_FILTERS[2][1];
        for filter in 0..4u16 {
            let base = 0x0004 + filter * 5;
            for k in 0..5u16 {
                let expected = if k >= 3 { -row[k as usize] } else { row[k as usize] };
                let written = decode_5_23(i2c.last_param(base + k).unwrap());
                assert!((written - expected).abs() < 1e-6, "filter {} coeff {}", filter, k);
            }
        }
    }

    #[test]
    fn saturated_harmonic_is_retried() {
        let saturated = 15.999;
        let good = harmonic_capture(0.02);
        let i2c = MockI2c::new()
            .with_reading(MAP.fundamental_node, 0.25)
            .with_readings(MAP.harmonic_node, &[saturated, saturated, good]);
        let mut dsp = make_dsp(i2c);

        let report = ThdAnalyzer::new(MAP)
            .measure(&mut dsp, 1, None, Verbosity::Verbose)
            .unwrap();
        assert!(report.valid);
        assert!((report.rms[1] - 0.02).abs() < 1e-4);

        let (i2c, delay) = dsp.release();
        // Two extra reads on the first harmonic
        assert_eq!(i2c.captured().len(), 9);
        assert_eq!(delay.total_ms(), 7 * (900 + 100) + 2 * (900 + 100));
    }

    #[test]
    fn saturated_after_all_attempts_is_invalid_but_completes() {
        let i2c = MockI2c::new()
            .with_reading(MAP.fundamental_node, 0.25)
            .with_reading(MAP.harmonic_node, 15.999);
        let mut dsp = make_dsp(i2c);

        let report = ThdAnalyzer::new(MAP)
            .measure(&mut dsp, 2, None, Verbosity::Quiet)
            .unwrap();
        assert!(!report.valid);
        assert!(report.rms[6] >= SATURATION_RMS);
        assert!(report.ratio.is_finite());

        let (i2c, _) = dsp.release();
        assert_eq!(i2c.captured().len(), 1 + 6 * MAX_ATTEMPTS);
    }

    #[test]
    fn negative_harmonic_capture_is_invalid() {
        let i2c = MockI2c::new()
            .with_reading(MAP.fundamental_node, 0.25)
            .with_reading(MAP.harmonic_node, -0.5);
        let mut dsp = make_dsp(i2c);

        let report = ThdAnalyzer::new(MAP)
            .measure(&mut dsp, 6, None, Verbosity::Quiet)
            .unwrap();
        assert!(report.rms[1].is_nan());
        assert!(report.ratio.is_nan());
        assert!(!report.valid);

        // Every attempt is spent on an unreadable harmonic
        let (i2c, _) = dsp.release();
        assert_eq!(i2c.captured().len(), 1 + 6 * MAX_ATTEMPTS);
    }

    #[test]
    fn silent_fundamental_is_invalid() {
        let i2c = MockI2c::new().with_reading(MAP.harmonic_node, harmonic_capture(0.01));
        let mut dsp = make_dsp(i2c);

        let report = ThdAnalyzer::new(MAP)
            .measure(&mut dsp, 3, None, Verbosity::Quiet)
            .unwrap();
        assert_eq!(report.rms[0], 0.0);
        assert_eq!(report.ratio, f64::INFINITY);
        assert!(!report.valid);
    }

    #[test]
    fn filter_addresses_wrap_at_top_of_map() {
        let map = ThdMap {
            filter_base: 0xFFFB,
            ..MAP
        };
        let mut dsp = make_dsp(MockI2c::new().with_reading(MAP.fundamental_node, 0.25));
        ThdAnalyzer::new(map)
            .measure_single(&mut dsp, 1, 1, None, Verbosity::Quiet)
            .unwrap();

        let (i2c, _) = dsp.release();
        // Second filter starts past 0xFFFF
        assert_eq!(i2c.frame(3 + 5).addr(), 0x0000);
        assert_eq!(i2c.frame(3 + 15).addr(), 0x000A);
    }

    #[test]
    fn single_harmonic_mode() {
        let i2c = MockI2c::new().with_reading(MAP.harmonic_node, harmonic_capture(0.03));
        let mut dsp = make_dsp(i2c);

        let rms = ThdAnalyzer::new(MAP)
            .measure_single(&mut dsp, 4, 3, None, Verbosity::Quiet)
            .unwrap();
        assert!((rms - 0.03).abs() < 1e-4);

        let (i2c, delay) = dsp.release();
        assert_eq!(i2c.captured(), &[MAP.harmonic_node]);
        assert_eq!(delay.calls(), &[999, 801, 100]);
    }

    #[test]
    fn indices_checked_before_traffic() {
        let analyzer = ThdAnalyzer::new(MAP);
        let mut dsp = make_dsp(MockI2c::new());
        assert!(matches!(
            analyzer.measure(&mut dsp, 7, None, Verbosity::Quiet),
            Err(Error::OutOfRange { value: 7, max: 6, .. })
        ));
        assert!(matches!(
            analyzer.measure_single(&mut dsp, 1, 8, Some(1.0), Verbosity::Quiet),
            Err(Error::OutOfRange { value: 8, max: 7, .. })
        ));
        let (i2c, _) = dsp.release();
        assert!(i2c.frames().is_empty());
    }
}
