//! Parameter programming for SigmaStudio algorithm blocks.
//!
//! One method per block type. Multi-write methods issue their frames in a
//! fixed order and stop at the first transport failure; frames already
//! written stay in effect.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::adau1401::Adau1401;
use super::blocks::{
    dc_entry, gen_2nd_order, mute, nth_order_2ch, pitch_shift, sine_phase, sine_tone,
    single_volume, switch,
};
use crate::constants::OSC_FREQ_SCALE;
use crate::error::Error;
use crate::fixed::{encode_28_0, encode_5_23, ONE_5_23};

/// Map 0–360° onto the one-byte phase step of the sine-with-phase block.
///
/// Rounds half away from zero in single precision, the way the phase
/// tables were generated.
pub fn phase_to_step(degrees: u16) -> u8 {
    libm::roundf((degrees as f64 / sine_phase::DEGREES_PER_STEP) as f32) as u8
}

impl<I2C, D> Adau1401<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    // ── Oscillators ────────────────────────────────────────────────────

    /// Program a Sine Tone block: mask reset, increment, then enable.
    pub fn set_tone(&mut self, base: u16, frequency_hz: f64) -> Result<(), Error> {
        self.write_param(base.wrapping_add(sine_tone::MASK), sine_tone::MASK_RESET)?;
        self.write_param(
            base.wrapping_add(sine_tone::INCREMENT),
            encode_5_23(frequency_hz / OSC_FREQ_SCALE),
        )?;
        self.write_param(base.wrapping_add(sine_tone::ON), ONE_5_23)
    }

    /// Set the frequency of a Sine Tone with Phase and Gain block.
    pub fn set_phase_tone_freq(&mut self, base: u16, frequency_hz: f64) -> Result<(), Error> {
        self.write_param(
            base.wrapping_add(sine_phase::INCREMENT),
            encode_5_23(frequency_hz / OSC_FREQ_SCALE),
        )
    }

    /// Set the gain (0.0–1.0) of a Sine Tone with Phase and Gain block.
    pub fn set_phase_tone_gain(&mut self, base: u16, gain: f64) -> Result<(), Error> {
        self.write_param(base.wrapping_add(sine_phase::GAIN), encode_5_23(gain))
    }

    /// Set the phase (0–360°) of a Sine Tone with Phase and Gain block.
    ///
    /// The angle is quantized to 255 steps of about 1.41°.
    pub fn set_phase_tone_phase(&mut self, base: u16, degrees: u16) -> Result<(), Error> {
        if degrees > sine_phase::MAX_DEGREES {
            return Err(Error::OutOfRange {
                what: "phase degrees",
                value: degrees as u32,
                max: sine_phase::MAX_DEGREES as u32,
            });
        }
        self.write_param(
            base.wrapping_add(sine_phase::PHASE),
            [0x00, 0x80, 0x00, phase_to_step(degrees)],
        )
    }

    // ── Volume and routing ─────────────────────────────────────────────

    /// Set a Single Volume block (0.0–1.0).
    pub fn set_gain(&mut self, addr: u16, gain: f64) -> Result<(), Error> {
        self.write_param(addr.wrapping_add(single_volume::GAIN), encode_5_23(gain))
    }

    /// Mute or unmute a Mute block.
    ///
    /// The block's parameter is a pass flag: unmuting writes 1.0, muting
    /// writes 0.
    pub fn set_mute(&mut self, addr: u16, muted: bool) -> Result<(), Error> {
        let payload = if muted { [0; 4] } else { ONE_5_23 };
        self.write_param(addr.wrapping_add(mute::FLAG), payload)
    }

    /// Set the ratio trim of a Pitch Transposer block.
    pub fn set_pitch(&mut self, addr: u16, ratio: f64) -> Result<(), Error> {
        self.write_param(addr.wrapping_add(pitch_shift::FREQ), encode_5_23(ratio))
    }

    /// Turn an On/Off Switch block on or off.
    ///
    /// The switch state is a 28.0 integer: 1 is on, 0 is off.
    pub fn set_switch(&mut self, addr: u16, on: bool) -> Result<(), Error> {
        let payload = encode_28_0(on as u32);
        self.write_param(addr.wrapping_add(switch::STATE), payload)
    }

    // ── DC entries ─────────────────────────────────────────────────────

    /// Set a DC Input Entry to an integer (28.0), e.g. a source selector.
    pub fn set_dc_int(&mut self, addr: u16, value: u32) -> Result<(), Error> {
        self.write_param(addr.wrapping_add(dc_entry::VALUE), encode_28_0(value))
    }

    /// Set a DC Input Entry to a 5.23 value.
    pub fn set_dc_float(&mut self, addr: u16, value: f64) -> Result<(), Error> {
        self.write_param(addr.wrapping_add(dc_entry::VALUE), encode_5_23(value))
    }

    /// Set a DC Input Entry to a 5.23 value through safeload.
    ///
    /// Required for entries that feed level detectors mid-measurement
    /// (hold and subtract controls); a direct write corrupts the captures.
    pub fn set_dc_float_safeload(&mut self, addr: u16, value: f64) -> Result<(), Error> {
        self.safeload(addr.wrapping_add(dc_entry::VALUE), encode_5_23(value))
    }

    // ── Filters ────────────────────────────────────────────────────────

    /// Load a General 2nd Order filter with `[b0, b1, b2, a1, a2]`.
    ///
    /// The DSP's biquad adds its feedback terms, so a1 and a2 go out with
    /// their sign inverted.
    pub fn set_biquad(&mut self, base: u16, coeffs: &[f64; gen_2nd_order::COEFFS]) -> Result<(), Error> {
        for (i, &c) in coeffs.iter().enumerate() {
            let c = if i >= gen_2nd_order::FEEDBACK_START { -c } else { c };
            self.write_param(base.wrapping_add(i as u16), encode_5_23(c))?;
        }
        Ok(())
    }

    /// Load an Nth Order 2-channel filter with 15 coefficients.
    ///
    /// Coefficients are written as exported by SigmaStudio, three stages of
    /// `[b0, b1, b2, a1, a2]` with feedback signs already inverted.
    pub fn set_cascaded_filter(
        &mut self,
        base: u16,
        coeffs: &[f64; nth_order_2ch::COEFFS],
    ) -> Result<(), Error> {
        for (i, &c) in coeffs.iter().enumerate() {
            self.write_param(base.wrapping_add(i as u16), encode_5_23(c))?;
        }
        Ok(())
    }

    /// Make an Nth Order 2-channel filter pass audio unchanged.
    ///
    /// Each stage gets b0 = 1.0 and zeros elsewhere; the block stays in the
    /// signal path.
    pub fn bypass_cascaded_filter(&mut self, base: u16) -> Result<(), Error> {
        for i in 0..nth_order_2ch::COEFFS {
            let payload = if i % nth_order_2ch::STAGE_COEFFS == 0 {
                ONE_5_23
            } else {
                [0; 4]
            };
            self.write_param(base.wrapping_add(i as u16), payload)?;
        }
        Ok(())
    }
}
