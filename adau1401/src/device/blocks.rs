//! Parameter offsets inside each algorithm block type.
//!
//! A block's base address is exported by SigmaStudio for the loaded
//! firmware; the layout of parameters after the base is fixed per block
//! type and lives here.

/// Sine Tone (Sources → Oscillators → Sine Tone).
pub mod sine_tone {
    /// Lookup-table mask, reset to `0x000000FF`.
    pub const MASK: u16 = 0;
    /// Phase increment, `f / 24000` in 5.23.
    pub const INCREMENT: u16 = 1;
    /// Oscillator enable flag.
    pub const ON: u16 = 2;

    /// Mask pattern written when the tone is (re)programmed.
    pub const MASK_RESET: [u8; 4] = [0x00, 0x00, 0x00, 0xFF];
}

/// Sine Tone with Phase and Gain (Sources → Oscillators → With Phase).
pub mod sine_phase {
    /// Phase increment, `f / 24000` in 5.23.
    pub const INCREMENT: u16 = 0;
    /// Output gain, 0.0–1.0 in 5.23.
    pub const GAIN: u16 = 2;
    /// Phase offset, quantized to one byte.
    pub const PHASE: u16 = 3;

    /// Degrees per phase step (360° over 255 steps).
    pub const DEGREES_PER_STEP: f64 = 1.411764;
    /// Largest accepted phase in degrees.
    pub const MAX_DEGREES: u16 = 360;
}

/// Single Volume (Volume Controls → Adjustable Gain → No Slew).
pub mod single_volume {
    /// Gain, 0.0–1.0 in 5.23.
    pub const GAIN: u16 = 0;
}

/// Mute (Volume Controls → Mute → No Slew).
pub mod mute {
    /// Pass-through flag: 1.0 lets audio through, 0 mutes.
    pub const FLAG: u16 = 0;
}

/// Pitch Transposer (ADI Algorithms → Pitch Modification).
pub mod pitch_shift {
    /// Pitch ratio trim in 5.23.
    pub const FREQ: u16 = 0;
}

/// General 2nd-order filter, double precision, 1 channel.
pub mod gen_2nd_order {
    /// Coefficients b0, b1, b2, a1, a2 at consecutive addresses.
    pub const COEFFS: usize = 5;
    /// Coefficients from this position on are written with inverted sign.
    pub const FEEDBACK_START: usize = 3;
}

/// Nth-order filter, double precision, 2 channels: three cascaded biquads.
pub mod nth_order_2ch {
    /// Coefficients per biquad stage.
    pub const STAGE_COEFFS: usize = 5;
    /// Biquad stages in the block.
    pub const STAGES: usize = 3;
    /// Total coefficient slots.
    pub const COEFFS: usize = STAGE_COEFFS * STAGES;
}

/// DC Input Entry (Sources → DC).
pub mod dc_entry {
    /// DC value, 28.0 integer or 5.23 depending on use.
    pub const VALUE: u16 = 0;
}

/// On/Off Switch (Sources → Switch(0,1)).
///
/// The state is a 28.0 integer, unlike the 5.23 gain-style flags.
pub mod switch {
    /// Switch state: 1 on, 0 off (28.0).
    pub const STATE: u16 = 0;
}
