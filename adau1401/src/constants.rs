/// 7-bit I2C address of the ADAU1401 on the DSP board.
pub const DSP_I2C_ADDR: u8 = 0x34;

/// 7-bit I2C address of the boot EEPROM.
pub const EEPROM_I2C_ADDR: u8 = 0x50;

/// DSP sample rate in Hz.
pub const SAMPLE_RATE: f64 = 48_000.0;

/// Oscillator increments are normalized to half the sample rate.
pub const OSC_FREQ_SCALE: f64 = SAMPLE_RATE / 2.0;

/// Longest single delay the bus layer accepts, in milliseconds.
pub const MAX_DELAY_MS: u32 = 999;

/// Default wait between a capture request and the read, in milliseconds.
pub const READBACK_SETTLE_MS: u32 = 100;
