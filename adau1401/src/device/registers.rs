//! ADAU1401 control-port register addresses.
//!
//! Parameter RAM occupies `0x0000..0x0400`; the addresses of individual
//! algorithm blocks inside it come from the SigmaStudio export of the
//! loaded firmware, not from here. Addresses are 16-bit and sent most
//! significant byte first.

// ── Data capture (readback) ────────────────────────────────────────────────

/// Data capture register 0. Writing a 2-byte node selector here arms the
/// capture; a repeated-start read of 3 bytes returns the 5.19 value.
pub const CAPTURE_0: u16 = 0x081A;

/// Data capture register 1.
pub const CAPTURE_1: u16 = 0x081B;

/// Bytes returned by a capture read.
pub const CAPTURE_LEN: usize = 3;

// ── Safeload ───────────────────────────────────────────────────────────────

/// First safeload data register. Each holds 5 bytes; a 5.23 parameter
/// occupies the low 4.
pub const SAFELOAD_DATA_0: u16 = 0x0810;

/// First safeload target-address register (2 bytes).
pub const SAFELOAD_ADDR_0: u16 = 0x0815;

/// Width of a safeload data register in bytes.
pub const SAFELOAD_DATA_LEN: usize = 5;

// ── Core control ───────────────────────────────────────────────────────────

/// DSP core control register (2 bytes).
/// - Bit 5: IST, initiate safeload transfer
/// - Bits 4:2: ADM, DAM, CR (left set by the boot image)
pub const CORE_CONTROL: u16 = 0x081C;

/// Core control value that commits the staged safeload.
pub const CORE_CONTROL_SAFELOAD: u16 = 0x003C;
