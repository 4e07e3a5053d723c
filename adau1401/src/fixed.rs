//! Fixed-point number formats used by the SigmaDSP core.
//!
//! Parameter RAM holds 28-bit two's-complement words in 5.23 format (five
//! integer bits including sign, 23 fraction bits), sent as 4 big-endian
//! bytes with the top nibble clear. The data capture registers return 24-bit
//! words in 5.19 format, 3 bytes on the wire.
//!
//! Both formats cover `[-16, 16)`. Values outside that range are not
//! rejected: the integer conversion wraps into 28 bits (or saturates at the
//! `i32` limits) and the DSP sees a different number. Callers scale physical
//! quantities into range first, e.g. a tone frequency becomes `f / 24000`.

/// 2^23, the 5.23 scale factor.
pub const TWO_POW_23: f64 = 8_388_608.0;

/// 2^19, the 5.19 scale factor.
pub const TWO_POW_19: f64 = 524_288.0;

/// Mask selecting the 28 significant bits of a 5.23 word.
pub const MASK_28: u32 = 0x0FFF_FFFF;

/// 1.0 in 5.23 format. Also used as the "on" pattern for enable flags.
pub const ONE_5_23: [u8; 4] = [0x00, 0x80, 0x00, 0x00];

/// Encode a value into a 5.23 parameter word.
///
/// The value is scaled by 2^23, truncated toward zero and masked to 28 bits.
#[inline]
pub fn encode_5_23(value: f64) -> [u8; 4] {
    let scaled = (value * TWO_POW_23) as i32;
    (scaled as u32 & MASK_28).to_be_bytes()
}

/// Decode a 5.23 parameter word, sign-extending bit 27.
#[inline]
pub fn decode_5_23(bytes: [u8; 4]) -> f64 {
    let word = (u32::from_be_bytes(bytes) << 4) as i32 >> 4;
    word as f64 / TWO_POW_23
}

/// Decode a 3-byte 5.19 capture word.
///
/// The wire bytes land in the top three bytes of a 32-bit word, an
/// arithmetic shift by 4 lines the result up with the 5.23 scale.
#[inline]
pub fn decode_5_19(bytes: [u8; 3]) -> f64 {
    let word = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], 0]) >> 4;
    word as f64 / TWO_POW_23
}

/// Encode a value into a 3-byte 5.19 capture word.
#[inline]
pub fn encode_5_19(value: f64) -> [u8; 3] {
    let scaled = (value * TWO_POW_19) as i32;
    let [_, b0, b1, b2] = scaled.to_be_bytes();
    [b0, b1, b2]
}

/// Encode an integer into a 28.0 word (DC entries, source selectors).
#[inline]
pub fn encode_28_0(value: u32) -> [u8; 4] {
    (value & MASK_28).to_be_bytes()
}

/// Pack a register address, most significant byte first.
#[inline]
pub fn pack_address(addr: u16) -> [u8; 2] {
    addr.to_be_bytes()
}
