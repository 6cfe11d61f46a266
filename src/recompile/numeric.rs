//! Constant-pool numeric decoding.
//!
//! Floating point constants are stored as raw IEEE-754 bit patterns and must
//! be reinterpreted, never converted, so that NaN payloads and signed zeros
//! survive unchanged.

/// Reinterpret a 32-bit pattern as a single-precision float.
pub fn decode_float(bits: u32) -> f32 {
    f32::from_bits(bits)
}

/// Reinterpret a high/low pair as a double-precision float.
pub fn decode_double(high: u32, low: u32) -> f64 {
    f64::from_bits(join(high, low))
}

/// Decode a 64-bit integer constant: `high * 2^32 + low` in two's complement.
pub fn decode_long(high: u32, low: u32) -> i64 {
    join(high, low) as i64
}

pub fn encode_float(value: f32) -> u32 {
    value.to_bits()
}

/// Split a double into its (high, low) halves.
pub fn encode_double(value: f64) -> (u32, u32) {
    let bits = value.to_bits();
    ((bits >> 32) as u32, bits as u32)
}

fn join(high: u32, low: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}

/// Result of an unordered (NaN) comparison for the `*cmpl`/`*cmpg` pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NanBias {
    /// `lcmp`, `fcmpl`, `dcmpl`: NaN compares as less.
    Less,
    /// `fcmpg`, `dcmpg`: NaN compares as greater.
    Greater,
}

/// Three-way comparison with the same semantics as the generated `__cmp`
/// helper. The greater-biased form is computed as `-cmp(b, a)`, which is how
/// the generated code expresses it.
pub fn compare(a: f64, b: f64, bias: NanBias) -> i32 {
    match bias {
        NanBias::Less => compare_less(a, b),
        NanBias::Greater => -compare_less(b, a),
    }
}

fn compare_less(a: f64, b: f64) -> i32 {
    if a > b {
        1
    } else if a == b {
        0
    } else {
        -1
    }
}
