//! Floating point carriers used by generated code.
//!
//! Equality and hashing are bitwise so that generated types can derive `Eq`
//! and `Hash`, and so that a decoded value compares equal to the value that
//! was encoded (including NaN payloads and signed zeros).

use std::hash::{Hash, Hasher};

/// IEEE 754 binary16 value, stored as its raw bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Float16(u16);

impl Float16 {
    pub const fn from_bits(bits: u16) -> Self {
        Float16(bits)
    }

    pub const fn to_bits(self) -> u16 {
        self.0
    }

    /// Rounds to the nearest representable binary16 value (ties to even).
    pub fn from_f32(value: f32) -> Self {
        let x = value.to_bits();
        let sign = ((x >> 16) & 0x8000) as u16;
        let exp = ((x >> 23) & 0xff) as i32;
        let man = x & 0x007f_ffff;

        if exp == 0xff {
            let nan = if man != 0 { 0x0200 | (man >> 13) as u16 } else { 0 };
            return Float16(sign | 0x7c00 | nan);
        }

        let half_exp = exp - 127 + 15;
        if half_exp >= 0x1f {
            return Float16(sign | 0x7c00);
        }

        if half_exp <= 0 {
            if half_exp < -10 {
                return Float16(sign);
            }
            let full = man | 0x0080_0000;
            let shift = (14 - half_exp) as u32;
            let mut half_man = full >> shift;
            let round_bit = 1u32 << (shift - 1);
            if full & round_bit != 0 && (full & (round_bit - 1) != 0 || half_man & 1 != 0) {
                half_man += 1;
            }
            return Float16(sign | half_man as u16);
        }

        let mut h = (((half_exp as u32) << 10) | (man >> 13)) as u16;
        let round_bit = 0x1000u32;
        if man & round_bit != 0 && (man & (round_bit - 1) != 0 || h & 1 != 0) {
            // A carry out of the mantissa correctly bumps the exponent.
            h += 1;
        }
        Float16(sign | h)
    }

    /// Exact widening conversion.
    pub fn to_f32(self) -> f32 {
        let h = u32::from(self.0);
        let sign = (h & 0x8000) << 16;
        let exp = (h >> 10) & 0x1f;
        let man = h & 0x03ff;

        let bits = match exp {
            0 if man == 0 => sign,
            0 => {
                let mut e: i32 = 1;
                let mut m = man;
                while m & 0x0400 == 0 {
                    m <<= 1;
                    e -= 1;
                }
                let exp32 = (e + 127 - 15) as u32;
                sign | (exp32 << 23) | ((m & 0x03ff) << 13)
            }
            0x1f => sign | 0x7f80_0000 | (man << 13),
            _ => sign | ((exp + 127 - 15) << 23) | (man << 13),
        };
        f32::from_bits(bits)
    }
}

impl PartialEq for Float16 {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Float16 {}

impl Hash for Float16 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// IEEE 754 binary32 value with bitwise equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct Float32(pub f32);

impl PartialEq for Float32 {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Float32 {}

impl Hash for Float32 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f32> for Float32 {
    fn from(value: f32) -> Self {
        Float32(value)
    }
}

/// IEEE 754 binary64 value with bitwise equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct Float64(pub f64);

impl PartialEq for Float64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Float64 {}

impl Hash for Float64 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f64> for Float64 {
    fn from(value: f64) -> Self {
        Float64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float16_exact_values_round_trip_through_f32() {
        for v in [0.0f32, -0.0, 1.0, -2.5, 65504.0, 0.000_061_035_156, 5.960_464_5e-8] {
            let h = Float16::from_f32(v);
            assert_eq!(h.to_f32().to_bits(), v.to_bits(), "value {v}");
        }
    }

    #[test]
    fn float16_overflow_becomes_infinity() {
        assert_eq!(Float16::from_f32(1.0e6).to_bits(), 0x7c00);
        assert_eq!(Float16::from_f32(f32::NEG_INFINITY).to_bits(), 0xfc00);
        assert!(Float16::from_f32(f32::NAN).to_f32().is_nan());
    }

    #[test]
    fn float16_rounds_to_nearest_even() {
        // 1 + 2^-11 lies exactly between 1.0 and the next binary16 value.
        assert_eq!(Float16::from_f32(1.000_488_3).to_bits(), 0x3c00);
        assert_eq!(Float16::from_f32(1.001).to_bits(), 0x3c01);
    }

    #[test]
    fn bitwise_equality_distinguishes_signed_zero_and_matches_nan() {
        assert_ne!(Float64(0.0), Float64(-0.0));
        assert_eq!(Float64(f64::NAN), Float64(f64::NAN));
        assert_eq!(Float32(1.5), Float32::from(1.5));
    }
}
