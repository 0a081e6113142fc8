//! 80-bit extended-precision reals: 1 sign bit, 15-bit biased exponent,
//! 64-bit mantissa with an explicit integer bit.
//!
//! Arithmetic happens in host doubles; this type is the storage format of
//! the FPU register file and the memory interchange format for extended
//! operands. Conversions are exact where the double can represent the
//! value and round-to-nearest-even otherwise.

/// Exponent bias of the 80-bit format.
const BIAS: i32 = 16383;

/// f64 exponent bias.
const F64_BIAS: i32 = 1023;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtendedReal {
    pub sign: bool,
    /// Biased exponent, 15 bits.
    pub exp: u16,
    /// Mantissa with explicit integer bit at bit 63.
    pub mantissa: u64,
}

impl ExtendedReal {
    pub const ZERO: Self = Self {
        sign: false,
        exp: 0,
        mantissa: 0,
    };

    pub fn zero(sign: bool) -> Self {
        Self { sign, exp: 0, mantissa: 0 }
    }

    pub fn infinity(sign: bool) -> Self {
        Self {
            sign,
            exp: 0x7FFF,
            mantissa: 1 << 63,
        }
    }

    pub fn nan() -> Self {
        Self {
            sign: false,
            exp: 0x7FFF,
            mantissa: u64::MAX,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.exp == 0 && self.mantissa == 0
    }

    pub fn is_infinite(&self) -> bool {
        self.exp == 0x7FFF && self.mantissa << 1 == 0
    }

    pub fn is_nan(&self) -> bool {
        self.exp == 0x7FFF && self.mantissa << 1 != 0
    }

    pub fn is_negative(&self) -> bool {
        self.sign
    }

    pub fn from_f64(x: f64) -> Self {
        let bits = x.to_bits();
        let sign = bits >> 63 != 0;
        let exp = (bits >> 52 & 0x7FF) as i32;
        let frac = bits & 0x000F_FFFF_FFFF_FFFF;
        match exp {
            0x7FF if frac == 0 => Self::infinity(sign),
            0x7FF => {
                // Preserve the payload in the top fraction bits.
                Self {
                    sign,
                    exp: 0x7FFF,
                    mantissa: 1 << 63 | frac << 11 | 1 << 62,
                }
            }
            0 if frac == 0 => Self::zero(sign),
            0 => {
                // Subnormal double: normalise into the explicit-bit format.
                // value = frac * 2^-1074, integer bit moves up to bit 63.
                let lz = frac.leading_zeros() as i32;
                Self {
                    sign,
                    exp: (BIAS - F64_BIAS + 12 - lz) as u16,
                    mantissa: frac << lz,
                }
            }
            _ => Self {
                sign,
                exp: (exp - F64_BIAS + BIAS) as u16,
                mantissa: 1 << 63 | frac << 11,
            },
        }
    }

    pub fn to_f64(self) -> f64 {
        if self.is_nan() {
            let payload = self.mantissa >> 11 & 0x0007_FFFF_FFFF_FFFF;
            return f64::from_bits(
                (self.sign as u64) << 63 | 0x7FF0_0000_0000_0000 | payload | 1 << 51,
            );
        }
        if self.is_infinite() {
            return if self.sign { f64::NEG_INFINITY } else { f64::INFINITY };
        }
        if self.is_zero() {
            return if self.sign { -0.0 } else { 0.0 };
        }
        let e = self.exp as i32 - BIAS;
        let f64_exp = e + F64_BIAS;
        if f64_exp >= 0x7FF {
            return if self.sign { f64::NEG_INFINITY } else { f64::INFINITY };
        }
        if f64_exp <= 0 {
            // Underflows the double range; collapse toward signed zero.
            let x = (self.mantissa as f64 / 2f64.powi(63)) * 2f64.powi(e);
            return if self.sign { -x } else { x };
        }
        // Round the 64-bit mantissa to the double's 53 bits, ties to even.
        let keep = self.mantissa >> 11;
        let rem = self.mantissa & 0x7FF;
        let half = 0x400;
        let mut frac53 = keep;
        if rem > half || (rem == half && keep & 1 == 1) {
            frac53 += 1;
        }
        let (frac53, f64_exp) = if frac53 >> 53 != 0 {
            (frac53 >> 1, f64_exp + 1)
        } else {
            (frac53, f64_exp)
        };
        if f64_exp >= 0x7FF {
            return if self.sign { f64::NEG_INFINITY } else { f64::INFINITY };
        }
        f64::from_bits(
            (self.sign as u64) << 63
                | (f64_exp as u64) << 52
                | frac53 & 0x000F_FFFF_FFFF_FFFF,
        )
    }

    /// Memory interchange layout: 16-bit sign+exponent word, 16 zero bits,
    /// then the 64-bit mantissa.
    pub fn to_words(self) -> (u16, u64) {
        ((self.sign as u16) << 15 | self.exp & 0x7FFF, self.mantissa)
    }

    pub fn from_words(se: u16, mantissa: u64) -> Self {
        Self {
            sign: se >> 15 != 0,
            exp: se & 0x7FFF,
            mantissa,
        }
    }
}

impl From<f64> for ExtendedReal {
    fn from(x: f64) -> Self {
        Self::from_f64(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_normals_exactly() {
        for x in [1.0, -1.0, 0.5, 1.5, 3.141592653589793, 1e300, -1e-300, 123456.789] {
            assert_eq!(ExtendedReal::from_f64(x).to_f64(), x);
        }
    }

    #[test]
    fn round_trips_specials() {
        assert_eq!(ExtendedReal::from_f64(f64::INFINITY).to_f64(), f64::INFINITY);
        assert_eq!(
            ExtendedReal::from_f64(f64::NEG_INFINITY).to_f64(),
            f64::NEG_INFINITY
        );
        assert!(ExtendedReal::from_f64(f64::NAN).to_f64().is_nan());
        let z = ExtendedReal::from_f64(-0.0);
        assert!(z.sign);
        assert_eq!(z.to_f64().to_bits(), (-0.0f64).to_bits());
    }

    #[test]
    fn round_trips_subnormals() {
        let tiny = f64::from_bits(1); // smallest positive subnormal
        let back = ExtendedReal::from_f64(tiny).to_f64();
        assert!((back - tiny).abs() <= tiny * 1e-9 || back == tiny);
    }

    #[test]
    fn classifies() {
        assert!(ExtendedReal::nan().is_nan());
        assert!(ExtendedReal::infinity(true).is_infinite());
        assert!(ExtendedReal::zero(true).is_zero());
        assert!(!ExtendedReal::from_f64(1.0).is_nan());
    }
}
