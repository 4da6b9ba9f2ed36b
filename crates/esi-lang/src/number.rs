use core::f64;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

/// An ECMAScript number: an IEEE-754 double with the language's display rules.
#[derive(Debug, Clone, PartialEq, PartialOrd, Copy, Default)]
pub struct Number(f64);

/// Represents a Not-a-Number (NaN) value.
pub const NAN: Number = Number(f64::NAN);

/// Represents positive infinity.
pub const INFINITE: Number = Number(f64::INFINITY);

impl Number {
    /// Creates a new `Number` from an `f64` value.
    pub const fn new(value: f64) -> Self {
        Number(value)
    }

    /// Returns the underlying `f64` value.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Returns `true` if the number has no fractional part.
    pub fn is_int(&self) -> bool {
        self.0.is_finite() && self.0.fract() == 0.0
    }

    /// Returns `true` if the number is NaN (Not-a-Number).
    pub fn is_nan(&self) -> bool {
        self.0.is_nan()
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    /// Truncating conversion used by the bitwise operators (ToInt32).
    pub fn to_int32(self) -> i32 {
        self.to_uint32() as i32
    }

    /// Modular conversion used by `>>>` (ToUint32).
    pub fn to_uint32(self) -> u32 {
        if !self.0.is_finite() {
            return 0;
        }
        let n = self.0.trunc().rem_euclid(4_294_967_296.0);
        n as u32
    }

    /// Returns the value as an array index when it is a non-negative integer.
    pub fn to_index(self) -> Option<usize> {
        if self.is_int() && self.0 >= 0.0 && self.0 < u32::MAX as f64 {
            Some(self.0 as usize)
        } else {
            None
        }
    }

    /// Formats with a fixed number of fractional digits (`toFixed`).
    pub fn to_fixed(self, digits: usize) -> String {
        if !self.0.is_finite() {
            return self.to_string();
        }
        let scale = 10f64.powi(digits as i32);
        let scaled = self.0 * scale;
        // exact ties round away from zero
        if scaled.is_finite() && scaled.fract().abs() == 0.5 {
            return format!("{:.*}", digits, scaled.round() / scale);
        }
        format!("{:.*}", digits, self.0)
    }

    /// Formats in the given radix (`toString(radix)`); fractional digits are dropped
    /// for radixes other than 10.
    pub fn to_string_radix(self, radix: u32) -> String {
        if radix == 10 || !self.0.is_finite() {
            return self.to_string();
        }
        let negative = self.0 < 0.0;
        let mut n = self.0.abs().trunc() as u64;
        if n == 0 {
            return "0".to_string();
        }
        let mut digits = Vec::new();
        while n > 0 {
            let d = (n % radix as u64) as u32;
            digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
            n /= radix as u64;
        }
        if negative {
            digits.push('-');
        }
        digits.iter().rev().collect()
    }
}

impl Neg for Number {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Number(-self.0)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number(value as f64)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number(value as f64)
    }
}

impl From<u32> for Number {
    fn from(value: u32) -> Self {
        Number(value as f64)
    }
}

impl From<usize> for Number {
    fn from(value: usize) -> Self {
        Number(value as f64)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_nan() {
            write!(f, "NaN")
        } else if self.0.is_infinite() {
            write!(f, "{}", if self.0 > 0.0 { "Infinity" } else { "-Infinity" })
        } else if self.0 == 0.0 {
            // -0 prints as 0
            write!(f, "0")
        } else if self.is_int() && self.0.abs() < 1e21 {
            write!(f, "{:.0}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Add for Number {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Number(self.0 + other.0)
    }
}

impl Sub for Number {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Number(self.0 - other.0)
    }
}

impl Mul for Number {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Number(self.0 * other.0)
    }
}

impl Div for Number {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        Number(self.0 / other.0)
    }
}

impl Rem for Number {
    type Output = Self;

    fn rem(self, other: Self) -> Self {
        Number(self.0 % other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case(42.0, "42")]
    #[case(42.123, "42.123")]
    #[case(42.100, "42.1")]
    #[case(-42.0, "-42")]
    #[case(0.0, "0")]
    #[case(-0.0, "0")]
    #[case(0.1, "0.1")]
    #[case(0.1 + 0.2, "0.30000000000000004")]
    #[case(f64::NAN, "NaN")]
    #[case(f64::INFINITY, "Infinity")]
    #[case(f64::NEG_INFINITY, "-Infinity")]
    #[case(1e20, "100000000000000000000")]
    fn test_display_formatting(#[case] input: f64, #[case] expected: &str) {
        assert_eq!(format!("{}", Number::new(input)), expected);
    }

    #[rstest]
    #[case(5.0, 2.0, "7", "3", "10", "2.5", "1")]
    #[case(-5.0, 2.0, "-3", "-7", "-10", "-2.5", "-1")]
    #[case(1.0, 0.0, "1", "1", "0", "Infinity", "NaN")]
    fn test_operations(
        #[case] a: f64,
        #[case] b: f64,
        #[case] add_result: &str,
        #[case] sub_result: &str,
        #[case] mul_result: &str,
        #[case] div_result: &str,
        #[case] rem_result: &str,
    ) {
        let num_a = Number::new(a);
        let num_b = Number::new(b);

        assert_eq!(format!("{}", num_a + num_b), add_result);
        assert_eq!(format!("{}", num_a - num_b), sub_result);
        assert_eq!(format!("{}", num_a * num_b), mul_result);
        assert_eq!(format!("{}", num_a / num_b), div_result);
        assert_eq!(format!("{}", num_a % num_b), rem_result);
    }

    #[rstest]
    #[case(1.0, 1)]
    #[case(-1.0, -1)]
    #[case(4_294_967_296.0, 0)]
    #[case(2_147_483_648.0, -2_147_483_648)]
    #[case(3.7, 3)]
    #[case(f64::NAN, 0)]
    fn test_to_int32(#[case] input: f64, #[case] expected: i32) {
        assert_eq!(Number::new(input).to_int32(), expected);
    }

    #[rstest]
    #[case(-1.0, 4_294_967_295)]
    #[case(1.0, 1)]
    #[case(f64::INFINITY, 0)]
    fn test_to_uint32(#[case] input: f64, #[case] expected: u32) {
        assert_eq!(Number::new(input).to_uint32(), expected);
    }

    #[rstest]
    #[case(3.0, Some(3))]
    #[case(-1.0, None)]
    #[case(1.5, None)]
    fn test_to_index(#[case] input: f64, #[case] expected: Option<usize>) {
        assert_eq!(Number::new(input).to_index(), expected);
    }

    #[rstest]
    #[case(255.0, 16, "ff")]
    #[case(-5.0, 2, "-101")]
    #[case(0.0, 8, "0")]
    #[case(12.5, 10, "12.5")]
    fn test_to_string_radix(#[case] input: f64, #[case] radix: u32, #[case] expected: &str) {
        assert_eq!(Number::new(input).to_string_radix(radix), expected);
    }

    #[test]
    fn test_nan_is_not_equal_to_itself() {
        assert_ne!(NAN, NAN);
        assert!(INFINITE > Number::new(1.0));
    }

    #[rstest]
    #[case(1.005, 2, "1.00")]
    #[case(3.0, 0, "3")]
    #[case(2.5, 1, "2.5")]
    fn test_to_fixed(#[case] input: f64, #[case] digits: usize, #[case] expected: &str) {
        assert_eq!(Number::new(input).to_fixed(digits), expected);
    }
}
