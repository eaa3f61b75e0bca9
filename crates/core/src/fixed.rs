//! Fixed-point arithmetic for order fields
//!
//! Venues reject prices and quantities that carry more decimals than the
//! pair allows, and some reject exponent notation outright. Values are moved
//! into a [`Decimal`] through their shortest round-trip text so that
//! truncation happens on the digits the caller actually sees.

use rust_decimal::{Decimal, prelude::*};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::ops::{Add, Sub, Mul};
use std::str::FromStr;

/// Largest number of decimals any venue publishes for a pair.
pub const MAX_SCALE: u32 = 18;

/// Fixed-point decimal type for exact order formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fixed {
    value: Decimal,
}

impl Fixed {
    /// Zero value
    pub const ZERO: Fixed = Fixed {
        value: Decimal::ZERO,
    };

    /// One value
    pub const ONE: Fixed = Fixed {
        value: Decimal::ONE,
    };

    /// Create a Fixed from an integer
    pub fn from_i64(value: i64) -> Self {
        Fixed { value: Decimal::from(value) }
    }

    /// Create a Fixed from a float.
    ///
    /// Goes through `f64`'s shortest round-trip representation, so
    /// `0.29` becomes exactly `0.29` rather than `0.28999999999999998`.
    pub fn from_f64(value: f64) -> Result<Self, FixedError> {
        if !value.is_finite() {
            return Err(FixedError::InvalidValue);
        }
        Self::from_str_exact(&value.to_string())
    }

    /// Create a Fixed from a string
    pub fn from_str_exact(s: &str) -> Result<Self, FixedError> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|_| FixedError::InvalidValue)?;
        Ok(Fixed { value: decimal })
    }

    /// Get the underlying Decimal value
    pub fn to_decimal(&self) -> Decimal {
        self.value
    }

    /// Convert to f64 (may lose precision)
    pub fn to_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(0.0)
    }

    /// Convert to string with exactly `scale` decimal places
    pub fn to_string_with_scale(&self, scale: u32) -> String {
        format!("{:.1$}", self.value, scale as usize)
    }

    /// Check if the value is zero
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Check if the value is negative
    pub fn is_negative(&self) -> bool {
        self.value.is_sign_negative() && !self.value.is_zero()
    }

    /// Truncate towards zero to `scale` decimal places
    pub fn trunc_with_scale(&self, scale: u32) -> Self {
        Fixed {
            value: self.value.trunc_with_scale(scale),
        }
    }

    /// Number of decimals in a step size such as `"0.00100000"` (3) or `"1"` (0).
    pub fn step_decimals(step: &str) -> Result<u32, FixedError> {
        let step = Self::from_str_exact(step)?;
        if step.value <= Decimal::ZERO {
            return Err(FixedError::InvalidValue);
        }
        Ok(step.value.normalize().scale())
    }
}

/// Fixed-point arithmetic errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixedError {
    #[error("Invalid value")]
    InvalidValue,
    #[error("Precision {0} exceeds the maximum of 18 decimals")]
    PrecisionOutOfRange(u32),
}

/// Truncate `value` towards zero to `precision` decimals and render it the
/// way venues expect: fixed-point, no exponent, trailing zeros kept, a sign
/// only when negative.
///
/// ```
/// use unifex_core::floor_format;
/// assert_eq!(floor_format(12345.6789, 2).unwrap(), "12345.67");
/// assert_eq!(floor_format(0.1234567, 6).unwrap(), "0.123456");
/// assert_eq!(floor_format(3.0, 2).unwrap(), "3.00");
/// ```
pub fn floor_format(value: f64, precision: u32) -> Result<String, FixedError> {
    if precision > MAX_SCALE {
        return Err(FixedError::PrecisionOutOfRange(precision));
    }
    let truncated = Fixed::from_f64(value)?.trunc_with_scale(precision);
    if truncated.is_zero() {
        // "-0.00" is not a literal any venue accepts
        return Ok(Fixed::ZERO.to_string_with_scale(precision));
    }
    Ok(truncated.to_string_with_scale(precision))
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Self) -> Self::Output {
        Fixed {
            value: self.value + rhs.value,
        }
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Self) -> Self::Output {
        Fixed {
            value: self.value - rhs.value,
        }
    }
}

impl Mul for Fixed {
    type Output = Fixed;

    fn mul(self, rhs: Self) -> Self::Output {
        Fixed {
            value: self.value * rhs.value,
        }
    }
}

impl Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for Fixed {
    type Err = FixedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_exact(s)
    }
}

impl From<Decimal> for Fixed {
    fn from(value: Decimal) -> Self {
        Fixed { value }
    }
}

impl From<Fixed> for Decimal {
    fn from(fixed: Fixed) -> Self {
        fixed.value
    }
}
