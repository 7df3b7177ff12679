//! Exact parsing of Kubernetes resource quantities.
//!
//! Quantities such as `"600m"`, `"1Gi"`, `"1.5"` or `"2e3"` are parsed into an
//! integer mantissa with decimal and binary exponents, so converting them to
//! millicores or bytes never goes through floating point. Conversions round
//! up, matching how the Kubernetes API reports `MilliValue()` and `Value()`.

use std::str::FromStr;

use thiserror::Error;

/// Largest decimal exponent accepted in a quantity.
const MAX_EXPONENT: i32 = 100;

/// Errors produced when parsing quantities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// The quantity string was empty.
    #[error("quantity is empty")]
    Empty,

    /// The numeric part was malformed.
    #[error("invalid number in quantity {0:?}")]
    InvalidNumber(String),

    /// The suffix is not a known SI, binary or exponent suffix.
    #[error("invalid suffix {suffix:?} in quantity {quantity:?}")]
    InvalidSuffix {
        /// The full quantity string.
        quantity: String,
        /// The unrecognised suffix.
        suffix: String,
    },

    /// The quantity does not fit in a signed 64-bit integer once scaled.
    #[error("quantity {0:?} is out of range")]
    Overflow(String),
}

/// A parsed quantity: `mantissa * 10^exp10 * 2^exp2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    mantissa: i128,
    exp10: i32,
    exp2: u32,
}

impl Quantity {
    /// Parse a quantity string.
    ///
    /// # Errors
    ///
    /// Returns an error if the number or suffix is malformed.
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (negative, rest) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(split);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
            return Err(QuantityError::InvalidNumber(input.to_string()));
        }

        let digits = format!("{int_part}{frac_part}");
        let digits = digits.trim_start_matches('0');
        if digits.len() > 30 || frac_part.len() > 60 {
            return Err(QuantityError::Overflow(input.to_string()));
        }

        let mut mantissa: i128 = if digits.is_empty() {
            0
        } else {
            digits
                .parse()
                .map_err(|_| QuantityError::InvalidNumber(input.to_string()))?
        };
        if negative {
            mantissa = -mantissa;
        }

        let (exp10, exp2) = parse_suffix(input, suffix)?;
        let frac_len = i32::try_from(frac_part.len())
            .map_err(|_| QuantityError::Overflow(input.to_string()))?;

        Ok(Self {
            mantissa,
            exp10: exp10 - frac_len,
            exp2,
        })
    }

    /// The value in thousandths of a unit, rounded up (e.g. millicores).
    ///
    /// # Errors
    ///
    /// Returns an error if the scaled value does not fit in an `i64`.
    pub fn milli_value(&self) -> Result<i64, QuantityError> {
        self.scaled_ceil(3)
    }

    /// The value in whole units, rounded up (e.g. bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not fit in an `i64`.
    pub fn value(&self) -> Result<i64, QuantityError> {
        self.scaled_ceil(0)
    }

    /// Whether the quantity is exactly zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    fn scaled_ceil(&self, extra10: i32) -> Result<i64, QuantityError> {
        let overflow = || QuantityError::Overflow(self.describe());

        if self.mantissa == 0 {
            return Ok(0);
        }

        let binary = 1i128.checked_shl(self.exp2).ok_or_else(overflow)?;
        let mut num = self.mantissa.checked_mul(binary).ok_or_else(overflow)?;

        let pow = self.exp10 + extra10;
        if pow >= 0 {
            let factor = 10i128.checked_pow(pow.unsigned_abs()).ok_or_else(overflow)?;
            num = num.checked_mul(factor).ok_or_else(overflow)?;
        } else if pow.unsigned_abs() > 38 {
            // Smaller than any representable unit.
            num = i128::from(num > 0);
        } else {
            let divisor = 10i128.pow(pow.unsigned_abs());
            num = div_ceil(num, divisor);
        }

        i64::try_from(num).map_err(|_| overflow())
    }

    fn describe(&self) -> String {
        format!("{}e{}*2^{}", self.mantissa, self.exp10, self.exp2)
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse a quantity string.
///
/// # Errors
///
/// Returns an error if the quantity is malformed.
pub fn parse_quantity(s: &str) -> Result<Quantity, QuantityError> {
    Quantity::parse(s)
}

fn parse_suffix(input: &str, suffix: &str) -> Result<(i32, u32), QuantityError> {
    let invalid = || QuantityError::InvalidSuffix {
        quantity: input.to_string(),
        suffix: suffix.to_string(),
    };

    let parsed = match suffix {
        "" => (0, 0),
        "Ki" => (0, 10),
        "Mi" => (0, 20),
        "Gi" => (0, 30),
        "Ti" => (0, 40),
        "Pi" => (0, 50),
        "Ei" => (0, 60),
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        s if s.len() > 1 && (s.starts_with('e') || s.starts_with('E')) => {
            let exp: i32 = s[1..].parse().map_err(|_| invalid())?;
            if exp.abs() > MAX_EXPONENT {
                return Err(QuantityError::Overflow(input.to_string()));
            }
            (exp, 0)
        }
        _ => return Err(invalid()),
    };

    Ok(parsed)
}

/// Ceiling division for a positive divisor.
const fn div_ceil(n: i128, d: i128) -> i128 {
    let q = n / d;
    if n % d > 0 {
        q + 1
    } else {
        q
    }
}

/// Format millicores the way Kubernetes prints CPU quantities.
#[must_use]
pub fn format_cpu(milli: i64) -> String {
    if milli % 1000 == 0 {
        format!("{}", milli / 1000)
    } else {
        format!("{milli}m")
    }
}

/// Format bytes using the largest binary suffix that divides them exactly.
#[must_use]
pub fn format_memory(bytes: i64) -> String {
    const SUFFIXES: [(&str, u32); 6] = [
        ("Ei", 60),
        ("Pi", 50),
        ("Ti", 40),
        ("Gi", 30),
        ("Mi", 20),
        ("Ki", 10),
    ];

    if bytes != 0 {
        for (suffix, shift) in SUFFIXES {
            let unit = 1i64 << shift;
            if bytes % unit == 0 {
                return format!("{}{suffix}", bytes / unit);
            }
        }
    }
    bytes.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milli(s: &str) -> i64 {
        Quantity::parse(s).unwrap().milli_value().unwrap()
    }

    fn value(s: &str) -> i64 {
        Quantity::parse(s).unwrap().value().unwrap()
    }

    #[test]
    fn cpu_quantities() {
        assert_eq!(milli("600m"), 600);
        assert_eq!(milli("1"), 1000);
        assert_eq!(milli("1.5"), 1500);
        assert_eq!(milli("0.1"), 100);
        assert_eq!(milli("250u"), 1);
        assert_eq!(milli("2k"), 2_000_000);
    }

    #[test]
    fn memory_quantities() {
        assert_eq!(value("1Gi"), 1 << 30);
        assert_eq!(value("400Mi"), 400 << 20);
        assert_eq!(value("128974848"), 128_974_848);
        assert_eq!(value("129e6"), 129_000_000);
        assert_eq!(value("129M"), 129_000_000);
        assert_eq!(value("1.5Gi"), 3 << 29);
    }

    #[test]
    fn values_round_up() {
        assert_eq!(value("100m"), 1);
        assert_eq!(value("1001m"), 2);
        assert_eq!(milli("1n"), 1);
        assert_eq!(value("0"), 0);
    }

    #[test]
    fn negative_quantities() {
        assert_eq!(milli("-500m"), -500);
        assert_eq!(value("-1Ki"), -1024);
    }

    #[test]
    fn invalid_quantities() {
        assert_eq!(Quantity::parse(""), Err(QuantityError::Empty));
        assert!(matches!(
            Quantity::parse("abc"),
            Err(QuantityError::InvalidNumber(_))
        ));
        assert!(matches!(
            Quantity::parse("1.2.3"),
            Err(QuantityError::InvalidNumber(_))
        ));
        assert!(matches!(
            Quantity::parse("10Qi"),
            Err(QuantityError::InvalidSuffix { .. })
        ));
        assert!(matches!(
            Quantity::parse("1e999"),
            Err(QuantityError::Overflow(_))
        ));
        assert!(Quantity::parse("100Ei").unwrap().value().is_err());
    }

    #[test]
    fn format_helpers() {
        assert_eq!(format_cpu(600), "600m");
        assert_eq!(format_cpu(2000), "2");
        assert_eq!(format_memory(400 << 20), "400Mi");
        assert_eq!(format_memory(1 << 30), "1Gi");
        assert_eq!(format_memory(1000), "1000");
        assert_eq!(format_memory(0), "0");
    }
}
