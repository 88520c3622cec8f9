//! Kubernetes resource quantity parsing and summation.
//!
//! `k8s-openapi` carries quantities as opaque strings, so volume sizes are
//! parsed here into an exact nano-unit integer, added up, and rendered back
//! in the suffix family of the first summand (`1Gi + 2Gi` is `3Gi`).

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::fmt;
use thiserror::Error;

const NANOS: i128 = 1_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,

    #[error("invalid quantity '{0}'")]
    Invalid(String),

    #[error("quantity '{0}' is out of range")]
    Overflow(String),

    #[error("quantity '{0}' is negative")]
    Negative(String),
}

/// Suffix family a quantity was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityFormat {
    /// `Ki`, `Mi`, `Gi`, ...
    BinarySi,
    /// `m`, `k`, `M`, `G`, ...
    DecimalSi,
}

/// An exact, parsed quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedQuantity {
    nanos: i128,
    format: QuantityFormat,
}

const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 1),
    ("Mi", 2),
    ("Gi", 3),
    ("Ti", 4),
    ("Pi", 5),
    ("Ei", 6),
];

const DECIMAL_SUFFIXES: [(&str, i32); 10] = [
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("", 0),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

impl ParsedQuantity {
    #[must_use]
    pub const fn zero(format: QuantityFormat) -> Self {
        Self { nanos: 0, format }
    }

    #[must_use]
    pub const fn format(&self) -> QuantityFormat {
        self.format
    }

    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.nanos < 0
    }

    /// Parse a quantity string such as `512Mi` or `1.5G`.
    ///
    /// Exponent notation (`2e3`) is not accepted.
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(QuantityError::Empty);
        }
        let invalid = || QuantityError::Invalid(input.to_string());
        let overflow = || QuantityError::Overflow(input.to_string());

        let (negative, unsigned) = match raw.as_bytes()[0] {
            b'-' => (true, &raw[1..]),
            b'+' => (false, &raw[1..]),
            _ => (false, raw),
        };

        let number_len = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_len);

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(invalid());
        }

        let mut mantissa: i128 = 0;
        for digit in whole.bytes().chain(fraction.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(digit - b'0')))
                .ok_or_else(overflow)?;
        }
        let denominator = pow10(u32::try_from(fraction.len()).map_err(|_| overflow())?)
            .ok_or_else(overflow)?;

        let (mut numerator, format) = if let Some((_, power)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
            let factor = 1i128 << (10 * power);
            let value = mantissa
                .checked_mul(factor)
                .and_then(|v| v.checked_mul(NANOS))
                .ok_or_else(overflow)?;
            (value, QuantityFormat::BinarySi)
        } else if let Some((_, exponent)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
            let factor = pow10((exponent + 9).unsigned_abs()).ok_or_else(overflow)?;
            (mantissa.checked_mul(factor).ok_or_else(overflow)?, QuantityFormat::DecimalSi)
        } else {
            return Err(invalid());
        };

        // Sub-nano remainders round up, matching the API server.
        numerator = numerator / denominator + i128::from(numerator % denominator != 0);

        Ok(Self {
            nanos: if negative { -numerator } else { numerator },
            format,
        })
    }

    /// Add `other`, keeping this quantity's format.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        let nanos = self
            .nanos
            .checked_add(other.nanos)
            .ok_or_else(|| QuantityError::Overflow(format!("{self} + {other}")))?;
        Ok(Self {
            nanos,
            format: self.format,
        })
    }

    #[must_use]
    pub fn to_quantity(&self) -> Quantity {
        Quantity(self.to_string())
    }
}

/// Parse and add every size, keeping the first size's format.
///
/// An empty input sums to `0`.
pub fn sum<'a, I>(sizes: I) -> Result<ParsedQuantity, QuantityError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total: Option<ParsedQuantity> = None;
    for size in sizes {
        let parsed = ParsedQuantity::parse(size)?;
        if parsed.is_negative() {
            return Err(QuantityError::Negative(size.to_string()));
        }
        total = Some(match total {
            Some(acc) => acc.checked_add(parsed)?,
            None => parsed,
        });
    }
    Ok(total.unwrap_or(ParsedQuantity::zero(QuantityFormat::DecimalSi)))
}

impl fmt::Display for ParsedQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return f.write_str("0");
        }
        let sign = if self.nanos < 0 { "-" } else { "" };
        let magnitude = self.nanos.abs();

        if self.format == QuantityFormat::BinarySi && magnitude % NANOS == 0 {
            let units = magnitude / NANOS;
            for (suffix, power) in BINARY_SUFFIXES.iter().rev() {
                let factor = 1i128 << (10 * power);
                if units % factor == 0 {
                    return write!(f, "{sign}{}{suffix}", units / factor);
                }
            }
            return write!(f, "{sign}{units}");
        }

        for (suffix, exponent) in DECIMAL_SUFFIXES.iter().rev() {
            let Some(factor) = pow10((exponent + 9).unsigned_abs()) else {
                continue;
            };
            if magnitude % factor == 0 {
                return write!(f, "{sign}{}{suffix}", magnitude / factor);
            }
        }
        // Unreachable in practice: the `n` row always divides.
        write!(f, "{sign}{magnitude}n")
    }
}

fn pow10(exp: u32) -> Option<i128> {
    10i128.checked_pow(exp)
}
