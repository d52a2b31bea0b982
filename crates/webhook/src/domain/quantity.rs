//! Kubernetes resource quantities with semantic comparison.
//!
//! Values are held as signed nano-units, the finest precision the API server
//! keeps. Anything finer is rounded up, matching how the control plane
//! canonicalizes quantities before they are persisted.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use thiserror::Error;

const NANOS_PER_UNIT: i128 = 1_000_000_000;
const MAX_EXPONENT: i32 = 100;

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

const BINARY_SUFFIXES: [&str; 7] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];

/// Notation a quantity was written in; kept so canonical output round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityFormat {
    DecimalSi,
    BinarySi,
    DecimalExponent,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("invalid number in quantity `{0}`")]
    InvalidNumber(String),
    #[error("unknown suffix `{suffix}` in quantity `{input}`")]
    UnknownSuffix { input: String, suffix: String },
    #[error("quantity `{0}` is out of range")]
    OutOfRange(String),
}

enum Scale {
    Decimal(i32),
    Binary(u32),
}

/// An amount of an allocatable resource, e.g. `1`, `500m` or `2Gi`.
#[derive(Debug, Clone, Copy)]
pub struct ResourceQuantity {
    nanos: i128,
    format: QuantityFormat,
}

impl ResourceQuantity {
    /// A whole number of units in decimal notation.
    pub const fn from_units(units: i64) -> Self {
        Self {
            nanos: units as i128 * NANOS_PER_UNIT,
            format: QuantityFormat::DecimalSi,
        }
    }

    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (negative, unsigned) = match trimmed.as_bytes()[0] {
            b'-' => (true, &trimmed[1..]),
            b'+' => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let number_end = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_end);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
            return Err(QuantityError::InvalidNumber(input.to_string()));
        }

        let mantissa: i128 = format!("{int_part}{frac_part}")
            .parse()
            .map_err(|_| QuantityError::OutOfRange(input.to_string()))?;
        let frac_digits = u32::try_from(frac_part.len())
            .map_err(|_| QuantityError::OutOfRange(input.to_string()))?;

        let (scale, format) = parse_suffix(input, suffix)?;
        let magnitude = match scale {
            Scale::Decimal(exponent) => {
                scale_decimal(mantissa, exponent + 9 - frac_digits as i32)
            }
            Scale::Binary(power) => scale_binary(mantissa, power, frac_digits),
        }
        .ok_or_else(|| QuantityError::OutOfRange(input.to_string()))?;

        Ok(Self {
            nanos: if negative { -magnitude } else { magnitude },
            format,
        })
    }

    pub const fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    /// Whether the quantity is at least `units` whole units.
    pub const fn is_at_least(&self, units: i64) -> bool {
        self.nanos >= units as i128 * NANOS_PER_UNIT
    }

    pub const fn format(&self) -> QuantityFormat {
        self.format
    }
}

fn parse_suffix(input: &str, suffix: &str) -> Result<(Scale, QuantityFormat), QuantityError> {
    if let Some(&(_, exponent)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Ok((Scale::Decimal(exponent), QuantityFormat::DecimalSi));
    }

    if let Some(power) = BINARY_SUFFIXES
        .iter()
        .skip(1)
        .position(|s| *s == suffix)
    {
        return Ok((Scale::Binary(power as u32 + 1), QuantityFormat::BinarySi));
    }

    if let Some(exponent) = suffix
        .strip_prefix(['e', 'E'])
        .and_then(|exp| exp.parse::<i32>().ok())
    {
        if exponent.abs() > MAX_EXPONENT {
            return Err(QuantityError::OutOfRange(input.to_string()));
        }
        return Ok((Scale::Decimal(exponent), QuantityFormat::DecimalExponent));
    }

    Err(QuantityError::UnknownSuffix {
        input: input.to_string(),
        suffix: suffix.to_string(),
    })
}

/// `mantissa * 10^shift`, rounding a fractional result up.
fn scale_decimal(mantissa: i128, shift: i32) -> Option<i128> {
    if shift >= 0 {
        return 10_i128
            .checked_pow(shift as u32)
            .and_then(|factor| mantissa.checked_mul(factor));
    }
    match 10_i128.checked_pow(shift.unsigned_abs()) {
        Some(divisor) => Some(div_ceil(mantissa, divisor)),
        None => Some(i128::from(mantissa != 0)),
    }
}

/// `mantissa * 1024^power * 10^9 / 10^frac_digits`, rounding up.
fn scale_binary(mantissa: i128, power: u32, frac_digits: u32) -> Option<i128> {
    let numerator = 1024_i128
        .checked_pow(power)
        .and_then(|factor| factor.checked_mul(NANOS_PER_UNIT))
        .and_then(|factor| mantissa.checked_mul(factor))?;
    let divisor = 10_i128.checked_pow(frac_digits)?;
    Some(div_ceil(numerator, divisor))
}

fn div_ceil(value: i128, divisor: i128) -> i128 {
    value / divisor + i128::from(value % divisor != 0)
}

impl FromStr for ResourceQuantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&Quantity> for ResourceQuantity {
    type Error = QuantityError;

    fn try_from(quantity: &Quantity) -> Result<Self, Self::Error> {
        Self::parse(&quantity.0)
    }
}

impl From<&ResourceQuantity> for Quantity {
    fn from(quantity: &ResourceQuantity) -> Self {
        Quantity(quantity.to_string())
    }
}

impl PartialEq for ResourceQuantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for ResourceQuantity {}

impl Hash for ResourceQuantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

impl PartialOrd for ResourceQuantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceQuantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

/// Canonical form: the largest suffix that keeps the value integral.
impl fmt::Display for ResourceQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.nanos < 0 { "-" } else { "" };
        let magnitude = self.nanos.unsigned_abs();
        let nanos_per_unit = NANOS_PER_UNIT as u128;

        if magnitude == 0 {
            return write!(f, "0");
        }

        if self.format == QuantityFormat::BinarySi
            && magnitude % nanos_per_unit == 0
            && magnitude >= 1024 * nanos_per_unit
        {
            let mut units = magnitude / nanos_per_unit;
            let mut power = 0;
            while power < BINARY_SUFFIXES.len() - 1 && units % 1024 == 0 {
                units /= 1024;
                power += 1;
            }
            return write!(f, "{sign}{units}{}", BINARY_SUFFIXES[power]);
        }

        let mut value = magnitude;
        let mut exponent = -9;
        while exponent < 18 && value % 1000 == 0 {
            value /= 1000;
            exponent += 3;
        }

        match self.format {
            QuantityFormat::DecimalExponent if exponent != 0 => {
                write!(f, "{sign}{value}e{exponent}")
            }
            QuantityFormat::DecimalExponent => write!(f, "{sign}{value}"),
            _ => {
                let suffix = DECIMAL_SUFFIXES
                    .iter()
                    .find(|(_, exp)| *exp == exponent)
                    .map(|(s, _)| *s)
                    .unwrap_or_default();
                write!(f, "{sign}{value}{suffix}")
            }
        }
    }
}
