//! Line calculator, shared by statement lines and amendments.

use crate::error::{LedgerError, Result};
use crate::models::{LineFigures, LineKind};
use bigdecimal::{BigDecimal, FromPrimitive, Zero};
use serde_json::Value;
use std::str::FromStr;

/// Longest numeric text accepted, after normalization.
const MAX_INPUT_LEN: usize = 32;
/// Largest magnitude of one entered figure. Keeps `qty × price` inside NUMERIC(18, 2).
const MAX_INTEGER_DIGITS: i64 = 8;
const MAX_FRACTION_DIGITS: i64 = 6;

/// Rounds to cents, half away from zero.
pub fn round2(value: &BigDecimal) -> BigDecimal {
    value.round(2)
}

/// Strips whitespace (including non-breaking spaces) and `/`, and turns a
/// decimal comma into a dot.
pub fn normalize_numeric(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '/')
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

/// Parses a user-entered number. Anything unparseable counts as zero.
pub fn parse_lenient(raw: &str) -> BigDecimal {
    BigDecimal::from_str(&normalize_numeric(raw)).unwrap_or_else(|_| BigDecimal::zero())
}

/// Non-finite floats count as zero.
pub fn from_f64(value: f64) -> BigDecimal {
    if value.is_finite() {
        BigDecimal::from_f64(value).unwrap_or_else(BigDecimal::zero)
    } else {
        BigDecimal::zero()
    }
}

/// Rejects figures too large or too finely divided to store.
///
/// Trailing zeros of the significand don't count, so `1.500000000` passes.
pub fn check_bounds(value: BigDecimal) -> Result<BigDecimal> {
    let (significand, scale) = value.as_bigint_and_exponent();
    if significand.is_zero() {
        return Ok(BigDecimal::zero());
    }

    let digits = significand.magnitude().to_string();
    let significant = digits.trim_end_matches('0');
    let trailing_zeros = (digits.len() - significant.len()) as i64;
    let fraction_digits = scale.saturating_sub(trailing_zeros);
    let integer_digits = (significant.len() as i64).saturating_sub(fraction_digits);

    if integer_digits > MAX_INTEGER_DIGITS || fraction_digits > MAX_FRACTION_DIGITS {
        return Err(LedgerError::validation(format!(
            "number out of range: at most {} integer and {} decimal digits",
            MAX_INTEGER_DIGITS, MAX_FRACTION_DIGITS
        )));
    }
    Ok(value)
}

/// Coerces a JSON value supplied for a numeric field.
///
/// `null` and unparseable strings become zero; booleans, arrays, objects and
/// out-of-range figures are rejected.
pub fn coerce(value: &Value) -> Result<BigDecimal> {
    match value {
        Value::Null => Ok(BigDecimal::zero()),
        Value::Number(n) => check_bounds(
            BigDecimal::from_str(&n.to_string())
                .unwrap_or_else(|_| n.as_f64().map(from_f64).unwrap_or_else(BigDecimal::zero)),
        ),
        Value::String(s) => {
            if normalize_numeric(s).len() > MAX_INPUT_LEN {
                return Err(LedgerError::validation("number text too long"));
            }
            check_bounds(parse_lenient(s))
        }
        other => Err(LedgerError::validation(format!(
            "expected a number, got {}",
            other
        ))),
    }
}

/// Coerces an optional patch field, falling back to the stored value.
pub fn coerce_or(value: Option<&Value>, fallback: &BigDecimal) -> Result<BigDecimal> {
    match value {
        Some(v) => coerce(v),
        None => Ok(fallback.clone()),
    }
}

/// Computes the derived figures of one row.
///
/// `precedent_amount` is taken as entered (rounded) when given, otherwise it
/// follows `precedent_qty × unit_price`. Headings are always all zero.
pub fn compute_line(
    kind: LineKind,
    unit_price: BigDecimal,
    precedent_qty: BigDecimal,
    current_qty: BigDecimal,
    precedent_amount: Option<BigDecimal>,
) -> LineFigures {
    if kind.is_heading() {
        return zero_figures();
    }

    let total_qty = &precedent_qty + &current_qty;
    let precedent_amount = match precedent_amount {
        Some(amount) => round2(&amount),
        None => round2(&(&precedent_qty * &unit_price)),
    };
    let current_amount = round2(&(&current_qty * &unit_price));
    let total_amount = round2(&(&precedent_amount + &current_amount));

    LineFigures {
        unit_price,
        precedent_qty,
        current_qty,
        total_qty,
        precedent_amount,
        current_amount,
        total_amount,
    }
}

pub fn zero_figures() -> LineFigures {
    LineFigures {
        unit_price: BigDecimal::zero(),
        precedent_qty: BigDecimal::zero(),
        current_qty: BigDecimal::zero(),
        total_qty: BigDecimal::zero(),
        precedent_amount: BigDecimal::zero(),
        current_amount: BigDecimal::zero(),
        total_amount: BigDecimal::zero(),
    }
}
