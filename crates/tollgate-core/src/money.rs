// SPDX-License-Identifier: BUSL-1.1
//! # Deterministic Money Amounts
//!
//! `MoneyAmount` carries a currency code and a decimal-string value. Values
//! are never floats: comparison and threshold checks parse the string into
//! integer scaled units at a fixed scale of 18 fractional digits, matching
//! the deterministic-amount rules used across the wire formats.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum fractional digits accepted in a decimal value string.
pub const MAX_FRACTION_DIGITS: u32 = 18;

/// Errors arising from money amount parsing and arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The value string is not a well-formed decimal number.
    #[error("invalid decimal value: {0:?}")]
    InvalidDecimal(String),

    /// More than [`MAX_FRACTION_DIGITS`] fractional digits.
    #[error("too many fraction digits in {0:?} (max {MAX_FRACTION_DIGITS})")]
    TooManyFractionDigits(String),

    /// The scaled value overflows i128.
    #[error("amount overflow: {0:?}")]
    Overflow(String),

    /// The currency code is empty.
    #[error("currency code must be non-empty")]
    EmptyCurrency,
}

/// Deterministic currency amount. `value` is a decimal string (never float).
///
/// The currency code is ISO 4217 preferred (e.g. "USD", "EUR") but any
/// non-empty code is accepted; matching is exact on the code string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoneyAmount {
    /// Currency or unit code (ISO 4217 preferred).
    pub currency: String,
    /// Decimal string with up to 18 fractional digits.
    pub value: String,
}

impl MoneyAmount {
    /// Construct an amount from a currency code and decimal value string.
    pub fn new(currency: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            value: value.into(),
        }
    }

    /// Parse the decimal value into integer units scaled by 10^18.
    ///
    /// Accepts an optional leading `-`, an integer part, and an optional
    /// fraction part. Rejects empty strings, bare signs, exponents, and
    /// anything that is not ASCII digits and at most one `.`.
    pub fn scaled_units(&self) -> Result<i128, MoneyError> {
        let raw = self.value.trim();
        let (negative, digits) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if digits.is_empty() {
            return Err(MoneyError::InvalidDecimal(self.value.clone()));
        }

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(MoneyError::InvalidDecimal(self.value.clone()));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(MoneyError::InvalidDecimal(self.value.clone()));
        }
        if frac_part.len() as u32 > MAX_FRACTION_DIGITS {
            return Err(MoneyError::TooManyFractionDigits(self.value.clone()));
        }

        let overflow = || MoneyError::Overflow(self.value.clone());

        let mut units: i128 = 0;
        for c in int_part.chars() {
            units = units
                .checked_mul(10)
                .and_then(|u| u.checked_add((c as u8 - b'0') as i128))
                .ok_or_else(overflow)?;
        }
        // Scale the integer part to 18 fractional digits.
        units = units
            .checked_mul(10i128.pow(MAX_FRACTION_DIGITS))
            .ok_or_else(overflow)?;

        let mut frac: i128 = 0;
        for c in frac_part.chars() {
            frac = frac * 10 + (c as u8 - b'0') as i128;
        }
        frac *= 10i128.pow(MAX_FRACTION_DIGITS - frac_part.len() as u32);

        units = units.checked_add(frac).ok_or_else(overflow)?;
        Ok(if negative { -units } else { units })
    }

    /// True when the value parses and is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        matches!(self.scaled_units(), Ok(u) if u > 0)
    }

    /// Validate the amount: non-empty currency and a parseable value.
    pub fn validate(&self) -> Result<(), MoneyError> {
        if self.currency.trim().is_empty() {
            return Err(MoneyError::EmptyCurrency);
        }
        self.scaled_units().map(|_| ())
    }

    /// Numeric-and-currency equality: `"50.00 USD" == "50.0 USD"`.
    ///
    /// Unparseable values are never equal to anything.
    pub fn matches(&self, other: &MoneyAmount) -> bool {
        if self.currency != other.currency {
            return false;
        }
        match (self.scaled_units(), other.scaled_units()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}
