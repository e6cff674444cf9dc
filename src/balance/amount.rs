//! Transfer amount input - sanitize and validate against the available balance

use num_bigint::BigUint;
use num_traits::Zero;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{parse_balance, BalanceError};

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Please enter an amount")]
    Empty,
    #[error("Please enter a valid amount greater than 0")]
    NotPositive,
    #[error("Insufficient balance. You only have {available} sats available.")]
    InsufficientBalance { available: String },
    #[error(transparent)]
    Balance(#[from] BalanceError),
}

/// Keep only ASCII digits of a typed amount.
pub fn sanitize_amount(input: &str) -> String {
    NON_DIGITS.replace_all(input, "").into_owned()
}

/// Validate a typed amount (in sats) against the raw balance string.
///
/// Returns the amount to send.
pub fn validate_transfer_amount(input: &str, balance_raw: &str) -> Result<BigUint, AmountError> {
    let digits = sanitize_amount(input);
    if digits.is_empty() {
        return Err(AmountError::Empty);
    }
    let amount = BigUint::parse_bytes(digits.as_bytes(), 10).ok_or(AmountError::NotPositive)?;
    if amount.is_zero() {
        return Err(AmountError::NotPositive);
    }
    let available = parse_balance(balance_raw)?;
    if amount > available {
        return Err(AmountError::InsufficientBalance { available: balance_raw.to_string() });
    }
    Ok(amount)
}
