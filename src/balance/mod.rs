//! Balance - change detection over successive balance readings
//!
//! Readings arrive as display strings (`"1,500"`), so they are parsed into
//! `BigUint` before any comparison. The detector keeps the last raw reading
//! per account and reports how the next one relates to it.
//!
//! | previous | current | result |
//! |----------|---------|--------|
//! | (none) / `""` | any | `Baseline` |
//! | `0` | `0` | `Unchanged` |
//! | `1,000` | `1500` | `Increased` → celebrate + notify |
//! | `1500` | `1,000` | `Decreased` |

mod amount;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use num_traits::Zero;
use tracing::{debug, info, warn};

pub use amount::{sanitize_amount, validate_transfer_amount, AmountError};

/// Receives "the awaited balance change happened" signals.
pub trait UpdateNotifier {
    fn notify_balance_updated(&mut self);
}

impl UpdateNotifier for crate::refresh::RefreshScheduler {
    fn notify_balance_updated(&mut self) {
        crate::refresh::RefreshScheduler::notify_balance_updated(self);
    }
}

/// Side effect played when funds arrive (sound, flash, desktop notification).
///
/// Implementations are owned by the detector and released with it.
pub trait Celebrate: Send {
    fn celebrate(&mut self, increase: &BalanceIncrease);
}

impl<F> Celebrate for F
where
    F: FnMut(&BalanceIncrease) + Send,
{
    fn celebrate(&mut self, increase: &BalanceIncrease) {
        self(increase)
    }
}

/// Celebration that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCelebration;

impl Celebrate for LogCelebration {
    fn celebrate(&mut self, increase: &BalanceIncrease) {
        info!(
            account = %increase.account,
            received = %group_thousands(&increase.delta()),
            "balance increased"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BalanceError {
    #[error("Balance is empty")]
    Empty,
    #[error("Invalid balance: {0:?}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceIncrease {
    pub account: String,
    pub previous: BigUint,
    pub current: BigUint,
    pub observed_at: DateTime<Utc>,
}

impl BalanceIncrease {
    pub fn delta(&self) -> BigUint {
        &self.current - &self.previous
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceChange {
    /// First reading, nothing to compare against
    Baseline,
    Unchanged,
    Increased(BalanceIncrease),
    Decreased,
}

impl BalanceChange {
    pub fn is_increase(&self) -> bool {
        matches!(self, BalanceChange::Increased(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Also notify the scheduler when the balance drops (a sent transfer).
    pub notify_on_any_change: bool,
}

/// Tracks one account's balance readings.
pub struct BalanceChangeDetector<C: Celebrate> {
    account: String,
    config: DetectorConfig,
    previous: Option<String>,
    celebration: C,
}

impl<C: Celebrate> BalanceChangeDetector<C> {
    pub fn new(account: impl Into<String>, celebration: C) -> Self {
        Self { account: account.into(), config: DetectorConfig::default(), previous: None, celebration }
    }

    pub fn with_config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn previous_raw(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    /// Compare `raw` against the previous reading.
    ///
    /// The stored reading is replaced by `raw` whatever the outcome, including
    /// parse failures, so the next call compares against the latest value.
    pub fn observe(&mut self, raw: &str, notifier: &mut dyn UpdateNotifier) -> Result<BalanceChange, BalanceError> {
        let previous = self.previous.replace(raw.to_string());
        let previous = match previous {
            Some(p) if !p.is_empty() => p,
            _ => {
                debug!(account = %self.account, balance = raw, "baseline balance");
                return Ok(BalanceChange::Baseline);
            }
        };

        let current_value = parse_balance(raw).map_err(|e| {
            warn!(account = %self.account, balance = raw, error = %e, "unreadable balance");
            e
        })?;
        let previous_value = parse_balance(&previous)?;

        let increased =
            current_value != previous_value && (previous_value.is_zero() || current_value > previous_value);
        let change = if increased {
            BalanceChange::Increased(BalanceIncrease {
                account: self.account.clone(),
                previous: previous_value,
                current: current_value,
                observed_at: Utc::now(),
            })
        } else if current_value == previous_value {
            BalanceChange::Unchanged
        } else {
            BalanceChange::Decreased
        };

        match &change {
            BalanceChange::Increased(increase) => {
                info!(account = %self.account, from = %previous, to = raw, "balance increased");
                self.celebration.celebrate(increase);
                notifier.notify_balance_updated();
            }
            BalanceChange::Decreased => {
                info!(account = %self.account, from = %previous, to = raw, "balance decreased");
                if self.config.notify_on_any_change {
                    notifier.notify_balance_updated();
                }
            }
            BalanceChange::Baseline | BalanceChange::Unchanged => {}
        }
        Ok(change)
    }
}

/// Parse a non-negative integer, ignoring `,` `_` and space separators.
pub fn parse_balance(raw: &str) -> Result<BigUint, BalanceError> {
    let digits: String = raw.chars().filter(|c| !matches!(c, ',' | '_' | ' ')).collect();
    if digits.is_empty() {
        return Err(BalanceError::Empty);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BalanceError::Invalid(raw.to_string()));
    }
    BigUint::parse_bytes(digits.as_bytes(), 10).ok_or_else(|| BalanceError::Invalid(raw.to_string()))
}

/// `1234567` → `1,234,567`
pub fn group_thousands(value: &BigUint) -> String {
    let digits = value.to_str_radix(10);
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Display form of a raw token amount. Unreadable input renders as `"0"`.
pub fn format_balance(raw: &str) -> String {
    match parse_balance(raw) {
        Ok(value) => group_thousands(&value),
        Err(e) => {
            warn!(balance = raw, error = %e, "cannot format balance");
            "0".into()
        }
    }
}
