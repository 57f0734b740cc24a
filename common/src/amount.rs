use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AmountError;

/// Fixed denomination used throughout the ledger: every `Amount` is an
/// integral count of this many fractional units (mirrors the teacher's
/// `COIN_VALUE` convention in `tos_common::config`).
pub const DENOMINATION: u64 = 1_000_000;

/// A non-negative amount, represented as integral + fractional parts in a
/// fixed denomination (spec.md §3, "integral and fractional in fixed
/// denomination"). Internally stored as a single `u64` of fractional units
/// to make arithmetic trivial and overflow-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_units(units: u64) -> Self {
        Amount(units)
    }

    pub fn from_integral_fractional(integral: u64, fractional: u64) -> Result<Self, AmountError> {
        let scaled = integral
            .checked_mul(DENOMINATION)
            .ok_or(AmountError::Overflow)?;
        scaled
            .checked_add(fractional)
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    pub fn units(&self) -> u64 {
        self.0
    }

    pub fn integral(&self) -> u64 {
        self.0 / DENOMINATION
    }

    pub fn fractional(&self) -> u64 {
        self.0 % DENOMINATION
    }

    pub fn checked_add(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    /// Subtracts `rhs` from `self`, returning an `Insufficient` error rather
    /// than panicking/wrapping. Callers that need a *tentative* debit which
    /// is allowed to go negative (Phase A of the validator) track that via
    /// signed deltas, not via this method.
    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.0.checked_sub(rhs.0).map(Amount).ok_or(AmountError::Insufficient {
            need: rhs.0,
            have: self.0,
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.integral(), self.fractional())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_fractional_round_trip() {
        let a = Amount::from_integral_fractional(12, 345).unwrap();
        assert_eq!(a.integral(), 12);
        assert_eq!(a.fractional(), 345);
    }

    #[test]
    fn checked_sub_reports_shortfall() {
        let a = Amount::from_units(10);
        let err = a.checked_sub(Amount::from_units(11)).unwrap_err();
        assert_eq!(err, AmountError::Insufficient { need: 11, have: 10 });
    }

    #[test]
    fn checked_add_overflow() {
        let a = Amount::from_units(u64::MAX);
        assert_eq!(a.checked_add(Amount::from_units(1)), Err(AmountError::Overflow));
    }
}
