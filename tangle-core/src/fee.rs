//! Fee rule
//!
//! A percentage below a breakpoint, a flat fee at or above it. The schedule
//! is plain configuration; the engine only reads it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Breakpoint fee schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Amounts strictly below this pay `rate × amount`
    pub breakpoint: Decimal,

    /// Proportional rate (0.01 = 1%)
    pub rate: Decimal,

    /// Fee charged at or above the breakpoint
    pub flat_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            breakpoint: Decimal::new(1000, 0),
            rate: Decimal::new(1, 2),      // 1%
            flat_fee: Decimal::new(50, 0),
        }
    }
}

impl FeeSchedule {
    /// Fee owed for `amount`; an overflowing product is an invalid transaction
    pub fn fee_for(&self, amount: Decimal) -> crate::Result<Decimal> {
        if amount >= self.breakpoint {
            return Ok(self.flat_fee);
        }
        amount.checked_mul(self.rate).ok_or_else(|| {
            crate::Error::InvalidTransaction(format!(
                "fee for amount {} at rate {} overflows",
                amount, self.rate
            ))
        })
    }

    /// Reject schedules that could produce negative fees
    pub fn validate(&self) -> crate::Result<()> {
        if self.rate.is_sign_negative() || self.flat_fee.is_sign_negative() {
            return Err(crate::Error::Config(
                "fee rate and flat fee must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_below_breakpoint() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.fee_for(Decimal::new(500, 0)).unwrap(), Decimal::new(5, 0));
        assert_eq!(fees.fee_for(Decimal::new(99999, 2)).unwrap(), Decimal::new(99999, 4));
    }

    #[test]
    fn test_flat_at_and_above_breakpoint() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.fee_for(Decimal::new(1000, 0)).unwrap(), Decimal::new(50, 0));
        assert_eq!(fees.fee_for(Decimal::new(250_000, 0)).unwrap(), Decimal::new(50, 0));
    }

    #[test]
    fn test_zero_amount_is_free() {
        let fees = FeeSchedule::default();
        assert!(fees.fee_for(Decimal::ZERO).unwrap().is_zero());
    }

    #[test]
    fn test_overflowing_fee_is_error() {
        let fees = FeeSchedule {
            breakpoint: Decimal::MAX,
            rate: Decimal::new(10, 0),
            flat_fee: Decimal::new(50, 0),
        };
        let result = fees.fee_for(Decimal::MAX / Decimal::new(2, 0));
        assert!(matches!(result, Err(crate::Error::InvalidTransaction(_))));
    }

    #[test]
    fn test_negative_rate_rejected() {
        let fees = FeeSchedule {
            rate: Decimal::new(-1, 2),
            ..FeeSchedule::default()
        };
        assert!(fees.validate().is_err());
    }
}
