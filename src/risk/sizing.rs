use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BotError, Result};

/// Fixed-fractional risk settings, constant for the whole run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskParameters {
    /// Share of balance put at risk per trade, in (0, 1]
    pub risk_fraction: Decimal,
    /// Stop distance used for sizing, in pips
    pub stop_distance_pips: Decimal,
    /// Value of one pip per unit, in account currency
    pub pip_value: Decimal,
}

impl RiskParameters {
    pub fn validate(&self) -> Result<()> {
        if self.risk_fraction <= Decimal::ZERO || self.risk_fraction > Decimal::ONE {
            return Err(BotError::risk(format!(
                "risk fraction must be in (0, 1], got {}",
                self.risk_fraction
            )));
        }
        if self.stop_distance_pips <= Decimal::ZERO {
            return Err(BotError::risk(format!(
                "stop distance must be positive, got {} pips",
                self.stop_distance_pips
            )));
        }
        if self.pip_value <= Decimal::ZERO {
            return Err(BotError::risk(format!(
                "pip value must be positive, got {}",
                self.pip_value
            )));
        }
        Ok(())
    }
}

/// Units to trade so that hitting the stop loses `balance * risk_fraction`
///
/// `floor(balance * risk_fraction / (stop_distance_pips * pip_value))`.
/// Zero means the balance is too small to trade this cycle.
pub fn calculate_units(balance: Decimal, params: &RiskParameters) -> Result<u64> {
    if balance <= Decimal::ZERO {
        return Err(BotError::risk(format!(
            "balance must be positive, got {}",
            balance
        )));
    }
    params.validate()?;

    let risk_amount = balance
        .checked_mul(params.risk_fraction)
        .ok_or_else(|| BotError::risk("risk amount overflow"))?;
    let stop_value = params
        .stop_distance_pips
        .checked_mul(params.pip_value)
        .ok_or_else(|| BotError::risk("stop value overflow"))?;
    let units = risk_amount
        .checked_div(stop_value)
        .ok_or_else(|| BotError::risk("position size overflow"))?
        .floor();

    units
        .to_u64()
        .ok_or_else(|| BotError::risk(format!("position size {} out of range", units)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn params(risk: &str, stop: &str, pip_value: &str) -> RiskParameters {
        RiskParameters {
            risk_fraction: d(risk),
            stop_distance_pips: d(stop),
            pip_value: d(pip_value),
        }
    }

    #[test]
    fn test_reference_sizing() {
        let units = calculate_units(d("10000"), &params("0.05", "30", "0.0001")).unwrap();
        assert_eq!(units, 166666);
    }

    #[test]
    fn test_zero_balance_is_invalid() {
        let result = calculate_units(Decimal::ZERO, &params("0.05", "30", "0.0001"));
        assert!(matches!(result, Err(BotError::InvalidRiskParameters(_))));
    }

    #[test]
    fn test_negative_balance_is_invalid() {
        let result = calculate_units(d("-5"), &params("0.05", "30", "0.0001"));
        assert!(matches!(result, Err(BotError::InvalidRiskParameters(_))));
    }

    #[test]
    fn test_risk_fraction_bounds() {
        assert!(calculate_units(d("1000"), &params("0", "30", "0.0001")).is_err());
        assert!(calculate_units(d("1000"), &params("1.01", "30", "0.0001")).is_err());
        // Full balance at risk is allowed
        assert!(calculate_units(d("1000"), &params("1", "30", "0.0001")).is_ok());
    }

    #[test]
    fn test_stop_and_pip_value_must_be_positive() {
        assert!(calculate_units(d("1000"), &params("0.05", "0", "0.0001")).is_err());
        assert!(calculate_units(d("1000"), &params("0.05", "30", "0")).is_err());
        assert!(calculate_units(d("1000"), &params("0.05", "-30", "0.0001")).is_err());
    }

    #[test]
    fn test_tiny_balance_rounds_to_zero() {
        // 0.0001 * 0.05 / (30 * 1) rounds down to nothing
        let units = calculate_units(d("0.0001"), &params("0.05", "30", "1")).unwrap();
        assert_eq!(units, 0);
    }

    #[test]
    fn test_result_is_floored() {
        // 1000 * 0.01 / (7 * 0.0001) = 14285.71...
        let units = calculate_units(d("1000"), &params("0.01", "7", "0.0001")).unwrap();
        assert_eq!(units, 14285);
    }
}
