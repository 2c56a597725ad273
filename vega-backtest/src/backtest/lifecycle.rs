//! Leg lifecycle helpers: expiry settlement, theta decay between
//! reprices, and the early-exercise heuristic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::OptionContract;
use crate::math::{to_decimal, to_f64, PRICE_DP};

/// Settlement value of a contract at expiration.
pub fn simulate_option_expiry(contract: &OptionContract, underlying_price: Decimal) -> Decimal {
    contract.intrinsic_value(underlying_price)
}

/// Linear theta decay over `elapsed_days`. Negative for a long option
/// losing time value.
pub fn calculate_time_decay(contract: &OptionContract, elapsed_days: i64) -> Decimal {
    to_decimal(contract.greeks.theta * elapsed_days as f64, PRICE_DP)
}

/// When a deep in-the-money leg with little time value is settled early.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyExercisePolicy {
    pub enabled: bool,
    /// Minimum intrinsic value as a fraction of strike.
    pub deep_itm_threshold: f64,
    /// Maximum time value as a fraction of intrinsic value.
    pub time_value_threshold: f64,
}

impl Default for EarlyExercisePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            deep_itm_threshold: 0.10,
            time_value_threshold: 0.01,
        }
    }
}

impl EarlyExercisePolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// True when the contract is deep ITM and its remaining time value
/// (carried price minus intrinsic) is small relative to intrinsic.
pub fn handle_early_exercise(
    contract: &OptionContract,
    underlying_price: Decimal,
    policy: &EarlyExercisePolicy,
) -> bool {
    if !policy.enabled {
        return false;
    }
    let intrinsic = contract.intrinsic_value(underlying_price);
    if intrinsic <= Decimal::ZERO {
        return false;
    }

    let moneyness = to_f64(intrinsic / contract.strike());
    if moneyness < policy.deep_itm_threshold {
        return false;
    }

    let time_value = to_f64(contract.current_price - intrinsic);
    time_value < policy.time_value_threshold * to_f64(intrinsic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Greeks, OptionType};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn contract(option_type: OptionType, strike: Decimal, price: Decimal) -> OptionContract {
        let exp = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        OptionContract::new("X", "SPY", option_type, strike, exp)
            .unwrap()
            .with_price(price)
    }

    #[test]
    fn test_expiry_settles_at_intrinsic() {
        let call = contract(OptionType::Call, dec!(100), dec!(3));
        assert_eq!(simulate_option_expiry(&call, dec!(107.25)), dec!(7.25));
        assert_eq!(simulate_option_expiry(&call, dec!(95)), dec!(0));

        let put = contract(OptionType::Put, dec!(100), dec!(3));
        assert_eq!(simulate_option_expiry(&put, dec!(95)), dec!(5));
        assert_eq!(simulate_option_expiry(&put, dec!(100)), dec!(0));
    }

    #[test]
    fn test_time_decay_is_theta_times_days() {
        let c = contract(OptionType::Call, dec!(100), dec!(3)).with_greeks(Greeks {
            theta: -0.0125,
            ..Default::default()
        });
        assert_eq!(calculate_time_decay(&c, 4), dec!(-0.05));
        assert_eq!(calculate_time_decay(&c, 0), dec!(0));
    }

    #[test]
    fn test_early_exercise_deep_itm_low_time_value() {
        let policy = EarlyExercisePolicy::default();
        // Intrinsic 20 on a 100 strike, time value 0.10 < 1% of 20.
        let put = contract(OptionType::Put, dec!(100), dec!(20.10));
        assert!(handle_early_exercise(&put, dec!(80), &policy));

        // Same moneyness but plenty of time value left.
        let rich = contract(OptionType::Put, dec!(100), dec!(21.50));
        assert!(!handle_early_exercise(&rich, dec!(80), &policy));

        // Only 5% in the money.
        let shallow = contract(OptionType::Put, dec!(100), dec!(5.00));
        assert!(!handle_early_exercise(&shallow, dec!(95), &policy));

        assert!(!handle_early_exercise(&put, dec!(80), &EarlyExercisePolicy::disabled()));
    }

    #[test]
    fn test_out_of_the_money_never_exercises() {
        let call = contract(OptionType::Call, dec!(100), dec!(0));
        assert!(!handle_early_exercise(&call, dec!(90), &EarlyExercisePolicy::default()));
    }
}
