//! Portfolio Greeks aggregation.
//!
//! Net exposure across active legs, each leg weighted by its signed
//! contract count and the contract multiplier:
//! - Delta: sum(leg_delta * signed_quantity * multiplier)
//! - Gamma, theta, vega and rho likewise

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::ActiveLeg;
use crate::data::Greeks;
use crate::math::to_f64;

/// Aggregated portfolio Greeks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioGreeks {
    /// Net delta exposure (shares equivalent).
    pub delta: f64,
    /// Net gamma exposure.
    pub gamma: f64,
    /// Net theta (daily decay in currency).
    pub theta: f64,
    /// Net vega per vol point.
    pub vega: f64,
    /// Net rho per rate point.
    pub rho: f64,
    /// Number of legs included.
    pub legs: usize,
}

impl PortfolioGreeks {
    /// Calculate portfolio Greeks from the active legs.
    pub fn from_legs(legs: &[ActiveLeg], multiplier: Decimal) -> Self {
        let multiplier = to_f64(multiplier);
        let mut total = Greeks::default();
        for leg in legs {
            let weight = leg.leg.signed_quantity() as f64 * multiplier;
            total += leg.contract().greeks.scale(weight);
        }

        Self {
            delta: total.delta,
            gamma: total.gamma,
            theta: total.theta,
            vega: total.vega,
            rho: total.rho,
            legs: legs.len(),
        }
    }

    /// Check if portfolio is delta neutral (within threshold).
    pub fn is_delta_neutral(&self, threshold: f64) -> bool {
        self.delta.abs() <= threshold
    }
}
