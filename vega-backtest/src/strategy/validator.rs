//! Structural checks of a strategy against its type tag.
//!
//! Leg count is always checked. Beyond that, each named structure has a
//! shape: a straddle is a call and a put at the same strike, a butterfly
//! has a body twice the size of each wing, and so on.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::data::OptionType;

use super::types::{LegAction, Strategy, StrategyLeg, StrategyType};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("strategy has no legs")]
    Empty,

    #[error("{strategy_type} needs {expected} legs, got {actual}")]
    LegCountMismatch {
        strategy_type: StrategyType,
        expected: usize,
        actual: usize,
    },

    #[error("leg {leg} has zero quantity")]
    InvalidQuantity { leg: String },

    #[error("invalid {strategy_type}: {reason}")]
    InvalidShape {
        strategy_type: StrategyType,
        reason: String,
    },

    #[error("legs reference different underlyings: {first} and {other}")]
    MixedUnderlyings { first: String, other: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyValidator;

impl StrategyValidator {
    pub fn validate(strategy: &Strategy) -> Result<(), StrategyError> {
        let legs = &strategy.legs;
        if legs.is_empty() {
            return Err(StrategyError::Empty);
        }

        let expected = strategy.strategy_type.expected_legs();
        if legs.len() != expected {
            return Err(StrategyError::LegCountMismatch {
                strategy_type: strategy.strategy_type,
                expected,
                actual: legs.len(),
            });
        }

        if let Some(leg) = legs.iter().find(|leg| leg.quantity() == 0) {
            return Err(StrategyError::InvalidQuantity {
                leg: leg.contract.id.clone(),
            });
        }

        let first = &legs[0].contract.underlying;
        if let Some(other) = legs.iter().find(|leg| &leg.contract.underlying != first) {
            return Err(StrategyError::MixedUnderlyings {
                first: first.clone(),
                other: other.contract.underlying.clone(),
            });
        }

        let shape = ShapeCheck {
            strategy_type: strategy.strategy_type,
            legs,
        };
        match strategy.strategy_type {
            StrategyType::SingleLeg => Ok(()),
            StrategyType::Straddle => shape.straddle(),
            StrategyType::Strangle => shape.strangle(),
            StrategyType::Butterfly => shape.butterfly(),
            StrategyType::IronCondor => shape.iron_condor(),
        }
    }
}

struct ShapeCheck<'a> {
    strategy_type: StrategyType,
    legs: &'a [StrategyLeg],
}

impl ShapeCheck<'_> {
    fn fail(&self, reason: impl Into<String>) -> Result<(), StrategyError> {
        Err(StrategyError::InvalidShape {
            strategy_type: self.strategy_type,
            reason: reason.into(),
        })
    }

    fn same_expiration(&self) -> bool {
        let first = self.legs[0].contract.expiration();
        self.legs.iter().all(|leg| leg.contract.expiration() == first)
    }

    fn call_and_put(&self) -> Option<(&StrategyLeg, &StrategyLeg)> {
        let call = self
            .legs
            .iter()
            .find(|leg| leg.contract.option_type == OptionType::Call)?;
        let put = self
            .legs
            .iter()
            .find(|leg| leg.contract.option_type == OptionType::Put)?;
        Some((call, put))
    }

    fn straddle(&self) -> Result<(), StrategyError> {
        let Some((call, put)) = self.call_and_put() else {
            return self.fail("needs one call and one put");
        };
        if !self.same_expiration() {
            return self.fail("legs must share an expiration");
        }
        if call.contract.strike() != put.contract.strike() {
            return self.fail("call and put must share a strike");
        }
        Ok(())
    }

    fn strangle(&self) -> Result<(), StrategyError> {
        let Some((call, put)) = self.call_and_put() else {
            return self.fail("needs one call and one put");
        };
        if !self.same_expiration() {
            return self.fail("legs must share an expiration");
        }
        if call.contract.strike() == put.contract.strike() {
            return self.fail("call and put strikes must differ");
        }
        Ok(())
    }

    fn butterfly(&self) -> Result<(), StrategyError> {
        let option_type = self.legs[0].contract.option_type;
        if self.legs.iter().any(|leg| leg.contract.option_type != option_type) {
            return self.fail("all legs must be the same option type");
        }
        if !self.same_expiration() {
            return self.fail("legs must share an expiration");
        }

        let mut sorted: Vec<&StrategyLeg> = self.legs.iter().collect();
        sorted.sort_by_key(|leg| leg.contract.strike());
        let (low, body, high) = (sorted[0], sorted[1], sorted[2]);

        if low.contract.strike() == body.contract.strike() || body.contract.strike() == high.contract.strike() {
            return self.fail("strikes must be distinct");
        }
        if low.action != high.action || body.action != low.action.opposite() {
            return self.fail("wings must share a side opposite the body");
        }
        if body.quantity() != low.quantity() + high.quantity() {
            return self.fail("body quantity must equal the sum of the wings");
        }
        Ok(())
    }

    fn iron_condor(&self) -> Result<(), StrategyError> {
        if !self.same_expiration() {
            return self.fail("legs must share an expiration");
        }
        let (puts, calls): (Vec<&StrategyLeg>, Vec<&StrategyLeg>) = self
            .legs
            .iter()
            .partition(|leg| leg.contract.option_type == OptionType::Put);
        if puts.len() != 2 || calls.len() != 2 {
            return self.fail("needs two puts and two calls");
        }

        for (side, pair) in [("put", &puts), ("call", &calls)] {
            let buys = pair.iter().filter(|leg| leg.action == LegAction::Buy).count();
            if buys != 1 {
                return self.fail(format!("{side} pair must be one long and one short"));
            }
        }

        let max_put = puts.iter().map(|leg| leg.contract.strike()).max().unwrap_or(Decimal::ZERO);
        let min_call = calls
            .iter()
            .map(|leg| leg.contract.strike())
            .min()
            .unwrap_or(Decimal::ZERO);
        if max_put > min_call {
            return self.fail("put strikes must not exceed call strikes");
        }
        Ok(())
    }
}
