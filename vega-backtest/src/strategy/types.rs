//! Multi-leg strategy model.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::OptionContract;

use super::validator::StrategyError;

/// Side of a leg. Exposure sign comes from here, never from the quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegAction {
    Buy,
    Sell,
}

impl LegAction {
    /// +1 for long exposure, -1 for short.
    pub fn sign(&self) -> i64 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }

    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Buy => amount,
            Self::Sell => -amount,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyLeg {
    pub contract: OptionContract,
    pub action: LegAction,
    quantity: u32,
}

impl StrategyLeg {
    pub fn new(contract: OptionContract, action: LegAction, quantity: u32) -> Result<Self, StrategyError> {
        if quantity == 0 {
            return Err(StrategyError::InvalidQuantity { leg: contract.id });
        }
        Ok(Self {
            contract,
            action,
            quantity,
        })
    }

    pub fn buy(contract: OptionContract, quantity: u32) -> Result<Self, StrategyError> {
        Self::new(contract, LegAction::Buy, quantity)
    }

    pub fn sell(contract: OptionContract, quantity: u32) -> Result<Self, StrategyError> {
        Self::new(contract, LegAction::Sell, quantity)
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Quantity with the action's sign applied.
    pub fn signed_quantity(&self) -> i64 {
        self.action.sign() * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyType {
    SingleLeg,
    Straddle,
    Strangle,
    IronCondor,
    Butterfly,
}

impl StrategyType {
    pub fn expected_legs(&self) -> usize {
        match self {
            Self::SingleLeg => 1,
            Self::Straddle | Self::Strangle => 2,
            Self::Butterfly => 3,
            Self::IronCondor => 4,
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SingleLeg => "single leg",
            Self::Straddle => "straddle",
            Self::Strangle => "strangle",
            Self::IronCondor => "iron condor",
            Self::Butterfly => "butterfly",
        };
        f.write_str(name)
    }
}

/// An ordered set of legs with a type tag.
///
/// Construction does not check the legs against the tag; that is the
/// job of [`super::StrategyValidator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub strategy_type: StrategyType,
    pub legs: Vec<StrategyLeg>,
}

impl Strategy {
    pub fn new(id: impl Into<String>, name: impl Into<String>, strategy_type: StrategyType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            strategy_type,
            legs: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn add_leg(&mut self, leg: StrategyLeg) {
        self.legs.push(leg);
    }

    pub fn num_legs(&self) -> usize {
        self.legs.len()
    }

    /// Premium paid (positive) or received (negative) per unit multiplier
    /// at the contracts' current prices.
    pub fn net_premium(&self) -> Decimal {
        self.legs
            .iter()
            .map(|leg| leg.action.signed(leg.contract.current_price * Decimal::from(leg.quantity)))
            .sum()
    }

    pub fn is_credit(&self) -> bool {
        self.net_premium() < Decimal::ZERO
    }

    /// Latest expiration across the legs.
    pub fn last_expiration(&self) -> Option<chrono::NaiveDate> {
        self.legs.iter().map(|leg| leg.contract.expiration()).max()
    }
}
