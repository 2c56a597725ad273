//! Commission model for option orders.
//!
//! Each leg trade is one order. Expiry settlement is free; opening,
//! closing and exercise are charged per contract, bounded by the per-order
//! minimum and maximum.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::trade::TradeAction;

/// Commission for a single order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Commission {
    pub contracts: u32,
    pub per_contract: Decimal,
    pub total: Decimal,
}

/// Configurable commission model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionModel {
    /// Commission per contract.
    pub per_contract: Decimal,
    /// Minimum commission per order.
    pub min_per_order: Decimal,
    /// Maximum commission per order (0 = unlimited).
    pub max_per_order: Decimal,
}

impl Default for CommissionModel {
    fn default() -> Self {
        Self {
            per_contract: Decimal::ONE,
            min_per_order: Decimal::ZERO,
            max_per_order: Decimal::ZERO,
        }
    }
}

impl CommissionModel {
    pub fn new(per_contract: Decimal) -> Self {
        Self {
            per_contract,
            ..Default::default()
        }
    }

    /// Create a zero-commission model.
    pub fn zero() -> Self {
        Self {
            per_contract: Decimal::ZERO,
            min_per_order: Decimal::ZERO,
            max_per_order: Decimal::ZERO,
        }
    }

    pub fn with_limits(mut self, min_per_order: Decimal, max_per_order: Decimal) -> Self {
        self.min_per_order = min_per_order;
        self.max_per_order = max_per_order;
        self
    }

    /// Calculate commission for an order of `contracts`.
    pub fn calculate(&self, contracts: u32) -> Commission {
        let mut total = self.per_contract * Decimal::from(contracts);

        if total < self.min_per_order {
            total = self.min_per_order;
        }
        if self.max_per_order > Decimal::ZERO && total > self.max_per_order {
            total = self.max_per_order;
        }

        Commission {
            contracts,
            per_contract: self.per_contract,
            total,
        }
    }

    /// Commission charged for a ledger action.
    pub fn for_action(&self, action: TradeAction, contracts: u32) -> Decimal {
        match action {
            TradeAction::Expire => Decimal::ZERO,
            TradeAction::Buy | TradeAction::Sell | TradeAction::Exercise => self.calculate(contracts).total,
        }
    }

    /// Calculate round-trip commission (entry + exit).
    pub fn round_trip(&self, contracts: u32) -> Decimal {
        self.calculate(contracts).total * Decimal::TWO
    }
}
