//! Trade ledger entries and open leg tracking.
//!
//! Handles the leg lifecycle:
//! - Entry (Buy or Sell at the opening mark)
//! - Mark-to-market of the carried value
//! - Settlement (expiry or early exercise at intrinsic value)
//! - Realized P&L net of commissions

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::OptionContract;
use crate::strategy::{LegAction, StrategyLeg};

/// What happened in a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
    /// Settled at intrinsic value on expiration.
    Expire,
    /// Settled at intrinsic value before expiration.
    Exercise,
}

impl From<LegAction> for TradeAction {
    fn from(action: LegAction) -> Self {
        match action {
            LegAction::Buy => Self::Buy,
            LegAction::Sell => Self::Sell,
        }
    }
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub action: TradeAction,
    /// Contract id of the leg.
    pub instrument_id: String,
    /// Position of the leg in the strategy.
    pub leg_index: usize,
    pub quantity: u32,
    /// Execution price per unit of the underlying.
    pub price: Decimal,
    pub commission: Decimal,
    /// Set on closing trades only.
    pub realized_pnl: Option<Decimal>,
    /// Cash plus open positions right after the trade.
    pub portfolio_value: Decimal,
}

impl Trade {
    /// Check if this trade closed a leg.
    pub fn is_closing(&self) -> bool {
        self.realized_pnl.is_some()
    }

    /// Check if trade was profitable.
    pub fn is_winner(&self) -> bool {
        self.realized_pnl.map(|p| p > Decimal::ZERO).unwrap_or(false)
    }

    /// Closed at a loss. Break-even closes are neither winners nor losers.
    pub fn is_loser(&self) -> bool {
        self.realized_pnl.map(|p| p < Decimal::ZERO).unwrap_or(false)
    }

    /// Get realized P&L.
    pub fn pnl(&self) -> Decimal {
        self.realized_pnl.unwrap_or(Decimal::ZERO)
    }
}

/// A strategy leg that has been opened and not yet settled.
///
/// `leg.contract.current_price` is the carried value: the last full
/// reprice, decayed by theta on the days in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveLeg {
    pub index: usize,
    pub leg: StrategyLeg,
    pub entry_price: Decimal,
    pub entry_commission: Decimal,
    pub opened_on: NaiveDate,
    /// Last date the carried value was updated.
    pub last_valued: NaiveDate,
    /// Last date of a full model reprice.
    pub last_repriced: NaiveDate,
}

impl ActiveLeg {
    pub fn open(
        index: usize,
        leg: StrategyLeg,
        entry_price: Decimal,
        entry_commission: Decimal,
        date: NaiveDate,
    ) -> Self {
        let mut leg = leg;
        leg.contract.current_price = entry_price;
        Self {
            index,
            leg,
            entry_price,
            entry_commission,
            opened_on: date,
            last_valued: date,
            last_repriced: date,
        }
    }

    pub fn contract(&self) -> &OptionContract {
        &self.leg.contract
    }

    pub fn carried_value(&self) -> Decimal {
        self.leg.contract.current_price
    }

    pub fn quantity(&self) -> u32 {
        self.leg.quantity()
    }

    /// Signed value of the position: long legs are assets, short legs
    /// liabilities.
    pub fn market_value(&self, multiplier: Decimal) -> Decimal {
        self.leg
            .action
            .signed(self.carried_value() * Decimal::from(self.quantity()) * multiplier)
    }

    /// Cash that opening the leg moved, before commission.
    pub fn opening_cash_flow(&self, multiplier: Decimal) -> Decimal {
        -self
            .leg
            .action
            .signed(self.entry_price * Decimal::from(self.quantity()) * multiplier)
    }

    /// Cash that settling at `exit_price` moves, before commission.
    pub fn settlement_cash_flow(&self, exit_price: Decimal, multiplier: Decimal) -> Decimal {
        self.leg
            .action
            .signed(exit_price * Decimal::from(self.quantity()) * multiplier)
    }

    /// Round-trip P&L net of both commissions.
    pub fn settlement_pnl(&self, exit_price: Decimal, exit_commission: Decimal, multiplier: Decimal) -> Decimal {
        self.settlement_cash_flow(exit_price, multiplier) + self.opening_cash_flow(multiplier)
            - self.entry_commission
            - exit_commission
    }
}
