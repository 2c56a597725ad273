//! Backtest outputs and failures.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::ContractError;
use crate::metrics::PerformanceMetrics;
use crate::risk::PortfolioGreeks;
use crate::strategy::StrategyError;

use super::engine::BacktestConfig;
use super::trade::Trade;

/// Daily equity snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub portfolio_value: Decimal,
    pub cash: Decimal,
    /// Signed value of the active legs.
    pub positions_value: Decimal,
    pub active_legs: usize,
    pub daily_pnl: Decimal,
    pub greeks: PortfolioGreeks,
}

/// Result of a completed backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: PerformanceMetrics,
    /// Legs still open on the end date.
    pub open_legs: usize,
    /// Days on which at least one leg fell back to a zero valuation.
    pub anomaly_days: usize,
    pub config: BacktestConfig,
}

impl BacktestResult {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Generate summary string.
    pub fn summary(&self) -> String {
        format!(
            "Backtest Results: {} ({} to {})\n\
             ----------------------------------------\n\
             Initial Capital: ${:.2}\n\
             Final Capital: ${:.2}\n\
             Pricing: {}\n\
             Open Legs at End: {}\n\
             \n\
             {}",
            self.strategy_name,
            self.start_date,
            self.end_date,
            self.initial_capital,
            self.final_capital,
            self.config.pricing_method.name(),
            self.open_legs,
            self.metrics.summary(),
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid strategy structure: {0}")]
    StrategyStructure(#[from] StrategyError),

    #[error("invalid contract on leg {leg}: {source}")]
    InvalidContract {
        leg: usize,
        #[source]
        source: ContractError,
    },

    #[error("no underlying price between {start} and {end}")]
    MissingPriceData { start: NaiveDate, end: NaiveDate },

    #[error("pricing failed on every one of {days} valued days")]
    SystemicPricingFailure { days: usize },
}

/// A run that ended in the failed state, with the ledger accumulated up
/// to that point.
#[derive(Error, Debug, Clone)]
#[error("backtest failed on {failed_on:?}: {error}")]
pub struct BacktestFailure {
    #[source]
    pub error: BacktestError,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub failed_on: Option<NaiveDate>,
}
