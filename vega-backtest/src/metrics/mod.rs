//! Performance metrics module.
//!
//! Provides performance calculations over a finished run:
//! - Total and annualized return
//! - Sharpe, Sortino and Calmar ratios
//! - Maximum drawdown with peak, trough and recovery dates
//! - Win rate, profit factor, monthly returns

pub mod calculator;

pub use calculator::{DrawdownAnalysis, MetricsCalculator, MonthlyReturn, PerformanceMetrics};
