//! Backtesting engine for multi-leg option strategies.
//!
//! This module provides:
//! - A day-by-day simulator driven as an explicit state machine
//! - Expiry settlement, theta decay and early exercise of legs
//! - Commission tracking
//! - Mark-to-market valuation and a trade ledger
//! - Parallel batch runs over independent jobs

pub mod batch;
pub mod commission;
pub mod engine;
pub mod lifecycle;
pub mod result;
pub mod trade;

pub use batch::{best_by_sharpe, run_batch, BacktestJob, BatchOutcome};
pub use commission::{Commission, CommissionModel};
pub use engine::{BacktestConfig, BacktestEngine, BacktestRun, BacktestState, DayStep, LegEvent};
pub use lifecycle::{calculate_time_decay, handle_early_exercise, simulate_option_expiry, EarlyExercisePolicy};
pub use result::{BacktestError, BacktestFailure, BacktestResult, EquityPoint};
pub use trade::{ActiveLeg, Trade, TradeAction};
