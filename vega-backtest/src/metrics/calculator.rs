//! Performance metrics calculator.
//!
//! Pure functions of the initial capital, the daily equity series and the
//! trade ledger. Every output is finite: ratios with a zero denominator
//! are reported as 0 (or `None` for the profit factor).

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::{EquityPoint, Trade};
use crate::math::{to_f64, DAYS_PER_YEAR};

/// Comprehensive performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Return metrics (fractions, 0.10 = 10%)
    pub total_return: f64,
    pub annualized_return: f64,

    // Risk-adjusted returns
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,

    // Risk metrics
    pub max_drawdown: f64,
    pub max_drawdown_amount: Decimal,
    pub drawdown: DrawdownAnalysis,

    // Trade statistics
    pub total_trades: usize,
    pub closing_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,

    // P&L metrics
    pub realized_pnl: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    /// `None` when there are no losing trades.
    pub profit_factor: Option<f64>,
    pub avg_winner: Decimal,
    pub avg_loser: Decimal,
    pub largest_winner: Decimal,
    pub largest_loser: Decimal,
    pub total_commission: Decimal,

    // Time metrics
    pub trading_days: usize,
    pub duration_days: i64,
}

impl PerformanceMetrics {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        let profit_factor = self
            .profit_factor
            .map(|pf| format!("{pf:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "Performance Summary\n\
             ====================\n\
             \n\
             Total Return: {:.2}%\n\
             Annualized Return: {:.2}%\n\
             Max Drawdown: {:.2}%\n\
             Sharpe Ratio: {:.2}\n\
             Sortino Ratio: {:.2}\n\
             Calmar Ratio: {:.2}\n\
             \n\
             Trades: {} ({} closing, W: {}, L: {})\n\
             Win Rate: {:.1}%\n\
             Profit Factor: {}\n\
             Realized P&L: ${:.2}\n\
             Largest Win: ${:.2}\n\
             Largest Loss: ${:.2}\n\
             Commission: ${:.2}\n\
             \n\
             Days: {} over {} calendar days",
            self.total_return * 100.0,
            self.annualized_return * 100.0,
            self.max_drawdown * 100.0,
            self.sharpe_ratio,
            self.sortino_ratio,
            self.calmar_ratio,
            self.total_trades,
            self.closing_trades,
            self.winning_trades,
            self.losing_trades,
            self.win_rate * 100.0,
            profit_factor,
            self.realized_pnl,
            self.largest_winner,
            self.largest_loser,
            self.total_commission,
            self.trading_days,
            self.duration_days,
        )
    }
}

/// Drawdown analysis details for the deepest drawdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    /// Fraction of the running peak, in [0, 1].
    pub max_drawdown: f64,
    pub max_drawdown_amount: Decimal,
    pub peak_date: Option<NaiveDate>,
    pub trough_date: Option<NaiveDate>,
    pub recovery_date: Option<NaiveDate>,
    /// Peak to recovery, or peak to the last point when not recovered.
    pub duration_days: i64,
    pub drawdown_periods: usize,
}

/// Realized P&L grouped by the month trades closed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub return_pct: f64,
    pub trades: usize,
    pub win_rate: f64,
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics for a run.
    ///
    /// Daily returns are taken over the equity series with the initial
    /// capital prepended, so the first day's move is included.
    pub fn analyze(initial_capital: Decimal, equity_curve: &[EquityPoint], trades: &[Trade]) -> PerformanceMetrics {
        let initial = to_f64(initial_capital);
        let final_value = equity_curve
            .last()
            .map(|p| to_f64(p.portfolio_value))
            .unwrap_or(initial);

        let total_return = if initial > 0.0 {
            (final_value - initial) / initial
        } else {
            0.0
        };

        let duration_days = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => (last.date - first.date).num_days().max(1),
            _ => 1,
        };
        let annualized_return = total_return * DAYS_PER_YEAR / duration_days as f64;

        let returns = Self::daily_returns(initial, equity_curve);
        let sharpe_ratio = Self::calculate_sharpe(&returns);
        let sortino_ratio = Self::calculate_sortino(&returns);

        let drawdown = Self::analyze_drawdown(initial_capital, equity_curve);
        let calmar_ratio = if drawdown.max_drawdown > 0.0 {
            annualized_return / drawdown.max_drawdown
        } else {
            0.0
        };

        let closing: Vec<&Trade> = trades.iter().filter(|t| t.is_closing()).collect();
        let closing_trades = closing.len();
        let winning_trades = closing.iter().filter(|t| t.is_winner()).count();
        let losing_trades = closing.iter().filter(|t| t.is_loser()).count();
        let win_rate = if closing_trades > 0 {
            winning_trades as f64 / closing_trades as f64
        } else {
            0.0
        };

        let realized_pnl: Decimal = closing.iter().map(|t| t.pnl()).sum();
        let gross_profit: Decimal = closing.iter().filter(|t| t.is_winner()).map(|t| t.pnl()).sum();
        let gross_loss: Decimal = closing.iter().filter(|t| t.is_loser()).map(|t| t.pnl()).sum();
        let profit_factor = Self::calculate_profit_factor(gross_profit, gross_loss);

        let avg_winner = if winning_trades > 0 {
            gross_profit / Decimal::from(winning_trades)
        } else {
            Decimal::ZERO
        };
        let avg_loser = if losing_trades > 0 {
            gross_loss / Decimal::from(losing_trades)
        } else {
            Decimal::ZERO
        };

        let largest_winner = closing
            .iter()
            .filter(|t| t.is_winner())
            .map(|t| t.pnl())
            .max()
            .unwrap_or(Decimal::ZERO);
        let largest_loser = closing
            .iter()
            .filter(|t| t.is_loser())
            .map(|t| t.pnl())
            .min()
            .unwrap_or(Decimal::ZERO);

        PerformanceMetrics {
            total_return: finite(total_return),
            annualized_return: finite(annualized_return),
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio: finite(calmar_ratio),
            max_drawdown: drawdown.max_drawdown,
            max_drawdown_amount: drawdown.max_drawdown_amount,
            drawdown,
            total_trades: trades.len(),
            closing_trades,
            winning_trades,
            losing_trades,
            win_rate,
            realized_pnl,
            gross_profit,
            gross_loss,
            profit_factor,
            avg_winner,
            avg_loser,
            largest_winner,
            largest_loser,
            total_commission: trades.iter().map(|t| t.commission).sum(),
            trading_days: equity_curve.len(),
            duration_days,
        }
    }

    fn daily_returns(initial: f64, equity_curve: &[EquityPoint]) -> Vec<f64> {
        let values: Vec<f64> = std::iter::once(initial)
            .chain(equity_curve.iter().map(|p| to_f64(p.portfolio_value)))
            .collect();
        values
            .windows(2)
            .map(|w| if w[0] > 0.0 { finite((w[1] - w[0]) / w[0]) } else { 0.0 })
            .collect()
    }

    /// Annualized Sharpe ratio (risk-free rate = 0, population stdev).
    fn calculate_sharpe(returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let std_dev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
        if std_dev == 0.0 {
            return 0.0;
        }
        finite(mean / std_dev * DAYS_PER_YEAR.sqrt())
    }

    /// Calculate Sortino ratio (downside deviation).
    fn calculate_sortino(returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;

        // Downside deviation (only negative returns)
        let downside_variance = returns.iter().filter(|&&r| r < 0.0).map(|r| r.powi(2)).sum::<f64>() / n;
        let downside_dev = downside_variance.sqrt();
        if downside_dev == 0.0 {
            return 0.0;
        }
        finite(mean / downside_dev * DAYS_PER_YEAR.sqrt())
    }

    /// Calculate profit factor.
    fn calculate_profit_factor(gross_profit: Decimal, gross_loss: Decimal) -> Option<f64> {
        if gross_loss.is_zero() {
            return None;
        }
        Some(to_f64(gross_profit) / to_f64(gross_loss.abs()))
    }

    /// Analyze the deepest drawdown, with the initial capital as the
    /// opening peak.
    pub fn analyze_drawdown(initial_capital: Decimal, equity_curve: &[EquityPoint]) -> DrawdownAnalysis {
        let Some(first) = equity_curve.first() else {
            return DrawdownAnalysis::default();
        };

        let mut peak = initial_capital;
        let mut peak_date = first.date;
        let mut in_drawdown = false;
        let mut awaiting_recovery = false;
        let mut analysis = DrawdownAnalysis::default();

        for point in equity_curve {
            let value = point.portfolio_value;
            if value >= peak {
                if awaiting_recovery {
                    analysis.recovery_date = Some(point.date);
                    awaiting_recovery = false;
                }
                peak = value;
                peak_date = point.date;
                in_drawdown = false;
                continue;
            }

            if !in_drawdown {
                analysis.drawdown_periods += 1;
                in_drawdown = true;
            }

            let amount = peak - value;
            let fraction = if peak > Decimal::ZERO {
                (to_f64(amount) / to_f64(peak)).clamp(0.0, 1.0)
            } else {
                0.0
            };
            if fraction > analysis.max_drawdown {
                analysis.max_drawdown = fraction;
                analysis.max_drawdown_amount = amount;
                analysis.peak_date = Some(peak_date);
                analysis.trough_date = Some(point.date);
                analysis.recovery_date = None;
                awaiting_recovery = true;
            }
        }

        if let Some(peak_date) = analysis.peak_date {
            let end = analysis
                .recovery_date
                .or(equity_curve.last().map(|p| p.date))
                .unwrap_or(peak_date);
            analysis.duration_days = (end - peak_date).num_days();
        }
        analysis
    }

    /// Calculate monthly returns from closing trades.
    pub fn monthly_returns(initial_capital: Decimal, trades: &[Trade]) -> Vec<MonthlyReturn> {
        let mut monthly: BTreeMap<(i32, u32), Vec<&Trade>> = BTreeMap::new();
        for trade in trades.iter().filter(|t| t.is_closing()) {
            monthly
                .entry((trade.date.year(), trade.date.month()))
                .or_default()
                .push(trade);
        }

        let initial = to_f64(initial_capital);
        monthly
            .into_iter()
            .map(|((year, month), trades)| {
                let pnl: f64 = trades.iter().map(|t| to_f64(t.pnl())).sum();
                let winners = trades.iter().filter(|t| t.is_winner()).count();
                MonthlyReturn {
                    year,
                    month,
                    return_pct: if initial > 0.0 { pnl / initial * 100.0 } else { 0.0 },
                    trades: trades.len(),
                    win_rate: winners as f64 / trades.len() as f64,
                }
            })
            .collect()
    }
}

fn finite(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}
