//! Parallel execution of independent backtests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::info;

use crate::data::PriceProvider;
use crate::strategy::Strategy;

use super::engine::{BacktestConfig, BacktestEngine};
use super::result::{BacktestFailure, BacktestResult};

/// One strategy over one price path.
#[derive(Clone)]
pub struct BacktestJob {
    pub label: String,
    pub strategy: Strategy,
    pub provider: Arc<dyn PriceProvider + Send + Sync>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BacktestJob {
    pub fn new(
        strategy: Strategy,
        provider: Arc<dyn PriceProvider + Send + Sync>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            label: strategy.name.clone(),
            strategy,
            provider,
            start,
            end,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

pub type BatchOutcome = (String, Result<BacktestResult, BacktestFailure>);

/// Run every job with the same config. Output order matches `jobs`.
pub fn run_batch(config: &BacktestConfig, jobs: &[BacktestJob]) -> Vec<BatchOutcome> {
    let engine = BacktestEngine::new(config.clone());
    let progress = AtomicUsize::new(0);
    let total = jobs.len();

    info!("Running {} backtests", total);

    jobs.par_iter()
        .map(|job| {
            let result = engine.run(&job.strategy, job.provider.as_ref(), job.start, job.end);

            let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
            if done % (total / 10).max(1) == 0 || done == total {
                info!(
                    "  {:.0}% ({}/{} backtests)",
                    done as f64 / total as f64 * 100.0,
                    done,
                    total
                );
            }

            (job.label.clone(), result)
        })
        .collect()
}

/// Completed run with the highest Sharpe ratio.
pub fn best_by_sharpe(outcomes: &[BatchOutcome]) -> Option<(&str, &BacktestResult)> {
    outcomes
        .iter()
        .filter_map(|(label, result)| result.as_ref().ok().map(|r| (label.as_str(), r)))
        .max_by(|(_, a), (_, b)| {
            a.metrics
                .sharpe_ratio
                .partial_cmp(&b.metrics.sharpe_ratio)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FnPriceProvider, GbmPriceGenerator, OptionContract, OptionType};
    use crate::strategy::{LegAction, StrategyBuilder};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn option(option_type: OptionType, strike: Decimal) -> OptionContract {
        OptionContract::new(
            format!("SPY{}{}", option_type.as_str(), strike),
            "SPY",
            option_type,
            strike,
            date(3, 15),
        )
        .unwrap()
        .with_implied_volatility(0.2)
    }

    fn jobs() -> Vec<BacktestJob> {
        let path: Arc<dyn PriceProvider + Send + Sync> =
            Arc::new(GbmPriceGenerator::new(dec!(100), 0.03, 0.15, 11).generate(date(1, 2), date(2, 29)));

        let long_straddle = StrategyBuilder::straddle(
            option(OptionType::Call, dec!(100)),
            option(OptionType::Put, dec!(100)),
            LegAction::Buy,
            1,
        )
        .unwrap();
        let short_strangle = StrategyBuilder::strangle(
            option(OptionType::Put, dec!(95)),
            option(OptionType::Call, dec!(105)),
            LegAction::Sell,
            1,
        )
        .unwrap();

        vec![
            BacktestJob::new(long_straddle, Arc::clone(&path), date(1, 2), date(2, 29)).with_label("long straddle"),
            BacktestJob::new(short_strangle, path, date(1, 2), date(2, 29)).with_label("short strangle"),
        ]
    }

    #[test]
    fn test_batch_matches_sequential_runs() {
        let config = BacktestConfig::default();
        let jobs = jobs();
        let outcomes = run_batch(&config, &jobs);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, "long straddle");
        assert_eq!(outcomes[1].0, "short strangle");

        let engine = BacktestEngine::new(config);
        for (job, (_, outcome)) in jobs.iter().zip(&outcomes) {
            let sequential = engine
                .run(&job.strategy, job.provider.as_ref(), job.start, job.end)
                .unwrap();
            assert_eq!(outcome.as_ref().unwrap(), &sequential);
        }
        assert!(best_by_sharpe(&outcomes).is_some());
    }

    #[test]
    fn test_failed_jobs_are_reported_not_dropped() {
        let mut jobs = jobs();
        jobs.push(
            BacktestJob::new(
                jobs[0].strategy.clone(),
                Arc::new(FnPriceProvider::new(|_| None)),
                date(1, 2),
                date(1, 10),
            )
            .with_label("no data"),
        );
        let outcomes = run_batch(&BacktestConfig::default(), &jobs);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[2].1.is_err());

        let (label, _) = best_by_sharpe(&outcomes).unwrap();
        assert_ne!(label, "no data");
    }

    #[test]
    fn test_empty_batch() {
        assert!(run_batch(&BacktestConfig::default(), &[]).is_empty());
        assert!(best_by_sharpe(&[]).is_none());
    }
}
