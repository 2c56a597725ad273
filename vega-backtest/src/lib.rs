pub mod backtest;
pub mod data;
pub mod math;
pub mod metrics;
pub mod pricing;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use backtest::{BacktestConfig, BacktestEngine, BacktestError, BacktestFailure, BacktestResult, Trade};
pub use data::{Greeks, HistoricalPrices, OptionContract, OptionType, PriceProvider};
pub use metrics::{MetricsCalculator, PerformanceMetrics};
pub use pricing::{PricingEngine, PricingError, PricingInputs, PricingMethod};
pub use risk::PortfolioGreeks;
pub use strategy::{LegAction, Strategy, StrategyBuilder, StrategyType};
