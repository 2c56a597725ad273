pub mod builder;
pub mod types;
pub mod validator;

pub use builder::StrategyBuilder;
pub use types::{LegAction, Strategy, StrategyLeg, StrategyType};
pub use validator::{StrategyError, StrategyValidator};
