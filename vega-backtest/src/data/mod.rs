pub mod provider;
pub mod types;

pub use provider::{FnPriceProvider, GbmPriceGenerator, HistoricalPrices, PriceDataError, PriceProvider};
pub use types::{ContractError, Greeks, OptionContract, OptionType, UnderlyingBar};
