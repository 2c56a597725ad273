//! Risk views over the open book.

pub mod portfolio_greeks;

pub use portfolio_greeks::PortfolioGreeks;
