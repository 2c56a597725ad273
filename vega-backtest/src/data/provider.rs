//! Underlying price sources for the simulator.
//!
//! The simulator only asks one question per day: what did the underlying
//! close at? [`PriceProvider`] answers it from a stored series, a closure,
//! or a seeded synthetic path.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::{to_decimal, to_f64, DAYS_PER_YEAR, PRICE_DP};

use super::types::UnderlyingBar;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriceDataError {
    #[error("no underlying price for {date}")]
    Missing { date: NaiveDate },

    #[error("non-positive underlying price {price} on {date}")]
    NonPositive { date: NaiveDate, price: Decimal },
}

/// Daily closing price of the underlying.
pub trait PriceProvider {
    fn price_on(&self, date: NaiveDate) -> Result<Decimal, PriceDataError>;
}

fn checked(date: NaiveDate, price: Decimal) -> Result<Decimal, PriceDataError> {
    if price <= Decimal::ZERO {
        return Err(PriceDataError::NonPositive { date, price });
    }
    Ok(price)
}

/// Stored date -> close series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPrices {
    prices: BTreeMap<NaiveDate, Decimal>,
}

impl HistoricalPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from daily bars, keyed on the close.
    pub fn from_bars(bars: &[UnderlyingBar]) -> Self {
        bars.iter().map(|bar| (bar.date, bar.close)).collect()
    }

    pub fn insert(&mut self, date: NaiveDate, price: Decimal) {
        self.prices.insert(date, price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn first(&self) -> Option<(NaiveDate, Decimal)> {
        self.prices.first_key_value().map(|(d, p)| (*d, *p))
    }

    pub fn last(&self) -> Option<(NaiveDate, Decimal)> {
        self.prices.last_key_value().map(|(d, p)| (*d, *p))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &Decimal)> {
        self.prices.iter()
    }
}

impl FromIterator<(NaiveDate, Decimal)> for HistoricalPrices {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, Decimal)>>(iter: I) -> Self {
        Self {
            prices: iter.into_iter().collect(),
        }
    }
}

impl PriceProvider for HistoricalPrices {
    fn price_on(&self, date: NaiveDate) -> Result<Decimal, PriceDataError> {
        let price = self
            .prices
            .get(&date)
            .copied()
            .ok_or(PriceDataError::Missing { date })?;
        checked(date, price)
    }
}

/// Closure-backed provider; `None` means no price that day.
pub struct FnPriceProvider<F> {
    f: F,
}

impl<F> FnPriceProvider<F>
where
    F: Fn(NaiveDate) -> Option<Decimal>,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> PriceProvider for FnPriceProvider<F>
where
    F: Fn(NaiveDate) -> Option<Decimal>,
{
    fn price_on(&self, date: NaiveDate) -> Result<Decimal, PriceDataError> {
        let price = (self.f)(date).ok_or(PriceDataError::Missing { date })?;
        checked(date, price)
    }
}

/// Seeded geometric Brownian motion path with one step per calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbmPriceGenerator {
    pub initial_price: Decimal,
    /// Annual drift.
    pub drift: f64,
    /// Annual volatility.
    pub volatility: f64,
    pub seed: u64,
}

impl GbmPriceGenerator {
    pub fn new(initial_price: Decimal, drift: f64, volatility: f64, seed: u64) -> Self {
        Self {
            initial_price,
            drift,
            volatility,
            seed,
        }
    }

    /// Materialize the path from `start` to `end` inclusive. `start` carries
    /// the initial price. Empty when `end < start`.
    pub fn generate(&self, start: NaiveDate, end: NaiveDate) -> HistoricalPrices {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let dt = 1.0 / DAYS_PER_YEAR;
        let drift = (self.drift - 0.5 * self.volatility * self.volatility) * dt;
        let diffusion = self.volatility * dt.sqrt();

        let mut prices = HistoricalPrices::new();
        let mut spot = to_f64(self.initial_price);
        for date in start.iter_days().take_while(|d| *d <= end) {
            if date > start {
                let z: f64 = rng.sample(StandardNormal);
                spot *= (drift + diffusion * z).exp();
            }
            prices.insert(date, to_decimal(spot, PRICE_DP));
        }
        prices
    }
}
