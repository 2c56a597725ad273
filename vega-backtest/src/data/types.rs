//! Core market data types.
//!
//! An [`OptionContract`] is resolved by an external contract data source
//! before a backtest starts. Strike and expiration are fixed at
//! construction; the market fields (prices, implied vol, Greeks) are
//! refreshed as the simulator marks the contract.

use std::ops::AddAssign;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::{to_f64, year_fraction};
use crate::pricing::PricingInputs;

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }

    /// Payoff of immediate exercise in model space.
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            Self::Call => (spot - strike).max(0.0),
            Self::Put => (strike - spot).max(0.0),
        }
    }

    /// Payoff of immediate exercise in exact decimal arithmetic.
    pub fn intrinsic_decimal(&self, spot: Decimal, strike: Decimal) -> Decimal {
        match self {
            Self::Call => (spot - strike).max(Decimal::ZERO),
            Self::Put => (strike - spot).max(Decimal::ZERO),
        }
    }
}

/// Greeks for an option contract.
///
/// Units follow the desk convention: theta per calendar day, vega per one
/// volatility point, rho per one percentage point of rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

impl Greeks {
    /// Scale every sensitivity, e.g. by signed contract count.
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            theta: self.theta * factor,
            vega: self.vega * factor,
            rho: self.rho * factor,
        }
    }
}

impl AddAssign for Greeks {
    fn add_assign(&mut self, rhs: Self) {
        self.delta += rhs.delta;
        self.gamma += rhs.gamma;
        self.theta += rhs.theta;
        self.vega += rhs.vega;
        self.rho += rhs.rho;
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractError {
    #[error("strike must be positive, got {0}")]
    NonPositiveStrike(Decimal),

    #[error("{field} must be non-negative, got {value}")]
    NegativePrice { field: &'static str, value: Decimal },

    #[error("implied volatility must be a non-negative number, got {0}")]
    InvalidVolatility(f64),

    #[error("inconsistent quote: bid {bid}, {field} {value}, ask {ask}")]
    InconsistentQuote {
        field: &'static str,
        bid: Decimal,
        value: Decimal,
        ask: Decimal,
    },
}

/// A single listed option contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Instrument identity (e.g. OCC symbol).
    pub id: String,

    /// Underlying symbol (e.g., "SPY")
    pub underlying: String,

    /// Option type (call or put)
    pub option_type: OptionType,

    strike: Decimal,

    expiration: NaiveDate,

    /// Current (mark) price
    pub current_price: Decimal,

    /// Bid price
    pub bid: Decimal,

    /// Ask price
    pub ask: Decimal,

    /// Last traded price
    pub last: Decimal,

    /// Implied volatility used to mark the contract
    pub implied_volatility: f64,

    /// Greeks snapshot
    pub greeks: Greeks,

    pub open_interest: u64,

    pub volume: u64,

    /// When the market fields were observed
    pub observed_at: Option<NaiveDateTime>,
}

impl OptionContract {
    /// Create a contract with empty market fields.
    pub fn new(
        id: impl Into<String>,
        underlying: impl Into<String>,
        option_type: OptionType,
        strike: Decimal,
        expiration: NaiveDate,
    ) -> Result<Self, ContractError> {
        if strike <= Decimal::ZERO {
            return Err(ContractError::NonPositiveStrike(strike));
        }
        Ok(Self {
            id: id.into(),
            underlying: underlying.into(),
            option_type,
            strike,
            expiration,
            current_price: Decimal::ZERO,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            last: Decimal::ZERO,
            implied_volatility: 0.0,
            greeks: Greeks::default(),
            open_interest: 0,
            volume: 0,
            observed_at: None,
        })
    }

    pub fn with_quote(mut self, bid: Decimal, ask: Decimal, last: Decimal) -> Self {
        self.bid = bid;
        self.ask = ask;
        self.last = last;
        if self.current_price.is_zero() {
            self.current_price = self.mid();
        }
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.current_price = price;
        self
    }

    pub fn with_implied_volatility(mut self, vol: f64) -> Self {
        self.implied_volatility = vol;
        self
    }

    pub fn with_greeks(mut self, greeks: Greeks) -> Self {
        self.greeks = greeks;
        self
    }

    pub fn with_activity(mut self, open_interest: u64, volume: u64) -> Self {
        self.open_interest = open_interest;
        self.volume = volume;
        self
    }

    pub fn observed(mut self, at: NaiveDateTime) -> Self {
        self.observed_at = Some(at);
        self
    }

    pub fn strike(&self) -> Decimal {
        self.strike
    }

    pub fn expiration(&self) -> NaiveDate {
        self.expiration
    }

    /// Mid of bid/ask, falling back to whichever side is quoted.
    pub fn mid(&self) -> Decimal {
        match (self.bid.is_zero(), self.ask.is_zero()) {
            (false, false) => (self.bid + self.ask) / Decimal::TWO,
            (true, false) => self.ask,
            (false, true) => self.bid,
            (true, true) => self.last,
        }
    }

    /// Calculate bid-ask spread as percentage of mid.
    pub fn spread_pct(&self) -> f64 {
        let mid = self.mid();
        if mid.is_zero() {
            return 0.0;
        }
        to_f64((self.ask - self.bid) / mid)
    }

    pub fn days_to_expiry(&self, date: NaiveDate) -> i64 {
        (self.expiration - date).num_days()
    }

    /// Expired as of `date` (expiration on or before it).
    pub fn is_expired(&self, date: NaiveDate) -> bool {
        self.expiration <= date
    }

    /// Intrinsic value against an underlying price.
    pub fn intrinsic_value(&self, underlying_price: Decimal) -> Decimal {
        self.option_type
            .intrinsic_decimal(underlying_price, self.strike)
    }

    /// Model inputs for valuing this contract on `date`.
    pub fn pricing_inputs(&self, spot: f64, date: NaiveDate, rate: f64) -> PricingInputs {
        PricingInputs::new(
            spot,
            to_f64(self.strike),
            year_fraction(date, self.expiration),
            rate,
            self.implied_volatility,
            self.option_type,
        )
    }

    /// Refresh the mark and Greeks after a model valuation.
    pub fn update_mark(&mut self, price: Decimal, greeks: Greeks) {
        self.current_price = price;
        self.greeks = greeks;
    }

    /// Check the market fields: prices non-negative, vol non-negative, and
    /// `bid <= last/current <= ask` whenever all of them are quoted.
    pub fn validate(&self) -> Result<(), ContractError> {
        for (field, value) in [
            ("current_price", self.current_price),
            ("bid", self.bid),
            ("ask", self.ask),
            ("last", self.last),
        ] {
            if value < Decimal::ZERO {
                return Err(ContractError::NegativePrice { field, value });
            }
        }

        if !self.implied_volatility.is_finite() || self.implied_volatility < 0.0 {
            return Err(ContractError::InvalidVolatility(self.implied_volatility));
        }

        if self.bid.is_zero() || self.ask.is_zero() {
            return Ok(());
        }
        for (field, value) in [("last", self.last), ("current_price", self.current_price)] {
            if !value.is_zero() && (value < self.bid || value > self.ask) {
                return Err(ContractError::InconsistentQuote {
                    field,
                    bid: self.bid,
                    value,
                    ask: self.ask,
                });
            }
        }
        Ok(())
    }
}

/// Daily bar data for underlying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderlyingBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}
