//! Implied volatility inversion.
//!
//! Inputs and the target price are checked against the no-arbitrage
//! bounds before any iteration. The solve itself is a safeguarded
//! Newton-Raphson on the Black-Scholes price with vega as derivative,
//! bisecting whenever a Newton step would leave the bracket.

use std::f64::consts::PI;

use crate::data::OptionType;
use crate::math::{newton_bisect, SolverConfig};

use super::black_scholes::BlackScholes;
use super::inputs::{invalid, PricingError, PricingInputs, PricingResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpliedVolSolver {
    pub min_vol: f64,
    pub max_vol: f64,
    pub config: SolverConfig,
}

impl Default for ImpliedVolSolver {
    fn default() -> Self {
        Self {
            min_vol: 1e-4,
            max_vol: 5.0,
            config: SolverConfig::default(),
        }
    }
}

impl ImpliedVolSolver {
    /// Solve for the volatility that reproduces `market_price`.
    ///
    /// `inputs.volatility` is ignored.
    pub fn solve(&self, inputs: &PricingInputs, market_price: f64) -> PricingResult<f64> {
        let base = inputs.with_volatility(self.min_vol);
        base.validate()?;
        if !market_price.is_finite() || market_price < 0.0 {
            return Err(invalid("market_price", market_price, "must be a non-negative number"));
        }
        if !(self.min_vol > 0.0 && self.max_vol > self.min_vol) {
            return Err(invalid("max_vol", self.max_vol, "bracket must satisfy 0 < min < max"));
        }
        if base.time_to_expiry == 0.0 {
            return Err(no_convergence("no time value left to invert".to_string()));
        }

        let (lower, upper) = Self::arbitrage_bounds(&base);
        if market_price < lower || market_price > upper {
            return Err(no_convergence(format!(
                "price {market_price} outside no-arbitrage bounds [{lower}, {upper}]"
            )));
        }

        let objective = |vol: f64| BlackScholes::price_unchecked(&base.with_volatility(vol)) - market_price;
        let derivative = |vol: f64| BlackScholes::vega_raw(&base.with_volatility(vol));

        // Brenner-Subrahmanyam approximation as the starting point.
        let guess = ((market_price / base.spot) * (2.0 * PI / base.time_to_expiry).sqrt())
            .clamp(self.min_vol, self.max_vol);

        let root = newton_bisect(
            objective,
            derivative,
            self.min_vol,
            self.max_vol,
            guess,
            self.config,
        )?;
        Ok(root.value)
    }

    /// No-arbitrage price range for a European option with these inputs.
    pub fn arbitrage_bounds(inputs: &PricingInputs) -> (f64, f64) {
        let pv_strike = inputs.strike * inputs.discount_factor();
        match inputs.option_type {
            OptionType::Call => ((inputs.spot - pv_strike).max(0.0), inputs.spot),
            OptionType::Put => ((pv_strike - inputs.spot).max(0.0), pv_strike),
        }
    }
}

fn no_convergence(reason: String) -> PricingError {
    PricingError::NoConvergence {
        reason,
        iterations: 0,
    }
}
