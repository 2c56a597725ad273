//! Closed-form Black-Scholes pricing for European options.

use crate::data::OptionType;
use crate::math::{norm_cdf, norm_pdf};

use super::inputs::{PricingInputs, PricingResult};

/// Black-Scholes calculator (no dividend yield).
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackScholes;

impl BlackScholes {
    /// Calculate d1 parameter.
    pub fn d1(inputs: &PricingInputs) -> f64 {
        let PricingInputs {
            spot,
            strike,
            time_to_expiry: t,
            rate,
            volatility: vol,
            ..
        } = *inputs;
        ((spot / strike).ln() + (rate + 0.5 * vol * vol) * t) / (vol * t.sqrt())
    }

    /// Calculate d2 parameter.
    pub fn d2(inputs: &PricingInputs) -> f64 {
        Self::d1(inputs) - inputs.volatility * inputs.time_to_expiry.sqrt()
    }

    /// Validated price.
    pub fn price(inputs: &PricingInputs) -> PricingResult<f64> {
        inputs.validate()?;
        Ok(Self::price_unchecked(inputs))
    }

    /// Price without input validation. Callers must have validated.
    pub fn price_unchecked(inputs: &PricingInputs) -> f64 {
        if inputs.time_to_expiry == 0.0 {
            return inputs.intrinsic();
        }
        if inputs.volatility == 0.0 {
            return Self::deterministic_value(inputs);
        }
        match inputs.option_type {
            OptionType::Call => Self::call_price(inputs),
            OptionType::Put => Self::put_price(inputs),
        }
    }

    /// Calculate call option price.
    pub fn call_price(inputs: &PricingInputs) -> f64 {
        let d1 = Self::d1(inputs);
        let d2 = Self::d2(inputs);
        inputs.spot * norm_cdf(d1) - inputs.strike * inputs.discount_factor() * norm_cdf(d2)
    }

    /// Calculate put option price.
    pub fn put_price(inputs: &PricingInputs) -> f64 {
        let d1 = Self::d1(inputs);
        let d2 = Self::d2(inputs);
        inputs.strike * inputs.discount_factor() * norm_cdf(-d2) - inputs.spot * norm_cdf(-d1)
    }

    /// Value when the underlying grows at the risk-free rate with no noise.
    pub fn deterministic_value(inputs: &PricingInputs) -> f64 {
        let pv_strike = inputs.strike * inputs.discount_factor();
        match inputs.option_type {
            OptionType::Call => (inputs.spot - pv_strike).max(0.0),
            OptionType::Put => (pv_strike - inputs.spot).max(0.0),
        }
    }

    /// dPrice/dVol, unscaled. Used as the Newton derivative.
    pub fn vega_raw(inputs: &PricingInputs) -> f64 {
        if inputs.time_to_expiry <= 0.0 || inputs.volatility <= 0.0 {
            return 0.0;
        }
        inputs.spot * norm_pdf(Self::d1(inputs)) * inputs.time_to_expiry.sqrt()
    }
}
