//! Analytic Black-Scholes Greeks.
//!
//! Units:
//! - theta: per calendar day
//! - vega: per 1 volatility point (0.01)
//! - rho: per 1 rate point (0.01)

use crate::data::{Greeks, OptionType};
use crate::math::{norm_cdf, norm_pdf, DAYS_PER_YEAR};

use super::black_scholes::BlackScholes;
use super::inputs::{PricingInputs, PricingResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct GreeksCalculator;

impl GreeksCalculator {
    pub fn greeks(inputs: &PricingInputs) -> PricingResult<Greeks> {
        inputs.validate()?;

        if inputs.time_to_expiry == 0.0 || inputs.volatility == 0.0 {
            return Ok(Self::degenerate(inputs));
        }

        let t = inputs.time_to_expiry;
        let sqrt_t = t.sqrt();
        let d1 = BlackScholes::d1(inputs);
        let d2 = BlackScholes::d2(inputs);
        let pv_strike = inputs.strike * inputs.discount_factor();
        let pdf_d1 = norm_pdf(d1);

        let gamma = pdf_d1 / (inputs.spot * inputs.volatility * sqrt_t);
        let vega = inputs.spot * pdf_d1 * sqrt_t / 100.0;
        let decay = -inputs.spot * pdf_d1 * inputs.volatility / (2.0 * sqrt_t);

        let greeks = match inputs.option_type {
            OptionType::Call => Greeks {
                delta: norm_cdf(d1),
                gamma,
                theta: (decay - inputs.rate * pv_strike * norm_cdf(d2)) / DAYS_PER_YEAR,
                vega,
                rho: t * pv_strike * norm_cdf(d2) / 100.0,
            },
            OptionType::Put => Greeks {
                delta: norm_cdf(d1) - 1.0,
                gamma,
                theta: (decay + inputs.rate * pv_strike * norm_cdf(-d2)) / DAYS_PER_YEAR,
                vega,
                rho: -t * pv_strike * norm_cdf(-d2) / 100.0,
            },
        };
        Ok(greeks)
    }

    /// Step-function Greeks when there is no diffusion left.
    fn degenerate(inputs: &PricingInputs) -> Greeks {
        let pv_strike = inputs.strike * inputs.discount_factor();
        // weight of the call being exercised; 0.5 at the money keeps parity
        let w = if inputs.spot > pv_strike {
            1.0
        } else if inputs.spot < pv_strike {
            0.0
        } else {
            0.5
        };
        let t = inputs.time_to_expiry;
        let carry = inputs.rate * pv_strike / DAYS_PER_YEAR;

        match inputs.option_type {
            OptionType::Call => Greeks {
                delta: w,
                gamma: 0.0,
                theta: -carry * w,
                vega: 0.0,
                rho: t * pv_strike * w / 100.0,
            },
            OptionType::Put => Greeks {
                delta: w - 1.0,
                gamma: 0.0,
                theta: carry * (1.0 - w),
                vega: 0.0,
                rho: -t * pv_strike * (1.0 - w) / 100.0,
            },
        }
    }
}
