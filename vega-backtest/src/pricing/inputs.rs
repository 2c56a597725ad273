//! Model inputs and the pricing error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::OptionType;
use crate::math::RootFindingError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("invalid {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("no convergence after {iterations} iterations: {reason}")]
    NoConvergence { reason: String, iterations: usize },
}

pub type PricingResult<T> = Result<T, PricingError>;

impl From<RootFindingError> for PricingError {
    fn from(err: RootFindingError) -> Self {
        let iterations = match &err {
            RootFindingError::MaxIterations { iterations, .. } => *iterations,
            _ => 0,
        };
        Self::NoConvergence {
            reason: err.to_string(),
            iterations,
        }
    }
}

/// Everything a single-asset vanilla model needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingInputs {
    pub spot: f64,
    pub strike: f64,
    /// Years to expiry.
    pub time_to_expiry: f64,
    /// Continuously compounded risk-free rate.
    pub rate: f64,
    pub volatility: f64,
    pub option_type: OptionType,
}

impl PricingInputs {
    pub fn new(
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        rate: f64,
        volatility: f64,
        option_type: OptionType,
    ) -> Self {
        Self {
            spot,
            strike,
            time_to_expiry,
            rate,
            volatility,
            option_type,
        }
    }

    pub fn with_volatility(self, volatility: f64) -> Self {
        Self { volatility, ..self }
    }

    pub fn with_spot(self, spot: f64) -> Self {
        Self { spot, ..self }
    }

    pub fn with_option_type(self, option_type: OptionType) -> Self {
        Self { option_type, ..self }
    }

    pub fn validate(&self) -> PricingResult<()> {
        let fields = [
            ("spot", self.spot),
            ("strike", self.strike),
            ("time_to_expiry", self.time_to_expiry),
            ("rate", self.rate),
            ("volatility", self.volatility),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(PricingError::InvalidParameter {
                    name,
                    value,
                    reason: "must be finite",
                });
            }
        }

        if self.spot <= 0.0 {
            return Err(invalid("spot", self.spot, "must be positive"));
        }
        if self.strike <= 0.0 {
            return Err(invalid("strike", self.strike, "must be positive"));
        }
        if self.time_to_expiry < 0.0 {
            return Err(invalid("time_to_expiry", self.time_to_expiry, "must be non-negative"));
        }
        if self.volatility < 0.0 {
            return Err(invalid("volatility", self.volatility, "must be non-negative"));
        }
        Ok(())
    }

    pub fn intrinsic(&self) -> f64 {
        self.option_type.intrinsic(self.spot, self.strike)
    }

    pub fn discount_factor(&self) -> f64 {
        (-self.rate * self.time_to_expiry).exp()
    }
}

pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> PricingError {
    PricingError::InvalidParameter { name, value, reason }
}
