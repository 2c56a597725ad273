//! Cox-Ross-Rubinstein binomial lattice.
//!
//! Backward induction over a recombining tree with `u = e^{σ√dt}`,
//! `d = 1/u`. American style takes `max(exercise, continuation)` at every
//! node; European style keeps the continuation value only.

use serde::{Deserialize, Serialize};

use super::black_scholes::BlackScholes;
use super::inputs::{invalid, PricingError, PricingInputs, PricingResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseStyle {
    European,
    #[default]
    American,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinomialPricer {
    pub steps: usize,
    pub exercise: ExerciseStyle,
}

impl BinomialPricer {
    /// American-style lattice.
    pub fn new(steps: usize) -> Self {
        Self {
            steps,
            exercise: ExerciseStyle::American,
        }
    }

    pub fn european(steps: usize) -> Self {
        Self {
            steps,
            exercise: ExerciseStyle::European,
        }
    }

    pub fn price(&self, inputs: &PricingInputs) -> PricingResult<f64> {
        inputs.validate()?;
        if self.steps == 0 {
            return Err(invalid("steps", 0.0, "lattice needs at least one step"));
        }

        if inputs.time_to_expiry == 0.0 {
            return Ok(inputs.intrinsic());
        }
        if inputs.volatility == 0.0 {
            let deterministic = BlackScholes::deterministic_value(inputs);
            return Ok(match self.exercise {
                ExerciseStyle::European => deterministic,
                ExerciseStyle::American => deterministic.max(inputs.intrinsic()),
            });
        }

        let steps = self.steps;
        let dt = inputs.time_to_expiry / steps as f64;
        let u = (inputs.volatility * dt.sqrt()).exp();
        let d = 1.0 / u;
        let p = ((inputs.rate * dt).exp() - d) / (u - d);
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(PricingError::NoConvergence {
                reason: format!("risk-neutral probability {p} is outside [0, 1]"),
                iterations: 0,
            });
        }

        let disc = (-inputs.rate * dt).exp();
        let disc_p = disc * p;
        let disc_1mp = disc * (1.0 - p);
        let american = self.exercise == ExerciseStyle::American;
        let option_type = inputs.option_type;

        // spot * u^j * d^(n-j) = spot * d^n * (u/d)^j
        let ratio = u / d;
        let mut values = vec![0.0_f64; steps + 1];
        let mut st = inputs.spot * d.powi(steps as i32);
        for value in values.iter_mut() {
            *value = option_type.intrinsic(st, inputs.strike);
            st *= ratio;
        }

        let mut base = inputs.spot * d.powi(steps as i32 - 1);
        for i in (0..steps).rev() {
            let mut st = base;
            for j in 0..=i {
                let continuation = disc_p * values[j + 1] + disc_1mp * values[j];
                values[j] = if american {
                    continuation.max(option_type.intrinsic(st, inputs.strike))
                } else {
                    continuation
                };
                st *= ratio;
            }
            base *= u;
        }

        Ok(values[0])
    }
}
