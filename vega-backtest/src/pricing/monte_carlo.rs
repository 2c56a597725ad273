//! Monte Carlo pricing of European payoffs under GBM.
//!
//! Only the terminal distribution matters for a vanilla payoff, so each
//! sample draws one normal and evaluates `S·exp((r − σ²/2)T + σ√T·Z)`.
//! Antithetic pairs average the payoff at `Z` and `−Z`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::inputs::{invalid, PricingInputs, PricingResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonteCarloPricer {
    pub paths: usize,
    pub seed: u64,
    pub antithetic: bool,
}

/// Discounted mean payoff with its standard error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloEstimate {
    pub price: f64,
    pub std_error: f64,
    /// Independent samples behind the estimate (pairs when antithetic).
    pub samples: usize,
}

impl MonteCarloPricer {
    pub fn new(paths: usize, seed: u64) -> Self {
        Self {
            paths,
            seed,
            antithetic: true,
        }
    }

    pub fn with_antithetic(mut self, antithetic: bool) -> Self {
        self.antithetic = antithetic;
        self
    }

    pub fn price(&self, inputs: &PricingInputs) -> PricingResult<f64> {
        self.simulate(inputs).map(|estimate| estimate.price)
    }

    pub fn simulate(&self, inputs: &PricingInputs) -> PricingResult<MonteCarloEstimate> {
        inputs.validate()?;
        if self.paths == 0 {
            return Err(invalid("paths", 0.0, "need at least one path"));
        }

        if inputs.time_to_expiry == 0.0 {
            return Ok(MonteCarloEstimate {
                price: inputs.intrinsic(),
                std_error: 0.0,
                samples: self.paths,
            });
        }

        let t = inputs.time_to_expiry;
        let drift = (inputs.rate - 0.5 * inputs.volatility * inputs.volatility) * t;
        let diffusion = inputs.volatility * t.sqrt();
        let payoff = |z: f64| {
            let terminal = inputs.spot * (drift + diffusion * z).exp();
            inputs.option_type.intrinsic(terminal, inputs.strike)
        };

        let samples = if self.antithetic {
            self.paths.div_ceil(2)
        } else {
            self.paths
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for _ in 0..samples {
            let z: f64 = rng.sample(StandardNormal);
            let x = if self.antithetic {
                0.5 * (payoff(z) + payoff(-z))
            } else {
                payoff(z)
            };
            sum += x;
            sum_sq += x * x;
        }

        let n = samples as f64;
        let mean = sum / n;
        let variance = if samples > 1 {
            ((sum_sq - n * mean * mean) / (n - 1.0)).max(0.0)
        } else {
            0.0
        };
        let df = inputs.discount_factor();

        Ok(MonteCarloEstimate {
            price: df * mean,
            std_error: df * (variance / n).sqrt(),
            samples,
        })
    }
}
