use serde::{Deserialize, Serialize};

use crate::data::Greeks;

use super::binomial::{BinomialPricer, ExerciseStyle};
use super::black_scholes::BlackScholes;
use super::greeks::GreeksCalculator;
use super::implied_vol::ImpliedVolSolver;
use super::inputs::{PricingError, PricingInputs, PricingResult};
use super::monte_carlo::MonteCarloPricer;

/// Numerical method used to value a contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PricingMethod {
    #[default]
    ClosedForm,
    Lattice {
        steps: usize,
        #[serde(default)]
        exercise: ExerciseStyle,
    },
    MonteCarlo {
        paths: usize,
        seed: u64,
    },
}

impl PricingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClosedForm => "closed_form",
            Self::Lattice { .. } => "lattice",
            Self::MonteCarlo { .. } => "monte_carlo",
        }
    }

    /// Same method with a different Monte Carlo seed. Other methods are
    /// returned unchanged.
    pub fn reseeded(self, seed: u64) -> Self {
        match self {
            Self::MonteCarlo { paths, .. } => Self::MonteCarlo { paths, seed },
            other => other,
        }
    }
}

/// Stateless front door to the pricing models.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingEngine;

impl PricingEngine {
    pub fn price(inputs: &PricingInputs, method: PricingMethod) -> PricingResult<f64> {
        let price = match method {
            PricingMethod::ClosedForm => BlackScholes::price(inputs),
            PricingMethod::Lattice { steps, exercise } => {
                BinomialPricer { steps, exercise }.price(inputs)
            }
            PricingMethod::MonteCarlo { paths, seed } => {
                MonteCarloPricer::new(paths, seed).price(inputs)
            }
        }?;

        if !price.is_finite() {
            return Err(PricingError::NoConvergence {
                reason: format!("{} produced a non-finite price", method.name()),
                iterations: 0,
            });
        }
        Ok(price)
    }

    pub fn greeks(inputs: &PricingInputs) -> PricingResult<Greeks> {
        GreeksCalculator::greeks(inputs)
    }

    pub fn implied_volatility(inputs: &PricingInputs, market_price: f64) -> PricingResult<f64> {
        ImpliedVolSolver::default().solve(inputs, market_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OptionType;

    fn atm() -> PricingInputs {
        PricingInputs::new(100.0, 100.0, 1.0, 0.05, 0.2, OptionType::Put)
    }

    #[test]
    fn test_methods_agree() {
        let closed = PricingEngine::price(&atm(), PricingMethod::ClosedForm).unwrap();
        let lattice = PricingEngine::price(
            &atm(),
            PricingMethod::Lattice {
                steps: 200,
                exercise: ExerciseStyle::European,
            },
        )
        .unwrap();
        let mc = PricingEngine::price(&atm(), PricingMethod::MonteCarlo { paths: 10_000, seed: 5 }).unwrap();

        assert!((lattice - closed).abs() / closed < 0.05);
        assert!((mc - closed).abs() / closed < 0.10);
    }

    #[test]
    fn test_method_serde_shape() {
        let json = serde_json::to_string(&PricingMethod::Lattice {
            steps: 100,
            exercise: ExerciseStyle::American,
        })
        .unwrap();
        assert_eq!(json, r#"{"method":"lattice","steps":100,"exercise":"american"}"#);

        let parsed: PricingMethod = serde_json::from_str(r#"{"method":"lattice","steps":50}"#).unwrap();
        assert_eq!(
            parsed,
            PricingMethod::Lattice {
                steps: 50,
                exercise: ExerciseStyle::American
            }
        );

        let parsed: PricingMethod = serde_json::from_str(r#"{"method":"closed_form"}"#).unwrap();
        assert_eq!(parsed, PricingMethod::ClosedForm);
    }

    #[test]
    fn test_reseeded_only_touches_monte_carlo() {
        let mc = PricingMethod::MonteCarlo { paths: 10, seed: 1 };
        assert_eq!(mc.reseeded(9), PricingMethod::MonteCarlo { paths: 10, seed: 9 });
        assert_eq!(PricingMethod::ClosedForm.reseeded(9), PricingMethod::ClosedForm);
        assert_eq!(mc.name(), "monte_carlo");
    }

    #[test]
    fn test_implied_volatility_front_door() {
        let price = PricingEngine::price(&atm().with_volatility(0.3), PricingMethod::ClosedForm).unwrap();
        let vol = PricingEngine::implied_volatility(&atm(), price).unwrap();
        assert!((vol - 0.3).abs() < 1e-4);
    }
}
