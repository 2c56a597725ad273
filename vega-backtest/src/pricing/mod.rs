//! Option pricing models.
//!
//! - Black-Scholes closed form
//! - Cox-Ross-Rubinstein lattice (American or European exercise)
//! - Monte Carlo under GBM with antithetic variates
//! - Implied volatility inversion
//! - Analytic Greeks

pub mod binomial;
pub mod black_scholes;
pub mod engine;
pub mod greeks;
pub mod implied_vol;
pub mod inputs;
pub mod monte_carlo;

pub use binomial::{BinomialPricer, ExerciseStyle};
pub use black_scholes::BlackScholes;
pub use engine::{PricingEngine, PricingMethod};
pub use greeks::GreeksCalculator;
pub use implied_vol::ImpliedVolSolver;
pub use inputs::{PricingError, PricingInputs, PricingResult};
pub use monte_carlo::{MonteCarloEstimate, MonteCarloPricer};
