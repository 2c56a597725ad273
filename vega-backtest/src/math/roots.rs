//! Bracketed one-dimensional root finding.
//!
//! `newton_bisect` keeps a sign-changing bracket at all times and takes a
//! Newton step whenever it lands strictly inside the bracket, otherwise it
//! bisects. Convergence is therefore guaranteed for continuous objectives,
//! with quadratic speed near a simple root.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RootFindingError {
    #[error("root is not bracketed: f({lower}) = {f_lower}, f({upper}) = {f_upper}")]
    NotBracketed {
        lower: f64,
        upper: f64,
        f_lower: f64,
        f_upper: f64,
    },

    #[error("no convergence after {iterations} iterations (last estimate {estimate})")]
    MaxIterations { iterations: usize, estimate: f64 },

    #[error("objective is not finite at {at}")]
    NonFinite { at: f64 },
}

/// Stopping rules for the iterative solvers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Hard cap on objective evaluations inside the loop.
    pub max_iterations: usize,
    /// Stop when `|f(x)|` falls below this.
    pub value_tolerance: f64,
    /// Stop when the bracket is narrower than this.
    pub bracket_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            value_tolerance: 1e-8,
            bracket_tolerance: 1e-10,
        }
    }
}

/// A converged root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Root {
    pub value: f64,
    pub iterations: usize,
}

/// Pure bisection on `[lower, upper]`.
pub fn bisect<F>(f: F, lower: f64, upper: f64, config: SolverConfig) -> Result<Root, RootFindingError>
where
    F: Fn(f64) -> f64,
{
    newton_bisect(f, |_| f64::NAN, lower, upper, 0.5 * (lower + upper), config)
}

/// Safeguarded Newton-Raphson on `[lower, upper]` starting from `initial`.
///
/// `df` is the derivative of `f`; a non-finite or vanishing derivative
/// falls back to a bisection step.
pub fn newton_bisect<F, D>(
    f: F,
    df: D,
    lower: f64,
    upper: f64,
    initial: f64,
    config: SolverConfig,
) -> Result<Root, RootFindingError>
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    let (mut lo, mut hi) = if lower <= upper {
        (lower, upper)
    } else {
        (upper, lower)
    };

    let f_lo = f(lo);
    let f_hi = f(hi);
    if !f_lo.is_finite() {
        return Err(RootFindingError::NonFinite { at: lo });
    }
    if !f_hi.is_finite() {
        return Err(RootFindingError::NonFinite { at: hi });
    }
    if f_lo.abs() <= config.value_tolerance {
        return Ok(Root { value: lo, iterations: 0 });
    }
    if f_hi.abs() <= config.value_tolerance {
        return Ok(Root { value: hi, iterations: 0 });
    }
    if f_lo.signum() == f_hi.signum() {
        return Err(RootFindingError::NotBracketed {
            lower: lo,
            upper: hi,
            f_lower: f_lo,
            f_upper: f_hi,
        });
    }

    // true when f goes from negative at `lo` to positive at `hi`
    let increasing = f_lo < 0.0;

    let mut x = if initial > lo && initial < hi {
        initial
    } else {
        0.5 * (lo + hi)
    };

    for iteration in 1..=config.max_iterations {
        let fx = f(x);
        if !fx.is_finite() {
            return Err(RootFindingError::NonFinite { at: x });
        }
        if fx.abs() <= config.value_tolerance {
            return Ok(Root { value: x, iterations: iteration });
        }

        if (fx < 0.0) == increasing {
            lo = x;
        } else {
            hi = x;
        }
        if hi - lo <= config.bracket_tolerance {
            return Ok(Root {
                value: 0.5 * (lo + hi),
                iterations: iteration,
            });
        }

        let slope = df(x);
        let newton = if slope.is_finite() && slope.abs() > f64::EPSILON {
            x - fx / slope
        } else {
            f64::NAN
        };

        x = if newton.is_finite() && newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
    }

    Err(RootFindingError::MaxIterations {
        iterations: config.max_iterations,
        estimate: x,
    })
}
