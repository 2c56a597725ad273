//! Numeric primitives shared by the pricing engines and the simulator.
//!
//! - Standard normal CDF/PDF
//! - Actual/365 year fractions
//! - Bracketed root finding (bisection with Newton-Raphson refinement)
//! - Decimal <-> f64 conversion for money crossing into model space

pub mod normal;
pub mod roots;
pub mod time;

pub use normal::{norm_cdf, norm_pdf};
pub use roots::{bisect, newton_bisect, Root, RootFindingError, SolverConfig};
pub use time::{days_between, year_fraction, DAYS_PER_YEAR};

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Decimal places kept for option prices coming out of a model.
pub const PRICE_DP: u32 = 4;

/// Convert a decimal amount to f64 for numerical work.
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Convert a model output back to a decimal rounded to `dp` places.
///
/// Non-finite inputs map to zero.
pub fn to_decimal(value: f64, dp: u32) -> Decimal {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(dp))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decimal_conversions() {
        assert_eq!(to_f64(dec!(10.25)), 10.25);
        assert_eq!(to_decimal(10.456_789, 4), dec!(10.4568));
        assert_eq!(to_decimal(f64::NAN, 4), Decimal::ZERO);
        assert_eq!(to_decimal(f64::INFINITY, 4), Decimal::ZERO);
    }
}
