//! Monetary math at cent precision.
//!
//! All amounts are `rust_decimal::Decimal` rounded to two places with
//! round-half-up (midpoint away from zero). Basis-point resolution goes
//! through [`resolve_basis_points`] so every caller rounds identically.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::constants::{BASIS_POINTS_SCALE, CENT_PRECISION};

/// Round an amount to cent precision, half up.
#[must_use]
pub fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CENT_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}

/// Resolve a basis-point share of the purchase price to a cent amount.
///
/// `500_000 × 300 bps / 10000 = 15_000.00`.
#[must_use]
pub fn resolve_basis_points(purchase_price: Decimal, basis_points: u16) -> Decimal {
    let bps = Decimal::from(basis_points);
    let scale = Decimal::from(BASIS_POINTS_SCALE);
    to_cents(purchase_price * bps / scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_up() {
        assert_eq!(to_cents(Decimal::new(10_005, 3)), Decimal::new(1001, 2)); // 10.005 -> 10.01
        assert_eq!(to_cents(Decimal::new(10_004, 3)), Decimal::new(1000, 2)); // 10.004 -> 10.00
    }

    #[test]
    fn basis_points_scenario() {
        // 500,000 purchase price at 300 bps = 15,000.00
        let amount = resolve_basis_points(Decimal::new(500_000, 0), 300);
        assert_eq!(amount, Decimal::new(15_000_00, 2));
    }

    #[test]
    fn full_scale_is_whole_price() {
        let price = Decimal::new(123_456_78, 2);
        assert_eq!(resolve_basis_points(price, 10_000), price);
    }

    #[test]
    fn zero_basis_points_is_zero() {
        assert_eq!(
            resolve_basis_points(Decimal::new(500_000, 0), 0),
            Decimal::new(0, 2)
        );
    }

    #[test]
    fn odd_bps_rounds_to_cents() {
        // 333,333 × 0.0333 = 11,099.9889 -> 11,099.99
        let amount = resolve_basis_points(Decimal::new(333_333, 0), 333);
        assert_eq!(amount, Decimal::new(11_099_99, 2));
    }
}
