//! Arithmetic shared by bracket and rebate calculations.
//!
//! Amounts are whole currency units. Rounding happens once, on the final
//! tax figure, never on intermediate products.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to whole units; exact halves move away from zero.
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::round_half_up;
///
/// assert_eq!(round_half_up(dec!(42677.5)), dec!(42678));
/// assert_eq!(round_half_up(dec!(42677.49)), dec!(42677));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn marginal_tax_on_first_bracket_ceiling_rounds_up() {
        // 237099 * 0.18
        assert_eq!(round_half_up(dec!(42677.82)), dec!(42678));
    }

    #[test]
    fn half_cent_boundaries() {
        assert_eq!(round_half_up(dec!(0.5)), dec!(1));
        assert_eq!(round_half_up(dec!(0.49)), dec!(0));
        assert_eq!(round_half_up(dec!(-0.5)), dec!(-1));
    }

    #[test]
    fn whole_amounts_are_unchanged() {
        assert_eq!(round_half_up(dec!(644489)), dec!(644489));
        assert_eq!(round_half_up(dec!(0.00)), dec!(0));
    }

    #[test]
    fn rebate_exceeding_tax_clamps_at_zero() {
        assert_eq!(max(dec!(9000) - dec!(17235), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(max(dec!(42678) - dec!(17235), Decimal::ZERO), dec!(25443));
    }
}
