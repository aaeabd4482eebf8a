use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::{max, round_half_up};

/// One progressive tax bracket.
///
/// `max_income` of `None` marks the unbounded top bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub min_income: Decimal,
    pub max_income: Option<Decimal>,
    /// Cumulative tax owed on all income below `min_income`.
    pub base_tax: Decimal,
    /// Marginal rate, in whole percent.
    pub rate_percent: u8,
}

impl TaxBracket {
    /// Marginal rate as a fraction (`18` → `0.18`).
    pub fn rate(&self) -> Decimal {
        Decimal::from(self.rate_percent) / Decimal::ONE_HUNDRED
    }

    /// Whether this bracket has no upper bound.
    pub fn is_unbounded(&self) -> bool {
        self.max_income.is_none()
    }

    /// Progressive tax owed on `income` when it falls in this bracket.
    ///
    /// The product is computed exactly and rounded once, half-up, to whole
    /// units. Income below `min_income` contributes nothing above the base.
    pub fn tax_on(
        &self,
        income: Decimal,
    ) -> Decimal {
        let marginal_income = max(income - self.min_income, Decimal::ZERO);
        round_half_up(self.base_tax + marginal_income * self.rate())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn first_bracket() -> TaxBracket {
        TaxBracket {
            min_income: dec!(1),
            max_income: Some(dec!(237100)),
            base_tax: dec!(0),
            rate_percent: 18,
        }
    }

    #[test]
    fn rate_is_fraction_of_percent() {
        assert_eq!(first_bracket().rate(), dec!(0.18));
    }

    #[test]
    fn tax_on_rounds_half_up_to_whole_units() {
        // 237099 * 0.18 = 42677.82
        assert_eq!(first_bracket().tax_on(dec!(237100)), dec!(42678));
    }

    #[test]
    fn tax_on_midpoint_rounds_up() {
        let bracket = TaxBracket {
            min_income: dec!(0),
            max_income: None,
            base_tax: dec!(0),
            rate_percent: 50,
        };

        // 3 * 0.5 = 1.5
        assert_eq!(bracket.tax_on(dec!(3)), dec!(2));
    }

    #[test]
    fn tax_on_below_min_income_is_base_tax() {
        let bracket = TaxBracket {
            min_income: dec!(1),
            max_income: Some(dec!(100)),
            base_tax: dec!(7),
            rate_percent: 10,
        };

        assert_eq!(bracket.tax_on(dec!(0)), dec!(7));
    }

    #[test]
    fn tax_on_at_min_income_is_base_tax() {
        let bracket = TaxBracket {
            min_income: dec!(237101),
            max_income: Some(dec!(370500)),
            base_tax: dec!(42678),
            rate_percent: 26,
        };

        assert_eq!(bracket.tax_on(dec!(237101)), dec!(42678));
    }

    #[test]
    fn unbounded_bracket_has_no_max() {
        let bracket = TaxBracket {
            min_income: dec!(1817001),
            max_income: None,
            base_tax: dec!(644489),
            rate_percent: 45,
        };

        assert!(bracket.is_unbounded());
        assert!(!first_bracket().is_unbounded());
    }
}
