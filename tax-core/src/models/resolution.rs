use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AgeGroup, TaxBracket};

/// Outcome of resolving period, bracket and rebate for one taxpayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Identifier of the matched tax period.
    pub period: String,
    pub financial_year: i32,
    pub matched_bracket: TaxBracket,
    pub age_group: AgeGroup,
    pub rebate_amount: Decimal,
    pub tax_before_rebate: Decimal,
    /// Never negative.
    pub tax_after_rebate: Decimal,
}
