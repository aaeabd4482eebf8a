mod rebate;
mod resolution;
mod tax_bracket;
mod tax_period;

pub use rebate::{AgeGroup, Rebate};
pub use resolution::ResolutionResult;
pub use tax_bracket::TaxBracket;
pub use tax_period::TaxPeriod;
