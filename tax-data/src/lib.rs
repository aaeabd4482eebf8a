pub mod brackets;
pub mod inventory;
pub mod published;
pub mod rebates;

pub use brackets::{TaxPeriodLoader, TaxPeriodLoaderError, TaxPeriodRecord};
pub use inventory::inventory;
pub use published::{PublishedBracketRecord, PublishedCellError};
pub use rebates::{RebateLoader, RebateLoaderError, RebateRecord};
