pub mod bracket_table;
pub mod period_registry;
pub mod rebate_table;
pub mod snapshot;

pub use bracket_table::BracketTable;
pub use period_registry::{PeriodEntry, PeriodRegistry};
pub use rebate_table::RebateTable;
pub use snapshot::{LoadError, MAX_AGE, TaxTables, age_group_for};
