//! Resolution of South African income tax periods, brackets and rebates.

pub mod calculations;
pub mod db;
pub mod error;
pub mod models;
pub mod resolver;
pub mod tables;

pub use db::repository::{RepositoryError, TaxRepository};
pub use error::{ErrorKind, ResolutionError};
pub use models::*;
pub use resolver::TaxResolver;
pub use tables::{BracketTable, LoadError, PeriodRegistry, RebateTable, TaxTables, age_group_for};
