use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Rebate, TaxBracket, TaxPeriod};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Read/write access to tax periods, their brackets and rebates.
///
/// Brackets are keyed by the owning period's identifier; implementations
/// must bind it as a value and never splice it into SQL.
#[async_trait]
pub trait TaxRepository: Send + Sync {
    // Tax periods
    async fn list_tax_periods(&self) -> Result<Vec<TaxPeriod>, RepositoryError>;
    async fn get_tax_period(
        &self,
        identifier: &str,
    ) -> Result<TaxPeriod, RepositoryError>;
    /// Creates the period, or replaces the year and window of an existing one.
    async fn insert_tax_period(
        &self,
        period: &TaxPeriod,
    ) -> Result<(), RepositoryError>;

    // Tax brackets
    /// Brackets of one period ordered by `min_income`. Empty if none exist.
    async fn get_tax_brackets(
        &self,
        period_id: &str,
    ) -> Result<Vec<TaxBracket>, RepositoryError>;
    async fn insert_tax_bracket(
        &self,
        period_id: &str,
        bracket: &TaxBracket,
    ) -> Result<(), RepositoryError>;
    async fn delete_tax_brackets(
        &self,
        period_id: &str,
    ) -> Result<(), RepositoryError>;

    // Rebates
    /// Distinct financial years that have rebates, newest first.
    async fn list_financial_years(&self) -> Result<Vec<i32>, RepositoryError>;
    async fn list_rebates(
        &self,
        financial_year: Option<i32>,
    ) -> Result<Vec<Rebate>, RepositoryError>;
    /// Inserts or replaces the rebate for `(age_group, financial_year)`.
    async fn upsert_rebate(
        &self,
        rebate: &Rebate,
    ) -> Result<(), RepositoryError>;
}
