//! A complete, validated set of tables that resolution runs against.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use super::{BracketTable, PeriodRegistry, RebateTable};
use crate::calculations::max;
use crate::db::{RepositoryError, TaxRepository};
use crate::error::ResolutionError;
use crate::models::{AgeGroup, Rebate, ResolutionResult, TaxBracket, TaxPeriod};

/// Largest accepted age. Anything above is treated as a data-entry error.
pub const MAX_AGE: i32 = 130;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read tables: {0}")]
    Repository(#[from] RepositoryError),

    #[error("stored tables are inconsistent: {0}")]
    Integrity(#[from] ResolutionError),
}

/// Immutable snapshot of every period, bracket table and rebate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxTables {
    pub periods: PeriodRegistry,
    pub rebates: RebateTable,
}

impl TaxTables {
    pub fn new(
        periods: PeriodRegistry,
        rebates: RebateTable,
    ) -> Self {
        Self { periods, rebates }
    }

    /// Reads periods and brackets from `tax_repo` and rebates from
    /// `rebate_repo`, validating everything before returning.
    ///
    /// Both arguments may be the same repository.
    pub async fn load(
        tax_repo: &dyn TaxRepository,
        rebate_repo: &dyn TaxRepository,
    ) -> Result<Self, LoadError> {
        let mut periods = Vec::new();
        for period in tax_repo.list_tax_periods().await? {
            let brackets = tax_repo.get_tax_brackets(&period.identifier).await?;
            debug!(
                period = %period.identifier,
                brackets = brackets.len(),
                "loaded bracket table"
            );
            let table = BracketTable::new(period.identifier.clone(), brackets)?;
            periods.push((period, table));
        }
        let periods = PeriodRegistry::new(periods)?;
        let rebates = RebateTable::new(rebate_repo.list_rebates(None).await?)?;

        info!(
            periods = periods.len(),
            rebates = rebates.len(),
            "tax tables loaded"
        );
        Ok(Self { periods, rebates })
    }

    /// Period, bracket, rebate and tax owed for one taxpayer.
    ///
    /// # Errors
    ///
    /// * [`ResolutionError::InvalidInput`] for a negative income or an age
    ///   outside `0..=130`.
    /// * The not-found kinds when no period, bracket or rebate matches.
    pub fn resolve(
        &self,
        date: NaiveDate,
        income: Decimal,
        age: i32,
    ) -> Result<ResolutionResult, ResolutionError> {
        validate_income(income)?;
        let age_group = age_group_for(age)?;

        let entry = self.periods.resolve_period(date)?;
        let bracket = entry.brackets.lookup(income)?;
        let rebate = self
            .rebates
            .lookup(age_group, entry.period.financial_year)?;

        let tax_before_rebate = bracket.tax_on(income);
        let tax_after_rebate = max(tax_before_rebate - rebate.rebate_amount, Decimal::ZERO);

        Ok(ResolutionResult {
            period: entry.period.identifier.clone(),
            financial_year: entry.period.financial_year,
            matched_bracket: bracket.clone(),
            age_group,
            rebate_amount: rebate.rebate_amount,
            tax_before_rebate,
            tax_after_rebate,
        })
    }

    /// The period covering `date` and the bracket `income` falls in.
    pub fn tax_rate(
        &self,
        date: NaiveDate,
        income: Decimal,
    ) -> Result<(TaxPeriod, TaxBracket), ResolutionError> {
        validate_income(income)?;
        let entry = self.periods.resolve_period(date)?;
        let bracket = entry.brackets.lookup(income)?;
        Ok((entry.period.clone(), bracket.clone()))
    }

    /// The rebate for `age` in the financial year of the period covering `date`.
    pub fn rebate(
        &self,
        date: NaiveDate,
        age: i32,
    ) -> Result<Rebate, ResolutionError> {
        let age_group = age_group_for(age)?;
        let entry = self.periods.resolve_period(date)?;
        self.rebate_for_year(age_group, entry.period.financial_year)
    }

    pub fn rebate_for_year(
        &self,
        age_group: AgeGroup,
        financial_year: i32,
    ) -> Result<Rebate, ResolutionError> {
        self.rebates.lookup(age_group, financial_year).cloned()
    }
}

fn validate_income(income: Decimal) -> Result<(), ResolutionError> {
    if income < Decimal::ZERO {
        return Err(ResolutionError::invalid_input(
            "income",
            format!("must not be negative, got {income}"),
        ));
    }
    Ok(())
}

/// Age group for `age`, rejecting ages outside `0..=MAX_AGE`.
pub fn age_group_for(age: i32) -> Result<AgeGroup, ResolutionError> {
    if !(0..=MAX_AGE).contains(&age) {
        return Err(ResolutionError::invalid_input(
            "age",
            format!("must be between 0 and {MAX_AGE}, got {age}"),
        ));
    }
    // Range checked above, so the cast is lossless.
    Ok(AgeGroup::from_age(age as u32))
}
