//! Thread-safe front door over the current [`TaxTables`] snapshot.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::db::TaxRepository;
use crate::error::ResolutionError;
use crate::models::{AgeGroup, Rebate, ResolutionResult, TaxBracket, TaxPeriod};
use crate::tables::{LoadError, TaxTables};

/// Resolves (date, income, age) against a swappable table snapshot.
///
/// Each call clones the current `Arc` and works on that snapshot alone, so a
/// concurrent [`replace_tables`](Self::replace_tables) is never observed
/// half-way.
#[derive(Debug, Default)]
pub struct TaxResolver {
    tables: RwLock<Arc<TaxTables>>,
}

impl TaxResolver {
    pub fn new(tables: TaxTables) -> Self {
        Self {
            tables: RwLock::new(Arc::new(tables)),
        }
    }

    /// Builds a resolver from freshly loaded repository contents.
    pub async fn load(
        tax_repo: &dyn TaxRepository,
        rebate_repo: &dyn TaxRepository,
    ) -> Result<Self, LoadError> {
        Ok(Self::new(TaxTables::load(tax_repo, rebate_repo).await?))
    }

    /// The snapshot in effect right now.
    pub fn snapshot(&self) -> Arc<TaxTables> {
        // A panic while holding the lock cannot leave the Arc half-written.
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps in a new snapshot; returns the previous one.
    pub fn replace_tables(
        &self,
        tables: TaxTables,
    ) -> Arc<TaxTables> {
        let next = Arc::new(tables);
        let mut guard = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, next);
        info!(
            periods = guard.periods.len(),
            rebates = guard.rebates.len(),
            "tax tables replaced"
        );
        previous
    }

    /// Rebuilds the snapshot from the repositories and swaps it in.
    ///
    /// On failure the current snapshot stays in place.
    pub async fn reload(
        &self,
        tax_repo: &dyn TaxRepository,
        rebate_repo: &dyn TaxRepository,
    ) -> Result<Arc<TaxTables>, LoadError> {
        let tables = TaxTables::load(tax_repo, rebate_repo).await?;
        self.replace_tables(tables);
        Ok(self.snapshot())
    }

    pub fn compute(
        &self,
        date: NaiveDate,
        income: Decimal,
        age: i32,
    ) -> Result<ResolutionResult, ResolutionError> {
        let result = self.snapshot().resolve(date, income, age);
        match &result {
            Ok(r) => debug!(
                %date,
                %income,
                age,
                period = %r.period,
                tax_after_rebate = %r.tax_after_rebate,
                "resolved"
            ),
            Err(e) => debug!(%date, %income, age, kind = %e.kind(), "resolution failed"),
        }
        result
    }

    /// Alias of [`compute`](Self::compute).
    pub fn resolve(
        &self,
        date: NaiveDate,
        income: Decimal,
        age: i32,
    ) -> Result<ResolutionResult, ResolutionError> {
        self.compute(date, income, age)
    }

    pub fn tax_rate(
        &self,
        date: NaiveDate,
        income: Decimal,
    ) -> Result<(TaxPeriod, TaxBracket), ResolutionError> {
        self.snapshot().tax_rate(date, income)
    }

    pub fn rebate(
        &self,
        date: NaiveDate,
        age: i32,
    ) -> Result<Rebate, ResolutionError> {
        self.snapshot().rebate(date, age)
    }

    pub fn rebate_for_year(
        &self,
        age_group: AgeGroup,
        financial_year: i32,
    ) -> Result<Rebate, ResolutionError> {
        self.snapshot().rebate_for_year(age_group, financial_year)
    }

    /// Periods of the current snapshot in effective-date order.
    pub fn periods(&self) -> Vec<TaxPeriod> {
        self.snapshot().periods.periods().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::error::ErrorKind;
    use crate::tables::{BracketTable, PeriodRegistry, RebateTable};

    fn date(
        y: i32,
        m: u32,
        d: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn flat_tables(
        year: i32,
        rate_percent: u8,
        primary_rebate: Decimal,
    ) -> TaxTables {
        let identifier = format!("tax_period_{year}");
        let brackets = BracketTable::new(
            identifier.clone(),
            vec![TaxBracket {
                min_income: dec!(0),
                max_income: None,
                base_tax: dec!(0),
                rate_percent,
            }],
        )
        .unwrap();
        let period = TaxPeriod {
            identifier,
            financial_year: year,
            effective_date: date(year - 1, 3, 1),
            end_date: date(year, 2, 28),
        };
        let rebates = RebateTable::new(vec![Rebate {
            age_group: AgeGroup::Primary,
            financial_year: year,
            rebate_amount: primary_rebate,
        }])
        .unwrap();
        TaxTables::new(PeriodRegistry::new(vec![(period, brackets)]).unwrap(), rebates)
    }

    #[test]
    fn default_resolver_has_no_periods() {
        let resolver = TaxResolver::default();

        let err = resolver.compute(date(2024, 6, 1), dec!(1000), 30).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoApplicablePeriod);
        assert!(resolver.periods().is_empty());
    }

    #[test]
    fn replace_tables_switches_snapshot() {
        let resolver = TaxResolver::new(flat_tables(2025, 10, dec!(0)));
        let before = resolver.snapshot();

        let previous = resolver.replace_tables(flat_tables(2025, 20, dec!(0)));

        assert!(Arc::ptr_eq(&before, &previous));
        let after = resolver.compute(date(2024, 6, 1), dec!(1000), 30).unwrap();
        assert_eq!(after.tax_before_rebate, dec!(200));
        // The old snapshot is still usable by whoever holds it.
        let old = before.resolve(date(2024, 6, 1), dec!(1000), 30).unwrap();
        assert_eq!(old.tax_before_rebate, dec!(100));
    }

    #[test]
    fn compute_is_idempotent() {
        let resolver = TaxResolver::new(flat_tables(2025, 18, dec!(100)));

        let first = resolver.compute(date(2024, 6, 1), dec!(12345.67), 30).unwrap();
        let second = resolver.compute(date(2024, 6, 1), dec!(12345.67), 30).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn resolver_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TaxResolver>();
    }
}
