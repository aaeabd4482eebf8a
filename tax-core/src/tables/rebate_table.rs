//! (age group, financial year) → rebate lookup.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::error::ResolutionError;
use crate::models::{AgeGroup, Rebate};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebateTable {
    rebates: BTreeMap<(AgeGroup, i32), Rebate>,
}

impl RebateTable {
    /// # Errors
    ///
    /// [`ResolutionError::MalformedRebateTable`] on a duplicate
    /// `(age_group, financial_year)` pair or a negative amount.
    pub fn new(records: Vec<Rebate>) -> Result<Self, ResolutionError> {
        let mut rebates = BTreeMap::new();

        for record in records {
            if record.rebate_amount < Decimal::ZERO {
                return Err(ResolutionError::MalformedRebateTable {
                    reason: format!(
                        "negative {} rebate {} for {}",
                        record.age_group, record.rebate_amount, record.financial_year
                    ),
                });
            }
            let key = (record.age_group, record.financial_year);
            if rebates.insert(key, record).is_some() {
                return Err(ResolutionError::MalformedRebateTable {
                    reason: format!("duplicate {} rebate for {}", key.0, key.1),
                });
            }
        }

        Ok(Self { rebates })
    }

    /// # Errors
    ///
    /// [`ResolutionError::NoMatchingRebate`] when the pair is absent.
    pub fn lookup(
        &self,
        age_group: AgeGroup,
        financial_year: i32,
    ) -> Result<&Rebate, ResolutionError> {
        self.rebates
            .get(&(age_group, financial_year))
            .ok_or(ResolutionError::NoMatchingRebate {
                age_group,
                financial_year,
            })
    }

    /// Rebates for one year, ordered by age group.
    pub fn for_year(
        &self,
        financial_year: i32,
    ) -> Vec<&Rebate> {
        self.rebates
            .values()
            .filter(|r| r.financial_year == financial_year)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rebate> {
        self.rebates.values()
    }

    pub fn len(&self) -> usize {
        self.rebates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rebates.is_empty()
    }
}
