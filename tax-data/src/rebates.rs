use std::io::Read;

use rust_decimal::Decimal;
use serde::Deserialize;
use tax_core::{AgeGroup, Rebate, RebateTable, RepositoryError, ResolutionError, TaxRepository};
use thiserror::Error;
use tracing::info;

use crate::published::parse_currency;

#[derive(Debug, Error)]
pub enum RebateLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Unknown age group '{0}'")]
    UnknownAgeGroup(String),

    #[error("Invalid rebate table: {0}")]
    InvalidTable(#[from] ResolutionError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for RebateLoaderError {
    fn from(err: csv::Error) -> Self {
        RebateLoaderError::CsvParse(err.to_string())
    }
}

/// One row of the rebate CSV: `age_group,financial_year,rebate_amount`.
///
/// `age_group` takes the canonical name or the published label
/// (`Secondary (65 and older)`); `rebate_amount` may be written as a plain
/// number or as a currency cell (`R17 235`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RebateRecord {
    pub age_group: String,
    pub financial_year: i32,
    #[serde(deserialize_with = "deserialize_amount")]
    pub rebate_amount: Decimal,
}

fn deserialize_amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_currency(&s).map_err(serde::de::Error::custom)
}

impl RebateRecord {
    pub fn to_rebate(&self) -> Result<Rebate, RebateLoaderError> {
        let age_group = AgeGroup::parse(&self.age_group)
            .ok_or_else(|| RebateLoaderError::UnknownAgeGroup(self.age_group.clone()))?;
        Ok(Rebate {
            age_group,
            financial_year: self.financial_year,
            rebate_amount: self.rebate_amount,
        })
    }
}

pub struct RebateLoader;

impl RebateLoader {
    pub fn parse<R: Read>(reader: R) -> Result<Vec<RebateRecord>, RebateLoaderError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: RebateRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Validates every record, then upserts each rebate.
    ///
    /// Nothing is written if any record has an unknown age group, a negative
    /// amount, or duplicates another `(age_group, financial_year)` pair.
    pub async fn load<R: TaxRepository + ?Sized>(
        repo: &R,
        records: &[RebateRecord],
    ) -> Result<usize, RebateLoaderError> {
        let rebates = records
            .iter()
            .map(RebateRecord::to_rebate)
            .collect::<Result<Vec<_>, _>>()?;
        let table = RebateTable::new(rebates)?;

        for rebate in table.iter() {
            repo.upsert_rebate(rebate).await?;
        }

        info!(rebates = table.len(), "rebates loaded");
        Ok(table.len())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_parse_plain_and_currency_amounts() {
        let csv = "age_group,financial_year,rebate_amount\n\
                   Primary,2025,17235\n\
                   Secondary (65 and older),2025,R9 444\n";

        let records = RebateLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rebate_amount, dec!(17235));
        assert_eq!(records[1].rebate_amount, dec!(9444));
        assert_eq!(
            records[1].to_rebate().unwrap().age_group,
            AgeGroup::Secondary
        );
    }

    #[test]
    fn test_parse_rejects_bad_amount() {
        let csv = "age_group,financial_year,rebate_amount\nPrimary,2025,lots";

        let err = RebateLoader::parse(csv.as_bytes()).expect_err("Should fail for bad amount");

        assert!(matches!(err, RebateLoaderError::CsvParse(_)));
    }

    #[test]
    fn test_unknown_age_group() {
        let record = RebateRecord {
            age_group: "Quaternary".to_string(),
            financial_year: 2025,
            rebate_amount: dec!(1),
        };

        let err = record.to_rebate().unwrap_err();

        assert!(matches!(err, RebateLoaderError::UnknownAgeGroup(g) if g == "Quaternary"));
    }
}
