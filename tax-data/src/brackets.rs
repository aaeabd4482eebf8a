use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tax_core::{
    BracketTable, PeriodRegistry, RepositoryError, ResolutionError, TaxBracket, TaxPeriod,
    TaxRepository,
};
use thiserror::Error;
use tracing::info;

use crate::published::{PublishedBracketRecord, PublishedCellError, bound_or_unbounded};

/// Errors that can occur when loading tax period and bracket data.
#[derive(Debug, Error)]
pub enum TaxPeriodLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Rows for period '{period}' disagree on {field}")]
    InconsistentPeriod { period: String, field: &'static str },

    #[error("Published table cell: {0}")]
    PublishedCell(#[from] PublishedCellError),

    #[error("Invalid tax table: {0}")]
    InvalidTable(#[from] ResolutionError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for TaxPeriodLoaderError {
    fn from(err: csv::Error) -> Self {
        TaxPeriodLoaderError::CsvParse(err.to_string())
    }
}

/// A single record from the tax brackets CSV file.
///
/// Every row repeats its period's window, so a file can carry several
/// periods:
/// - `period`: period identifier (e.g. `tax_period_2025`)
/// - `financial_year`: the year the period ends in
/// - `effective_date`, `end_date`: inclusive window, `YYYY-MM-DD`
/// - `min_income`, `max_income`: whole amounts; an empty `max_income` or
///   `9999999999` marks the top bracket
/// - `base_tax`: tax on all income below `min_income`
/// - `rate_percent`: whole percent, e.g. `26`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TaxPeriodRecord {
    pub period: String,
    pub financial_year: i32,
    pub effective_date: NaiveDate,
    pub end_date: NaiveDate,
    pub min_income: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub max_income: Option<Decimal>,
    pub base_tax: Decimal,
    pub rate_percent: u8,
}

impl TaxPeriodRecord {
    fn tax_period(&self) -> TaxPeriod {
        TaxPeriod {
            identifier: self.period.clone(),
            financial_year: self.financial_year,
            effective_date: self.effective_date,
            end_date: self.end_date,
        }
    }

    fn bracket(&self) -> TaxBracket {
        TaxBracket {
            min_income: self.min_income,
            max_income: self.max_income,
            base_tax: self.base_tax,
            rate_percent: self.rate_percent,
        }
    }
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(bound_or_unbounded)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Loader for tax periods and their brackets from CSV files.
///
/// Works against any [`TaxRepository`] backend.
pub struct TaxPeriodLoader;

impl TaxPeriodLoader {
    /// Parse tax period records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<TaxPeriodRecord>, TaxPeriodLoaderError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: TaxPeriodRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Parse brackets copied from the published table, converting the
    /// income-range and rate cells into plain records.
    pub fn parse_published<R: Read>(reader: R) -> Result<Vec<TaxPeriodRecord>, TaxPeriodLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let published: PublishedBracketRecord = result?;
            records.push(published.to_record()?);
        }

        Ok(records)
    }

    /// Load tax period records into the database.
    ///
    /// Every period in `records` is validated before anything is written:
    /// its rows must agree on year and window, and its brackets must form a
    /// valid [`BracketTable`]. The incoming windows are then checked together
    /// with the periods already stored (an incoming period replaces a stored
    /// one of the same identifier), so a load can never leave the database in
    /// a state the resolver refuses. Then, for each period, the window is
    /// upserted and its brackets replaced. Loading the same file twice gives
    /// the same result. Returns the number of brackets written.
    pub async fn load<R: TaxRepository + ?Sized>(
        repo: &R,
        records: &[TaxPeriodRecord],
    ) -> Result<usize, TaxPeriodLoaderError> {
        let mut groups: BTreeMap<&str, Vec<&TaxPeriodRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.period.as_str()).or_default().push(record);
        }

        let mut validated = Vec::with_capacity(groups.len());
        for (period_id, rows) in groups {
            let period = rows[0].tax_period();
            for row in &rows[1..] {
                let field = if row.financial_year != period.financial_year {
                    Some("financial_year")
                } else if row.effective_date != period.effective_date {
                    Some("effective_date")
                } else if row.end_date != period.end_date {
                    Some("end_date")
                } else {
                    None
                };
                if let Some(field) = field {
                    return Err(TaxPeriodLoaderError::InconsistentPeriod {
                        period: period_id.to_string(),
                        field,
                    });
                }
            }

            let table = BracketTable::new(period_id, rows.iter().map(|r| r.bracket()).collect())?;
            validated.push((period, table));
        }

        let incoming: BTreeSet<String> = validated
            .iter()
            .map(|(period, _)| period.identifier.clone())
            .collect();
        let registry = Self::merge_with_stored(repo, &incoming, validated).await?;

        let mut inserted = 0;
        for entry in registry.entries() {
            let (period, table) = (&entry.period, &entry.brackets);
            if !incoming.contains(&period.identifier) {
                continue;
            }
            repo.insert_tax_period(period).await?;
            repo.delete_tax_brackets(&period.identifier).await?;
            for bracket in table.brackets() {
                repo.insert_tax_bracket(&period.identifier, bracket).await?;
                inserted += 1;
            }
            info!(
                period = %period.identifier,
                brackets = table.len(),
                "tax period loaded"
            );
        }

        Ok(inserted)
    }

    /// The registry the database would hold after the load: stored periods
    /// not being replaced, plus the incoming ones.
    async fn merge_with_stored<R: TaxRepository + ?Sized>(
        repo: &R,
        incoming: &BTreeSet<String>,
        validated: Vec<(TaxPeriod, BracketTable)>,
    ) -> Result<PeriodRegistry, TaxPeriodLoaderError> {
        let mut merged = validated;
        for period in repo.list_tax_periods().await? {
            if incoming.contains(&period.identifier) {
                continue;
            }
            let brackets = repo.get_tax_brackets(&period.identifier).await?;
            let table = BracketTable::new(&period.identifier, brackets)?;
            merged.push((period, table));
        }
        Ok(PeriodRegistry::new(merged)?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    const HEADER: &str =
        "period,financial_year,effective_date,end_date,min_income,max_income,base_tax,rate_percent";

    const TEST_CSV: &str = r#"period,financial_year,effective_date,end_date,min_income,max_income,base_tax,rate_percent
tax_period_2025,2025,2024-03-01,2025-02-28,1,237100,0,18
tax_period_2025,2025,2024-03-01,2025-02-28,237101,370500,42678,26
tax_period_2025,2025,2024-03-01,2025-02-28,370501,512800,77362,31
tax_period_2025,2025,2024-03-01,2025-02-28,512801,673000,121475,36
tax_period_2025,2025,2024-03-01,2025-02-28,673001,857900,179147,39
tax_period_2025,2025,2024-03-01,2025-02-28,857901,1817000,251258,41
tax_period_2025,2025,2024-03-01,2025-02-28,1817001,9999999999,644489,45
"#;

    fn date(
        y: i32,
        m: u32,
        d: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_csv_single_bracket() {
        let csv = format!("{HEADER}\ntax_period_2024,2024,2023-03-01,2024-02-29,1,237100,0,18");

        let records = TaxPeriodLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(
            records,
            vec![TaxPeriodRecord {
                period: "tax_period_2024".to_string(),
                financial_year: 2024,
                effective_date: date(2023, 3, 1),
                end_date: date(2024, 2, 29),
                min_income: dec!(1),
                max_income: Some(dec!(237100)),
                base_tax: dec!(0),
                rate_percent: 18,
            }]
        );
    }

    #[test]
    fn test_parse_csv_sentinel_is_unbounded() {
        let records = TaxPeriodLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(records.len(), 7);
        assert_eq!(records[6].min_income, dec!(1817001));
        assert_eq!(records[6].max_income, None);
        assert_eq!(records[6].base_tax, dec!(644489));
    }

    #[test]
    fn test_parse_csv_empty_max_is_unbounded() {
        let csv = format!("{HEADER}\ntax_period_2025,2025,2024-03-01,2025-02-28,1817001,,644489,45");

        let records = TaxPeriodLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(records[0].max_income, None);
    }

    #[test]
    fn test_parse_invalid_csv_missing_column() {
        let csv = "period,financial_year,min_income\ntax_period_2025,2025,1";

        let err = TaxPeriodLoader::parse(csv.as_bytes()).expect_err("Should fail for missing column");

        let TaxPeriodLoaderError::CsvParse(msg) = err else {
            panic!("Expected CsvParse error, got: {:?}", err);
        };
        assert!(msg.contains("missing field"), "got: {}", msg);
    }

    #[test]
    fn test_parse_invalid_date() {
        let csv = format!("{HEADER}\ntax_period_2025,2025,2024-02-30,2025-02-28,1,,0,18");

        let err = TaxPeriodLoader::parse(csv.as_bytes()).expect_err("Should fail for invalid date");

        assert!(matches!(err, TaxPeriodLoaderError::CsvParse(_)));
    }

    #[test]
    fn test_parse_rate_out_of_u8_range() {
        let csv = format!("{HEADER}\ntax_period_2025,2025,2024-03-01,2025-02-28,1,,0,300");

        assert!(TaxPeriodLoader::parse(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_published_cells() {
        let csv = "period,financial_year,effective_date,end_date,taxable_income,rates_of_tax\n\
                   tax_period_2025,2025,2024-03-01,2025-02-28,1 – 237 100,18% of taxable income\n\
                   tax_period_2025,2025,2024-03-01,2025-02-28,\"237 101 – 370 500\",\"42 678 + 26% of taxable income above 237 100\"\n";

        let records = TaxPeriodLoader::parse_published(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].max_income, Some(dec!(237100)));
        assert_eq!(records[0].base_tax, dec!(0));
        assert_eq!(records[1].min_income, dec!(237101));
        assert_eq!(records[1].base_tax, dec!(42678));
        assert_eq!(records[1].rate_percent, 26);
    }

    #[test]
    fn test_parse_published_rejects_unreadable_rate() {
        let csv = "period,financial_year,effective_date,end_date,taxable_income,rates_of_tax\n\
                   tax_period_2025,2025,2024-03-01,2025-02-28,1 – 237 100,see note\n";

        let err = TaxPeriodLoader::parse_published(csv.as_bytes()).unwrap_err();

        assert!(matches!(
            err,
            TaxPeriodLoaderError::PublishedCell(PublishedCellError::Rate(_))
        ));
    }
}
