use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tax_core::{AgeGroup, Rebate, RepositoryError, TaxBracket, TaxPeriod, TaxRepository};
use tracing::debug;

use crate::decimal::{decimal_to_i64, decimal_to_text, get_decimal, get_optional_decimal};

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        let mut options = SqlitePoolOptions::new();
        if database_url.contains(":memory:") {
            // An in-memory database is dropped with its last connection.
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options
            .connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            debug!(file = %path.display(), "seed file applied");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn row_to_tax_period(row: &sqlx::sqlite::SqliteRow) -> Result<TaxPeriod, RepositoryError> {
    Ok(TaxPeriod {
        identifier: row.try_get("identifier").map_err(db_err)?,
        financial_year: row.try_get("financial_year").map_err(db_err)?,
        effective_date: row
            .try_get::<NaiveDate, _>("effective_date")
            .map_err(|e| RepositoryError::Database(format!("Failed to get effective_date: {}", e)))?,
        end_date: row
            .try_get::<NaiveDate, _>("end_date")
            .map_err(|e| RepositoryError::Database(format!("Failed to get end_date: {}", e)))?,
    })
}

fn row_to_tax_bracket(row: &sqlx::sqlite::SqliteRow) -> Result<TaxBracket, RepositoryError> {
    let rate: i64 = row.try_get("rate_percent").map_err(db_err)?;
    Ok(TaxBracket {
        min_income: get_decimal(row, "min_income")?,
        max_income: get_optional_decimal(row, "max_income")?,
        base_tax: get_decimal(row, "base_tax")?,
        rate_percent: u8::try_from(rate)
            .map_err(|_| RepositoryError::Database(format!("Rate {} is out of range", rate)))?,
    })
}

fn row_to_rebate(row: &sqlx::sqlite::SqliteRow) -> Result<Rebate, RepositoryError> {
    let label: String = row.try_get("age_group").map_err(db_err)?;
    Ok(Rebate {
        age_group: AgeGroup::parse(&label)
            .ok_or_else(|| RepositoryError::Database(format!("Unknown age group '{}'", label)))?,
        financial_year: row.try_get("financial_year").map_err(db_err)?,
        rebate_amount: get_decimal(row, "rebate_amount")?,
    })
}

#[async_trait]
impl TaxRepository for SqliteRepository {
    async fn list_tax_periods(&self) -> Result<Vec<TaxPeriod>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT identifier, financial_year, effective_date, end_date
             FROM tax_period
             ORDER BY effective_date, identifier",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_tax_period).collect()
    }

    async fn get_tax_period(
        &self,
        identifier: &str,
    ) -> Result<TaxPeriod, RepositoryError> {
        let row = sqlx::query(
            "SELECT identifier, financial_year, effective_date, end_date
             FROM tax_period WHERE identifier = ?",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_tax_period(&row)
    }

    async fn insert_tax_period(
        &self,
        period: &TaxPeriod,
    ) -> Result<(), RepositoryError> {
        // Upsert in place: a REPLACE would delete the row and cascade to its brackets.
        sqlx::query(
            "INSERT INTO tax_period (identifier, financial_year, effective_date, end_date)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (identifier) DO UPDATE SET
                 financial_year = excluded.financial_year,
                 effective_date = excluded.effective_date,
                 end_date = excluded.end_date",
        )
        .bind(&period.identifier)
        .bind(period.financial_year)
        .bind(period.effective_date)
        .bind(period.end_date)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_tax_brackets(
        &self,
        period_id: &str,
    ) -> Result<Vec<TaxBracket>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT min_income, max_income, base_tax, rate_percent
             FROM tax_brackets
             WHERE period_id = ?
             ORDER BY min_income",
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_tax_bracket).collect()
    }

    async fn insert_tax_bracket(
        &self,
        period_id: &str,
        bracket: &TaxBracket,
    ) -> Result<(), RepositoryError> {
        let max_income = bracket.max_income.map(decimal_to_i64).transpose()?;

        sqlx::query(
            "INSERT INTO tax_brackets (period_id, min_income, max_income, base_tax, rate_percent)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(period_id)
        .bind(decimal_to_i64(bracket.min_income)?)
        .bind(max_income)
        .bind(decimal_to_text(bracket.base_tax))
        .bind(i64::from(bracket.rate_percent))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn delete_tax_brackets(
        &self,
        period_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM tax_brackets WHERE period_id = ?")
            .bind(period_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn list_financial_years(&self) -> Result<Vec<i32>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT DISTINCT financial_year FROM rebates ORDER BY financial_year DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| row.try_get("financial_year").map_err(db_err))
            .collect()
    }

    async fn list_rebates(
        &self,
        financial_year: Option<i32>,
    ) -> Result<Vec<Rebate>, RepositoryError> {
        let rows = match financial_year {
            Some(year) => {
                sqlx::query(
                    "SELECT age_group, financial_year, rebate_amount
                     FROM rebates WHERE financial_year = ?
                     ORDER BY financial_year, age_group",
                )
                .bind(year)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT age_group, financial_year, rebate_amount
                     FROM rebates
                     ORDER BY financial_year, age_group",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_err)?;

        rows.iter().map(row_to_rebate).collect()
    }

    async fn upsert_rebate(
        &self,
        rebate: &Rebate,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO rebates (age_group, financial_year, rebate_amount)
             VALUES (?, ?, ?)
             ON CONFLICT (age_group, financial_year) DO UPDATE SET
                 rebate_amount = excluded.rebate_amount",
        )
        .bind(rebate.age_group.as_str())
        .bind(rebate.financial_year)
        .bind(decimal_to_text(rebate.rebate_amount))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
