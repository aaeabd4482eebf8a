//! Errors raised while building tables or resolving a taxpayer's liability.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AgeGroup;

/// Failure kinds, independent of the context each error carries.
///
/// Adapters map kinds to transport status codes; the core never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedBracketTable,
    AmbiguousPeriod,
    MalformedPeriod,
    MalformedRebateTable,
    NoApplicablePeriod,
    NoMatchingBracket,
    NoMatchingRebate,
    InvalidInput,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedBracketTable => "MalformedBracketTable",
            Self::AmbiguousPeriod => "AmbiguousPeriod",
            Self::MalformedPeriod => "MalformedPeriod",
            Self::MalformedRebateTable => "MalformedRebateTable",
            Self::NoApplicablePeriod => "NoApplicablePeriod",
            Self::NoMatchingBracket => "NoMatchingBracket",
            Self::NoMatchingRebate => "NoMatchingRebate",
            Self::InvalidInput => "InvalidInput",
        }
    }

    /// Data-integrity problems found while loading tables.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::MalformedBracketTable
                | Self::AmbiguousPeriod
                | Self::MalformedPeriod
                | Self::MalformedRebateTable
        )
    }

    /// Valid input that matched nothing. Recoverable by the caller.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NoApplicablePeriod | Self::NoMatchingBracket | Self::NoMatchingRebate
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Gap, overlap, ordering or value problem in one bracket table.
    #[error("malformed bracket table '{table}': {reason}")]
    MalformedBracketTable { table: String, reason: String },

    /// Two periods claim the same day, or share an identifier.
    #[error("ambiguous tax period: '{first}' and '{second}' {reason}")]
    AmbiguousPeriod {
        first: String,
        second: String,
        reason: String,
    },

    #[error("malformed tax period '{period}': {reason}")]
    MalformedPeriod { period: String, reason: String },

    #[error("malformed rebate table: {reason}")]
    MalformedRebateTable { reason: String },

    #[error("no tax period covers {date}")]
    NoApplicablePeriod { date: NaiveDate },

    #[error("no bracket in '{table}' matches income {income}")]
    NoMatchingBracket { table: String, income: Decimal },

    #[error("no {age_group} rebate for financial year {financial_year}")]
    NoMatchingRebate {
        age_group: AgeGroup,
        financial_year: i32,
    },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },
}

impl ResolutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedBracketTable { .. } => ErrorKind::MalformedBracketTable,
            Self::AmbiguousPeriod { .. } => ErrorKind::AmbiguousPeriod,
            Self::MalformedPeriod { .. } => ErrorKind::MalformedPeriod,
            Self::MalformedRebateTable { .. } => ErrorKind::MalformedRebateTable,
            Self::NoApplicablePeriod { .. } => ErrorKind::NoApplicablePeriod,
            Self::NoMatchingBracket { .. } => ErrorKind::NoMatchingBracket,
            Self::NoMatchingRebate { .. } => ErrorKind::NoMatchingRebate,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
        }
    }

    pub fn invalid_input(
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_table(
        table: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedBracketTable {
            table: table.into(),
            reason: reason.into(),
        }
    }
}
