//! Date → tax period resolution over non-overlapping validity windows.

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::BracketTable;
use crate::error::ResolutionError;
use crate::models::TaxPeriod;

/// A tax period together with its bracket table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodEntry {
    pub period: TaxPeriod,
    pub brackets: BracketTable,
}

/// All known tax periods, sorted by `effective_date`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodRegistry {
    entries: Vec<PeriodEntry>,
}

impl PeriodRegistry {
    /// Builds the registry and checks every window against its neighbours.
    ///
    /// # Errors
    ///
    /// * [`ResolutionError::MalformedPeriod`] if a window ends before it starts.
    /// * [`ResolutionError::AmbiguousPeriod`] if two windows share a day or
    ///   two periods share an identifier.
    pub fn new(periods: Vec<(TaxPeriod, BracketTable)>) -> Result<Self, ResolutionError> {
        let mut entries: Vec<PeriodEntry> = periods
            .into_iter()
            .map(|(period, brackets)| PeriodEntry { period, brackets })
            .collect();

        for entry in &entries {
            let p = &entry.period;
            if p.end_date < p.effective_date {
                return Err(ResolutionError::MalformedPeriod {
                    period: p.identifier.clone(),
                    reason: format!("ends {} before it starts {}", p.end_date, p.effective_date),
                });
            }
        }

        entries.sort_by(|a, b| {
            a.period
                .effective_date
                .cmp(&b.period.effective_date)
                .then_with(|| a.period.identifier.cmp(&b.period.identifier))
        });

        // Sorted by start, so any overlap shows up between neighbours.
        for pair in entries.windows(2) {
            let (a, b) = (&pair[0].period, &pair[1].period);
            if a.overlaps(b) {
                return Err(ResolutionError::AmbiguousPeriod {
                    first: a.identifier.clone(),
                    second: b.identifier.clone(),
                    reason: format!(
                        "overlap: {}..={} and {}..={}",
                        a.effective_date, a.end_date, b.effective_date, b.end_date
                    ),
                });
            }
        }

        let mut identifiers: Vec<&str> = entries
            .iter()
            .map(|e| e.period.identifier.as_str())
            .collect();
        identifiers.sort_unstable();
        if let Some(dup) = identifiers.windows(2).find(|w| w[0] == w[1]) {
            return Err(ResolutionError::AmbiguousPeriod {
                first: dup[0].to_string(),
                second: dup[1].to_string(),
                reason: "share an identifier".to_string(),
            });
        }

        debug!(periods = entries.len(), "period registry validated");
        Ok(Self { entries })
    }

    /// Selects the single period whose window contains `date`.
    ///
    /// # Errors
    ///
    /// * [`ResolutionError::NoApplicablePeriod`] if no window covers `date`.
    /// * [`ResolutionError::AmbiguousPeriod`] if more than one does.
    pub fn resolve_period(
        &self,
        date: NaiveDate,
    ) -> Result<&PeriodEntry, ResolutionError> {
        let mut matches = self.entries.iter().filter(|e| e.period.contains(date));

        let Some(found) = matches.next() else {
            return Err(ResolutionError::NoApplicablePeriod { date });
        };
        if let Some(other) = matches.next() {
            warn!(
                %date,
                first = %found.period.identifier,
                second = %other.period.identifier,
                "overlapping periods matched at query time"
            );
            return Err(ResolutionError::AmbiguousPeriod {
                first: found.period.identifier.clone(),
                second: other.period.identifier.clone(),
                reason: format!("both cover {date}"),
            });
        }

        Ok(found)
    }

    pub fn get(
        &self,
        identifier: &str,
    ) -> Option<&PeriodEntry> {
        self.entries
            .iter()
            .find(|e| e.period.identifier == identifier)
    }

    /// Periods in effective-date order.
    pub fn periods(&self) -> impl Iterator<Item = &TaxPeriod> {
        self.entries.iter().map(|e| &e.period)
    }

    pub fn entries(&self) -> &[PeriodEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
