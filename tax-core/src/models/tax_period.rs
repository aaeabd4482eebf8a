use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A named validity window for one bracket table.
///
/// Both `effective_date` and `end_date` are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaxPeriod {
    pub identifier: String,
    pub financial_year: i32,
    pub effective_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl TaxPeriod {
    pub fn contains(
        &self,
        date: NaiveDate,
    ) -> bool {
        self.effective_date <= date && date <= self.end_date
    }

    /// Whether the two windows share at least one day.
    pub fn overlaps(
        &self,
        other: &TaxPeriod,
    ) -> bool {
        self.effective_date <= other.end_date && other.effective_date <= self.end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(
        start: (i32, u32, u32),
        end: (i32, u32, u32),
    ) -> TaxPeriod {
        TaxPeriod {
            identifier: "p".to_string(),
            financial_year: end.0,
            effective_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        }
    }

    #[test]
    fn contains_is_inclusive_at_both_ends() {
        let p = period((2023, 3, 1), (2024, 2, 28));

        assert!(p.contains(NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()));
        assert!(p.contains(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap()));
        assert!(!p.contains(NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()));
        assert!(!p.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
    }

    #[test]
    fn adjacent_windows_do_not_overlap() {
        let a = period((2023, 3, 1), (2024, 2, 28));
        let b = period((2024, 3, 1), (2025, 2, 28));

        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn shared_day_overlaps() {
        let a = period((2023, 3, 1), (2024, 3, 1));
        let b = period((2024, 3, 1), (2025, 2, 28));

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }
}
