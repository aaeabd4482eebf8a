use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rebate category, derived from the taxpayer's age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeGroup {
    /// Under 65.
    Primary,
    /// 65 to 74.
    Secondary,
    /// 75 and older.
    Tertiary,
}

impl AgeGroup {
    pub const SECONDARY_MIN_AGE: u32 = 65;
    pub const TERTIARY_MIN_AGE: u32 = 75;

    pub fn all() -> &'static [AgeGroup] {
        &[AgeGroup::Primary, AgeGroup::Secondary, AgeGroup::Tertiary]
    }

    /// The only place the age partition is decided.
    pub fn from_age(age: u32) -> Self {
        if age >= Self::TERTIARY_MIN_AGE {
            AgeGroup::Tertiary
        } else if age >= Self::SECONDARY_MIN_AGE {
            AgeGroup::Secondary
        } else {
            AgeGroup::Primary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "Primary",
            Self::Secondary => "Secondary",
            Self::Tertiary => "Tertiary",
        }
    }

    /// Label used by the published rebate table.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "Primary",
            Self::Secondary => "Secondary (65 and older)",
            Self::Tertiary => "Tertiary (75 and older)",
        }
    }

    /// Accepts the canonical name or the published label, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|g| g.as_str().eq_ignore_ascii_case(s) || g.label().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat deduction from computed tax for one age group and financial year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rebate {
    pub age_group: AgeGroup,
    pub financial_year: i32,
    pub rebate_amount: Decimal,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn from_age_partitions_at_65_and_75() {
        assert_eq!(AgeGroup::from_age(0), AgeGroup::Primary);
        assert_eq!(AgeGroup::from_age(64), AgeGroup::Primary);
        assert_eq!(AgeGroup::from_age(65), AgeGroup::Secondary);
        assert_eq!(AgeGroup::from_age(70), AgeGroup::Secondary);
        assert_eq!(AgeGroup::from_age(74), AgeGroup::Secondary);
        assert_eq!(AgeGroup::from_age(75), AgeGroup::Tertiary);
        assert_eq!(AgeGroup::from_age(120), AgeGroup::Tertiary);
    }

    #[test]
    fn parse_accepts_canonical_names() {
        assert_eq!(AgeGroup::parse("Primary"), Some(AgeGroup::Primary));
        assert_eq!(AgeGroup::parse("secondary"), Some(AgeGroup::Secondary));
        assert_eq!(AgeGroup::parse(" TERTIARY "), Some(AgeGroup::Tertiary));
    }

    #[test]
    fn parse_accepts_published_labels() {
        assert_eq!(
            AgeGroup::parse("Secondary (65 and older)"),
            Some(AgeGroup::Secondary)
        );
        assert_eq!(
            AgeGroup::parse("Tertiary (75 and older)"),
            Some(AgeGroup::Tertiary)
        );
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!(AgeGroup::parse("Quaternary"), None);
        assert_eq!(AgeGroup::parse(""), None);
    }

    #[test]
    fn as_str_round_trips_through_parse() {
        for group in AgeGroup::all() {
            assert_eq!(AgeGroup::parse(group.as_str()), Some(*group));
        }
    }
}
