//! Validated, immutable bracket table for one tax period.

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::ResolutionError;
use crate::models::TaxBracket;

/// Contiguous, non-overlapping progressive brackets, sorted by `min_income`.
///
/// Bounds are whole units, so a bracket covers `[min_income, max_income + 1)`;
/// for whole incomes that is exactly the inclusive range. When the first
/// bracket starts at 1 it also covers `[0, 1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketTable {
    name: String,
    brackets: Vec<TaxBracket>,
}

impl BracketTable {
    /// Validates `brackets` once and takes ownership of them.
    ///
    /// # Errors
    ///
    /// [`ResolutionError::MalformedBracketTable`] if the table is empty, has
    /// a gap or overlap, a fractional bound, a rate above 100, a negative or
    /// decreasing base tax, an unbounded bracket that is not last, or does
    /// not start at 0 or 1.
    pub fn new(
        name: impl Into<String>,
        mut brackets: Vec<TaxBracket>,
    ) -> Result<Self, ResolutionError> {
        let name = name.into();
        brackets.sort_by(|a, b| a.min_income.cmp(&b.min_income));

        let Some(first) = brackets.first() else {
            return Err(ResolutionError::malformed_table(&name, "no brackets"));
        };
        if first.min_income > Decimal::ONE {
            return Err(ResolutionError::malformed_table(
                &name,
                format!("first bracket starts at {}, expected 0 or 1", first.min_income),
            ));
        }

        for bracket in &brackets {
            validate_bracket(&name, bracket)?;
        }

        for pair in brackets.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            let Some(prev_max) = prev.max_income else {
                return Err(ResolutionError::malformed_table(
                    &name,
                    format!(
                        "unbounded bracket starting at {} is followed by another bracket",
                        prev.min_income
                    ),
                ));
            };

            let expected_min = prev_max + Decimal::ONE;
            if cur.min_income > expected_min {
                return Err(ResolutionError::malformed_table(
                    &name,
                    format!("gap between {} and {}", prev_max, cur.min_income),
                ));
            }
            if cur.min_income < expected_min {
                return Err(ResolutionError::malformed_table(
                    &name,
                    format!(
                        "bracket starting at {} overlaps bracket ending at {}",
                        cur.min_income, prev_max
                    ),
                ));
            }
            if cur.base_tax < prev.base_tax {
                return Err(ResolutionError::malformed_table(
                    &name,
                    format!(
                        "base tax decreases from {} to {} at {}",
                        prev.base_tax, cur.base_tax, cur.min_income
                    ),
                ));
            }
        }

        debug!(table = %name, brackets = brackets.len(), "bracket table validated");
        Ok(Self { name, brackets })
    }

    /// Selects the unique bracket containing `income`.
    ///
    /// # Errors
    ///
    /// [`ResolutionError::NoMatchingBracket`] for negative income or income
    /// above a bounded top bracket.
    pub fn lookup(
        &self,
        income: Decimal,
    ) -> Result<&TaxBracket, ResolutionError> {
        let no_match = || ResolutionError::NoMatchingBracket {
            table: self.name.clone(),
            income,
        };

        if income < Decimal::ZERO {
            return Err(no_match());
        }

        let idx = self.brackets.partition_point(|b| b.min_income <= income);
        // `new` guarantees at least one bracket starting at 0 or 1.
        let bracket = &self.brackets[idx.saturating_sub(1)];

        match bracket.max_income {
            Some(max) if income >= max + Decimal::ONE => Err(no_match()),
            _ => Ok(bracket),
        }
    }

    /// Name of the period this table belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }
}

fn validate_bracket(
    table: &str,
    bracket: &TaxBracket,
) -> Result<(), ResolutionError> {
    let min = bracket.min_income;

    if min < Decimal::ZERO {
        return Err(ResolutionError::malformed_table(
            table,
            format!("negative min_income {min}"),
        ));
    }
    if !min.fract().is_zero() {
        return Err(ResolutionError::malformed_table(
            table,
            format!("min_income {min} is not a whole amount"),
        ));
    }
    if let Some(max) = bracket.max_income {
        if !max.fract().is_zero() {
            return Err(ResolutionError::malformed_table(
                table,
                format!("max_income {max} is not a whole amount"),
            ));
        }
        if max < min {
            return Err(ResolutionError::malformed_table(
                table,
                format!("max_income {max} is below min_income {min}"),
            ));
        }
    }
    if bracket.rate_percent > 100 {
        return Err(ResolutionError::malformed_table(
            table,
            format!("rate {}% at {min} exceeds 100%", bracket.rate_percent),
        ));
    }
    if bracket.base_tax < Decimal::ZERO {
        return Err(ResolutionError::malformed_table(
            table,
            format!("negative base tax {} at {min}", bracket.base_tax),
        ));
    }
    Ok(())
}
