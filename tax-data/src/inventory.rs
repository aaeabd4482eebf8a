//! Plain-text listing of what a repository holds.

use tax_core::{Rebate, RepositoryError, TaxBracket, TaxPeriod, TaxRepository};

/// Every period with its brackets, then every rebate grouped by year,
/// newest year first.
pub async fn inventory<R: TaxRepository + ?Sized>(repo: &R) -> Result<String, RepositoryError> {
    let mut out = String::new();

    for period in repo.list_tax_periods().await? {
        out.push_str(&period_line(&period));
        for bracket in repo.get_tax_brackets(&period.identifier).await? {
            out.push_str(&bracket_line(&bracket));
        }
    }

    for year in repo.list_financial_years().await? {
        out.push_str(&format!("Rebates {year}:\n"));
        for rebate in repo.list_rebates(Some(year)).await? {
            out.push_str(&rebate_line(&rebate));
        }
    }

    Ok(out)
}

fn period_line(period: &TaxPeriod) -> String {
    format!(
        "{} (financial year {}): {} to {}\n",
        period.identifier, period.financial_year, period.effective_date, period.end_date
    )
}

fn bracket_line(bracket: &TaxBracket) -> String {
    let max = bracket
        .max_income
        .map(|m| m.to_string())
        .unwrap_or_else(|| "and above".to_string());
    format!(
        "  {:>10} - {:<10} base {:>10}  {:>3}%\n",
        bracket.min_income.to_string(),
        max,
        bracket.base_tax.to_string(),
        bracket.rate_percent
    )
}

fn rebate_line(rebate: &Rebate) -> String {
    format!(
        "  {:<26} {:>8}\n",
        rebate.age_group.label(),
        rebate.rebate_amount.to_string()
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tax_core::AgeGroup;

    use super::*;

    #[test]
    fn unbounded_bracket_reads_and_above() {
        let bracket = TaxBracket {
            min_income: dec!(1817001),
            max_income: None,
            base_tax: dec!(644489),
            rate_percent: 45,
        };

        assert_eq!(
            bracket_line(&bracket),
            "     1817001 - and above  base     644489   45%\n"
        );
    }

    #[test]
    fn bounded_bracket_columns_line_up() {
        let bracket = TaxBracket {
            min_income: dec!(1),
            max_income: Some(dec!(237100)),
            base_tax: dec!(0),
            rate_percent: 18,
        };

        assert_eq!(
            bracket_line(&bracket),
            "           1 - 237100     base          0   18%\n"
        );
    }

    #[test]
    fn rebate_uses_the_published_label() {
        let rebate = Rebate {
            age_group: AgeGroup::Secondary,
            financial_year: 2024,
            rebate_amount: dec!(9444),
        };

        assert_eq!(rebate_line(&rebate), "  Secondary (65 and older)       9444\n");
    }
}
