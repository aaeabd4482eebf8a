//! Routes and handlers.
//!
//! | method | path            |
//! |--------|-----------------|
//! | GET    | `/`             |
//! | GET    | `/health`       |
//! | GET    | `/periods`      |
//! | POST   | `/get-tax-rate` |
//! | POST   | `/get-rebate`   |
//! | POST   | `/resolve`      |
//! | POST   | `/reload`       |

use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tax_core::{AgeGroup, ResolutionResult, TaxBracket, TaxPeriod, age_group_for};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};

use crate::app::AppState;
use crate::error::ApiError;

pub const WELCOME: &str = "Welcome to the Tax Table Service!";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/periods", get(periods))
        .route("/get-tax-rate", post(get_tax_rate))
        .route("/get-rebate", post(get_rebate))
        .route("/resolve", post(resolve))
        .route("/reload", post(reload))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

// ── requests and responses ──

#[derive(Debug, Deserialize)]
pub struct TaxRateRequest {
    pub income: Option<Value>,
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaxRateResponse {
    pub tax_rate: u8,
    pub period: String,
    pub financial_year: i32,
    pub bracket: TaxBracket,
}

#[derive(Debug, Deserialize)]
pub struct RebateRequest {
    pub age: Option<i64>,
    #[serde(alias = "criteria")]
    pub age_group: Option<String>,
    pub date: Option<String>,
    pub financial_year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct RebateResponse {
    pub rebate_amount: Decimal,
    pub age_group: AgeGroup,
    pub financial_year: i32,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub date: Option<String>,
    pub income: Option<Value>,
    pub age: Option<i64>,
}

// ── handlers ──

async fn index() -> &'static str {
    WELCOME
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

async fn periods(State(state): State<AppState>) -> Json<Vec<TaxPeriod>> {
    Json(state.resolver.periods())
}

async fn get_tax_rate(
    State(state): State<AppState>,
    payload: Result<Json<TaxRateRequest>, JsonRejection>,
) -> Result<Json<TaxRateResponse>, ApiError> {
    let Json(req) = payload?;
    let income = parse_income(req.income.as_ref())?;
    if income.is_zero() {
        return Err(ApiError::bad_request("Income is required"));
    }
    let date = parse_date(req.date.as_deref())?;

    let (period, bracket) = state.resolver.tax_rate(date, income)?;
    Ok(Json(TaxRateResponse {
        tax_rate: bracket.rate_percent,
        period: period.identifier,
        financial_year: period.financial_year,
        bracket,
    }))
}

async fn get_rebate(
    State(state): State<AppState>,
    payload: Result<Json<RebateRequest>, JsonRejection>,
) -> Result<Json<RebateResponse>, ApiError> {
    let Json(req) = payload?;
    let age_group = match (req.age, req.age_group.as_deref()) {
        (Some(age), _) => age_group_for(parse_age(age)?)?,
        (None, Some(name)) => AgeGroup::parse(name)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown age group '{name}'")))?,
        (None, None) => return Err(ApiError::bad_request("Criteria is required")),
    };

    // One snapshot for both lookups so a reload in between cannot mix years.
    let tables = state.resolver.snapshot();
    let financial_year = match req.financial_year {
        Some(year) => year,
        None => {
            let date = parse_date(req.date.as_deref())?;
            tables.periods.resolve_period(date)?.period.financial_year
        }
    };
    let rebate = tables.rebate_for_year(age_group, financial_year)?;

    Ok(Json(RebateResponse {
        rebate_amount: rebate.rebate_amount,
        age_group: rebate.age_group,
        financial_year: rebate.financial_year,
    }))
}

async fn resolve(
    State(state): State<AppState>,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<ResolutionResult>, ApiError> {
    let Json(req) = payload?;
    let income = parse_income(req.income.as_ref())?;
    let age = req
        .age
        .ok_or_else(|| ApiError::bad_request("Age is required"))
        .and_then(parse_age)?;
    let date = parse_date(req.date.as_deref())?;

    Ok(Json(state.resolver.compute(date, income, age)?))
}

async fn reload(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let tables = state.reload().await?;
    info!(periods = tables.periods.len(), rebates = tables.rebates.len(), "reloaded on request");
    Ok(Json(json!({
        "periods": tables.periods.len(),
        "rebates": tables.rebates.len(),
    })))
}

// ── field parsing ──

/// Accepts JSON numbers only. Missing and `null` are "Income is required";
/// strings, negatives and other types are "Invalid income value".
fn parse_income(value: Option<&Value>) -> Result<Decimal, ApiError> {
    let number = match value {
        None | Some(Value::Null) => return Err(ApiError::bad_request("Income is required")),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(ApiError::bad_request("Invalid income value")),
    };
    let income = Decimal::from_str(&number)
        .or_else(|_| Decimal::from_scientific(&number))
        .map_err(|_| ApiError::bad_request("Invalid income value"))?;
    if income.is_sign_negative() && !income.is_zero() {
        return Err(ApiError::bad_request("Invalid income value"));
    }
    Ok(income)
}

fn parse_age(age: i64) -> Result<i32, ApiError> {
    i32::try_from(age).map_err(|_| ApiError::bad_request(format!("Invalid age {age}")))
}

/// `YYYY-MM-DD`, or today's local date when absent.
fn parse_date(date: Option<&str>) -> Result<NaiveDate, ApiError> {
    match date {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            ApiError::bad_request(format!("Invalid date '{s}', expected YYYY-MM-DD"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn income_accepts_integers_and_fractions() {
        assert_eq!(parse_income(Some(&json!(237100))).unwrap(), dec!(237100));
        assert_eq!(parse_income(Some(&json!(1234.5))).unwrap(), dec!(1234.5));
        assert_eq!(parse_income(Some(&json!(0))).unwrap(), dec!(0));
    }

    #[test]
    fn income_rejections_follow_the_service_messages() {
        let message = |v: Option<&Value>| parse_income(v).unwrap_err().to_string();

        assert_eq!(message(None), "Income is required");
        assert_eq!(message(Some(&Value::Null)), "Income is required");
        assert_eq!(message(Some(&json!(-5))), "Invalid income value");
        assert_eq!(message(Some(&json!("500000"))), "Invalid income value");
        assert_eq!(message(Some(&json!([1]))), "Invalid income value");
    }

    #[test]
    fn date_is_strict_iso() {
        assert_eq!(
            parse_date(Some("2024-02-29")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date(Some("2023-02-29")).is_err());
        assert!(parse_date(Some("29/02/2024")).is_err());
    }

    #[test]
    fn age_outside_i32_is_rejected() {
        assert!(parse_age(i64::from(i32::MAX) + 1).is_err());
        assert_eq!(parse_age(70).unwrap(), 70);
    }
}
