use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use practice_finance_core::audit::NullAuditSink;
use practice_finance_core::loans::DetectorConfig;
use practice_finance_core::store::memory::InMemoryStore;
use practice_finance_core::types::{CategorySet, TenantId, Transaction};
use practice_finance_core::valuation::ValuationConfig;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Options shared by the report entry points. The host passes this as a
/// JSON string next to the transaction array.
#[derive(Deserialize)]
struct ReportOptions {
    tenant_id: String,
    as_of: NaiveDate,
    #[serde(default)]
    months: Option<u32>,
    #[serde(default)]
    capex_categories: Vec<String>,
    #[serde(default)]
    extra_monthly_payment: Option<Decimal>,
    #[serde(default)]
    industry_multiple: Option<Decimal>,
}

fn parse_inputs(
    transactions_json: &str,
    options_json: &str,
) -> NapiResult<(InMemoryStore, TenantId, ReportOptions)> {
    let transactions: Vec<Transaction> =
        serde_json::from_str(transactions_json).map_err(to_napi_error)?;
    let options: ReportOptions = serde_json::from_str(options_json).map_err(to_napi_error)?;
    let tenant = TenantId::new(options.tenant_id.clone()).map_err(to_napi_error)?;
    Ok((InMemoryStore::with_transactions(transactions), tenant, options))
}

#[napi]
pub fn cash_flow_report(transactions_json: String, options_json: String) -> NapiResult<String> {
    let (store, tenant, options) = parse_inputs(&transactions_json, &options_json)?;
    let categories = CategorySet::new(options.capex_categories);
    let output = practice_finance_core::cash_flow::compute_free_cash_flow(
        &store,
        &tenant,
        options.months,
        options.as_of,
        &categories,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn detect_loans(transactions_json: String, options_json: String) -> NapiResult<String> {
    let (store, tenant, options) = parse_inputs(&transactions_json, &options_json)?;
    let output = practice_finance_core::loans::detect_loans(
        &store,
        &store,
        &NullAuditSink,
        &tenant,
        options.as_of,
        &DetectorConfig::default(),
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn cost_of_capital(transactions_json: String, options_json: String) -> NapiResult<String> {
    let (store, tenant, options) = parse_inputs(&transactions_json, &options_json)?;
    let output = practice_finance_core::cost_of_capital::calculate_cost_of_capital(
        &store,
        &store,
        &NullAuditSink,
        &tenant,
        options.extra_monthly_payment,
        options.as_of,
        &DetectorConfig::default(),
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn valuation(transactions_json: String, options_json: String) -> NapiResult<String> {
    let (store, tenant, options) = parse_inputs(&transactions_json, &options_json)?;
    let config = match options.industry_multiple {
        Some(industry_multiple) => ValuationConfig { industry_multiple },
        None => ValuationConfig::default(),
    };
    let categories = CategorySet::new(options.capex_categories);
    let output = practice_finance_core::valuation::calculate_valuation(
        &store,
        &store,
        &NullAuditSink,
        &tenant,
        options.as_of,
        &categories,
        &config,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
