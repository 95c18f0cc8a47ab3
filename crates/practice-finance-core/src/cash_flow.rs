//! Free-cash-flow reporting: buckets a tenant's transactions by calendar
//! month and derives operating and free cash flow per bucket.

use std::time::Instant;

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::EngineError;
use crate::store::TransactionSource;
use crate::types::{with_metadata, CategorySet, ComputationOutput, Money, TenantId};
use crate::EngineResult;

pub const DEFAULT_WINDOW_MONTHS: u32 = 12;
pub const MAX_WINDOW_MONTHS: u32 = 36;

/// One calendar month of aggregated activity. Emitted for every month in
/// the window, including months with no transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBucket {
    pub month_start: NaiveDate,
    /// Sum of positive amounts.
    pub inflow: Money,
    /// Sum of negative amounts, sign-normalized to a positive magnitude.
    pub outflow: Money,
    pub net_operating_cash_flow: Money,
    /// Net operating cash flow less capital-expenditure-tagged outflows.
    pub free_cash_flow: Money,
    pub transaction_count: u32,
}

impl MonthlyBucket {
    fn empty(month_start: NaiveDate) -> Self {
        MonthlyBucket {
            month_start,
            inflow: Decimal::ZERO,
            outflow: Decimal::ZERO,
            net_operating_cash_flow: Decimal::ZERO,
            free_cash_flow: Decimal::ZERO,
            transaction_count: 0,
        }
    }
}

/// Per-request cash flow report. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowReport {
    /// Effective window after clamping; always equals `buckets.len()`.
    pub window_months: u32,
    /// Oldest first.
    pub buckets: Vec<MonthlyBucket>,
    /// Mean free cash flow over buckets with at least one transaction;
    /// zero when the whole window is empty.
    pub avg_monthly_free_cash_flow: Money,
    /// Sum of free cash flow over the most recent min(12, window) buckets.
    pub trailing_twelve_month_free_cash_flow: Money,
}

/// Compute the free-cash-flow report for one tenant.
///
/// `window_months` defaults to 12 and is clamped to `[1, 36]` — out-of-range
/// requests are capped with a warning, never rejected. The report always
/// contains exactly one bucket per month of the effective window, so a
/// tenant with no transactions gets an all-zero report rather than an error.
pub fn compute_free_cash_flow(
    source: &impl TransactionSource,
    tenant: &TenantId,
    window_months: Option<u32>,
    as_of: NaiveDate,
    categories: &CategorySet,
) -> EngineResult<ComputationOutput<CashFlowReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let requested = window_months.unwrap_or(DEFAULT_WINDOW_MONTHS);
    let effective = requested.clamp(1, MAX_WINDOW_MONTHS);
    if effective != requested {
        warnings.push(format!(
            "Requested window of {requested} months clamped to {effective}"
        ));
    }

    let window_start = window_start(as_of, effective)?;
    let transactions = source.transactions_in_range(tenant, window_start, as_of)?;

    let mut buckets: Vec<MonthlyBucket> = (0..effective)
        .map(|offset| {
            window_start
                .checked_add_months(Months::new(offset))
                .map(MonthlyBucket::empty)
                .ok_or_else(|| EngineError::DateError("month offset out of range".into()))
        })
        .collect::<EngineResult<_>>()?;

    let mut capex: Vec<Money> = vec![Decimal::ZERO; effective as usize];

    for tx in &transactions {
        let Some(idx) = bucket_index(window_start, tx.date, effective) else {
            continue;
        };
        let bucket = &mut buckets[idx];
        bucket.transaction_count += 1;
        if tx.amount > Decimal::ZERO {
            bucket.inflow += tx.amount;
        } else if tx.amount < Decimal::ZERO {
            bucket.outflow += -tx.amount;
            if categories.is_capex(tx) {
                capex[idx] += -tx.amount;
            }
        }
    }

    for (bucket, capex) in buckets.iter_mut().zip(&capex) {
        bucket.net_operating_cash_flow = bucket.inflow - bucket.outflow;
        bucket.free_cash_flow = bucket.net_operating_cash_flow - *capex;
    }

    let active: Vec<&MonthlyBucket> = buckets.iter().filter(|b| b.transaction_count > 0).collect();
    let avg_monthly_free_cash_flow = if active.is_empty() {
        Decimal::ZERO
    } else {
        let total: Decimal = active.iter().map(|b| b.free_cash_flow).sum();
        (total / Decimal::from(active.len() as u64)).round_dp(2)
    };

    let trailing = buckets.len().saturating_sub(12);
    let trailing_twelve_month_free_cash_flow: Money =
        buckets[trailing..].iter().map(|b| b.free_cash_flow).sum();

    let report = CashFlowReport {
        window_months: effective,
        buckets,
        avg_monthly_free_cash_flow,
        trailing_twelve_month_free_cash_flow,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Calendar-month bucketing; free cash flow = operating net less capital-expenditure-tagged outflows",
        &json!({
            "tenant_id": tenant,
            "requested_window_months": window_months,
            "effective_window_months": effective,
            "as_of": as_of,
            "capex_categories": categories.capital_expenditure,
        }),
        warnings,
        elapsed,
        report,
    ))
}

/// First day of the oldest month in an `effective`-month window ending at
/// `as_of`.
fn window_start(as_of: NaiveDate, effective: u32) -> EngineResult<NaiveDate> {
    let month_start = NaiveDate::from_ymd_opt(as_of.year(), as_of.month(), 1)
        .ok_or_else(|| EngineError::DateError(format!("invalid as_of date {as_of}")))?;
    month_start
        .checked_sub_months(Months::new(effective - 1))
        .ok_or_else(|| EngineError::DateError("window start before representable dates".into()))
}

/// Bucket index of `date` relative to `window_start`, or None if outside
/// the window.
fn bucket_index(window_start: NaiveDate, date: NaiveDate, effective: u32) -> Option<usize> {
    let months = (date.year() - window_start.year()) * 12
        + (date.month() as i32 - window_start.month() as i32);
    if (0..effective as i32).contains(&months) {
        Some(months as usize)
    } else {
        None
    }
}
