//! Practice valuation: trailing-twelve-month free cash flow times a
//! configured industry multiple, with an append-only snapshot history.

use std::time::Instant;

use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::audit::{audit_value, AuditAction, AuditEvent, AuditSink};
use crate::cash_flow::compute_free_cash_flow;
use crate::store::{SnapshotStore, TransactionSource};
use crate::types::{
    with_metadata, CategorySet, ComputationOutput, Money, Multiple, TenantId, ValuationSnapshot,
};
use crate::EngineResult;

const METHODOLOGY: &str = "Trailing-twelve-month free cash flow times industry multiple";

/// Valuation inputs supplied by configuration, not computed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationConfig {
    /// Multiple applied to trailing free cash flow for the practice vertical.
    pub industry_multiple: Multiple,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        ValuationConfig {
            industry_multiple: dec!(2.5),
        }
    }
}

/// The caller-facing view of one valuation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationReport {
    pub snapshot_id: Uuid,
    pub trailing_twelve_month_free_cash_flow: Money,
    pub industry_multiple: Multiple,
    pub estimated_value: Money,
}

/// Estimate the practice's value and persist a snapshot.
///
/// Every call appends a new snapshot — valuation is a point-in-time
/// measurement and the repeated history is the intended audit trail. A
/// tenant with no transactions values at zero, not an error.
pub fn calculate_valuation(
    source: &impl TransactionSource,
    snapshots: &impl SnapshotStore,
    audit: &impl AuditSink,
    tenant: &TenantId,
    as_of: NaiveDate,
    categories: &CategorySet,
    config: &ValuationConfig,
) -> EngineResult<ComputationOutput<ValuationReport>> {
    let start = Instant::now();

    let cash_flow = compute_free_cash_flow(source, tenant, None, as_of, categories)?;
    let trailing = cash_flow.result.trailing_twelve_month_free_cash_flow;
    let estimated_value = (trailing * config.industry_multiple).round_dp(2);

    let snapshot = ValuationSnapshot {
        id: Uuid::new_v4(),
        tenant_id: tenant.clone(),
        computed_at: Utc::now(),
        methodology: METHODOLOGY.to_string(),
        trailing_cash_flow: trailing,
        industry_multiple: config.industry_multiple,
        estimated_value,
    };
    snapshots.append_snapshot(snapshot.clone())?;

    audit.record(AuditEvent {
        action: AuditAction::ValuationSnapshotCreated,
        entity_kind: "valuation_snapshot",
        entity_id: snapshot.id.to_string(),
        tenant_id: tenant.clone(),
        old: serde_json::Value::Null,
        new: audit_value(&snapshot),
    });

    let report = ValuationReport {
        snapshot_id: snapshot.id,
        trailing_twelve_month_free_cash_flow: trailing,
        industry_multiple: config.industry_multiple,
        estimated_value,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHODOLOGY,
        &json!({
            "tenant_id": tenant,
            "as_of": as_of,
            "industry_multiple": config.industry_multiple,
        }),
        cash_flow.warnings,
        elapsed,
        report,
    ))
}

/// All snapshots for a tenant, oldest first. Empty for unknown tenants.
pub fn valuation_history(
    snapshots: &impl SnapshotStore,
    tenant: &TenantId,
) -> EngineResult<Vec<ValuationSnapshot>> {
    snapshots.snapshot_history(tenant)
}
