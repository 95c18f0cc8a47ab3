//! Best-effort audit events emitted after state mutations. The sink is a
//! one-way channel with its own failure domain: `record` cannot fail, and
//! implementations must absorb their own errors so an unavailable audit
//! backend never rolls back a loan upsert or a valuation snapshot.

use serde::Serialize;
use serde_json::Value;

use crate::types::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    LoanCreated,
    LoanUpdated,
    LoanStatusChanged,
    ValuationSnapshotCreated,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub entity_kind: &'static str,
    pub entity_id: String,
    pub tenant_id: TenantId,
    pub old: Value,
    pub new: Value,
}

/// Snapshot an entity state for an audit payload. Serialization problems
/// degrade to `null` rather than failing the mutation being audited.
pub fn audit_value(entity: &impl Serialize) -> Value {
    serde_json::to_value(entity).unwrap_or(Value::Null)
}

/// One-way audit sink. Fire-and-forget: failures stay inside the sink.
pub trait AuditSink {
    fn record(&self, event: AuditEvent);
}

/// Emits audit events as structured tracing records.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(
                target: "audit",
                tenant = %event.tenant_id,
                action = ?event.action,
                entity = event.entity_kind,
                entity_id = %event.entity_id,
                %payload,
            ),
            Err(err) => tracing::warn!(
                target: "audit",
                tenant = %event.tenant_id,
                "failed to encode audit event: {err}"
            ),
        }
    }
}

/// Discards all events. Useful for tests and pure computations.
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}
