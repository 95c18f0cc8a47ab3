use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::EngineResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Valuation multiples (e.g. 2.5x trailing free cash flow)
pub type Multiple = Decimal;

/// One practice. The unit of data isolation: every store call and every
/// report is scoped to exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> EngineResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(EngineError::InvalidInput {
                field: "tenant_id".into(),
                reason: "Tenant id must be a non-empty string".into(),
            });
        }
        Ok(TenantId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single categorized bank/accounting transaction, as supplied by the
/// transaction store. Immutable; amounts are signed (inflows positive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub tenant_id: TenantId,
    pub date: NaiveDate,
    pub amount: Money,
    pub vendor: String,
    /// Category assigned by the external categorization system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// The enumerated set of category tags the categorization collaborator
/// marks as capital expenditure. Membership is an exact tag match, never
/// vendor-string sniffing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategorySet {
    pub capital_expenditure: HashSet<String>,
}

impl CategorySet {
    pub fn new<I, S>(capex_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CategorySet {
            capital_expenditure: capex_tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Capability check: is this transaction classified as capital expenditure?
    pub fn is_capex(&self, tx: &Transaction) -> bool {
        tx.category
            .as_deref()
            .map(|c| self.capital_expenditure.contains(c))
            .unwrap_or(false)
    }
}

/// Lifecycle of a detected loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Seen at least three times on a monthly cadence.
    Active,
    /// Payments stopped for more than two expected cycles.
    PaidOff,
    /// Pattern present but with fewer than three observations.
    Unconfirmed,
}

/// A recurring debt-service obligation materialized by the loan detector.
/// Owned and mutated only by detection; at most one non-duplicate row per
/// (tenant, vendor, payment cluster).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub vendor: String,
    pub estimated_principal: Money,
    pub monthly_payment: Money,
    pub estimated_annual_rate: Rate,
    pub first_detected: NaiveDate,
    pub last_seen: NaiveDate,
    pub status: LoanStatus,
    /// Number of payments the detector has observed for this cluster.
    pub observed_payments: u32,
}

/// An immutable point-in-time valuation estimate. Append-only: repeated
/// valuations append repeated snapshots, which is the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub computed_at: DateTime<Utc>,
    pub methodology: String,
    pub trailing_cash_flow: Money,
    pub industry_multiple: Multiple,
    pub estimated_value: Money,
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
