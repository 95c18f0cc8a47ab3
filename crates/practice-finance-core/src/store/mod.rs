//! Trait seams for the external persistence collaborators. The engine never
//! talks to a database directly; real backends implement these contracts,
//! and [`memory::InMemoryStore`] backs tests, the CLI and the bindings.

pub mod memory;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Loan, LoanStatus, Money, Rate, TenantId, Transaction, ValuationSnapshot};
use crate::EngineResult;

/// Read-only access to a tenant's categorized transactions.
pub trait TransactionSource {
    /// All transactions for `tenant` with `from <= date <= to`. Must return
    /// only rows belonging to `tenant`.
    fn transactions_in_range(
        &self,
        tenant: &TenantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<Transaction>>;
}

/// What the loan detector hands to the store for an atomic upsert. The
/// cluster key is (tenant, vendor, payment within `payment_tolerance` of
/// `monthly_payment`); the backend must enforce uniqueness on that key so
/// concurrent detection runs in separate processes cannot duplicate rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanDraft {
    pub tenant_id: TenantId,
    pub vendor: String,
    pub monthly_payment: Money,
    /// Absolute band used to match this draft against existing rows.
    pub payment_tolerance: Money,
    pub estimated_principal: Money,
    pub estimated_annual_rate: Rate,
    pub first_detected: NaiveDate,
    pub last_seen: NaiveDate,
    pub status: LoanStatus,
    pub observed_payments: u32,
}

/// Outcome of a conditional loan write.
#[derive(Debug, Clone, PartialEq)]
pub enum LoanUpsert {
    Created(Loan),
    Updated(Loan),
    /// The draft matched an existing row and nothing differed.
    Unchanged(Loan),
}

impl LoanUpsert {
    pub fn loan(&self) -> &Loan {
        match self {
            LoanUpsert::Created(l) | LoanUpsert::Updated(l) | LoanUpsert::Unchanged(l) => l,
        }
    }
}

/// Persistence for detected loans.
pub trait LoanStore {
    /// Every loan row for the tenant, regardless of status.
    fn loans(&self, tenant: &TenantId) -> EngineResult<Vec<Loan>>;

    /// Conditional write keyed on (tenant, vendor, payment cluster): update
    /// the matching row if one exists, insert otherwise. Never duplicates.
    fn upsert_loan(&self, draft: LoanDraft) -> EngineResult<LoanUpsert>;

    /// Move an existing loan to a new status, returning the updated row.
    fn set_loan_status(
        &self,
        tenant: &TenantId,
        loan_id: Uuid,
        status: LoanStatus,
    ) -> EngineResult<Loan>;
}

/// Append-only persistence for valuation snapshots.
pub trait SnapshotStore {
    fn append_snapshot(&self, snapshot: ValuationSnapshot) -> EngineResult<()>;

    /// All snapshots for the tenant, oldest first.
    fn snapshot_history(&self, tenant: &TenantId) -> EngineResult<Vec<ValuationSnapshot>>;
}
