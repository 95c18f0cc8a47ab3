//! Single-process, mutex-guarded implementation of the store traits.
//!
//! The loan upsert here serializes on the store mutex; a production backend
//! gets the same guarantee from a uniqueness constraint on
//! (tenant, vendor, payment cluster) plus a conditional write.

use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::{LoanDraft, LoanStore, LoanUpsert, SnapshotStore, TransactionSource};
use crate::types::{Loan, LoanStatus, TenantId, Transaction, ValuationSnapshot};
use crate::EngineResult;

#[derive(Debug, Default)]
struct Tables {
    transactions: Vec<Transaction>,
    loans: Vec<Loan>,
    snapshots: Vec<ValuationSnapshot>,
}

/// In-memory store implementing all three persistence seams.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.tables.lock() {
            tables.transactions = transactions;
        }
        store
    }

    pub fn add_transaction(&self, tx: Transaction) -> EngineResult<()> {
        self.lock("add_transaction")?.transactions.push(tx);
        Ok(())
    }

    fn lock(&self, operation: &str) -> EngineResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| EngineError::StoreUnavailable {
                operation: operation.into(),
                reason: "store lock poisoned".into(),
            })
    }
}

impl TransactionSource for InMemoryStore {
    fn transactions_in_range(
        &self,
        tenant: &TenantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<Transaction>> {
        let tables = self.lock("transactions_in_range")?;
        let mut rows: Vec<Transaction> = tables
            .transactions
            .iter()
            .filter(|tx| &tx.tenant_id == tenant && tx.date >= from && tx.date <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|tx| tx.date);
        Ok(rows)
    }
}

impl LoanStore for InMemoryStore {
    fn loans(&self, tenant: &TenantId) -> EngineResult<Vec<Loan>> {
        let tables = self.lock("loans")?;
        Ok(tables
            .loans
            .iter()
            .filter(|l| &l.tenant_id == tenant)
            .cloned()
            .collect())
    }

    fn upsert_loan(&self, draft: LoanDraft) -> EngineResult<LoanUpsert> {
        let mut tables = self.lock("upsert_loan")?;

        let existing = tables.loans.iter_mut().find(|l| {
            l.tenant_id == draft.tenant_id
                && l.vendor == draft.vendor
                && (l.monthly_payment - draft.monthly_payment).abs() <= draft.payment_tolerance
        });

        match existing {
            Some(loan) => {
                let unchanged = loan.monthly_payment == draft.monthly_payment
                    && loan.estimated_principal == draft.estimated_principal
                    && loan.estimated_annual_rate == draft.estimated_annual_rate
                    && loan.last_seen == draft.last_seen
                    && loan.status == draft.status
                    && loan.observed_payments == draft.observed_payments;
                if unchanged {
                    return Ok(LoanUpsert::Unchanged(loan.clone()));
                }

                loan.monthly_payment = draft.monthly_payment;
                loan.estimated_principal = draft.estimated_principal;
                loan.estimated_annual_rate = draft.estimated_annual_rate;
                loan.first_detected = loan.first_detected.min(draft.first_detected);
                loan.last_seen = draft.last_seen;
                loan.status = draft.status;
                loan.observed_payments = draft.observed_payments;
                Ok(LoanUpsert::Updated(loan.clone()))
            }
            None => {
                let loan = Loan {
                    id: Uuid::new_v4(),
                    tenant_id: draft.tenant_id,
                    vendor: draft.vendor,
                    estimated_principal: draft.estimated_principal,
                    monthly_payment: draft.monthly_payment,
                    estimated_annual_rate: draft.estimated_annual_rate,
                    first_detected: draft.first_detected,
                    last_seen: draft.last_seen,
                    status: draft.status,
                    observed_payments: draft.observed_payments,
                };
                tables.loans.push(loan.clone());
                Ok(LoanUpsert::Created(loan))
            }
        }
    }

    fn set_loan_status(
        &self,
        tenant: &TenantId,
        loan_id: Uuid,
        status: LoanStatus,
    ) -> EngineResult<Loan> {
        let mut tables = self.lock("set_loan_status")?;
        let loan = tables
            .loans
            .iter_mut()
            .find(|l| &l.tenant_id == tenant && l.id == loan_id)
            .ok_or_else(|| EngineError::InvalidInput {
                field: "loan_id".into(),
                reason: format!("no loan {loan_id} for tenant {tenant}"),
            })?;
        loan.status = status;
        Ok(loan.clone())
    }
}

impl SnapshotStore for InMemoryStore {
    fn append_snapshot(&self, snapshot: ValuationSnapshot) -> EngineResult<()> {
        self.lock("append_snapshot")?.snapshots.push(snapshot);
        Ok(())
    }

    fn snapshot_history(&self, tenant: &TenantId) -> EngineResult<Vec<ValuationSnapshot>> {
        let tables = self.lock("snapshot_history")?;
        let mut rows: Vec<ValuationSnapshot> = tables
            .snapshots
            .iter()
            .filter(|s| &s.tenant_id == tenant)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.computed_at);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(tenant: &str, vendor: &str, payment: rust_decimal::Decimal) -> LoanDraft {
        LoanDraft {
            tenant_id: TenantId::new(tenant).unwrap(),
            vendor: vendor.into(),
            monthly_payment: payment,
            payment_tolerance: dec!(10.00),
            estimated_principal: dec!(24000.00),
            estimated_annual_rate: dec!(0.075),
            first_detected: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            last_seen: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            status: LoanStatus::Active,
            observed_payments: 5,
        }
    }

    #[test]
    fn test_upsert_matches_within_tolerance() {
        let store = InMemoryStore::new();
        let first = store.upsert_loan(draft("p1", "Bank A", dec!(500.00))).unwrap();
        assert!(matches!(first, LoanUpsert::Created(_)));

        // Same cluster, payment drifted by $4: must update, not duplicate.
        let mut second = draft("p1", "Bank A", dec!(504.00));
        second.observed_payments = 6;
        let outcome = store.upsert_loan(second).unwrap();
        assert!(matches!(outcome, LoanUpsert::Updated(_)));

        let tenant = TenantId::new("p1").unwrap();
        assert_eq!(store.loans(&tenant).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_identical_draft_is_unchanged() {
        let store = InMemoryStore::new();
        store.upsert_loan(draft("p1", "Bank A", dec!(500.00))).unwrap();
        let outcome = store.upsert_loan(draft("p1", "Bank A", dec!(500.00))).unwrap();
        assert!(matches!(outcome, LoanUpsert::Unchanged(_)));
    }

    #[test]
    fn test_loans_are_tenant_scoped() {
        let store = InMemoryStore::new();
        store.upsert_loan(draft("p1", "Bank A", dec!(500.00))).unwrap();
        store.upsert_loan(draft("p2", "Bank A", dec!(500.00))).unwrap();

        let p1 = TenantId::new("p1").unwrap();
        let p2 = TenantId::new("p2").unwrap();
        assert_eq!(store.loans(&p1).unwrap().len(), 1);
        assert_eq!(store.loans(&p2).unwrap().len(), 1);
        assert_ne!(
            store.loans(&p1).unwrap()[0].id,
            store.loans(&p2).unwrap()[0].id
        );
    }
}
