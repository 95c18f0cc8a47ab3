use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::audit::{audit_value, AuditAction, AuditEvent, AuditSink};
use crate::error::EngineError;
use crate::loans::cluster::{cluster_outgoing, qualifies, PaymentCluster};
use crate::loans::DetectorConfig;
use crate::store::{LoanDraft, LoanStore, LoanUpsert, TransactionSource};
use crate::types::{with_metadata, ComputationOutput, Loan, LoanStatus, Money, Rate, TenantId};
use crate::EngineResult;

/// Result of one detection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Loans newly created or whose status changed during this run. A
    /// repeat run over unchanged transaction data returns an empty list.
    pub changed_loans: Vec<Loan>,
    pub clusters_examined: usize,
}

/// Scan a tenant's payment history and materialize loan records.
///
/// Idempotent and safe to re-run on a schedule: each qualifying payment
/// cluster is upserted against the store's (tenant, vendor, cluster) key,
/// so re-detection updates existing rows instead of duplicating them.
pub fn detect_loans(
    source: &impl TransactionSource,
    loan_store: &impl LoanStore,
    audit: &impl AuditSink,
    tenant: &TenantId,
    as_of: NaiveDate,
    config: &DetectorConfig,
) -> EngineResult<ComputationOutput<DetectionReport>> {
    let start = Instant::now();
    let warnings: Vec<String> = Vec::new();

    let from = as_of
        .checked_sub_months(Months::new(config.lookback_months))
        .ok_or_else(|| EngineError::DateError("lookback window before representable dates".into()))?;
    let transactions = source.transactions_in_range(tenant, from, as_of)?;

    let clusters = cluster_outgoing(&transactions, config);
    let clusters_examined = clusters.len();

    let prior: HashMap<Uuid, Loan> = loan_store
        .loans(tenant)?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    let mut changed_loans: Vec<Loan> = Vec::new();
    let mut touched: HashSet<Uuid> = HashSet::new();

    for cluster in clusters.iter().filter(|c| qualifies(c, config)) {
        let draft = draft_from_cluster(tenant, cluster, as_of, config)?;
        let old = find_prior(&prior, &draft);

        match loan_store.upsert_loan(draft)? {
            LoanUpsert::Created(loan) => {
                touched.insert(loan.id);
                audit.record(AuditEvent {
                    action: AuditAction::LoanCreated,
                    entity_kind: "loan",
                    entity_id: loan.id.to_string(),
                    tenant_id: tenant.clone(),
                    old: serde_json::Value::Null,
                    new: audit_value(&loan),
                });
                changed_loans.push(loan);
            }
            LoanUpsert::Updated(loan) => {
                touched.insert(loan.id);
                let status_changed = old.map(|o| o.status != loan.status).unwrap_or(true);
                audit.record(AuditEvent {
                    action: AuditAction::LoanUpdated,
                    entity_kind: "loan",
                    entity_id: loan.id.to_string(),
                    tenant_id: tenant.clone(),
                    old: old.map(audit_value).unwrap_or(serde_json::Value::Null),
                    new: audit_value(&loan),
                });
                if status_changed {
                    changed_loans.push(loan);
                }
            }
            LoanUpsert::Unchanged(loan) => {
                touched.insert(loan.id);
            }
        }
    }

    // Loans with no payment in the last two expected cycles are paid off.
    for loan in prior.values() {
        if touched.contains(&loan.id) || loan.status == LoanStatus::PaidOff {
            continue;
        }
        if (as_of - loan.last_seen).num_days() > config.stale_after_days {
            let updated = loan_store.set_loan_status(tenant, loan.id, LoanStatus::PaidOff)?;
            audit.record(AuditEvent {
                action: AuditAction::LoanStatusChanged,
                entity_kind: "loan",
                entity_id: updated.id.to_string(),
                tenant_id: tenant.clone(),
                old: audit_value(loan),
                new: audit_value(&updated),
            });
            changed_loans.push(updated);
        }
    }

    let report = DetectionReport {
        changed_loans,
        clusters_examined,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Vendor payment clustering with amortization fit; principal and rate are best-effort estimates against an assumed term and rate",
        &json!({
            "tenant_id": tenant,
            "as_of": as_of,
            "config": config,
        }),
        warnings,
        elapsed,
        report,
    ))
}

/// Translate a qualifying cluster into a store draft, fitting the
/// amortization model and applying the staleness rule so a historical
/// cluster whose payments already stopped never lands as `Active`.
fn draft_from_cluster(
    tenant: &TenantId,
    cluster: &PaymentCluster,
    as_of: NaiveDate,
    config: &DetectorConfig,
) -> EngineResult<LoanDraft> {
    let occurrences = cluster.occurrences();
    let (first_detected, last_seen) = match (cluster.first_seen(), cluster.last_seen()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(EngineError::InsufficientData(
                "qualifying cluster without observations".into(),
            ))
        }
    };

    let status = if (as_of - last_seen).num_days() > config.stale_after_days {
        LoanStatus::PaidOff
    } else if occurrences >= config.active_occurrences {
        LoanStatus::Active
    } else {
        LoanStatus::Unconfirmed
    };

    let (estimated_principal, estimated_annual_rate) =
        fit_amortized_loan(cluster.representative_payment, occurrences, config)?;

    Ok(LoanDraft {
        tenant_id: tenant.clone(),
        vendor: cluster.vendor.clone(),
        monthly_payment: cluster.representative_payment,
        payment_tolerance: cluster.tolerance,
        estimated_principal,
        estimated_annual_rate,
        first_detected,
        last_seen,
        status,
        observed_payments: occurrences,
    })
}

/// Estimate remaining principal and annual rate from an observed monthly
/// payment. The amortization equation is underdetermined from payment
/// history alone, so both the original term and the rate come from the
/// config: remaining principal is the annuity present value of the
/// unobserved `term - observed` payments at the assumed rate.
pub fn fit_amortized_loan(
    monthly_payment: Money,
    observed_payments: u32,
    config: &DetectorConfig,
) -> EngineResult<(Money, Rate)> {
    if monthly_payment <= Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            field: "monthly_payment".into(),
            reason: "Payment magnitude must be positive".into(),
        });
    }

    let remaining = config
        .assumed_term_months
        .saturating_sub(observed_payments)
        .max(1);
    let rate = config.assumed_annual_rate;
    let monthly_rate = rate / Decimal::from(12u32);

    let principal = if monthly_rate.is_zero() {
        monthly_payment * Decimal::from(remaining)
    } else {
        let growth = (Decimal::ONE + monthly_rate).powd(Decimal::from(remaining));
        if growth.is_zero() {
            return Err(EngineError::InvariantViolation(
                "annuity growth factor underflowed".into(),
            ));
        }
        let annuity_factor = (Decimal::ONE - Decimal::ONE / growth) / monthly_rate;
        monthly_payment * annuity_factor
    };

    Ok((principal.round_dp(2), rate))
}

fn find_prior<'a>(prior: &'a HashMap<Uuid, Loan>, draft: &LoanDraft) -> Option<&'a Loan> {
    prior.values().find(|l| {
        l.vendor == draft.vendor
            && (l.monthly_payment - draft.monthly_payment).abs() <= draft.payment_tolerance
    })
}
