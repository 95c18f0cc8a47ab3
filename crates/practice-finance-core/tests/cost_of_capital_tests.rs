use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use practice_finance_core::audit::NullAuditSink;
use practice_finance_core::cost_of_capital::{amortization_schedule, calculate_cost_of_capital};
use practice_finance_core::loans::DetectorConfig;
use practice_finance_core::store::memory::InMemoryStore;
use practice_finance_core::store::{LoanDraft, LoanStore};
use practice_finance_core::types::{LoanStatus, TenantId, Transaction};

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seed_loan(
    store: &InMemoryStore,
    tenant_id: &str,
    vendor: &str,
    principal: Decimal,
    rate: Decimal,
    payment: Decimal,
) {
    store
        .upsert_loan(LoanDraft {
            tenant_id: tenant(tenant_id),
            vendor: vendor.into(),
            monthly_payment: payment,
            payment_tolerance: dec!(10.00),
            estimated_principal: principal,
            estimated_annual_rate: rate,
            first_detected: date(2024, 1, 1),
            last_seen: date(2024, 6, 1),
            status: LoanStatus::Active,
            observed_payments: 6,
        })
        .unwrap();
}

fn run(
    store: &InMemoryStore,
    tenant_id: &str,
    extra: Option<Decimal>,
) -> practice_finance_core::ComputationOutput<
    practice_finance_core::cost_of_capital::CostOfCapitalReport,
> {
    calculate_cost_of_capital(
        store,
        store,
        &NullAuditSink,
        &tenant(tenant_id),
        extra,
        date(2024, 6, 15),
        &DetectorConfig::default(),
    )
    .unwrap()
}

// ===========================================================================
// Aggregation
// ===========================================================================

#[test]
fn test_no_loans_and_no_transactions_is_a_zero_report() {
    let store = InMemoryStore::new();
    let out = run(&store, "p1", None);
    assert_eq!(out.result.weighted_average_cost_of_capital, Decimal::ZERO);
    assert!(out.result.loans.is_empty());
    assert_eq!(out.result.baseline.months, 0);
    assert!(!out.warnings.is_empty());
}

#[test]
fn test_wacc_weights_by_principal() {
    let store = InMemoryStore::new();
    seed_loan(&store, "p1", "Bank A", dec!(30000.00), dec!(0.10), dec!(1000.00));
    seed_loan(&store, "p1", "Bank B", dec!(10000.00), dec!(0.06), dec!(400.00));

    let out = run(&store, "p1", None);
    assert_eq!(out.result.weighted_average_cost_of_capital, dec!(0.09));
    assert_eq!(out.result.loans.len(), 2);
}

#[test]
fn test_empty_record_triggers_detection_pass() {
    // No loan rows, but the transaction history contains a clear pattern:
    // the simulator materializes it before aggregating.
    let txs: Vec<Transaction> = (0..4)
        .map(|i| Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant("p1"),
            date: date(2024, 2 + i, 1),
            amount: dec!(-650.00),
            vendor: "Equipment Finance Co".into(),
            category: None,
        })
        .collect();
    let store = InMemoryStore::with_transactions(txs);

    let out = run(&store, "p1", None);
    assert_eq!(out.result.loans.len(), 1);
    assert!(out.result.weighted_average_cost_of_capital > Decimal::ZERO);
    assert_eq!(store.loans(&tenant("p1")).unwrap().len(), 1);
}

#[test]
fn test_existing_record_suppresses_detection() {
    // A paid-off row counts as "loans on record": no implicit re-detection,
    // and a paid-off loan contributes nothing to the aggregates.
    let txs: Vec<Transaction> = (0..4)
        .map(|i| Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant("p1"),
            date: date(2024, 2 + i, 1),
            amount: dec!(-650.00),
            vendor: "Equipment Finance Co".into(),
            category: None,
        })
        .collect();
    let store = InMemoryStore::with_transactions(txs);
    store
        .upsert_loan(LoanDraft {
            tenant_id: tenant("p1"),
            vendor: "Old Bank".into(),
            monthly_payment: dec!(300.00),
            payment_tolerance: dec!(6.00),
            estimated_principal: dec!(5000.00),
            estimated_annual_rate: dec!(0.07),
            first_detected: date(2022, 1, 1),
            last_seen: date(2022, 12, 1),
            status: LoanStatus::PaidOff,
            observed_payments: 12,
        })
        .unwrap();

    let out = run(&store, "p1", None);
    assert!(out.result.loans.is_empty());
    assert_eq!(store.loans(&tenant("p1")).unwrap().len(), 1);
}

// ===========================================================================
// Payoff simulation
// ===========================================================================

#[test]
fn test_zero_extra_payment_matches_baseline_exactly() {
    let store = InMemoryStore::new();
    seed_loan(&store, "p1", "Bank A", dec!(20000.00), dec!(0.09), dec!(600.00));
    seed_loan(&store, "p1", "Bank B", dec!(8000.00), dec!(0.05), dec!(300.00));

    let out = run(&store, "p1", Some(Decimal::ZERO));
    assert_eq!(out.result.baseline, out.result.accelerated);
    assert_eq!(out.result.months_saved, 0);
    assert_eq!(out.result.interest_saved, Decimal::ZERO);
}

#[test]
fn test_extra_payment_reports_savings() {
    let store = InMemoryStore::new();
    seed_loan(&store, "p1", "Bank A", dec!(20000.00), dec!(0.09), dec!(600.00));
    seed_loan(&store, "p1", "Bank B", dec!(8000.00), dec!(0.05), dec!(300.00));

    let out = run(&store, "p1", Some(dec!(400.00)));
    assert!(out.result.months_saved > 0);
    assert!(out.result.interest_saved > Decimal::ZERO);
    assert!(out.result.accelerated.total_interest < out.result.baseline.total_interest);
}

#[test]
fn test_negative_extra_payment_is_coerced_to_zero() {
    let store = InMemoryStore::new();
    seed_loan(&store, "p1", "Bank A", dec!(20000.00), dec!(0.09), dec!(600.00));

    let out = run(&store, "p1", Some(dec!(-50.00)));
    assert_eq!(out.result.extra_monthly_payment, Decimal::ZERO);
    assert_eq!(out.result.baseline, out.result.accelerated);
    assert!(out.warnings.iter().any(|w| w.contains("treated as 0")));
}

#[test]
fn test_non_amortizing_loan_is_excluded_not_fatal() {
    let store = InMemoryStore::new();
    seed_loan(&store, "p1", "Bank A", dec!(30000.00), dec!(0.10), dec!(1000.00));
    // $100k at 12% accrues $1000/month; a $500 payment never amortizes.
    seed_loan(&store, "p1", "Predatory Lender", dec!(100000.00), dec!(0.12), dec!(500.00));

    let out = run(&store, "p1", None);
    assert_eq!(out.result.loans.len(), 1);
    assert_eq!(out.result.loans[0].vendor, "Bank A");
    assert_eq!(out.result.weighted_average_cost_of_capital, dec!(0.10));
    assert!(out.warnings.iter().any(|w| w.contains("Excluding loan")));
}

// ===========================================================================
// Schedule invariants
// ===========================================================================

#[test]
fn test_schedules_terminate_at_zero_for_covering_payments() {
    for (principal, rate, payment) in [
        (dec!(5000.00), dec!(0.06), dec!(250.00)),
        (dec!(45000.00), dec!(0.105), dec!(1200.00)),
        (dec!(987.65), dec!(0.0399), dec!(90.00)),
    ] {
        let schedule = amortization_schedule(principal, rate, payment).unwrap();
        let last = schedule.periods.last().unwrap();
        assert_eq!(last.remaining_balance, Decimal::ZERO);
        assert!(schedule
            .periods
            .iter()
            .all(|p| p.remaining_balance >= Decimal::ZERO));
    }
}
