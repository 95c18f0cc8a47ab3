//! Blended cost of capital over the detected loan book, plus amortization
//! and extra-payment payoff simulation.

use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::error::EngineError;
use crate::loans::{detect_loans, DetectorConfig};
use crate::store::{LoanStore, TransactionSource};
use crate::types::{with_metadata, ComputationOutput, Loan, LoanStatus, Money, Rate, TenantId};
use crate::EngineResult;

/// Runaway guard for schedule generation (50 years of monthly periods).
const MAX_SCHEDULE_PERIODS: u32 = 600;

/// One period of an amortization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePeriod {
    pub period: u32,
    pub interest: Money,
    pub principal: Money,
    pub remaining_balance: Money,
}

/// Full payoff path for a single loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSchedule {
    pub periods: Vec<SchedulePeriod>,
    pub total_interest: Money,
    pub total_paid: Money,
}

impl LoanSchedule {
    pub fn months(&self) -> u32 {
        self.periods.len() as u32
    }
}

/// Aggregate payoff figures across the loan book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffSchedule {
    pub months: u32,
    pub total_interest: Money,
    pub total_paid: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanSummary {
    pub id: Uuid,
    pub vendor: String,
    pub monthly_payment: Money,
    pub estimated_principal: Money,
    pub estimated_annual_rate: Rate,
    pub months_to_payoff: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostOfCapitalReport {
    pub loans: Vec<LoanSummary>,
    /// Principal-weighted average annual rate across included active loans.
    pub weighted_average_cost_of_capital: Rate,
    pub extra_monthly_payment: Money,
    pub baseline: PayoffSchedule,
    /// Baseline re-simulated with the extra payment applied to the
    /// highest-rate loan first. Equals `baseline` when the extra is zero.
    pub accelerated: PayoffSchedule,
    pub months_saved: u32,
    pub interest_saved: Money,
}

/// Compute the blended cost of capital and payoff simulation for a tenant.
///
/// Uses the persisted loan book; a detection pass runs first only when the
/// tenant has no loan rows at all, so repeated calls stay stable. A tenant
/// with no active loans gets a zero report, never an error. Loans whose
/// payment cannot cover their monthly interest are excluded from the
/// aggregates with a warning rather than failing the report.
pub fn calculate_cost_of_capital(
    source: &impl TransactionSource,
    loan_store: &impl LoanStore,
    audit: &impl AuditSink,
    tenant: &TenantId,
    extra_monthly_payment: Option<Money>,
    as_of: NaiveDate,
    detector: &DetectorConfig,
) -> EngineResult<ComputationOutput<CostOfCapitalReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let mut loans = loan_store.loans(tenant)?;
    if loans.is_empty() {
        detect_loans(source, loan_store, audit, tenant, as_of, detector)?;
        loans = loan_store.loans(tenant)?;
    }

    let extra = match extra_monthly_payment {
        Some(extra) if extra < Decimal::ZERO => {
            warnings.push(format!("Negative extra payment {extra} treated as 0"));
            Decimal::ZERO
        }
        Some(extra) => extra,
        None => Decimal::ZERO,
    };

    let active: Vec<Loan> = loans
        .into_iter()
        .filter(|l| l.status == LoanStatus::Active)
        .collect();

    let mut included: Vec<Loan> = Vec::new();
    for loan in active {
        match amortization_schedule(
            loan.estimated_principal,
            loan.estimated_annual_rate,
            loan.monthly_payment,
        ) {
            Ok(_) => included.push(loan),
            Err(err) => warnings.push(format!(
                "Excluding loan {} ({}) from aggregates: {err}",
                loan.id, loan.vendor
            )),
        }
    }

    let report = if included.is_empty() {
        if warnings.is_empty() {
            warnings.push("No active loans on record".into());
        }
        empty_report(extra)
    } else {
        build_report(&included, extra)?
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Principal-weighted average rate; monthly-compounding amortization with avalanche extra-payment ordering",
        &json!({
            "tenant_id": tenant,
            "as_of": as_of,
            "extra_monthly_payment": extra_monthly_payment,
            "active_loans_included": report.loans.len(),
        }),
        warnings,
        elapsed,
        report,
    ))
}

fn empty_report(extra: Money) -> CostOfCapitalReport {
    let zero_schedule = PayoffSchedule {
        months: 0,
        total_interest: Decimal::ZERO,
        total_paid: Decimal::ZERO,
    };
    CostOfCapitalReport {
        loans: Vec::new(),
        weighted_average_cost_of_capital: Decimal::ZERO,
        extra_monthly_payment: extra,
        baseline: zero_schedule.clone(),
        accelerated: zero_schedule,
        months_saved: 0,
        interest_saved: Decimal::ZERO,
    }
}

fn build_report(included: &[Loan], extra: Money) -> EngineResult<CostOfCapitalReport> {
    let total_principal: Decimal = included.iter().map(|l| l.estimated_principal).sum();
    let weighted: Decimal = included
        .iter()
        .map(|l| l.estimated_annual_rate * l.estimated_principal)
        .sum();
    let wacc = if total_principal.is_zero() {
        Decimal::ZERO
    } else {
        (weighted / total_principal).round_dp(6)
    };

    let mut summaries = Vec::with_capacity(included.len());
    for loan in included {
        let schedule = amortization_schedule(
            loan.estimated_principal,
            loan.estimated_annual_rate,
            loan.monthly_payment,
        )?;
        summaries.push(LoanSummary {
            id: loan.id,
            vendor: loan.vendor.clone(),
            monthly_payment: loan.monthly_payment,
            estimated_principal: loan.estimated_principal,
            estimated_annual_rate: loan.estimated_annual_rate,
            months_to_payoff: schedule.months(),
        });
    }

    let baseline = simulate_portfolio(included, Decimal::ZERO)?;
    let accelerated = simulate_portfolio(included, extra)?;

    Ok(CostOfCapitalReport {
        loans: summaries,
        weighted_average_cost_of_capital: wacc,
        extra_monthly_payment: extra,
        months_saved: baseline.months.saturating_sub(accelerated.months),
        interest_saved: baseline.total_interest - accelerated.total_interest,
        baseline,
        accelerated,
    })
}

/// Generate the monthly-compounding payoff schedule for one loan. Each
/// period accrues interest at `annual_rate / 12` on the remaining balance;
/// the final payment is clipped to the exact remaining balance so the
/// schedule terminates at zero, never negative.
pub fn amortization_schedule(
    principal: Money,
    annual_rate: Rate,
    monthly_payment: Money,
) -> EngineResult<LoanSchedule> {
    if principal <= Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            field: "principal".into(),
            reason: "Principal must be positive".into(),
        });
    }
    if annual_rate < Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            field: "annual_rate".into(),
            reason: "Rate cannot be negative".into(),
        });
    }
    if monthly_payment <= Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            field: "monthly_payment".into(),
            reason: "Payment must be positive".into(),
        });
    }

    let monthly_rate = annual_rate / Decimal::from(12u32);
    let first_interest = (principal * monthly_rate).round_dp(2);
    if monthly_payment <= first_interest {
        return Err(EngineError::InvariantViolation(format!(
            "payment {monthly_payment} does not cover monthly interest {first_interest}; loan never amortizes"
        )));
    }

    let mut balance = principal;
    let mut periods: Vec<SchedulePeriod> = Vec::new();
    let mut total_interest = Decimal::ZERO;
    let mut total_paid = Decimal::ZERO;

    while balance > Decimal::ZERO {
        let period = periods.len() as u32 + 1;
        if period > MAX_SCHEDULE_PERIODS {
            return Err(EngineError::NonTerminatingSchedule {
                periods: MAX_SCHEDULE_PERIODS,
                balance,
            });
        }

        let interest = (balance * monthly_rate).round_dp(2);
        let payment = monthly_payment.min(balance + interest);
        let principal_cut = payment - interest;

        balance -= principal_cut;
        total_interest += interest;
        total_paid += payment;

        periods.push(SchedulePeriod {
            period,
            interest,
            principal: principal_cut,
            remaining_balance: balance,
        });
    }

    Ok(LoanSchedule {
        periods,
        total_interest,
        total_paid,
    })
}

/// Simulate the whole loan book month by month. The extra payment is
/// avalanche-ordered: it reduces the highest-rate surviving loan first and
/// rolls over to the next when that loan is retired mid-cycle.
fn simulate_portfolio(loans: &[Loan], extra: Money) -> EngineResult<PayoffSchedule> {
    struct Position {
        balance: Money,
        monthly_rate: Rate,
        payment: Money,
        annual_rate: Rate,
    }

    let mut positions: Vec<Position> = loans
        .iter()
        .map(|l| Position {
            balance: l.estimated_principal,
            monthly_rate: l.estimated_annual_rate / Decimal::from(12u32),
            payment: l.monthly_payment,
            annual_rate: l.estimated_annual_rate,
        })
        .collect();

    // Highest rate first for the extra-payment pass.
    positions.sort_by(|a, b| b.annual_rate.cmp(&a.annual_rate));

    let mut months = 0u32;
    let mut total_interest = Decimal::ZERO;
    let mut total_paid = Decimal::ZERO;

    while positions.iter().any(|p| p.balance > Decimal::ZERO) {
        months += 1;
        if months > MAX_SCHEDULE_PERIODS {
            let balance: Decimal = positions.iter().map(|p| p.balance).sum();
            return Err(EngineError::NonTerminatingSchedule {
                periods: MAX_SCHEDULE_PERIODS,
                balance,
            });
        }

        for pos in positions.iter_mut().filter(|p| p.balance > Decimal::ZERO) {
            let interest = (pos.balance * pos.monthly_rate).round_dp(2);
            let payment = pos.payment.min(pos.balance + interest);
            pos.balance -= payment - interest;
            total_interest += interest;
            total_paid += payment;
        }

        let mut extra_left = extra;
        for pos in positions.iter_mut() {
            if extra_left <= Decimal::ZERO {
                break;
            }
            if pos.balance <= Decimal::ZERO {
                continue;
            }
            let applied = extra_left.min(pos.balance);
            pos.balance -= applied;
            total_paid += applied;
            extra_left -= applied;
        }
    }

    Ok(PayoffSchedule {
        months,
        total_interest,
        total_paid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_schedule_terminates_at_exact_zero() {
        let schedule = amortization_schedule(dec!(10000.00), dec!(0.08), dec!(450.00)).unwrap();
        let last = schedule.periods.last().unwrap();
        assert_eq!(last.remaining_balance, Decimal::ZERO);
        assert!(schedule.periods.iter().all(|p| p.remaining_balance >= Decimal::ZERO));
        // 10k at 8% with $450/month pays off in roughly two years.
        assert!(schedule.months() >= 20 && schedule.months() <= 28, "months = {}", schedule.months());
    }

    #[test]
    fn test_final_payment_is_clipped() {
        let schedule = amortization_schedule(dec!(1000.00), dec!(0.12), dec!(990.00)).unwrap();
        assert_eq!(schedule.months(), 2);
        let last = schedule.periods.last().unwrap();
        assert!(last.interest + last.principal < dec!(990.00));
        assert_eq!(last.remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_payment_below_interest_is_rejected() {
        // $100k at 12%: monthly interest $1000, payment $900 never amortizes.
        let result = amortization_schedule(dec!(100000.00), dec!(0.12), dec!(900.00));
        assert!(matches!(result, Err(EngineError::InvariantViolation(_))));
    }

    #[test]
    fn test_zero_rate_schedule() {
        let schedule = amortization_schedule(dec!(1200.00), Decimal::ZERO, dec!(100.00)).unwrap();
        assert_eq!(schedule.months(), 12);
        assert_eq!(schedule.total_interest, Decimal::ZERO);
        assert_eq!(schedule.total_paid, dec!(1200.00));
    }

    fn loan(vendor: &str, principal: Decimal, rate: Decimal, payment: Decimal) -> Loan {
        Loan {
            id: Uuid::new_v4(),
            tenant_id: TenantId::new("p1").unwrap(),
            vendor: vendor.into(),
            estimated_principal: principal,
            monthly_payment: payment,
            estimated_annual_rate: rate,
            first_detected: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            last_seen: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            status: LoanStatus::Active,
            observed_payments: 6,
        }
    }

    #[test]
    fn test_zero_extra_matches_baseline() {
        let loans = vec![
            loan("Bank A", dec!(20000.00), dec!(0.09), dec!(600.00)),
            loan("Bank B", dec!(8000.00), dec!(0.05), dec!(300.00)),
        ];
        let baseline = simulate_portfolio(&loans, Decimal::ZERO).unwrap();
        let accelerated = simulate_portfolio(&loans, Decimal::ZERO).unwrap();
        assert_eq!(baseline, accelerated);
    }

    #[test]
    fn test_extra_payment_saves_months_and_interest() {
        let loans = vec![
            loan("Bank A", dec!(20000.00), dec!(0.09), dec!(600.00)),
            loan("Bank B", dec!(8000.00), dec!(0.05), dec!(300.00)),
        ];
        let baseline = simulate_portfolio(&loans, Decimal::ZERO).unwrap();
        let accelerated = simulate_portfolio(&loans, dec!(250.00)).unwrap();
        assert!(accelerated.months < baseline.months);
        assert!(accelerated.total_interest < baseline.total_interest);
    }

    #[test]
    fn test_wacc_is_principal_weighted() {
        let loans = vec![
            loan("Bank A", dec!(30000.00), dec!(0.10), dec!(1000.00)),
            loan("Bank B", dec!(10000.00), dec!(0.06), dec!(400.00)),
        ];
        let report = build_report(&loans, Decimal::ZERO).unwrap();
        // (0.10 * 30000 + 0.06 * 10000) / 40000 = 0.09
        assert_eq!(report.weighted_average_cost_of_capital, dec!(0.09));
    }
}
