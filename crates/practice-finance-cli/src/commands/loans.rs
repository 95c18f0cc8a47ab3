use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use practice_finance_core::audit::TracingAuditSink;
use practice_finance_core::cost_of_capital::calculate_cost_of_capital;
use practice_finance_core::loans::{detect_loans, DetectorConfig};

use crate::commands::{BoxError, DataArgs};

/// Arguments for recurring-loan detection
#[derive(Args)]
pub struct DetectLoansArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// How many months of history to scan (default 36)
    #[arg(long)]
    pub lookback_months: Option<u32>,
}

/// Arguments for the cost-of-capital report
#[derive(Args)]
pub struct CostOfCapitalArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Extra monthly payment for the avalanche payoff simulation
    #[arg(long)]
    pub extra_payment: Option<Decimal>,
}

pub fn run_detect_loans(args: DetectLoansArgs) -> Result<Value, BoxError> {
    let (store, tenant, as_of) = args.data.load()?;
    let config = DetectorConfig {
        lookback_months: args
            .lookback_months
            .unwrap_or(DetectorConfig::default().lookback_months),
        ..DetectorConfig::default()
    };
    let report = detect_loans(&store, &store, &TracingAuditSink, &tenant, as_of, &config)?;
    Ok(serde_json::to_value(report)?)
}

pub fn run_cost_of_capital(args: CostOfCapitalArgs) -> Result<Value, BoxError> {
    let (store, tenant, as_of) = args.data.load()?;
    let report = calculate_cost_of_capital(
        &store,
        &store,
        &TracingAuditSink,
        &tenant,
        args.extra_payment,
        as_of,
        &DetectorConfig::default(),
    )?;
    Ok(serde_json::to_value(report)?)
}
