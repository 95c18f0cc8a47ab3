use clap::Args;
use serde_json::Value;

use practice_finance_core::cash_flow::compute_free_cash_flow;
use practice_finance_core::types::CategorySet;

use crate::commands::{BoxError, DataArgs};

/// Arguments for the monthly free-cash-flow report
#[derive(Args)]
pub struct CashFlowArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Trailing window in months (1-36, default 12; larger values are capped)
    #[arg(long)]
    pub months: Option<u32>,

    /// Category tag treated as capital expenditure (repeatable)
    #[arg(long = "capex-category")]
    pub capex_categories: Vec<String>,
}

pub fn run_cash_flow(args: CashFlowArgs) -> Result<Value, BoxError> {
    let (store, tenant, as_of) = args.data.load()?;
    let categories = CategorySet::new(args.capex_categories);
    let report = compute_free_cash_flow(&store, &tenant, args.months, as_of, &categories)?;
    Ok(serde_json::to_value(report)?)
}
