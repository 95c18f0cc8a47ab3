use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use practice_finance_core::audit::TracingAuditSink;
use practice_finance_core::store::memory::InMemoryStore;
use practice_finance_core::store::SnapshotStore;
use practice_finance_core::types::{CategorySet, TenantId, ValuationSnapshot};
use practice_finance_core::valuation::{calculate_valuation, valuation_history, ValuationConfig};

use crate::commands::{BoxError, DataArgs};
use crate::input;

/// Arguments for practice valuation
#[derive(Args)]
pub struct ValuationArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Industry multiple applied to trailing free cash flow
    #[arg(long)]
    pub multiple: Option<Decimal>,

    /// Category tag treated as capital expenditure (repeatable)
    #[arg(long = "capex-category")]
    pub capex_categories: Vec<String>,
}

/// Arguments for listing valuation history
#[derive(Args)]
pub struct ValuationHistoryArgs {
    /// Path to a JSON file of previously exported valuation snapshots
    #[arg(long)]
    pub snapshots: String,

    /// Practice (tenant) id to list history for
    #[arg(long)]
    pub tenant: String,
}

pub fn run_valuation(args: ValuationArgs) -> Result<Value, BoxError> {
    let (store, tenant, as_of) = args.data.load()?;
    let config = match args.multiple {
        Some(industry_multiple) => ValuationConfig { industry_multiple },
        None => ValuationConfig::default(),
    };
    let categories = CategorySet::new(args.capex_categories);
    let report = calculate_valuation(
        &store,
        &store,
        &TracingAuditSink,
        &tenant,
        as_of,
        &categories,
        &config,
    )?;
    Ok(serde_json::to_value(report)?)
}

pub fn run_valuation_history(args: ValuationHistoryArgs) -> Result<Value, BoxError> {
    let snapshots: Vec<ValuationSnapshot> = input::read_json_file(&args.snapshots)?;
    let tenant = TenantId::new(args.tenant)?;

    let store = InMemoryStore::new();
    for snapshot in snapshots {
        store.append_snapshot(snapshot)?;
    }

    let history = valuation_history(&store, &tenant)?;
    Ok(serde_json::to_value(history)?)
}
