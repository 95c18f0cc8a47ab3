pub mod cash_flow;
pub mod loans;
pub mod valuation;

use chrono::{NaiveDate, Utc};
use clap::Args;

use practice_finance_core::store::memory::InMemoryStore;
use practice_finance_core::types::TenantId;

use crate::input;

pub type BoxError = Box<dyn std::error::Error>;

/// Arguments shared by every report command: where the transactions come
/// from and which practice they belong to.
#[derive(Args)]
pub struct DataArgs {
    /// Path to a JSON or CSV transactions file (or pipe JSON to stdin)
    #[arg(long)]
    pub transactions: Option<String>,

    /// Practice (tenant) id the report is scoped to
    #[arg(long)]
    pub tenant: String,

    /// Report date; defaults to today
    #[arg(long)]
    pub as_of: Option<NaiveDate>,
}

impl DataArgs {
    pub fn load(&self) -> Result<(InMemoryStore, TenantId, NaiveDate), BoxError> {
        let transactions = input::load_transactions(self.transactions.as_deref())?;
        let tenant = TenantId::new(self.tenant.clone())?;
        let as_of = self.as_of.unwrap_or_else(|| Utc::now().date_naive());
        Ok((InMemoryStore::with_transactions(transactions), tenant, as_of))
    }
}
