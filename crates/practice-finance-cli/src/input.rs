//! Transaction loading: JSON or CSV files, with piped-stdin JSON as the
//! fallback when no path is given.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use practice_finance_core::types::Transaction;

type BoxError = Box<dyn std::error::Error>;

/// Load transactions from `path` (by extension) or, when no path is given,
/// from piped stdin JSON.
pub fn load_transactions(path: Option<&str>) -> Result<Vec<Transaction>, BoxError> {
    match path {
        Some(path) => {
            let resolved = resolve_path(path)?;
            match resolved.extension().and_then(|e| e.to_str()) {
                Some("csv") => read_csv(&resolved),
                _ => read_json(&resolved),
            }
        }
        None => read_stdin()?.ok_or_else(|| {
            "no transaction data: pass --transactions <file> or pipe JSON to stdin".into()
        }),
    }
}

fn read_json(path: &Path) -> Result<Vec<Transaction>, BoxError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let transactions: Vec<Transaction> = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))?;
    Ok(transactions)
}

/// CSV columns: id, tenant_id, date, amount, vendor, category (blank for
/// uncategorized).
fn read_csv(path: &Path) -> Result<Vec<Transaction>, BoxError> {
    #[derive(serde::Deserialize)]
    struct Row {
        id: String,
        tenant_id: String,
        date: chrono::NaiveDate,
        amount: rust_decimal::Decimal,
        vendor: String,
        #[serde(default)]
        category: Option<String>,
    }

    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let mut transactions = Vec::new();
    for record in reader.deserialize() {
        let row: Row = record.map_err(|e| format!("Bad row in '{}': {}", path.display(), e))?;
        transactions.push(Transaction {
            id: row.id,
            tenant_id: practice_finance_core::types::TenantId::new(row.tenant_id)?,
            date: row.date,
            amount: row.amount,
            vendor: row.vendor,
            category: row.category.filter(|c| !c.is_empty()),
        });
    }
    Ok(transactions)
}

/// Read JSON transactions from stdin if data is being piped. Returns None
/// when stdin is a TTY (interactive).
fn read_stdin() -> Result<Option<Vec<Transaction>>, BoxError> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    Ok(Some(serde_json::from_str(trimmed)?))
}

/// Read an arbitrary typed JSON document (used for snapshot files).
pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, BoxError> {
    let resolved = resolve_path(path)?;
    let contents = fs::read_to_string(&resolved)
        .map_err(|e| format!("Failed to read '{}': {}", resolved.display(), e))?;
    let value: T = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", resolved.display(), e))?;
    Ok(value)
}

fn resolve_path(path: &str) -> Result<PathBuf, BoxError> {
    let p = Path::new(path);
    let resolved = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !resolved.exists() {
        return Err(format!("File not found: {}", resolved.display()).into());
    }
    if !resolved.is_file() {
        return Err(format!("Not a file: {}", resolved.display()).into());
    }

    Ok(resolved)
}
