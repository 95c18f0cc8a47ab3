use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Store unavailable: {operation} — {reason}")]
    StoreUnavailable { operation: String, reason: String },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Amortization did not terminate after {periods} periods (remaining balance: {balance})")]
    NonTerminatingSchedule { periods: u32, balance: Decimal },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::SerializationError(e.to_string())
    }
}
