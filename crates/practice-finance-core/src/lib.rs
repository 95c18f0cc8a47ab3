pub mod audit;
pub mod error;
pub mod store;
pub mod types;

#[cfg(feature = "cash_flow")]
pub mod cash_flow;

#[cfg(feature = "loans")]
pub mod loans;

#[cfg(feature = "cost_of_capital")]
pub mod cost_of_capital;

#[cfg(feature = "valuation")]
pub mod valuation;

pub use error::EngineError;
pub use types::*;

/// Standard result type for all engine operations
pub type EngineResult<T> = Result<T, EngineError>;
