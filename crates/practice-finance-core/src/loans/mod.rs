//! Recurring-loan detection: scans a tenant's outgoing transactions for
//! debt-service patterns and materializes loan records.

pub mod cluster;
pub mod detect;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

pub use detect::{detect_loans, fit_amortized_loan, DetectionReport};

/// Tuning knobs for detection. The amortization assumptions are documented
/// defaults: payment history alone cannot pin down both rate and term, so
/// estimates are computed against a fixed assumed term and rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// How far back to scan for payment history.
    pub lookback_months: u32,
    /// Relative payment tolerance for clustering (0.02 = ±2%).
    pub relative_tolerance: Decimal,
    /// Absolute payment tolerance for clustering, in currency units.
    pub absolute_tolerance: Money,
    /// Minimum days between successive payments for a monthly cadence.
    pub min_cadence_days: i64,
    /// Maximum days between successive payments for a monthly cadence.
    pub max_cadence_days: i64,
    /// Observations required before a loan is reported `Active`.
    pub active_occurrences: u32,
    /// Assumed original term when fitting the amortization model.
    pub assumed_term_months: u32,
    /// Assumed annual rate when fitting the amortization model.
    pub assumed_annual_rate: Rate,
    /// A loan unseen for this many days (two expected cycles) is paid off.
    pub stale_after_days: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            lookback_months: 36,
            relative_tolerance: dec!(0.02),
            absolute_tolerance: dec!(5.00),
            min_cadence_days: 25,
            max_cadence_days: 35,
            active_occurrences: 3,
            assumed_term_months: 60,
            assumed_annual_rate: dec!(0.075),
            stale_after_days: 70,
        }
    }
}

impl DetectorConfig {
    /// Absolute matching band around a payment amount: the larger of the
    /// relative and absolute tolerances.
    pub fn tolerance_for(&self, payment: Money) -> Money {
        (payment.abs() * self.relative_tolerance).max(self.absolute_tolerance)
    }
}
