//! Pure payment clustering. No persistence here: these functions take a
//! transaction slice and produce candidate clusters, so the heuristics are
//! testable in isolation from the upsert step.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::loans::DetectorConfig;
use crate::types::{Money, Transaction};

/// One outgoing payment, sign-normalized to a positive magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentObservation {
    pub date: NaiveDate,
    pub amount: Money,
}

/// A group of same-vendor payments whose amounts fall within the detection
/// tolerance band of each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCluster {
    pub vendor: String,
    /// Sorted by date, oldest first.
    pub observations: Vec<PaymentObservation>,
    /// Median payment of the cluster; the upsert cluster key.
    pub representative_payment: Money,
    /// Absolute band used both for clustering and for store matching.
    pub tolerance: Money,
}

impl PaymentCluster {
    pub fn occurrences(&self) -> u32 {
        self.observations.len() as u32
    }

    pub fn first_seen(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_seen(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }
}

/// Partition outgoing transactions by vendor and cluster each vendor's
/// payments by amount. Rows that cannot contribute to a clustering key
/// (non-negative amount, blank vendor) are skipped, never fatal.
pub fn cluster_outgoing(transactions: &[Transaction], config: &DetectorConfig) -> Vec<PaymentCluster> {
    let mut by_vendor: BTreeMap<&str, Vec<PaymentObservation>> = BTreeMap::new();

    for tx in transactions {
        if tx.amount >= Decimal::ZERO {
            continue;
        }
        let vendor = tx.vendor.trim();
        if vendor.is_empty() {
            tracing::debug!(tx_id = %tx.id, "skipping outgoing transaction with blank vendor");
            continue;
        }
        by_vendor.entry(vendor).or_default().push(PaymentObservation {
            date: tx.date,
            amount: -tx.amount,
        });
    }

    let mut clusters = Vec::new();
    for (vendor, mut observations) in by_vendor {
        observations.sort_by(|a, b| a.amount.cmp(&b.amount).then(a.date.cmp(&b.date)));

        let mut current: Vec<PaymentObservation> = Vec::new();
        for obs in observations {
            match current.first() {
                Some(anchor) if obs.amount - anchor.amount <= config.tolerance_for(anchor.amount) => {
                    current.push(obs);
                }
                Some(_) => {
                    clusters.push(finish_cluster(vendor, std::mem::take(&mut current), config));
                    current.push(obs);
                }
                None => current.push(obs),
            }
        }
        if !current.is_empty() {
            clusters.push(finish_cluster(vendor, current, config));
        }
    }
    clusters
}

fn finish_cluster(
    vendor: &str,
    mut observations: Vec<PaymentObservation>,
    config: &DetectorConfig,
) -> PaymentCluster {
    let representative = median_amount(&observations);
    observations.sort_by_key(|o| o.date);
    PaymentCluster {
        vendor: vendor.to_string(),
        observations,
        representative_payment: representative,
        tolerance: config.tolerance_for(representative),
    }
}

/// Median of the cluster's payment amounts. The input is sorted by amount
/// when this is called.
fn median_amount(sorted_by_amount: &[PaymentObservation]) -> Money {
    let n = sorted_by_amount.len();
    if n == 0 {
        return Decimal::ZERO;
    }
    if n % 2 == 1 {
        sorted_by_amount[n / 2].amount
    } else {
        let lo = sorted_by_amount[n / 2 - 1].amount;
        let hi = sorted_by_amount[n / 2].amount;
        ((lo + hi) / Decimal::TWO).round_dp(2)
    }
}

/// A cluster qualifies as a loan candidate when its payments recur on a
/// roughly monthly cadence: successive gaps of 25–35 days, tolerating at
/// most one skipped cycle (a single 50–70 day gap).
pub fn has_monthly_cadence(dates: &[NaiveDate], config: &DetectorConfig) -> bool {
    if dates.len() < 2 {
        return false;
    }

    let mut skips = 0u32;
    for pair in dates.windows(2) {
        let gap = (pair[1] - pair[0]).num_days();
        if (config.min_cadence_days..=config.max_cadence_days).contains(&gap) {
            continue;
        }
        let skip_range = (2 * config.min_cadence_days)..=(2 * config.max_cadence_days);
        if skip_range.contains(&gap) && skips == 0 {
            skips += 1;
            continue;
        }
        return false;
    }
    true
}

/// Candidate filter: at least two observations on a monthly cadence.
/// (Two-occurrence clusters surface as `Unconfirmed` loans; three or more
/// are reported `Active`.)
pub fn qualifies(cluster: &PaymentCluster, config: &DetectorConfig) -> bool {
    let dates: Vec<NaiveDate> = cluster.observations.iter().map(|o| o.date).collect();
    cluster.occurrences() >= 2 && has_monthly_cadence(&dates, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TenantId;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(vendor: &str, date: NaiveDate, amount: Decimal) -> Transaction {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: TenantId::new("p1").unwrap(),
            date,
            amount,
            vendor: vendor.into(),
            category: None,
        }
    }

    #[test]
    fn test_noisy_amounts_form_one_cluster() {
        let config = DetectorConfig::default();
        let txs = vec![
            tx("Bank A", date(2024, 1, 1), dec!(-500.00)),
            tx("Bank A", date(2024, 2, 1), dec!(-503.50)),
            tx("Bank A", date(2024, 3, 1), dec!(-498.00)),
        ];
        let clusters = cluster_outgoing(&txs, &config);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].occurrences(), 3);
        assert_eq!(clusters[0].representative_payment, dec!(500.00));
    }

    #[test]
    fn test_distinct_amounts_split_clusters() {
        let config = DetectorConfig::default();
        let txs = vec![
            tx("Bank A", date(2024, 1, 1), dec!(-500.00)),
            tx("Bank A", date(2024, 1, 15), dec!(-1450.00)),
            tx("Bank A", date(2024, 2, 1), dec!(-500.00)),
            tx("Bank A", date(2024, 2, 15), dec!(-1450.00)),
        ];
        let clusters = cluster_outgoing(&txs, &config);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_inflows_and_blank_vendors_skipped() {
        let config = DetectorConfig::default();
        let txs = vec![
            tx("Bank A", date(2024, 1, 1), dec!(2500.00)),
            tx("  ", date(2024, 1, 1), dec!(-500.00)),
            tx("Bank A", date(2024, 2, 1), dec!(-500.00)),
        ];
        let clusters = cluster_outgoing(&txs, &config);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].occurrences(), 1);
    }

    #[test]
    fn test_monthly_cadence_tolerates_one_skip() {
        let config = DetectorConfig::default();
        let steady = [date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1)];
        assert!(has_monthly_cadence(&steady, &config));

        // February missed; the 60-day gap is a single skipped cycle.
        let one_skip = [date(2024, 1, 1), date(2024, 3, 1), date(2024, 4, 1)];
        assert!(has_monthly_cadence(&one_skip, &config));

        // Two skipped cycles disqualify.
        let two_skips = [
            date(2024, 1, 1),
            date(2024, 3, 1),
            date(2024, 5, 1),
            date(2024, 6, 1),
        ];
        assert!(!has_monthly_cadence(&two_skips, &config));

        // Weekly payments are not a monthly cadence.
        let weekly = [date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)];
        assert!(!has_monthly_cadence(&weekly, &config));
    }

    #[test]
    fn test_single_payment_never_qualifies() {
        let config = DetectorConfig::default();
        let txs = vec![tx("Bank A", date(2024, 1, 1), dec!(-500.00))];
        let clusters = cluster_outgoing(&txs, &config);
        assert!(!qualifies(&clusters[0], &config));
    }
}
