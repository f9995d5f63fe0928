//! Fraud indicators for single transactions and for cohorts of transactions.
//!
//! There is no fraud model behind these indicators. The [FraudPolicy] trait is
//! the seam where one can be plugged in; the default [HashedFraudPolicy] only
//! derives stable placeholder values from a digest of its input so that the
//! dashboard is reproducible.

use std::fmt::Debug;

use serde::Serialize;
use sha2::{Digest, Sha256};
use time::Date;

use crate::transaction::{Transaction, TransactionMode};

/// A risk score from 0 (no risk) to 100 (highest risk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FraudScore(u8);

impl FraudScore {
    /// The highest possible score.
    pub const MAX: u8 = 100;

    /// Create a score, clamping `value` to [FraudScore::MAX].
    pub fn new(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    /// The score as a number from 0 to 100.
    pub fn value(self) -> u8 {
        self.0
    }
}

/// A group of transactions that shares a fraud count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cohort {
    /// All transactions sent with a payment mode.
    Mode(TransactionMode),
    /// All transactions on a local day.
    Day(Date),
}

/// Assigns fraud indicators to transactions and cohorts.
///
/// Implementations must be pure: the same input always gives the same output.
pub trait FraudPolicy: Send + Sync + Debug {
    /// Score a single transaction.
    fn score(&self, transaction: &Transaction) -> FraudScore;

    /// How many of the `count` transactions in `cohort` are flagged as
    /// fraudulent. Must never exceed `count`.
    fn flagged_in_cohort(&self, cohort: Cohort, count: u64) -> u64;
}

/// A deterministic placeholder policy based on SHA-256 digests.
///
/// Each transaction gets a score from a digest of its fields. Each cohort is
/// flagged at a rate between zero and its ceiling, picked by a digest of the
/// cohort key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HashedFraudPolicy {
    /// The highest fraction of a payment mode's transactions that may be flagged.
    pub mode_rate_ceiling: f64,
    /// The highest fraction of a day's transactions that may be flagged.
    pub daily_rate_ceiling: f64,
}

impl Default for HashedFraudPolicy {
    fn default() -> Self {
        Self {
            mode_rate_ceiling: 0.08,
            daily_rate_ceiling: 0.10,
        }
    }
}

const RATE_RESOLUTION: u64 = 10_000;

impl FraudPolicy for HashedFraudPolicy {
    fn score(&self, transaction: &Transaction) -> FraudScore {
        let digest = digest_u64(&[
            &transaction.id.to_le_bytes(),
            &transaction.amount.to_bits().to_le_bytes(),
            &transaction.timestamp.unix_timestamp().to_le_bytes(),
            transaction.mode.as_str().as_bytes(),
        ]);

        FraudScore::new((digest % (u64::from(FraudScore::MAX) + 1)) as u8)
    }

    fn flagged_in_cohort(&self, cohort: Cohort, count: u64) -> u64 {
        if count == 0 {
            return 0;
        }

        let (key, ceiling) = match cohort {
            Cohort::Mode(mode) => (format!("mode:{mode}"), self.mode_rate_ceiling),
            Cohort::Day(date) => (format!("day:{date}"), self.daily_rate_ceiling),
        };

        let fraction = (digest_u64(&[key.as_bytes()]) % RATE_RESOLUTION) as f64
            / RATE_RESOLUTION as f64;
        let rate = fraction * ceiling.clamp(0.0, 1.0);
        let flagged = (count as f64 * rate).floor() as u64;

        flagged.min(count)
    }
}

fn digest_u64(parts: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();

    let mut bytes = [0; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
