// perilgrid-core/src/stages/bucketing.rs
// ============================================================================
// Module: Perilgrid Score Bucketing
// Description: Resilience score bucket counts and TIV totals.
// Purpose: Provide deterministic disclosure summaries for score results.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Resilience scores bucket into five fixed ranges. Bucket counts sum to
//! the number of scored locations; bucket TIV accumulates only locations
//! with a TIV, so the bucket TIV total never exceeds the portfolio total.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Serialize;

// ============================================================================
// SECTION: Buckets
// ============================================================================

/// Bucket keys in ascending score order.
pub const BUCKET_KEYS: [&str; 5] = ["0_19", "20_39", "40_59", "60_79", "80_100"];

/// Returns the bucket key for a resilience score.
#[must_use]
pub const fn score_bucket(score: i64) -> &'static str {
    if score <= 19 {
        "0_19"
    } else if score <= 39 {
        "20_39"
    } else if score <= 59 {
        "40_59"
    } else if score <= 79 {
        "60_79"
    } else {
        "80_100"
    }
}

/// Accumulated bucket counts and TIV sums.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ScoreBuckets {
    /// Scored-location count per bucket.
    pub counts: BTreeMap<String, u64>,
    /// TIV sum per bucket (locations without TIV contribute nothing).
    pub tiv: BTreeMap<String, f64>,
}

impl ScoreBuckets {
    /// Creates empty buckets with every key present.
    #[must_use]
    pub fn new() -> Self {
        let mut counts = BTreeMap::new();
        let mut tiv = BTreeMap::new();
        for key in BUCKET_KEYS {
            counts.insert(key.to_string(), 0);
            tiv.insert(key.to_string(), 0.0);
        }
        Self { counts, tiv }
    }

    /// Adds one scored location.
    pub fn add(&mut self, score: i64, tiv: Option<f64>) {
        let key = score_bucket(score);
        if let Some(count) = self.counts.get_mut(key) {
            *count += 1;
        }
        if let (Some(total), Some(value)) = (self.tiv.get_mut(key), tiv) {
            *total += value;
        }
    }

    /// Returns the total count across buckets.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Returns the total TIV across buckets.
    #[must_use]
    pub fn total_tiv(&self) -> f64 {
        self.tiv.values().sum()
    }
}
