// Time-keyed whole-value caches for learned state
//
// Readers on the scoring path only ever see a complete value or nothing. An
// entry is invalidated purely by age; there is no explicit eviction.

use crate::config::CacheConfig;
use crate::learned::{
    BreadthSnapshot, ConditionStatsTable, ConfidenceCalibrationResult, DerivedModifiersResult,
    RegimeWeightTable,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};

struct Entry<T> {
    value: Arc<T>,
    stored_at: DateTime<Utc>,
}

/// A single cached value with a fixed time-to-live
pub struct TtlCell<T> {
    ttl: Duration,
    slot: RwLock<Option<Entry<T>>>,
}

impl<T> TtlCell<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::seconds(secs.min(i64::MAX as u64) as i64))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value if it was stored less than `ttl` before `now`
    pub fn get(&self, now: DateTime<Utc>) -> Option<Arc<T>> {
        let guard = self.slot.read().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|entry| now - entry.stored_at < self.ttl)
            .map(|entry| Arc::clone(&entry.value))
    }

    pub fn set(&self, value: T, now: DateTime<Utc>) {
        let mut guard = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Entry {
            value: Arc::new(value),
            stored_at: now,
        });
    }

    /// Age of the stored value regardless of expiry
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        let guard = self.slot.read().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(|entry| now - entry.stored_at)
    }

    pub fn clear(&self) {
        let mut guard = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

/// Every learned artifact the online path reads, each behind its own TTL
pub struct LearnedState {
    pub regime_weights: TtlCell<RegimeWeightTable>,
    pub derived_modifiers: TtlCell<DerivedModifiersResult>,
    pub calibration: TtlCell<ConfidenceCalibrationResult>,
    pub condition_stats: TtlCell<ConditionStatsTable>,
    pub breadth: TtlCell<BreadthSnapshot>,
}

impl LearnedState {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            regime_weights: TtlCell::from_secs(config.regime_weights_ttl_secs),
            derived_modifiers: TtlCell::from_secs(config.derived_modifiers_ttl_secs),
            calibration: TtlCell::from_secs(config.calibration_ttl_secs),
            condition_stats: TtlCell::from_secs(config.condition_stats_ttl_secs),
            breadth: TtlCell::from_secs(config.breadth_ttl_secs),
        }
    }
}

impl Default for LearnedState {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
