// Signal Record Store
// Durable record of every emitted actionable signal and its outcome

use crate::types::{Regime, Resolution, SignalRecord};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Trait for signal record backends.
///
/// Records are never deleted. The only mutation is `record_outcome`, which
/// must be a no-op for records that are already terminal.
#[async_trait::async_trait]
pub trait SignalStore: Send + Sync {
    /// Persist a newly emitted signal
    async fn insert(&self, record: &SignalRecord) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<SignalRecord>>;

    /// Symbols that still have at least one PENDING record
    async fn pending_symbols(&self) -> Result<Vec<String>>;

    /// PENDING records for one symbol, oldest signal date first
    async fn pending_for_symbol(&self, symbol: &str) -> Result<Vec<SignalRecord>>;

    /// Apply a terminal outcome. Returns false when the record is missing or
    /// no longer PENDING, in which case nothing is written.
    async fn record_outcome(&self, id: Uuid, resolution: &Resolution) -> Result<bool>;

    /// Every record with a terminal status
    async fn resolved(&self) -> Result<Vec<SignalRecord>>;

    async fn resolved_for_regime(&self, regime: Regime) -> Result<Vec<SignalRecord>>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Store statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_signals: usize,
    pub pending: usize,
    pub by_status: HashMap<String, usize>,
    pub oldest_signal: Option<DateTime<Utc>>,
    pub newest_signal: Option<DateTime<Utc>>,
}

impl StoreStats {
    pub(crate) fn from_records<'a>(records: impl Iterator<Item = &'a SignalRecord>) -> Self {
        let mut stats = StoreStats::default();
        for record in records {
            stats.total_signals += 1;
            if record.is_pending() {
                stats.pending += 1;
            }
            *stats
                .by_status
                .entry(record.status().label().to_string())
                .or_insert(0) += 1;

            let created = record.created_at();
            if stats.oldest_signal.map_or(true, |t| created < t) {
                stats.oldest_signal = Some(created);
            }
            if stats.newest_signal.map_or(true, |t| created > t) {
                stats.newest_signal = Some(created);
            }
        }
        stats
    }
}

/// In-memory signal store (for testing and development)
pub struct InMemorySignalStore {
    records: tokio::sync::RwLock<HashMap<Uuid, SignalRecord>>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self {
            records: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySignalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SignalStore for InMemorySignalStore {
    async fn insert(&self, record: &SignalRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SignalRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&id).cloned())
    }

    async fn pending_symbols(&self) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let symbols: BTreeSet<String> = records
            .values()
            .filter(|r| r.is_pending())
            .map(|r| r.symbol().to_string())
            .collect();
        Ok(symbols.into_iter().collect())
    }

    async fn pending_for_symbol(&self, symbol: &str) -> Result<Vec<SignalRecord>> {
        let records = self.records.read().await;
        let mut pending: Vec<SignalRecord> = records
            .values()
            .filter(|r| r.is_pending() && r.symbol().eq_ignore_ascii_case(symbol))
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.signal_date(), r.created_at()));
        Ok(pending)
    }

    async fn record_outcome(&self, id: Uuid, resolution: &Resolution) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) => match record.resolve(resolution.clone()) {
                Ok(()) => Ok(true),
                Err(err) => {
                    // re-reporting the recorded outcome is a no-op; a different one is a bug
                    if record.status().label() != resolution.status.as_str() {
                        err.report();
                    }
                    Ok(false)
                }
            },
            None => Ok(false),
        }
    }

    async fn resolved(&self) -> Result<Vec<SignalRecord>> {
        let records = self.records.read().await;
        Ok(records.values().filter(|r| !r.is_pending()).cloned().collect())
    }

    async fn resolved_for_regime(&self, regime: Regime) -> Result<Vec<SignalRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| !r.is_pending() && r.conditions().regime == regime)
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let records = self.records.read().await;
        Ok(StoreStats::from_records(records.values()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::sample_draft;
    use crate::types::{Direction, TerminalStatus};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn target_hit() -> Resolution {
        Resolution {
            status: TerminalStatus::TargetHit,
            date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            price: dec!(104),
            pnl_percent: 4.0,
            days_to_outcome: 2,
        }
    }

    #[tokio::test]
    async fn test_insert_and_pending_queries() {
        let store = InMemorySignalStore::new();
        let a = SignalRecord::new(sample_draft(Direction::Bullish)).unwrap();
        let mut draft = sample_draft(Direction::Bearish);
        draft.symbol = "msft".to_string();
        let b = SignalRecord::new(draft).unwrap();

        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        assert_eq!(store.pending_symbols().await.unwrap(), vec!["AAPL", "MSFT"]);
        assert_eq!(store.pending_for_symbol("aapl").await.unwrap().len(), 1);
        assert_eq!(store.get(b.id()).await.unwrap().unwrap().symbol(), "MSFT");
    }

    #[tokio::test]
    async fn test_record_outcome_twice_is_noop() {
        let store = InMemorySignalStore::new();
        let record = SignalRecord::new(sample_draft(Direction::Bullish)).unwrap();
        store.insert(&record).await.unwrap();

        assert!(store.record_outcome(record.id(), &target_hit()).await.unwrap());
        assert!(!store.record_outcome(record.id(), &target_hit()).await.unwrap());

        let stored = store.get(record.id()).await.unwrap().unwrap();
        assert_eq!(stored.status().label(), "TARGET_HIT");
        assert!(store.pending_symbols().await.unwrap().is_empty());
        assert!(!store.record_outcome(Uuid::new_v4(), &target_hit()).await.unwrap());
    }

    #[cfg(debug_assertions)]
    #[tokio::test]
    #[should_panic(expected = "already terminal")]
    async fn test_changing_a_terminal_outcome_panics_in_debug() {
        let store = InMemorySignalStore::new();
        let record = SignalRecord::new(sample_draft(Direction::Bullish)).unwrap();
        store.insert(&record).await.unwrap();
        store.record_outcome(record.id(), &target_hit()).await.unwrap();

        let mut stop = target_hit();
        stop.status = TerminalStatus::StopHit;
        let _ = store.record_outcome(record.id(), &stop).await;
    }

    #[tokio::test]
    async fn test_resolved_queries_and_stats() {
        let store = InMemorySignalStore::new();
        let resolved = SignalRecord::new(sample_draft(Direction::Bullish)).unwrap();
        let pending = SignalRecord::new(sample_draft(Direction::Bullish)).unwrap();
        store.insert(&resolved).await.unwrap();
        store.insert(&pending).await.unwrap();
        store.record_outcome(resolved.id(), &target_hit()).await.unwrap();

        assert_eq!(store.resolved().await.unwrap().len(), 1);
        assert_eq!(store.resolved_for_regime(Regime::TrendingStrong).await.unwrap().len(), 1);
        assert!(store.resolved_for_regime(Regime::Range).await.unwrap().is_empty());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_signals, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.by_status.get("TARGET_HIT"), Some(&1));
        assert!(stats.oldest_signal.is_some());
    }
}
