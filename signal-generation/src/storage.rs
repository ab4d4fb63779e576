// Signal Recorder
// Fire-and-forget persistence of emitted signals on a detached task

use anyhow::Result;
use common::{SignalRecord, SignalStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// A record the background writer could not persist
#[derive(Debug, Clone)]
pub struct PersistenceFailure {
    pub record_id: Uuid,
    pub symbol: String,
    pub error: String,
}

/// Hands records to a background writer without waiting for the store.
///
/// Failures are logged and forwarded on the error channel returned by
/// [`SignalRecorder::spawn`]; they never reach the caller of `record`.
pub struct SignalRecorder {
    tx: mpsc::UnboundedSender<SignalRecord>,
    worker: JoinHandle<()>,
}

impl SignalRecorder {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn SignalStore>) -> (Self, mpsc::UnboundedReceiver<PersistenceFailure>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<SignalRecord>();
        let (err_tx, err_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                match store.insert(&record).await {
                    Ok(()) => debug!("Persisted signal {} for {}", record.id(), record.symbol()),
                    Err(e) => {
                        warn!("Failed to persist signal {} for {}: {:#}", record.id(), record.symbol(), e);
                        // nobody listening is fine
                        let _ = err_tx.send(PersistenceFailure {
                            record_id: record.id(),
                            symbol: record.symbol().to_string(),
                            error: format!("{:#}", e),
                        });
                    }
                }
            }
        });

        (Self { tx, worker }, err_rx)
    }

    /// Queue a record for persistence. Never blocks.
    pub fn record(&self, record: SignalRecord) {
        if let Err(e) = self.tx.send(record) {
            warn!("Signal writer has stopped, dropping signal {}", e.0.id());
        }
    }

    /// Close the queue and wait for queued records to be written
    pub async fn shutdown(self) -> Result<()> {
        drop(self.tx);
        self.worker.await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::signals::tests::bullish_request;
    use common::{
        ConditionSnapshot, Direction, FactorScores, InMemorySignalStore, ModifierSnapshot,
        NewSignalRecord, PriceLevels, Regime, Resolution, StoreStats,
    };
    use rust_decimal_macros::dec;

    pub(crate) fn sample_record() -> SignalRecord {
        let request = bullish_request();
        SignalRecord::new(NewSignalRecord {
            symbol: request.symbol,
            signal_date: request.date,
            direction: Direction::Bullish,
            confidence: 74.0,
            base_confidence: 66.0,
            conditions: ConditionSnapshot::capture(Regime::TrendingStrong, 28.0, 1.8, 80.0),
            factors: FactorScores::default(),
            modifiers: ModifierSnapshot::default(),
            levels: PriceLevels {
                entry: dec!(100),
                target: dec!(104),
                stop_loss: dec!(97),
            },
        })
        .unwrap()
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl SignalStore for FailingStore {
        async fn insert(&self, _record: &SignalRecord) -> Result<()> {
            anyhow::bail!("connection refused")
        }
        async fn get(&self, _id: Uuid) -> Result<Option<SignalRecord>> {
            Ok(None)
        }
        async fn pending_symbols(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn pending_for_symbol(&self, _symbol: &str) -> Result<Vec<SignalRecord>> {
            Ok(Vec::new())
        }
        async fn record_outcome(&self, _id: Uuid, _resolution: &Resolution) -> Result<bool> {
            Ok(false)
        }
        async fn resolved(&self) -> Result<Vec<SignalRecord>> {
            Ok(Vec::new())
        }
        async fn resolved_for_regime(&self, _regime: Regime) -> Result<Vec<SignalRecord>> {
            Ok(Vec::new())
        }
        async fn stats(&self) -> Result<StoreStats> {
            Ok(StoreStats::default())
        }
    }

    #[tokio::test]
    async fn test_records_are_persisted_in_background() {
        let store = Arc::new(InMemorySignalStore::new());
        let (recorder, _errors) = SignalRecorder::spawn(store.clone());

        let record = sample_record();
        let id = record.id();
        recorder.record(record);
        recorder.shutdown().await.unwrap();

        assert!(store.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failures_go_to_error_channel() {
        let (recorder, mut errors) = SignalRecorder::spawn(Arc::new(FailingStore));
        let record = sample_record();
        let id = record.id();
        recorder.record(record);

        let failure = errors.recv().await.unwrap();
        assert_eq!(failure.record_id, id);
        assert_eq!(failure.symbol, "AAPL");
        assert!(failure.error.contains("connection refused"));
        recorder.shutdown().await.unwrap();
    }
}
