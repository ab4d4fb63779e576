// Learning Coordinator
// Runs the offline computations and publishes their results into the caches
// the online pipeline reads.

use crate::breadth::BreadthMonitor;
use crate::calibration::{max_calibration_gap, CalibrationEngine};
use crate::condition_stats::ConditionStatsEngine;
use crate::derived_modifiers::DerivedModifierEngine;
use crate::prices::PriceHistorySource;
use crate::regime_learning::RegimeWeightLearner;
use crate::resolution::{OutcomeResolver, ResolutionStats};
use anyhow::Result;
use chrono::{DateTime, Utc};
use common::config::EngineConfig;
use common::{
    BreadthSnapshot, ConfidenceCalibrationResult, DerivedModifiersResult, LearnedState,
    RegimeLearningStatus, SignalStore, StoreStats,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Which caches a refresh updated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub regime_weights: bool,
    pub derived_modifiers: bool,
    pub calibration: bool,
    pub condition_stats: bool,
    /// False when the cached snapshot was still warm
    pub breadth: bool,
    pub failures: Vec<String>,
}

/// Serialisable view of everything the engine has learned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSnapshot {
    pub taken_at: DateTime<Utc>,
    pub store: StoreStats,
    pub regimes: Vec<RegimeLearningStatus>,
    pub derived_modifiers: Option<DerivedModifiersResult>,
    pub calibration: Option<ConfidenceCalibrationResult>,
    /// Largest |actual - predicted| among reliable calibration buckets
    pub calibration_gap: Option<f64>,
    pub condition_buckets: usize,
    pub breadth: Option<BreadthSnapshot>,
}

pub struct LearningCoordinator {
    store: Arc<dyn SignalStore>,
    learned: Arc<LearnedState>,
    resolver: OutcomeResolver,
    regimes: RegimeWeightLearner,
    modifiers: DerivedModifierEngine,
    calibration: CalibrationEngine,
    conditions: ConditionStatsEngine,
    breadth: BreadthMonitor,
}

impl LearningCoordinator {
    pub fn new(
        store: Arc<dyn SignalStore>,
        prices: Arc<dyn PriceHistorySource>,
        learned: Arc<LearnedState>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            resolver: OutcomeResolver::new(store.clone(), prices.clone(), config.resolver.horizon_bars),
            regimes: RegimeWeightLearner::new(store.clone(), config.regime_learning.clone()),
            modifiers: DerivedModifierEngine::new(store.clone(), config.modifiers.clone()),
            calibration: CalibrationEngine::new(store.clone(), config.calibration.clone()),
            conditions: ConditionStatsEngine::new(store.clone(), config.expectancy.clone()),
            breadth: BreadthMonitor::new(prices, config.breadth.clone()),
            store,
            learned,
        }
    }

    pub fn learned(&self) -> Arc<LearnedState> {
        self.learned.clone()
    }

    /// Transition pending signals whose outcome is now known
    pub async fn resolve_outcomes(&self) -> Result<ResolutionStats> {
        self.resolver.resolve_all().await
    }

    /// Recompute every learned artifact concurrently. A failed computation
    /// is logged and leaves its cache as it was.
    pub async fn refresh(&self, now: DateTime<Utc>) -> RefreshReport {
        let breadth_due = self.learned.breadth.get(now).is_none();
        let (regimes, modifiers, calibration, conditions) = tokio::join!(
            self.regimes.compute(now),
            self.modifiers.compute(now),
            self.calibration.compute(now),
            self.conditions.compute(now),
        );

        let mut report = RefreshReport::default();
        match regimes {
            Ok(table) => {
                self.learned.regime_weights.set(table, now);
                report.regime_weights = true;
            }
            Err(e) => report.fail("regime_weights", e),
        }
        match modifiers {
            Ok(result) => {
                self.learned.derived_modifiers.set(result, now);
                report.derived_modifiers = true;
            }
            Err(e) => report.fail("derived_modifiers", e),
        }
        match calibration {
            Ok(result) => {
                self.learned.calibration.set(result, now);
                report.calibration = true;
            }
            Err(e) => report.fail("calibration", e),
        }
        match conditions {
            Ok(table) => {
                self.learned.condition_stats.set(table, now);
                report.condition_stats = true;
            }
            Err(e) => report.fail("condition_stats", e),
        }

        if breadth_due {
            let snapshot = self.breadth.compute(now).await;
            self.learned.breadth.set(snapshot, now);
            report.breadth = true;
        }

        info!(
            "Learning refresh complete ({} failures)",
            report.failures.len()
        );
        report
    }

    pub async fn snapshot(&self, now: DateTime<Utc>) -> Result<LearningSnapshot> {
        let store = self.store.stats().await?;
        let calibration = self.learned.calibration.get(now).map(|r| (*r).clone());
        Ok(LearningSnapshot {
            taken_at: now,
            store,
            regimes: self
                .learned
                .regime_weights
                .get(now)
                .map(|t| t.regimes.clone())
                .unwrap_or_default(),
            derived_modifiers: self.learned.derived_modifiers.get(now).map(|r| (*r).clone()),
            calibration_gap: calibration.as_ref().and_then(max_calibration_gap),
            calibration,
            condition_buckets: self
                .learned
                .condition_stats
                .get(now)
                .map_or(0, |t| t.by_hash.len()),
            breadth: self.learned.breadth.get(now).map(|b| (*b).clone()),
        })
    }
}

impl RefreshReport {
    fn fail(&mut self, part: &str, error: anyhow::Error) {
        warn!("Failed to refresh {}: {:#}", part, error);
        self.failures.push(format!("{}: {:#}", part, error));
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::InMemoryPriceSource;
    use crate::resolution::tests::{bars, record, record_with, settle};
    use common::{
        ConditionSnapshot, Direction, FactorScores, InMemorySignalStore, Regime, Resolution,
        SignalRecord, TerminalStatus,
    };
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn coordinator(store: Arc<dyn SignalStore>, prices: Arc<InMemoryPriceSource>) -> LearningCoordinator {
        LearningCoordinator::new(
            store,
            prices,
            Arc::new(LearnedState::default()),
            &EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_refresh_populates_every_cache() {
        let store = Arc::new(InMemorySignalStore::new());
        for i in 0..120 {
            let r = record_with(
                "AAPL",
                Direction::Bullish,
                70.0,
                ConditionSnapshot::capture(Regime::TrendingStrong, 28.0, 1.6, 80.0),
                FactorScores {
                    technical: if i % 2 == 0 { 80.0 } else { 50.0 },
                    ..Default::default()
                },
            );
            let status = if i % 2 == 0 { TerminalStatus::TargetHit } else { TerminalStatus::StopHit };
            store.insert(&settle(r, status, 0.0)).await.unwrap();
        }

        let c = coordinator(store, Arc::new(InMemoryPriceSource::new()));
        let now = Utc::now();
        let report = c.refresh(now).await;
        assert!(report.is_complete());
        assert!(report.breadth);

        let learned = c.learned();
        assert!(learned.regime_weights.get(now).is_some());
        assert!(learned.derived_modifiers.get(now).is_some());
        assert!(learned.calibration.get(now).unwrap().active);
        assert_eq!(learned.condition_stats.get(now).unwrap().by_hash.len(), 1);
        assert_eq!(learned.breadth.get(now).unwrap().sampled, 0);

        // breadth stays warm on the next run
        assert!(!c.refresh(now).await.breadth);

        let snapshot = c.snapshot(now).await.unwrap();
        assert_eq!(snapshot.store.total_signals, 120);
        assert_eq!(snapshot.regimes.len(), 5);
        // every signal sits in the 65-75 bucket at a 50% win rate
        assert_eq!(snapshot.calibration_gap, Some(20.0));
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"condition_buckets\":1"));
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl SignalStore for BrokenStore {
        async fn insert(&self, _record: &SignalRecord) -> Result<()> {
            anyhow::bail!("store offline")
        }
        async fn get(&self, _id: Uuid) -> Result<Option<SignalRecord>> {
            anyhow::bail!("store offline")
        }
        async fn pending_symbols(&self) -> Result<Vec<String>> {
            anyhow::bail!("store offline")
        }
        async fn pending_for_symbol(&self, _symbol: &str) -> Result<Vec<SignalRecord>> {
            anyhow::bail!("store offline")
        }
        async fn record_outcome(&self, _id: Uuid, _resolution: &Resolution) -> Result<bool> {
            anyhow::bail!("store offline")
        }
        async fn resolved(&self) -> Result<Vec<SignalRecord>> {
            anyhow::bail!("store offline")
        }
        async fn resolved_for_regime(&self, _regime: Regime) -> Result<Vec<SignalRecord>> {
            anyhow::bail!("store offline")
        }
        async fn stats(&self) -> Result<StoreStats> {
            anyhow::bail!("store offline")
        }
    }

    #[tokio::test]
    async fn test_store_failure_keeps_previous_state() {
        let c = coordinator(Arc::new(BrokenStore), Arc::new(InMemoryPriceSource::new()));
        let now = Utc::now();
        let report = c.refresh(now).await;

        assert_eq!(report.failures.len(), 4);
        assert!(!report.calibration);
        // breadth does not depend on the store
        assert!(report.breadth);
        assert!(c.learned().calibration.get(now).is_none());
        assert!(c.resolve_outcomes().await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_then_learn() {
        let store = Arc::new(InMemorySignalStore::new());
        let prices = Arc::new(InMemoryPriceSource::new());
        let r = record("TSLA", Direction::Bullish);
        store.insert(&r).await.unwrap();
        prices
            .insert("TSLA", bars(&[(dec!(105), dec!(99), dec!(104))]))
            .await;

        let c = coordinator(store.clone(), prices);
        let stats = c.resolve_outcomes().await.unwrap();
        assert_eq!(stats.target_hit, 1);

        let now = Utc::now();
        c.refresh(now).await;
        let table = c.learned().condition_stats.get(now).unwrap();
        let p = table.lookup(&r.conditions().condition_hash);
        assert_eq!(p.sample_size, 1);
        assert_eq!(p.win_rate, 1.0);
    }
}
