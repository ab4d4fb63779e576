use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::config::CalibrationConfig;
use common::{
    CalibrationBucket, CalibrationStatus, ConfidenceCalibrationResult, SignalRecord, SignalStore,
    CALIBRATION_RANGES, MAX_SCORE,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Group decisive signals by the confidence they were emitted with and
/// compare each bucket's predicted midpoint with its realized win rate.
pub fn build_calibration(
    records: &[SignalRecord],
    config: &CalibrationConfig,
    now: DateTime<Utc>,
) -> ConfidenceCalibrationResult {
    let decisive: Vec<(f64, bool)> = records
        .iter()
        .filter_map(|r| r.is_win().map(|win| (r.confidence(), win)))
        .collect();

    let buckets = CALIBRATION_RANGES
        .iter()
        .map(|&(min, max)| {
            let mut bucket = CalibrationBucket {
                min,
                max,
                predicted: (min + max) / 2.0,
                wins: 0,
                losses: 0,
                sample_size: 0,
                actual: None,
                reliable: false,
                status: CalibrationStatus::Insufficient,
            };
            for (confidence, win) in &decisive {
                if bucket.contains(*confidence) {
                    if *win {
                        bucket.wins += 1;
                    } else {
                        bucket.losses += 1;
                    }
                }
            }
            bucket.sample_size = bucket.wins + bucket.losses;
            if bucket.sample_size > 0 {
                bucket.actual =
                    Some((bucket.wins as f64 / bucket.sample_size as f64 * 100.0).round());
            }
            bucket.reliable = bucket.sample_size >= config.min_per_bucket;
            bucket.status = match bucket.actual {
                Some(actual) if bucket.reliable => {
                    let gap = actual - bucket.predicted;
                    if gap.abs() <= config.tolerance {
                        CalibrationStatus::Calibrated
                    } else if gap > 0.0 {
                        CalibrationStatus::Underconfident
                    } else {
                        CalibrationStatus::Overconfident
                    }
                }
                _ => CalibrationStatus::Insufficient,
            };
            bucket
        })
        .collect::<Vec<_>>();

    let total_resolved = decisive.len();
    ConfidenceCalibrationResult {
        total_resolved,
        active: total_resolved >= config.min_total_resolved,
        buckets,
        computed_at: now,
    }
}

/// Calibration Engine - maps raw confidence to realized win rate per bucket
pub struct CalibrationEngine {
    store: Arc<dyn SignalStore>,
    config: CalibrationConfig,
}

impl CalibrationEngine {
    pub fn new(store: Arc<dyn SignalStore>, config: CalibrationConfig) -> Self {
        Self { store, config }
    }

    pub async fn compute(&self, now: DateTime<Utc>) -> Result<ConfidenceCalibrationResult> {
        let records = self
            .store
            .resolved()
            .await
            .context("Failed to load resolved signals for calibration")?;
        Ok(self.compute_from(&records, now))
    }

    pub fn compute_from(&self, records: &[SignalRecord], now: DateTime<Utc>) -> ConfidenceCalibrationResult {
        let result = build_calibration(records, &self.config, now);
        for bucket in &result.buckets {
            debug!(
                "  [{}]: {} signals, predicted {:.0}%, actual {:?}, {:?}",
                bucket.label(),
                bucket.sample_size,
                bucket.predicted,
                bucket.actual,
                bucket.status
            );
        }
        match max_calibration_gap(&result) {
            Some(gap) => info!(
                "Calibration over {} decisive signals ({}), largest bucket gap {:.0} points",
                result.total_resolved,
                if result.active { "active" } else { "inactive" },
                gap
            ),
            None => info!(
                "Calibration over {} decisive signals ({}), no reliable buckets",
                result.total_resolved,
                if result.active { "active" } else { "inactive" }
            ),
        }
        result
    }
}

/// Largest deviation between predicted and actual among reliable buckets
pub fn max_calibration_gap(result: &ConfidenceCalibrationResult) -> Option<f64> {
    result
        .buckets
        .iter()
        .filter(|b| b.reliable)
        .filter_map(|b| b.actual.map(|a| (a - b.predicted).abs()))
        .fold(None, |acc: Option<f64>, gap| Some(acc.map_or(gap, |m| m.max(gap))))
        .map(|gap| gap.min(MAX_SCORE))
}
