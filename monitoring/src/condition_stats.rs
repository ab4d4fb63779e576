// Condition statistics: realized outcomes grouped by condition hash,
// consumed by the expectancy filter.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::config::ExpectancyConfig;
use common::{ConditionStatsTable, EmpiricalProbability, SignalRecord, SignalStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
struct Accumulator {
    wins: usize,
    losses: usize,
    win_pct_sum: f64,
    loss_pct_sum: f64,
}

impl Accumulator {
    fn finish(self, min_reliable: usize) -> EmpiricalProbability {
        let n = self.wins + self.losses;
        let avg = |sum: f64, count: usize| if count == 0 { 0.0 } else { sum / count as f64 };
        EmpiricalProbability {
            available: n > 0,
            win_rate: if n == 0 { 0.0 } else { self.wins as f64 / n as f64 },
            avg_win_pct: avg(self.win_pct_sum, self.wins),
            avg_loss_pct: avg(self.loss_pct_sum, self.losses),
            sample_size: n,
            reliable: n >= min_reliable,
        }
    }
}

pub fn build_condition_stats(
    records: &[SignalRecord],
    config: &ExpectancyConfig,
    now: DateTime<Utc>,
) -> ConditionStatsTable {
    let mut groups: HashMap<String, Accumulator> = HashMap::new();
    for record in records {
        let (Some(win), Some(pnl)) = (record.is_win(), record.pnl_percent()) else {
            continue;
        };
        let acc = groups
            .entry(record.conditions().condition_hash.clone())
            .or_default();
        if win {
            acc.wins += 1;
            acc.win_pct_sum += pnl.max(0.0);
        } else {
            acc.losses += 1;
            acc.loss_pct_sum += pnl.abs();
        }
    }

    ConditionStatsTable {
        by_hash: groups
            .into_iter()
            .map(|(hash, acc)| (hash, acc.finish(config.min_reliable_samples)))
            .collect(),
        computed_at: now,
    }
}

pub struct ConditionStatsEngine {
    store: Arc<dyn SignalStore>,
    config: ExpectancyConfig,
}

impl ConditionStatsEngine {
    pub fn new(store: Arc<dyn SignalStore>, config: ExpectancyConfig) -> Self {
        Self { store, config }
    }

    pub async fn compute(&self, now: DateTime<Utc>) -> Result<ConditionStatsTable> {
        let records = self
            .store
            .resolved()
            .await
            .context("Failed to load resolved signals for condition statistics")?;
        let table = build_condition_stats(&records, &self.config, now);
        info!(
            "Condition statistics: {} buckets, {} reliable",
            table.by_hash.len(),
            table.by_hash.values().filter(|p| p.reliable).count()
        );
        Ok(table)
    }
}
