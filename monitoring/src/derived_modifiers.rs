use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::config::ModifierConfig;
use common::{DerivedModifier, DerivedModifiersResult, ModifierCondition, SignalRecord, SignalStore};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    wins: usize,
    losses: usize,
}

impl Tally {
    fn add(&mut self, win: bool) {
        if win {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
    }

    fn total(&self) -> usize {
        self.wins + self.losses
    }

    /// Win rate in percent
    fn win_rate(&self) -> Option<f64> {
        if self.total() == 0 {
            None
        } else {
            Some(self.wins as f64 / self.total() as f64 * 100.0)
        }
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Measure each condition's win-rate delta over decisive history.
///
/// A modifier is reliable only when both the "with" and "without" groups
/// reach `min_group_samples`; anything else keeps its static value.
pub fn build_derived_modifiers(
    records: &[SignalRecord],
    config: &ModifierConfig,
    now: DateTime<Utc>,
) -> DerivedModifiersResult {
    let decisive: Vec<(&SignalRecord, bool)> = records
        .iter()
        .filter_map(|r| r.is_win().map(|win| (r, win)))
        .collect();

    let modifiers: Vec<DerivedModifier> = ModifierCondition::ALL
        .iter()
        .map(|&condition| {
            let mut with = Tally::default();
            let mut without = Tally::default();
            for (record, win) in &decisive {
                if condition.holds_for(record.conditions()) {
                    with.add(*win);
                } else {
                    without.add(*win);
                }
            }

            let derived_value = match (with.win_rate(), without.win_rate()) {
                (Some(a), Some(b)) => Some(round1(a - b)),
                _ => None,
            };
            let reliable = with.total() >= config.min_group_samples
                && without.total() >= config.min_group_samples;
            let value = match derived_value {
                Some(v) if reliable => v,
                _ => condition.static_value(),
            };

            DerivedModifier {
                condition,
                static_value: condition.static_value(),
                derived_value,
                win_rate_with: with.win_rate().map(round1),
                win_rate_without: without.win_rate().map(round1),
                sample_with: with.total(),
                sample_without: without.total(),
                reliable,
                value,
            }
        })
        .collect();

    let total = modifiers.len();
    let reliable_count = modifiers.iter().filter(|m| m.reliable).count();
    DerivedModifiersResult {
        ready: total > 0 && reliable_count as f64 >= config.ready_fraction * total as f64,
        modifiers,
        reliable_count,
        total,
        computed_at: now,
    }
}

/// Data-Derived Modifier Engine - replaces static additive modifiers with
/// measured win-rate deltas
pub struct DerivedModifierEngine {
    store: Arc<dyn SignalStore>,
    config: ModifierConfig,
}

impl DerivedModifierEngine {
    pub fn new(store: Arc<dyn SignalStore>, config: ModifierConfig) -> Self {
        Self { store, config }
    }

    pub async fn compute(&self, now: DateTime<Utc>) -> Result<DerivedModifiersResult> {
        let records = self
            .store
            .resolved()
            .await
            .context("Failed to load resolved signals for modifier derivation")?;

        let result = build_derived_modifiers(&records, &self.config, now);
        for m in &result.modifiers {
            debug!(
                "  {}: static {:+.1}, derived {:?} ({} with / {} without){}",
                m.condition.label(),
                m.static_value,
                m.derived_value,
                m.sample_with,
                m.sample_without,
                if m.reliable { "" } else { " [unreliable]" }
            );
        }
        info!(
            "Derived modifiers: {}/{} reliable, engine {}",
            result.reliable_count,
            result.total,
            if result.ready { "ready" } else { "not ready" }
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::tests::{record_with, settle};
    use common::{
        ConditionSnapshot, Direction, FactorScores, InMemorySignalStore, ModifierSource, Regime,
        TerminalStatus,
    };

    fn outcome(volume_ratio: f64, adx: f64, win: bool) -> SignalRecord {
        let r = record_with(
            "MSFT",
            Direction::Bullish,
            70.0,
            ConditionSnapshot::capture(Regime::TrendingStrong, adx, volume_ratio, 60.0),
            FactorScores::default(),
        );
        let status = if win { TerminalStatus::TargetHit } else { TerminalStatus::StopHit };
        settle(r, status, if win { 4.0 } else { -3.0 })
    }

    /// 60 high-volume signals winning 2:1 and 40 quiet ones winning 3:5
    fn history() -> Vec<SignalRecord> {
        let mut records = Vec::new();
        for i in 0..60 {
            records.push(outcome(1.8, 20.0, i % 3 != 0));
        }
        for i in 0..40 {
            records.push(outcome(0.9, 20.0, i % 8 < 3));
        }
        records
    }

    fn find(result: &DerivedModifiersResult, c: ModifierCondition) -> &DerivedModifier {
        result.modifiers.iter().find(|m| m.condition == c).unwrap()
    }

    #[test]
    fn test_high_volume_delta_is_measured() {
        let result = build_derived_modifiers(&history(), &ModifierConfig::default(), Utc::now());
        let m = find(&result, ModifierCondition::HighVolume);

        assert_eq!(m.sample_with, 60);
        assert_eq!(m.sample_without, 40);
        assert!(m.reliable);
        assert_eq!(m.win_rate_with, Some(66.7));
        assert_eq!(m.win_rate_without, Some(37.5));
        assert_eq!(m.derived_value, Some(29.2));
        assert_eq!(m.value, 29.2);
    }

    #[test]
    fn test_one_sided_group_is_unreliable_and_static() {
        let result = build_derived_modifiers(&history(), &ModifierConfig::default(), Utc::now());

        // every record has ADX 20: nothing satisfies strong trend
        let m = find(&result, ModifierCondition::StrongTrend);
        assert_eq!(m.sample_with, 0);
        assert!(!m.reliable);
        assert_eq!(m.derived_value, None);
        assert_eq!(m.value, m.static_value);

        for m in &result.modifiers {
            if m.reliable {
                assert!(m.sample_with >= 30 && m.sample_without >= 30);
            } else {
                assert_eq!(m.value, m.static_value);
            }
        }
    }

    #[test]
    fn test_not_ready_keeps_every_value_static() {
        let result = build_derived_modifiers(&history(), &ModifierConfig::default(), Utc::now());
        // only the two volume conditions split the history
        assert_eq!(result.reliable_count, 2);
        assert!(!result.ready);
        assert_eq!(
            result.value_for(ModifierCondition::HighVolume),
            (5.0, ModifierSource::Static)
        );

        let relaxed = ModifierConfig {
            ready_fraction: 0.3,
            ..Default::default()
        };
        let result = build_derived_modifiers(&history(), &relaxed, Utc::now());
        assert!(result.ready);
        assert_eq!(
            result.value_for(ModifierCondition::HighVolume),
            (29.2, ModifierSource::Derived)
        );
    }

    #[test]
    fn test_expired_records_are_ignored() {
        let mut records = history();
        let r = record_with(
            "MSFT",
            Direction::Bullish,
            70.0,
            ConditionSnapshot::capture(Regime::TrendingStrong, 20.0, 1.8, 60.0),
            FactorScores::default(),
        );
        records.push(settle(r, TerminalStatus::Expired, 0.4));

        let result = build_derived_modifiers(&records, &ModifierConfig::default(), Utc::now());
        assert_eq!(find(&result, ModifierCondition::HighVolume).sample_with, 60);
    }

    #[tokio::test]
    async fn test_engine_reads_resolved_records_from_store() {
        let store = Arc::new(InMemorySignalStore::new());
        for r in history() {
            store.insert(&r).await.unwrap();
        }
        let engine = DerivedModifierEngine::new(store, ModifierConfig::default());
        let result = engine.compute(Utc::now()).await.unwrap();
        assert_eq!(result.total, ModifierCondition::ALL.len());
        assert_eq!(find(&result, ModifierCondition::ConfirmedVolume).sample_with, 60);
    }
}
