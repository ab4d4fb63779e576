use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::config::RegimeLearningConfig;
use common::{
    Factor, FactorScores, Regime, RegimeLearningStatus, RegimeWeightTable, RegimeWeights,
    SignalRecord, SignalStore, WeightSource,
};
use statrs::statistics::Statistics;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-factor separation power: |mean(score | win) - mean(score | loss)|.
///
/// None unless both wins and losses are present.
pub fn separation_power<'a>(records: impl IntoIterator<Item = &'a SignalRecord>) -> Option<FactorScores> {
    let (wins, losses): (Vec<_>, Vec<_>) = records
        .into_iter()
        .filter_map(|r| r.is_win().map(|win| (r.factors(), win)))
        .partition(|(_, win)| *win);
    if wins.is_empty() || losses.is_empty() {
        return None;
    }

    let gap = |factor: Factor| {
        let w = wins.iter().map(|(f, _)| f.get(factor)).mean();
        let l = losses.iter().map(|(f, _)| f.get(factor)).mean();
        (w - l).abs()
    };
    Some(FactorScores {
        technical: gap(Factor::Technical),
        pattern: gap(Factor::Pattern),
        volume: gap(Factor::Volume),
        news: gap(Factor::News),
        fundamental: gap(Factor::Fundamental),
    })
}

/// Learning status for one regime from its resolved history
pub fn learn_regime(
    regime: Regime,
    records: &[SignalRecord],
    config: &RegimeLearningConfig,
) -> RegimeLearningStatus {
    let mut status = RegimeLearningStatus::cold(regime);
    let in_regime: Vec<&SignalRecord> = records
        .iter()
        .filter(|r| r.conditions().regime == regime)
        .collect();
    for record in &in_regime {
        match record.is_win() {
            Some(true) => status.wins += 1,
            Some(false) => status.losses += 1,
            None => {}
        }
    }
    status.resolved_signals = status.wins + status.losses;
    if status.resolved_signals == 0 {
        return status;
    }
    status.win_rate = Some(status.wins as f64 / status.resolved_signals as f64 * 100.0);

    if status.resolved_signals >= config.min_learning_samples {
        status.learned_weights = separation_power(in_regime.iter().copied())
            .and_then(|s| RegimeWeights::from_separation(&s, config.weight_floor));
    }
    status.reliable = status.resolved_signals >= config.min_active_samples;
    if let (true, Some(learned)) = (status.reliable, status.learned_weights) {
        status.active_weights = learned;
        status.source = WeightSource::Empirical;
    }
    status
}

/// Regime Weight Learner - re-derives per-regime factor weights from outcomes
pub struct RegimeWeightLearner {
    store: Arc<dyn SignalStore>,
    config: RegimeLearningConfig,
}

impl RegimeWeightLearner {
    pub fn new(store: Arc<dyn SignalStore>, config: RegimeLearningConfig) -> Self {
        Self { store, config }
    }

    pub async fn compute(&self, now: DateTime<Utc>) -> Result<RegimeWeightTable> {
        let mut regimes = Vec::with_capacity(Regime::ALL.len());
        for regime in Regime::ALL {
            let records = self
                .store
                .resolved_for_regime(regime)
                .await
                .with_context(|| format!("loading resolved signals for regime {}", regime))?;
            let status = learn_regime(regime, &records, &self.config);
            debug!(
                "  {}: {} decisive, {:?} weights, dominant {}",
                regime,
                status.resolved_signals,
                status.source,
                status.active_weights.dominant_factor().as_str()
            );
            regimes.push(status);
        }

        let empirical = regimes
            .iter()
            .filter(|s| s.source == WeightSource::Empirical)
            .count();
        info!("Regime weights: {}/{} regimes empirical", empirical, regimes.len());
        Ok(RegimeWeightTable {
            regimes,
            computed_at: now,
        })
    }
}
