// Signal Evaluation Pipeline
// Regime -> scoring -> modifiers -> gate -> expectancy -> calibration.
// Synchronous and free of I/O: learned state is read from warm caches only.

use crate::expectancy::{ExpectancyFilter, ExpectancyResult};
use crate::levels::compute_levels;
use crate::modifiers::{ConfidenceResult, ModifierEngine};
use crate::regime::{RegimeClassification, RegimeClassifier};
use crate::scoring::{recommendation, ConfidenceModel, SplitConfidenceResult};
use crate::signals::SignalRequest;
use crate::storage::SignalRecorder;
use crate::validators::{GateContext, SelectivityGate, SelectivityGateResult};
use chrono::{DateTime, NaiveDate, Utc};
use common::config::{EngineConfig, LevelsConfig};
use common::{
    CalibratedConfidence, ConditionSnapshot, EmpiricalProbability, InputError, LearnedState,
    NewSignalRecord, PriceLevels, Recommendation, SignalRecord,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Full result of evaluating one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvaluation {
    pub symbol: String,
    pub date: NaiveDate,
    pub regime: RegimeClassification,
    pub split: SplitConfidenceResult,
    pub confidence: ConfidenceResult,
    pub conditions: ConditionSnapshot,
    pub gate: SelectivityGateResult,
    pub expectancy: ExpectancyResult,
    pub calibration: CalibratedConfidence,
    pub recommendation: Recommendation,
    /// Calibrated confidence reported to the caller
    pub final_confidence: f64,
    pub levels: Option<PriceLevels>,
    /// Id of the persisted record, for actionable signals
    pub record_id: Option<Uuid>,
}

impl SignalEvaluation {
    pub fn is_actionable(&self) -> bool {
        self.recommendation.is_actionable()
    }
}

pub struct SignalPipeline {
    model: ConfidenceModel,
    modifiers: ModifierEngine,
    gate: SelectivityGate,
    expectancy: ExpectancyFilter,
    levels: LevelsConfig,
    learned: Arc<LearnedState>,
    recorder: Option<SignalRecorder>,
}

impl SignalPipeline {
    pub fn new(config: &EngineConfig, learned: Arc<LearnedState>) -> Self {
        Self {
            model: ConfidenceModel::new(config.scoring.clone()),
            modifiers: ModifierEngine::new(
                config.modifiers.clone(),
                config.breadth.clone(),
                &config.scoring,
            ),
            gate: SelectivityGate::new(&config.gate),
            expectancy: ExpectancyFilter::new(config.expectancy.clone()),
            levels: config.levels.clone(),
            learned,
            recorder: None,
        }
    }

    /// Persist actionable signals through a background recorder
    pub fn with_recorder(mut self, recorder: SignalRecorder) -> Self {
        info!("Signal recorder attached");
        self.recorder = Some(recorder);
        self
    }

    /// Detach the recorder, e.g. to shut it down cleanly
    pub fn take_recorder(&mut self) -> Option<SignalRecorder> {
        self.recorder.take()
    }

    pub fn evaluate(&self, request: &SignalRequest) -> Result<SignalEvaluation, InputError> {
        self.evaluate_at(request, Utc::now())
    }

    /// Evaluate against the learned state that is warm at `now`
    pub fn evaluate_at(
        &self,
        request: &SignalRequest,
        now: DateTime<Utc>,
    ) -> Result<SignalEvaluation, InputError> {
        request.validate()?;
        let t = &request.technical;

        let weights = self.learned.regime_weights.get(now);
        let regime = RegimeClassifier::classify(t, &request.news, weights.as_deref());

        let split = self.model.score(
            t,
            &request.pattern,
            &request.news,
            &request.fundamentals,
            &regime,
        );
        let direction = split.direction;
        let conditions = ConditionSnapshot::capture(regime.regime, t.adx, t.volume_ratio, t.alignment_score);

        let derived = self.learned.derived_modifiers.get(now);
        let breadth = self.learned.breadth.get(now);
        let confidence = self.modifiers.apply(
            split.strength,
            direction,
            split.factors.fundamental,
            &conditions,
            &request.pattern,
            &request.fundamentals,
            derived.as_deref(),
            breadth.as_deref(),
        )
        .with_top_factors(split.top_factors.clone());

        let gate = self.gate.evaluate(&GateContext {
            technical: t,
            direction,
            conflict: confidence.conflict,
            days_to_earnings: request.days_to_earnings,
        });

        let empirical = self
            .learned
            .condition_stats
            .get(now)
            .map(|table| table.lookup(&conditions.condition_hash))
            .unwrap_or_else(EmpiricalProbability::unavailable);
        let expectancy = self.expectancy.evaluate(&empirical);

        let mut rec = recommendation(confidence.confidence, direction, self.model.config());
        if rec.is_actionable() && !(gate.passed && expectancy.accepted) {
            debug!(
                "{} {:?} downgraded to WAIT (gate: {:?}, expectancy: {:?})",
                request.symbol, rec, gate.rejected_by, expectancy.status
            );
            rec = Recommendation::Wait;
        }

        let calibration = match self.learned.calibration.get(now) {
            Some(table) => table.calibrate(confidence.confidence),
            None => CalibratedConfidence::passthrough(confidence.confidence, None),
        };

        let mut levels = None;
        let mut record_id = None;
        if rec.is_actionable() {
            let placed = compute_levels(direction, t.price, t.atr, &self.levels).and_then(|placed| {
                SignalRecord::new(NewSignalRecord {
                    symbol: request.symbol.clone(),
                    signal_date: request.date,
                    direction,
                    confidence: confidence.confidence,
                    base_confidence: confidence.base_confidence,
                    conditions: conditions.clone(),
                    factors: split.factors,
                    modifiers: confidence.modifiers,
                    levels: placed,
                })
            });

            match placed {
                Ok(record) => {
                    info!(
                        "{:?} {} @ {} confidence {:.1} (calibrated {:.1}), regime {}",
                        rec,
                        record.symbol(),
                        record.levels().entry,
                        confidence.confidence,
                        calibration.calibrated,
                        regime.regime
                    );
                    record_id = Some(record.id());
                    levels = Some(*record.levels());
                    if let Some(recorder) = &self.recorder {
                        recorder.record(record);
                    }
                }
                Err(e) => {
                    warn!("{} {:?} downgraded to WAIT: {}", request.symbol, rec, e);
                    rec = Recommendation::Wait;
                }
            }
        }

        Ok(SignalEvaluation {
            symbol: request.symbol.trim().to_ascii_uppercase(),
            date: request.date,
            final_confidence: calibration.calibrated,
            regime,
            split,
            confidence,
            conditions,
            gate,
            expectancy,
            calibration,
            recommendation: rec,
            levels,
            record_id,
        })
    }
}
