// Learned state: results produced by the offline path and read by the online path.
//
// Everything here is a plain value with pure lookup methods. The offline
// builders live in the monitoring crate; the caches that hold these values
// live in `cache`.

use crate::conditions::{
    ConditionSnapshot, CONFIRMED_VOLUME_RATIO, HIGH_VOLUME_RATIO, MODERATE_TREND_ADX,
    PERFECT_ALIGNMENT, STRONG_ALIGNMENT, STRONG_TREND_ADX,
};
use crate::config::BreadthConfig;
use crate::types::{Direction, Factor, FactorScores, Regime};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MIN_SCORE: f64 = 15.0;
pub const MAX_SCORE: f64 = 95.0;

// ---------------------------------------------------------------------------
// Regime weights
// ---------------------------------------------------------------------------

/// Factor weight vector. Always sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeWeights {
    pub technical: f64,
    pub pattern: f64,
    pub volume: f64,
    pub news: f64,
    pub fundamental: f64,
}

impl RegimeWeights {
    pub const fn new(technical: f64, pattern: f64, volume: f64, news: f64, fundamental: f64) -> Self {
        Self {
            technical,
            pattern,
            volume,
            news,
            fundamental,
        }
    }

    /// Hardcoded weights used until a regime has enough resolved signals
    pub fn default_for(regime: Regime) -> Self {
        match regime {
            Regime::TrendingStrong => Self::new(0.35, 0.25, 0.20, 0.10, 0.10),
            Regime::TrendingWeak => Self::new(0.30, 0.25, 0.15, 0.15, 0.15),
            Regime::Range => Self::new(0.15, 0.15, 0.10, 0.25, 0.35),
            Regime::Volatile => Self::new(0.25, 0.15, 0.30, 0.20, 0.10),
            Regime::EventDriven => Self::new(0.15, 0.10, 0.15, 0.45, 0.15),
        }
    }

    /// Normalize per-factor separation power into weights with a per-factor floor.
    ///
    /// `w_i = floor + (1 - 5 * floor) * s_i / sum(s)`. Returns None when there is
    /// no separation at all (every factor identical between wins and losses).
    pub fn from_separation(separation: &FactorScores, floor: f64) -> Option<Self> {
        let floor = floor.clamp(0.0, 0.2);
        let total: f64 = Factor::ALL.iter().map(|f| separation.get(*f).abs()).sum();
        if !total.is_finite() || total <= f64::EPSILON {
            return None;
        }
        let spread = 1.0 - floor * Factor::ALL.len() as f64;
        let w = |f: Factor| floor + spread * separation.get(f).abs() / total;
        Some(Self::new(
            w(Factor::Technical),
            w(Factor::Pattern),
            w(Factor::Volume),
            w(Factor::News),
            w(Factor::Fundamental),
        ))
    }

    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Technical => self.technical,
            Factor::Pattern => self.pattern,
            Factor::Volume => self.volume,
            Factor::News => self.news,
            Factor::Fundamental => self.fundamental,
        }
    }

    pub fn sum(&self) -> f64 {
        Factor::ALL.iter().map(|f| self.get(*f)).sum()
    }

    pub fn weighted_score(&self, scores: &FactorScores) -> f64 {
        Factor::ALL
            .iter()
            .map(|f| self.get(*f) * scores.get(*f))
            .sum()
    }

    /// Factor with the largest weight
    pub fn dominant_factor(&self) -> Factor {
        Factor::ALL
            .into_iter()
            .max_by(|a, b| {
                self.get(*a)
                    .partial_cmp(&self.get(*b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(Factor::Technical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    Default,
    Empirical,
}

/// Learning status for one regime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeLearningStatus {
    pub regime: Regime,
    pub resolved_signals: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: Option<f64>,
    /// Empirical vector once the regime has enough signals to learn from
    pub learned_weights: Option<RegimeWeights>,
    /// The vector the scoring path should use right now
    pub active_weights: RegimeWeights,
    pub source: WeightSource,
    pub reliable: bool,
}

impl RegimeLearningStatus {
    pub fn cold(regime: Regime) -> Self {
        Self {
            regime,
            resolved_signals: 0,
            wins: 0,
            losses: 0,
            win_rate: None,
            learned_weights: None,
            active_weights: RegimeWeights::default_for(regime),
            source: WeightSource::Default,
            reliable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeWeightTable {
    pub regimes: Vec<RegimeLearningStatus>,
    pub computed_at: DateTime<Utc>,
}

impl RegimeWeightTable {
    pub fn weights_for(&self, regime: Regime) -> (RegimeWeights, WeightSource) {
        match self.regimes.iter().find(|s| s.regime == regime) {
            Some(status) if status.source == WeightSource::Empirical => {
                (status.active_weights, WeightSource::Empirical)
            }
            _ => (RegimeWeights::default_for(regime), WeightSource::Default),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived modifiers
// ---------------------------------------------------------------------------

/// Conditions whose additive modifier can be replaced by a measured win-rate delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierCondition {
    HighVolume,
    ConfirmedVolume,
    StrongAlignment,
    PerfectAlignment,
    StrongTrend,
    ChoppyTrend,
}

impl ModifierCondition {
    pub const ALL: [ModifierCondition; 6] = [
        ModifierCondition::HighVolume,
        ModifierCondition::ConfirmedVolume,
        ModifierCondition::StrongAlignment,
        ModifierCondition::PerfectAlignment,
        ModifierCondition::StrongTrend,
        ModifierCondition::ChoppyTrend,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ModifierCondition::HighVolume => "volume >= 1.5x",
            ModifierCondition::ConfirmedVolume => "volume >= 1.2x",
            ModifierCondition::StrongAlignment => "alignment >= 75",
            ModifierCondition::PerfectAlignment => "alignment = 100",
            ModifierCondition::StrongTrend => "ADX >= 25",
            ModifierCondition::ChoppyTrend => "ADX < 15",
        }
    }

    /// Fixed fallback value, in confidence points
    pub fn static_value(&self) -> f64 {
        match self {
            ModifierCondition::HighVolume => 5.0,
            ModifierCondition::ConfirmedVolume => 3.0,
            ModifierCondition::StrongAlignment => 5.0,
            ModifierCondition::PerfectAlignment => 8.0,
            ModifierCondition::StrongTrend => 5.0,
            ModifierCondition::ChoppyTrend => -8.0,
        }
    }

    pub fn holds(&self, volume_ratio: f64, alignment_score: f64, adx: f64) -> bool {
        match self {
            ModifierCondition::HighVolume => volume_ratio >= HIGH_VOLUME_RATIO,
            ModifierCondition::ConfirmedVolume => volume_ratio >= CONFIRMED_VOLUME_RATIO,
            ModifierCondition::StrongAlignment => alignment_score >= STRONG_ALIGNMENT,
            ModifierCondition::PerfectAlignment => alignment_score >= PERFECT_ALIGNMENT,
            ModifierCondition::StrongTrend => adx >= STRONG_TREND_ADX,
            ModifierCondition::ChoppyTrend => adx < MODERATE_TREND_ADX,
        }
    }

    pub fn holds_for(&self, snapshot: &ConditionSnapshot) -> bool {
        self.holds(
            snapshot.volume_ratio,
            snapshot.alignment_score,
            snapshot.trend_strength,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierSource {
    Static,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedModifier {
    pub condition: ModifierCondition,
    pub static_value: f64,
    /// win_rate_with - win_rate_without, in percentage points
    pub derived_value: Option<f64>,
    pub win_rate_with: Option<f64>,
    pub win_rate_without: Option<f64>,
    pub sample_with: usize,
    pub sample_without: usize,
    pub reliable: bool,
    /// Value callers should apply: derived when reliable, static otherwise
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedModifiersResult {
    pub modifiers: Vec<DerivedModifier>,
    pub reliable_count: usize,
    pub total: usize,
    /// At least half of the monitored modifiers are reliable
    pub ready: bool,
    pub computed_at: DateTime<Utc>,
}

impl DerivedModifiersResult {
    /// Effective value for a condition. Static unless the engine is ready and
    /// this particular modifier is reliable.
    pub fn value_for(&self, condition: ModifierCondition) -> (f64, ModifierSource) {
        if !self.ready {
            return (condition.static_value(), ModifierSource::Static);
        }
        match self.modifiers.iter().find(|m| m.condition == condition) {
            Some(m) if m.reliable => (m.value, ModifierSource::Derived),
            _ => (condition.static_value(), ModifierSource::Static),
        }
    }
}

// ---------------------------------------------------------------------------
// Confidence calibration
// ---------------------------------------------------------------------------

/// Fixed confidence ranges. The last range includes its upper bound.
pub const CALIBRATION_RANGES: [(f64, f64); 7] = [
    (15.0, 35.0),
    (35.0, 45.0),
    (45.0, 55.0),
    (55.0, 65.0),
    (65.0, 75.0),
    (75.0, 85.0),
    (85.0, 95.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationStatus {
    Calibrated,
    Overconfident,
    Underconfident,
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBucket {
    pub min: f64,
    pub max: f64,
    pub predicted: f64,
    pub wins: usize,
    pub losses: usize,
    pub sample_size: usize,
    /// round(wins / total * 100); None when the bucket is empty
    pub actual: Option<f64>,
    pub reliable: bool,
    pub status: CalibrationStatus,
}

impl CalibrationBucket {
    pub fn label(&self) -> String {
        format!("{:.0}-{:.0}", self.min, self.max)
    }

    pub fn contains(&self, confidence: f64) -> bool {
        let upper_inclusive = (self.max - MAX_SCORE).abs() < f64::EPSILON;
        confidence >= self.min
            && (confidence < self.max || (upper_inclusive && confidence <= self.max))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceCalibrationResult {
    pub total_resolved: usize,
    /// Enough resolved signals overall for any bucket to be used
    pub active: bool,
    pub buckets: Vec<CalibrationBucket>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedConfidence {
    pub original: f64,
    pub calibrated: f64,
    pub delta: f64,
    pub bucket: Option<String>,
    pub was_calibratable: bool,
}

impl CalibratedConfidence {
    pub fn passthrough(raw: f64, bucket: Option<String>) -> Self {
        Self {
            original: raw,
            calibrated: raw,
            delta: 0.0,
            bucket,
            was_calibratable: false,
        }
    }
}

impl ConfidenceCalibrationResult {
    pub fn bucket_for(&self, confidence: f64) -> Option<&CalibrationBucket> {
        self.buckets.iter().find(|b| b.contains(confidence))
    }

    /// Replace a raw confidence with its bucket's historical win rate.
    ///
    /// No blending: a calibrated bucket reports its actual win rate, anything
    /// else returns the raw value untouched.
    pub fn calibrate(&self, raw: f64) -> CalibratedConfidence {
        let Some(bucket) = self.bucket_for(raw) else {
            return CalibratedConfidence::passthrough(raw, None);
        };
        match (self.active && bucket.reliable, bucket.actual) {
            (true, Some(actual)) => {
                let calibrated = actual.clamp(MIN_SCORE, MAX_SCORE);
                CalibratedConfidence {
                    original: raw,
                    calibrated,
                    delta: calibrated - raw,
                    bucket: Some(bucket.label()),
                    was_calibratable: true,
                }
            }
            _ => CalibratedConfidence::passthrough(raw, Some(bucket.label())),
        }
    }
}

// ---------------------------------------------------------------------------
// Condition statistics (expectancy inputs)
// ---------------------------------------------------------------------------

/// Historical outcome statistics for one condition hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpiricalProbability {
    pub available: bool,
    /// 0.0 - 1.0
    pub win_rate: f64,
    /// Mean realized gain of winners, percent (positive)
    pub avg_win_pct: f64,
    /// Mean realized loss of losers, percent (positive magnitude)
    pub avg_loss_pct: f64,
    pub sample_size: usize,
    pub reliable: bool,
}

impl EmpiricalProbability {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            win_rate: 0.0,
            avg_win_pct: 0.0,
            avg_loss_pct: 0.0,
            sample_size: 0,
            reliable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionStatsTable {
    pub by_hash: HashMap<String, EmpiricalProbability>,
    pub computed_at: DateTime<Utc>,
}

impl ConditionStatsTable {
    pub fn lookup(&self, condition_hash: &str) -> EmpiricalProbability {
        self.by_hash
            .get(condition_hash)
            .cloned()
            .unwrap_or_else(EmpiricalProbability::unavailable)
    }
}

// ---------------------------------------------------------------------------
// Market breadth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadthSnapshot {
    /// Share of the basket trading above its moving average, 0-100
    pub pct_above_average: f64,
    pub sampled: usize,
    pub skipped: usize,
    pub computed_at: DateTime<Utc>,
}

impl BreadthSnapshot {
    /// Additive confidence modifier for a trade in `direction`
    pub fn modifier_for(&self, direction: Direction, config: &BreadthConfig) -> f64 {
        if self.sampled == 0 {
            return 0.0;
        }
        let strong = self.pct_above_average >= config.strong_pct;
        let weak = self.pct_above_average <= config.weak_pct;
        match direction {
            Direction::Bullish if strong => config.strong_bullish_modifier,
            Direction::Bullish if weak => config.weak_bullish_modifier,
            Direction::Bearish if strong => config.strong_bearish_modifier,
            Direction::Bearish if weak => config.weak_bearish_modifier,
            _ => 0.0,
        }
    }
}
