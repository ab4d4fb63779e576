// Confidence Modifiers
// Additive adjustments on top of the strength score. Volume, alignment and
// trend modifiers switch to measured values once the derived engine is ready.

use crate::scoring::FactorContribution;
use crate::signals::{FundamentalSummary, PatternSummary};
use common::config::{BreadthConfig, ModifierConfig, ScoringConfig};
use common::{
    BreadthSnapshot, ConditionSnapshot, DerivedModifiersResult, Direction, ModifierCondition,
    ModifierSnapshot, ModifierSource,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Disagreement between fundamentals and the technical direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictSeverity {
    None,
    Low,
    Medium,
    High,
}

/// Grade conflict from the fundamental sub-score oriented toward `direction`
pub fn conflict_severity(direction: Direction, oriented_fundamental: f64) -> ConflictSeverity {
    if !direction.is_actionable() {
        return ConflictSeverity::None;
    }
    match oriented_fundamental {
        s if s >= 45.0 => ConflictSeverity::None,
        s if s >= 35.0 => ConflictSeverity::Low,
        s if s >= 25.0 => ConflictSeverity::Medium,
        _ => ConflictSeverity::High,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedModifier {
    pub name: String,
    pub value: f64,
    pub source: ModifierSource,
}

/// Post-modifier confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    /// Pre-modifier strength
    pub base_confidence: f64,
    pub modifiers: ModifierSnapshot,
    pub applied: Vec<AppliedModifier>,
    /// clamp(base + sum of modifiers)
    pub confidence: f64,
    pub conflict: ConflictSeverity,
    /// Largest factor contributions behind the base confidence
    pub top_factors: Vec<FactorContribution>,
}

impl ConfidenceResult {
    pub fn with_top_factors(mut self, top_factors: Vec<FactorContribution>) -> Self {
        self.top_factors = top_factors;
        self
    }
}

pub struct ModifierEngine {
    config: ModifierConfig,
    breadth: BreadthConfig,
    bounds: (f64, f64),
}

impl ModifierEngine {
    pub fn new(config: ModifierConfig, breadth: BreadthConfig, scoring: &ScoringConfig) -> Self {
        Self {
            config,
            breadth,
            bounds: (scoring.min_score, scoring.max_score),
        }
    }

    /// Strongest matching condition of a family, resolved to its effective value
    fn family(
        &self,
        family: [ModifierCondition; 2],
        conditions: &ConditionSnapshot,
        derived: Option<&DerivedModifiersResult>,
    ) -> Option<(ModifierCondition, f64, ModifierSource)> {
        let condition = family.into_iter().find(|c| c.holds_for(conditions))?;
        let (value, source) = match derived {
            Some(result) => result.value_for(condition),
            None => (condition.static_value(), ModifierSource::Static),
        };
        Some((condition, value, source))
    }

    fn conflict_value(&self, severity: ConflictSeverity) -> f64 {
        match severity {
            ConflictSeverity::None => 0.0,
            ConflictSeverity::Low => self.config.conflict_low,
            ConflictSeverity::Medium => self.config.conflict_medium,
            ConflictSeverity::High => self.config.conflict_high,
        }
    }

    fn pattern_confluence(&self, direction: Direction, pattern: &PatternSummary) -> f64 {
        let confirmed = match direction {
            Direction::Bullish => pattern.bias == Direction::Bullish && pattern.breakout,
            Direction::Bearish => pattern.bias == Direction::Bearish && pattern.breakdown,
            Direction::Neutral => false,
        };
        if confirmed {
            self.config.pattern_confluence
        } else {
            0.0
        }
    }

    fn sector(&self, direction: Direction, fundamentals: &FundamentalSummary) -> f64 {
        let Some(rs) = fundamentals.sector_relative_strength else {
            return 0.0;
        };
        let signed = rs * direction.sign();
        if !direction.is_actionable() {
            0.0
        } else if signed >= self.config.sector_threshold_pct {
            self.config.sector_modifier
        } else if signed <= -self.config.sector_threshold_pct {
            -self.config.sector_modifier
        } else {
            0.0
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        base_confidence: f64,
        direction: Direction,
        oriented_fundamental: f64,
        conditions: &ConditionSnapshot,
        pattern: &PatternSummary,
        fundamentals: &FundamentalSummary,
        derived: Option<&DerivedModifiersResult>,
        breadth: Option<&BreadthSnapshot>,
    ) -> ConfidenceResult {
        let mut snapshot = ModifierSnapshot::default();
        let mut applied = Vec::new();

        let families = [
            [ModifierCondition::HighVolume, ModifierCondition::ConfirmedVolume],
            [ModifierCondition::PerfectAlignment, ModifierCondition::StrongAlignment],
            [ModifierCondition::StrongTrend, ModifierCondition::ChoppyTrend],
        ];
        for (index, family) in families.into_iter().enumerate() {
            if let Some((condition, value, source)) = self.family(family, conditions, derived) {
                match index {
                    0 => snapshot.volume = value,
                    1 => snapshot.multi_timeframe = value,
                    _ => snapshot.trend_strength = value,
                }
                applied.push(AppliedModifier {
                    name: condition.label().to_string(),
                    value,
                    source,
                });
            }
        }

        let conflict = conflict_severity(direction, oriented_fundamental);
        snapshot.pattern_confluence = self.pattern_confluence(direction, pattern);
        snapshot.fundamental_conflict = self.conflict_value(conflict);
        snapshot.sector = self.sector(direction, fundamentals);
        snapshot.market_breadth = breadth
            .map(|b| b.modifier_for(direction, &self.breadth))
            .unwrap_or(0.0);

        for (name, value) in [
            ("pattern confluence", snapshot.pattern_confluence),
            ("fundamental conflict", snapshot.fundamental_conflict),
            ("sector", snapshot.sector),
            ("market breadth", snapshot.market_breadth),
        ] {
            if value != 0.0 {
                applied.push(AppliedModifier {
                    name: name.to_string(),
                    value,
                    source: ModifierSource::Static,
                });
            }
        }

        let (min, max) = self.bounds;
        let confidence = (base_confidence + snapshot.total()).clamp(min, max);
        debug!(
            "Modifiers {:+.1} on base {:.1} -> {:.1} ({} applied)",
            snapshot.total(),
            base_confidence,
            confidence,
            applied.len()
        );

        ConfidenceResult {
            base_confidence,
            modifiers: snapshot,
            applied,
            confidence,
            conflict,
            top_factors: Vec::new(),
        }
    }
}

impl Default for ModifierEngine {
    fn default() -> Self {
        Self::new(
            ModifierConfig::default(),
            BreadthConfig::default(),
            &ScoringConfig::default(),
        )
    }
}
