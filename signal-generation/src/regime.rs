// Regime Classifier
// Labels current conditions and picks the factor weight vector for scoring

use crate::signals::{NewsSummary, TechnicalSummary};
use common::conditions::{MODERATE_TREND_ADX, STRONG_TREND_ADX, STRONG_ALIGNMENT};
use common::{Regime, RegimeWeightTable, RegimeWeights, WeightSource};
use serde::{Deserialize, Serialize};
use tracing::debug;

const VOLATILE_ATR_MULTIPLE: f64 = 2.0;
const VOLATILE_VOLUME_RATIO: f64 = 1.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeClassification {
    pub regime: Regime,
    /// How clearly the inputs fit the label, 0-100
    pub confidence: f64,
    pub weights: RegimeWeights,
    pub weight_source: WeightSource,
    pub reason: String,
}

pub struct RegimeClassifier;

impl RegimeClassifier {
    /// First matching rule wins: breaking news, volatility, then trend strength.
    pub fn label(technical: &TechnicalSummary, news: &NewsSummary) -> (Regime, f64, String) {
        let adx = technical.adx;

        let (regime, mut confidence, reason) = if news.has_high_impact_breaking() {
            (
                Regime::EventDriven,
                90.0,
                "high-impact breaking news".to_string(),
            )
        } else if technical.atr_mean > 0.0
            && technical.atr >= VOLATILE_ATR_MULTIPLE * technical.atr_mean
            && technical.volume_ratio >= VOLATILE_VOLUME_RATIO
        {
            (
                Regime::Volatile,
                80.0,
                format!(
                    "ATR {:.2} vs mean {:.2}, volume {:.2}x",
                    technical.atr, technical.atr_mean, technical.volume_ratio
                ),
            )
        } else if adx >= STRONG_TREND_ADX {
            (
                Regime::TrendingStrong,
                (65.0 + 1.5 * (adx - STRONG_TREND_ADX)).min(95.0),
                format!("ADX {:.1} >= {}", adx, STRONG_TREND_ADX),
            )
        } else if adx >= MODERATE_TREND_ADX {
            (
                Regime::TrendingWeak,
                60.0,
                format!("ADX {:.1} >= {}", adx, MODERATE_TREND_ADX),
            )
        } else {
            (
                Regime::Range,
                (55.0 + 2.0 * (MODERATE_TREND_ADX - adx)).min(85.0),
                format!("ADX {:.1} < {}", adx, MODERATE_TREND_ADX),
            )
        };

        let trending = matches!(regime, Regime::TrendingStrong | Regime::TrendingWeak);
        if trending && technical.alignment_score >= STRONG_ALIGNMENT {
            confidence = (confidence + 5.0).min(95.0);
        }

        (regime, confidence, reason)
    }

    /// Classify and attach weights. Empirical weights are used only when a
    /// warm table marks the regime as reliable.
    pub fn classify(
        technical: &TechnicalSummary,
        news: &NewsSummary,
        learned: Option<&RegimeWeightTable>,
    ) -> RegimeClassification {
        let (regime, confidence, reason) = Self::label(technical, news);
        let (weights, weight_source) = match learned {
            Some(table) => table.weights_for(regime),
            None => (RegimeWeights::default_for(regime), WeightSource::Default),
        };

        debug!(
            "Regime {} ({:.0}% confidence, {:?} weights): {}",
            regime, confidence, weight_source, reason
        );

        RegimeClassification {
            regime,
            confidence,
            weights,
            weight_source,
            reason,
        }
    }
}
