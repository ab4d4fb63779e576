// Confidence Scoring Model
// Direction is decided by a checklist vote; strength is a regime-weighted
// sum of five factor sub-scores. The two are computed independently.

use crate::regime::RegimeClassification;
use crate::signals::{
    FundamentalSummary, Growth, NewsSummary, PatternSummary, TechnicalSummary, Trend, Valuation,
    VolumeTrend,
};
use common::config::ScoringConfig;
use common::{
    Direction, Factor, FactorScores, Recommendation, Regime, RegimeWeights, WeightSource,
};
use serde::{Deserialize, Serialize};

/// Checks in the direction checklist
pub const CHECKLIST_SIZE: u32 = 5;

/// Factors reported on a confidence result
pub const TOP_FACTORS: usize = 3;

/// Outcome of the direction checklist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionVotes {
    pub bullish: u32,
    pub bearish: u32,
    /// Checks that abstained
    pub neutral: u32,
    pub direction: Direction,
    /// Dominant votes / checklist size * 100
    pub conviction: f64,
}

impl DirectionVotes {
    pub fn dominant(&self) -> u32 {
        self.bullish.max(self.bearish)
    }

    /// Side the directional sub-scores are oriented toward
    pub fn leans_bearish(&self) -> bool {
        self.bearish > self.bullish
    }
}

/// Direction model and strength model, reported separately
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfidenceResult {
    pub direction: Direction,
    pub conviction: f64,
    pub votes: DirectionVotes,
    /// Clamped regime-weighted strength, pre-modifier
    pub strength: f64,
    /// Sub-scores oriented toward the leaning side
    pub factors: FactorScores,
    pub regime: Regime,
    pub regime_confidence: f64,
    pub weights: RegimeWeights,
    pub weight_source: WeightSource,
    /// Largest weighted contributions first
    pub top_factors: Vec<FactorContribution>,
    pub recommendation: Recommendation,
}

/// One factor's share of the strength score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub factor: Factor,
    pub score: f64,
    pub weight: f64,
    /// weight * oriented sub-score
    pub contribution: f64,
}

/// The `n` largest weighted contributions, descending. Ties keep weight-vector order.
pub fn top_factors(factors: &FactorScores, weights: &RegimeWeights, n: usize) -> Vec<FactorContribution> {
    let mut contributions: Vec<FactorContribution> = Factor::ALL
        .iter()
        .map(|&factor| {
            let score = factors.get(factor);
            let weight = weights.get(factor);
            FactorContribution {
                factor,
                score,
                weight,
                contribution: weight * score,
            }
        })
        .collect();
    contributions.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
    contributions.truncate(n);
    contributions
}

fn vote(trend: Trend, votes: &mut DirectionVotes) {
    match trend {
        Direction::Bullish => votes.bullish += 1,
        Direction::Bearish => votes.bearish += 1,
        Direction::Neutral => votes.neutral += 1,
    }
}

/// Five-point checklist: MA trend, MACD trend, RSI healthy band, pattern bias, breakout.
pub fn direction_vote(technical: &TechnicalSummary, pattern: &PatternSummary) -> DirectionVotes {
    let mut votes = DirectionVotes {
        bullish: 0,
        bearish: 0,
        neutral: 0,
        direction: Direction::Neutral,
        conviction: 0.0,
    };

    vote(technical.ma_trend, &mut votes);
    vote(technical.macd_trend, &mut votes);

    let rsi = technical.rsi;
    let rsi_vote = if rsi > 50.0 && rsi < 70.0 {
        Trend::Bullish
    } else if rsi > 30.0 && rsi < 50.0 {
        Trend::Bearish
    } else {
        Trend::Neutral
    };
    vote(rsi_vote, &mut votes);

    vote(pattern.bias, &mut votes);

    let breakout_vote = match (pattern.breakout, pattern.breakdown) {
        (true, false) => Trend::Bullish,
        (false, true) => Trend::Bearish,
        _ => Trend::Neutral,
    };
    vote(breakout_vote, &mut votes);

    votes.direction = if votes.bullish >= 2 && votes.bullish > votes.bearish {
        Direction::Bullish
    } else if votes.bearish >= 2 && votes.bearish > votes.bullish {
        Direction::Bearish
    } else {
        Direction::Neutral
    };

    votes.conviction = votes.dominant() as f64 / CHECKLIST_SIZE as f64 * 100.0;
    votes
}

fn trend_points(trend: Trend, points: f64) -> f64 {
    trend.sign() * points
}

/// Technical alignment, bullish-oriented
pub fn technical_alignment_score(t: &TechnicalSummary) -> f64 {
    let mut score = 50.0;

    if t.rsi >= 70.0 {
        score -= 10.0;
    } else if t.rsi >= 55.0 {
        score += 10.0;
    } else if t.rsi < 40.0 {
        score -= 5.0;
    }

    score += trend_points(t.macd_trend, 8.0);
    score += trend_points(t.ma_trend, 8.0);
    if t.macd_trend == t.ma_trend {
        score += trend_points(t.ma_trend, 7.0);
    }

    let bullish_frames = t.timeframes.count(Trend::Bullish);
    if bullish_frames == 3 {
        score += 15.0;
    } else if t.timeframes.count(Trend::Bearish) == 3 {
        score -= 15.0;
    } else if bullish_frames == 2 {
        score += 5.0;
    }

    score.clamp(0.0, 100.0)
}

/// Pattern strength, bullish-oriented
pub fn pattern_strength_score(p: &PatternSummary) -> f64 {
    let mut score = 50.0 + trend_points(p.bias, 0.3 * p.confidence);
    if p.breakout {
        score += 15.0;
    }
    if p.breakdown {
        score -= 15.0;
    }
    score += trend_points(p.trend_direction, 0.1 * p.trend_strength);
    score.clamp(0.0, 100.0)
}

/// News sentiment, bullish-oriented
pub fn news_sentiment_score(n: &NewsSummary) -> f64 {
    (50.0 + 35.0 * n.sentiment_score * n.impact.factor()).clamp(0.0, 100.0)
}

/// Volume confirmation. Not directional: heavy volume confirms either side.
pub fn volume_confirmation_score(t: &TechnicalSummary) -> f64 {
    let base: f64 = match t.volume_ratio {
        r if r >= 2.0 => 85.0,
        r if r >= 1.5 => 75.0,
        r if r >= 1.2 => 65.0,
        r if r >= 0.8 => 50.0,
        _ => 35.0,
    };
    let adjust = match t.volume_trend {
        VolumeTrend::Increasing => 5.0,
        VolumeTrend::Stable => 0.0,
        VolumeTrend::Decreasing => -5.0,
    };
    (base + adjust).clamp(0.0, 100.0)
}

/// Fundamental strength, bullish-oriented
pub fn fundamental_strength_score(f: &FundamentalSummary) -> f64 {
    let mut score: f64 = 50.0;
    score += match f.valuation {
        Valuation::Undervalued => 15.0,
        Valuation::Overvalued => -15.0,
        Valuation::Fair | Valuation::Unknown => 0.0,
    };
    score += match f.growth {
        Growth::Strong => 15.0,
        Growth::Moderate => 5.0,
        Growth::Weak => -10.0,
        Growth::Unknown => 0.0,
    };
    if let (Some(pe), Some(sector_pe)) = (f.pe_ratio, f.sector_pe) {
        if pe > 0.0 && sector_pe > 0.0 {
            if pe < 0.8 * sector_pe {
                score += 5.0;
            } else if pe > 1.2 * sector_pe {
                score -= 5.0;
            }
        }
    }
    score.clamp(0.0, 100.0)
}

/// Compute all five sub-scores and mirror the directional ones for a bearish lean
pub fn factor_scores(
    technical: &TechnicalSummary,
    pattern: &PatternSummary,
    news: &NewsSummary,
    fundamentals: &FundamentalSummary,
    bearish: bool,
) -> FactorScores {
    let orient = |s: f64| if bearish { 100.0 - s } else { s };
    FactorScores {
        technical: orient(technical_alignment_score(technical)),
        pattern: orient(pattern_strength_score(pattern)),
        volume: volume_confirmation_score(technical),
        news: orient(news_sentiment_score(news)),
        fundamental: orient(fundamental_strength_score(fundamentals)),
    }
}

/// Regime-weighted strength, damped toward 50 when the dominant side has a single vote
pub fn strength_score(
    factors: &FactorScores,
    weights: &RegimeWeights,
    dominant_votes: u32,
    config: &ScoringConfig,
) -> f64 {
    let mut strength = weights.weighted_score(factors);
    if dominant_votes <= 1 {
        strength = 50.0 + (strength - 50.0) * (1.0 - config.weak_vote_damping);
    }
    strength.clamp(config.min_score, config.max_score)
}

pub fn recommendation(confidence: f64, direction: Direction, config: &ScoringConfig) -> Recommendation {
    if confidence < config.wait_below {
        return Recommendation::Wait;
    }
    if confidence >= config.action_threshold {
        match direction {
            Direction::Bullish => return Recommendation::Buy,
            Direction::Bearish => return Recommendation::Sell,
            Direction::Neutral => {}
        }
    }
    if confidence < config.hold_floor {
        Recommendation::Wait
    } else {
        Recommendation::Hold
    }
}

pub struct ConfidenceModel {
    config: ScoringConfig,
}

impl ConfidenceModel {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(
        &self,
        technical: &TechnicalSummary,
        pattern: &PatternSummary,
        news: &NewsSummary,
        fundamentals: &FundamentalSummary,
        regime: &RegimeClassification,
    ) -> SplitConfidenceResult {
        let votes = direction_vote(technical, pattern);
        let factors = factor_scores(technical, pattern, news, fundamentals, votes.leans_bearish());
        let strength = strength_score(&factors, &regime.weights, votes.dominant(), &self.config);
        let top_factors = top_factors(&factors, &regime.weights, TOP_FACTORS);

        SplitConfidenceResult {
            direction: votes.direction,
            conviction: votes.conviction,
            recommendation: recommendation(strength, votes.direction, &self.config),
            votes,
            strength,
            factors,
            regime: regime.regime,
            regime_confidence: regime.confidence,
            weights: regime.weights,
            weight_source: regime.weight_source,
            top_factors,
        }
    }
}

impl Default for ConfidenceModel {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
