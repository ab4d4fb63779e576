// Signal inputs
// Immutable summaries produced by upstream analysis, validated at the boundary

use chrono::NaiveDate;
use common::error::{ensure_finite, ensure_range};
use common::{Direction, InputError};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// Trend reading of one indicator or timeframe
pub type Trend = Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeTrend {
    Increasing,
    #[default]
    Stable,
    Decreasing,
}

/// Momentum divergence between price and oscillator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Divergence {
    #[default]
    None,
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeTrends {
    pub daily: Trend,
    pub weekly: Trend,
    pub monthly: Trend,
}

impl Default for TimeframeTrends {
    fn default() -> Self {
        Self {
            daily: Trend::Neutral,
            weekly: Trend::Neutral,
            monthly: Trend::Neutral,
        }
    }
}

impl TimeframeTrends {
    pub fn count(&self, trend: Trend) -> usize {
        [self.daily, self.weekly, self.monthly]
            .iter()
            .filter(|t| **t == trend)
            .count()
    }
}

/// Already-computed indicator readings for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSummary {
    pub price: Decimal,
    pub rsi: f64,
    pub macd_trend: Trend,
    pub ma_trend: Trend,
    /// Current volume / average volume
    pub volume_ratio: f64,
    pub volume_trend: VolumeTrend,
    pub support: Option<Decimal>,
    pub resistance: Option<Decimal>,
    pub atr: f64,
    /// Mean ATR over the lookback window
    pub atr_mean: f64,
    pub adx: f64,
    /// Recent ADX readings, oldest first, ending with the current one
    pub adx_history: Vec<f64>,
    /// 50-period average used for extension and breadth
    pub reference_average: Option<Decimal>,
    pub divergence: Divergence,
    pub timeframes: TimeframeTrends,
    /// Multi-timeframe alignment, 0-100
    pub alignment_score: f64,
}

impl Default for TechnicalSummary {
    fn default() -> Self {
        Self {
            price: Decimal::ZERO,
            rsi: 50.0,
            macd_trend: Trend::Neutral,
            ma_trend: Trend::Neutral,
            volume_ratio: 1.0,
            volume_trend: VolumeTrend::Stable,
            support: None,
            resistance: None,
            atr: 0.0,
            atr_mean: 0.0,
            adx: 0.0,
            adx_history: Vec::new(),
            reference_average: None,
            divergence: Divergence::None,
            timeframes: TimeframeTrends::default(),
            alignment_score: 50.0,
        }
    }
}

impl TechnicalSummary {
    pub fn price_f64(&self) -> f64 {
        self.price.to_f64().unwrap_or(0.0)
    }

    /// ADX readings strictly rising over the last three observations
    pub fn adx_rising(&self) -> bool {
        match self.adx_history.as_slice() {
            [.., a, b, c] => a < b && b < c,
            _ => false,
        }
    }

    /// Direction-signed percent distance from the reference average
    pub fn extension_pct(&self, direction: Direction) -> Option<f64> {
        let average = self.reference_average?.to_f64()?;
        if average <= 0.0 {
            return None;
        }
        let raw = (self.price_f64() - average) / average * 100.0;
        Some(match direction {
            Direction::Bearish => -raw,
            _ => raw,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub primary_pattern: Option<String>,
    pub bias: Trend,
    /// 0-100
    pub confidence: f64,
    pub trend_direction: Trend,
    /// 0-100
    pub trend_strength: f64,
    pub breakout: bool,
    pub breakdown: bool,
}

impl Default for PatternSummary {
    fn default() -> Self {
        Self {
            primary_pattern: None,
            bias: Trend::Neutral,
            confidence: 0.0,
            trend_direction: Trend::Neutral,
            trend_strength: 0.0,
            breakout: false,
            breakdown: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Impact {
    #[default]
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn factor(&self) -> f64 {
        match self {
            Impact::High => 1.0,
            Impact::Medium => 0.7,
            Impact::Low => 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub impact: Impact,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsSummary {
    /// -1.0 (very bearish) to 1.0 (very bullish)
    pub sentiment_score: f64,
    pub impact: Impact,
    pub breaking: Vec<Headline>,
}

impl NewsSummary {
    pub fn has_high_impact_breaking(&self) -> bool {
        self.breaking.iter().any(|h| h.impact == Impact::High)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Valuation {
    Undervalued,
    Fair,
    Overvalued,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Growth {
    Strong,
    Moderate,
    Weak,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSummary {
    pub valuation: Valuation,
    pub growth: Growth,
    pub pe_ratio: Option<f64>,
    pub sector_pe: Option<f64>,
    /// Percent performance relative to the sector
    pub sector_relative_strength: Option<f64>,
}

/// One scoring request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRequest {
    pub symbol: String,
    pub date: NaiveDate,
    pub technical: TechnicalSummary,
    pub pattern: PatternSummary,
    pub news: NewsSummary,
    pub fundamentals: FundamentalSummary,
    /// Calendar days until the next earnings report, when known
    pub days_to_earnings: Option<i64>,
}

impl SignalRequest {
    /// Reject malformed input before any scoring happens
    pub fn validate(&self) -> Result<(), InputError> {
        if self.symbol.trim().is_empty() {
            return Err(InputError::EmptySymbol);
        }

        let t = &self.technical;
        if t.price <= Decimal::ZERO {
            return Err(InputError::OutOfRange {
                field: "price",
                value: t.price_f64(),
                expected: "> 0",
            });
        }
        ensure_range("rsi", t.rsi, 0.0, 100.0, "0-100")?;
        ensure_range("volume_ratio", t.volume_ratio, 0.0, f64::MAX, ">= 0")?;
        ensure_range("atr", t.atr, 0.0, f64::MAX, ">= 0")?;
        ensure_range("atr_mean", t.atr_mean, 0.0, f64::MAX, ">= 0")?;
        ensure_range("adx", t.adx, 0.0, 100.0, "0-100")?;
        for reading in &t.adx_history {
            ensure_range("adx_history", *reading, 0.0, 100.0, "0-100")?;
        }
        ensure_range("alignment_score", t.alignment_score, 0.0, 100.0, "0-100")?;

        let p = &self.pattern;
        ensure_range("pattern.confidence", p.confidence, 0.0, 100.0, "0-100")?;
        ensure_range("pattern.trend_strength", p.trend_strength, 0.0, 100.0, "0-100")?;

        ensure_range("news.sentiment_score", self.news.sentiment_score, -1.0, 1.0, "-1..1")?;

        let f = &self.fundamentals;
        for (field, value) in [
            ("pe_ratio", f.pe_ratio),
            ("sector_pe", f.sector_pe),
            ("sector_relative_strength", f.sector_relative_strength),
        ] {
            if let Some(v) = value {
                ensure_finite(field, v)?;
            }
        }
        Ok(())
    }
}
