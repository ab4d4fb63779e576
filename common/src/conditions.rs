// Condition buckets and the condition hash used as the key for empirical lookups

use crate::error::InputError;
use crate::types::Regime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;

pub const STRONG_TREND_ADX: f64 = 25.0;
pub const MODERATE_TREND_ADX: f64 = 15.0;
pub const HIGH_VOLUME_RATIO: f64 = 1.5;
pub const CONFIRMED_VOLUME_RATIO: f64 = 1.2;
pub const NORMAL_VOLUME_RATIO: f64 = 0.8;
pub const PERFECT_ALIGNMENT: f64 = 100.0;
pub const STRONG_ALIGNMENT: f64 = 75.0;
pub const MODERATE_ALIGNMENT: f64 = 50.0;

/// Discretized trend strength (ADX)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendBucket {
    Strong,
    Moderate,
    Choppy,
}

impl TrendBucket {
    pub fn from_adx(adx: f64) -> Self {
        if adx >= STRONG_TREND_ADX {
            TrendBucket::Strong
        } else if adx >= MODERATE_TREND_ADX {
            TrendBucket::Moderate
        } else {
            TrendBucket::Choppy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendBucket::Strong => "STRONG",
            TrendBucket::Moderate => "MODERATE",
            TrendBucket::Choppy => "CHOPPY",
        }
    }
}

/// Discretized volume ratio (current / average)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeBucket {
    High,
    Confirmed,
    Normal,
    Low,
}

impl VolumeBucket {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= HIGH_VOLUME_RATIO {
            VolumeBucket::High
        } else if ratio >= CONFIRMED_VOLUME_RATIO {
            VolumeBucket::Confirmed
        } else if ratio >= NORMAL_VOLUME_RATIO {
            VolumeBucket::Normal
        } else {
            VolumeBucket::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeBucket::High => "HIGH",
            VolumeBucket::Confirmed => "CONFIRMED",
            VolumeBucket::Normal => "NORMAL",
            VolumeBucket::Low => "LOW",
        }
    }
}

/// Discretized multi-timeframe alignment score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlignmentBucket {
    Perfect,
    Strong,
    Moderate,
    Weak,
}

impl AlignmentBucket {
    pub fn from_score(score: f64) -> Self {
        if score >= PERFECT_ALIGNMENT {
            AlignmentBucket::Perfect
        } else if score >= STRONG_ALIGNMENT {
            AlignmentBucket::Strong
        } else if score >= MODERATE_ALIGNMENT {
            AlignmentBucket::Moderate
        } else {
            AlignmentBucket::Weak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentBucket::Perfect => "PERFECT",
            AlignmentBucket::Strong => "STRONG",
            AlignmentBucket::Moderate => "MODERATE",
            AlignmentBucket::Weak => "WEAK",
        }
    }
}

macro_rules! impl_bucket_from_str {
    ($ty:ident, $kind:literal, [$($variant:ident),+]) => {
        impl FromStr for $ty {
            type Err = InputError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s == $ty::$variant.as_str() {
                        return Ok($ty::$variant);
                    }
                )+
                Err(InputError::UnknownLabel {
                    kind: $kind,
                    label: s.to_string(),
                })
            }
        }
    };
}

impl_bucket_from_str!(TrendBucket, "trend bucket", [Strong, Moderate, Choppy]);
impl_bucket_from_str!(VolumeBucket, "volume bucket", [High, Confirmed, Normal, Low]);
impl_bucket_from_str!(AlignmentBucket, "alignment bucket", [Perfect, Strong, Moderate, Weak]);

/// Deterministic key for "setups like this one".
///
/// First 16 hex chars of SHA-256 over `regime|alignment|trend|volume`.
pub fn condition_hash(
    regime: Regime,
    alignment: AlignmentBucket,
    trend: TrendBucket,
    volume: VolumeBucket,
) -> String {
    let key = format!(
        "{}|{}|{}|{}",
        regime.as_str(),
        alignment.as_str(),
        trend.as_str(),
        volume.as_str()
    );
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Market conditions captured when a signal is emitted. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSnapshot {
    pub regime: Regime,
    pub trend_strength: f64,
    pub trend_bucket: TrendBucket,
    pub volume_ratio: f64,
    pub volume_bucket: VolumeBucket,
    pub alignment_score: f64,
    pub alignment_bucket: AlignmentBucket,
    pub condition_hash: String,
}

impl ConditionSnapshot {
    pub fn capture(regime: Regime, trend_strength: f64, volume_ratio: f64, alignment_score: f64) -> Self {
        let trend_bucket = TrendBucket::from_adx(trend_strength);
        let volume_bucket = VolumeBucket::from_ratio(volume_ratio);
        let alignment_bucket = AlignmentBucket::from_score(alignment_score);
        Self {
            regime,
            trend_strength,
            trend_bucket,
            volume_ratio,
            volume_bucket,
            alignment_score,
            alignment_bucket,
            condition_hash: condition_hash(regime, alignment_bucket, trend_bucket, volume_bucket),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(TrendBucket::from_adx(25.0), TrendBucket::Strong);
        assert_eq!(TrendBucket::from_adx(24.9), TrendBucket::Moderate);
        assert_eq!(TrendBucket::from_adx(14.9), TrendBucket::Choppy);
        assert_eq!(VolumeBucket::from_ratio(1.5), VolumeBucket::High);
        assert_eq!(VolumeBucket::from_ratio(1.2), VolumeBucket::Confirmed);
        assert_eq!(VolumeBucket::from_ratio(0.5), VolumeBucket::Low);
        assert_eq!(AlignmentBucket::from_score(100.0), AlignmentBucket::Perfect);
        assert_eq!(AlignmentBucket::from_score(80.0), AlignmentBucket::Strong);
        assert_eq!(AlignmentBucket::from_score(10.0), AlignmentBucket::Weak);
    }

    #[test]
    fn test_condition_hash_is_deterministic() {
        let a = ConditionSnapshot::capture(Regime::TrendingStrong, 28.0, 1.6, 80.0);
        let b = ConditionSnapshot::capture(Regime::TrendingStrong, 31.0, 1.9, 90.0);
        assert_eq!(a.condition_hash, b.condition_hash);
        assert_eq!(a.condition_hash.len(), 16);

        let c = ConditionSnapshot::capture(Regime::Range, 28.0, 1.6, 80.0);
        assert_ne!(a.condition_hash, c.condition_hash);
    }

    #[test]
    fn test_bucket_labels_parse_back() {
        assert_eq!("CHOPPY".parse::<TrendBucket>().unwrap(), TrendBucket::Choppy);
        assert_eq!("CONFIRMED".parse::<VolumeBucket>().unwrap(), VolumeBucket::Confirmed);
        assert!("SIDEWAYS".parse::<AlignmentBucket>().is_err());
    }
}
