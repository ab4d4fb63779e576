//! Engine configuration
//!
//! Every section has a `Default` carrying the production constants, so a
//! partial TOML file only needs to name the values it overrides.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Overall engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub modifiers: ModifierConfig,
    pub gate: GateConfig,
    pub expectancy: ExpectancyConfig,
    pub calibration: CalibrationConfig,
    pub regime_learning: RegimeLearningConfig,
    pub resolver: ResolverConfig,
    pub levels: LevelsConfig,
    pub cache: CacheConfig,
    pub breadth: BreadthConfig,
    pub worker: WorkerConfig,
}

/// Strength model and recommendation thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub min_score: f64,
    pub max_score: f64,

    /// Strength at or above this with a direction becomes BUY/SELL
    pub action_threshold: f64,

    /// Strength below this is always WAIT
    pub wait_below: f64,

    /// [wait_below, hold_floor) is WAIT, the rest HOLD
    pub hold_floor: f64,

    /// Pull toward 50 applied when the dominant side has a single vote
    pub weak_vote_damping: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_score: 15.0,
            max_score: 95.0,
            action_threshold: 65.0,
            wait_below: 35.0,
            hold_floor: 50.0,
            weak_vote_damping: 0.85,
        }
    }
}

/// Data-derived and static-only modifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierConfig {
    /// Minimum decisive signals on BOTH sides before a derived value is trusted
    pub min_group_samples: usize,

    /// Share of reliable modifiers required before the engine is ready
    pub ready_fraction: f64,

    pub pattern_confluence: f64,

    /// Relative strength vs sector (percent) that triggers the sector modifier
    pub sector_threshold_pct: f64,
    pub sector_modifier: f64,

    pub conflict_low: f64,
    pub conflict_medium: f64,
    pub conflict_high: f64,
}

impl Default for ModifierConfig {
    fn default() -> Self {
        Self {
            min_group_samples: 30,
            ready_fraction: 0.5,
            pattern_confluence: 4.0,
            sector_threshold_pct: 5.0,
            sector_modifier: 3.0,
            conflict_low: -2.0,
            conflict_medium: -5.0,
            conflict_high: -10.0,
        }
    }
}

/// Selectivity gate thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub strong_adx: f64,

    /// Lower ADX accepted when the last three readings are strictly rising
    pub accelerating_adx: f64,

    pub min_alignment: f64,
    pub min_volume_ratio: f64,

    /// Maximum direction-signed distance from the reference average, percent
    pub max_extension_pct: f64,

    /// Earnings within this many days (inclusive) blocks entry
    pub earnings_window_days: i64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            strong_adx: 25.0,
            accelerating_adx: 18.0,
            min_alignment: 65.0,
            min_volume_ratio: 1.2,
            max_extension_pct: 10.0,
            earnings_window_days: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectancyConfig {
    pub min_reliable_samples: usize,
    pub min_risk_reward: f64,
}

impl Default for ExpectancyConfig {
    fn default() -> Self {
        Self {
            min_reliable_samples: 50,
            min_risk_reward: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Resolved decisive signals required before any bucket is applied
    pub min_total_resolved: usize,
    pub min_per_bucket: usize,

    /// |actual - predicted| at or below this is CALIBRATED
    pub tolerance: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_total_resolved: 100,
            min_per_bucket: 20,
            tolerance: 8.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeLearningConfig {
    /// Decisive signals before empirical weights are computed
    pub min_learning_samples: usize,

    /// Decisive signals before empirical weights replace the defaults
    pub min_active_samples: usize,

    pub weight_floor: f64,
}

impl Default for RegimeLearningConfig {
    fn default() -> Self {
        Self {
            min_learning_samples: 30,
            min_active_samples: 100,
            weight_floor: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Bars after the signal date before an unresolved signal expires
    pub horizon_bars: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { horizon_bars: 7 }
    }
}

/// Target/stop placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelsConfig {
    pub target_atr_multiple: f64,
    pub stop_atr_multiple: f64,

    /// Used when ATR is missing or non-positive
    pub fallback_target_pct: f64,
    pub fallback_stop_pct: f64,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            target_atr_multiple: 2.0,
            stop_atr_multiple: 1.5,
            fallback_target_pct: 4.0,
            fallback_stop_pct: 2.0,
        }
    }
}

/// Time-to-live of each learned-state cache, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub regime_weights_ttl_secs: u64,
    pub derived_modifiers_ttl_secs: u64,
    pub calibration_ttl_secs: u64,
    pub condition_stats_ttl_secs: u64,
    pub breadth_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            regime_weights_ttl_secs: 3600,
            derived_modifiers_ttl_secs: 7200,
            calibration_ttl_secs: 3600,
            condition_stats_ttl_secs: 3600,
            breadth_ttl_secs: 4 * 3600,
        }
    }
}

/// Market breadth overlay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreadthConfig {
    /// Reference basket
    pub basket: Vec<String>,
    pub average_period: usize,

    pub strong_pct: f64,
    pub weak_pct: f64,

    pub strong_bullish_modifier: f64,
    pub strong_bearish_modifier: f64,
    pub weak_bullish_modifier: f64,
    pub weak_bearish_modifier: f64,
}

impl Default for BreadthConfig {
    fn default() -> Self {
        let basket = [
            "SPY", "QQQ", "IWM", "DIA", "XLK", "XLF", "XLE", "XLV", "XLI", "XLY", "XLP", "XLU",
        ];
        Self {
            basket: basket.iter().map(|s| s.to_string()).collect(),
            average_period: 50,
            strong_pct: 70.0,
            weak_pct: 30.0,
            strong_bullish_modifier: 3.0,
            strong_bearish_modifier: -3.0,
            weak_bullish_modifier: -5.0,
            weak_bearish_modifier: 3.0,
        }
    }
}

/// Offline worker loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub interval_secs: u64,
    pub log_level: String,

    /// Directory holding `{SYMBOL}.json` price histories
    pub price_dir: String,

    pub max_db_connections: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 900,
            log_level: "info".to_string(),
            price_dir: "data/prices".to_string(),
            max_db_connections: 5,
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<EngineConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: EngineConfig =
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

/// Load configuration, falling back to defaults when the file does not exist
pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<EngineConfig> {
    if path.as_ref().exists() {
        load_config(path)
    } else {
        Ok(EngineConfig::default())
    }
}

/// Save configuration to TOML file
pub fn save_config(config: &EngineConfig, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path.as_ref(), content)
        .with_context(|| format!("writing config {}", path.as_ref().display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.resolver.horizon_bars, 7);
        assert_eq!(config.gate.strong_adx, 25.0);
        assert_eq!(config.calibration.min_total_resolved, 100);
        assert_eq!(config.breadth.average_period, 50);
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: EngineConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config.expectancy.min_risk_reward, deserialized.expectancy.min_risk_reward);
        assert_eq!(config.breadth.basket, deserialized.breadth.basket);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [gate]
            min_alignment = 70.0

            [worker]
            interval_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.gate.min_alignment, 70.0);
        assert_eq!(config.gate.min_volume_ratio, 1.2);
        assert_eq!(config.worker.interval_secs, 60);
        assert_eq!(config.cache.breadth_ttl_secs, 14400);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("engine-{}.toml", uuid::Uuid::new_v4()));
        let mut config = EngineConfig::default();
        config.resolver.horizon_bars = 10;

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.resolver.horizon_bars, 10);

        std::fs::remove_file(&path).unwrap();
        assert_eq!(load_or_default(&path).unwrap().resolver.horizon_bars, 7);
    }
}
