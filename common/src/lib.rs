// Shared types for the signal confidence engine
// Domain records, learned state, caches, persistence and configuration

pub mod cache;
pub mod conditions;
pub mod config;
pub mod error;
pub mod learned;
pub mod postgres;
pub mod store;
pub mod types;

pub use cache::{LearnedState, TtlCell};
pub use conditions::{
    condition_hash, AlignmentBucket, ConditionSnapshot, TrendBucket, VolumeBucket,
};
pub use config::{load_config, load_or_default, save_config, EngineConfig};
pub use error::{InputError, TransitionError};
pub use learned::{
    BreadthSnapshot, CalibratedConfidence, CalibrationBucket, CalibrationStatus,
    ConditionStatsTable, ConfidenceCalibrationResult, DerivedModifier, DerivedModifiersResult,
    EmpiricalProbability, ModifierCondition, ModifierSource, RegimeLearningStatus,
    RegimeWeightTable, RegimeWeights, WeightSource, CALIBRATION_RANGES, MAX_SCORE, MIN_SCORE,
};
pub use postgres::PgSignalStore;
pub use store::{InMemorySignalStore, SignalStore, StoreStats};
pub use types::{
    signed_pnl_percent, Direction, Factor, FactorScores, ModifierSnapshot, NewSignalRecord,
    PriceBar, PriceLevels, Recommendation, Regime, Resolution, SignalRecord, SignalStatus,
    TerminalStatus,
};
