pub mod breadth;
pub mod calibration;
pub mod condition_stats;
pub mod coordinator;
pub mod derived_modifiers;
pub mod prices;
pub mod regime_learning;
pub mod resolution;

pub use breadth::{above_average, BreadthMonitor};
pub use calibration::{build_calibration, max_calibration_gap, CalibrationEngine};
pub use condition_stats::{build_condition_stats, ConditionStatsEngine};
pub use coordinator::{LearningCoordinator, LearningSnapshot, RefreshReport};
pub use derived_modifiers::{build_derived_modifiers, DerivedModifierEngine};
pub use prices::{FilePriceSource, InMemoryPriceSource, PriceHistorySource};
pub use regime_learning::{learn_regime, separation_power, RegimeWeightLearner};
pub use resolution::{resolve_against_bars, OutcomeResolver, ResolutionStats};
