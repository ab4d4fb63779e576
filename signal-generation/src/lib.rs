// Signal Generation (online path)
// Scores a setup, filters it, and calibrates the confidence reported to callers

pub mod expectancy;
pub mod levels;
pub mod modifiers;
pub mod pipeline;
pub mod regime;
pub mod scoring;
pub mod signals;
pub mod storage;
pub mod validators;

pub use expectancy::{ExpectancyFilter, ExpectancyResult, ExpectancyStatus};
pub use levels::compute_levels;
pub use modifiers::{conflict_severity, AppliedModifier, ConfidenceResult, ConflictSeverity, ModifierEngine};
pub use pipeline::{SignalEvaluation, SignalPipeline};
pub use regime::{RegimeClassification, RegimeClassifier};
pub use scoring::{direction_vote, top_factors, ConfidenceModel, DirectionVotes, FactorContribution, SplitConfidenceResult};
pub use signals::{
    Divergence, FundamentalSummary, Growth, Headline, Impact, NewsSummary, PatternSummary,
    SignalRequest, TechnicalSummary, TimeframeTrends, Trend, Valuation, VolumeTrend,
};
pub use storage::{PersistenceFailure, SignalRecorder};
pub use validators::{
    GateCheck, GateContext, GateOutcome, GateVerdict, SelectivityGate, SelectivityGateResult,
    SetupValidator,
};
