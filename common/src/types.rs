// Core domain types shared by the online scoring path and the offline learning path

use crate::conditions::ConditionSnapshot;
use crate::error::{ensure_range, InputError, TransitionError};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Directional lean of a setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Bullish => "BULLISH",
            Direction::Bearish => "BEARISH",
            Direction::Neutral => "NEUTRAL",
        }
    }

    /// +1 for bullish, -1 for bearish, 0 for neutral
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Direction::Neutral)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BULLISH" => Ok(Direction::Bullish),
            "BEARISH" => Ok(Direction::Bearish),
            "NEUTRAL" => Ok(Direction::Neutral),
            other => Err(InputError::UnknownLabel {
                kind: "direction",
                label: other.to_string(),
            }),
        }
    }
}

/// Final recommendation emitted to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
    Wait,
}

impl Recommendation {
    pub fn is_actionable(&self) -> bool {
        matches!(self, Recommendation::Buy | Recommendation::Sell)
    }
}

/// Coarse market regime label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    TrendingStrong,
    TrendingWeak,
    Range,
    Volatile,
    EventDriven,
}

impl Regime {
    pub const ALL: [Regime; 5] = [
        Regime::TrendingStrong,
        Regime::TrendingWeak,
        Regime::Range,
        Regime::Volatile,
        Regime::EventDriven,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::TrendingStrong => "TRENDING_STRONG",
            Regime::TrendingWeak => "TRENDING_WEAK",
            Regime::Range => "RANGE",
            Regime::Volatile => "VOLATILE",
            Regime::EventDriven => "EVENT_DRIVEN",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Regime {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Regime::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| InputError::UnknownLabel {
                kind: "regime",
                label: s.to_string(),
            })
    }
}

/// The five scoring factors, in weight-vector order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Technical,
    Pattern,
    Volume,
    News,
    Fundamental,
}

impl Factor {
    pub const ALL: [Factor; 5] = [
        Factor::Technical,
        Factor::Pattern,
        Factor::Volume,
        Factor::News,
        Factor::Fundamental,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::Technical => "technical",
            Factor::Pattern => "pattern",
            Factor::Volume => "volume",
            Factor::News => "news",
            Factor::Fundamental => "fundamental",
        }
    }
}

/// Per-factor sub-scores (each 0-100)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FactorScores {
    pub technical: f64,
    pub pattern: f64,
    pub volume: f64,
    pub news: f64,
    pub fundamental: f64,
}

impl FactorScores {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Technical => self.technical,
            Factor::Pattern => self.pattern,
            Factor::Volume => self.volume,
            Factor::News => self.news,
            Factor::Fundamental => self.fundamental,
        }
    }
}

/// Applied value of each named modifier at emission time
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModifierSnapshot {
    pub volume: f64,
    pub multi_timeframe: f64,
    pub trend_strength: f64,
    pub pattern_confluence: f64,
    pub fundamental_conflict: f64,
    pub sector: f64,
    pub market_breadth: f64,
}

impl ModifierSnapshot {
    pub fn total(&self) -> f64 {
        self.volume
            + self.multi_timeframe
            + self.trend_strength
            + self.pattern_confluence
            + self.fundamental_conflict
            + self.sector
            + self.market_breadth
    }
}

/// Entry, target and stop for an actionable signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub entry: Decimal,
    pub target: Decimal,
    pub stop_loss: Decimal,
}

impl PriceLevels {
    /// BUY: target > entry > stop. SELL: target < entry < stop.
    pub fn validate(&self, direction: Direction) -> Result<(), InputError> {
        let consistent = match direction {
            Direction::Bullish => self.target > self.entry && self.entry > self.stop_loss,
            Direction::Bearish => self.target < self.entry && self.entry < self.stop_loss,
            Direction::Neutral => false,
        };
        if consistent && self.stop_loss > Decimal::ZERO {
            Ok(())
        } else {
            Err(InputError::InconsistentLevels {
                direction: direction.as_str(),
                entry: self.entry.to_string(),
                target: self.target.to_string(),
                stop: self.stop_loss.to_string(),
            })
        }
    }
}

/// One OHLC bar of an instrument's price history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Terminal outcome kinds. PENDING is not representable, so a resolution is always terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalStatus {
    TargetHit,
    StopHit,
    Expired,
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::TargetHit => "TARGET_HIT",
            TerminalStatus::StopHit => "STOP_HIT",
            TerminalStatus::Expired => "EXPIRED",
        }
    }
}

impl FromStr for TerminalStatus {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TARGET_HIT" => Ok(TerminalStatus::TargetHit),
            "STOP_HIT" => Ok(TerminalStatus::StopHit),
            "EXPIRED" => Ok(TerminalStatus::Expired),
            other => Err(InputError::UnknownLabel {
                kind: "status",
                label: other.to_string(),
            }),
        }
    }
}

/// Realized outcome of a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub status: TerminalStatus,
    pub date: NaiveDate,
    pub price: Decimal,
    pub pnl_percent: f64,
    pub days_to_outcome: u32,
}

/// Lifecycle state of a signal record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SignalStatus {
    Pending,
    Resolved(Resolution),
}

impl SignalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SignalStatus::Pending => "PENDING",
            SignalStatus::Resolved(r) => r.status.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SignalStatus::Resolved(_))
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        match self {
            SignalStatus::Pending => None,
            SignalStatus::Resolved(r) => Some(r),
        }
    }
}

/// Everything needed to create a signal record
#[derive(Debug, Clone)]
pub struct NewSignalRecord {
    pub symbol: String,
    pub signal_date: NaiveDate,
    pub direction: Direction,
    pub confidence: f64,
    pub base_confidence: f64,
    pub conditions: ConditionSnapshot,
    pub factors: FactorScores,
    pub modifiers: ModifierSnapshot,
    pub levels: PriceLevels,
}

/// Durable record of one emitted actionable signal and its outcome.
///
/// Fields are private: the snapshot is fixed at construction and the only
/// mutation is [`SignalRecord::resolve`], which allows PENDING -> terminal once.
/// Deserialized records go through the same checks as [`SignalRecord::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredSignalRecord")]
pub struct SignalRecord {
    id: Uuid,
    symbol: String,
    signal_date: NaiveDate,
    direction: Direction,
    confidence: f64,
    base_confidence: f64,
    conditions: ConditionSnapshot,
    factors: FactorScores,
    modifiers: ModifierSnapshot,
    levels: PriceLevels,
    status: SignalStatus,
    created_at: DateTime<Utc>,
}

/// Serialized shape of a [`SignalRecord`], validated on the way in
#[derive(Deserialize)]
struct StoredSignalRecord {
    id: Uuid,
    symbol: String,
    signal_date: NaiveDate,
    direction: Direction,
    confidence: f64,
    base_confidence: f64,
    conditions: ConditionSnapshot,
    factors: FactorScores,
    modifiers: ModifierSnapshot,
    levels: PriceLevels,
    status: SignalStatus,
    created_at: DateTime<Utc>,
}

impl TryFrom<StoredSignalRecord> for SignalRecord {
    type Error = InputError;

    fn try_from(stored: StoredSignalRecord) -> Result<Self, Self::Error> {
        let draft = NewSignalRecord {
            symbol: stored.symbol,
            signal_date: stored.signal_date,
            direction: stored.direction,
            confidence: stored.confidence,
            base_confidence: stored.base_confidence,
            conditions: stored.conditions,
            factors: stored.factors,
            modifiers: stored.modifiers,
            levels: stored.levels,
        };
        validate_draft(&draft)?;
        let mut record = Self::from_parts(stored.id, draft, stored.status, stored.created_at);
        record.symbol = record.symbol.trim().to_ascii_uppercase();
        Ok(record)
    }
}

fn validate_draft(draft: &NewSignalRecord) -> Result<(), InputError> {
    if draft.symbol.trim().is_empty() {
        return Err(InputError::EmptySymbol);
    }
    if !draft.direction.is_actionable() {
        return Err(InputError::NotActionable);
    }
    ensure_range("confidence", draft.confidence, 0.0, 100.0, "0-100")?;
    ensure_range("base_confidence", draft.base_confidence, 0.0, 100.0, "0-100")?;
    draft.levels.validate(draft.direction)
}

impl SignalRecord {
    pub fn new(draft: NewSignalRecord) -> Result<Self, InputError> {
        validate_draft(&draft)?;

        Ok(Self {
            id: Uuid::new_v4(),
            symbol: draft.symbol.trim().to_ascii_uppercase(),
            signal_date: draft.signal_date,
            direction: draft.direction,
            confidence: draft.confidence,
            base_confidence: draft.base_confidence,
            conditions: draft.conditions,
            factors: draft.factors,
            modifiers: draft.modifiers,
            levels: draft.levels,
            status: SignalStatus::Pending,
            created_at: Utc::now(),
        })
    }

    /// Rebuild a record loaded from persistent storage.
    pub(crate) fn from_parts(
        id: Uuid,
        draft: NewSignalRecord,
        status: SignalStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            symbol: draft.symbol,
            signal_date: draft.signal_date,
            direction: draft.direction,
            confidence: draft.confidence,
            base_confidence: draft.base_confidence,
            conditions: draft.conditions,
            factors: draft.factors,
            modifiers: draft.modifiers,
            levels: draft.levels,
            status,
            created_at,
        }
    }

    /// Transition PENDING -> terminal. Any other transition is rejected.
    pub fn resolve(&mut self, resolution: Resolution) -> Result<(), TransitionError> {
        if let SignalStatus::Resolved(existing) = &self.status {
            return Err(TransitionError::AlreadyTerminal {
                id: self.id,
                status: existing.status.as_str(),
            });
        }
        self.status = SignalStatus::Resolved(resolution);
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn signal_date(&self) -> NaiveDate {
        self.signal_date
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn base_confidence(&self) -> f64 {
        self.base_confidence
    }

    pub fn conditions(&self) -> &ConditionSnapshot {
        &self.conditions
    }

    pub fn factors(&self) -> &FactorScores {
        &self.factors
    }

    pub fn modifiers(&self) -> &ModifierSnapshot {
        &self.modifiers
    }

    pub fn levels(&self) -> &PriceLevels {
        &self.levels
    }

    pub fn status(&self) -> &SignalStatus {
        &self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_pending(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Some(true) on TARGET_HIT, Some(false) on STOP_HIT, None otherwise.
    /// EXPIRED outcomes are not counted as wins or losses.
    pub fn is_win(&self) -> Option<bool> {
        match self.status.resolution().map(|r| r.status) {
            Some(TerminalStatus::TargetHit) => Some(true),
            Some(TerminalStatus::StopHit) => Some(false),
            _ => None,
        }
    }

    /// Realized P&L percent, if resolved
    pub fn pnl_percent(&self) -> Option<f64> {
        self.status.resolution().map(|r| r.pnl_percent)
    }
}

/// Direction-signed percentage move from entry to exit
pub fn signed_pnl_percent(direction: Direction, entry: Decimal, exit: Decimal) -> f64 {
    if entry <= Decimal::ZERO {
        return 0.0;
    }
    let raw = ((exit - entry) / entry).to_f64().unwrap_or(0.0) * 100.0;
    raw * direction.sign()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::conditions::ConditionSnapshot;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_draft(direction: Direction) -> NewSignalRecord {
        let levels = match direction {
            Direction::Bearish => PriceLevels {
                entry: dec!(100),
                target: dec!(96),
                stop_loss: dec!(102),
            },
            _ => PriceLevels {
                entry: dec!(100),
                target: dec!(104),
                stop_loss: dec!(98),
            },
        };
        NewSignalRecord {
            symbol: "aapl".to_string(),
            signal_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            direction,
            confidence: 72.0,
            base_confidence: 66.0,
            conditions: ConditionSnapshot::capture(Regime::TrendingStrong, 28.0, 1.6, 80.0),
            factors: FactorScores {
                technical: 70.0,
                pattern: 60.0,
                volume: 75.0,
                news: 55.0,
                fundamental: 50.0,
            },
            modifiers: ModifierSnapshot {
                volume: 5.0,
                multi_timeframe: 5.0,
                trend_strength: 5.0,
                ..Default::default()
            },
            levels,
        }
    }

    fn resolution(status: TerminalStatus) -> Resolution {
        Resolution {
            status,
            date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            price: dec!(104),
            pnl_percent: 4.0,
            days_to_outcome: 2,
        }
    }

    #[test]
    fn test_new_record_is_pending_and_normalizes_symbol() {
        let record = SignalRecord::new(sample_draft(Direction::Bullish)).unwrap();
        assert!(record.is_pending());
        assert_eq!(record.symbol(), "AAPL");
        assert_eq!(record.status().label(), "PENDING");
    }

    #[test]
    fn test_neutral_direction_cannot_be_recorded() {
        let mut draft = sample_draft(Direction::Bullish);
        draft.direction = Direction::Neutral;
        assert_eq!(SignalRecord::new(draft), Err(InputError::NotActionable));
    }

    #[test]
    fn test_levels_must_match_direction() {
        let mut draft = sample_draft(Direction::Bullish);
        draft.levels.target = dec!(99);
        assert!(matches!(
            SignalRecord::new(draft),
            Err(InputError::InconsistentLevels { .. })
        ));

        assert!(SignalRecord::new(sample_draft(Direction::Bearish)).is_ok());
    }

    #[test]
    fn test_confidence_outside_range_rejected() {
        let mut draft = sample_draft(Direction::Bullish);
        draft.confidence = 101.0;
        assert!(SignalRecord::new(draft).is_err());
    }

    #[test]
    fn test_terminal_status_is_immutable() {
        let mut record = SignalRecord::new(sample_draft(Direction::Bullish)).unwrap();
        record.resolve(resolution(TerminalStatus::TargetHit)).unwrap();
        assert_eq!(record.is_win(), Some(true));

        let err = record.resolve(resolution(TerminalStatus::StopHit)).unwrap_err();
        assert!(matches!(err, TransitionError::AlreadyTerminal { status: "TARGET_HIT", .. }));
        assert_eq!(record.status().label(), "TARGET_HIT");
    }

    #[test]
    fn test_deserialization_runs_record_checks() {
        let mut record = SignalRecord::new(sample_draft(Direction::Bullish)).unwrap();
        record.resolve(resolution(TerminalStatus::TargetHit)).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        let back: SignalRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, record);

        let mut tampered = json.clone();
        tampered["levels"]["stop_loss"] = serde_json::json!("105");
        let err = serde_json::from_value::<SignalRecord>(tampered).unwrap_err();
        assert!(err.to_string().contains("inconsistent"));

        let mut neutral = json;
        neutral["direction"] = serde_json::json!("NEUTRAL");
        assert!(serde_json::from_value::<SignalRecord>(neutral).is_err());
    }

    #[test]
    fn test_expired_is_neither_win_nor_loss() {
        let mut record = SignalRecord::new(sample_draft(Direction::Bullish)).unwrap();
        record.resolve(resolution(TerminalStatus::Expired)).unwrap();
        assert_eq!(record.is_win(), None);
        assert!(!record.is_pending());
    }

    #[test]
    fn test_signed_pnl_percent() {
        assert!((signed_pnl_percent(Direction::Bullish, dec!(100), dec!(104)) - 4.0).abs() < 1e-9);
        assert!((signed_pnl_percent(Direction::Bearish, dec!(100), dec!(104)) + 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_regime_label_round_trip() {
        for regime in Regime::ALL {
            assert_eq!(regime.as_str().parse::<Regime>().unwrap(), regime);
        }
    }
}
