// Selectivity Gate
// Boolean pre-filter that rejects marginal setups before they are acted on

use crate::modifiers::ConflictSeverity;
use crate::signals::{Divergence, TechnicalSummary};
use common::config::GateConfig;
use common::Direction;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCheck {
    Trend,
    Alignment,
    Volume,
    Conflict,
    Divergence,
    Extension,
    Earnings,
}

/// Everything a gate check may look at
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub technical: &'a TechnicalSummary,
    pub direction: Direction,
    pub conflict: ConflictSeverity,
    pub days_to_earnings: Option<i64>,
}

/// What a single check measured and decided
#[derive(Debug, Clone, PartialEq)]
pub struct GateVerdict {
    pub passed: bool,
    /// None when the input the check reads is absent
    pub measured: Option<f64>,
    pub threshold: f64,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub check: GateCheck,
    pub passed: bool,
    pub measured: Option<f64>,
    pub threshold: f64,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectivityGateResult {
    pub passed: bool,
    pub passed_count: usize,
    pub total_gates: usize,
    /// First failing check in evaluation order
    pub rejected_by: Option<GateCheck>,
    pub checks: Vec<GateOutcome>,
}

impl SelectivityGateResult {
    pub fn outcome(&self, check: GateCheck) -> Option<&GateOutcome> {
        self.checks.iter().find(|c| c.check == check)
    }

    /// Outcome of the first failing check
    pub fn rejection(&self) -> Option<&GateOutcome> {
        self.rejected_by.and_then(|check| self.outcome(check))
    }
}

/// One independent, pure gate check
pub trait SetupValidator: Send + Sync {
    fn check(&self) -> GateCheck;
    fn validate(&self, ctx: &GateContext<'_>) -> GateVerdict;
}

fn verdict(passed: bool, measured: Option<f64>, threshold: f64, detail: String) -> GateVerdict {
    GateVerdict {
        passed,
        measured,
        threshold,
        detail,
    }
}

/// ADX above the outright threshold, or above the lower one and accelerating
pub struct TrendValidator {
    strong_adx: f64,
    accelerating_adx: f64,
}

impl SetupValidator for TrendValidator {
    fn check(&self) -> GateCheck {
        GateCheck::Trend
    }

    fn validate(&self, ctx: &GateContext<'_>) -> GateVerdict {
        let adx = ctx.technical.adx;
        let rising = ctx.technical.adx_rising();
        let threshold = if rising {
            self.accelerating_adx.min(self.strong_adx)
        } else {
            self.strong_adx
        };
        verdict(
            adx >= threshold,
            Some(adx),
            threshold,
            format!("ADX {:.1} (rising: {})", adx, rising),
        )
    }
}

pub struct AlignmentValidator {
    min_alignment: f64,
}

impl SetupValidator for AlignmentValidator {
    fn check(&self) -> GateCheck {
        GateCheck::Alignment
    }

    fn validate(&self, ctx: &GateContext<'_>) -> GateVerdict {
        let score = ctx.technical.alignment_score;
        verdict(
            score >= self.min_alignment,
            Some(score),
            self.min_alignment,
            format!("alignment {:.0} >= {:.0}", score, self.min_alignment),
        )
    }
}

pub struct VolumeValidator {
    min_volume_ratio: f64,
}

impl SetupValidator for VolumeValidator {
    fn check(&self) -> GateCheck {
        GateCheck::Volume
    }

    fn validate(&self, ctx: &GateContext<'_>) -> GateVerdict {
        let ratio = ctx.technical.volume_ratio;
        verdict(
            ratio >= self.min_volume_ratio,
            Some(ratio),
            self.min_volume_ratio,
            format!("volume {:.2}x >= {:.2}x", ratio, self.min_volume_ratio),
        )
    }
}

/// Severity is measured on its rank: none 0, low 1, medium 2, high 3
pub struct ConflictValidator;

impl SetupValidator for ConflictValidator {
    fn check(&self) -> GateCheck {
        GateCheck::Conflict
    }

    fn validate(&self, ctx: &GateContext<'_>) -> GateVerdict {
        verdict(
            ctx.conflict < ConflictSeverity::Medium,
            Some(ctx.conflict as u8 as f64),
            ConflictSeverity::Medium as u8 as f64,
            format!("fundamental conflict {:?}", ctx.conflict),
        )
    }
}

/// Momentum divergence must not point against the trade.
/// Measured as 1 when it does, 0 otherwise.
pub struct DivergenceValidator;

impl SetupValidator for DivergenceValidator {
    fn check(&self) -> GateCheck {
        GateCheck::Divergence
    }

    fn validate(&self, ctx: &GateContext<'_>) -> GateVerdict {
        let divergence = ctx.technical.divergence;
        let against = match ctx.direction {
            Direction::Bearish => divergence == Divergence::Bullish,
            _ => divergence == Divergence::Bearish,
        };
        verdict(
            !against,
            Some(if against { 1.0 } else { 0.0 }),
            1.0,
            format!("{:?} divergence for {}", divergence, ctx.direction),
        )
    }
}

/// Price must not be stretched too far from its reference average
pub struct ExtensionValidator {
    max_extension_pct: f64,
}

impl SetupValidator for ExtensionValidator {
    fn check(&self) -> GateCheck {
        GateCheck::Extension
    }

    fn validate(&self, ctx: &GateContext<'_>) -> GateVerdict {
        match ctx.technical.extension_pct(ctx.direction) {
            Some(ext) => verdict(
                ext < self.max_extension_pct,
                Some(ext),
                self.max_extension_pct,
                format!("extension {:.1}% < {:.1}%", ext, self.max_extension_pct),
            ),
            None => verdict(
                true,
                None,
                self.max_extension_pct,
                "no reference average".to_string(),
            ),
        }
    }
}

/// No entries into an imminent earnings report
pub struct EarningsValidator {
    window_days: i64,
}

impl SetupValidator for EarningsValidator {
    fn check(&self) -> GateCheck {
        GateCheck::Earnings
    }

    fn validate(&self, ctx: &GateContext<'_>) -> GateVerdict {
        let window = self.window_days as f64;
        match ctx.days_to_earnings {
            Some(days) => verdict(
                !(0..=self.window_days).contains(&days),
                Some(days as f64),
                window,
                format!("earnings in {} days", days),
            ),
            None => verdict(true, None, window, "earnings date unknown".to_string()),
        }
    }
}

/// Runs every check in fixed order and reports the first failure
pub struct SelectivityGate {
    validators: Vec<Box<dyn SetupValidator>>,
}

impl SelectivityGate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            validators: vec![
                Box::new(TrendValidator {
                    strong_adx: config.strong_adx,
                    accelerating_adx: config.accelerating_adx,
                }),
                Box::new(AlignmentValidator {
                    min_alignment: config.min_alignment,
                }),
                Box::new(VolumeValidator {
                    min_volume_ratio: config.min_volume_ratio,
                }),
                Box::new(ConflictValidator),
                Box::new(DivergenceValidator),
                Box::new(ExtensionValidator {
                    max_extension_pct: config.max_extension_pct,
                }),
                Box::new(EarningsValidator {
                    window_days: config.earnings_window_days,
                }),
            ],
        }
    }

    pub fn evaluate(&self, ctx: &GateContext<'_>) -> SelectivityGateResult {
        let checks: Vec<GateOutcome> = self
            .validators
            .iter()
            .map(|v| {
                let verdict = v.validate(ctx);
                GateOutcome {
                    check: v.check(),
                    passed: verdict.passed,
                    measured: verdict.measured,
                    threshold: verdict.threshold,
                    detail: verdict.detail,
                }
            })
            .collect();
        let passed_count = checks.iter().filter(|c| c.passed).count();
        let total_gates = checks.len();
        let rejected_by = checks.iter().find(|c| !c.passed).map(|c| c.check);

        if let Some(failed) = checks.iter().find(|c| !c.passed) {
            debug!(
                "Gate rejected by {:?}: {} ({}/{} passed)",
                failed.check, failed.detail, passed_count, total_gates
            );
        }

        SelectivityGateResult {
            passed: passed_count == total_gates,
            passed_count,
            total_gates,
            rejected_by,
            checks,
        }
    }
}

impl Default for SelectivityGate {
    fn default() -> Self {
        Self::new(&GateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn technical() -> TechnicalSummary {
        TechnicalSummary {
            adx: 28.0,
            alignment_score: 80.0,
            volume_ratio: 1.8,
            ..Default::default()
        }
    }

    fn ctx(technical: &TechnicalSummary) -> GateContext<'_> {
        GateContext {
            technical,
            direction: Direction::Bullish,
            conflict: ConflictSeverity::None,
            days_to_earnings: None,
        }
    }

    #[test]
    fn test_clean_setup_passes_every_gate() {
        let t = technical();
        let result = SelectivityGate::default().evaluate(&ctx(&t));
        assert!(result.passed);
        assert_eq!(result.passed_count, result.total_gates);
        assert_eq!(result.total_gates, 7);
        assert_eq!(result.rejected_by, None);
    }

    #[test]
    fn test_first_failure_is_reported() {
        let mut t = technical();
        t.adx = 12.0;
        t.volume_ratio = 0.9;
        let result = SelectivityGate::default().evaluate(&ctx(&t));
        assert!(!result.passed);
        assert_eq!(result.rejected_by, Some(GateCheck::Trend));
        assert_eq!(result.passed_count, 5);

        let rejection = result.rejection().unwrap();
        assert_eq!(rejection.check, GateCheck::Trend);
        assert_eq!(rejection.measured, Some(12.0));
        assert_eq!(rejection.threshold, 25.0);

        let volume = result.outcome(GateCheck::Volume).unwrap();
        assert!(!volume.passed);
        assert_eq!(volume.measured, Some(0.9));
        assert_eq!(volume.threshold, 1.2);
    }

    #[test]
    fn test_outcomes_follow_check_order() {
        let t = technical();
        let result = SelectivityGate::default().evaluate(&ctx(&t));
        let order: Vec<GateCheck> = result.checks.iter().map(|c| c.check).collect();
        assert_eq!(
            order,
            vec![
                GateCheck::Trend,
                GateCheck::Alignment,
                GateCheck::Volume,
                GateCheck::Conflict,
                GateCheck::Divergence,
                GateCheck::Extension,
                GateCheck::Earnings,
            ]
        );
        let alignment = result.outcome(GateCheck::Alignment).unwrap();
        assert_eq!((alignment.measured, alignment.threshold), (Some(80.0), 65.0));
        let earnings = result.outcome(GateCheck::Earnings).unwrap();
        assert_eq!((earnings.measured, earnings.threshold), (None, 5.0));
    }

    #[test]
    fn test_accelerating_trend_passes() {
        let mut t = technical();
        t.adx = 19.0;
        t.adx_history = vec![16.0, 17.5, 19.0];
        let result = SelectivityGate::default().evaluate(&ctx(&t));
        assert!(result.passed);
        assert_eq!(result.outcome(GateCheck::Trend).unwrap().threshold, 18.0);

        t.adx_history = vec![19.5, 17.5, 19.0];
        assert_eq!(
            SelectivityGate::default().evaluate(&ctx(&t)).rejected_by,
            Some(GateCheck::Trend)
        );
    }

    #[test]
    fn test_conflict_divergence_and_earnings() {
        let t = technical();
        let gate = SelectivityGate::default();

        let mut c = ctx(&t);
        c.conflict = ConflictSeverity::Low;
        assert!(gate.evaluate(&c).passed);
        c.conflict = ConflictSeverity::Medium;
        let result = gate.evaluate(&c);
        assert_eq!(result.rejected_by, Some(GateCheck::Conflict));
        assert_eq!(result.rejection().unwrap().measured, Some(2.0));

        let mut diverging = technical();
        diverging.divergence = Divergence::Bearish;
        assert_eq!(
            gate.evaluate(&ctx(&diverging)).rejected_by,
            Some(GateCheck::Divergence)
        );
        let mut bearish = ctx(&diverging);
        bearish.direction = Direction::Bearish;
        assert!(gate.evaluate(&bearish).passed);

        let mut c = ctx(&t);
        c.days_to_earnings = Some(3);
        let result = gate.evaluate(&c);
        assert_eq!(result.rejected_by, Some(GateCheck::Earnings));
        let earnings = result.rejection().unwrap();
        assert_eq!((earnings.measured, earnings.threshold), (Some(3.0), 5.0));
        c.days_to_earnings = Some(12);
        assert!(gate.evaluate(&c).passed);
    }

    #[test]
    fn test_extension_cap() {
        let mut t = technical();
        t.price = rust_decimal::Decimal::from(112);
        t.reference_average = Some(rust_decimal::Decimal::from(100));
        let result = SelectivityGate::default().evaluate(&ctx(&t));
        assert_eq!(result.rejected_by, Some(GateCheck::Extension));
        let extension = result.rejection().unwrap();
        assert!((extension.measured.unwrap() - 12.0).abs() < 1e-9);
        assert_eq!(extension.threshold, 10.0);

        let mut c = ctx(&t);
        c.direction = Direction::Bearish;
        assert!(SelectivityGate::default().evaluate(&c).passed);
    }
}
