// Expectancy Filter
// Accepts or rejects a setup on the realized expectancy of its condition bucket

use common::config::ExpectancyConfig;
use common::EmpiricalProbability;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpectancyStatus {
    /// No history for this condition bucket yet
    Accumulating,
    LowSample,
    /// Too few samples to act on, and what exists is not positive
    LowSampleWarning,
    PositiveEdge,
    NegativeExpectancy,
    /// Positive expectancy carried by a poor risk/reward
    FragileEdge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectancyResult {
    pub accepted: bool,
    pub status: ExpectancyStatus,
    /// Percent per trade: wr * avg_win - (1 - wr) * avg_loss
    pub expectancy: Option<f64>,
    pub risk_reward: Option<f64>,
    pub win_rate: Option<f64>,
    pub sample_size: usize,
    pub reliable: bool,
    pub reason: String,
}

pub struct ExpectancyFilter {
    config: ExpectancyConfig,
}

impl ExpectancyFilter {
    pub fn new(config: ExpectancyConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, empirical: &EmpiricalProbability) -> ExpectancyResult {
        if !empirical.available || empirical.sample_size == 0 {
            return ExpectancyResult {
                accepted: true,
                status: ExpectancyStatus::Accumulating,
                expectancy: None,
                risk_reward: None,
                win_rate: None,
                sample_size: 0,
                reliable: false,
                reason: "no resolved signals for these conditions yet".to_string(),
            };
        }

        let wr = empirical.win_rate.clamp(0.0, 1.0);
        let expectancy = wr * empirical.avg_win_pct - (1.0 - wr) * empirical.avg_loss_pct;
        let risk_reward = if empirical.avg_loss_pct > 0.0 {
            empirical.avg_win_pct / empirical.avg_loss_pct
        } else {
            f64::INFINITY
        };
        let reliable = empirical.sample_size >= self.config.min_reliable_samples;

        let n = empirical.sample_size;
        let (accepted, status, reason) = if !reliable {
            if expectancy <= 0.0 {
                (
                    true,
                    ExpectancyStatus::LowSampleWarning,
                    format!("expectancy {:.2}% on only {} samples", expectancy, n),
                )
            } else {
                (
                    true,
                    ExpectancyStatus::LowSample,
                    format!("expectancy {:+.2}% on only {} samples", expectancy, n),
                )
            }
        } else if expectancy <= 0.0 {
            (
                false,
                ExpectancyStatus::NegativeExpectancy,
                format!("expectancy {:.2}% over {} samples", expectancy, n),
            )
        } else if risk_reward < self.config.min_risk_reward {
            (
                false,
                ExpectancyStatus::FragileEdge,
                format!(
                    "risk/reward {:.2} below {:.2} despite expectancy {:+.2}%",
                    risk_reward, self.config.min_risk_reward, expectancy
                ),
            )
        } else {
            (
                true,
                ExpectancyStatus::PositiveEdge,
                format!(
                    "expectancy {:+.2}% with risk/reward {:.2} over {} samples",
                    expectancy, risk_reward, n
                ),
            )
        };

        debug!("Expectancy {:?}: {}", status, reason);

        ExpectancyResult {
            accepted,
            status,
            expectancy: Some(expectancy),
            risk_reward: Some(risk_reward),
            win_rate: Some(wr),
            sample_size: n,
            reliable,
            reason,
        }
    }
}

impl Default for ExpectancyFilter {
    fn default() -> Self {
        Self::new(ExpectancyConfig::default())
    }
}
