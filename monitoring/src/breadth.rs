use crate::prices::PriceHistorySource;
use chrono::{DateTime, Utc};
use common::config::BreadthConfig;
use common::{BreadthSnapshot, PriceBar};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether the last close is above its simple moving average over `period`
/// bars. None when the history is shorter than the period.
pub fn above_average(bars: &[PriceBar], period: usize) -> Option<bool> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let window = &bars[bars.len() - period..];
    let sum: Decimal = window.iter().map(|b| b.close).sum();
    let average = sum / Decimal::from(period as u64);
    window.last().map(|last| last.close > average)
}

/// Macro Breadth Overlay - share of a reference basket above its moving average
pub struct BreadthMonitor {
    prices: Arc<dyn PriceHistorySource>,
    config: BreadthConfig,
}

impl BreadthMonitor {
    pub fn new(prices: Arc<dyn PriceHistorySource>, config: BreadthConfig) -> Self {
        Self { prices, config }
    }

    /// Sample the basket. Symbols that fail to load or lack history are
    /// skipped; with nothing sampled the snapshot yields no modifier.
    pub async fn compute(&self, now: DateTime<Utc>) -> BreadthSnapshot {
        let histories = join_all(self.config.basket.iter().map(|s| self.prices.history(s))).await;

        let mut above = 0usize;
        let mut sampled = 0usize;
        let mut skipped = 0usize;
        for (symbol, history) in self.config.basket.iter().zip(histories) {
            let bars = match history {
                Ok(bars) => bars,
                Err(e) => {
                    warn!("Breadth: skipping {}: {:#}", symbol, e);
                    skipped += 1;
                    continue;
                }
            };
            match above_average(&bars, self.config.average_period) {
                Some(is_above) => {
                    sampled += 1;
                    if is_above {
                        above += 1;
                    }
                }
                None => {
                    debug!(
                        "Breadth: {} has {} bars, needs {}",
                        symbol,
                        bars.len(),
                        self.config.average_period
                    );
                    skipped += 1;
                }
            }
        }

        let pct_above_average = if sampled == 0 {
            0.0
        } else {
            above as f64 / sampled as f64 * 100.0
        };
        info!(
            "Market breadth: {:.0}% of {} sampled above {}-period average ({} skipped)",
            pct_above_average, sampled, self.config.average_period, skipped
        );
        BreadthSnapshot {
            pct_above_average,
            sampled,
            skipped,
            computed_at: now,
        }
    }
}
