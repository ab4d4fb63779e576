use crate::prices::PriceHistorySource;
use anyhow::{Context, Result};
use common::{
    signed_pnl_percent, Direction, PriceBar, Resolution, SignalRecord, SignalStore, TerminalStatus,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Walk the bars after the signal date and find the first terminal event.
///
/// Target is checked before stop on the same bar. Returns None while fewer
/// than `horizon` bars exist and neither level has been touched.
pub fn resolve_against_bars(record: &SignalRecord, bars: &[PriceBar], horizon: usize) -> Option<Resolution> {
    let levels = record.levels();
    let direction = record.direction();
    let window: Vec<&PriceBar> = bars
        .iter()
        .filter(|b| b.date > record.signal_date())
        .take(horizon)
        .collect();

    for (index, bar) in window.iter().enumerate() {
        let (target_hit, stop_hit) = match direction {
            Direction::Bearish => (bar.low <= levels.target, bar.high >= levels.stop_loss),
            _ => (bar.high >= levels.target, bar.low <= levels.stop_loss),
        };
        let hit = if target_hit {
            Some((TerminalStatus::TargetHit, levels.target))
        } else if stop_hit {
            Some((TerminalStatus::StopHit, levels.stop_loss))
        } else {
            None
        };
        if let Some((status, price)) = hit {
            return Some(Resolution {
                status,
                date: bar.date,
                price,
                pnl_percent: signed_pnl_percent(direction, levels.entry, price),
                days_to_outcome: index as u32 + 1,
            });
        }
    }

    if horizon > 0 && window.len() == horizon {
        let last = window[horizon - 1];
        return Some(Resolution {
            status: TerminalStatus::Expired,
            date: last.date,
            price: last.close,
            pnl_percent: signed_pnl_percent(direction, levels.entry, last.close),
            days_to_outcome: horizon as u32,
        });
    }
    None
}

/// Counts from one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub symbols: usize,
    pub examined: usize,
    pub target_hit: usize,
    pub stop_hit: usize,
    pub expired: usize,
    pub still_pending: usize,
    /// Symbols whose history or store access failed
    pub failed_symbols: usize,
    /// Records whose outcome could not be written; retried next pass
    pub failed_records: usize,
}

impl ResolutionStats {
    pub fn resolved(&self) -> usize {
        self.target_hit + self.stop_hit + self.expired
    }

    fn merge(&mut self, other: &ResolutionStats) {
        self.symbols += other.symbols;
        self.examined += other.examined;
        self.target_hit += other.target_hit;
        self.stop_hit += other.stop_hit;
        self.expired += other.expired;
        self.still_pending += other.still_pending;
        self.failed_symbols += other.failed_symbols;
        self.failed_records += other.failed_records;
    }
}

/// Outcome Resolver - transitions PENDING signals to a terminal outcome
pub struct OutcomeResolver {
    store: Arc<dyn SignalStore>,
    prices: Arc<dyn PriceHistorySource>,
    horizon: usize,
}

impl OutcomeResolver {
    pub fn new(store: Arc<dyn SignalStore>, prices: Arc<dyn PriceHistorySource>, horizon: usize) -> Self {
        Self {
            store,
            prices,
            horizon,
        }
    }

    /// Resolve the pending records of one symbol, oldest first
    pub async fn resolve_symbol(&self, symbol: &str) -> Result<ResolutionStats> {
        let pending = self
            .store
            .pending_for_symbol(symbol)
            .await
            .with_context(|| format!("loading pending signals for {}", symbol))?;
        let mut stats = ResolutionStats {
            symbols: 1,
            ..Default::default()
        };
        if pending.is_empty() {
            return Ok(stats);
        }

        let bars = self.prices.history(symbol).await?;

        for record in pending {
            stats.examined += 1;
            let Some(resolution) = resolve_against_bars(&record, &bars, self.horizon) else {
                stats.still_pending += 1;
                continue;
            };

            let written = match self.store.record_outcome(record.id(), &resolution).await {
                Ok(written) => written,
                Err(e) => {
                    warn!("Failed to record outcome for signal {}: {:#}", record.id(), e);
                    stats.failed_records += 1;
                    continue;
                }
            };

            if written {
                debug!(
                    "{} signal {} -> {} after {} bars ({:+.2}%)",
                    record.symbol(),
                    record.id(),
                    resolution.status.as_str(),
                    resolution.days_to_outcome,
                    resolution.pnl_percent
                );
                match resolution.status {
                    TerminalStatus::TargetHit => stats.target_hit += 1,
                    TerminalStatus::StopHit => stats.stop_hit += 1,
                    TerminalStatus::Expired => stats.expired += 1,
                }
            } else {
                warn!("Signal {} was already resolved, outcome not overwritten", record.id());
            }
        }
        Ok(stats)
    }

    /// Resolve every symbol with pending records, in parallel across symbols
    pub async fn resolve_all(&self) -> Result<ResolutionStats> {
        let symbols = self.store.pending_symbols().await?;
        let results = join_all(symbols.iter().map(|s| self.resolve_symbol(s))).await;

        let mut total = ResolutionStats::default();
        for (symbol, result) in symbols.iter().zip(results) {
            match result {
                Ok(stats) => total.merge(&stats),
                Err(e) => {
                    warn!("Outcome resolution failed for {}: {:#}", symbol, e);
                    total.symbols += 1;
                    total.failed_symbols += 1;
                }
            }
        }

        info!(
            "Resolved {} of {} pending signals across {} symbols ({} symbols, {} records failed)",
            total.resolved(),
            total.examined,
            total.symbols,
            total.failed_symbols,
            total.failed_records
        );
        Ok(total)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::prices::InMemoryPriceSource;
    use chrono::{Duration, NaiveDate};
    use common::{
        ConditionSnapshot, FactorScores, InMemorySignalStore, ModifierSnapshot, NewSignalRecord,
        PriceLevels, Regime, StoreStats,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    pub(crate) fn record(symbol: &str, direction: Direction) -> SignalRecord {
        record_with(
            symbol,
            direction,
            70.0,
            ConditionSnapshot::capture(Regime::TrendingStrong, 28.0, 1.6, 80.0),
            FactorScores::default(),
        )
    }

    pub(crate) fn record_with(
        symbol: &str,
        direction: Direction,
        confidence: f64,
        conditions: ConditionSnapshot,
        factors: FactorScores,
    ) -> SignalRecord {
        let levels = match direction {
            Direction::Bearish => PriceLevels {
                entry: dec!(100),
                target: dec!(96),
                stop_loss: dec!(103),
            },
            _ => PriceLevels {
                entry: dec!(100),
                target: dec!(104),
                stop_loss: dec!(97),
            },
        };
        SignalRecord::new(NewSignalRecord {
            symbol: symbol.to_string(),
            signal_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            direction,
            confidence,
            base_confidence: confidence - 6.0,
            conditions,
            factors,
            modifiers: ModifierSnapshot::default(),
            levels,
        })
        .unwrap()
    }

    /// Mark a record terminal with the given realized P&L
    pub(crate) fn settle(mut record: SignalRecord, status: TerminalStatus, pnl_percent: f64) -> SignalRecord {
        record
            .resolve(Resolution {
                status,
                date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
                price: dec!(100),
                pnl_percent,
                days_to_outcome: 2,
            })
            .unwrap();
        record
    }

    /// Bars starting the day after the signal date, each (high, low, close)
    pub(crate) fn bars(rows: &[(Decimal, Decimal, Decimal)]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let mut out = vec![PriceBar {
            date: start,
            open: dec!(100),
            high: dec!(150),
            low: dec!(50),
            close: dec!(100),
        }];
        for (i, (high, low, close)) in rows.iter().enumerate() {
            out.push(PriceBar {
                date: start + Duration::days(i as i64 + 1),
                open: *close,
                high: *high,
                low: *low,
                close: *close,
            });
        }
        out
    }

    #[test]
    fn test_target_hit_on_first_touch() {
        let r = record("AAPL", Direction::Bullish);
        let history = bars(&[(dec!(101), dec!(99), dec!(100)), (dec!(104.5), dec!(100), dec!(104))]);
        let res = resolve_against_bars(&r, &history, 7).unwrap();
        assert_eq!(res.status, TerminalStatus::TargetHit);
        assert_eq!(res.price, dec!(104));
        assert_eq!(res.days_to_outcome, 2);
        assert!((res.pnl_percent - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_signal_day_bar_is_ignored() {
        // the signal-day bar spans both levels but must not count
        let r = record("AAPL", Direction::Bullish);
        assert!(resolve_against_bars(&r, &bars(&[]), 7).is_none());
    }

    #[test]
    fn test_target_checked_before_stop_on_same_bar() {
        let r = record("AAPL", Direction::Bullish);
        let history = bars(&[(dec!(105), dec!(96), dec!(100))]);
        assert_eq!(
            resolve_against_bars(&r, &history, 7).unwrap().status,
            TerminalStatus::TargetHit
        );
    }

    #[test]
    fn test_bearish_stop_hit() {
        let r = record("AAPL", Direction::Bearish);
        let history = bars(&[(dec!(101), dec!(98), dec!(100)), (dec!(103.2), dec!(100), dec!(103))]);
        let res = resolve_against_bars(&r, &history, 7).unwrap();
        assert_eq!(res.status, TerminalStatus::StopHit);
        assert_eq!(res.price, dec!(103));
        assert!((res.pnl_percent + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_expires_only_after_full_horizon() {
        let r = record("AAPL", Direction::Bullish);
        let quiet = (dec!(101), dec!(99), dec!(100.5));
        assert!(resolve_against_bars(&r, &bars(&[quiet; 6]), 7).is_none());

        let res = resolve_against_bars(&r, &bars(&[quiet; 9]), 7).unwrap();
        assert_eq!(res.status, TerminalStatus::Expired);
        assert_eq!(res.days_to_outcome, 7);
        assert_eq!(res.price, dec!(100.5));
        assert_eq!(res.date, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
    }

    #[tokio::test]
    async fn test_resolving_twice_is_noop() {
        let store = Arc::new(InMemorySignalStore::new());
        let prices = Arc::new(InMemoryPriceSource::new());
        let r = record("AAPL", Direction::Bullish);
        store.insert(&r).await.unwrap();
        prices
            .insert("AAPL", bars(&[(dec!(104), dec!(99), dec!(103))]))
            .await;

        let resolver = OutcomeResolver::new(store.clone(), prices.clone(), 7);
        let first = resolver.resolve_all().await.unwrap();
        assert_eq!(first.target_hit, 1);

        // a later stop-out must not overwrite the recorded outcome
        prices
            .insert(
                "AAPL",
                bars(&[(dec!(101), dec!(90), dec!(91)), (dec!(104), dec!(99), dec!(103))]),
            )
            .await;
        let second = resolver.resolve_all().await.unwrap();
        assert_eq!(second.examined, 0);

        let stored = store.get(r.id()).await.unwrap().unwrap();
        assert_eq!(stored.status().label(), "TARGET_HIT");
    }

    #[tokio::test]
    async fn test_one_symbol_failure_does_not_block_others() {
        let store = Arc::new(InMemorySignalStore::new());
        let prices = Arc::new(InMemoryPriceSource::new());
        store.insert(&record("AAPL", Direction::Bullish)).await.unwrap();
        store.insert(&record("MSFT", Direction::Bullish)).await.unwrap();
        prices
            .insert("MSFT", bars(&[(dec!(101), dec!(96), dec!(97))]))
            .await;

        let stats = OutcomeResolver::new(store.clone(), prices, 7)
            .resolve_all()
            .await
            .unwrap();
        assert_eq!(stats.symbols, 2);
        assert_eq!(stats.failed_symbols, 1);
        assert_eq!(stats.stop_hit, 1);
        assert_eq!(store.pending_symbols().await.unwrap(), vec!["AAPL"]);
    }

    /// In-memory store whose outcome writes fail for one record
    struct FailingWrites {
        inner: InMemorySignalStore,
        fail_id: Uuid,
    }

    #[async_trait::async_trait]
    impl SignalStore for FailingWrites {
        async fn insert(&self, record: &SignalRecord) -> Result<()> {
            self.inner.insert(record).await
        }
        async fn get(&self, id: Uuid) -> Result<Option<SignalRecord>> {
            self.inner.get(id).await
        }
        async fn pending_symbols(&self) -> Result<Vec<String>> {
            self.inner.pending_symbols().await
        }
        async fn pending_for_symbol(&self, symbol: &str) -> Result<Vec<SignalRecord>> {
            self.inner.pending_for_symbol(symbol).await
        }
        async fn record_outcome(&self, id: Uuid, resolution: &Resolution) -> Result<bool> {
            if id == self.fail_id {
                anyhow::bail!("connection reset");
            }
            self.inner.record_outcome(id, resolution).await
        }
        async fn resolved(&self) -> Result<Vec<SignalRecord>> {
            self.inner.resolved().await
        }
        async fn resolved_for_regime(&self, regime: Regime) -> Result<Vec<SignalRecord>> {
            self.inner.resolved_for_regime(regime).await
        }
        async fn stats(&self) -> Result<StoreStats> {
            self.inner.stats().await
        }
    }

    #[tokio::test]
    async fn test_write_failure_does_not_stop_remaining_records() {
        let first = record("NVDA", Direction::Bullish);
        let second = record("NVDA", Direction::Bullish);
        let third = record("NVDA", Direction::Bullish);
        let store = Arc::new(FailingWrites {
            inner: InMemorySignalStore::new(),
            fail_id: first.id(),
        });
        for r in [&first, &second, &third] {
            store.insert(r).await.unwrap();
        }
        let prices = Arc::new(InMemoryPriceSource::new());
        prices
            .insert("NVDA", bars(&[(dec!(105), dec!(99), dec!(104))]))
            .await;

        let stats = OutcomeResolver::new(store.clone(), prices, 7)
            .resolve_all()
            .await
            .unwrap();
        assert_eq!(stats.examined, 3);
        assert_eq!(stats.target_hit, 2);
        assert_eq!(stats.failed_records, 1);
        assert_eq!(stats.failed_symbols, 0);

        let pending = store.pending_for_symbol("NVDA").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), first.id());
    }
}
