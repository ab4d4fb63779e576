// Price history sources used by the resolver and the breadth overlay

use anyhow::{Context, Result};
use common::PriceBar;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// Daily OHLC history for an instrument, oldest bar first
#[async_trait::async_trait]
pub trait PriceHistorySource: Send + Sync {
    async fn history(&self, symbol: &str) -> Result<Vec<PriceBar>>;
}

/// Reads `{dir}/{SYMBOL}.json`, a JSON array of bars
pub struct FilePriceSource {
    dir: PathBuf,
}

impl FilePriceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl PriceHistorySource for FilePriceSource {
    async fn history(&self, symbol: &str) -> Result<Vec<PriceBar>> {
        let path = self.dir.join(format!("{}.json", symbol.to_ascii_uppercase()));
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading price history {}", path.display()))?;
        let mut bars: Vec<PriceBar> = serde_json::from_str(&content)
            .with_context(|| format!("parsing price history {}", path.display()))?;
        bars.sort_by_key(|b| b.date);
        debug!("Loaded {} bars for {}", bars.len(), symbol);
        Ok(bars)
    }
}

/// In-memory price source (for testing and replay)
pub struct InMemoryPriceSource {
    bars: RwLock<HashMap<String, Vec<PriceBar>>>,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self {
            bars: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, symbol: &str, mut bars: Vec<PriceBar>) {
        bars.sort_by_key(|b| b.date);
        self.bars.write().await.insert(symbol.to_ascii_uppercase(), bars);
    }
}

impl Default for InMemoryPriceSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PriceHistorySource for InMemoryPriceSource {
    async fn history(&self, symbol: &str) -> Result<Vec<PriceBar>> {
        self.bars
            .read()
            .await
            .get(&symbol.to_ascii_uppercase())
            .cloned()
            .with_context(|| format!("no price history for {}", symbol))
    }
}
