//! Time-bounded caches owned by one adapter
//!
//! - [`MarketCache`]: one immutable [`MarketSnapshot`] of rates, volumes and
//!   top-of-book, swapped wholesale on refresh
//! - [`BoardCache`]: order books per pair for at most a few seconds
//! - [`PairCache`]: the venue's pair listing and the codec derived from it
//!
//! The market mutex is held while a refresh runs, so a caller arriving
//! mid-refresh waits and then reads the new snapshot instead of starting a
//! second refresh.

use crate::errors::{ExchangeError, Result};
use crate::json::TickerRow;
use crate::symbol::{SymbolCodec, SymbolStyle};
use crate::types::{Board, CurrencyPair, OrderBookTick, PairMap};
use futures_util::lock::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Rates, volumes and ticks from one refresh
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    rates: PairMap<f64>,
    volumes: PairMap<f64>,
    ticks: PairMap<OrderBookTick>,
    fetched_at: Instant,
}

impl MarketSnapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Snapshot from ticker rows; rows whose symbol does not parse are
    /// skipped
    pub fn from_rows(rows: Vec<TickerRow>, universe: &PairUniverse) -> Self {
        let mut builder = Self::builder();
        for row in rows {
            match universe.parse(&row.symbol) {
                Ok(pair) => builder.insert(&pair, row.last, row.volume, row.ask, row.bid),
                Err(_) => debug!("ticker symbol {} not in pair universe", row.symbol),
            }
        }
        builder.build()
    }

    pub fn rate(&self, pair: &CurrencyPair) -> Option<f64> {
        lookup(&self.rates, pair).copied()
    }

    pub fn volume(&self, pair: &CurrencyPair) -> Option<f64> {
        lookup(&self.volumes, pair).copied()
    }

    pub fn tick(&self, pair: &CurrencyPair) -> Option<OrderBookTick> {
        lookup(&self.ticks, pair).copied()
    }

    pub fn ticks(&self) -> &PairMap<OrderBookTick> {
        &self.ticks
    }

    pub fn pairs(&self) -> Vec<CurrencyPair> {
        let mut pairs: Vec<CurrencyPair> = self
            .rates
            .iter()
            .flat_map(|(trading, inner)| {
                inner.keys().map(move |settlement| CurrencyPair::key(trading, settlement))
            })
            .collect();
        pairs.sort();
        pairs
    }

    pub fn len(&self) -> usize {
        self.rates.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

fn lookup<'a, T>(map: &'a PairMap<T>, pair: &CurrencyPair) -> Option<&'a T> {
    map.get(&pair.trading)?.get(&pair.settlement)
}

/// Fills the three maps together so they always share one key set
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    rates: PairMap<f64>,
    volumes: PairMap<f64>,
    ticks: PairMap<OrderBookTick>,
}

impl SnapshotBuilder {
    pub fn insert(&mut self, pair: &CurrencyPair, rate: f64, volume: f64, best_ask: f64, best_bid: f64) {
        let trading = pair.trading.clone();
        let settlement = pair.settlement.clone();
        self.rates.entry(trading.clone()).or_default().insert(settlement.clone(), rate);
        self.volumes.entry(trading.clone()).or_default().insert(settlement.clone(), volume);
        self.ticks.entry(trading).or_default().insert(
            settlement,
            OrderBookTick {
                best_ask_price: best_ask,
                best_bid_price: best_bid,
            },
        );
    }

    pub fn build(self) -> MarketSnapshot {
        MarketSnapshot {
            rates: self.rates,
            volumes: self.volumes,
            ticks: self.ticks,
            fetched_at: Instant::now(),
        }
    }
}

/// Single-slot snapshot cache with a staleness window
#[derive(Debug)]
pub struct MarketCache {
    ttl: Duration,
    slot: Mutex<Option<Arc<MarketSnapshot>>>,
}

impl MarketCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current snapshot, refreshed with `refresh` when missing or stale.
    ///
    /// On refresh failure the error is returned and the previous snapshot,
    /// stale or not, stays in place.
    pub async fn snapshot<F, Fut>(&self, refresh: F) -> Result<Arc<MarketSnapshot>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<MarketSnapshot>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(current) = slot.as_ref() {
            if current.age() < self.ttl {
                return Ok(current.clone());
            }
        }

        let fresh = Arc::new(refresh().await?);
        debug!("🔄 Market cache refreshed with {} pairs", fresh.len());
        *slot = Some(fresh.clone());
        Ok(fresh)
    }

    /// Last stored snapshot without refreshing
    pub async fn peek(&self) -> Option<Arc<MarketSnapshot>> {
        self.slot.lock().await.clone()
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

/// Short-lived per-pair order books
#[derive(Debug)]
pub struct BoardCache {
    ttl: Duration,
    entries: Mutex<HashMap<CurrencyPair, (Instant, Board)>>,
}

impl BoardCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_fetch<F, Fut>(&self, pair: &CurrencyPair, fetch: F) -> Result<Board>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Board>>,
    {
        if let Some((at, board)) = self.entries.lock().await.get(pair) {
            if at.elapsed() < self.ttl {
                return Ok(board.clone());
            }
        }

        let board = fetch().await?;
        if !self.ttl.is_zero() {
            self.entries
                .lock()
                .await
                .insert(pair.clone(), (Instant::now(), board.clone()));
        }
        Ok(board)
    }
}

/// Pair listing plus the codec built from its settlement set
#[derive(Debug, Clone)]
pub struct PairUniverse {
    pairs: Vec<CurrencyPair>,
    index: HashSet<CurrencyPair>,
    codec: SymbolCodec,
}

impl PairUniverse {
    pub fn new(mut pairs: Vec<CurrencyPair>, style: SymbolStyle) -> Self {
        pairs.sort();
        pairs.dedup();
        let codec = SymbolCodec::from_pairs(style, &pairs);
        let index = pairs.iter().cloned().collect();
        Self { pairs, index, codec }
    }

    pub fn pairs(&self) -> &[CurrencyPair] {
        &self.pairs
    }

    pub fn contains(&self, pair: &CurrencyPair) -> bool {
        self.index.contains(pair)
    }

    pub fn codec(&self) -> &SymbolCodec {
        &self.codec
    }

    /// Venue symbol for a pair
    pub fn symbol(&self, pair: &CurrencyPair) -> String {
        self.codec.format_pair(pair)
    }

    pub fn parse(&self, symbol: &str) -> Result<CurrencyPair> {
        self.codec.parse(symbol)
    }

    /// Listed pair or `UnknownPair`
    pub fn require(&self, pair: &CurrencyPair) -> Result<()> {
        if self.contains(pair) {
            Ok(())
        } else {
            Err(ExchangeError::UnknownPair(pair.to_string()))
        }
    }
}

/// Lazily loaded pair listing, kept until explicitly refreshed
#[derive(Debug, Default)]
pub struct PairCache {
    slot: Mutex<Option<Arc<PairUniverse>>>,
}

impl PairCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<PairUniverse>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PairUniverse>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(universe) = slot.as_ref() {
            return Ok(universe.clone());
        }
        let universe = Arc::new(load().await?);
        info!("📚 Listed {} currency pairs", universe.pairs().len());
        *slot = Some(universe.clone());
        Ok(universe)
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
