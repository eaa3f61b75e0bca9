//! Adapter façade shared by all venues
//!
//! A venue module implements the two hook traits, [`VenueMarket`] and
//! [`VenueTrading`], which only talk to the wire. [`Adapter`] wraps a venue
//! with the pair, market, precision and board caches and implements the
//! public [`Exchange`] and [`TradingExchange`] contracts on top of them, so
//! cache policy, identity pairs and order formatting live in one place.

use crate::cache::{BoardCache, MarketCache, MarketSnapshot, PairCache, PairUniverse};
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::precision::{PrecisionMap, PrecisionRegistry};
use crate::symbol::SymbolStyle;
use crate::traits::{Exchange, TradingExchange};
use crate::types::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use unifex_core::{floor_format, log_order};

/// Market-data hooks of one venue
#[async_trait(?Send)]
pub trait VenueMarket: Send + Sync {
    fn name(&self) -> &'static str;

    fn symbol_style(&self) -> SymbolStyle;

    async fn fetch_currency_pairs(&self) -> Result<Vec<CurrencyPair>>;

    /// One full refresh of rates, volumes and ticks
    async fn fetch_market(&self, universe: &PairUniverse) -> Result<MarketSnapshot>;

    /// Precision for every pair the venue describes
    async fn fetch_precisions(&self, universe: &PairUniverse) -> Result<PrecisionMap>;

    async fn fetch_board(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<Board>;

    async fn fetch_frozen_currency(&self) -> Result<Vec<String>>;
}

/// Account and order hooks of one venue
#[async_trait(?Send)]
pub trait VenueTrading: VenueMarket {
    async fn trade_fee_rate(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<TradeFee>;

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>>;

    async fn balances(&self) -> Result<HashMap<String, f64>> {
        Ok(self
            .complete_balances()
            .await?
            .into_iter()
            .map(|(asset, balance)| (asset, balance.available))
            .collect())
    }

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>>;

    /// `price` and `amount` are already truncated venue literals
    async fn place_order(
        &self,
        universe: &PairUniverse,
        pair: &CurrencyPair,
        order_type: OrderType,
        price: &str,
        amount: &str,
    ) -> Result<String>;

    /// Must succeed when the venue reports the order as already gone
    async fn cancel_order(&self, universe: &PairUniverse, order: &Order) -> Result<()>;

    async fn is_order_filled(&self, universe: &PairUniverse, order: &Order) -> Result<bool> {
        let open = self.active_orders(universe).await?;
        Ok(!open.iter().any(|o| o.exchange_order_id == order.exchange_order_id))
    }

    async fn active_orders(&self, universe: &PairUniverse) -> Result<Vec<Order>>;

    async fn transfer(&self, asset: &str, address: &str, amount: f64, extra_fee: f64) -> Result<()>;

    async fn address(&self, asset: &str) -> Result<String>;
}

/// A venue plus the caches every adapter owns
pub struct Adapter<V> {
    venue: V,
    pairs: PairCache,
    market: MarketCache,
    precisions: PrecisionRegistry,
    boards: BoardCache,
}

impl<V: VenueMarket> Adapter<V> {
    pub fn new(venue: V, config: &ExchangeConfig) -> Self {
        debug!(
            "🔗 {} adapter created (rate cache {:?}, board cache {:?})",
            venue.name(),
            config.rate_cache_duration(),
            config.board_cache_duration()
        );
        Self {
            venue,
            pairs: PairCache::new(),
            market: MarketCache::new(config.rate_cache_duration()),
            precisions: PrecisionRegistry::new(),
            boards: BoardCache::new(config.board_cache_duration()),
        }
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    /// Pair listing and codec, listed on first use
    pub async fn universe(&self) -> Result<Arc<PairUniverse>> {
        self.pairs
            .get_or_load(|| async {
                let pairs = self.venue.fetch_currency_pairs().await?;
                Ok(PairUniverse::new(pairs, self.venue.symbol_style()))
            })
            .await
    }

    /// Current market snapshot, refreshed when stale
    pub async fn market(&self) -> Result<Arc<MarketSnapshot>> {
        self.market
            .snapshot(|| async {
                let universe = self.universe().await?;
                self.venue.fetch_market(&universe).await
            })
            .await
    }

    async fn listed_pair(&self, trading: &str, settlement: &str) -> Result<(Arc<PairUniverse>, CurrencyPair)> {
        let pair = CurrencyPair::new(trading, settlement)?;
        let universe = self.universe().await?;
        universe.require(&pair)?;
        Ok((universe, pair))
    }
}

fn is_identity(trading: &str, settlement: &str) -> bool {
    trading.eq_ignore_ascii_case(settlement)
}

#[async_trait(?Send)]
impl<V: VenueMarket> Exchange for Adapter<V> {
    fn name(&self) -> &str {
        self.venue.name()
    }

    async fn currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        Ok(self.universe().await?.pairs().to_vec())
    }

    async fn refresh_currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        self.pairs.invalidate().await;
        self.precisions.invalidate().await;
        self.currency_pairs().await
    }

    async fn rate(&self, trading: &str, settlement: &str) -> Result<f64> {
        if is_identity(trading, settlement) {
            return Ok(1.0);
        }
        let pair = CurrencyPair::new(trading, settlement)?;
        self.market()
            .await?
            .rate(&pair)
            .ok_or_else(|| ExchangeError::UnknownPair(pair.to_string()))
    }

    async fn volume(&self, trading: &str, settlement: &str) -> Result<f64> {
        let pair = CurrencyPair::new(trading, settlement)?;
        self.market()
            .await?
            .volume(&pair)
            .ok_or_else(|| ExchangeError::UnknownPair(pair.to_string()))
    }

    async fn order_book_tick_map(&self) -> Result<PairMap<OrderBookTick>> {
        Ok(self.market().await?.ticks().clone())
    }

    async fn frozen_currency(&self) -> Result<Vec<String>> {
        let mut frozen = self.venue.fetch_frozen_currency().await?;
        frozen.sort();
        frozen.dedup();
        Ok(frozen)
    }

    async fn board(&self, trading: &str, settlement: &str) -> Result<Board> {
        let (universe, pair) = self.listed_pair(trading, settlement).await?;
        self.boards
            .get_or_fetch(&pair, || self.venue.fetch_board(&universe, &pair))
            .await
    }

    async fn precise(&self, trading: &str, settlement: &str) -> Result<Precisions> {
        if is_identity(trading, settlement) {
            return Ok(Precisions::default());
        }
        let (universe, pair) = self.listed_pair(trading, settlement).await?;
        self.precisions
            .get_or_load(&pair, || self.venue.fetch_precisions(&universe))
            .await
    }
}

#[async_trait(?Send)]
impl<V: VenueTrading> TradingExchange for Adapter<V> {
    async fn trade_fee_rate(&self, trading: &str, settlement: &str) -> Result<TradeFee> {
        let (universe, pair) = self.listed_pair(trading, settlement).await?;
        self.venue.trade_fee_rate(&universe, &pair).await
    }

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>> {
        self.venue.transfer_fee().await
    }

    async fn balances(&self) -> Result<HashMap<String, f64>> {
        self.venue.balances().await
    }

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>> {
        self.venue.complete_balances().await
    }

    async fn order(
        &self,
        trading: &str,
        settlement: &str,
        order_type: OrderType,
        price: f64,
        amount: f64,
    ) -> Result<String> {
        let (universe, pair) = self.listed_pair(trading, settlement).await?;
        let precisions = self.precise(trading, settlement).await?;

        let price_text = floor_format(price, precisions.price_precision)?;
        let amount_text = floor_format(amount, precisions.amount_precision)?;
        for (what, value, text) in [("price", price, &price_text), ("amount", amount, &amount_text)] {
            if !(value > 0.0) || text.chars().all(|c| c == '0' || c == '.') {
                return Err(ExchangeError::FixedPointError(format!(
                    "{what} {value} is not positive at the precision of {pair}"
                )));
            }
        }

        let id = self
            .venue
            .place_order(&universe, &pair, order_type, &price_text, &amount_text)
            .await?;
        log_order!(format!("PLACED {order_type} {amount_text}@{price_text}"), id, pair);
        Ok(id)
    }

    async fn cancel_order(&self, order: &Order) -> Result<()> {
        let universe = self.universe().await?;
        self.venue.cancel_order(&universe, order).await?;
        log_order!("CANCELLED", order.exchange_order_id, order.pair());
        Ok(())
    }

    async fn is_order_filled(&self, order: &Order) -> Result<bool> {
        let universe = self.universe().await?;
        self.venue.is_order_filled(&universe, order).await
    }

    async fn active_orders(&self) -> Result<Vec<Order>> {
        let universe = self.universe().await?;
        self.venue.active_orders(&universe).await
    }

    async fn transfer(&self, asset: &str, address: &str, amount: f64, extra_fee: f64) -> Result<()> {
        if !(amount > 0.0) {
            return Err(ExchangeError::FixedPointError(format!("transfer amount {amount} is not positive")));
        }
        self.venue
            .transfer(&asset.to_uppercase(), address, amount, extra_fee)
            .await
    }

    async fn address(&self, asset: &str) -> Result<String> {
        self.venue.address(&asset.to_uppercase()).await
    }
}

/// Markets worth querying for open orders: those whose trading or
/// settlement asset has a non-zero on-order balance
pub fn markets_with_frozen_balance(
    universe: &PairUniverse,
    balances: &HashMap<String, Balance>,
) -> Vec<CurrencyPair> {
    let frozen: HashSet<&str> = balances
        .iter()
        .filter(|(_, balance)| balance.on_orders > 0.0)
        .map(|(asset, _)| asset.as_str())
        .collect();
    universe
        .pairs()
        .iter()
        .filter(|pair| frozen.contains(pair.trading.as_str()) || frozen.contains(pair.settlement.as_str()))
        .cloned()
        .collect()
}

/// Venue operation with no endpoint behind it
pub(crate) fn unsupported<T>(venue: &str, operation: &str) -> Result<T> {
    Err(ExchangeError::FeatureNotSupported(format!("{venue} {operation}")))
}
