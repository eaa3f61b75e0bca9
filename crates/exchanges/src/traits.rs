//! Exchange traits defining the uniform interface
//!
//! [`Exchange`] is the public market-data contract and [`TradingExchange`]
//! adds the private account and order operations. Every venue adapter in
//! this crate implements both; the registry hands them out as
//! `Box<dyn TradingExchange>`.
//!
//! Futures are not `Send` (monoio is thread-per-core), hence `?Send`.

use crate::auth::Credentials;
use crate::config::ExchangeConfig;
use crate::errors::Result;
use crate::http::HttpTransport;
use crate::types::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Public market data
#[async_trait(?Send)]
pub trait Exchange: Send + Sync {
    /// Lower-case venue name
    fn name(&self) -> &str;

    /// Every pair the venue lists; loaded once and kept
    async fn currency_pairs(&self) -> Result<Vec<CurrencyPair>>;

    /// Drop the cached listing and list again
    async fn refresh_currency_pairs(&self) -> Result<Vec<CurrencyPair>>;

    /// Last trade price; 1 for an identity pair
    async fn rate(&self, trading: &str, settlement: &str) -> Result<f64>;

    /// 24h volume, settlement-denominated where the venue reports it
    async fn volume(&self, trading: &str, settlement: &str) -> Result<f64>;

    /// Best ask and bid for every pair in the current snapshot
    async fn order_book_tick_map(&self) -> Result<PairMap<OrderBookTick>>;

    /// Assets with deposits or withdrawals disabled
    async fn frozen_currency(&self) -> Result<Vec<String>>;

    /// Order book, cached for at most a few seconds
    async fn board(&self, trading: &str, settlement: &str) -> Result<Board>;

    /// Price and amount decimals for a pair
    async fn precise(&self, trading: &str, settlement: &str) -> Result<Precisions>;
}

/// Account and order operations
#[async_trait(?Send)]
pub trait TradingExchange: Exchange {
    async fn trade_fee_rate(&self, trading: &str, settlement: &str) -> Result<TradeFee>;

    /// Withdrawal fee per asset
    async fn transfer_fee(&self) -> Result<HashMap<String, f64>>;

    /// Available amount per asset
    async fn balances(&self) -> Result<HashMap<String, f64>>;

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>>;

    /// Place a limit order and return the venue's order id.
    ///
    /// `Ask` buys and `Bid` sells. Price and amount are truncated to the
    /// pair's precision first.
    async fn order(
        &self,
        trading: &str,
        settlement: &str,
        order_type: OrderType,
        price: f64,
        amount: f64,
    ) -> Result<String>;

    /// Succeeds when the venue cancels the order or no longer knows it
    async fn cancel_order(&self, order: &Order) -> Result<()>;

    /// True once the order is no longer open
    async fn is_order_filled(&self, order: &Order) -> Result<bool>;

    async fn active_orders(&self) -> Result<Vec<Order>>;

    /// Request a withdrawal; returns once the venue accepts it
    async fn transfer(&self, asset: &str, address: &str, amount: f64, extra_fee: f64) -> Result<()>;

    /// Deposit address for an asset
    async fn address(&self, asset: &str) -> Result<String>;
}

/// Builds adapters by venue name
pub trait ExchangeFactory: Send + Sync {
    /// Adapter talking to the venue over HTTPS
    fn create(
        &self,
        name: &str,
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
    ) -> Result<Box<dyn TradingExchange>>;

    /// Adapter over a caller-supplied transport
    fn create_with_transport(
        &self,
        name: &str,
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Box<dyn TradingExchange>>;

    /// Names accepted by `create`
    fn supported_exchanges(&self) -> Vec<String>;
}
