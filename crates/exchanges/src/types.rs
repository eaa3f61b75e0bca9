//! Common exchange types and data structures
//!
//! Quantities crossing the façade are plain `f64`s; exact decimal handling
//! happens once, when an order is formatted for the wire.

use crate::errors::{ExchangeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Nested mapping `trading -> settlement -> value`
pub type PairMap<T> = HashMap<String, HashMap<String, T>>;

/// A (trading, settlement) pair, both upper-case asset codes.
///
/// In `ETH/BTC` the trading asset is ETH and prices are quoted in BTC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub trading: String,
    pub settlement: String,
}

impl CurrencyPair {
    /// Build a pair, normalising to upper case.
    ///
    /// Fails with `UnknownPair` when either side is empty or both are equal.
    pub fn new(trading: &str, settlement: &str) -> Result<Self> {
        let trading = trading.trim().to_uppercase();
        let settlement = settlement.trim().to_uppercase();
        if trading.is_empty() || settlement.is_empty() || trading == settlement {
            return Err(ExchangeError::UnknownPair(format!("{trading}/{settlement}")));
        }
        Ok(Self { trading, settlement })
    }

    /// Lookup key for an arbitrary (possibly identity) request
    pub(crate) fn key(trading: &str, settlement: &str) -> Self {
        Self {
            trading: trading.to_uppercase(),
            settlement: settlement.to_uppercase(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.trading == self.settlement
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.trading, self.settlement)
    }
}

/// Decimal places a venue accepts for one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Precisions {
    pub price_precision: u32,
    pub amount_precision: u32,
}

impl Precisions {
    pub const MAX: u32 = unifex_core::fixed::MAX_SCALE;

    pub fn new(price_precision: u32, amount_precision: u32) -> Result<Self> {
        if price_precision > Self::MAX || amount_precision > Self::MAX {
            return Err(ExchangeError::schema(format!(
                "precision out of range: price {price_precision}, amount {amount_precision}"
            )));
        }
        Ok(Self {
            price_precision,
            amount_precision,
        })
    }
}

/// Order intent.
///
/// `Ask` is a buy and `Bid` is a sell. Every adapter maps them that way on
/// the wire (e.g. Binance `Bid -> side=SELL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Ask,
    Bid,
}

impl OrderType {
    /// True when the venue side is "buy"
    pub fn is_buy(&self) -> bool {
        matches!(self, OrderType::Ask)
    }

    /// Map a venue side string ("buy"/"BUY"/"sell"/...) back to an intent
    pub fn from_side(side: &str) -> Result<Self> {
        match side.to_ascii_lowercase().as_str() {
            "buy" | "buy-limit" | "bid_buy" => Ok(OrderType::Ask),
            "sell" | "sell-limit" | "ask_sell" => Ok(OrderType::Bid),
            other => Err(ExchangeError::schema(format!("unknown order side: {other}"))),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Ask => write!(f, "ASK"),
            OrderType::Bid => write!(f, "BID"),
        }
    }
}

/// One price level of a board
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardOrder {
    pub price: f64,
    pub amount: f64,
    pub order_type: OrderType,
}

/// Order-book snapshot: asks ascending, bids descending, all levels positive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub asks: Vec<BoardOrder>,
    pub bids: Vec<BoardOrder>,
}

impl Board {
    /// Build from raw `(price, amount)` levels in any order.
    ///
    /// Non-positive or non-finite levels are dropped.
    pub fn from_levels(asks: Vec<(f64, f64)>, bids: Vec<(f64, f64)>) -> Self {
        fn side(levels: Vec<(f64, f64)>, order_type: OrderType) -> Vec<BoardOrder> {
            levels
                .into_iter()
                .filter(|(p, a)| p.is_finite() && a.is_finite() && *p > 0.0 && *a > 0.0)
                .map(|(price, amount)| BoardOrder { price, amount, order_type })
                .collect()
        }

        let mut asks = side(asks, OrderType::Ask);
        let mut bids = side(bids, OrderType::Bid);
        asks.sort_by(|a, b| a.price.total_cmp(&b.price));
        bids.sort_by(|a, b| b.price.total_cmp(&a.price));
        Self { asks, bids }
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|level| level.price)
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|level| level.price)
    }

    /// Get bid-ask spread
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Get mid price
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }
}

/// Per-asset balance
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub available: f64,
    pub on_orders: f64,
}

impl Balance {
    pub fn new(available: f64, on_orders: f64) -> Self {
        Self {
            available: available.max(0.0),
            on_orders: on_orders.max(0.0),
        }
    }

    /// Get total balance (available + on orders)
    pub fn total(&self) -> f64 {
        self.available + self.on_orders
    }
}

/// An open order as reported by a venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub exchange_order_id: String,
    pub order_type: OrderType,
    pub trading: String,
    pub settlement: String,
    pub price: f64,
    pub amount: f64,
}

impl Order {
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::key(&self.trading, &self.settlement)
    }
}

/// Maker and taker rates, e.g. `0.001` for 0.1 %
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeFee {
    pub maker_fee: f64,
    pub taker_fee: f64,
}

impl TradeFee {
    pub fn flat(rate: f64) -> Self {
        Self {
            maker_fee: rate,
            taker_fee: rate,
        }
    }
}

/// Top of book carried alongside rates and volumes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderBookTick {
    pub best_ask_price: f64,
    pub best_bid_price: f64,
}
