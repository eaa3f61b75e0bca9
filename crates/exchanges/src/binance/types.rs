//! Binance wire types
//!
//! Only the fields the adapter reads are declared; serde ignores the rest.
//! Binance sends most decimals as strings.

use crate::json::flexible_f64;
use serde::{Deserialize, Serialize};

/// Binance order status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinanceOrderStatus {
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "PARTIALLY_FILLED")]
    PartiallyFilled,
    #[serde(rename = "FILLED")]
    Filled,
    #[serde(rename = "CANCELED")]
    Canceled,
    #[serde(rename = "PENDING_CANCEL")]
    PendingCancel,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "EXPIRED")]
    Expired,
    #[serde(other)]
    Unknown,
}

impl BinanceOrderStatus {
    /// Still resting on the book
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            BinanceOrderStatus::New | BinanceOrderStatus::PartiallyFilled | BinanceOrderStatus::PendingCancel
        )
    }
}

/// `GET /api/v3/exchangeInfo`
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

impl SymbolInfo {
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }

    /// First filter of the given type
    pub fn filter(&self, filter_type: &str) -> Option<&SymbolFilter> {
        self.filters.iter().find(|f| f.filter_type == filter_type)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFilter {
    pub filter_type: String,
    pub tick_size: Option<String>,
    pub step_size: Option<String>,
}

/// One row of `GET /api/v3/ticker/24hr`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24hr {
    pub symbol: String,
    #[serde(deserialize_with = "flexible_f64")]
    pub last_price: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pub quote_volume: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pub bid_price: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pub ask_price: f64,
}

/// `GET /api/v3/account`
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub balances: Vec<AccountBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountBalance {
    pub asset: String,
    #[serde(deserialize_with = "flexible_f64")]
    pub free: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pub locked: f64,
}

/// `POST /api/v3/order` acknowledgement
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub symbol: String,
    pub order_id: u64,
}

/// `GET /api/v3/order` and rows of `GET /api/v3/openOrders`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    pub symbol: String,
    pub order_id: u64,
    #[serde(deserialize_with = "flexible_f64")]
    pub price: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pub orig_qty: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pub executed_qty: f64,
    pub status: BinanceOrderStatus,
    pub side: String,
}

/// One row of `GET /sapi/v1/asset/tradeFee`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeFeeEntry {
    pub symbol: String,
    #[serde(deserialize_with = "flexible_f64")]
    pub maker_commission: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pub taker_commission: f64,
}

/// One row of `GET /sapi/v1/capital/config/getall`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinConfig {
    pub coin: String,
    pub deposit_all_enable: bool,
    pub withdraw_all_enable: bool,
    #[serde(default)]
    pub network_list: Vec<CoinNetwork>,
}

impl CoinConfig {
    /// Fee on the default network, or the first network listed
    pub fn withdraw_fee(&self) -> Option<f64> {
        self.network_list
            .iter()
            .find(|n| n.is_default)
            .or_else(|| self.network_list.first())
            .map(|n| n.withdraw_fee)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinNetwork {
    pub network: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(deserialize_with = "flexible_f64")]
    pub withdraw_fee: f64,
}

/// `GET /sapi/v1/capital/deposit/address`
#[derive(Debug, Clone, Deserialize)]
pub struct DepositAddress {
    pub address: String,
}
