//! Shrimpy developer API adapter
//!
//! Shrimpy fronts another venue (`ExchangeConfig::shrimpy_exchange`). Its
//! ticker quotes every asset in BTC and USD rather than per pair, so rates
//! are cross rates and volumes are unknown. Private calls go through the
//! linked account, looked up once by exchange name.

use crate::adapter::{unsupported, Adapter, VenueMarket, VenueTrading};
use crate::auth::{Credentials, Signer, SigningScheme};
use crate::cache::{MarketSnapshot, PairUniverse};
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::http::HttpTransport;
use crate::json::{array_at, flexible_f64, id_at, levels, opt_f64_at, typed};
use crate::precision::PrecisionMap;
use crate::rest::{ApiRequest, RestClient};
use crate::symbol::{SymbolCase, SymbolStyle};
use crate::types::*;
use async_trait::async_trait;
use futures_util::lock::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

const PRICE_DECIMALS: u32 = 8;
const AMOUNT_DECIMALS: u32 = 8;
const TRADE_FEE: f64 = 0.001;
const BOOK_LIMIT: &str = "100";

pub type ShrimpyExchange = Adapter<Shrimpy>;

pub struct Shrimpy {
    rest: RestClient,
    exchange: String,
    account_id: Mutex<Option<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradingPairRow {
    base_trading_symbol: String,
    quote_trading_symbol: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceRow {
    symbol: String,
    #[serde(deserialize_with = "flexible_f64")]
    native_value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRow {
    id: String,
    base_symbol: String,
    quote_symbol: String,
    side: String,
    #[serde(deserialize_with = "flexible_f64")]
    price: f64,
    #[serde(deserialize_with = "flexible_f64")]
    quantity: f64,
    #[serde(default)]
    status: String,
}

impl OrderRow {
    fn is_open(&self) -> bool {
        matches!(self.status.as_str(), "queued" | "open" | "pending")
    }
}

impl Shrimpy {
    pub const NAME: &'static str = "shrimpy";
    pub const BASE_URL: &'static str = "https://dev-api.shrimpy.io";

    pub fn new(
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let signer = Signer::new(SigningScheme::Shrimpy, credentials);
        let rest = RestClient::new(Self::NAME, config.base_url_or(Self::BASE_URL), transport, signer)?
            .with_error_probe(error_probe)
            .with_timing(config.enable_timing);
        Ok(Self {
            rest,
            exchange: config.shrimpy_exchange.to_lowercase(),
            account_id: Mutex::new(None),
        })
    }

    /// Linked account for the routed exchange, fetched on first use
    async fn account_id(&self) -> Result<String> {
        let mut slot = self.account_id.lock().await;
        if let Some(id) = slot.as_ref() {
            return Ok(id.clone());
        }
        let reply = self.rest.private_call_json(ApiRequest::get("/v1/accounts")).await?;
        let account = array_at(&reply, "")?
            .iter()
            .find(|a| {
                a.get("exchange")
                    .and_then(Value::as_str)
                    .is_some_and(|e| e.eq_ignore_ascii_case(&self.exchange))
            })
            .ok_or_else(|| ExchangeError::schema(format!("no {} account linked", self.exchange)))?;
        let id = id_at(account, "/id")?;
        info!("🔑 Shrimpy account {} for {}", id, self.exchange);
        *slot = Some(id.clone());
        Ok(id)
    }

    async fn order_row(&self, order_id: &str) -> Result<OrderRow> {
        let path = format!("/v1/accounts/{}/orders/{}", self.account_id().await?, order_id);
        typed(self.rest.private_call_json(ApiRequest::get(path)).await?)
    }
}

/// `{"error": "Invalid signature"}`
fn error_probe(status: u16, body: &Value) -> Option<ExchangeError> {
    let message = body.get("error")?.as_str()?;
    let lower = message.to_ascii_lowercase();
    Some(if status == 401 || lower.contains("signature") || lower.contains("api key") {
        ExchangeError::AuthFailure(message.to_string())
    } else {
        ExchangeError::venue(status.to_string(), message)
    })
}

pub fn create(
    credentials: Option<Credentials>,
    config: &ExchangeConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<ShrimpyExchange> {
    Ok(Adapter::new(Shrimpy::new(credentials, config, transport)?, config))
}

#[async_trait(?Send)]
impl VenueMarket for Shrimpy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbol_style(&self) -> SymbolStyle {
        SymbolStyle::delimited('-', SymbolCase::Upper)
    }

    async fn fetch_currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        let path = format!("/v1/exchanges/{}/trading_pairs", self.exchange);
        let rows: Vec<TradingPairRow> = typed(self.rest.public_get_json(&path, &[]).await?)?;
        Ok(rows
            .iter()
            .filter_map(|r| CurrencyPair::new(&r.base_trading_symbol, &r.quote_trading_symbol).ok())
            .collect())
    }

    async fn fetch_market(&self, universe: &PairUniverse) -> Result<MarketSnapshot> {
        let path = format!("/v1/exchanges/{}/ticker", self.exchange);
        let reply = self.rest.public_get_json(&path, &[]).await?;

        let mut btc_prices: HashMap<String, f64> = HashMap::new();
        let mut usd_prices: HashMap<String, f64> = HashMap::new();
        for row in array_at(&reply, "")? {
            let Some(symbol) = row.get("symbol").and_then(Value::as_str) else {
                continue;
            };
            let symbol = symbol.to_uppercase();
            if let Some(btc) = opt_f64_at(row, "/priceBtc").filter(|p| *p > 0.0) {
                btc_prices.insert(symbol.clone(), btc);
            }
            if let Some(usd) = opt_f64_at(row, "/priceUsd").filter(|p| *p > 0.0) {
                usd_prices.insert(symbol, usd);
            }
        }

        let cross = |prices: &HashMap<String, f64>, pair: &CurrencyPair| {
            Some(prices.get(&pair.trading)? / prices.get(&pair.settlement)?)
        };
        let mut builder = MarketSnapshot::builder();
        for pair in universe.pairs() {
            match cross(&btc_prices, pair).or_else(|| cross(&usd_prices, pair)) {
                Some(rate) => builder.insert(pair, rate, 0.0, 0.0, 0.0),
                None => debug!("no cross rate for {}", pair),
            }
        }
        Ok(builder.build())
    }

    async fn fetch_precisions(&self, universe: &PairUniverse) -> Result<PrecisionMap> {
        let precisions = Precisions::new(PRICE_DECIMALS, AMOUNT_DECIMALS)?;
        Ok(universe.pairs().iter().map(|pair| (pair.clone(), precisions)).collect())
    }

    async fn fetch_board(&self, _universe: &PairUniverse, pair: &CurrencyPair) -> Result<Board> {
        let reply = self
            .rest
            .public_get_json(
                "/v1/orderbooks",
                &[
                    ("exchange", self.exchange.as_str()),
                    ("baseSymbol", pair.trading.as_str()),
                    ("quoteSymbol", pair.settlement.as_str()),
                    ("limit", BOOK_LIMIT),
                ],
            )
            .await?;
        let book = reply.pointer("/0/orderBooks/0/orderBook");
        Ok(Board::from_levels(
            levels(book.and_then(|b| b.get("asks"))),
            levels(book.and_then(|b| b.get("bids"))),
        ))
    }

    async fn fetch_frozen_currency(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[async_trait(?Send)]
impl VenueTrading for Shrimpy {
    async fn trade_fee_rate(&self, _universe: &PairUniverse, _pair: &CurrencyPair) -> Result<TradeFee> {
        Ok(TradeFee::flat(TRADE_FEE))
    }

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>> {
        unsupported(Self::NAME, "transfer fee")
    }

    // the aggregator reports holdings only, nothing is split out as on-order
    async fn complete_balances(&self) -> Result<HashMap<String, Balance>> {
        let path = format!("/v1/accounts/{}/balance", self.account_id().await?);
        let reply = self.rest.private_call_json(ApiRequest::get(path)).await?;
        let rows: Vec<BalanceRow> = typed(reply.get("balances").cloned().unwrap_or_default())?;
        Ok(rows
            .into_iter()
            .map(|row| (row.symbol.to_uppercase(), Balance::new(row.native_value, 0.0)))
            .collect())
    }

    async fn place_order(
        &self,
        _universe: &PairUniverse,
        pair: &CurrencyPair,
        order_type: OrderType,
        price: &str,
        amount: &str,
    ) -> Result<String> {
        let body = json!({
            "baseSymbol": pair.trading,
            "quoteSymbol": pair.settlement,
            "quantity": amount,
            "price": price,
            "side": if order_type.is_buy() { "BUY" } else { "SELL" },
            "timeInForce": "GTC",
        });
        let path = format!("/v1/accounts/{}/orders", self.account_id().await?);
        let reply = self.rest.private_call_json(ApiRequest::post(path).json(body)).await?;
        id_at(&reply, "/id")
    }

    async fn cancel_order(&self, _universe: &PairUniverse, order: &Order) -> Result<()> {
        let path = format!("/v1/accounts/{}/orders/{}", self.account_id().await?, order.exchange_order_id);
        self.rest.private_call(ApiRequest::delete(path)).await.map(|_| ())
    }

    async fn is_order_filled(&self, _universe: &PairUniverse, order: &Order) -> Result<bool> {
        Ok(!self.order_row(&order.exchange_order_id).await?.is_open())
    }

    async fn active_orders(&self, _universe: &PairUniverse) -> Result<Vec<Order>> {
        let path = format!("/v1/accounts/{}/orders", self.account_id().await?);
        let rows: Vec<OrderRow> = typed(self.rest.private_call_json(ApiRequest::get(path)).await?)?;
        rows.into_iter()
            .filter(OrderRow::is_open)
            .map(|row| {
                Ok(Order {
                    exchange_order_id: row.id,
                    order_type: OrderType::from_side(&row.side)?,
                    trading: row.base_symbol.to_uppercase(),
                    settlement: row.quote_symbol.to_uppercase(),
                    price: row.price,
                    amount: row.quantity,
                })
            })
            .collect()
    }

    async fn transfer(&self, _asset: &str, _address: &str, _amount: f64, _extra_fee: f64) -> Result<()> {
        unsupported(Self::NAME, "transfer")
    }

    async fn address(&self, _asset: &str) -> Result<String> {
        unsupported(Self::NAME, "address")
    }
}
