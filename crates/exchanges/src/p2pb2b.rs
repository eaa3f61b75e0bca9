//! P2PB2B API v2 adapter
//!
//! Markets are `_`-delimited (`ETH_BTC`). Private calls are JSON POSTs whose
//! body carries the request path and a nonce; the signature travels in
//! `X-TXC-*` headers. The venue publishes no withdrawal or deposit-address
//! endpoints.

use crate::adapter::{markets_with_frozen_balance, unsupported, Adapter, VenueMarket, VenueTrading};
use crate::auth::{Credentials, Signer, SigningScheme};
use crate::cache::{MarketSnapshot, PairUniverse};
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::fanout::try_fan_out;
use crate::http::HttpTransport;
use crate::json::{array_at, decimals, flag, flexible_f64, id_at, levels, num, typed, Rows, SymbolSource, TickerSchema};
use crate::precision::{self, PrecisionMap};
use crate::rest::{ApiRequest, RestClient};
use crate::symbol::{SymbolCase, SymbolStyle};
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

// `deal` is the 24h turnover in the money (settlement) asset
const TICKER: TickerSchema = TickerSchema {
    rows: Rows::Keyed("/result"),
    symbol: SymbolSource::Key,
    last: "/ticker/last",
    volume: Some("/ticker/deal"),
    bid: Some("/ticker/bid"),
    ask: Some("/ticker/ask"),
};

const TRADE_FEE: f64 = 0.002;
const BOOK_LIMIT: &str = "100";
const OPEN_ORDER_LIMIT: u32 = 100;

const TRANSFER_FEES: &[(&str, f64)] = &[
    ("BTC", 0.0005),
    ("ETH", 0.005),
    ("LTC", 0.001),
    ("USDT", 5.0),
    ("XRP", 0.25),
    ("BCH", 0.001),
    ("DOGE", 5.0),
];

pub type P2pb2bExchange = Adapter<P2pb2b>;

pub struct P2pb2b {
    rest: RestClient,
    width: usize,
}

#[derive(Debug, Deserialize)]
struct MarketRow {
    stock: String,
    money: String,
    #[serde(default)]
    precision: MarketPrecision,
}

#[derive(Debug, Default, Deserialize)]
struct MarketPrecision {
    #[serde(default)]
    money: Value,
    #[serde(default)]
    stock: Value,
}

#[derive(Debug, Deserialize)]
struct BalanceRow {
    #[serde(deserialize_with = "flexible_f64")]
    available: f64,
    #[serde(deserialize_with = "flexible_f64")]
    freeze: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRow {
    order_id: Value,
    market: String,
    side: String,
    #[serde(deserialize_with = "flexible_f64")]
    price: f64,
    #[serde(deserialize_with = "flexible_f64")]
    left: f64,
}

impl P2pb2b {
    pub const NAME: &'static str = "p2pb2b";
    pub const BASE_URL: &'static str = "https://api.p2pb2b.io";

    pub fn new(
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let signer = Signer::new(SigningScheme::P2pb2b, credentials);
        let rest = RestClient::new(Self::NAME, config.base_url_or(Self::BASE_URL), transport, signer)?
            .with_error_probe(error_probe)
            .with_timing(config.enable_timing);
        Ok(Self {
            rest,
            width: config.fan_out_width(),
        })
    }

    async fn markets(&self) -> Result<Vec<MarketRow>> {
        let reply = self.rest.public_get_json("/api/v2/public/markets", &[]).await?;
        typed(reply.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn book_side(&self, market: &str, side: &str) -> Result<Vec<(f64, f64)>> {
        let reply = self
            .rest
            .public_get_json(
                "/api/v2/public/book",
                &[("market", market), ("side", side), ("offset", "0"), ("limit", BOOK_LIMIT)],
            )
            .await?;
        Ok(levels(reply.pointer("/result/orders")))
    }

    async fn signed(&self, path: &str, body: Value) -> Result<Value> {
        let reply = self.rest.private_call_json(ApiRequest::post(path).json(body)).await?;
        Ok(reply.get("result").cloned().unwrap_or(Value::Null))
    }
}

/// `{"success": false, "errorCode": 3080, "message": "..", "result": []}`
fn error_probe(status: u16, body: &Value) -> Option<ExchangeError> {
    if body.get("success").and_then(flag) != Some(false) {
        return None;
    }
    let code = body
        .get("errorCode")
        .and_then(num)
        .map(|c| (c as i64).to_string())
        .unwrap_or_else(|| status.to_string());
    let message = body.get("message").and_then(Value::as_str).unwrap_or("request rejected");
    Some(if status == 401 || message.to_ascii_lowercase().contains("authenticat") {
        ExchangeError::AuthFailure(format!("{code}: {message}"))
    } else {
        ExchangeError::venue(code, message)
    })
}

fn is_missing_order(e: &ExchangeError) -> bool {
    e.venue_message()
        .is_some_and(|m| m.to_ascii_lowercase().contains("not found"))
}

pub fn create(
    credentials: Option<Credentials>,
    config: &ExchangeConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<P2pb2bExchange> {
    Ok(Adapter::new(P2pb2b::new(credentials, config, transport)?, config))
}

#[async_trait(?Send)]
impl VenueMarket for P2pb2b {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbol_style(&self) -> SymbolStyle {
        SymbolStyle::delimited('_', SymbolCase::Upper)
    }

    async fn fetch_currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        Ok(self
            .markets()
            .await?
            .iter()
            .filter_map(|m| CurrencyPair::new(&m.stock, &m.money).ok())
            .collect())
    }

    async fn fetch_market(&self, universe: &PairUniverse) -> Result<MarketSnapshot> {
        let reply = self.rest.public_get_json("/api/v2/public/tickers", &[]).await?;
        Ok(MarketSnapshot::from_rows(TICKER.extract(&reply)?, universe))
    }

    async fn fetch_precisions(&self, _universe: &PairUniverse) -> Result<PrecisionMap> {
        let mut map = PrecisionMap::new();
        for market in self.markets().await? {
            let Ok(pair) = CurrencyPair::new(&market.stock, &market.money) else {
                continue;
            };
            precision::record(&mut map, pair, decimals(&market.precision.money), decimals(&market.precision.stock));
        }
        Ok(map)
    }

    async fn fetch_board(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<Board> {
        let market = universe.symbol(pair);
        let asks = self.book_side(&market, "sell").await?;
        let bids = self.book_side(&market, "buy").await?;
        Ok(Board::from_levels(asks, bids))
    }

    async fn fetch_frozen_currency(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[async_trait(?Send)]
impl VenueTrading for P2pb2b {
    async fn trade_fee_rate(&self, _universe: &PairUniverse, _pair: &CurrencyPair) -> Result<TradeFee> {
        Ok(TradeFee::flat(TRADE_FEE))
    }

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>> {
        Ok(TRANSFER_FEES
            .iter()
            .map(|(asset, fee)| (asset.to_string(), *fee))
            .collect())
    }

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>> {
        let result = self.signed("/api/v2/account/balances", json!({})).await?;
        let rows: HashMap<String, BalanceRow> = typed(result)?;
        Ok(rows
            .into_iter()
            .map(|(asset, row)| (asset.to_uppercase(), Balance::new(row.available, row.freeze)))
            .collect())
    }

    async fn place_order(
        &self,
        universe: &PairUniverse,
        pair: &CurrencyPair,
        order_type: OrderType,
        price: &str,
        amount: &str,
    ) -> Result<String> {
        let body = json!({
            "market": universe.symbol(pair),
            "side": if order_type.is_buy() { "buy" } else { "sell" },
            "amount": amount,
            "price": price,
        });
        let result = self.signed("/api/v2/order/new", body).await?;
        id_at(&result, "/orderId")
    }

    async fn cancel_order(&self, universe: &PairUniverse, order: &Order) -> Result<()> {
        let body = json!({
            "market": universe.symbol(&order.pair()),
            "orderId": order.exchange_order_id.parse::<u64>().map(Value::from)
                .unwrap_or_else(|_| Value::from(order.exchange_order_id.clone())),
        });
        match self.signed("/api/v2/order/cancel", body).await {
            Ok(_) => Ok(()),
            Err(e) if is_missing_order(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn active_orders(&self, universe: &PairUniverse) -> Result<Vec<Order>> {
        let balances = self.complete_balances().await?;
        let markets: Vec<String> = markets_with_frozen_balance(universe, &balances)
            .iter()
            .map(|pair| universe.symbol(pair))
            .collect();
        let batches = try_fan_out("p2pb2b open orders", markets, self.width, |market| async move {
            let body = json!({ "market": market, "offset": 0, "limit": OPEN_ORDER_LIMIT });
            let result = self.signed("/api/v2/orders", body).await?;
            let rows: Vec<OrderRow> = typed(Value::Array(array_at(&result, "")?.clone()))?;
            Ok(rows)
        })
        .await?;

        let mut orders = Vec::new();
        for row in batches.into_iter().flatten() {
            let pair = universe.parse(&row.market)?;
            orders.push(Order {
                exchange_order_id: id_at(&row.order_id, "")?,
                order_type: OrderType::from_side(&row.side)?,
                trading: pair.trading,
                settlement: pair.settlement,
                price: row.price,
                amount: row.left,
            });
        }
        Ok(orders)
    }

    async fn transfer(&self, _asset: &str, _address: &str, _amount: f64, _extra_fee: f64) -> Result<()> {
        unsupported(Self::NAME, "transfer")
    }

    async fn address(&self, _asset: &str) -> Result<String> {
        unsupported(Self::NAME, "address")
    }
}
