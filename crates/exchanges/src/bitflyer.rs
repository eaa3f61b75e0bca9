//! Bitflyer Lightning adapter
//!
//! Bitflyer has no bulk ticker, so the market snapshot is built from one
//! `getticker` call per product through the bounded fan-out. Futures and FX
//! products (`FX_BTC_JPY`, `BTCJPY28SEP2018`) are not spot pairs and are
//! left out of the listing.

use crate::adapter::{unsupported, Adapter, VenueMarket, VenueTrading};
use crate::auth::{Credentials, Signer, SigningScheme};
use crate::cache::{MarketSnapshot, PairUniverse};
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::fanout::{fan_out, try_fan_out};
use crate::http::HttpTransport;
use crate::json::{array_at, f64_at, id_at, str_at, typed, BookSchema, Rows, SymbolSource, TickerSchema};
use crate::precision::PrecisionMap;
use crate::rest::{ApiRequest, RestClient};
use crate::symbol::{SymbolCase, SymbolCodec, SymbolStyle};
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

const STYLE: SymbolStyle = SymbolStyle::delimited('_', SymbolCase::Upper);

// `volume_by_product` is denominated in the trading asset
const TICKER: TickerSchema = TickerSchema {
    rows: Rows::Array(""),
    symbol: SymbolSource::Field("/product_code"),
    last: "/ltp",
    volume: Some("/volume_by_product"),
    bid: Some("/best_bid"),
    ask: Some("/best_ask"),
};

const BOOK: BookSchema = BookSchema { asks: "/asks", bids: "/bids" };

const AMOUNT_PRECISION: u32 = 8;

/// Withdrawal fees; Bitflyer publishes no endpoint for them
const TRANSFER_FEES: [(&str, f64); 7] = [
    ("BTC", 0.0004),
    ("BCH", 0.0002),
    ("ETH", 0.005),
    ("ETC", 0.005),
    ("LTC", 0.001),
    ("MONA", 0.0),
    ("LSK", 0.1),
];

pub type BitflyerExchange = Adapter<Bitflyer>;

pub struct Bitflyer {
    rest: RestClient,
    width: usize,
}

#[derive(Debug, Deserialize)]
struct BalanceRow {
    currency_code: String,
    #[serde(deserialize_with = "crate::json::flexible_f64")]
    amount: f64,
    #[serde(deserialize_with = "crate::json::flexible_f64")]
    available: f64,
}

#[derive(Debug, Deserialize)]
struct ChildOrder {
    child_order_acceptance_id: String,
    product_code: String,
    side: String,
    child_order_state: String,
    #[serde(deserialize_with = "crate::json::flexible_f64")]
    price: f64,
    #[serde(deserialize_with = "crate::json::flexible_f64")]
    outstanding_size: f64,
}

impl Bitflyer {
    pub const NAME: &'static str = "bitflyer";
    pub const BASE_URL: &'static str = "https://api.bitflyer.com";

    pub fn new(
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let signer = Signer::new(SigningScheme::Bitflyer, credentials);
        let rest = RestClient::new(Self::NAME, config.base_url_or(Self::BASE_URL), transport, signer)?
            .with_error_probe(error_probe)
            .with_timing(config.enable_timing);
        Ok(Self {
            rest,
            width: config.fan_out_width(),
        })
    }

    async fn child_orders(&self, product_code: &str, filter: (&str, &str)) -> Result<Vec<ChildOrder>> {
        let request = ApiRequest::get("/v1/me/getchildorders")
            .query("product_code", product_code)
            .query(filter.0, filter.1);
        typed(self.rest.private_call_json(request).await?)
    }
}

/// `{"status": -500, "error_message": "Key not found", "data": null}`
fn error_probe(_status: u16, body: &Value) -> Option<ExchangeError> {
    let code = body.get("status")?.as_i64()?;
    if code >= 0 {
        return None;
    }
    let message = body.get("error_message").and_then(Value::as_str).unwrap_or_default();
    Some(match code {
        -500 | -501 => ExchangeError::AuthFailure(format!("{code}: {message}")),
        _ => ExchangeError::venue(code.to_string(), message),
    })
}

pub fn create(
    credentials: Option<Credentials>,
    config: &ExchangeConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<BitflyerExchange> {
    Ok(Adapter::new(Bitflyer::new(credentials, config, transport)?, config))
}

#[async_trait(?Send)]
impl VenueMarket for Bitflyer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbol_style(&self) -> SymbolStyle {
        STYLE
    }

    async fn fetch_currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        let markets = self.rest.public_get_json("/v1/getmarkets", &[]).await?;
        let codec = SymbolCodec::new(STYLE, Vec::<String>::new());
        Ok(array_at(&markets, "")?
            .iter()
            .filter_map(|market| str_at(market, "/product_code").ok())
            .filter_map(|code| codec.parse(code).ok())
            .collect())
    }

    async fn fetch_market(&self, universe: &PairUniverse) -> Result<MarketSnapshot> {
        let symbols: Vec<String> = universe.pairs().iter().map(|p| universe.symbol(p)).collect();
        let rows = fan_out("bitflyer ticker", symbols, self.width, |symbol| async move {
            let ticker = self
                .rest
                .public_get_json("/v1/getticker", &[("product_code", symbol.as_str())])
                .await?;
            TICKER.extract_one(&symbol, &ticker)
        })
        .await;
        Ok(MarketSnapshot::from_rows(rows, universe))
    }

    async fn fetch_precisions(&self, universe: &PairUniverse) -> Result<PrecisionMap> {
        let mut map = PrecisionMap::new();
        for pair in universe.pairs() {
            let price_precision = match pair.settlement.as_str() {
                "JPY" | "USD" | "EUR" => 0,
                _ => 5,
            };
            map.insert(pair.clone(), Precisions::new(price_precision, AMOUNT_PRECISION)?);
        }
        Ok(map)
    }

    async fn fetch_board(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<Board> {
        let symbol = universe.symbol(pair);
        let book = self
            .rest
            .public_get_json("/v1/getboard", &[("product_code", symbol.as_str())])
            .await?;
        Ok(BOOK.extract(&book))
    }

    async fn fetch_frozen_currency(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[async_trait(?Send)]
impl VenueTrading for Bitflyer {
    async fn trade_fee_rate(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<TradeFee> {
        let request = ApiRequest::get("/v1/me/gettradingcommission").query("product_code", universe.symbol(pair));
        let reply = self.rest.private_call_json(request).await?;
        Ok(TradeFee::flat(f64_at(&reply, "/commission_rate")?))
    }

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>> {
        Ok(TRANSFER_FEES
            .iter()
            .map(|(asset, fee)| (asset.to_string(), *fee))
            .collect())
    }

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>> {
        let rows: Vec<BalanceRow> = typed(self.rest.private_call_json(ApiRequest::get("/v1/me/getbalance")).await?)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.currency_code, Balance::new(row.available, row.amount - row.available)))
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
            "product_code": universe.symbol(pair),
            "child_order_type": "LIMIT",
            "side": if order_type.is_buy() { "BUY" } else { "SELL" },
            "price": serde_json::from_str::<Value>(price)?,
            "size": serde_json::from_str::<Value>(amount)?,
        });
        let reply = self
            .rest
            .private_call_json(ApiRequest::post("/v1/me/sendchildorder").json(body))
            .await?;
        id_at(&reply, "/child_order_acceptance_id")
    }

    async fn cancel_order(&self, universe: &PairUniverse, order: &Order) -> Result<()> {
        // Bitflyer answers 200 with an empty body whether or not the order exists
        let body = json!({
            "product_code": universe.symbol(&order.pair()),
            "child_order_acceptance_id": order.exchange_order_id,
        });
        self.rest
            .private_call(ApiRequest::post("/v1/me/cancelchildorder").json(body))
            .await?;
        Ok(())
    }

    async fn is_order_filled(&self, universe: &PairUniverse, order: &Order) -> Result<bool> {
        let orders = self
            .child_orders(
                &universe.symbol(&order.pair()),
                ("child_order_acceptance_id", order.exchange_order_id.as_str()),
            )
            .await?;
        // Not yet visible right after acceptance
        Ok(orders
            .first()
            .is_some_and(|o| o.child_order_state != "ACTIVE"))
    }

    async fn active_orders(&self, universe: &PairUniverse) -> Result<Vec<Order>> {
        let symbols: Vec<String> = universe.pairs().iter().map(|p| universe.symbol(p)).collect();
        let batches = try_fan_out("bitflyer open orders", symbols, self.width, |symbol| async move {
            self.child_orders(&symbol, ("child_order_state", "ACTIVE")).await
        })
        .await?;

        let mut orders = Vec::new();
        for child in batches.into_iter().flatten() {
            let pair = universe.parse(&child.product_code)?;
            orders.push(Order {
                exchange_order_id: child.child_order_acceptance_id,
                order_type: OrderType::from_side(&child.side)?,
                trading: pair.trading,
                settlement: pair.settlement,
                price: child.price,
                amount: child.outstanding_size,
            });
        }
        Ok(orders)
    }

    async fn transfer(&self, _asset: &str, _address: &str, _amount: f64, _extra_fee: f64) -> Result<()> {
        unsupported(Self::NAME, "transfer")
    }

    async fn address(&self, asset: &str) -> Result<String> {
        let reply = self.rest.private_call_json(ApiRequest::get("/v1/me/getaddresses")).await?;
        let found = array_at(&reply, "")?
            .iter()
            .find(|row| str_at(row, "/currency_code").is_ok_and(|code| code.eq_ignore_ascii_case(asset)));
        match found {
            Some(row) => Ok(str_at(row, "/address")?.to_string()),
            None => Err(ExchangeError::schema(format!("no deposit address for {asset}"))),
        }
    }
}
