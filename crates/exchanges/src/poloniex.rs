//! Poloniex legacy API adapter
//!
//! Pairs are spelled settlement first (`BTC_ETH` is ETH priced in BTC).
//! Public data comes from `/public?command=..`; every private call is a
//! form POST to `/tradingApi` carrying `command` and an epoch-seconds nonce,
//! signed with hex HMAC-SHA512 of the body.

use crate::adapter::{Adapter, VenueMarket, VenueTrading};
use crate::auth::{Credentials, Signer, SigningScheme};
use crate::cache::{MarketSnapshot, PairUniverse};
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::http::HttpTransport;
use crate::json::{f64_at, flag, flexible_f64, id_at, num, typed, BookSchema, Rows, SymbolSource, TickerSchema};
use crate::precision::PrecisionMap;
use crate::rest::{ApiRequest, RestClient};
use crate::symbol::{SymbolCase, SymbolCodec, SymbolOrder, SymbolStyle};
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

const STYLE: SymbolStyle = SymbolStyle::new(Some('_'), SymbolCase::Upper, SymbolOrder::SettlementFirst);

// `baseVolume` is quoted in the first (settlement) asset of the key
const TICKER: TickerSchema = TickerSchema {
    rows: Rows::Keyed(""),
    symbol: SymbolSource::Key,
    last: "/last",
    volume: Some("/baseVolume"),
    bid: Some("/highestBid"),
    ask: Some("/lowestAsk"),
};

const BOOK: BookSchema = BookSchema { asks: "/asks", bids: "/bids" };

const PRICE_DECIMALS: u32 = 8;
const AMOUNT_DECIMALS: u32 = 8;
const BOOK_DEPTH: &str = "100";

pub type PoloniexExchange = Adapter<Poloniex>;

pub struct Poloniex {
    rest: RestClient,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceRow {
    #[serde(deserialize_with = "flexible_f64")]
    available: f64,
    #[serde(deserialize_with = "flexible_f64")]
    on_orders: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenOrderRow {
    order_number: Value,
    #[serde(rename = "type")]
    side: String,
    #[serde(deserialize_with = "flexible_f64")]
    rate: f64,
    #[serde(deserialize_with = "flexible_f64")]
    amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrencyRow {
    #[serde(default)]
    tx_fee: Option<Value>,
    #[serde(default)]
    disabled: Option<Value>,
    #[serde(default)]
    frozen: Option<Value>,
}

impl CurrencyRow {
    fn is_frozen(&self) -> bool {
        let set = |v: &Option<Value>| v.as_ref().and_then(flag).unwrap_or(false);
        set(&self.disabled) || set(&self.frozen)
    }
}

impl Poloniex {
    pub const NAME: &'static str = "poloniex";
    pub const BASE_URL: &'static str = "https://poloniex.com";

    pub fn new(
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let signer = Signer::new(SigningScheme::Poloniex, credentials);
        let rest = RestClient::new(Self::NAME, config.base_url_or(Self::BASE_URL), transport, signer)?
            .with_error_probe(error_probe)
            .with_timing(config.enable_timing);
        Ok(Self { rest })
    }

    async fn public(&self, command: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut query = vec![("command", command)];
        query.extend_from_slice(params);
        self.rest.public_get_json("/public", &query).await
    }

    fn trading_api(command: &str) -> ApiRequest {
        ApiRequest::post("/tradingApi").form("command", command)
    }

    async fn currencies(&self) -> Result<HashMap<String, CurrencyRow>> {
        typed(self.public("returnCurrencies", &[]).await?)
    }
}

/// `{"error": "Invalid order number, or you are not the person who placed the order."}`
fn error_probe(_status: u16, body: &Value) -> Option<ExchangeError> {
    let message = body.get("error")?.as_str()?;
    let lower = message.to_ascii_lowercase();
    Some(if lower.contains("api key") || lower.contains("nonce") {
        ExchangeError::AuthFailure(message.to_string())
    } else {
        ExchangeError::venue("error", message)
    })
}

fn is_missing_order(e: &ExchangeError) -> bool {
    e.venue_message().is_some_and(|m| m.contains("Invalid order number"))
}

pub fn create(
    credentials: Option<Credentials>,
    config: &ExchangeConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<PoloniexExchange> {
    Ok(Adapter::new(Poloniex::new(credentials, config, transport)?, config))
}

#[async_trait(?Send)]
impl VenueMarket for Poloniex {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbol_style(&self) -> SymbolStyle {
        STYLE
    }

    async fn fetch_currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        let reply = self.public("returnTicker", &[]).await?;
        let codec = SymbolCodec::new(STYLE, Vec::<String>::new());
        Ok(reply
            .as_object()
            .ok_or_else(|| ExchangeError::schema("returnTicker is not an object"))?
            .keys()
            .filter_map(|symbol| codec.parse(symbol).ok())
            .collect())
    }

    async fn fetch_market(&self, universe: &PairUniverse) -> Result<MarketSnapshot> {
        let reply = self.public("returnTicker", &[]).await?;
        Ok(MarketSnapshot::from_rows(TICKER.extract(&reply)?, universe))
    }

    async fn fetch_precisions(&self, universe: &PairUniverse) -> Result<PrecisionMap> {
        let precisions = Precisions::new(PRICE_DECIMALS, AMOUNT_DECIMALS)?;
        Ok(universe.pairs().iter().map(|pair| (pair.clone(), precisions)).collect())
    }

    async fn fetch_board(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<Board> {
        let symbol = universe.symbol(pair);
        let reply = self
            .public("returnOrderBook", &[("currencyPair", symbol.as_str()), ("depth", BOOK_DEPTH)])
            .await?;
        Ok(BOOK.extract(&reply))
    }

    async fn fetch_frozen_currency(&self) -> Result<Vec<String>> {
        Ok(self
            .currencies()
            .await?
            .into_iter()
            .filter(|(_, row)| row.is_frozen())
            .map(|(asset, _)| asset.to_uppercase())
            .collect())
    }
}

#[async_trait(?Send)]
impl VenueTrading for Poloniex {
    async fn trade_fee_rate(&self, _universe: &PairUniverse, _pair: &CurrencyPair) -> Result<TradeFee> {
        let reply = self.rest.private_call_json(Self::trading_api("returnFeeInfo")).await?;
        Ok(TradeFee {
            maker_fee: f64_at(&reply, "/makerFee")?,
            taker_fee: f64_at(&reply, "/takerFee")?,
        })
    }

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>> {
        Ok(self
            .currencies()
            .await?
            .into_iter()
            .filter_map(|(asset, row)| Some((asset.to_uppercase(), num(row.tx_fee.as_ref()?)?)))
            .collect())
    }

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>> {
        let rows: HashMap<String, BalanceRow> = typed(
            self.rest
                .private_call_json(Self::trading_api("returnCompleteBalances"))
                .await?,
        )?;
        Ok(rows
            .into_iter()
            .map(|(asset, row)| (asset.to_uppercase(), Balance::new(row.available, row.on_orders)))
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
        let command = if order_type.is_buy() { "buy" } else { "sell" };
        let request = Self::trading_api(command)
            .form("currencyPair", universe.symbol(pair))
            .form("rate", price)
            .form("amount", amount);
        let reply = self.rest.private_call_json(request).await?;
        id_at(&reply, "/orderNumber")
    }

    async fn cancel_order(&self, _universe: &PairUniverse, order: &Order) -> Result<()> {
        let request = Self::trading_api("cancelOrder").form("orderNumber", &order.exchange_order_id);
        match self.rest.private_call(request).await {
            Ok(_) => Ok(()),
            Err(e) if is_missing_order(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn active_orders(&self, universe: &PairUniverse) -> Result<Vec<Order>> {
        let request = Self::trading_api("returnOpenOrders").form("currencyPair", "all");
        let markets: HashMap<String, Vec<OpenOrderRow>> = typed(self.rest.private_call_json(request).await?)?;

        let mut orders = Vec::new();
        for (symbol, rows) in markets {
            if rows.is_empty() {
                continue;
            }
            let pair = universe.parse(&symbol)?;
            for row in rows {
                orders.push(Order {
                    exchange_order_id: id_at(&row.order_number, "")?,
                    order_type: OrderType::from_side(&row.side)?,
                    trading: pair.trading.clone(),
                    settlement: pair.settlement.clone(),
                    price: row.rate,
                    amount: row.amount,
                });
            }
        }
        Ok(orders)
    }

    async fn transfer(&self, asset: &str, address: &str, amount: f64, _extra_fee: f64) -> Result<()> {
        let request = Self::trading_api("withdraw")
            .form("currency", asset)
            .form("amount", amount)
            .form("address", address);
        let reply = self.rest.private_call_json(request).await?;
        if let Some(response) = reply.get("response").and_then(Value::as_str) {
            info!("💸 Poloniex withdrawal: {}", response);
        }
        Ok(())
    }

    async fn address(&self, asset: &str) -> Result<String> {
        let reply = self
            .rest
            .private_call_json(Self::trading_api("returnDepositAddresses"))
            .await?;
        reply
            .get(asset)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExchangeError::schema(format!("no deposit address for {asset}")))
    }
}
