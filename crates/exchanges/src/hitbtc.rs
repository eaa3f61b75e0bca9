//! HitBTC API v2 adapter
//!
//! Symbols are concatenated (`ETHBTC`) and parsed against the settlement
//! set of the listing. Orders are placed and tracked by a client order id
//! we generate, which is also what cancel and status take.

use crate::adapter::{Adapter, VenueMarket, VenueTrading};
use crate::auth::{Credentials, Signer, SigningScheme};
use crate::cache::{MarketSnapshot, PairUniverse};
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::http::HttpTransport;
use crate::json::{decimals, flexible_f64, id_at, num, str_at, typed, BookSchema, Rows, SymbolSource, TickerSchema};
use crate::precision::{self, PrecisionMap};
use crate::rest::{ApiRequest, RestClient};
use crate::symbol::SymbolStyle;
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use unifex_core::generate_client_order_id;

const TICKER: TickerSchema = TickerSchema {
    rows: Rows::Array(""),
    symbol: SymbolSource::Field("/symbol"),
    last: "/last",
    volume: Some("/volumeQuote"),
    bid: Some("/bid"),
    ask: Some("/ask"),
};

const BOOK: BookSchema = BookSchema { asks: "/ask", bids: "/bid" };

const ORDER_NOT_FOUND: &str = "20002";

pub type HitbtcExchange = Adapter<Hitbtc>;

pub struct Hitbtc {
    rest: RestClient,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    id: String,
    base_currency: String,
    quote_currency: String,
    #[serde(default)]
    quantity_increment: Value,
    #[serde(default)]
    tick_size: Value,
    #[serde(default)]
    take_liquidity_rate: Value,
    #[serde(default)]
    provide_liquidity_rate: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrencyInfo {
    id: String,
    payin_enabled: bool,
    payout_enabled: bool,
    #[serde(default)]
    payout_fee: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceRow {
    currency: String,
    #[serde(deserialize_with = "flexible_f64")]
    available: f64,
    #[serde(deserialize_with = "flexible_f64")]
    reserved: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRow {
    client_order_id: String,
    symbol: String,
    side: String,
    status: String,
    #[serde(deserialize_with = "flexible_f64")]
    quantity: f64,
    #[serde(deserialize_with = "flexible_f64")]
    cum_quantity: f64,
    #[serde(deserialize_with = "flexible_f64")]
    price: f64,
}

impl OrderRow {
    fn is_open(&self) -> bool {
        matches!(self.status.as_str(), "new" | "suspended" | "partiallyFilled")
    }
}

impl Hitbtc {
    pub const NAME: &'static str = "hitbtc";
    pub const BASE_URL: &'static str = "https://api.hitbtc.com";

    pub fn new(
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let signer = Signer::new(SigningScheme::BasicAuth, credentials);
        let rest = RestClient::new(Self::NAME, config.base_url_or(Self::BASE_URL), transport, signer)?
            .with_error_probe(error_probe)
            .with_timing(config.enable_timing);
        Ok(Self { rest })
    }

    async fn symbols(&self) -> Result<Vec<SymbolInfo>> {
        typed(self.rest.public_get_json("/api/2/public/symbol", &[]).await?)
    }

    async fn currencies(&self) -> Result<Vec<CurrencyInfo>> {
        typed(self.rest.public_get_json("/api/2/public/currency", &[]).await?)
    }
}

/// `{"error": {"code": 20002, "message": "Order not found", "description": ""}}`
fn error_probe(_status: u16, body: &Value) -> Option<ExchangeError> {
    let error = body.get("error")?;
    let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
    let message = error.get("message").and_then(Value::as_str).unwrap_or_default();
    Some(match code {
        1001..=1004 => ExchangeError::AuthFailure(format!("{code}: {message}")),
        _ => ExchangeError::venue(code.to_string(), message),
    })
}

pub fn create(
    credentials: Option<Credentials>,
    config: &ExchangeConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<HitbtcExchange> {
    Ok(Adapter::new(Hitbtc::new(credentials, config, transport)?, config))
}

#[async_trait(?Send)]
impl VenueMarket for Hitbtc {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbol_style(&self) -> SymbolStyle {
        SymbolStyle::concat_upper()
    }

    async fn fetch_currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        Ok(self
            .symbols()
            .await?
            .iter()
            .filter_map(|s| CurrencyPair::new(&s.base_currency, &s.quote_currency).ok())
            .collect())
    }

    async fn fetch_market(&self, universe: &PairUniverse) -> Result<MarketSnapshot> {
        let tickers = self.rest.public_get_json("/api/2/public/ticker", &[]).await?;
        Ok(MarketSnapshot::from_rows(TICKER.extract(&tickers)?, universe))
    }

    async fn fetch_precisions(&self, _universe: &PairUniverse) -> Result<PrecisionMap> {
        let mut map = PrecisionMap::new();
        for symbol in self.symbols().await? {
            let Ok(pair) = CurrencyPair::new(&symbol.base_currency, &symbol.quote_currency) else {
                continue;
            };
            precision::record(&mut map, pair, decimals(&symbol.tick_size), decimals(&symbol.quantity_increment));
        }
        Ok(map)
    }

    async fn fetch_board(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<Board> {
        let path = format!("/api/2/public/orderbook/{}", universe.symbol(pair));
        let book = self.rest.public_get_json(&path, &[("limit", "100")]).await?;
        Ok(BOOK.extract(&book))
    }

    async fn fetch_frozen_currency(&self) -> Result<Vec<String>> {
        Ok(self
            .currencies()
            .await?
            .into_iter()
            .filter(|c| !c.payin_enabled || !c.payout_enabled)
            .map(|c| c.id)
            .collect())
    }
}

#[async_trait(?Send)]
impl VenueTrading for Hitbtc {
    async fn trade_fee_rate(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<TradeFee> {
        let id = universe.symbol(pair);
        let symbol = self
            .symbols()
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(ExchangeError::UnknownPair(pair.to_string()))?;
        match (num(&symbol.provide_liquidity_rate), num(&symbol.take_liquidity_rate)) {
            (Some(maker_fee), Some(taker_fee)) => Ok(TradeFee { maker_fee, taker_fee }),
            _ => Err(ExchangeError::schema(format!("{id} lists no liquidity rates"))),
        }
    }

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>> {
        Ok(self
            .currencies()
            .await?
            .into_iter()
            .filter_map(|c| {
                let fee = c.payout_fee.as_deref()?.parse::<f64>().ok()?;
                Some((c.id, fee))
            })
            .collect())
    }

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>> {
        let rows: Vec<BalanceRow> =
            typed(self.rest.private_call_json(ApiRequest::get("/api/2/trading/balance")).await?)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.currency, Balance::new(row.available, row.reserved)))
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
        let request = ApiRequest::post("/api/2/order")
            .form("clientOrderId", generate_client_order_id())
            .form("symbol", universe.symbol(pair))
            .form("side", if order_type.is_buy() { "buy" } else { "sell" })
            .form("type", "limit")
            .form("quantity", amount)
            .form("price", price);
        let reply = self.rest.private_call_json(request).await?;
        id_at(&reply, "/clientOrderId")
    }

    async fn cancel_order(&self, _universe: &PairUniverse, order: &Order) -> Result<()> {
        let path = format!("/api/2/order/{}", order.exchange_order_id);
        match self.rest.private_call(ApiRequest::delete(path)).await {
            Ok(_) => Ok(()),
            Err(e) if e.venue_code() == Some(ORDER_NOT_FOUND) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn is_order_filled(&self, _universe: &PairUniverse, order: &Order) -> Result<bool> {
        // Only active orders are served here; a closed one is reported as not found
        let path = format!("/api/2/order/{}", order.exchange_order_id);
        match self.rest.private_call_json(ApiRequest::get(path)).await {
            Ok(reply) => Ok(!typed::<OrderRow>(reply)?.is_open()),
            Err(e) if e.venue_code() == Some(ORDER_NOT_FOUND) => Ok(true),
            Err(e) => Err(e),
        }
    }

    async fn active_orders(&self, universe: &PairUniverse) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = typed(self.rest.private_call_json(ApiRequest::get("/api/2/order")).await?)?;
        rows.into_iter()
            .map(|row| {
                let pair = universe.parse(&row.symbol)?;
                Ok(Order {
                    exchange_order_id: row.client_order_id,
                    order_type: OrderType::from_side(&row.side)?,
                    trading: pair.trading,
                    settlement: pair.settlement,
                    price: row.price,
                    amount: row.quantity - row.cum_quantity,
                })
            })
            .collect()
    }

    async fn transfer(&self, asset: &str, address: &str, amount: f64, extra_fee: f64) -> Result<()> {
        let mut request = ApiRequest::post("/api/2/account/crypto/withdraw")
            .form("currency", asset)
            .form("amount", amount)
            .form("address", address);
        if extra_fee > 0.0 {
            request = request.form("networkFee", extra_fee);
        }
        let reply = self.rest.private_call_json(request).await?;
        id_at(&reply, "/id").map(|_| ())
    }

    async fn address(&self, asset: &str) -> Result<String> {
        let path = format!("/api/2/account/crypto/address/{asset}");
        let reply = self.rest.private_call_json(ApiRequest::get(path)).await?;
        Ok(str_at(&reply, "/address")?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::http::Method;
    use crate::testing::MockTransport;
    use crate::traits::{Exchange, TradingExchange};
    use serde_json::json;

    fn symbols() -> Value {
        json!([
            {"id": "ETHBTC", "baseCurrency": "ETH", "quoteCurrency": "BTC", "quantityIncrement": "0.001",
             "tickSize": "0.000001", "takeLiquidityRate": "0.001", "provideLiquidityRate": "-0.0001"},
            {"id": "BTCUSD", "baseCurrency": "BTC", "quoteCurrency": "USD", "quantityIncrement": "0.00001",
             "tickSize": "0.01", "takeLiquidityRate": "0.002", "provideLiquidityRate": "0.001"},
            {"id": "XRPETH", "baseCurrency": "XRP", "quoteCurrency": "ETH", "quantityIncrement": "1",
             "tickSize": "0.0000001", "takeLiquidityRate": "0.001", "provideLiquidityRate": "0.001"}
        ])
    }

    fn setup() -> (Arc<MockTransport>, HitbtcExchange) {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Get, "/api/2/public/symbol", 200, symbols());
        let exchange = create(Some(Credentials::new("key", "secret")), &ExchangeConfig::default(), mock.clone()).unwrap();
        (mock, exchange)
    }

    #[monoio::test]
    async fn test_symbol_parsing_against_settlements() {
        let (_, exchange) = setup();
        let universe = exchange.universe().await.unwrap();
        assert_eq!(universe.codec().settlements(), ["BTC", "ETH", "USD"]);
        assert_eq!(universe.parse("ETHBTC").unwrap(), CurrencyPair::new("ETH", "BTC").unwrap());
        assert_eq!(universe.parse("XRPETH").unwrap(), CurrencyPair::new("XRP", "ETH").unwrap());
        assert!(universe.parse("ETHEUR").is_err());
    }

    #[monoio::test]
    async fn test_symbol_without_increments_only_affects_itself() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Get, "/api/2/public/symbol", 200, json!([
            {"id": "ETHBTC", "baseCurrency": "ETH", "quoteCurrency": "BTC", "quantityIncrement": "0.001",
             "tickSize": "0.000001", "takeLiquidityRate": "0.001", "provideLiquidityRate": "-0.0001"},
            {"id": "LTCBTC", "baseCurrency": "LTC", "quoteCurrency": "BTC"}
        ]));
        let exchange = create(None, &ExchangeConfig::default(), mock.clone()).unwrap();

        assert_eq!(exchange.currency_pairs().await.unwrap().len(), 2);
        assert_eq!(exchange.precise("ETH", "BTC").await.unwrap(), Precisions::new(6, 3).unwrap());
        assert_eq!(exchange.precise("LTC", "BTC").await.unwrap_err().kind(), ErrorKind::PrecisionUnknown);
        assert_eq!(exchange.trade_fee_rate("LTC", "BTC").await.unwrap_err().kind(), ErrorKind::Schema);
    }

    #[monoio::test]
    async fn test_bid_is_a_sell_with_client_id() {
        let (mock, exchange) = setup();
        mock.on(Method::Post, "/api/2/order", 200, json!({"clientOrderId": "abc123", "status": "new"}));

        let id = exchange.order("ETH", "BTC", OrderType::Bid, 0.0512345, 1.23456).await.unwrap();
        assert_eq!(id, "abc123");

        let sent = mock.last_request(Method::Post, "/api/2/order").unwrap();
        let body = sent.body.clone().unwrap();
        assert!(body.contains("side=sell"));
        assert!(body.contains("quantity=1.234&price=0.051234"));
        assert!(sent.header("Authorization").unwrap().starts_with("Basic "));
    }

    #[monoio::test]
    async fn test_fees_from_symbol_listing() {
        let (mock, exchange) = setup();
        let fee = exchange.trade_fee_rate("ETH", "BTC").await.unwrap();
        assert_eq!(fee, TradeFee { maker_fee: -0.0001, taker_fee: 0.001 });

        mock.on(Method::Get, "/api/2/public/currency", 200, json!([
            {"id": "BTC", "payinEnabled": true, "payoutEnabled": true, "payoutFee": "0.0009"},
            {"id": "XRP", "payinEnabled": true, "payoutEnabled": false, "payoutFee": "0.5"},
            {"id": "USD", "payinEnabled": true, "payoutEnabled": true}
        ]));
        assert_eq!(exchange.frozen_currency().await.unwrap(), vec!["XRP"]);
        let fees = exchange.transfer_fee().await.unwrap();
        assert_eq!(fees["BTC"], 0.0009);
        assert!(!fees.contains_key("USD"));
    }

    #[monoio::test]
    async fn test_cancel_and_status_of_missing_order() {
        let (mock, exchange) = setup();
        let missing = json!({"error": {"code": 20002, "message": "Order not found", "description": ""}});
        mock.on(Method::Delete, "/api/2/order/abc123", 400, missing.clone());
        mock.on(Method::Get, "/api/2/order/abc123", 400, missing);

        let order = Order {
            exchange_order_id: "abc123".into(),
            order_type: OrderType::Ask,
            trading: "ETH".into(),
            settlement: "BTC".into(),
            price: 0.05,
            amount: 1.0,
        };
        exchange.cancel_order(&order).await.unwrap();
        assert!(exchange.is_order_filled(&order).await.unwrap());
    }

    #[monoio::test]
    async fn test_ticker_and_board() {
        let (mock, exchange) = setup();
        mock.on(Method::Get, "/api/2/public/ticker", 200, json!([
            {"symbol": "ETHBTC", "last": "0.05", "volumeQuote": "321.5", "bid": "0.0499", "ask": "0.0501"},
            {"symbol": "XRPETH", "last": null, "volumeQuote": "0"}
        ]));
        mock.on(Method::Get, "/api/2/public/orderbook/ETHBTC", 200, json!({
            "ask": [{"price": "0.0502", "size": "1"}, {"price": "0.0501", "size": "2"}],
            "bid": [{"price": "0.0499", "size": "3"}]
        }));

        assert_eq!(exchange.volume("ETH", "BTC").await.unwrap(), 321.5);
        assert_eq!(exchange.rate("XRP", "ETH").await.unwrap_err().kind(), ErrorKind::UnknownPair);
        let board = exchange.board("ETH", "BTC").await.unwrap();
        assert_eq!(board.best_ask(), Some(0.0501));
        assert_eq!(exchange.precise("BTC", "USD").await.unwrap(), Precisions::new(2, 5).unwrap());
    }

    #[monoio::test]
    async fn test_open_orders_remaining_amount() {
        let (mock, exchange) = setup();
        mock.on(Method::Get, "/api/2/order", 200, json!([
            {"clientOrderId": "c1", "symbol": "ETHBTC", "side": "buy", "status": "partiallyFilled",
             "quantity": "2.000", "cumQuantity": "0.500", "price": "0.050000"}
        ]));
        let open = exchange.active_orders().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].order_type, OrderType::Ask);
        assert_eq!(open[0].amount, 1.5);
    }
}
