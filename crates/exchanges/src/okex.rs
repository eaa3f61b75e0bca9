//! OKEx API v3 spot adapter
//!
//! Instruments are `-`-delimited (`ETH-BTC`). Private calls are signed with
//! the same query-string HMAC scheme as Huobi, against host `www.okex.com`.

use crate::adapter::{Adapter, VenueMarket, VenueTrading};
use crate::auth::{Credentials, Signer, SigningScheme};
use crate::cache::{MarketSnapshot, PairUniverse};
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::http::HttpTransport;
use crate::json::{array_at, decimals, flag, flexible_f64, id_at, num, typed, BookSchema, Rows, SymbolSource, TickerSchema};
use crate::precision::{self, PrecisionMap};
use crate::rest::{ApiRequest, RestClient};
use crate::symbol::{SymbolCase, SymbolStyle};
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

const TICKER: TickerSchema = TickerSchema {
    rows: Rows::Array(""),
    symbol: SymbolSource::Field("/instrument_id"),
    last: "/last",
    volume: Some("/quote_volume_24h"),
    bid: Some("/best_bid"),
    ask: Some("/best_ask"),
};

const BOOK: BookSchema = BookSchema { asks: "/asks", bids: "/bids" };

const TRADE_FEE: f64 = 0.0015;
const ORDER_NOT_FOUND: &str = "33014";
// on-chain withdrawal
const DESTINATION_CHAIN: &str = "4";

pub type OkexExchange = Adapter<Okex>;

pub struct Okex {
    rest: RestClient,
}

#[derive(Debug, Deserialize)]
struct Instrument {
    base_currency: String,
    quote_currency: String,
    #[serde(default)]
    tick_size: Value,
    #[serde(default)]
    size_increment: Value,
}

#[derive(Debug, Deserialize)]
struct AccountRow {
    currency: String,
    #[serde(deserialize_with = "flexible_f64")]
    available: f64,
    #[serde(deserialize_with = "flexible_f64")]
    hold: f64,
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    order_id: String,
    instrument_id: String,
    side: String,
    #[serde(deserialize_with = "flexible_f64")]
    price: f64,
    #[serde(deserialize_with = "flexible_f64")]
    size: f64,
    #[serde(deserialize_with = "flexible_f64")]
    filled_size: f64,
    #[serde(default)]
    state: Option<String>,
}

impl Okex {
    pub const NAME: &'static str = "okex";
    pub const BASE_URL: &'static str = "https://www.okex.com";
    pub const HOST: &'static str = "www.okex.com";

    pub fn new(
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let scheme = SigningScheme::HmacQueryV2 {
            host: Self::HOST.to_string(),
        };
        let rest = RestClient::new(
            Self::NAME,
            config.base_url_or(Self::BASE_URL),
            transport,
            Signer::new(scheme, credentials),
        )?
        .with_error_probe(error_probe)
        .with_timing(config.enable_timing);
        Ok(Self { rest })
    }

    async fn instruments(&self) -> Result<Vec<Instrument>> {
        typed(self.rest.public_get_json("/api/spot/v3/instruments", &[]).await?)
    }
}

/// `{"code": 30008, "message": ".."}` or
/// `{"error_code": "33014", "error_message": "..", "result": false}`
fn error_probe(_status: u16, body: &Value) -> Option<ExchangeError> {
    let code = ["error_code", "code"]
        .iter()
        .find_map(|key| body.get(*key).and_then(num))
        .filter(|code| *code != 0.0)? as i64;
    let message = ["error_message", "message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .unwrap_or_default();
    Some(match code {
        30001..=30006 | 30012 => ExchangeError::AuthFailure(format!("{code}: {message}")),
        _ => ExchangeError::venue(code.to_string(), message),
    })
}

pub fn create(
    credentials: Option<Credentials>,
    config: &ExchangeConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<OkexExchange> {
    Ok(Adapter::new(Okex::new(credentials, config, transport)?, config))
}

#[async_trait(?Send)]
impl VenueMarket for Okex {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbol_style(&self) -> SymbolStyle {
        SymbolStyle::delimited('-', SymbolCase::Upper)
    }

    async fn fetch_currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        Ok(self
            .instruments()
            .await?
            .iter()
            .filter_map(|i| CurrencyPair::new(&i.base_currency, &i.quote_currency).ok())
            .collect())
    }

    async fn fetch_market(&self, universe: &PairUniverse) -> Result<MarketSnapshot> {
        let reply = self.rest.public_get_json("/api/spot/v3/instruments/ticker", &[]).await?;
        Ok(MarketSnapshot::from_rows(TICKER.extract(&reply)?, universe))
    }

    async fn fetch_precisions(&self, _universe: &PairUniverse) -> Result<PrecisionMap> {
        let mut map = PrecisionMap::new();
        for instrument in self.instruments().await? {
            let Ok(pair) = CurrencyPair::new(&instrument.base_currency, &instrument.quote_currency) else {
                continue;
            };
            precision::record(&mut map, pair, decimals(&instrument.tick_size), decimals(&instrument.size_increment));
        }
        Ok(map)
    }

    async fn fetch_board(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<Board> {
        let path = format!("/api/spot/v3/instruments/{}/book", universe.symbol(pair));
        let reply = self.rest.public_get_json(&path, &[("size", "100")]).await?;
        Ok(BOOK.extract(&reply))
    }

    async fn fetch_frozen_currency(&self) -> Result<Vec<String>> {
        let reply = self.rest.public_get_json("/api/account/v3/currencies", &[]).await?;
        Ok(array_at(&reply, "")?
            .iter()
            .filter(|row| {
                let open = |key: &str| row.get(key).and_then(flag).unwrap_or(false);
                !open("can_deposit") || !open("can_withdraw")
            })
            .filter_map(|row| row.get("currency").and_then(Value::as_str))
            .map(str::to_uppercase)
            .collect())
    }
}

#[async_trait(?Send)]
impl VenueTrading for Okex {
    async fn trade_fee_rate(&self, _universe: &PairUniverse, _pair: &CurrencyPair) -> Result<TradeFee> {
        Ok(TradeFee::flat(TRADE_FEE))
    }

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>> {
        let reply = self
            .rest
            .private_call_json(ApiRequest::get("/api/account/v3/withdrawal/fee"))
            .await?;
        Ok(array_at(&reply, "")?
            .iter()
            .filter_map(|row| {
                let currency = row.get("currency")?.as_str()?.to_uppercase();
                Some((currency, num(row.get("min_fee")?)?))
            })
            .collect())
    }

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>> {
        let rows: Vec<AccountRow> =
            typed(self.rest.private_call_json(ApiRequest::get("/api/spot/v3/accounts")).await?)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.currency.to_uppercase(), Balance::new(row.available, row.hold)))
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
            "type": "limit",
            "side": if order_type.is_buy() { "buy" } else { "sell" },
            "instrument_id": universe.symbol(pair),
            "price": price,
            "size": amount,
        });
        let reply = self
            .rest
            .private_call_json(ApiRequest::post("/api/spot/v3/orders").json(body))
            .await?;
        id_at(&reply, "/order_id")
    }

    async fn cancel_order(&self, universe: &PairUniverse, order: &Order) -> Result<()> {
        let path = format!("/api/spot/v3/cancel_orders/{}", order.exchange_order_id);
        let body = json!({ "instrument_id": universe.symbol(&order.pair()) });
        match self.rest.private_call(ApiRequest::post(path).json(body)).await {
            Ok(_) => Ok(()),
            Err(e) if e.venue_code() == Some(ORDER_NOT_FOUND) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn is_order_filled(&self, universe: &PairUniverse, order: &Order) -> Result<bool> {
        let request = ApiRequest::get(format!("/api/spot/v3/orders/{}", order.exchange_order_id))
            .query("instrument_id", universe.symbol(&order.pair()));
        let row: OrderRow = typed(self.rest.private_call_json(request).await?)?;
        // -2 failed, -1 cancelled, 2 filled; 0, 1, 3 and 4 are still live
        Ok(matches!(row.state.as_deref(), Some("-2" | "-1" | "2")))
    }

    async fn active_orders(&self, universe: &PairUniverse) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = typed(
            self.rest
                .private_call_json(ApiRequest::get("/api/spot/v3/orders_pending"))
                .await?,
        )?;
        rows.into_iter()
            .map(|row| {
                let pair = universe.parse(&row.instrument_id)?;
                Ok(Order {
                    exchange_order_id: row.order_id,
                    order_type: OrderType::from_side(&row.side)?,
                    trading: pair.trading,
                    settlement: pair.settlement,
                    price: row.price,
                    amount: row.size - row.filled_size,
                })
            })
            .collect()
    }

    async fn transfer(&self, asset: &str, address: &str, amount: f64, extra_fee: f64) -> Result<()> {
        let body = json!({
            "currency": asset.to_lowercase(),
            "amount": amount.to_string(),
            "destination": DESTINATION_CHAIN,
            "to_address": address,
            "fee": extra_fee.to_string(),
        });
        let reply = self
            .rest
            .private_call_json(ApiRequest::post("/api/account/v3/withdrawal").json(body))
            .await?;
        id_at(&reply, "/withdrawal_id").map(|_| ())
    }

    async fn address(&self, asset: &str) -> Result<String> {
        let request = ApiRequest::get("/api/account/v3/deposit/address").query("currency", asset.to_lowercase());
        let reply = self.rest.private_call_json(request).await?;
        array_at(&reply, "")?
            .iter()
            .find_map(|row| row.get("address").and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| ExchangeError::schema(format!("no deposit address for {asset}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::http::Method;
    use crate::testing::MockTransport;
    use crate::traits::{Exchange, TradingExchange};

    fn setup() -> (Arc<MockTransport>, OkexExchange) {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Get, "/api/spot/v3/instruments", 200, json!([
            {"instrument_id": "ETH-BTC", "base_currency": "ETH", "quote_currency": "BTC",
             "tick_size": "0.00001", "size_increment": "0.001", "min_size": "0.001"},
            {"instrument_id": "BTC-USDT", "base_currency": "BTC", "quote_currency": "USDT",
             "tick_size": "0.1", "size_increment": "0.00000001", "min_size": "0.001"}
        ]));
        let exchange = create(Some(Credentials::new("key", "secret")), &ExchangeConfig::default(), mock.clone()).unwrap();
        (mock, exchange)
    }

    #[monoio::test]
    async fn test_ticker_and_precision() {
        let (mock, exchange) = setup();
        mock.on(Method::Get, "/api/spot/v3/instruments/ticker", 200, json!([
            {"instrument_id": "ETH-BTC", "last": "0.05", "quote_volume_24h": "99.5", "best_bid": "0.0499", "best_ask": "0.0501"}
        ]));
        assert_eq!(exchange.rate("ETH", "BTC").await.unwrap(), 0.05);
        assert_eq!(exchange.volume("ETH", "BTC").await.unwrap(), 99.5);
        assert_eq!(exchange.precise("BTC", "USDT").await.unwrap(), Precisions::new(1, 8).unwrap());
    }

    #[monoio::test]
    async fn test_instrument_without_increments_only_affects_itself() {
        let (mock, exchange) = setup();
        mock.clear(Method::Get, "/api/spot/v3/instruments");
        mock.on(Method::Get, "/api/spot/v3/instruments", 200, json!([
            {"instrument_id": "ETH-BTC", "base_currency": "ETH", "quote_currency": "BTC",
             "tick_size": "0.00001", "size_increment": "0.001"},
            {"instrument_id": "BTC-USDT", "base_currency": "BTC", "quote_currency": "USDT"}
        ]));

        assert_eq!(exchange.currency_pairs().await.unwrap().len(), 2);
        assert_eq!(exchange.precise("ETH", "BTC").await.unwrap(), Precisions::new(5, 3).unwrap());
        assert_eq!(exchange.precise("BTC", "USDT").await.unwrap_err().kind(), ErrorKind::PrecisionUnknown);
    }

    #[monoio::test]
    async fn test_order_and_cancel() {
        let (mock, exchange) = setup();
        mock.on(Method::Post, "/api/spot/v3/orders", 200, json!({"order_id": "2510789768709120", "result": true}));
        mock.on(Method::Post, "/api/spot/v3/cancel_orders/2510789768709120", 400, json!({
            "error_code": "33014", "error_message": "Order does not exist", "result": false
        }));

        let id = exchange.order("ETH", "BTC", OrderType::Bid, 0.0512345, 2.34567).await.unwrap();
        let sent = mock.last_request(Method::Post, "/api/spot/v3/orders").unwrap();
        let body: Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["side"], "sell");
        assert_eq!(body["price"], "0.05123");
        assert_eq!(body["size"], "2.345");
        assert!(sent.url.contains("AccessKeyId=key"));

        let order = Order {
            exchange_order_id: id,
            order_type: OrderType::Bid,
            trading: "ETH".into(),
            settlement: "BTC".into(),
            price: 0.05123,
            amount: 2.345,
        };
        exchange.cancel_order(&order).await.unwrap();
    }

    #[monoio::test]
    async fn test_withdrawal_fee_endpoint() {
        let (mock, exchange) = setup();
        mock.on(Method::Get, "/api/account/v3/withdrawal/fee", 200, json!([
            {"currency": "BTC", "min_fee": "0.0005", "max_fee": "0.01"},
            {"currency": "USDT", "min_fee": "2", "max_fee": "20"}
        ]));
        let fees = exchange.transfer_fee().await.unwrap();
        assert_eq!(fees["USDT"], 2.0);

        mock.on(Method::Get, "/api/account/v3/currencies", 200, json!([
            {"currency": "BTC", "can_deposit": "1", "can_withdraw": "1"},
            {"currency": "XMR", "can_deposit": "1", "can_withdraw": "0"}
        ]));
        assert_eq!(exchange.frozen_currency().await.unwrap(), vec!["XMR"]);
    }

    #[monoio::test]
    async fn test_auth_error_code() {
        let (mock, exchange) = setup();
        mock.on(Method::Get, "/api/spot/v3/accounts", 401, json!({"code": 30006, "message": "invalid OK-ACCESS-KEY"}));
        assert_eq!(exchange.complete_balances().await.unwrap_err().kind(), ErrorKind::Auth);
    }

    #[monoio::test]
    async fn test_order_state() {
        let (mock, exchange) = setup();
        mock.on(Method::Get, "/api/spot/v3/orders/7", 200, json!({
            "order_id": "7", "instrument_id": "ETH-BTC", "side": "buy", "price": "0.05",
            "size": "1", "filled_size": "1", "state": "2"
        }));
        let order = Order {
            exchange_order_id: "7".into(),
            order_type: OrderType::Ask,
            trading: "ETH".into(),
            settlement: "BTC".into(),
            price: 0.05,
            amount: 1.0,
        };
        assert!(exchange.is_order_filled(&order).await.unwrap());
    }
}
