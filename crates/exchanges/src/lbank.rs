//! LBank API v1 adapter
//!
//! Symbols are lower-case and `_`-delimited (`eth_btc`). Every private call
//! is a form POST carrying `api_key` and an MD5 `sign`. The open-order
//! endpoint is per market, so only markets touching an asset with a frozen
//! balance are queried.

use crate::adapter::{markets_with_frozen_balance, unsupported, Adapter, VenueMarket, VenueTrading};
use crate::auth::{Credentials, Signer, SigningScheme};
use crate::cache::{MarketSnapshot, PairUniverse};
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::fanout::try_fan_out;
use crate::http::HttpTransport;
use crate::json::{array_at, decimals, flag, flexible_f64, id_at, num, typed, BookSchema, Rows, SymbolSource, TickerSchema};
use crate::precision::{self, PrecisionMap};
use crate::rest::{ApiRequest, RestClient};
use crate::symbol::{SymbolCase, SymbolCodec, SymbolStyle};
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const STYLE: SymbolStyle = SymbolStyle::delimited('_', SymbolCase::Lower);

// ticker.do carries no top of book; `turnover` is the settlement volume
const TICKER: TickerSchema = TickerSchema {
    rows: Rows::Array(""),
    symbol: SymbolSource::Field("/symbol"),
    last: "/ticker/latest",
    volume: Some("/ticker/turnover"),
    bid: None,
    ask: None,
};

const BOOK: BookSchema = BookSchema { asks: "/asks", bids: "/bids" };

const TRADE_FEE: f64 = 0.001;
const ORDER_NOT_FOUND: &str = "10017";
const OPEN_ORDER_PAGE: &str = "200";

pub type LbankExchange = Adapter<Lbank>;

pub struct Lbank {
    rest: RestClient,
    width: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccuracyRow {
    symbol: String,
    #[serde(default)]
    price_accuracy: Value,
    #[serde(default)]
    quantity_accuracy: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawConfig {
    asset_code: String,
    can_with_draw: Value,
    #[serde(default)]
    fee: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    order_id: String,
    symbol: String,
    #[serde(rename = "type")]
    side: String,
    #[serde(deserialize_with = "flexible_f64")]
    price: f64,
    #[serde(deserialize_with = "flexible_f64")]
    amount: f64,
    #[serde(deserialize_with = "flexible_f64")]
    deal_amount: f64,
    #[serde(default)]
    status: i64,
}

impl OrderRow {
    /// 0 unfilled, 1 partially filled; -1 cancelled, 2 filled, 4 cancelling
    fn is_open(&self) -> bool {
        matches!(self.status, 0 | 1)
    }
}

impl Lbank {
    pub const NAME: &'static str = "lbank";
    pub const BASE_URL: &'static str = "https://api.lbank.info";

    pub fn new(
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let signer = Signer::new(SigningScheme::Lbank, credentials);
        let rest = RestClient::new(Self::NAME, config.base_url_or(Self::BASE_URL), transport, signer)?
            .with_error_probe(error_probe)
            .with_timing(config.enable_timing);
        Ok(Self {
            rest,
            width: config.fan_out_width(),
        })
    }

    async fn withdraw_configs(&self) -> Result<Vec<WithdrawConfig>> {
        typed(self.rest.public_get_json("/v1/withdrawConfigs.do", &[]).await?)
    }

    async fn orders(&self, label: &str, request: ApiRequest) -> Result<Vec<OrderRow>> {
        let reply = self.rest.private_call_json(request).await?;
        match reply.get("orders") {
            Some(orders) if !orders.is_null() => typed(orders.clone()),
            _ => {
                debug!("{} returned no orders", label);
                Ok(Vec::new())
            }
        }
    }
}

/// `{"result": "false", "error_code": 10017}`
fn error_probe(_status: u16, body: &Value) -> Option<ExchangeError> {
    if flag(body.get("result")?) != Some(false) {
        return None;
    }
    let code = body
        .get("error_code")
        .and_then(num)
        .map(|c| (c as i64).to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let message = body.get("msg").and_then(Value::as_str).unwrap_or("request rejected");
    Some(match code.as_str() {
        "10002" | "10005" => ExchangeError::AuthFailure(format!("{code}: {message}")),
        _ => ExchangeError::venue(code, message),
    })
}

fn to_order(universe: &PairUniverse, row: OrderRow) -> Result<Order> {
    let pair = universe.parse(&row.symbol)?;
    Ok(Order {
        exchange_order_id: row.order_id,
        order_type: OrderType::from_side(&row.side)?,
        trading: pair.trading,
        settlement: pair.settlement,
        price: row.price,
        amount: row.amount - row.deal_amount,
    })
}

pub fn create(
    credentials: Option<Credentials>,
    config: &ExchangeConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<LbankExchange> {
    Ok(Adapter::new(Lbank::new(credentials, config, transport)?, config))
}

#[async_trait(?Send)]
impl VenueMarket for Lbank {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbol_style(&self) -> SymbolStyle {
        STYLE
    }

    async fn fetch_currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        let reply = self.rest.public_get_json("/v1/currencyPairs.do", &[]).await?;
        let codec = SymbolCodec::new(STYLE, Vec::<String>::new());
        Ok(array_at(&reply, "")?
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|symbol| codec.parse(symbol).ok())
            .collect())
    }

    async fn fetch_market(&self, universe: &PairUniverse) -> Result<MarketSnapshot> {
        let reply = self.rest.public_get_json("/v1/ticker.do", &[("symbol", "all")]).await?;
        Ok(MarketSnapshot::from_rows(TICKER.extract(&reply)?, universe))
    }

    async fn fetch_precisions(&self, universe: &PairUniverse) -> Result<PrecisionMap> {
        let rows: Vec<AccuracyRow> = typed(self.rest.public_get_json("/v1/accuracy.do", &[]).await?)?;
        let mut map = PrecisionMap::new();
        for row in rows {
            let Ok(pair) = universe.parse(&row.symbol) else {
                continue;
            };
            precision::record(&mut map, pair, decimals(&row.price_accuracy), decimals(&row.quantity_accuracy));
        }
        Ok(map)
    }

    async fn fetch_board(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<Board> {
        let symbol = universe.symbol(pair);
        let reply = self
            .rest
            .public_get_json("/v1/depth.do", &[("symbol", symbol.as_str()), ("size", "60")])
            .await?;
        Ok(BOOK.extract(&reply))
    }

    async fn fetch_frozen_currency(&self) -> Result<Vec<String>> {
        Ok(self
            .withdraw_configs()
            .await?
            .into_iter()
            .filter(|c| flag(&c.can_with_draw) != Some(true))
            .map(|c| c.asset_code.to_uppercase())
            .collect())
    }
}

#[async_trait(?Send)]
impl VenueTrading for Lbank {
    async fn trade_fee_rate(&self, _universe: &PairUniverse, _pair: &CurrencyPair) -> Result<TradeFee> {
        Ok(TradeFee::flat(TRADE_FEE))
    }

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>> {
        Ok(self
            .withdraw_configs()
            .await?
            .into_iter()
            .filter_map(|c| Some((c.asset_code.to_uppercase(), num(c.fee.as_ref()?)?)))
            .collect())
    }

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>> {
        let reply = self.rest.private_call_json(ApiRequest::post("/v1/user_info.do")).await?;
        let section = |name: &str| -> HashMap<String, f64> {
            reply
                .pointer(&format!("/info/{name}"))
                .and_then(Value::as_object)
                .map(|assets| {
                    assets
                        .iter()
                        .filter_map(|(asset, amount)| Some((asset.to_uppercase(), num(amount)?)))
                        .collect()
                })
                .unwrap_or_default()
        };
        let free = section("free");
        let freeze = section("freeze");

        let mut balances: HashMap<String, Balance> = HashMap::new();
        for (asset, amount) in free {
            balances.entry(asset).or_default().available = amount.max(0.0);
        }
        for (asset, amount) in freeze {
            balances.entry(asset).or_default().on_orders = amount.max(0.0);
        }
        Ok(balances)
    }

    async fn place_order(
        &self,
        universe: &PairUniverse,
        pair: &CurrencyPair,
        order_type: OrderType,
        price: &str,
        amount: &str,
    ) -> Result<String> {
        let request = ApiRequest::post("/v1/create_order.do")
            .form("symbol", universe.symbol(pair))
            .form("type", if order_type.is_buy() { "buy" } else { "sell" })
            .form("price", price)
            .form("amount", amount);
        let reply = self.rest.private_call_json(request).await?;
        id_at(&reply, "/order_id")
    }

    async fn cancel_order(&self, universe: &PairUniverse, order: &Order) -> Result<()> {
        let request = ApiRequest::post("/v1/cancel_order.do")
            .form("symbol", universe.symbol(&order.pair()))
            .form("order_id", &order.exchange_order_id);
        match self.rest.private_call(request).await {
            Ok(_) => Ok(()),
            Err(e) if e.venue_code() == Some(ORDER_NOT_FOUND) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn is_order_filled(&self, universe: &PairUniverse, order: &Order) -> Result<bool> {
        let request = ApiRequest::post("/v1/orders_info.do")
            .form("symbol", universe.symbol(&order.pair()))
            .form("order_id", &order.exchange_order_id);
        let orders = self.orders("orders_info", request).await?;
        Ok(!orders
            .iter()
            .any(|o| o.order_id == order.exchange_order_id && o.is_open()))
    }

    async fn active_orders(&self, universe: &PairUniverse) -> Result<Vec<Order>> {
        let balances = self.complete_balances().await?;
        let markets: Vec<String> = markets_with_frozen_balance(universe, &balances)
            .iter()
            .map(|pair| universe.symbol(pair))
            .collect();
        let batches = try_fan_out("lbank open orders", markets, self.width, |symbol| async move {
            let request = ApiRequest::post("/v1/orders_info_no_deal.do")
                .form("symbol", &symbol)
                .form("current_page", 1)
                .form("page_length", OPEN_ORDER_PAGE);
            self.orders(&symbol, request).await
        })
        .await?;
        batches
            .into_iter()
            .flatten()
            .map(|row| to_order(universe, row))
            .collect()
    }

    async fn transfer(&self, asset: &str, address: &str, amount: f64, extra_fee: f64) -> Result<()> {
        let mut request = ApiRequest::post("/v1/withdraw.do")
            .form("account", address)
            .form("assetCode", asset.to_lowercase())
            .form("amount", amount);
        if extra_fee > 0.0 {
            request = request.form("fee", extra_fee);
        }
        self.rest.private_call(request).await.map(|_| ())
    }

    async fn address(&self, _asset: &str) -> Result<String> {
        unsupported(Self::NAME, "address")
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

    fn setup() -> (Arc<MockTransport>, LbankExchange) {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Get, "/v1/currencyPairs.do", 200, json!(["eth_btc", "bcc_eth", "lbk_usdt"]));
        let exchange = create(Some(Credentials::new("key", "secret")), &ExchangeConfig::default(), mock.clone()).unwrap();
        (mock, exchange)
    }

    #[monoio::test]
    async fn test_ticker_without_top_of_book() {
        let (mock, exchange) = setup();
        mock.on(Method::Get, "/v1/ticker.do", 200, json!([
            {"symbol": "eth_btc", "timestamp": 1410431279000u64,
             "ticker": {"change": 4.21, "high": 0.06, "latest": 0.05, "low": 0.04, "turnover": 12.34, "vol": 246.8}}
        ]));
        assert_eq!(exchange.rate("ETH", "BTC").await.unwrap(), 0.05);
        assert_eq!(exchange.volume("ETH", "BTC").await.unwrap(), 12.34);
        let ticks = exchange.order_book_tick_map().await.unwrap();
        assert_eq!(ticks["ETH"]["BTC"], OrderBookTick::default());
        assert_eq!(mock.last_request(Method::Get, "/v1/ticker.do").unwrap().url, "https://api.lbank.info/v1/ticker.do?symbol=all");
    }

    #[monoio::test]
    async fn test_balances_from_free_and_freeze() {
        let (mock, exchange) = setup();
        mock.on(Method::Post, "/v1/user_info.do", 200, json!({"result": "true", "info": {
            "free": {"btc": "1.5", "eth": "0"},
            "freeze": {"btc": "0.5", "lbk": "100"},
            "asset": {"net": "2.0"}
        }}));

        let complete = exchange.complete_balances().await.unwrap();
        assert_eq!(complete["BTC"], Balance::new(1.5, 0.5));
        assert_eq!(complete["LBK"], Balance::new(0.0, 100.0));
        assert_eq!(exchange.balances().await.unwrap()["ETH"], 0.0);

        let sent = mock.last_request(Method::Post, "/v1/user_info.do").unwrap();
        let body = sent.body.unwrap();
        assert!(body.starts_with("api_key=key&sign="));
    }

    #[monoio::test]
    async fn test_open_orders_only_for_frozen_markets() {
        let (mock, exchange) = setup();
        mock.on(Method::Post, "/v1/user_info.do", 200, json!({"result": true, "info": {
            "free": {"btc": "1"}, "freeze": {"lbk": "100"}
        }}));
        mock.on(Method::Post, "/v1/orders_info_no_deal.do", 200, json!({"result": true, "orders": [
            {"order_id": "o-1", "symbol": "lbk_usdt", "type": "sell", "price": 0.1, "amount": 100, "deal_amount": 25, "status": 1}
        ]}));

        let open = exchange.active_orders().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].amount, 75.0);
        assert_eq!(open[0].order_type, OrderType::Bid);
        // only lbk_usdt touches LBK
        assert_eq!(mock.count(Method::Post, "/v1/orders_info_no_deal.do"), 1);
    }

    #[monoio::test]
    async fn test_open_orders_fail_when_a_market_fails() {
        let (mock, exchange) = setup();
        mock.on(Method::Post, "/v1/user_info.do", 200, json!({"result": true, "info": {
            "free": {"btc": "1"}, "freeze": {"lbk": "100", "btc": "0.5"}
        }}));
        mock.on(Method::Post, "/v1/orders_info_no_deal.do", 200, json!({"result": "false", "error_code": 10005}));

        let err = exchange.active_orders().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[monoio::test]
    async fn test_cancel_and_status() {
        let (mock, exchange) = setup();
        mock.on(Method::Post, "/v1/cancel_order.do", 200, json!({"result": "false", "error_code": 10017}));
        mock.on(Method::Post, "/v1/orders_info.do", 200, json!({"result": true, "orders": [
            {"order_id": "o-1", "symbol": "eth_btc", "type": "buy", "price": 0.05, "amount": 1, "deal_amount": 1, "status": 2}
        ]}));
        let order = Order {
            exchange_order_id: "o-1".into(),
            order_type: OrderType::Ask,
            trading: "ETH".into(),
            settlement: "BTC".into(),
            price: 0.05,
            amount: 1.0,
        };
        exchange.cancel_order(&order).await.unwrap();
        assert!(exchange.is_order_filled(&order).await.unwrap());
        assert_eq!(exchange.address("BTC").await.unwrap_err().kind(), ErrorKind::Unsupported);
    }

    #[monoio::test]
    async fn test_accuracy_row_without_fields_only_affects_itself() {
        let (mock, exchange) = setup();
        mock.on(Method::Get, "/v1/accuracy.do", 200, json!([
            {"symbol": "eth_btc", "priceAccuracy": "6", "quantityAccuracy": "3"},
            {"symbol": "bcc_eth", "priceAccuracy": "8"}
        ]));

        assert_eq!(exchange.precise("ETH", "BTC").await.unwrap(), Precisions::new(6, 3).unwrap());
        assert_eq!(exchange.precise("BCC", "ETH").await.unwrap_err().kind(), ErrorKind::PrecisionUnknown);
    }

    #[monoio::test]
    async fn test_withdraw_configs() {
        let (mock, exchange) = setup();
        mock.on(Method::Get, "/v1/withdrawConfigs.do", 200, json!([
            {"assetCode": "btc", "min": "0.002", "canWithDraw": true, "fee": "0.001"},
            {"assetCode": "bcc", "min": "0.01", "canWithDraw": false, "fee": "0.0005"}
        ]));
        assert_eq!(exchange.frozen_currency().await.unwrap(), vec!["BCC"]);
        assert_eq!(exchange.transfer_fee().await.unwrap()["BTC"], 0.001);
    }
}
