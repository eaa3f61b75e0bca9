//! Kucoin API v1 adapter
//!
//! Replies are wrapped in `{"success": true, "code": "OK", "data": ...}`.
//! One `open/symbols` call carries last price, settlement volume and the
//! top of book for every market.

use crate::adapter::{Adapter, VenueMarket, VenueTrading};
use crate::auth::{Credentials, Signer, SigningScheme};
use crate::cache::{MarketSnapshot, PairUniverse};
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::http::HttpTransport;
use crate::json::{array_at, flexible_f64, id_at, str_at, typed, BookSchema, Rows, SymbolSource, TickerSchema};
use crate::precision::{self, PrecisionMap};
use crate::rest::{ApiRequest, RestClient};
use crate::symbol::{SymbolCase, SymbolStyle};
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const TICKER: TickerSchema = TickerSchema {
    rows: Rows::Array("/data"),
    symbol: SymbolSource::Field("/symbol"),
    last: "/lastDealPrice",
    volume: Some("/volValue"),
    bid: Some("/buy"),
    ask: Some("/sell"),
};

const BOOK: BookSchema = BookSchema { asks: "/data/SELL", bids: "/data/BUY" };

const TRADE_FEE: f64 = 0.001;
const BALANCE_PAGE_SIZE: &str = "20";

pub type KucoinExchange = Adapter<Kucoin>;

pub struct Kucoin {
    rest: RestClient,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinRow {
    coin: String,
    #[serde(default)]
    trade_precision: Option<u32>,
    #[serde(default)]
    enable_deposit: bool,
    #[serde(default)]
    enable_withdraw: bool,
    #[serde(default, deserialize_with = "flexible_f64")]
    withdraw_min_fee: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceRow {
    coin_type: String,
    #[serde(deserialize_with = "flexible_f64")]
    balance: f64,
    #[serde(deserialize_with = "flexible_f64")]
    freeze_balance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalancePage {
    datas: Vec<BalanceRow>,
    #[serde(default)]
    page_nos: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveOrder {
    oid: String,
    coin_type: String,
    coin_type_pair: String,
    #[serde(deserialize_with = "flexible_f64")]
    price: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pending_amount: f64,
}

impl Kucoin {
    pub const NAME: &'static str = "kucoin";
    pub const BASE_URL: &'static str = "https://api.kucoin.com";

    pub fn new(
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let signer = Signer::new(SigningScheme::Kucoin, credentials);
        let rest = RestClient::new(Self::NAME, config.base_url_or(Self::BASE_URL), transport, signer)?
            .with_error_probe(error_probe)
            .with_timing(config.enable_timing);
        Ok(Self { rest })
    }

    async fn coins(&self) -> Result<Vec<CoinRow>> {
        let reply = self.rest.public_get_json("/v1/market/open/coins", &[]).await?;
        typed(reply.get("data").cloned().unwrap_or_default())
    }
}

/// `{"success": false, "code": "UNAUTH", "msg": "Invalid nonce"}`
fn error_probe(_status: u16, body: &Value) -> Option<ExchangeError> {
    if body.get("success").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    let code = body.get("code").and_then(Value::as_str).unwrap_or("ERROR");
    let message = body.get("msg").and_then(Value::as_str).unwrap_or_default();
    Some(match code {
        "UNAUTH" => ExchangeError::AuthFailure(message.to_string()),
        _ => ExchangeError::venue(code, message),
    })
}

/// Cancel of an order the venue no longer has
fn is_missing_order(error: &ExchangeError) -> bool {
    error
        .venue_message()
        .is_some_and(|message| message.to_ascii_lowercase().contains("not exist"))
}

pub fn create(
    credentials: Option<Credentials>,
    config: &ExchangeConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<KucoinExchange> {
    Ok(Adapter::new(Kucoin::new(credentials, config, transport)?, config))
}

#[async_trait(?Send)]
impl VenueMarket for Kucoin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbol_style(&self) -> SymbolStyle {
        SymbolStyle::delimited('-', SymbolCase::Upper)
    }

    async fn fetch_currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        let reply = self.rest.public_get_json("/v1/market/open/symbols", &[]).await?;
        Ok(array_at(&reply, "/data")?
            .iter()
            .filter_map(|row| {
                let trading = str_at(row, "/coinType").ok()?;
                let settlement = str_at(row, "/coinTypePair").ok()?;
                CurrencyPair::new(trading, settlement).ok()
            })
            .collect())
    }

    async fn fetch_market(&self, universe: &PairUniverse) -> Result<MarketSnapshot> {
        let reply = self.rest.public_get_json("/v1/market/open/symbols", &[]).await?;
        Ok(MarketSnapshot::from_rows(TICKER.extract(&reply)?, universe))
    }

    async fn fetch_precisions(&self, universe: &PairUniverse) -> Result<PrecisionMap> {
        let decimals: HashMap<String, u32> = self
            .coins()
            .await?
            .into_iter()
            .filter_map(|c| Some((c.coin.to_uppercase(), c.trade_precision?)))
            .collect();
        let mut map = PrecisionMap::new();
        for pair in universe.pairs() {
            // price is counted in the settlement coin, amount in the trading coin
            precision::record(
                &mut map,
                pair.clone(),
                decimals.get(&pair.settlement).copied(),
                decimals.get(&pair.trading).copied(),
            );
        }
        Ok(map)
    }

    async fn fetch_board(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<Board> {
        let symbol = universe.symbol(pair);
        let reply = self
            .rest
            .public_get_json("/v1/open/orders", &[("symbol", symbol.as_str()), ("limit", "100")])
            .await?;
        Ok(BOOK.extract(&reply))
    }

    async fn fetch_frozen_currency(&self) -> Result<Vec<String>> {
        Ok(self
            .coins()
            .await?
            .into_iter()
            .filter(|c| !c.enable_deposit || !c.enable_withdraw)
            .map(|c| c.coin.to_uppercase())
            .collect())
    }
}

#[async_trait(?Send)]
impl VenueTrading for Kucoin {
    async fn trade_fee_rate(&self, _universe: &PairUniverse, _pair: &CurrencyPair) -> Result<TradeFee> {
        Ok(TradeFee::flat(TRADE_FEE))
    }

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>> {
        Ok(self
            .coins()
            .await?
            .into_iter()
            .map(|c| (c.coin.to_uppercase(), c.withdraw_min_fee))
            .collect())
    }

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>> {
        let mut balances = HashMap::new();
        let mut page = 1u32;
        loop {
            let request = ApiRequest::get("/v1/account/balances")
                .query("limit", BALANCE_PAGE_SIZE)
                .query("page", page);
            let reply = self.rest.private_call_json(request).await?;
            let batch: BalancePage = typed(reply.get("data").cloned().unwrap_or_default())?;
            for row in batch.datas {
                balances.insert(row.coin_type, Balance::new(row.balance, row.freeze_balance));
            }
            if page >= batch.page_nos {
                break;
            }
            page += 1;
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
        let request = ApiRequest::post("/v1/order")
            .form("symbol", universe.symbol(pair))
            .form("type", if order_type.is_buy() { "BUY" } else { "SELL" })
            .form("price", price)
            .form("amount", amount);
        let reply = self.rest.private_call_json(request).await?;
        id_at(&reply, "/data/orderOid")
    }

    async fn cancel_order(&self, universe: &PairUniverse, order: &Order) -> Result<()> {
        let request = ApiRequest::post("/v1/cancel-order")
            .form("symbol", universe.symbol(&order.pair()))
            .form("orderOid", &order.exchange_order_id)
            .form("type", if order.order_type.is_buy() { "BUY" } else { "SELL" });
        match self.rest.private_call(request).await {
            Ok(_) => Ok(()),
            Err(e) if is_missing_order(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn active_orders(&self, _universe: &PairUniverse) -> Result<Vec<Order>> {
        let reply = self
            .rest
            .private_call_json(ApiRequest::get("/v1/order/active-map"))
            .await?;
        let mut orders = Vec::new();
        for (side, order_type) in [("BUY", OrderType::Ask), ("SELL", OrderType::Bid)] {
            let rows: Vec<ActiveOrder> =
                typed(reply.pointer(&format!("/data/{side}")).cloned().unwrap_or(Value::Array(Vec::new())))?;
            for row in rows {
                let pair = CurrencyPair::new(&row.coin_type, &row.coin_type_pair)?;
                orders.push(Order {
                    exchange_order_id: row.oid,
                    order_type,
                    trading: pair.trading,
                    settlement: pair.settlement,
                    price: row.price,
                    amount: row.pending_amount,
                });
            }
        }
        Ok(orders)
    }

    async fn transfer(&self, asset: &str, address: &str, amount: f64, _extra_fee: f64) -> Result<()> {
        let request = ApiRequest::post(format!("/v1/account/{asset}/withdraw/apply"))
            .form("coin", asset)
            .form("amount", amount)
            .form("address", address);
        self.rest.private_call(request).await.map(|_| ())
    }

    async fn address(&self, asset: &str) -> Result<String> {
        let request = ApiRequest::get(format!("/v1/account/{asset}/wallet/address"));
        let reply = self.rest.private_call_json(request).await?;
        Ok(str_at(&reply, "/data/address")?.to_string())
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

    fn setup() -> (Arc<MockTransport>, KucoinExchange) {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Get, "/v1/market/open/symbols", 200, json!({"success": true, "code": "OK", "data": [
            {"coinType": "ETH", "coinTypePair": "BTC", "symbol": "ETH-BTC", "trading": true,
             "lastDealPrice": 0.05, "volValue": 98.7, "buy": 0.0499, "sell": 0.0501},
            {"coinType": "KCS", "coinTypePair": "USDT", "symbol": "KCS-USDT", "trading": true,
             "lastDealPrice": 1.2, "volValue": 5000, "buy": 1.19, "sell": 1.21}
        ]}));
        mock.on(Method::Get, "/v1/market/open/coins", 200, json!({"success": true, "code": "OK", "data": [
            {"coin": "ETH", "tradePrecision": 4, "enableDeposit": true, "enableWithdraw": true, "withdrawMinFee": 0.01},
            {"coin": "BTC", "tradePrecision": 8, "enableDeposit": true, "enableWithdraw": false, "withdrawMinFee": 0.0005},
            {"coin": "KCS", "tradePrecision": 4, "enableDeposit": true, "enableWithdraw": true, "withdrawMinFee": 2}
        ]}));
        let exchange = create(Some(Credentials::new("key", "secret")), &ExchangeConfig::default(), mock.clone()).unwrap();
        (mock, exchange)
    }

    #[monoio::test]
    async fn test_market_from_symbols() {
        let (_, exchange) = setup();
        assert_eq!(exchange.rate("ETH", "BTC").await.unwrap(), 0.05);
        assert_eq!(exchange.volume("KCS", "USDT").await.unwrap(), 5000.0);
        assert_eq!(exchange.order_book_tick_map().await.unwrap()["ETH"]["BTC"].best_ask_price, 0.0501);
    }

    #[monoio::test]
    async fn test_precision_from_coin_decimals() {
        let (_, exchange) = setup();
        assert_eq!(exchange.precise("ETH", "BTC").await.unwrap(), Precisions::new(8, 4).unwrap());
        // USDT is not described by the coin listing
        assert_eq!(exchange.precise("KCS", "USDT").await.unwrap_err().kind(), ErrorKind::PrecisionUnknown);
        assert_eq!(exchange.frozen_currency().await.unwrap(), vec!["BTC"]);
    }

    #[monoio::test]
    async fn test_coin_without_precision_only_affects_its_pairs() {
        let (mock, exchange) = setup();
        mock.clear(Method::Get, "/v1/market/open/coins");
        mock.on(Method::Get, "/v1/market/open/coins", 200, json!({"success": true, "code": "OK", "data": [
            {"coin": "ETH", "tradePrecision": 4},
            {"coin": "BTC", "tradePrecision": 8},
            {"coin": "KCS", "enableDeposit": true},
            {"coin": "USDT", "tradePrecision": 6}
        ]}));

        assert_eq!(exchange.precise("ETH", "BTC").await.unwrap(), Precisions::new(8, 4).unwrap());
        assert_eq!(exchange.precise("KCS", "USDT").await.unwrap_err().kind(), ErrorKind::PrecisionUnknown);
    }

    #[monoio::test]
    async fn test_balances_follow_pages() {
        let (mock, exchange) = setup();
        mock.on(Method::Get, "/v1/account/balances?limit=20&page=1", 200, json!({"success": true, "data": {
            "datas": [{"coinType": "BTC", "balance": 1.0, "freezeBalance": 0.5}], "pageNos": 2, "currPageNo": 1
        }}));
        mock.on(Method::Get, "/v1/account/balances?limit=20&page=2", 200, json!({"success": true, "data": {
            "datas": [{"coinType": "ETH", "balance": 3.0, "freezeBalance": 0}], "pageNos": 2, "currPageNo": 2
        }}));

        let complete = exchange.complete_balances().await.unwrap();
        assert_eq!(complete.len(), 2);
        assert_eq!(complete["BTC"], Balance::new(1.0, 0.5));
        assert_eq!(mock.count(Method::Get, "/v1/account/balances"), 2);

        let sent = mock.last_request(Method::Get, "/v1/account/balances").unwrap();
        assert_eq!(sent.header("KC-API-KEY"), Some("key"));
    }

    #[monoio::test]
    async fn test_active_orders_and_fill_by_diff() {
        let (mock, exchange) = setup();
        mock.on(Method::Get, "/v1/order/active-map", 200, json!({"success": true, "data": {
            "SELL": [{"oid": "s1", "coinType": "ETH", "coinTypePair": "BTC", "price": 0.06, "pendingAmount": 1.0}],
            "BUY": [{"oid": "b1", "coinType": "ETH", "coinTypePair": "BTC", "price": 0.04, "pendingAmount": 2.0}]
        }}));

        let open = exchange.active_orders().await.unwrap();
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].order_type, OrderType::Ask);
        assert_eq!(open[1].exchange_order_id, "s1");

        let mut gone = open[0].clone();
        gone.exchange_order_id = "b0".into();
        assert!(exchange.is_order_filled(&gone).await.unwrap());
        assert!(!exchange.is_order_filled(&open[1]).await.unwrap());
    }

    #[monoio::test]
    async fn test_cancel_missing_order() {
        let (mock, exchange) = setup();
        mock.on(Method::Post, "/v1/cancel-order", 200, json!({"success": false, "code": "ERROR", "msg": "Order not exist"}));
        let order = Order {
            exchange_order_id: "b1".into(),
            order_type: OrderType::Ask,
            trading: "ETH".into(),
            settlement: "BTC".into(),
            price: 0.04,
            amount: 2.0,
        };
        exchange.cancel_order(&order).await.unwrap();

        mock.clear(Method::Post, "/v1/cancel-order");
        mock.on(Method::Post, "/v1/cancel-order", 200, json!({"success": false, "code": "UNAUTH", "msg": "Signature verification failed"}));
        assert_eq!(exchange.cancel_order(&order).await.unwrap_err().kind(), ErrorKind::Auth);
    }
}
