//! End-to-end scenarios through the public registry
//!
//! Every adapter is built by name over a `MockTransport`, so these tests see
//! exactly what a caller of `Box<dyn TradingExchange>` sees.

use rstest::*;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use unifex_exchanges::http::Method;
use unifex_exchanges::prelude::*;
use unifex_exchanges::testing::MockTransport;

fn block_on<F: Future>(future: F) -> F::Output {
    monoio::RuntimeBuilder::<monoio::LegacyDriver>::new()
        .build()
        .expect("monoio runtime")
        .block_on(future)
}

fn venue(name: &str, mock: &Arc<MockTransport>) -> Box<dyn TradingExchange> {
    let config = ExchangeConfig::for_venue(name);
    VenueRegistry::new()
        .create_with_transport(name, Some(Credentials::new("key", "secret")), &config, mock.clone())
        .expect("registered venue")
}

fn bitflyer_markets(mock: &MockTransport) {
    mock.on(Method::Get, "/v1/getmarkets", 200, json!([
        {"product_code": "BTC_JPY"},
        {"product_code": "ETH_BTC"}
    ]));
}

fn hitbtc_symbols() -> Value {
    json!([
        {"id": "ETHBTC", "baseCurrency": "ETH", "quoteCurrency": "BTC", "quantityIncrement": "0.001",
         "tickSize": "0.000001", "takeLiquidityRate": "0.001", "provideLiquidityRate": "-0.0001"},
        {"id": "BTCUSD", "baseCurrency": "BTC", "quoteCurrency": "USD", "quantityIncrement": "0.00001",
         "tickSize": "0.01", "takeLiquidityRate": "0.002", "provideLiquidityRate": "0.001"},
        {"id": "ETHUSD", "baseCurrency": "ETH", "quoteCurrency": "USD", "quantityIncrement": "0.0001",
         "tickSize": "0.01", "takeLiquidityRate": "0.002", "provideLiquidityRate": "0.001"}
    ])
}

fn binance_exchange_info() -> Value {
    json!({"symbols": [
        {"symbol": "ETHBTC", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "BTC",
         "filters": [{"filterType": "PRICE_FILTER", "tickSize": "0.00000100"},
                     {"filterType": "LOT_SIZE", "stepSize": "0.00100000"}]},
        {"symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT",
         "filters": [{"filterType": "PRICE_FILTER", "tickSize": "0.01000000"},
                     {"filterType": "LOT_SIZE", "stepSize": "0.00000100"}]}
    ]})
}

#[test]
fn test_bitflyer_fee_from_commission() {
    let mock = Arc::new(MockTransport::new());
    bitflyer_markets(&mock);
    mock.on(
        Method::Get,
        "/v1/me/gettradingcommission?product_code=BTC_JPY",
        200,
        json!({"commission_rate": 0.001}),
    );
    let exchange = venue("bitflyer", &mock);

    let fee = block_on(exchange.trade_fee_rate("BTC", "JPY")).unwrap();
    assert_eq!(fee, TradeFee { maker_fee: 0.001, taker_fee: 0.001 });
}

#[test]
fn test_bitflyer_balances_split_on_orders() {
    let mock = Arc::new(MockTransport::new());
    bitflyer_markets(&mock);
    mock.on(Method::Get, "/v1/me/getbalance", 200, json!([
        {"currency_code": "JPY", "amount": 1024078, "available": 508000},
        {"currency_code": "BTC", "amount": 10.24, "available": 4.12},
        {"currency_code": "ETH", "amount": 20.48, "available": 16.38}
    ]));
    let exchange = venue("bitflyer", &mock);

    let balances = block_on(exchange.balances()).unwrap();
    assert_eq!(balances["BTC"], 4.12);
    let complete = block_on(exchange.complete_balances()).unwrap();
    assert_eq!(complete["BTC"].available, 4.12);
    assert!((complete["BTC"].on_orders - 6.12).abs() < 1e-9);
}

#[test]
fn test_poloniex_rate_cache() {
    let mock = Arc::new(MockTransport::new());
    mock.on(Method::Get, "/public?command=returnTicker", 200, json!({
        "BTC_ETH": {"last": "0.1", "baseVolume": "12.5", "quoteVolume": "125", "highestBid": "0.099", "lowestAsk": "0.101"}
    }));
    let exchange = venue("poloniex", &mock);

    block_on(async {
        assert_eq!(exchange.rate("ETH", "BTC").await.unwrap(), 0.1);
        assert_eq!(exchange.volume("ETH", "BTC").await.unwrap(), 12.5);
        assert_eq!(exchange.rate("BTC", "BTC").await.unwrap(), 1.0);
    });
    // listing plus one snapshot; the second read is served from cache
    assert_eq!(mock.count(Method::Get, "/public"), 2);
}

#[rstest]
#[case("ETHBTC", "ETH", "BTC")]
#[case("BTCUSD", "BTC", "USD")]
#[case("ETHUSD", "ETH", "USD")]
fn test_hitbtc_pair_parsing(#[case] symbol: &str, #[case] trading: &str, #[case] settlement: &str) {
    let mock = Arc::new(MockTransport::new());
    mock.on(Method::Get, "/api/2/public/symbol", 200, hitbtc_symbols());
    let config = ExchangeConfig::for_venue("hitbtc");
    let exchange = unifex_exchanges::hitbtc::create(None, &config, mock.clone()).unwrap();

    let universe = block_on(exchange.universe()).unwrap();
    assert_eq!(universe.codec().settlements(), ["BTC", "ETH", "USD"]);
    assert_eq!(universe.parse(symbol).unwrap(), CurrencyPair::new(trading, settlement).unwrap());
}

#[test]
fn test_binance_order_formatting() {
    let mock = Arc::new(MockTransport::new());
    mock.on(Method::Get, "/api/v3/exchangeInfo", 200, binance_exchange_info());
    mock.on(Method::Post, "/api/v3/order", 200, json!({"symbol": "BTCUSDT", "orderId": 28}));
    let exchange = venue("binance", &mock);

    let id = block_on(exchange.order("BTC", "USDT", OrderType::Ask, 12345.6789, 0.1234567)).unwrap();
    assert_eq!(id, "28");
    let sent = mock.last_request(Method::Post, "/api/v3/order").unwrap();
    assert!(sent.url.contains("quantity=0.123456&price=12345.67"));
}

#[rstest]
#[case::binance_bid("binance", OrderType::Bid, "side=SELL")]
#[case::binance_ask("binance", OrderType::Ask, "side=BUY")]
#[case::hitbtc_bid("hitbtc", OrderType::Bid, "side=sell")]
#[case::hitbtc_ask("hitbtc", OrderType::Ask, "side=buy")]
fn test_order_side_inversion(#[case] name: &str, #[case] order_type: OrderType, #[case] expected: &str) {
    let mock = Arc::new(MockTransport::new());
    mock.on(Method::Get, "/api/v3/exchangeInfo", 200, binance_exchange_info());
    mock.on(Method::Post, "/api/v3/order", 200, json!({"symbol": "ETHBTC", "orderId": 7}));
    mock.on(Method::Get, "/api/2/public/symbol", 200, hitbtc_symbols());
    mock.on(Method::Post, "/api/2/order", 200, json!({"clientOrderId": "abc123", "status": "new"}));
    let exchange = venue(name, &mock);

    block_on(exchange.order("ETH", "BTC", order_type, 0.05, 1.0)).unwrap();
    let sent = mock
        .requests()
        .into_iter()
        .rev()
        .find(|r| r.method == Method::Post)
        .expect("order request");
    let wire = format!("{}&{}", sent.url, sent.body.unwrap_or_default());
    assert!(wire.contains(expected), "{wire} lacks {expected}");
}

#[rstest]
#[case("okex")]
#[case("KuCoin")]
#[case("p2pb2b")]
fn test_unlisted_pair_is_rejected(#[case] name: &str) {
    let mock = Arc::new(MockTransport::new());
    mock.on(Method::Get, "/api/spot/v3/instruments", 200, json!([]));
    mock.on(Method::Get, "/v1/market/open/symbols", 200, json!({"success": true, "data": []}));
    mock.on(Method::Get, "/api/v2/public/markets", 200, json!({"success": true, "result": []}));
    let exchange = venue(name, &mock);

    let err = block_on(exchange.precise("DOGE", "XYZ")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownPair);
}

#[test]
fn test_unknown_venue_name() {
    let mock = Arc::new(MockTransport::new());
    let err = VenueRegistry::new()
        .create_with_transport("mtgox", None, &ExchangeConfig::default(), mock)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::UnknownVenue);
}
