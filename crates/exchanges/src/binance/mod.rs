//! Binance spot adapter
//!
//! Public data from `/api/v3`, wallet data from `/sapi/v1`. Signed calls
//! carry every parameter in the query string with `recvWindow`,
//! `timestamp` and a hex HMAC-SHA256 `signature`, and the key in
//! `X-MBX-APIKEY`.

pub mod types;

use crate::adapter::{Adapter, VenueMarket, VenueTrading};
use crate::auth::{Credentials, Signer, SigningScheme};
use crate::cache::{MarketSnapshot, PairUniverse};
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::http::HttpTransport;
use crate::json::{levels, typed};
use crate::precision::{self, PrecisionMap};
use crate::rest::{ApiRequest, RestClient};
use crate::symbol::SymbolStyle;
use crate::types::*;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use unifex_core::Fixed;

pub use types::*;

const RECV_WINDOW_MS: u64 = 5000;
const BOOK_DEPTH: &str = "100";

/// Binance exchange adapter
pub type BinanceExchange = Adapter<Binance>;

/// Binance wire hooks
pub struct Binance {
    rest: RestClient,
}

impl Binance {
    pub const NAME: &'static str = "binance";
    pub const BASE_URL: &'static str = "https://api.binance.com";

    pub fn new(
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let signer = Signer::new(SigningScheme::Binance { recv_window: RECV_WINDOW_MS }, credentials);
        let rest = RestClient::new(Self::NAME, config.base_url_or(Self::BASE_URL), transport, signer)?
            .with_error_probe(error_probe)
            .with_timing(config.enable_timing);
        Ok(Self { rest })
    }

    async fn exchange_info(&self) -> Result<ExchangeInfo> {
        typed(self.rest.public_get_json("/api/v3/exchangeInfo", &[]).await?)
    }

    async fn coin_configs(&self) -> Result<Vec<CoinConfig>> {
        typed(
            self.rest
                .private_call_json(ApiRequest::get("/sapi/v1/capital/config/getall"))
                .await?,
        )
    }

    fn to_order(universe: &PairUniverse, info: OrderInfo) -> Result<Order> {
        let pair = universe.parse(&info.symbol)?;
        Ok(Order {
            exchange_order_id: info.order_id.to_string(),
            order_type: OrderType::from_side(&info.side)?,
            trading: pair.trading,
            settlement: pair.settlement,
            price: info.price,
            amount: info.orig_qty - info.executed_qty,
        })
    }
}

/// Binance replies `{"code": -1121, "msg": "..."}` on failure
fn error_probe(_status: u16, body: &Value) -> Option<ExchangeError> {
    let code = body.get("code")?.as_i64()?;
    if code >= 0 {
        return None;
    }
    let message = body.get("msg").and_then(Value::as_str).unwrap_or_default();
    Some(match code {
        -2014 | -2015 | -1022 => ExchangeError::AuthFailure(format!("{code}: {message}")),
        _ => ExchangeError::venue(code.to_string(), message),
    })
}

pub fn create(
    credentials: Option<Credentials>,
    config: &ExchangeConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<BinanceExchange> {
    info!("🚀 Initializing Binance adapter");
    Ok(Adapter::new(Binance::new(credentials, config, transport)?, config))
}

#[async_trait(?Send)]
impl VenueMarket for Binance {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbol_style(&self) -> SymbolStyle {
        SymbolStyle::concat_upper()
    }

    async fn fetch_currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        Ok(self
            .exchange_info()
            .await?
            .symbols
            .iter()
            .filter(|s| s.is_trading())
            .filter_map(|s| CurrencyPair::new(&s.base_asset, &s.quote_asset).ok())
            .collect())
    }

    async fn fetch_market(&self, universe: &PairUniverse) -> Result<MarketSnapshot> {
        let tickers: Vec<Ticker24hr> = typed(self.rest.public_get_json("/api/v3/ticker/24hr", &[]).await?)?;
        let mut builder = MarketSnapshot::builder();
        for ticker in tickers {
            match universe.parse(&ticker.symbol) {
                Ok(pair) if universe.contains(&pair) => builder.insert(
                    &pair,
                    ticker.last_price,
                    ticker.quote_volume,
                    ticker.ask_price,
                    ticker.bid_price,
                ),
                _ => debug!("skipping ticker {}", ticker.symbol),
            }
        }
        Ok(builder.build())
    }

    async fn fetch_precisions(&self, _universe: &PairUniverse) -> Result<PrecisionMap> {
        let mut map = PrecisionMap::new();
        for symbol in self.exchange_info().await?.symbols {
            let Ok(pair) = CurrencyPair::new(&symbol.base_asset, &symbol.quote_asset) else {
                continue;
            };
            let tick = symbol.filter("PRICE_FILTER").and_then(|f| f.tick_size.as_deref());
            let step = symbol.filter("LOT_SIZE").and_then(|f| f.step_size.as_deref());
            let places = |step: Option<&str>| step.and_then(|s| Fixed::step_decimals(s).ok());
            precision::record(&mut map, pair, places(tick), places(step));
        }
        Ok(map)
    }

    async fn fetch_board(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<Board> {
        let symbol = universe.symbol(pair);
        let book = self
            .rest
            .public_get_json("/api/v3/depth", &[("symbol", symbol.as_str()), ("limit", BOOK_DEPTH)])
            .await?;
        Ok(Board::from_levels(levels(book.get("asks")), levels(book.get("bids"))))
    }

    async fn fetch_frozen_currency(&self) -> Result<Vec<String>> {
        Ok(self
            .coin_configs()
            .await?
            .into_iter()
            .filter(|c| !c.deposit_all_enable || !c.withdraw_all_enable)
            .map(|c| c.coin)
            .collect())
    }
}

#[async_trait(?Send)]
impl VenueTrading for Binance {
    async fn trade_fee_rate(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<TradeFee> {
        let symbol = universe.symbol(pair);
        let request = ApiRequest::get("/sapi/v1/asset/tradeFee").query("symbol", &symbol);
        let fees: Vec<TradeFeeEntry> = typed(self.rest.private_call_json(request).await?)?;
        fees.into_iter()
            .find(|f| f.symbol == symbol)
            .map(|f| TradeFee {
                maker_fee: f.maker_commission,
                taker_fee: f.taker_commission,
            })
            .ok_or_else(|| ExchangeError::schema(format!("no trade fee for {symbol}")))
    }

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>> {
        Ok(self
            .coin_configs()
            .await?
            .into_iter()
            .filter_map(|c| c.withdraw_fee().map(|fee| (c.coin, fee)))
            .collect())
    }

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>> {
        let account: AccountInfo = typed(self.rest.private_call_json(ApiRequest::get("/api/v3/account")).await?)?;
        Ok(account
            .balances
            .into_iter()
            .map(|b| (b.asset, Balance::new(b.free, b.locked)))
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
        let side = if order_type.is_buy() { "BUY" } else { "SELL" };
        let request = ApiRequest::post("/api/v3/order")
            .query("symbol", universe.symbol(pair))
            .query("side", side)
            .query("type", "LIMIT")
            .query("timeInForce", "GTC")
            .query("quantity", amount)
            .query("price", price);
        let ack: OrderAck = typed(self.rest.private_call_json(request).await?)?;
        Ok(ack.order_id.to_string())
    }

    async fn cancel_order(&self, universe: &PairUniverse, order: &Order) -> Result<()> {
        let request = ApiRequest::delete("/api/v3/order")
            .query("symbol", universe.symbol(&order.pair()))
            .query("orderId", &order.exchange_order_id);
        match self.rest.private_call(request).await {
            Ok(_) => Ok(()),
            // Unknown order sent: already filled or cancelled
            Err(e) if e.venue_code() == Some("-2011") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn is_order_filled(&self, universe: &PairUniverse, order: &Order) -> Result<bool> {
        let request = ApiRequest::get("/api/v3/order")
            .query("symbol", universe.symbol(&order.pair()))
            .query("orderId", &order.exchange_order_id);
        match self.rest.private_call_json(request).await {
            Ok(value) => Ok(!typed::<OrderInfo>(value)?.status.is_open()),
            // Order does not exist
            Err(e) if e.venue_code() == Some("-2013") => Ok(true),
            Err(e) => Err(e),
        }
    }

    async fn active_orders(&self, universe: &PairUniverse) -> Result<Vec<Order>> {
        let open: Vec<OrderInfo> = typed(self.rest.private_call_json(ApiRequest::get("/api/v3/openOrders")).await?)?;
        open.into_iter().map(|info| Self::to_order(universe, info)).collect()
    }

    async fn transfer(&self, asset: &str, address: &str, amount: f64, _extra_fee: f64) -> Result<()> {
        let request = ApiRequest::post("/sapi/v1/capital/withdraw/apply")
            .query("coin", asset)
            .query("address", address)
            .query("amount", amount);
        let reply = self.rest.private_call_json(request).await?;
        info!("💸 Binance withdrawal {} accepted", reply.get("id").and_then(serde_json::Value::as_str).unwrap_or("?"));
        Ok(())
    }

    async fn address(&self, asset: &str) -> Result<String> {
        let request = ApiRequest::get("/sapi/v1/capital/deposit/address").query("coin", asset);
        let deposit: DepositAddress = typed(self.rest.private_call_json(request).await?)?;
        Ok(deposit.address)
    }
}
