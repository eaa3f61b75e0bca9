//! Huobi Global adapter
//!
//! Every reply is wrapped in `{"status": "ok", "data": ...}` (v1) or
//! `{"code": 200, "data": ...}` (v2). There is no bulk ticker carrying
//! bid and ask, so the market snapshot comes from one `detail/merged`
//! call per symbol through the bounded fan-out.
//!
//! Private calls need the spot account id, which is looked up once and
//! kept for the adapter's lifetime.

use crate::adapter::{Adapter, VenueMarket, VenueTrading};
use crate::auth::{Credentials, Signer, SigningScheme};
use crate::cache::{MarketSnapshot, PairUniverse};
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::fanout::fan_out;
use crate::http::HttpTransport;
use crate::json::{array_at, flexible_f64, id_at, typed, BookSchema, Rows, SymbolSource, TickerSchema};
use crate::precision::{self, PrecisionMap};
use crate::rest::{ApiRequest, RestClient};
use crate::symbol::SymbolStyle;
use crate::types::*;
use async_trait::async_trait;
use futures_util::lock::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

const TICKER: TickerSchema = TickerSchema {
    rows: Rows::Array("/data"),
    symbol: SymbolSource::Field("/symbol"),
    last: "/tick/close",
    volume: Some("/tick/vol"),
    bid: Some("/tick/bid/0"),
    ask: Some("/tick/ask/0"),
};

const BOOK: BookSchema = BookSchema { asks: "/tick/asks", bids: "/tick/bids" };

const TRADE_FEE: f64 = 0.002;
const ORDER_STATE_ERROR: &str = "order-orderstate-error";

pub type HuobiExchange = Adapter<Huobi>;

pub struct Huobi {
    rest: RestClient,
    width: usize,
    account_id: Mutex<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct SymbolRow {
    #[serde(rename = "base-currency")]
    base_currency: String,
    #[serde(rename = "quote-currency")]
    quote_currency: String,
    #[serde(rename = "price-precision", default)]
    price_precision: Option<u32>,
    #[serde(rename = "amount-precision", default)]
    amount_precision: Option<u32>,
    #[serde(default)]
    state: Option<String>,
}

impl SymbolRow {
    fn is_online(&self) -> bool {
        self.state.as_deref().is_none_or(|state| state == "online")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrencyRow {
    currency: String,
    #[serde(default)]
    chains: Vec<ChainRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainRow {
    deposit_status: String,
    withdraw_status: String,
    #[serde(default)]
    transact_fee_withdraw: Option<String>,
}

impl ChainRow {
    fn is_open(&self) -> bool {
        self.deposit_status == "allowed" && self.withdraw_status == "allowed"
    }
}

#[derive(Debug, Deserialize)]
struct BalanceRow {
    currency: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(deserialize_with = "flexible_f64")]
    balance: f64,
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    id: u64,
    symbol: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(deserialize_with = "flexible_f64")]
    price: f64,
    #[serde(deserialize_with = "flexible_f64")]
    amount: f64,
    #[serde(rename = "filled-amount", deserialize_with = "flexible_f64")]
    filled_amount: f64,
}

impl Huobi {
    pub const NAME: &'static str = "huobi";
    pub const BASE_URL: &'static str = "https://api.huobi.pro";
    pub const HOST: &'static str = "api.huobi.pro";

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
        Ok(Self {
            rest,
            width: config.fan_out_width(),
            account_id: Mutex::new(None),
        })
    }

    async fn symbols(&self) -> Result<Vec<SymbolRow>> {
        let reply = self.rest.public_get_json("/v1/common/symbols", &[]).await?;
        typed(reply.get("data").cloned().unwrap_or_default())
    }

    async fn currencies(&self) -> Result<Vec<CurrencyRow>> {
        let reply = self.rest.public_get_json("/v2/reference/currencies", &[]).await?;
        typed(reply.get("data").cloned().unwrap_or_default())
    }

    /// Spot account id, fetched on first use
    async fn account_id(&self) -> Result<String> {
        let mut slot = self.account_id.lock().await;
        if let Some(id) = slot.as_ref() {
            return Ok(id.clone());
        }
        let reply = self
            .rest
            .private_call_json(ApiRequest::get("/v1/account/accounts"))
            .await?;
        let account = array_at(&reply, "/data")?
            .iter()
            .find(|a| a.get("type").and_then(Value::as_str) == Some("spot"))
            .ok_or_else(|| ExchangeError::schema("no spot account"))?;
        let id = id_at(account, "/id")?;
        info!("🔑 Huobi spot account {}", id);
        *slot = Some(id.clone());
        Ok(id)
    }
}

/// v1 `{"status": "error", "err-code": "..", "err-msg": ".."}` and
/// v2 `{"code": 1002, "message": ".."}`
fn error_probe(_status: u16, body: &Value) -> Option<ExchangeError> {
    let (code, message) = if body.get("status").and_then(Value::as_str) == Some("error") {
        (
            body.get("err-code").and_then(Value::as_str).unwrap_or_default().to_string(),
            body.get("err-msg").and_then(Value::as_str).unwrap_or_default(),
        )
    } else {
        match body.get("code").and_then(Value::as_i64) {
            Some(code) if code != 200 => (
                code.to_string(),
                body.get("message").and_then(Value::as_str).unwrap_or_default(),
            ),
            _ => return None,
        }
    };
    Some(match code.as_str() {
        "api-signature-not-valid" | "login-required" | "invalid-access-key" | "1002" | "1003" => {
            ExchangeError::AuthFailure(format!("{code}: {message}"))
        }
        _ => ExchangeError::venue(code, message),
    })
}

pub fn create(
    credentials: Option<Credentials>,
    config: &ExchangeConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<HuobiExchange> {
    Ok(Adapter::new(Huobi::new(credentials, config, transport)?, config))
}

#[async_trait(?Send)]
impl VenueMarket for Huobi {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbol_style(&self) -> SymbolStyle {
        SymbolStyle::concat_lower()
    }

    async fn fetch_currency_pairs(&self) -> Result<Vec<CurrencyPair>> {
        Ok(self
            .symbols()
            .await?
            .iter()
            .filter(|s| s.is_online())
            .filter_map(|s| CurrencyPair::new(&s.base_currency, &s.quote_currency).ok())
            .collect())
    }

    async fn fetch_market(&self, universe: &PairUniverse) -> Result<MarketSnapshot> {
        let symbols: Vec<String> = universe.pairs().iter().map(|p| universe.symbol(p)).collect();
        let rows = fan_out("huobi ticker", symbols, self.width, |symbol| async move {
            let reply = self
                .rest
                .public_get_json("/market/detail/merged", &[("symbol", symbol.as_str())])
                .await?;
            TICKER.extract_one(&symbol, &reply)
        })
        .await;
        Ok(MarketSnapshot::from_rows(rows, universe))
    }

    async fn fetch_precisions(&self, _universe: &PairUniverse) -> Result<PrecisionMap> {
        let mut map = PrecisionMap::new();
        for row in self.symbols().await? {
            if let Ok(pair) = CurrencyPair::new(&row.base_currency, &row.quote_currency) {
                precision::record(&mut map, pair, row.price_precision, row.amount_precision);
            }
        }
        Ok(map)
    }

    async fn fetch_board(&self, universe: &PairUniverse, pair: &CurrencyPair) -> Result<Board> {
        let symbol = universe.symbol(pair);
        let reply = self
            .rest
            .public_get_json("/market/depth", &[("symbol", symbol.as_str()), ("type", "step0")])
            .await?;
        Ok(BOOK.extract(&reply))
    }

    async fn fetch_frozen_currency(&self) -> Result<Vec<String>> {
        Ok(self
            .currencies()
            .await?
            .into_iter()
            .filter(|c| !c.chains.iter().any(ChainRow::is_open))
            .map(|c| c.currency.to_uppercase())
            .collect())
    }
}

#[async_trait(?Send)]
impl VenueTrading for Huobi {
    async fn trade_fee_rate(&self, _universe: &PairUniverse, _pair: &CurrencyPair) -> Result<TradeFee> {
        Ok(TradeFee::flat(TRADE_FEE))
    }

    async fn transfer_fee(&self) -> Result<HashMap<String, f64>> {
        Ok(self
            .currencies()
            .await?
            .into_iter()
            .filter_map(|c| {
                let fee = c
                    .chains
                    .iter()
                    .find_map(|chain| chain.transact_fee_withdraw.as_deref()?.parse::<f64>().ok())?;
                Some((c.currency.to_uppercase(), fee))
            })
            .collect())
    }

    async fn complete_balances(&self) -> Result<HashMap<String, Balance>> {
        let path = format!("/v1/account/accounts/{}/balance", self.account_id().await?);
        let reply = self.rest.private_call_json(ApiRequest::get(path)).await?;
        let rows: Vec<BalanceRow> = typed(reply.pointer("/data/list").cloned().unwrap_or_default())?;

        let mut balances: HashMap<String, Balance> = HashMap::new();
        for row in rows {
            let entry = balances.entry(row.currency.to_uppercase()).or_default();
            match row.kind.as_str() {
                "trade" => entry.available += row.balance,
                "frozen" => entry.on_orders += row.balance,
                _ => {}
            }
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
        let body = json!({
            "account-id": self.account_id().await?,
            "symbol": universe.symbol(pair),
            "type": if order_type.is_buy() { "buy-limit" } else { "sell-limit" },
            "amount": amount,
            "price": price,
        });
        let reply = self
            .rest
            .private_call_json(ApiRequest::post("/v1/order/orders/place").json(body))
            .await?;
        id_at(&reply, "/data")
    }

    async fn cancel_order(&self, _universe: &PairUniverse, order: &Order) -> Result<()> {
        let path = format!("/v1/order/orders/{}/submitcancel", order.exchange_order_id);
        match self.rest.private_call(ApiRequest::post(path).json(json!({}))).await {
            Ok(_) => Ok(()),
            // Already filled or cancelled
            Err(e) if e.venue_code() == Some(ORDER_STATE_ERROR) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn is_order_filled(&self, _universe: &PairUniverse, order: &Order) -> Result<bool> {
        let path = format!("/v1/order/orders/{}", order.exchange_order_id);
        let reply = self.rest.private_call_json(ApiRequest::get(path)).await?;
        let state = reply.pointer("/data/state").and_then(Value::as_str).unwrap_or_default();
        Ok(matches!(state, "filled" | "canceled" | "partial-canceled"))
    }

    async fn active_orders(&self, universe: &PairUniverse) -> Result<Vec<Order>> {
        let request = ApiRequest::get("/v1/order/openOrders").query("account-id", self.account_id().await?);
        let reply = self.rest.private_call_json(request).await?;
        let rows: Vec<OrderRow> = typed(reply.get("data").cloned().unwrap_or_default())?;
        rows.into_iter()
            .map(|row| {
                let pair = universe.parse(&row.symbol)?;
                Ok(Order {
                    exchange_order_id: row.id.to_string(),
                    order_type: OrderType::from_side(&row.kind)?,
                    trading: pair.trading,
                    settlement: pair.settlement,
                    price: row.price,
                    amount: row.amount - row.filled_amount,
                })
            })
            .collect()
    }

    async fn transfer(&self, asset: &str, address: &str, amount: f64, extra_fee: f64) -> Result<()> {
        let mut body = json!({
            "address": address,
            "amount": amount.to_string(),
            "currency": asset.to_lowercase(),
        });
        if extra_fee > 0.0 {
            body["fee"] = Value::from(extra_fee.to_string());
        }
        let reply = self
            .rest
            .private_call_json(ApiRequest::post("/v1/dw/withdraw/api/create").json(body))
            .await?;
        info!("💸 Huobi withdrawal {} accepted", id_at(&reply, "/data")?);
        Ok(())
    }

    async fn address(&self, asset: &str) -> Result<String> {
        let request = ApiRequest::get("/v2/account/deposit/address").query("currency", asset.to_lowercase());
        let reply = self.rest.private_call_json(request).await?;
        array_at(&reply, "/data")?
            .iter()
            .find_map(|row| row.get("address").and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| ExchangeError::schema(format!("no deposit address for {asset}")))
    }
}
