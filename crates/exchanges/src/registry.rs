//! Venue registry
//!
//! Maps a lower-case venue name to the constructor of its adapter.

use crate::auth::Credentials;
use crate::config::ExchangeConfig;
use crate::errors::{ExchangeError, Result};
use crate::http::{HttpTransport, MonoioHttpsClient};
use crate::traits::{ExchangeFactory, TradingExchange};
use crate::{binance, bitflyer, hitbtc, huobi, kucoin, lbank, okex, p2pb2b, poloniex, shrimpy};
use std::sync::Arc;
use tracing::info;

type Constructor = fn(Option<Credentials>, &ExchangeConfig, Arc<dyn HttpTransport>) -> Result<Box<dyn TradingExchange>>;

fn boxed<E: TradingExchange + 'static>(adapter: Result<E>) -> Result<Box<dyn TradingExchange>> {
    Ok(Box::new(adapter?))
}

const VENUES: &[(&str, Constructor)] = &[
    (binance::Binance::NAME, |c, cfg, t| boxed(binance::create(c, cfg, t))),
    (bitflyer::Bitflyer::NAME, |c, cfg, t| boxed(bitflyer::create(c, cfg, t))),
    (hitbtc::Hitbtc::NAME, |c, cfg, t| boxed(hitbtc::create(c, cfg, t))),
    (huobi::Huobi::NAME, |c, cfg, t| boxed(huobi::create(c, cfg, t))),
    (kucoin::Kucoin::NAME, |c, cfg, t| boxed(kucoin::create(c, cfg, t))),
    (lbank::Lbank::NAME, |c, cfg, t| boxed(lbank::create(c, cfg, t))),
    (okex::Okex::NAME, |c, cfg, t| boxed(okex::create(c, cfg, t))),
    (p2pb2b::P2pb2b::NAME, |c, cfg, t| boxed(p2pb2b::create(c, cfg, t))),
    (poloniex::Poloniex::NAME, |c, cfg, t| boxed(poloniex::create(c, cfg, t))),
    (shrimpy::Shrimpy::NAME, |c, cfg, t| boxed(shrimpy::create(c, cfg, t))),
];

/// [`ExchangeFactory`] over every adapter in this crate
#[derive(Debug, Default, Clone, Copy)]
pub struct VenueRegistry;

impl VenueRegistry {
    pub fn new() -> Self {
        Self
    }

    fn constructor(name: &str) -> Result<Constructor> {
        let wanted = name.trim().to_ascii_lowercase();
        VENUES
            .iter()
            .find(|(venue, _)| *venue == wanted)
            .map(|(_, constructor)| *constructor)
            .ok_or_else(|| ExchangeError::UnknownVenue(name.to_string()))
    }
}

impl ExchangeFactory for VenueRegistry {
    fn create(
        &self,
        name: &str,
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
    ) -> Result<Box<dyn TradingExchange>> {
        let constructor = Self::constructor(name)?;
        let transport = Arc::new(MonoioHttpsClient::new(config.timeout())?);
        info!("🚀 Creating {} adapter", name.to_ascii_lowercase());
        constructor(credentials, config, transport)
    }

    fn create_with_transport(
        &self,
        name: &str,
        credentials: Option<Credentials>,
        config: &ExchangeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Box<dyn TradingExchange>> {
        let constructor = Self::constructor(name)?;
        constructor(credentials, config, transport)
    }

    fn supported_exchanges(&self) -> Vec<String> {
        VENUES.iter().map(|(name, _)| name.to_string()).collect()
    }
}
