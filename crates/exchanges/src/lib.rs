//! # Unifex Exchange Adapters
//!
//! One uniform spot-trading interface over heterogeneous venue REST APIs.
//!
//! ## Architecture
//!
//! - **monoio-based HTTPS transport** behind the [`HttpTransport`] seam
//! - **Signing strategies** chosen per venue at construction ([`SigningScheme`])
//! - **Declarative extraction** of tickers and books through JSON pointers
//! - **Adapter façade** owning the pair, market, board and precision caches
//! - **Bounded fan-out** for venues that only publish per-symbol endpoints
//! - **Venue registry** handing out `Box<dyn TradingExchange>` by name

pub mod adapter;
pub mod auth;
pub mod cache;
pub mod config;
pub mod errors;
pub mod fanout;
pub mod http;
pub mod json;
pub mod precision;
pub mod registry;
pub mod rest;
pub mod symbol;
pub mod traits;
pub mod types;

pub mod binance;
pub mod bitflyer;
pub mod hitbtc;
pub mod huobi;
pub mod kucoin;
pub mod lbank;
pub mod okex;
pub mod p2pb2b;
pub mod poloniex;
pub mod shrimpy;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export main types
pub use auth::{Credentials, SigningScheme};
pub use config::ExchangeConfig;
pub use errors::{ErrorKind, ExchangeError, Result};
pub use http::{HttpTransport, MonoioHttpsClient};
pub use registry::VenueRegistry;
pub use traits::{Exchange, ExchangeFactory, TradingExchange};
pub use types::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::auth::Credentials;
    pub use crate::config::ExchangeConfig;
    pub use crate::errors::{ErrorKind, ExchangeError, Result};
    pub use crate::registry::VenueRegistry;
    pub use crate::traits::{Exchange, ExchangeFactory, TradingExchange};
    pub use crate::types::*;
    pub use unifex_core::prelude::*;
}
