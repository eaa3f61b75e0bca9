//! Adapter configuration
//!
//! The core never reads the environment; callers build an
//! [`ExchangeConfig`] (or deserialize one) and pass it to the registry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIN_TIMEOUT_MS: u64 = 5_000;
const MAX_TIMEOUT_MS: u64 = 20_000;
const MAX_BOARD_CACHE_MS: u64 = 3_000;

/// Per-adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Replaces the venue's hardcoded base URL (testnets, proxies)
    pub base_url: Option<String>,
    /// HTTP timeout, clamped to 5-20 s
    pub timeout_ms: u64,
    /// Market cache staleness window
    pub rate_cache_ms: u64,
    /// Board cache window, never more than 3 s
    pub board_cache_ms: u64,
    /// Bound on concurrent requests during fan-out
    pub max_in_flight: usize,
    pub enable_timing: bool,
    /// Venue the Shrimpy aggregator routes to
    pub shrimpy_exchange: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 10_000,
            rate_cache_ms: 30_000,
            board_cache_ms: MAX_BOARD_CACHE_MS,
            max_in_flight: 10,
            enable_timing: true,
            shrimpy_exchange: "binance".to_string(),
        }
    }
}

impl ExchangeConfig {
    /// Preset for one venue
    pub fn for_venue(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "p2pb2b" => Self::default().with_rate_cache(Duration::from_secs(3)),
            _ => Self::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_rate_cache(mut self, ttl: Duration) -> Self {
        self.rate_cache_ms = ttl.as_millis() as u64;
        self
    }

    pub fn with_board_cache(mut self, ttl: Duration) -> Self {
        self.board_cache_ms = ttl.as_millis() as u64;
        self
    }

    pub fn with_max_in_flight(mut self, width: usize) -> Self {
        self.max_in_flight = width;
        self
    }

    pub fn with_timing(mut self, enable: bool) -> Self {
        self.enable_timing = enable;
        self
    }

    pub fn with_shrimpy_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.shrimpy_exchange = exchange.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
    }

    pub fn rate_cache_duration(&self) -> Duration {
        Duration::from_millis(self.rate_cache_ms)
    }

    pub fn board_cache_duration(&self) -> Duration {
        Duration::from_millis(self.board_cache_ms.min(MAX_BOARD_CACHE_MS))
    }

    pub fn fan_out_width(&self) -> usize {
        self.max_in_flight.max(1)
    }

    /// Configured base URL, falling back to the venue default
    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url.as_deref().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExchangeConfig::default();
        assert_eq!(config.rate_cache_duration(), Duration::from_secs(30));
        assert_eq!(config.board_cache_duration(), Duration::from_secs(3));
        assert_eq!(config.fan_out_width(), 10);
        assert_eq!(config.base_url_or("https://api.binance.com"), "https://api.binance.com");
    }

    #[test]
    fn test_p2pb2b_preset() {
        let config = ExchangeConfig::for_venue("P2PB2B");
        assert_eq!(config.rate_cache_duration(), Duration::from_secs(3));
        assert_eq!(ExchangeConfig::for_venue("huobi"), ExchangeConfig::default());
    }

    #[test]
    fn test_clamping() {
        let config = ExchangeConfig::default()
            .with_timeout(Duration::from_secs(60))
            .with_board_cache(Duration::from_secs(10))
            .with_max_in_flight(0);
        assert_eq!(config.timeout(), Duration::from_secs(20));
        assert_eq!(config.board_cache_duration(), Duration::from_secs(3));
        assert_eq!(config.fan_out_width(), 1);
        assert_eq!(
            ExchangeConfig::default().with_timeout(Duration::from_millis(1)).timeout(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ExchangeConfig =
            serde_json::from_str(r#"{"rate_cache_ms": 1000, "base_url": "http://localhost:8080"}"#).unwrap();
        assert_eq!(config.rate_cache_ms, 1000);
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.base_url_or("x"), "http://localhost:8080");
    }
}
