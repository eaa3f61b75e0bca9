//! Live smoke test against one real venue
//!
//! Reads `.env`:
//! - `UNIFEX_VENUE` (default `binance`)
//! - `UNIFEX_API_KEY` / `UNIFEX_SECRET_KEY` (optional; private calls are
//!   skipped without them)
//! - `UNIFEX_PAIR` as `TRADING/SETTLEMENT` (default `ETH/BTC`)
//!
//! Only read-only endpoints are called. No order is placed.

use anyhow::{anyhow, Context};
use std::env;
use tracing::{info, warn};
use unifex_core::{init_logging, log_error, log_latency, PerfTimer};
use unifex_exchanges::prelude::*;

#[monoio::main(timer_enabled = true)]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let venue = env::var("UNIFEX_VENUE").unwrap_or_else(|_| "binance".to_string());
    let pair = env::var("UNIFEX_PAIR").unwrap_or_else(|_| "ETH/BTC".to_string());
    let (trading, settlement) = pair
        .split_once('/')
        .ok_or_else(|| anyhow!("UNIFEX_PAIR must look like ETH/BTC, got {pair}"))?;

    let credentials = match (env::var("UNIFEX_API_KEY"), env::var("UNIFEX_SECRET_KEY")) {
        (Ok(key), Ok(secret)) if !key.is_empty() && !secret.is_empty() => Some(Credentials::new(key, secret)),
        _ => {
            warn!("⚠️ No credentials in environment; private endpoints are skipped");
            None
        }
    };
    let has_credentials = credentials.is_some();

    let config = ExchangeConfig::for_venue(&venue);
    let exchange = VenueRegistry::new()
        .create(&venue, credentials, &config)
        .with_context(|| format!("creating {venue} adapter"))?;
    info!("🚀 Smoke testing {} on {}/{}", exchange.name(), trading, settlement);

    let timer = PerfTimer::start("smoke_currency_pairs");
    let pairs = exchange.currency_pairs().await?;
    log_latency!("currency_pairs", timer.elapsed_micros());
    info!("✅ {} pairs listed", pairs.len());

    let rate = exchange.rate(trading, settlement).await?;
    let volume = exchange.volume(trading, settlement).await?;
    info!("✅ rate {} volume {}", rate, volume);

    let precisions = exchange.precise(trading, settlement).await?;
    info!(
        "✅ precision price {} amount {}",
        precisions.price_precision, precisions.amount_precision
    );

    let board = exchange.board(trading, settlement).await?;
    info!(
        "✅ board: {} asks, {} bids, spread {:?}",
        board.asks.len(),
        board.bids.len(),
        board.spread()
    );

    match exchange.frozen_currency().await {
        Ok(frozen) => info!("✅ {} frozen assets", frozen.len()),
        Err(e) => log_error!("frozen currency lookup", e),
    }

    if has_credentials {
        let balances = exchange.complete_balances().await?;
        let funded = balances.values().filter(|b| b.total() > 0.0).count();
        info!("✅ {} assets, {} funded", balances.len(), funded);

        let orders = exchange.active_orders().await?;
        info!("✅ {} open orders", orders.len());
    }

    info!("🎉 {} smoke test passed", venue);
    Ok(())
}
