//! Per-pair precision registry
//!
//! Filled by one bulk fetch on first demand and kept until the pair listing
//! is refreshed. A pair the venue lists without usable precision fields is
//! reported as [`ExchangeError::PrecisionUnknown`], never as zeros.

use crate::errors::{ExchangeError, Result};
use crate::types::{CurrencyPair, Precisions};
use futures_util::lock::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

pub type PrecisionMap = HashMap<CurrencyPair, Precisions>;

/// Add `pair` when both fields are present and in range. Anything else is
/// left out so that the pair alone reports `PrecisionUnknown`.
pub fn record(map: &mut PrecisionMap, pair: CurrencyPair, price: Option<u32>, amount: Option<u32>) {
    let (Some(price), Some(amount)) = (price, amount) else {
        debug!("📐 {} listed without precision fields", pair);
        return;
    };
    match Precisions::new(price, amount) {
        Ok(precisions) => {
            map.insert(pair, precisions);
        }
        Err(e) => debug!("📐 {} skipped: {}", pair, e),
    }
}

#[derive(Debug, Default)]
pub struct PrecisionRegistry {
    map: Mutex<Option<Arc<PrecisionMap>>>,
}

impl PrecisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Precision for `pair`, loading the whole map with `load` if it has not
    /// been populated yet. A failed load leaves the registry empty.
    pub async fn get_or_load<F, Fut>(&self, pair: &CurrencyPair, load: F) -> Result<Precisions>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PrecisionMap>>,
    {
        if pair.is_identity() {
            return Ok(Precisions::default());
        }

        let map = {
            let mut slot = self.map.lock().await;
            match slot.as_ref() {
                Some(map) => map.clone(),
                None => {
                    let loaded = Arc::new(load().await?);
                    info!("📐 Loaded precision for {} pairs", loaded.len());
                    *slot = Some(loaded.clone());
                    loaded
                }
            }
        };

        map.get(pair)
            .copied()
            .ok_or_else(|| ExchangeError::PrecisionUnknown(pair.to_string()))
    }

    /// Forget the map; the next lookup loads it again
    pub async fn invalidate(&self) {
        *self.map.lock().await = None;
    }

    pub async fn is_loaded(&self) -> bool {
        self.map.lock().await.is_some()
    }
}
