//! Bounded concurrent fan-out
//!
//! Runs one request per item with at most `width` in flight. [`fan_out`]
//! collects what succeeds and drops what fails, which suits cache refreshes.
//! [`try_fan_out`] is all-or-nothing and is what order state must use: a
//! market that could not be queried is not a market without orders.

use crate::errors::Result;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};
use unifex_core::log_error;

/// Run `task` for every item, `width` at a time; results arrive in
/// completion order
pub async fn fan_out<T, R, F, Fut>(label: &str, items: Vec<T>, width: usize, mut task: F) -> Vec<R>
where
    T: Display,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let total = items.len();
    let outcomes: Vec<std::result::Result<R, String>> = stream::iter(items.into_iter().map(|item| {
        let name = item.to_string();
        let pending = task(item);
        async move {
            pending.await.map_err(|e| {
                debug!("{} task {} dropped: {}", label, name, e);
                name
            })
        }
    }))
    .buffer_unordered(width.max(1))
    .collect()
    .await;

    let mut results = Vec::with_capacity(total);
    let mut failed = 0usize;
    for outcome in outcomes {
        match outcome {
            Ok(value) => results.push(value),
            Err(_) => failed += 1,
        }
    }

    if failed > 0 {
        warn!("⚠️ {}: {} of {} tasks failed and were dropped", label, failed, total);
    }
    results
}

/// Like [`fan_out`], but the first failed task fails the whole run and no
/// further tasks are started
pub async fn try_fan_out<T, R, F, Fut>(label: &str, items: Vec<T>, width: usize, mut task: F) -> Result<Vec<R>>
where
    T: Display,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    stream::iter(items.into_iter().map(|item| {
        let name = item.to_string();
        let pending = task(item);
        async move {
            pending.await.inspect_err(|e| {
                log_error!(format!("{label} task {name}"), e);
            })
        }
    }))
    .buffer_unordered(width.max(1))
    .try_collect()
    .await
}
