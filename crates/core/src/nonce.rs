//! Nonces and client order ids
//!
//! Several venues reject a signed request whose nonce is not larger than
//! the previous one from the same key. Wall-clock time alone is not enough:
//! two requests issued within the same millisecond (or second) would carry
//! the same value, so every signer owns a [`NonceLatch`].

use nanoid::nanoid;
use std::sync::atomic::{AtomicU64, Ordering};

/// Strictly increasing nonce source seeded from a clock reading.
///
/// `next(now)` returns `max(now, last + 1)` and latches the result, so
/// concurrent callers never observe the same value twice even when the
/// clock stalls or steps backwards.
#[derive(Debug, Default)]
pub struct NonceLatch {
    last: AtomicU64,
}

impl NonceLatch {
    pub fn new() -> Self {
        Self { last: AtomicU64::new(0) }
    }

    /// Issue the next nonce for a clock reading in the caller's unit.
    pub fn next(&self, now: u64) -> u64 {
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let nonce = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, nonce, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return nonce,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Last value handed out, zero before the first call.
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

/// Client-side order id for venues that let the caller name the order.
///
/// 32 characters from the URL-safe alphabet, which fits every venue limit
/// that applies here.
pub fn generate_client_order_id() -> String {
    nanoid!(32, &nanoid::alphabet::SAFE)
}
