//! # Unifex Core
//!
//! Runtime-independent building blocks shared by every exchange adapter.
//!
//! ## Contents
//!
//! 1. **Timing** - epoch and ISO-8601 stamps for signers, `PerfTimer`
//! 2. **Fixed-point arithmetic** - exact decimal truncation for order fields
//! 3. **Nonces** - strictly increasing per-signer nonces and client order ids
//! 4. **Unified logging** - ftlog or tracing-subscriber behind one call

pub mod timing;
pub mod fixed;
pub mod logging;
pub mod nonce;

// Re-export commonly used items
pub use timing::{epoch_millis, iso8601_secs, PerfTimer};
pub use fixed::{floor_format, Fixed, FixedError};
pub use logging::init_logging;
pub use nonce::{generate_client_order_id, NonceLatch};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::timing::{epoch_millis, iso8601_secs, PerfTimer};
    pub use crate::fixed::{floor_format, Fixed, FixedError};
    pub use crate::nonce::{generate_client_order_id, NonceLatch};
    pub use crate::logging::init_logging;

    // Common external types
    pub use serde::{Deserialize, Serialize};
}
