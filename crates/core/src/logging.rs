//! Unified logging integration
//!
//! Library code only emits `tracing` events. Binaries and tests call
//! [`init_logging`] once to install a backend. With the `ftlog` feature
//! (default) events travel through tracing's `log` bridge into ftlog, whose
//! guard lives for the rest of the process. Without it a tracing-subscriber
//! formatter is installed, filtered by `RUST_LOG` (default `info`).

use std::sync::Once;
#[cfg(not(feature = "ftlog"))]
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Flushes and stops the ftlog worker when dropped
#[cfg(feature = "ftlog")]
static FTLOG_GUARD: std::sync::Mutex<Option<ftlog::LoggerGuard>> = std::sync::Mutex::new(None);

/// Install the logging backend. Safe to call more than once.
pub fn init_logging() {
    INIT.call_once(|| {
        #[cfg(feature = "ftlog")]
        init_ftlog();

        #[cfg(not(feature = "ftlog"))]
        init_tracing();
    });
}

#[cfg(feature = "ftlog")]
fn init_ftlog() {
    let built = ftlog::builder()
        .max_log_level(ftlog::LevelFilter::Debug)
        .bounded(100_000, false)
        .utc()
        .try_init();

    match built {
        Ok(guard) => {
            if let Ok(mut slot) = FTLOG_GUARD.lock() {
                *slot = Some(guard);
            }
            tracing::info!("📝 ftlog backend installed");
        }
        Err(e) => eprintln!("ftlog init failed: {e}"),
    }
}

#[cfg(not(feature = "ftlog"))]
fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        tracing::info!("📝 tracing formatter installed");
    }
}

/// Log a latency sample, promoting slow calls to `info`
#[macro_export]
macro_rules! log_latency {
    ($operation:expr, $duration_micros:expr) => {
        if $duration_micros < 1000 {
            tracing::debug!("⚡ {} completed in {}μs", $operation, $duration_micros);
        } else {
            tracing::info!("⚡ {} completed in {:.3}ms", $operation, $duration_micros as f64 / 1000.0);
        }
    };
}

#[macro_export]
macro_rules! log_order {
    ($action:expr, $order_id:expr, $symbol:expr) => {
        tracing::info!("📋 ORDER {}: {} ({})", $action, $order_id, $symbol);
    };
}

#[macro_export]
macro_rules! log_error {
    ($operation:expr, $error:expr) => {
        tracing::error!("❌ {} failed: {}", $operation, $error);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_init() {
        init_logging();
        init_logging();
    }

    #[cfg(not(feature = "ftlog"))]
    #[test]
    fn test_env_filter_alone_sets_the_level() {
        init_logging();
        if std::env::var("RUST_LOG").is_err() {
            assert!(tracing::enabled!(tracing::Level::INFO));
            assert!(!tracing::enabled!(tracing::Level::DEBUG));
        }
    }

    #[cfg(feature = "ftlog")]
    #[test]
    fn test_ftlog_receives_tracing_events() {
        init_logging();
        assert!(FTLOG_GUARD.lock().map(|guard| guard.is_some()).unwrap_or(false));
        // records only flow while the log facade admits them
        assert!(tracing::log::max_level() >= tracing::log::LevelFilter::Info);
    }

    #[test]
    fn test_log_macros() {
        init_logging();

        log_latency!("test_operation", 500);
        log_latency!("slow_operation", 1500);
        log_order!("PLACED", "12345", "ETH/BTC");
        log_error!("order_placement", "insufficient balance");
    }
}
