//! Wall-clock stamps for signed requests and request latency
//!
//! Signers take one epoch-millisecond reading per request and derive the
//! shape each venue wants from it: milliseconds, seconds or an ISO-8601 UTC
//! string at second resolution.

use chrono::DateTime;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since Unix epoch
#[inline]
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// `2017-05-11T15:19:30` for an epoch-millisecond reading; sub-second
/// digits are dropped, never rounded
pub fn iso8601_secs(epoch_ms: u64) -> String {
    let secs = i64::try_from(epoch_ms / 1_000).unwrap_or(i64::MAX);
    DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

/// Latency of one named operation
pub struct PerfTimer {
    start: Instant,
    name: String,
}

impl PerfTimer {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn log_elapsed(&self) {
        let micros = self.elapsed_micros();
        if micros < 1_000 {
            tracing::debug!("⏱️ {} took {}μs", self.name, micros);
        } else {
            tracing::debug!("⏱️ {} took {:.3}ms", self.name, micros as f64 / 1_000.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_iso8601_second_resolution() {
        assert_eq!(iso8601_secs(1_494_515_970_999), "2017-05-11T15:19:30");
        assert_eq!(iso8601_secs(0), "1970-01-01T00:00:00");
    }

    #[test]
    fn test_epoch_millis_is_current() {
        // 2020-01-01T00:00:00Z
        assert!(epoch_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_perf_timer() {
        let timer = PerfTimer::start("sleep");
        thread::sleep(Duration::from_millis(1));
        assert!(timer.elapsed_micros() >= 1_000);
        timer.log_elapsed();
    }
}
