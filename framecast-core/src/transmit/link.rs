//! Link bandwidth tracking for the compression decision.
//!
//! Records bytes sent over a rolling window and derives the throughput in
//! bytes/second. Images are compressed on links at or below the configured
//! bandwidth limit; faster links ship raw pixels, where compression would
//! cost more time than the transfer it saves.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::TransmitConfig;

/// Rolling-window throughput estimate plus the compression policy.
#[derive(Debug)]
pub struct LinkEstimator {
    /// Samples: `(when, bytes)`.
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    /// Bytes currently inside the window.
    total_bytes: u64,
    /// Nominal link speed, when known, in bytes/second.
    link_bandwidth: Option<u64>,
    compression_limit: u64,
}

impl LinkEstimator {
    /// Estimator with a 1-second window.
    pub fn new(config: &TransmitConfig) -> Self {
        Self::with_window(config, Duration::from_secs(1))
    }

    pub fn with_window(config: &TransmitConfig, window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(256),
            window,
            total_bytes: 0,
            link_bandwidth: None,
            compression_limit: config.compression_bandwidth_limit,
        }
    }

    /// Declare the nominal bandwidth of the link, overriding measurements.
    pub fn set_link_bandwidth(&mut self, bytes_per_sec: Option<u64>) {
        self.link_bandwidth = bytes_per_sec;
    }

    /// Record that `bytes` were sent now.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    /// Record with an explicit timestamp.
    pub fn record_at(&mut self, when: Instant, bytes: u64) {
        self.samples.push_back((when, bytes));
        self.total_bytes += bytes;
        self.evict(when);
    }

    /// Measured throughput in bytes/second over the window.
    pub fn estimate_bps(&self) -> u64 {
        let (Some((first, _)), Some((last, _))) = (self.samples.front(), self.samples.back())
        else {
            return 0;
        };
        let elapsed = last.duration_since(*first).max(Duration::from_millis(1));
        (self.total_bytes as f64 / elapsed.as_secs_f64()) as u64
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Whether images should be compressed before sending.
    ///
    /// Uses the nominal bandwidth if set, otherwise the measured one.
    /// Without either, compression is used.
    pub fn use_compression(&self) -> bool {
        let bandwidth = self.link_bandwidth.or_else(|| match self.estimate_bps() {
            0 => None,
            measured => Some(measured),
        });
        match bandwidth {
            Some(bandwidth) => bandwidth <= self.compression_limit,
            None => true,
        }
    }

    // ── Internal ─────────────────────────────────────────────────

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, bytes)) = self.samples.front() {
            if now.duration_since(ts) > self.window {
                self.samples.pop_front();
                self.total_bytes = self.total_bytes.saturating_sub(bytes);
            } else {
                break;
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config(limit: u64) -> TransmitConfig {
        TransmitConfig {
            compression_bandwidth_limit: limit,
            ..TransmitConfig::default()
        }
    }

    #[test]
    fn unknown_link_compresses() {
        let link = LinkEstimator::new(&TransmitConfig::default());
        assert_eq!(link.estimate_bps(), 0);
        assert!(link.use_compression());
    }

    #[test]
    fn measured_rate_over_window() {
        let mut link = LinkEstimator::with_window(&config(1_000_000), Duration::from_secs(5));
        let t0 = Instant::now();
        link.record_at(t0, 1_000_000);
        link.record_at(t0 + Duration::from_secs(1), 1_000_000);
        let bps = link.estimate_bps();
        assert!((1_900_000..=2_100_000).contains(&bps), "bps = {bps}");
        // 2 MB/s is above the 1 MB/s limit.
        assert!(!link.use_compression());
    }

    #[test]
    fn old_samples_leave_the_window() {
        let mut link = LinkEstimator::with_window(&config(0), Duration::from_millis(500));
        let t0 = Instant::now();
        link.record_at(t0, 1000);
        link.record_at(t0 + Duration::from_secs(1), 500);
        assert_eq!(link.sample_count(), 1);
    }

    #[test]
    fn nominal_bandwidth_wins() {
        let mut link = LinkEstimator::new(&TransmitConfig::default());
        // 10 GBit/s
        link.set_link_bandwidth(Some(1_250_000_000));
        assert!(!link.use_compression());
        // 1 GBit/s
        link.set_link_bandwidth(Some(125_000_000));
        assert!(link.use_compression());
    }
}
