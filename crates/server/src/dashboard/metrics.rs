//! Lock-free server counters.
//!
//! Session tasks update these via atomic operations: no locks, no
//! allocations, no blocking on the send path. The dashboard reads them at its
//! own pace.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Monotonic counters
    connections_accepted: AtomicU64,
    logins: AtomicU64,
    kicks: AtomicU64,
    packets_in: AtomicU64,
    packets_out: AtomicU64,
    bytes_out: AtomicU64,
    slow_peers_dropped: AtomicU64,
    level_transfers: AtomicU64,
    transfer_bytes_sum: AtomicU64,
    transfer_ns_sum: AtomicU64,

    // Level transfer duration histogram
    hist_under_1ms: AtomicU64,
    hist_1_10ms: AtomicU64,
    hist_10_100ms: AtomicU64,
    hist_100ms_1s: AtomicU64,
    hist_over_1s: AtomicU64,

    // Gauges
    players_online: AtomicU64,

    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_accepted: AtomicU64::new(0),
            logins: AtomicU64::new(0),
            kicks: AtomicU64::new(0),
            packets_in: AtomicU64::new(0),
            packets_out: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            slow_peers_dropped: AtomicU64::new(0),
            level_transfers: AtomicU64::new(0),
            transfer_bytes_sum: AtomicU64::new(0),
            transfer_ns_sum: AtomicU64::new(0),
            hist_under_1ms: AtomicU64::new(0),
            hist_1_10ms: AtomicU64::new(0),
            hist_10_100ms: AtomicU64::new(0),
            hist_100ms_1s: AtomicU64::new(0),
            hist_over_1s: AtomicU64::new(0),
            players_online: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Relaxed);
    }

    pub fn packet_received(&self) {
        self.packets_in.fetch_add(1, Relaxed);
    }

    pub fn packet_sent(&self, bytes: usize) {
        self.packets_out.fetch_add(1, Relaxed);
        self.bytes_out.fetch_add(bytes as u64, Relaxed);
    }

    pub fn kicked(&self) {
        self.kicks.fetch_add(1, Relaxed);
    }

    pub fn slow_peer_dropped(&self) {
        self.slow_peers_dropped.fetch_add(1, Relaxed);
    }

    /// Called once per completed level transfer with the compressed size.
    pub fn record_transfer(&self, compressed_bytes: usize, duration: Duration) {
        self.level_transfers.fetch_add(1, Relaxed);
        self.transfer_bytes_sum
            .fetch_add(compressed_bytes as u64, Relaxed);
        self.transfer_ns_sum
            .fetch_add(duration.as_nanos() as u64, Relaxed);

        let ms = duration.as_millis() as u64;
        match ms {
            0 => {
                self.hist_under_1ms.fetch_add(1, Relaxed);
            }
            1..=9 => {
                self.hist_1_10ms.fetch_add(1, Relaxed);
            }
            10..=99 => {
                self.hist_10_100ms.fetch_add(1, Relaxed);
            }
            100..=999 => {
                self.hist_100ms_1s.fetch_add(1, Relaxed);
            }
            _ => {
                self.hist_over_1s.fetch_add(1, Relaxed);
            }
        }
    }

    pub fn player_joined(&self) {
        self.logins.fetch_add(1, Relaxed);
        self.players_online.fetch_add(1, Relaxed);
    }

    pub fn player_left(&self) {
        self.players_online.fetch_sub(1, Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            connections_total: self.connections_accepted.load(Relaxed),
            logins_total: self.logins.load(Relaxed),
            kicks_total: self.kicks.load(Relaxed),
            packets_in: self.packets_in.load(Relaxed),
            packets_out: self.packets_out.load(Relaxed),
            bytes_out: self.bytes_out.load(Relaxed),
            slow_peers_dropped: self.slow_peers_dropped.load(Relaxed),
            level_transfers: self.level_transfers.load(Relaxed),
            transfer_bytes_sum: self.transfer_bytes_sum.load(Relaxed),
            transfer_ns_sum: self.transfer_ns_sum.load(Relaxed),
            players: self.players_online.load(Relaxed),
            hist: [
                self.hist_under_1ms.load(Relaxed),
                self.hist_1_10ms.load(Relaxed),
                self.hist_10_100ms.load(Relaxed),
                self.hist_100ms_1s.load(Relaxed),
                self.hist_over_1s.load(Relaxed),
            ],
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of every counter. Rates are left to the consumer.
#[derive(Clone, Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    pub connections_total: u64,
    pub logins_total: u64,
    pub kicks_total: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub bytes_out: u64,
    pub slow_peers_dropped: u64,
    pub level_transfers: u64,
    pub transfer_bytes_sum: u64,
    pub transfer_ns_sum: u64,
    pub players: u64,
    /// `[<1ms, 1-10ms, 10-100ms, 100ms-1s, >1s]`
    pub hist: [u64; 5],
}
