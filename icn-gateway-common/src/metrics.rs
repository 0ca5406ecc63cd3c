//! Metrics collection and reporting for the gateway.
//!
//! Counters are updated from the bridge's source tasks and dispatcher, so
//! every metric is a relaxed atomic and [`GatewayMetrics`] is shared as an
//! `Arc`.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for the gateway
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct GatewayMetrics {
    // Mesh side
    pub frames_received: Counter,
    pub frames_malformed: Counter,
    pub frames_ignored: Counter,

    // ICN publication
    pub data_published: Counter,
    pub publish_failures: Counter,

    // Interest forwarding
    pub interests_received: Counter,
    /// Interest frames successfully written to a next hop
    pub interests_forwarded: Counter,
    pub interests_unrouted: Counter,
    pub forward_failures: Counter,

    // FIB
    pub fib_size: Gauge,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of every metric.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.value(),
            frames_malformed: self.frames_malformed.value(),
            frames_ignored: self.frames_ignored.value(),
            data_published: self.data_published.value(),
            publish_failures: self.publish_failures.value(),
            interests_received: self.interests_received.value(),
            interests_forwarded: self.interests_forwarded.value(),
            interests_unrouted: self.interests_unrouted.value(),
            forward_failures: self.forward_failures.value(),
            fib_size: self.fib_size.value(),
        }
    }
}

/// Plain copy of [`GatewayMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_malformed: u64,
    pub frames_ignored: u64,
    pub data_published: u64,
    pub publish_failures: u64,
    pub interests_received: u64,
    pub interests_forwarded: u64,
    pub interests_unrouted: u64,
    pub forward_failures: u64,
    pub fib_size: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} (malformed={}, ignored={}) published={} (failed={}) \
             interests={} (forwarded={}, unrouted={}, failed={}) fib_size={}",
            self.frames_received,
            self.frames_malformed,
            self.frames_ignored,
            self.data_published,
            self.publish_failures,
            self.interests_received,
            self.interests_forwarded,
            self.interests_unrouted,
            self.forward_failures,
            self.fib_size
        )
    }
}
