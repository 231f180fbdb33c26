//! Transport Metrics
//!
//! Lock-free counters shared by every handle of one transport endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter set for one transport endpoint
#[derive(Debug, Clone, Default)]
pub struct MetricsTracker {
    frames_sent: Arc<AtomicU64>,
    sequence_frames_sent: Arc<AtomicU64>,
    frames_received: Arc<AtomicU64>,
    probes: Arc<AtomicU64>,
    bytes_sent: Arc<AtomicU64>,
    bytes_received: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Frames handed to the transport, single and sequence
    pub frames_sent: u64,
    /// Subset of `frames_sent` that carried a sequence
    pub sequence_frames_sent: u64,
    /// Frames taken out of the transport by `recv`
    pub frames_received: u64,
    /// Completed probes
    pub probes: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub errors: u64,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_send(&self, bytes: usize, sequence: bool) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        if sequence {
            self.sequence_frames_sent.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_receive(&self, bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_probe(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransportStats {
        TransportStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            sequence_frames_sent: self.sequence_frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl TransportStats {
    /// Average payload size over all frames seen in either direction
    pub fn average_frame_size(&self) -> Option<f64> {
        let frames = self.frames_sent + self.frames_received;
        if frames == 0 {
            return None;
        }
        Some((self.bytes_sent + self.bytes_received) as f64 / frames as f64)
    }
}
