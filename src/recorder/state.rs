//! Recording state management
//!
//! Defines the session state machine, per-session frame statistics and
//! the report produced when a session stops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created, not started
    Idle,
    /// Frames are flowing into the buffer
    Capturing,
    /// Capture stopped, buffer and encoder are being finalized
    Stopping,
    /// Finished, successfully or not
    Stopped,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Live frame counters, updated by the arrival handler
#[derive(Debug, Default)]
pub struct FrameStats {
    received: AtomicU64,
    dropped: AtomicU64,
    ack_failures: AtomicU64,
}

impl FrameStats {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ack_failure(&self) {
        self.ack_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Frame events delivered by the capture channel
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Frames dropped because their payload failed to decode
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Acknowledgments rejected by the capture channel
    pub fn ack_failures(&self) -> u64 {
        self.ack_failures.load(Ordering::Relaxed)
    }
}

/// Result of a session that stopped cleanly
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub id: Uuid,

    /// Capture target the session recorded
    pub target: String,

    /// File written by the encoder
    pub output_path: PathBuf,

    pub frame_rate: u32,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub ack_failures: u64,

    /// Output frames handed to the encoder
    pub frames_written: u64,

    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

impl SessionReport {
    /// Length of the produced video in seconds
    pub fn video_duration_secs(&self) -> f64 {
        self.frames_written as f64 / self.frame_rate as f64
    }
}

/// Current wall-clock time in seconds since the Unix epoch, the time base
/// screencast timestamps use
pub fn wall_clock_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
