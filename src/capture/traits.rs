//! Capture trait definitions
//!
//! Transport-agnostic interfaces for screencast capture sources. A target
//! (browser tab, window, remote page) opens a channel; the channel delivers
//! one [`ScreencastFrame`] per captured frame and expects every frame to be
//! acknowledged before it produces the next one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised by capture sources
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to decode frame payload: {0}")]
    Decode(String),

    #[error("Acknowledgment failed: {0}")]
    Acknowledgment(String),

    #[error("Capture channel error: {0}")]
    Channel(String),

    #[error("Capture channel closed")]
    Closed,
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Opaque per-frame delivery context, echoed back in the acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryContext(pub u64);

/// A frame event as delivered by the capture transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreencastFrame {
    /// Transport-encoded (base64) image data
    pub data: String,

    /// Capture time in seconds since the Unix epoch
    pub timestamp: f64,

    /// Context to acknowledge
    pub context: DeliveryContext,
}

/// A decoded frame ready for the reorder buffer
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    /// Capture time in seconds since the Unix epoch
    pub timestamp: f64,

    /// Raw image bytes
    pub payload: Vec<u8>,
}

impl CapturedFrame {
    pub fn new(timestamp: f64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            timestamp,
            payload: payload.into(),
        }
    }
}

/// Sender half handed to a channel when capture starts
pub type FrameEvents = mpsc::Sender<ScreencastFrame>;

/// Something that can be recorded
#[async_trait]
pub trait CaptureTarget: Send + Sync {
    /// Identifier used in logs and reports
    fn id(&self) -> &str;

    /// Open a new capture channel on this target
    async fn open_channel(&self) -> CaptureResult<Arc<dyn CaptureChannel>>;
}

/// An open capture channel
///
/// After [`CaptureChannel::detach`] returns the channel must not send further
/// events and should drop its [`FrameEvents`] sender.
#[async_trait]
pub trait CaptureChannel: Send + Sync {
    /// Begin producing frames, sending one event per captured frame
    async fn start_capture(&self, every_nth_frame: u32, events: FrameEvents) -> CaptureResult<()>;

    /// Acknowledge a delivered frame so the next one can be produced
    async fn ack(&self, context: DeliveryContext) -> CaptureResult<()>;

    /// Stop producing frames
    async fn stop_capture(&self) -> CaptureResult<()>;

    /// Release the channel
    async fn detach(&self) -> CaptureResult<()>;
}
