//! Encoder types and configuration
//!
//! This module defines the interfaces between a recording session and the
//! video encoder it feeds: the byte sink frames are written into, the
//! completion signal, and the encoder options.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::oneshot;

/// Encoder errors
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to start encoder: {0}")]
    Spawn(String),

    #[error("Encoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Encoder went away without reporting completion")]
    Abandoned,
}

/// Result type for encoder operations
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Destination for the constant-rate frame stream.
///
/// Every call to [`FrameSink::write_frame`] is one output frame at the
/// nominal frame rate. [`FrameSink::end`] closes the stream; writes after
/// it must fail.
pub trait FrameSink: Send {
    /// Write one output frame
    fn write_frame(&mut self, payload: &[u8]) -> io::Result<()>;

    /// Signal end-of-stream
    fn end(&mut self) -> io::Result<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        (**self).write_frame(payload)
    }

    fn end(&mut self) -> io::Result<()> {
        (**self).end()
    }
}

/// Summary reported by an encoder that finished successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeSummary {
    /// File the encoder wrote
    pub output_path: PathBuf,
}

/// Sender used by encoder implementations to report completion
pub type CompletionNotifier = oneshot::Sender<EncoderResult<EncodeSummary>>;

/// One-shot completion signal of a running encoder
#[derive(Debug)]
pub struct EncoderCompletion {
    rx: oneshot::Receiver<EncoderResult<EncodeSummary>>,
}

impl EncoderCompletion {
    /// Create a linked notifier/completion pair
    pub fn channel() -> (CompletionNotifier, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Wait for the encoder to finish.
    ///
    /// There is no timeout: a hung encoder hangs the caller.
    pub async fn wait(self) -> EncoderResult<EncodeSummary> {
        self.rx.await.unwrap_or(Err(EncoderError::Abandoned))
    }
}

/// A running encoder: the sink to feed and its completion signal
pub struct EncoderHandle {
    pub sink: Box<dyn FrameSink>,
    pub completion: EncoderCompletion,
}

/// Factory for encoder processes, configured once by the caller
pub trait Encoder: Send + Sync {
    /// Start encoding a stream of frames at `frame_rate` into `output`
    fn spawn(&self, output: &Path, frame_rate: u32) -> EncoderResult<EncoderHandle>;
}

/// FFmpeg invocation options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncoderOptions {
    /// FFmpeg executable
    pub ffmpeg_path: String,

    /// Demuxer for the piped frames
    pub input_format: String,

    /// Output video codec
    pub codec: String,

    /// Codec preset (libx264 and friends)
    pub preset: Option<String>,

    /// Output pixel format; yuv420p keeps QuickTime happy
    pub pixel_format: String,

    /// Extra arguments placed before the output path
    pub extra_output_args: Vec<String>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            input_format: "image2pipe".to_string(),
            codec: "libx264".to_string(),
            preset: Some("ultrafast".to_string()),
            pixel_format: "yuv420p".to_string(),
            extra_output_args: Vec::new(),
        }
    }
}
