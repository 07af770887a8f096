//! Frame reorder buffer
//!
//! Screencast frames arrive at irregular intervals and occasionally out of
//! order. The buffer holds a small window of frames, sorts it by capture
//! time, and converts the gap between consecutive frames into a number of
//! repeated writes so that the stream, played back at the target frame
//! rate, keeps the original timing.

use crate::capture::CapturedFrame;
use crate::encoder::FrameSink;
use thiserror::Error;

/// Number of frames held before a window is resolved.
///
/// Observed reordering stays within about ten frames; larger windows only
/// keep more undisplayed images in memory.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Buffer errors
#[derive(Error, Debug)]
pub enum BufferError {
    #[error("Buffer already finalized")]
    Finalized,

    #[error("Invalid buffer configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame sink error: {0}")]
    Sink(#[from] std::io::Error),
}

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Number of output frames covering `duration` seconds at `frame_rate`.
///
/// Never less than one, so reordered or clock-skewed frames still advance
/// the stream.
pub fn repeat_count(duration: f64, frame_rate: f64) -> u64 {
    (duration * frame_rate).round().max(1.0) as u64
}

/// Windowed sort and rate adaptation in front of a [`FrameSink`]
pub struct FrameReorderBuffer<S: FrameSink> {
    pending: Vec<CapturedFrame>,
    sink: S,
    frame_rate: u32,
    window_size: usize,
    frames_written: u64,
    finalized: bool,
}

impl<S: FrameSink> FrameReorderBuffer<S> {
    /// Create a buffer feeding `sink` at `frame_rate` frames per second
    pub fn new(sink: S, frame_rate: u32, window_size: usize) -> BufferResult<Self> {
        if frame_rate == 0 {
            return Err(BufferError::InvalidConfig("frame rate must be positive".to_string()));
        }
        if window_size < 2 {
            return Err(BufferError::InvalidConfig(format!(
                "window size must be at least 2, got {}",
                window_size
            )));
        }

        Ok(Self {
            pending: Vec::with_capacity(window_size),
            sink,
            frame_rate,
            window_size,
            frames_written: 0,
            finalized: false,
        })
    }

    /// Add a frame, resolving the window once it is full.
    ///
    /// Returns the number of frames written to the sink.
    pub fn push(&mut self, frame: CapturedFrame) -> BufferResult<u64> {
        self.ensure_open()?;
        self.pending.push(frame);
        self.flush()
    }

    /// Resolve the pending window if it is full.
    ///
    /// Below the window size this writes nothing; the final partial window
    /// is resolved by [`FrameReorderBuffer::finalize`].
    pub fn flush(&mut self) -> BufferResult<u64> {
        self.ensure_open()?;
        if self.pending.len() < self.window_size {
            return Ok(0);
        }
        self.resolve_pending()
    }

    /// Resolve everything still pending, timing the last frame against
    /// `stop_timestamp`, then end the stream.
    pub fn finalize(&mut self, stop_timestamp: f64) -> BufferResult<u64> {
        self.ensure_open()?;
        self.finalized = true;

        let written = self.drain(stop_timestamp);
        let ended = self.sink.end();

        let written = written?;
        ended?;

        tracing::debug!(
            "Buffer finalized: {} frames written in total",
            self.frames_written
        );
        Ok(written)
    }

    fn drain(&mut self, stop_timestamp: f64) -> BufferResult<u64> {
        let mut written = self.resolve_pending()?;

        if let Some(last) = self.pending.pop() {
            written += self.write_frame(&last, stop_timestamp - last.timestamp)?;
        }

        Ok(written)
    }

    /// Sort the pending frames and write all but the last one, which has
    /// no known successor yet and stays pending.
    fn resolve_pending(&mut self) -> BufferResult<u64> {
        if self.pending.len() < 2 {
            return Ok(0);
        }

        // Stable, so frames with equal timestamps keep their arrival order
        self.pending.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let range = self.pending.len() - 1;
        let resolved: Vec<CapturedFrame> = self.pending.drain(..range).collect();

        let mut written = 0;
        for (i, frame) in resolved.iter().enumerate() {
            let next_timestamp = resolved
                .get(i + 1)
                .map(|f| f.timestamp)
                .unwrap_or(self.pending[0].timestamp);
            written += self.write_frame(frame, next_timestamp - frame.timestamp)?;
        }

        tracing::debug!("Resolved window of {} frames into {} writes", range, written);
        Ok(written)
    }

    fn write_frame(&mut self, frame: &CapturedFrame, duration: f64) -> BufferResult<u64> {
        let count = repeat_count(duration, self.frame_rate as f64);
        for _ in 0..count {
            self.sink.write_frame(&frame.payload)?;
            self.frames_written += 1;
        }
        Ok(count)
    }

    fn ensure_open(&self) -> BufferResult<()> {
        if self.finalized {
            return Err(BufferError::Finalized);
        }
        Ok(())
    }

    /// Frames waiting for their successor
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Total writes issued to the sink
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
