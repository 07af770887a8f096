//! Recording session
//!
//! Binds one capture target to one encoder through a [`FrameReorderBuffer`].
//!
//! While capturing, the buffer is owned by a single arrival task that
//! acknowledges, decodes and pushes every frame event in delivery order.
//! Stopping signals that task, lets it drain the events already delivered
//! and takes the buffer back, so finalizing never races a late push.

use super::buffer::{BufferError, FrameReorderBuffer, DEFAULT_WINDOW_SIZE};
use super::state::{wall_clock_secs, FrameStats, SessionReport, SessionState};
use crate::capture::{decode_frame, CaptureChannel, CaptureError, CaptureTarget, ScreencastFrame};
use crate::encoder::{Encoder, EncoderCompletion, EncoderError, FrameSink};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Frame events queued between the capture channel and the arrival task
pub const FRAME_QUEUE_CAPACITY: usize = 64;

/// Errors that can occur while running a session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot {operation} a session that is {state:?}")]
    Lifecycle {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Arrival handler failed: {0}")]
    Handler(String),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

type SessionBuffer = FrameReorderBuffer<Box<dyn FrameSink>>;

/// Per-session tuning that is not part of `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub window_size: usize,
    pub every_nth_frame: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            every_nth_frame: 1,
        }
    }
}

/// Resources held while a session is capturing
struct ActiveCapture {
    target: String,
    output_path: PathBuf,
    frame_rate: u32,
    channel: Arc<dyn CaptureChannel>,
    completion: EncoderCompletion,
    shutdown_tx: oneshot::Sender<()>,
    handler: JoinHandle<SessionBuffer>,
    started_at: DateTime<Utc>,
}

/// One recording of one capture target
pub struct RecordingSession {
    id: Uuid,
    options: SessionOptions,
    encoder: Arc<dyn Encoder>,
    state: Arc<RwLock<SessionState>>,
    stats: Arc<FrameStats>,
    active: Option<ActiveCapture>,
}

impl RecordingSession {
    /// Create an idle session that will encode with `encoder`
    pub fn new(encoder: Arc<dyn Encoder>, options: SessionOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            options,
            encoder,
            state: Arc::new(RwLock::new(SessionState::Idle)),
            stats: Arc::new(FrameStats::default()),
            active: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Live frame counters
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    /// Start recording `target` into `output` at `frame_rate`.
    ///
    /// Only valid on an idle session. On failure everything opened so far
    /// is released and the session stays idle.
    pub async fn start(
        &mut self,
        target: &dyn CaptureTarget,
        output: &Path,
        frame_rate: u32,
    ) -> SessionResult<()> {
        let current_state = self.state();
        if current_state != SessionState::Idle {
            return Err(SessionError::Lifecycle {
                operation: "start",
                state: current_state,
            });
        }

        tracing::info!(
            "Session {}: starting capture of {} into {} at {}fps",
            self.id,
            target.id(),
            output.display(),
            frame_rate
        );

        let channel = target.open_channel().await?;

        let encoder = match self.encoder.spawn(output, frame_rate) {
            Ok(encoder) => encoder,
            Err(e) => {
                release_channel(self.id, channel.as_ref()).await;
                return Err(e.into());
            }
        };

        let buffer = match FrameReorderBuffer::new(encoder.sink, frame_rate, self.options.window_size) {
            Ok(buffer) => buffer,
            Err(e) => {
                release_channel(self.id, channel.as_ref()).await;
                return Err(e.into());
            }
        };

        let (events_tx, events_rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handler = tokio::spawn(run_arrival_handler(
            self.id,
            channel.clone(),
            events_rx,
            shutdown_rx,
            buffer,
            self.stats.clone(),
        ));

        if let Err(e) = channel.start_capture(self.options.every_nth_frame, events_tx).await {
            tracing::error!("Session {}: failed to start capture: {}", self.id, e);
            let _ = shutdown_tx.send(());
            // Dropping the buffer closes the encoder input
            let _ = handler.await;
            release_channel(self.id, channel.as_ref()).await;
            return Err(e.into());
        }

        self.active = Some(ActiveCapture {
            target: target.id().to_string(),
            output_path: output.to_path_buf(),
            frame_rate,
            channel,
            completion: encoder.completion,
            shutdown_tx,
            handler,
            started_at: Utc::now(),
        });
        self.set_state(SessionState::Capturing);

        tracing::info!("Session {}: capturing", self.id);
        Ok(())
    }

    /// Stop recording, timing the last frame against the current wall clock
    pub async fn stop(&mut self) -> SessionResult<SessionReport> {
        let stop_timestamp = wall_clock_secs();
        self.stop_at(stop_timestamp).await
    }

    /// Stop recording with an explicit stop timestamp.
    ///
    /// Capture is stopped and detached, frames already delivered are
    /// drained into the buffer, the buffer is finalized and the encoder
    /// awaited. The session ends up stopped even if any step fails; the
    /// most significant failure is returned, encoder failures first.
    pub async fn stop_at(&mut self, stop_timestamp: f64) -> SessionResult<SessionReport> {
        let current_state = self.state();
        let active = match self.active.take() {
            Some(active) if current_state == SessionState::Capturing => active,
            other => {
                self.active = other;
                return Err(SessionError::Lifecycle {
                    operation: "stop",
                    state: current_state,
                });
            }
        };

        self.set_state(SessionState::Stopping);
        tracing::info!("Session {}: stopping", self.id);

        let capture_result = shutdown_capture(active.channel.as_ref()).await;
        if let Err(ref e) = capture_result {
            tracing::warn!("Session {}: capture shutdown failed: {}", self.id, e);
        }

        let _ = active.shutdown_tx.send(());
        let (handler_result, buffer_result, frames_written) = match active.handler.await {
            Ok(mut buffer) => {
                let finalized = buffer.finalize(stop_timestamp);
                if let Err(ref e) = finalized {
                    tracing::error!("Session {}: failed to finalize buffer: {}", self.id, e);
                }
                (Ok(()), finalized.map(|_| ()), buffer.frames_written())
            }
            Err(e) => {
                tracing::error!("Session {}: arrival handler failed: {}", self.id, e);
                (Err(SessionError::Handler(e.to_string())), Ok(()), 0)
            }
        };

        let encoder_result = active.completion.wait().await;
        self.set_state(SessionState::Stopped);

        if let Err(e) = encoder_result {
            tracing::error!("Session {}: encoder failed, output is invalid: {}", self.id, e);
            return Err(e.into());
        }
        handler_result?;
        buffer_result?;
        capture_result?;

        let report = SessionReport {
            id: self.id,
            target: active.target,
            output_path: active.output_path,
            frame_rate: active.frame_rate,
            frames_received: self.stats.received(),
            frames_dropped: self.stats.dropped(),
            ack_failures: self.stats.ack_failures(),
            frames_written,
            started_at: active.started_at,
            stopped_at: Utc::now(),
        };

        tracing::info!(
            "Session {}: stopped, {} frames received, {} written ({:.2}s of video)",
            self.id,
            report.frames_received,
            report.frames_written,
            report.video_duration_secs()
        );
        Ok(report)
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::warn!(
                "Session {} dropped while capturing; output {} will be incomplete",
                self.id,
                active.output_path.display()
            );
            let _ = active.shutdown_tx.send(());
        }
    }
}

async fn shutdown_capture(channel: &dyn CaptureChannel) -> Result<(), CaptureError> {
    let stopped = channel.stop_capture().await;
    let detached = channel.detach().await;
    stopped.and(detached)
}

async fn release_channel(session_id: Uuid, channel: &dyn CaptureChannel) {
    if let Err(e) = channel.detach().await {
        tracing::warn!("Session {}: failed to detach capture channel: {}", session_id, e);
    }
}

/// Single writer of the session's buffer
async fn run_arrival_handler(
    session_id: Uuid,
    channel: Arc<dyn CaptureChannel>,
    mut events: mpsc::Receiver<ScreencastFrame>,
    mut shutdown: oneshot::Receiver<()>,
    mut buffer: SessionBuffer,
    stats: Arc<FrameStats>,
) -> SessionBuffer {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    handle_arrival(session_id, Some(channel.as_ref()), &mut buffer, &stats, event).await;
                }
                None => {
                    tracing::debug!("Session {}: capture channel closed", session_id);
                    break;
                }
            },
            _ = &mut shutdown => {
                // Capture is already stopped; no point acknowledging these
                while let Ok(event) = events.try_recv() {
                    handle_arrival(session_id, None, &mut buffer, &stats, event).await;
                }
                break;
            }
        }
    }

    buffer
}

async fn handle_arrival(
    session_id: Uuid,
    ack_channel: Option<&dyn CaptureChannel>,
    buffer: &mut SessionBuffer,
    stats: &FrameStats,
    event: ScreencastFrame,
) {
    // The source produces nothing more until this frame is acknowledged
    if let Some(channel) = ack_channel {
        if let Err(e) = channel.ack(event.context).await {
            stats.record_ack_failure();
            tracing::warn!(
                "Session {}: acknowledgment of {:?} failed: {}",
                session_id,
                event.context,
                e
            );
        }
    }
    stats.record_received();

    let frame = match decode_frame(&event) {
        Ok(frame) => frame,
        Err(e) => {
            stats.record_dropped();
            tracing::warn!("Session {}: dropping frame at {}: {}", session_id, event.timestamp, e);
            return;
        }
    };

    if let Err(e) = buffer.push(frame) {
        tracing::error!("Session {}: failed to buffer frame: {}", session_id, e);
    }
}
