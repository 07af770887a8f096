//! Recording system module
//!
//! This module implements the recording pipeline:
//! - FrameReorderBuffer to sort and retime screencast frames
//! - RecordingSession to drive one capture target into one encoder
//! - RecordingManager to run many sessions and stop them together

pub mod buffer;
pub mod manager;
pub mod session;
pub mod state;

pub use buffer::{repeat_count, BufferError, BufferResult, FrameReorderBuffer, DEFAULT_WINDOW_SIZE};
pub use manager::{RecordingEvent, RecordingManager, SessionOutcome, StopAllError, StopAllReport};
pub use session::{RecordingSession, SessionError, SessionOptions, SessionResult};
pub use state::{wall_clock_secs, FrameStats, SessionReport, SessionState};
