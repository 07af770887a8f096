//! Screencast Recorder - constant-rate video from irregular screencast frames.
//!
//! Capture sources such as a browser's screencast API deliver still frames
//! at irregular intervals and sometimes out of order. This crate reorders
//! them in a small window, repeats each frame to cover the time until the
//! next one and feeds the result to a video encoder at a fixed frame rate.
//!
//! [`RecordingManager`] runs any number of concurrent recordings, each one a
//! [`RecordingSession`] that owns a [`FrameReorderBuffer`].

pub mod capture;
pub mod config;
pub mod encoder;
pub mod recorder;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{CaptureChannel, CaptureTarget, CapturedFrame, DeliveryContext, ScreencastFrame};
pub use config::RecorderConfig;
pub use encoder::{Encoder, FfmpegEncoder, FrameSink};
pub use recorder::{
    FrameReorderBuffer, RecordingEvent, RecordingManager, RecordingSession, SessionReport,
    SessionState, StopAllReport,
};
pub use utils::{init_tracing, AppError, AppResult};
