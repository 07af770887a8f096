//! Video encoder module
//!
//! The encoder consumes the constant-rate frame stream produced by the
//! reorder buffer. [`FfmpegEncoder`] is the stock implementation.

pub mod ffmpeg;
pub mod types;

pub use ffmpeg::{FfmpegEncoder, FfmpegSink};
pub use types::{
    CompletionNotifier, EncodeSummary, Encoder, EncoderCompletion, EncoderError, EncoderHandle,
    EncoderOptions, EncoderResult, FrameSink,
};
