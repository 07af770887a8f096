//! Recorder configuration
//!
//! Loaded from JSON; every field has a default so partial files work.

use crate::encoder::EncoderOptions;
use crate::recorder::{SessionOptions, DEFAULT_WINDOW_SIZE};
use crate::utils::{AppError, AppResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Frame rate used when none is configured.
///
/// Screencast intervals were observed between roughly 50ms and 800ms;
/// 20fps matches the fastest of them without inflating file size.
pub const DEFAULT_FRAME_RATE: u32 = 20;

/// Top-level recorder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Output frame rate of recordings
    pub frame_rate: u32,

    /// Frames held by the reorder buffer before a window is resolved
    pub window_size: usize,

    /// Ask the capture source for every n-th rendered frame
    pub every_nth_frame: u32,

    /// FFmpeg settings
    pub encoder: EncoderOptions,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            window_size: DEFAULT_WINDOW_SIZE,
            every_nth_frame: 1,
            encoder: EncoderOptions::default(),
        }
    }
}

impl RecorderConfig {
    /// Read and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;

        tracing::debug!("Loaded recorder config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Reject values the recorder cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if self.frame_rate == 0 {
            return Err(AppError::Config("frameRate must be positive".to_string()));
        }
        if self.window_size < 2 {
            return Err(AppError::Config(format!(
                "windowSize must be at least 2, got {}",
                self.window_size
            )));
        }
        if self.every_nth_frame == 0 {
            return Err(AppError::Config("everyNthFrame must be positive".to_string()));
        }
        if self.encoder.ffmpeg_path.trim().is_empty() {
            return Err(AppError::Config("encoder.ffmpegPath is empty".to_string()));
        }
        Ok(())
    }

    /// Options applied to each session
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            window_size: self.window_size,
            every_nth_frame: self.every_nth_frame,
        }
    }
}
