//! FFmpeg encoder
//!
//! Spawns an FFmpeg process that reads concatenated images from stdin at a
//! fixed input rate and writes an encoded video file.

use crate::encoder::types::{
    EncodeSummary, Encoder, EncoderCompletion, EncoderError, EncoderHandle, EncoderOptions,
    EncoderResult, FrameSink,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Encoder backed by an FFmpeg child process
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder {
    options: EncoderOptions,
}

impl FfmpegEncoder {
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Build the FFmpeg argument list for one recording
    pub fn build_args(&self, output: &Path, frame_rate: u32) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-f".to_string(),
            self.options.input_format.clone(),
            "-r".to_string(),
            frame_rate.to_string(),
            "-i".to_string(),
            "-".to_string(), // stdin for frames
            "-c:v".to_string(),
            self.options.codec.clone(),
        ];

        if let Some(ref preset) = self.options.preset {
            args.extend(["-preset".to_string(), preset.clone()]);
        }

        args.extend(["-pix_fmt".to_string(), self.options.pixel_format.clone()]);
        args.extend(self.options.extra_output_args.iter().cloned());
        args.push(output.to_string_lossy().to_string());

        args
    }
}

impl Encoder for FfmpegEncoder {
    fn spawn(&self, output: &Path, frame_rate: u32) -> EncoderResult<EncoderHandle> {
        let args = self.build_args(output, frame_rate);

        tracing::info!("Starting FFmpeg encoder: {:?}", args);

        let mut process = Command::new(&self.options.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EncoderError::Spawn(format!("{}: {}", self.options.ffmpeg_path, e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EncoderError::Spawn("Failed to capture FFmpeg stdin".to_string()))?;

        let (notifier, completion) = EncoderCompletion::channel();
        let output_path = output.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let result = wait_for_exit(process, output_path);
            let _ = notifier.send(result);
        });

        Ok(EncoderHandle {
            sink: Box::new(FfmpegSink::new(stdin)),
            completion,
        })
    }
}

/// Wait for FFmpeg to exit and translate its status
fn wait_for_exit(process: Child, output_path: PathBuf) -> EncoderResult<EncodeSummary> {
    let output = process.wait_with_output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!("FFmpeg exited with status {}: {}", output.status, stderr);
        return Err(EncoderError::Failed {
            status: output.status.to_string(),
            stderr: tail(&stderr, 20),
        });
    }

    tracing::info!("FFmpeg finished, output: {}", output_path.display());
    Ok(EncodeSummary { output_path })
}

/// Last `lines` lines of FFmpeg's log, where the actual error usually is
fn tail(log: &str, lines: usize) -> String {
    let all: Vec<&str> = log.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Frame sink writing into FFmpeg's stdin
pub struct FfmpegSink {
    stdin: Option<ChildStdin>,
    frame_count: u64,
}

impl FfmpegSink {
    fn new(stdin: ChildStdin) -> Self {
        Self {
            stdin: Some(stdin),
            frame_count: 0,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "FFmpeg input already closed"))?;
        stdin.write_all(payload)?;
        self.frame_count += 1;
        Ok(())
    }

    fn end(&mut self) -> io::Result<()> {
        // Dropping stdin is what tells FFmpeg the input is over
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        tracing::debug!("FFmpeg input closed after {} frames", self.frame_count);
        Ok(())
    }
}
