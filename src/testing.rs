//! In-memory capture sources and encoders for tests

use crate::capture::{
    CaptureChannel, CaptureError, CaptureResult, CaptureTarget, DeliveryContext, FrameEvents,
    ScreencastFrame,
};
use crate::encoder::{
    CompletionNotifier, EncodeSummary, Encoder, EncoderCompletion, EncoderError, EncoderHandle,
    EncoderResult, FrameSink,
};
use crate::recorder::RecordingSession;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Build a screencast event carrying `payload` as base64
pub fn encoded_event(timestamp: f64, payload: &[u8], context: u64) -> ScreencastFrame {
    ScreencastFrame {
        data: BASE64_STANDARD.encode(payload),
        timestamp,
        context: DeliveryContext(context),
    }
}

/// Wait until the session's arrival handler has processed `count` frames
pub async fn wait_for_frames(session: &RecordingSession, count: u64) {
    for _ in 0..400 {
        if session.stats().received() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "timed out waiting for {} frames, got {}",
        count,
        session.stats().received()
    );
}

#[derive(Default)]
struct SinkLog {
    writes: Vec<Vec<u8>>,
    ended: bool,
    dropped: bool,
    fail_writes: bool,
}

/// Frame sink recording every write; clones share the same log
#[derive(Clone, Default)]
pub struct MemorySink {
    log: Arc<Mutex<SinkLog>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.log.lock().writes.clone()
    }

    pub fn is_ended(&self) -> bool {
        self.log.lock().ended
    }

    /// Whether the encoder-side handle was dropped
    pub fn is_dropped(&self) -> bool {
        self.log.lock().dropped
    }

    pub fn fail_writes(&self) {
        self.log.lock().fail_writes = true;
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        let mut log = self.log.lock();
        if log.ended || log.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        log.writes.push(payload.to_vec());
        Ok(())
    }

    fn end(&mut self) -> io::Result<()> {
        self.log.lock().ended = true;
        Ok(())
    }
}

/// Sink handed out by [`MockEncoder`]; ending it completes the encoder
struct MockEncoderSink {
    log: MemorySink,
    notifier: Option<CompletionNotifier>,
    failure: Option<String>,
    output_path: PathBuf,
}

impl FrameSink for MockEncoderSink {
    fn write_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        self.log.write_frame(payload)
    }

    fn end(&mut self) -> io::Result<()> {
        self.log.end()?;
        if let Some(notifier) = self.notifier.take() {
            let result = match self.failure {
                Some(ref stderr) => Err(EncoderError::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: stderr.clone(),
                }),
                None => Ok(EncodeSummary {
                    output_path: self.output_path.clone(),
                }),
            };
            let _ = notifier.send(result);
        }
        Ok(())
    }
}

impl Drop for MockEncoderSink {
    fn drop(&mut self) {
        self.log.log.lock().dropped = true;
    }
}

/// Encoder that keeps frames in memory
pub struct MockEncoder {
    failure: Option<String>,
    sinks: Mutex<Vec<MemorySink>>,
}

impl MockEncoder {
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            sinks: Mutex::new(Vec::new()),
        }
    }

    /// Encoder that reports failure once its input ends
    pub fn failing(stderr: &str) -> Self {
        Self {
            failure: Some(stderr.to_string()),
            sinks: Mutex::new(Vec::new()),
        }
    }

    pub fn spawned(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn sink(&self, index: usize) -> MemorySink {
        self.sinks.lock()[index].clone()
    }
}

impl Encoder for MockEncoder {
    fn spawn(&self, output: &Path, _frame_rate: u32) -> EncoderResult<EncoderHandle> {
        let log = MemorySink::new();
        self.sinks.lock().push(log.clone());

        let (notifier, completion) = EncoderCompletion::channel();
        Ok(EncoderHandle {
            sink: Box::new(MockEncoderSink {
                log,
                notifier: Some(notifier),
                failure: self.failure.clone(),
                output_path: output.to_path_buf(),
            }),
            completion,
        })
    }
}

/// Scripted capture channel
#[derive(Default)]
pub struct MockChannel {
    frames: Mutex<Vec<ScreencastFrame>>,
    sender: Mutex<Option<FrameEvents>>,
    acks: Mutex<Vec<DeliveryContext>>,
    started_with: Mutex<Option<u32>>,
    fail_acks: AtomicBool,
    fail_start: AtomicBool,
    stopped: AtomicBool,
    detached: AtomicBool,
}

impl MockChannel {
    pub fn acks(&self) -> Vec<DeliveryContext> {
        self.acks.lock().clone()
    }

    /// `every_nth_frame` passed to `start_capture`, if it was called
    pub fn started_with(&self) -> Option<u32> {
        *self.started_with.lock()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureChannel for MockChannel {
    async fn start_capture(&self, every_nth_frame: u32, events: FrameEvents) -> CaptureResult<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(CaptureError::Channel("screencast refused".to_string()));
        }
        *self.started_with.lock() = Some(every_nth_frame);

        // Queue the whole script up front so tests are deterministic
        for frame in self.frames.lock().drain(..) {
            events
                .try_send(frame)
                .map_err(|e| CaptureError::Channel(e.to_string()))?;
        }
        *self.sender.lock() = Some(events);
        Ok(())
    }

    async fn ack(&self, context: DeliveryContext) -> CaptureResult<()> {
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(CaptureError::Acknowledgment(format!("unknown frame {:?}", context)));
        }
        self.acks.lock().push(context);
        Ok(())
    }

    async fn stop_capture(&self) -> CaptureResult<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn detach(&self) -> CaptureResult<()> {
        self.detached.store(true, Ordering::SeqCst);
        self.sender.lock().take();
        Ok(())
    }
}

/// Capture target backed by a [`MockChannel`]
pub struct MockCaptureTarget {
    id: String,
    channel: Arc<MockChannel>,
    fail_open: bool,
}

impl MockCaptureTarget {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            channel: Arc::new(MockChannel::default()),
            fail_open: false,
        }
    }

    pub fn with_frames(self, frames: Vec<ScreencastFrame>) -> Self {
        *self.channel.frames.lock() = frames;
        self
    }

    pub fn failing_acks(self) -> Self {
        self.channel.fail_acks.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_start(self) -> Self {
        self.channel.fail_start.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn channel(&self) -> Arc<MockChannel> {
        self.channel.clone()
    }
}

#[async_trait]
impl CaptureTarget for MockCaptureTarget {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open_channel(&self) -> CaptureResult<Arc<dyn CaptureChannel>> {
        if self.fail_open {
            return Err(CaptureError::Channel(format!("{} is gone", self.id)));
        }
        let channel: Arc<dyn CaptureChannel> = self.channel.clone();
        Ok(channel)
    }
}
