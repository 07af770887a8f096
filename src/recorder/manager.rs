//! Recording manager
//!
//! Owns every running recording session and stops them together.

use super::session::{RecordingSession, SessionError, SessionOptions, SessionResult};
use super::state::{SessionReport, SessionState};
use crate::capture::CaptureTarget;
use crate::config::{RecorderConfig, DEFAULT_FRAME_RATE};
use crate::encoder::{Encoder, FfmpegEncoder};
use crate::utils::AppResult;
use futures::future::join_all;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted as sessions come and go
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// Session is capturing
    Started(Uuid),
    /// Session stopped and its output is complete
    Stopped(Uuid),
    /// Session failed to start or stop
    Error { id: Uuid, message: String },
}

/// Outcome of stopping one session
#[derive(Debug)]
pub struct SessionOutcome {
    pub id: Uuid,
    pub result: SessionResult<SessionReport>,
}

/// Aggregate result of [`RecordingManager::stop_all`], in start order
#[derive(Debug, Default)]
pub struct StopAllReport {
    pub outcomes: Vec<SessionOutcome>,
}

impl StopAllReport {
    /// Reports of the sessions that stopped cleanly
    pub fn successes(&self) -> impl Iterator<Item = &SessionReport> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Sessions that failed, with their errors
    pub fn failures(&self) -> impl Iterator<Item = (Uuid, &SessionError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.id, e)))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Turn the report into a plain result, failing if any session failed
    pub fn into_result(self) -> Result<Vec<SessionReport>, StopAllError> {
        let mut reports = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(report) => reports.push(report),
                Err(e) => failures.push((outcome.id, e)),
            }
        }

        if failures.is_empty() {
            Ok(reports)
        } else {
            Err(StopAllError { failures, reports })
        }
    }
}

/// One or more sessions failed to stop cleanly
#[derive(Error, Debug)]
#[error("{} session(s) failed to stop: {}", .failures.len(), describe_failures(.failures))]
pub struct StopAllError {
    pub failures: Vec<(Uuid, SessionError)>,

    /// Sessions that did stop cleanly
    pub reports: Vec<SessionReport>,
}

fn describe_failures(failures: &[(Uuid, SessionError)]) -> String {
    let mut out = String::new();
    for (i, (id, error)) in failures.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        let _ = write!(out, "{}: {}", id, error);
    }
    out
}

/// Manages concurrent recording sessions
pub struct RecordingManager {
    /// Session options applied to every new session
    options: SessionOptions,

    /// Frame rate used by [`RecordingManager::record`]
    frame_rate: u32,

    /// Encoder shared by all sessions
    encoder: Arc<dyn Encoder>,

    /// Sessions in the order they were started
    sessions: Vec<RecordingSession>,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingManager {
    /// Create a manager that encodes with `encoder`
    pub fn new(encoder: Arc<dyn Encoder>, options: SessionOptions) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            options,
            frame_rate: DEFAULT_FRAME_RATE,
            encoder,
            sessions: Vec::new(),
            event_tx,
        }
    }

    /// Create a manager using FFmpeg as configured in `config`
    pub fn from_config(config: &RecorderConfig) -> AppResult<Self> {
        config.validate()?;
        let encoder = Arc::new(FfmpegEncoder::new(config.encoder.clone()));
        let mut manager = Self::new(encoder, config.session_options());
        manager.frame_rate = config.frame_rate;
        Ok(manager)
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Start recording `target` into `output`.
    ///
    /// The session is only kept if it reaches the capturing state.
    pub async fn start(
        &mut self,
        target: &dyn CaptureTarget,
        output: impl AsRef<Path>,
        frame_rate: u32,
    ) -> SessionResult<Uuid> {
        let mut session = RecordingSession::new(self.encoder.clone(), self.options);
        let id = session.id();

        if let Err(e) = session.start(target, output.as_ref(), frame_rate).await {
            tracing::error!("Failed to start recording of {}: {}", target.id(), e);
            let _ = self.event_tx.send(RecordingEvent::Error {
                id,
                message: e.to_string(),
            });
            return Err(e);
        }

        self.sessions.push(session);
        let _ = self.event_tx.send(RecordingEvent::Started(id));
        Ok(id)
    }

    /// Start recording at the configured frame rate
    pub async fn record(&mut self, target: &dyn CaptureTarget, output: impl AsRef<Path>) -> SessionResult<Uuid> {
        let frame_rate = self.frame_rate;
        self.start(target, output, frame_rate).await
    }

    /// Stop one session and remove it from the manager
    pub async fn stop(&mut self, id: Uuid) -> Option<SessionResult<SessionReport>> {
        let index = self.sessions.iter().position(|s| s.id() == id)?;
        let mut session = self.sessions.remove(index);
        let result = session.stop().await;
        self.emit_outcome(id, &result);
        Some(result)
    }

    /// Stop every session concurrently.
    ///
    /// A failing session never prevents the others from being stopped;
    /// every outcome is reported. The manager is empty afterwards.
    pub async fn stop_all(&mut self) -> StopAllReport {
        let sessions = std::mem::take(&mut self.sessions);
        tracing::info!("Stopping {} recording session(s)", sessions.len());

        let outcomes = join_all(sessions.into_iter().map(|mut session| async move {
            let id = session.id();
            let result = session.stop().await;
            SessionOutcome { id, result }
        }))
        .await;

        for outcome in &outcomes {
            self.emit_outcome(outcome.id, &outcome.result);
        }

        let report = StopAllReport { outcomes };
        let failed = report.failures().count();
        if failed > 0 {
            tracing::warn!("{} of {} session(s) failed to stop cleanly", failed, report.outcomes.len());
        }
        report
    }

    fn emit_outcome(&self, id: Uuid, result: &SessionResult<SessionReport>) {
        let event = match result {
            Ok(_) => RecordingEvent::Stopped(id),
            Err(e) => RecordingEvent::Error {
                id,
                message: e.to_string(),
            },
        };
        let _ = self.event_tx.send(event);
    }

    /// Number of managed sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Session ids in start order
    pub fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.iter().map(|s| s.id()).collect()
    }

    /// State of a managed session
    pub fn state_of(&self, id: Uuid) -> Option<SessionState> {
        self.sessions.iter().find(|s| s.id() == id).map(|s| s.state())
    }
}
