//! Play-and-listen session types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;

/// Terminal classification of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Speech,
    Silence,
    Error,
    Cancelled,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Disposition::Speech => "speech",
            Disposition::Silence => "silence",
            Disposition::Error => "error",
            Disposition::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Longest recording window a session accepts.
pub const MAX_LISTEN: Duration = Duration::from_secs(600);

/// What to play and how to listen afterwards.
#[derive(Debug, Clone)]
pub struct ListenRequest {
    /// Prompt to play before listening.
    pub asset: String,
    /// Length of the recording window (default: 3s).
    pub listen_for: Duration,
    /// RMS level above which the recording counts as speech (default: 500).
    pub silence_threshold: f64,
}

impl ListenRequest {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            listen_for: Duration::from_secs(3),
            silence_threshold: 500.0,
        }
    }

    pub fn listen_for(mut self, duration: Duration) -> Self {
        self.listen_for = duration;
        self
    }

    pub fn silence_threshold(mut self, threshold: f64) -> Self {
        self.silence_threshold = threshold;
        self
    }
}

/// Final outcome of a session, delivered through its [`SessionHandle`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub id: u64,
    pub asset: String,
    pub disposition: Disposition,
    /// Measured energy, when the recording got as far as analysis.
    pub rms: Option<f64>,
    pub finished_at: DateTime<Utc>,
}

/// Returned by `play_and_listen`. Dropping it does not affect the session.
#[derive(Debug)]
pub struct SessionHandle {
    id: u64,
    report_rx: oneshot::Receiver<SessionReport>,
}

impl SessionHandle {
    pub(crate) fn new(id: u64, report_rx: oneshot::Receiver<SessionReport>) -> Self {
        Self { id, report_rx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the session to end (async).
    pub async fn finished(self) -> Option<SessionReport> {
        self.report_rx.await.ok()
    }

    /// Block the current thread until the session ends.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> Option<SessionReport> {
        self.report_rx.blocking_recv().ok()
    }

    /// Non-blocking check; `None` while the session is still running.
    pub fn try_report(&mut self) -> Option<SessionReport> {
        self.report_rx.try_recv().ok()
    }
}
