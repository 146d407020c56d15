//! Polling watcher: re-capture a session on an interval and emit a JSON line
//! each time the extracted metadata changes.

use crate::capture::{capture_pane, CaptureError, CapturedOutput};
use crate::config::{CaptureConfig, WatchConfig};
use crate::extract::{extract, ExtractionResult};
use crate::signals::shutdown_signal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::io::Write;
use std::time::Duration;

/// One metadata change observed on a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchEvent {
    pub session: String,
    pub captured_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// The metadata part of an extraction, used for change detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Fingerprint {
    summary: Option<String>,
    log_file_name: Option<String>,
    request_id: Option<String>,
}

impl From<&ExtractionResult> for Fingerprint {
    fn from(r: &ExtractionResult) -> Self {
        Self {
            summary: r.summary.clone(),
            log_file_name: r.log_file_name.clone(),
            request_id: r.request_id.clone(),
        }
    }
}

pub struct Watcher {
    capture: CaptureConfig,
    watch: WatchConfig,
    session: String,
    last: Fingerprint,
}

impl Watcher {
    pub fn new(capture: CaptureConfig, watch: WatchConfig, session: impl Into<String>) -> Self {
        Self {
            capture,
            watch,
            session: session.into(),
            last: Fingerprint::default(),
        }
    }

    /// Capture once and return an event if the metadata differs from the
    /// previous poll. A pane with no metadata never emits on its own.
    pub async fn poll_once(&mut self) -> Result<Option<WatchEvent>, CaptureError> {
        let captured = capture_pane(&self.capture, &self.session).await?;
        Ok(self.observe(captured))
    }

    fn observe(&mut self, captured: CapturedOutput) -> Option<WatchEvent> {
        let result = extract(&captured.content);
        let fingerprint = Fingerprint::from(&result);
        if fingerprint == self.last {
            return None;
        }
        self.last = fingerprint;

        tracing::debug!(
            session = %captured.session,
            request_id = ?result.request_id,
            log_file_name = ?result.log_file_name,
            "session metadata changed"
        );

        Some(WatchEvent {
            session: captured.session,
            captured_at: captured.captured_at,
            content: self.watch.include_content.then_some(result.content),
            summary: result.summary,
            log_file_name: result.log_file_name,
            request_id: result.request_id,
        })
    }

    /// Poll until Ctrl-C, writing each event to `sink` as one JSON line.
    pub async fn run<W: Write>(&mut self, sink: &mut W) -> std::io::Result<()> {
        self.run_until(sink, shutdown_signal()).await
    }

    /// Poll until `shutdown` resolves. The shutdown future is also raced
    /// against each capture, so a slow capture cannot delay it.
    ///
    /// Capture failures are logged and retried on the next tick; a session
    /// that does not exist yet may appear later.
    pub async fn run_until<W, F>(&mut self, sink: &mut W, shutdown: F) -> std::io::Result<()>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        let period = Duration::from_secs(self.watch.poll_interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            session = %self.session,
            interval_secs = period.as_secs(),
            "watching session"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let polled = tokio::select! {
                _ = &mut shutdown => break,
                polled = self.poll_once() => polled,
            };

            match polled {
                Ok(Some(event)) => {
                    let line = serde_json::to_string(&event)?;
                    writeln!(sink, "{line}")?;
                    sink.flush()?;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(session = %self.session, error = %e, "capture failed"),
            }
        }

        tracing::info!(session = %self.session, "stopped watching");
        Ok(())
    }
}
