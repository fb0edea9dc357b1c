//! Owned upload/processing session state and its pure transitions.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use shared::{
    domain::{Counters, Phase},
    protocol::{FinalStats, LogRecord, StatusSnapshot},
};

use crate::archive::ArchiveFile;

pub const PLACEHOLDER_LOG_TIME: &str = "--:--:--";
pub const PLACEHOLDER_LOG_MESSAGE: &str = "Waiting to start...";

pub const PROCESS_LABEL_READY: &str = "Process with AI";
pub const PROCESS_LABEL_UPLOADING: &str = "Uploading...";
pub const PROCESS_LABEL_PROCESSING: &str = "Processing...";

pub const STATUS_COMPLETE: &str = "Processing complete!";

pub const TOAST_TTL_MS: i64 = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Toast {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now - self.raised_at < Duration::milliseconds(TOAST_TTL_MS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub timestamp: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl LogLine {
    pub fn placeholder() -> Self {
        Self {
            timestamp: PLACEHOLDER_LOG_TIME.to_string(),
            message: PLACEHOLDER_LOG_MESSAGE.to_string(),
            level: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.timestamp == PLACEHOLDER_LOG_TIME && self.message == PLACEHOLDER_LOG_MESSAGE
    }
}

impl From<&LogRecord> for LogLine {
    fn from(record: &LogRecord) -> Self {
        Self {
            timestamp: record.timestamp.clone(),
            message: record.message.clone(),
            level: record.level.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessAffordance {
    pub enabled: bool,
    pub label: String,
}

impl ProcessAffordance {
    fn ready() -> Self {
        Self {
            enabled: true,
            label: PROCESS_LABEL_READY.to_string(),
        }
    }

    fn busy(label: &str) -> Self {
        Self {
            enabled: false,
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEffect {
    pub appended_logs: usize,
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) phase: Phase,
    pub(crate) selected_file: Option<ArchiveFile>,
    pub(crate) seen_log_messages: HashSet<String>,
    pub(crate) epoch: u64,
    pub(crate) counters: Counters,
    pub(crate) status_text: String,
    pub(crate) logs: Vec<LogLine>,
    pub(crate) results: Option<Counters>,
    pub(crate) error_message: Option<String>,
    pub(crate) process_button: ProcessAffordance,
    pub(crate) toasts: Vec<Toast>,
    pub(crate) logs_collapsed: bool,
    pub(crate) drop_highlight: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            selected_file: None,
            seen_log_messages: HashSet::new(),
            epoch: 0,
            counters: Counters::default(),
            status_text: String::new(),
            logs: vec![LogLine::placeholder()],
            results: None,
            error_message: None,
            process_button: ProcessAffordance::ready(),
            toasts: Vec::new(),
            logs_collapsed: false,
            drop_highlight: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selected_file(&self) -> Option<&ArchiveFile> {
        self.selected_file.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn logs(&self) -> &[LogLine] {
        &self.logs
    }

    pub fn results(&self) -> Option<Counters> {
        self.results
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn process_button(&self) -> &ProcessAffordance {
        &self.process_button
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn logs_collapsed(&self) -> bool {
        self.logs_collapsed
    }

    pub fn drop_highlight(&self) -> bool {
        self.drop_highlight
    }

    pub(crate) fn raise_toast(
        &mut self,
        kind: ToastKind,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Toast {
        let toast = Toast {
            kind,
            message: message.into(),
            raised_at: now,
        };
        self.toasts.push(toast.clone());
        toast
    }

    pub(crate) fn prune_toasts(&mut self, now: DateTime<Utc>) {
        self.toasts.retain(|toast| toast.is_live(now));
    }

    pub(crate) fn select(&mut self, file: ArchiveFile) {
        self.selected_file = Some(file);
        self.phase = Phase::Selected;
        self.drop_highlight = false;
    }

    pub(crate) fn begin_upload(&mut self) -> u64 {
        self.phase = Phase::Uploading;
        self.process_button = ProcessAffordance::busy(PROCESS_LABEL_UPLOADING);
        self.epoch
    }

    pub(crate) fn finish_upload(&mut self) {
        self.phase = Phase::Uploaded;
        self.process_button = ProcessAffordance::ready();
    }

    pub(crate) fn begin_processing(&mut self) -> u64 {
        self.epoch += 1;
        self.seen_log_messages.clear();
        self.logs.clear();
        self.phase = Phase::Processing;
        self.process_button = ProcessAffordance::busy(PROCESS_LABEL_PROCESSING);
        self.epoch
    }

    /// Overwrites the counters, appends unseen log lines and derives the
    /// status line. Completion moves the session to `Completed`.
    pub(crate) fn apply_snapshot(&mut self, snapshot: &StatusSnapshot) -> SnapshotEffect {
        self.counters = snapshot.counters();

        let mut appended_logs = 0;
        for record in &snapshot.logs {
            if self.seen_log_messages.insert(record.message.clone()) {
                self.logs.push(LogLine::from(record));
                appended_logs += 1;
            }
        }

        if let Some(text) = status_line(snapshot) {
            self.status_text = text;
        }

        if snapshot.complete {
            self.complete(snapshot.stats);
        }

        SnapshotEffect {
            appended_logs,
            completed: snapshot.complete,
        }
    }

    fn complete(&mut self, stats: Option<FinalStats>) {
        if let Some(stats) = stats {
            self.results = Some(stats.into());
        }
        self.phase = Phase::Completed;
        self.selected_file = None;
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.phase = Phase::Failed;
        self.selected_file = None;
    }

    // Toasts and the log collapse state survive a reset.
    pub(crate) fn reset_to_idle(&mut self) {
        let toasts = std::mem::take(&mut self.toasts);
        let logs_collapsed = self.logs_collapsed;
        let epoch = self.epoch + 1;
        *self = Self::new();
        self.toasts = toasts;
        self.logs_collapsed = logs_collapsed;
        self.epoch = epoch;
    }

    pub(crate) fn toggle_logs(&mut self) -> bool {
        self.logs_collapsed = !self.logs_collapsed;
        self.logs_collapsed
    }

    pub(crate) fn set_drop_highlight(&mut self, active: bool) {
        self.drop_highlight = active;
    }
}

/// Status line for a snapshot, or `None` to keep the current text.
pub fn status_line(snapshot: &StatusSnapshot) -> Option<String> {
    if snapshot.complete {
        Some(STATUS_COMPLETE.to_string())
    } else if snapshot.images > 0 {
        Some(format!("Processing images ({} analyzed)", snapshot.images))
    } else if snapshot.steps > 0 {
        Some(format!("Analyzing steps ({} processed)", snapshot.steps))
    } else if snapshot.findings > 0 {
        Some(format!("Processing findings ({} analyzed)", snapshot.findings))
    } else {
        None
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
