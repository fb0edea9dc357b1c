//! Projection of a [`Session`] into the full screen. Hidden panels are `None`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::domain::{Counters, Phase};

use crate::{
    format::format_file_size,
    session::{LogLine, ProcessAffordance, Session, Toast, ToastKind},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadPanel {
    pub drop_highlight: bool,
    pub file: Option<FileInfo>,
    pub process_button: Option<ProcessAffordance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingPanel {
    pub counters: Counters,
    pub status_text: String,
    pub logs: Vec<LogLine>,
    pub logs_collapsed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultsPanel {
    pub findings: u64,
    pub steps: u64,
    pub images: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPanel {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct View {
    pub phase: Phase,
    pub upload: Option<UploadPanel>,
    pub processing: Option<ProcessingPanel>,
    pub results: Option<ResultsPanel>,
    pub error: Option<ErrorPanel>,
    pub toasts: Vec<Toast>,
}

pub fn render(session: &Session, now: DateTime<Utc>) -> View {
    let phase = session.phase();

    let upload = phase.shows_upload_panel().then(|| {
        let file = session.selected_file().map(|file| FileInfo {
            name: file.name().to_string(),
            size_label: format_file_size(file.size_bytes()),
        });
        let process_button = file
            .as_ref()
            .map(|_| session.process_button().clone());
        UploadPanel {
            drop_highlight: session.drop_highlight(),
            file,
            process_button,
        }
    });

    let processing = (phase == Phase::Processing).then(|| ProcessingPanel {
        counters: session.counters(),
        status_text: session.status_text().to_string(),
        logs: session.logs().to_vec(),
        logs_collapsed: session.logs_collapsed(),
    });

    let results = (phase == Phase::Completed).then(|| {
        let counters = session.results().unwrap_or_default();
        ResultsPanel {
            findings: counters.findings,
            steps: counters.steps,
            images: counters.images,
        }
    });

    let error = (phase == Phase::Failed).then(|| ErrorPanel {
        message: session.error_message().unwrap_or_default().to_string(),
    });

    let toasts = session
        .toasts()
        .iter()
        .filter(|toast| toast.is_live(now))
        .cloned()
        .collect();

    View {
        phase,
        upload,
        processing,
        results,
        error,
        toasts,
    }
}

impl fmt::Display for ToastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ToastKind::Success => "ok",
            ToastKind::Error => "error",
            ToastKind::Warning => "warn",
            ToastKind::Info => "info",
        };
        f.write_str(tag)
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.level {
            Some(level) => write!(f, "[{}] {} ({level})", self.timestamp, self.message),
            None => write!(f, "[{}] {}", self.timestamp, self.message),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "phase: {}", self.phase)?;

        if let Some(upload) = &self.upload {
            match &upload.file {
                Some(file) => writeln!(f, "file: {} ({})", file.name, file.size_label)?,
                None if upload.drop_highlight => writeln!(f, "drop a .zip archive to upload")?,
                None => writeln!(f, "no archive selected")?,
            }
            if let Some(button) = &upload.process_button {
                let state = if button.enabled { "ready" } else { "busy" };
                writeln!(f, "action: {} [{state}]", button.label)?;
            }
        }

        if let Some(processing) = &self.processing {
            let counters = processing.counters;
            writeln!(
                f,
                "findings: {}  steps: {}  images: {}",
                counters.findings, counters.steps, counters.images
            )?;
            if !processing.status_text.is_empty() {
                writeln!(f, "status: {}", processing.status_text)?;
            }
            if processing.logs_collapsed {
                writeln!(f, "logs: {} hidden", processing.logs.len())?;
            } else {
                for line in &processing.logs {
                    writeln!(f, "  {line}")?;
                }
            }
        }

        if let Some(results) = &self.results {
            writeln!(
                f,
                "results: {} findings, {} steps, {} images",
                results.findings, results.steps, results.images
            )?;
        }

        if let Some(error) = &self.error {
            writeln!(f, "error: {}", error.message)?;
        }

        for toast in &self.toasts {
            writeln!(f, "({}) {}", toast.kind, toast.message)?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
