use super::*;
use crate::archive::ArchiveFile;
use shared::protocol::{FinalStats, LogRecord, StatusSnapshot};

fn uploaded_session() -> Session {
    let mut session = Session::new();
    session.select(ArchiveFile::from_bytes("notes.zip", vec![0u8; 1536]));
    session.begin_upload();
    session.finish_upload();
    session
}

#[test]
fn idle_view_shows_only_the_upload_panel() {
    let view = render(&Session::new(), Utc::now());
    assert_eq!(view.phase, Phase::Idle);
    let upload = view.upload.expect("upload panel");
    assert!(upload.file.is_none());
    assert!(upload.process_button.is_none());
    assert!(view.processing.is_none());
    assert!(view.results.is_none());
    assert!(view.error.is_none());
}

#[test]
fn uploaded_view_shows_file_info_and_enabled_button() {
    let view = render(&uploaded_session(), Utc::now());
    let upload = view.upload.expect("upload panel");
    assert_eq!(
        upload.file,
        Some(FileInfo {
            name: "notes.zip".to_string(),
            size_label: "1.5 KB".to_string(),
        })
    );
    let button = upload.process_button.expect("button");
    assert!(button.enabled);
    assert_eq!(button.label, "Process with AI");
}

#[test]
fn processing_view_hides_upload_and_lists_logs() {
    let mut session = uploaded_session();
    session.begin_processing();
    session.apply_snapshot(&StatusSnapshot {
        findings: 1,
        logs: vec![LogRecord {
            timestamp: "12:00:00".to_string(),
            message: "Found finding auth".to_string(),
            level: Some("info".to_string()),
        }],
        ..StatusSnapshot::default()
    });

    let view = render(&session, Utc::now());
    assert!(view.upload.is_none());
    let processing = view.processing.expect("processing panel");
    assert_eq!(processing.counters, Counters::new(1, 0, 0));
    assert_eq!(processing.status_text, "Processing findings (1 analyzed)");
    assert_eq!(processing.logs.len(), 1);

    let text = render(&session, Utc::now()).to_string();
    assert!(text.contains("[12:00:00] Found finding auth (info)"), "{text}");
}

#[test]
fn completed_view_shows_results_only() {
    let mut session = uploaded_session();
    session.begin_processing();
    session.apply_snapshot(&StatusSnapshot {
        complete: true,
        stats: Some(FinalStats {
            findings: 5,
            steps: 3,
            images: 2,
        }),
        ..StatusSnapshot::default()
    });

    let view = render(&session, Utc::now());
    assert!(view.processing.is_none());
    assert_eq!(
        view.results,
        Some(ResultsPanel {
            findings: 5,
            steps: 3,
            images: 2,
        })
    );
}

#[test]
fn failed_view_shows_error_message() {
    let mut session = uploaded_session();
    session.begin_processing();
    session.fail("Processing failed");

    let view = render(&session, Utc::now());
    assert!(view.processing.is_none());
    assert_eq!(view.error.expect("error panel").message, "Processing failed");
}

#[test]
fn expired_toasts_are_not_rendered() {
    let mut session = Session::new();
    let raised = Utc::now();
    session.raise_toast(ToastKind::Error, "Please upload a ZIP file", raised);

    assert_eq!(render(&session, raised).toasts.len(), 1);
    let later = raised + chrono::Duration::seconds(4);
    assert!(render(&session, later).toasts.is_empty());
}

#[test]
fn collapsed_logs_are_summarised_in_text_output() {
    let mut session = uploaded_session();
    session.begin_processing();
    session.toggle_logs();
    let text = render(&session, Utc::now()).to_string();
    assert!(text.contains("logs: 0 hidden"), "{text}");
}
