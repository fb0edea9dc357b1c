use std::{collections::VecDeque, sync::Arc, time::Duration};

use super::*;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::Phase,
    protocol::{FinalStats, LogRecord},
};
use tokio::{net::TcpListener, sync::Mutex};

use crate::controller::{ControllerConfig, UploadSessionController};

#[derive(Debug, Clone)]
struct ReceivedUpload {
    field: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone, Default)]
struct ServerState {
    uploads: Arc<Mutex<Vec<ReceivedUpload>>>,
    reject_uploads_with: Option<String>,
    statuses: Arc<Mutex<VecDeque<StatusSnapshot>>>,
    status_broken: bool,
    resets: Arc<Mutex<u32>>,
}

async fn handle_upload(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Acknowledgement>) {
    while let Ok(Some(field)) = multipart.next_field().await {
        let received = ReceivedUpload {
            field: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            bytes: field.bytes().await.map(|b| b.to_vec()).unwrap_or_default(),
        };
        state.uploads.lock().await.push(received);
    }

    match &state.reject_uploads_with {
        Some(message) => (
            StatusCode::BAD_REQUEST,
            Json(Acknowledgement::rejected(message.clone())),
        ),
        None => (StatusCode::OK, Json(Acknowledgement::accepted())),
    }
}

async fn handle_process() -> Json<Acknowledgement> {
    Json(Acknowledgement::accepted())
}

async fn handle_status(
    State(state): State<ServerState>,
) -> Result<Json<StatusSnapshot>, StatusCode> {
    if state.status_broken {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let mut statuses = state.statuses.lock().await;
    let snapshot = if statuses.len() > 1 {
        statuses.pop_front().unwrap_or_default()
    } else {
        statuses.front().cloned().unwrap_or_default()
    };
    Ok(Json(snapshot))
}

async fn handle_reset(State(state): State<ServerState>) -> StatusCode {
    *state.resets.lock().await += 1;
    StatusCode::OK
}

async fn handle_download() -> Vec<u8> {
    b"PK\x03\x04processed".to_vec()
}

async fn spawn_processing_server(state: ServerState) -> anyhow::Result<String> {
    let app = Router::new()
        .route("/upload", post(handle_upload))
        .route("/process", post(handle_process))
        .route("/status", get(handle_status))
        .route("/reset", post(handle_reset))
        .route("/download", get(handle_download))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

#[test]
fn endpoints_are_appended_to_base_path() {
    let backend = HttpBackend::new("http://processor.test/api").expect("backend");
    assert_eq!(backend.base_url().as_str(), "http://processor.test/api/");
    assert_eq!(
        backend.download_url().as_str(),
        "http://processor.test/api/download"
    );

    let backend = HttpBackend::new("http://processor.test").expect("backend");
    assert_eq!(
        backend.download_url().as_str(),
        "http://processor.test/download"
    );
}

#[test]
fn rejects_unusable_server_urls() {
    assert!(HttpBackend::new("not a url").is_err());
    assert!(HttpBackend::new("mailto:ops@example.com").is_err());
}

#[tokio::test]
async fn upload_sends_archive_as_multipart_file_field() {
    let state = ServerState::default();
    let server_url = spawn_processing_server(state.clone()).await.expect("server");
    let backend = HttpBackend::new(&server_url).expect("backend");

    let file = ArchiveFile::from_bytes("notes.zip", b"PK\x03\x04notes".to_vec());
    let ack = backend.upload(&file).await.expect("upload");
    assert!(ack.success);

    let uploads = state.uploads.lock().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].field, "file");
    assert_eq!(uploads[0].file_name.as_deref(), Some("notes.zip"));
    assert_eq!(uploads[0].content_type.as_deref(), Some("application/zip"));
    assert_eq!(uploads[0].bytes, b"PK\x03\x04notes");
}

#[tokio::test]
async fn rejection_payload_is_read_from_error_status() {
    let state = ServerState {
        reject_uploads_with: Some("Only ZIP files are allowed".to_string()),
        ..ServerState::default()
    };
    let server_url = spawn_processing_server(state).await.expect("server");
    let backend = HttpBackend::new(&server_url).expect("backend");

    let ack = backend
        .upload(&ArchiveFile::from_bytes("notes.zip", vec![1]))
        .await
        .expect("decoded rejection");
    assert!(!ack.success);
    assert_eq!(ack.error_message(), Some("Only ZIP files are allowed"));
}

#[tokio::test]
async fn status_errors_surface_as_failures() {
    let state = ServerState {
        status_broken: true,
        ..ServerState::default()
    };
    let server_url = spawn_processing_server(state).await.expect("server");
    let backend = HttpBackend::new(&server_url).expect("backend");

    assert!(backend.fetch_status().await.is_err());
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let backend = HttpBackend::new(&format!("http://{addr}")).expect("backend");
    assert!(backend.start_processing().await.is_err());
    assert!(backend.reset().await.is_err());
}

#[tokio::test]
async fn reset_and_download_round_trip() {
    let state = ServerState::default();
    let server_url = spawn_processing_server(state.clone()).await.expect("server");
    let backend = HttpBackend::new(&server_url).expect("backend");

    backend.reset().await.expect("reset");
    assert_eq!(*state.resets.lock().await, 1);

    let bytes = backend.download().await.expect("download");
    assert_eq!(bytes, b"PK\x03\x04processed");
}

#[tokio::test]
async fn controller_drives_full_run_over_http() {
    let state = ServerState::default();
    {
        let mut statuses = state.statuses.lock().await;
        statuses.push_back(StatusSnapshot {
            findings: 1,
            logs: vec![LogRecord {
                timestamp: "09:15:00".to_string(),
                message: "Processing finding: Findings#auth".to_string(),
                level: Some("info".to_string()),
            }],
            ..StatusSnapshot::default()
        });
        statuses.push_back(StatusSnapshot {
            findings: 1,
            steps: 5,
            images: 5,
            complete: true,
            logs: vec![
                LogRecord {
                    timestamp: "09:15:00".to_string(),
                    message: "Processing finding: Findings#auth".to_string(),
                    level: Some("info".to_string()),
                },
                LogRecord {
                    timestamp: "09:15:07".to_string(),
                    message: "Repacked archive".to_string(),
                    level: Some("success".to_string()),
                },
            ],
            stats: Some(FinalStats {
                findings: 1,
                steps: 5,
                images: 5,
            }),
        });
    }
    let server_url = spawn_processing_server(state.clone()).await.expect("server");
    let backend = Arc::new(HttpBackend::new(&server_url).expect("backend"));
    let controller = UploadSessionController::with_config(
        backend,
        ControllerConfig {
            poll_interval: Duration::from_millis(20),
        },
    );

    controller
        .select_file(ArchiveFile::from_bytes("notes.zip", vec![7; 64]))
        .await
        .expect("upload");
    controller.start_processing().await.expect("start");

    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.phase().await != Phase::Completed {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("completed");

    let session = controller.session().await;
    let messages: Vec<&str> = session.logs().iter().map(|l| l.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["Processing finding: Findings#auth", "Repacked archive"]
    );
    let view = controller.view().await;
    let results = view.results.expect("results");
    assert_eq!((results.findings, results.steps, results.images), (1, 5, 5));

    controller.reset().await;
    assert_eq!(*state.resets.lock().await, 1);
    assert_eq!(controller.phase().await, Phase::Idle);
}
