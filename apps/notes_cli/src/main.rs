use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    format_file_size, session::status_line, ArchiveFile, ControllerConfig, HttpBackend,
    ProcessingBackend, SessionEvent, UploadSessionController,
};
use shared::domain::Phase;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod settings;

use settings::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "notes_cli", about = "Upload a notes archive for processing and follow its progress")]
struct Args {
    #[arg(long, global = true)]
    server_url: Option<String>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload ARCHIVE, process it and download the result.
    Run {
        archive: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        no_download: bool,
        /// Print the final view as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the server's current processing status.
    Status,
    /// Ask the server to discard its current session.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }
    if let Some(ms) = args.poll_interval_ms.filter(|ms| *ms > 0) {
        settings.poll_interval_ms = ms;
    }
    debug!(server_url = %settings.server_url, poll_interval_ms = settings.poll_interval_ms, "settings resolved");

    let backend = Arc::new(HttpBackend::new(&settings.server_url)?);

    match args.command {
        Command::Run {
            archive,
            output,
            no_download,
            json,
        } => {
            if let Some(output) = output {
                settings.download_path = output;
            }
            run_archive(backend, &settings, archive, !no_download, json).await
        }
        Command::Status => print_status(backend.as_ref()).await,
        Command::Reset => {
            backend.reset().await?;
            println!("Server session reset.");
            Ok(())
        }
    }
}

async fn run_archive(
    backend: Arc<HttpBackend>,
    settings: &Settings,
    archive: PathBuf,
    download: bool,
    json: bool,
) -> Result<()> {
    let controller = UploadSessionController::with_config(
        backend,
        ControllerConfig {
            poll_interval: settings.poll_interval(),
        },
    );
    let mut events = controller.subscribe();
    let mut printer = EventPrinter::default();

    let file = ArchiveFile::from_path(&archive).await?;
    println!("{} ({})", file.name(), format_file_size(file.size_bytes()));

    if let Err(err) = controller.select_file(file).await {
        printer.drain(&mut events);
        bail!(err.display_message());
    }
    if let Err(err) = controller.start_processing().await {
        printer.drain(&mut events);
        bail!(err.display_message());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(phase) = printer.print(&event) {
                        break phase;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => bail!("controller stopped unexpectedly"),
            },
            _ = &mut ctrl_c => {
                controller.reset().await;
                bail!("interrupted; session reset");
            }
        }
    };
    printer.drain(&mut events);

    let view = controller.view().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{view}");
    }

    if outcome == Phase::Failed {
        let session = controller.session().await;
        bail!(session.error_message().unwrap_or("Processing failed").to_string());
    }

    if download {
        println!("Downloading {}", controller.request_download());
        let bytes = controller.download().await?;
        tokio::fs::write(&settings.download_path, bytes)
            .await
            .with_context(|| {
                format!("failed to write {}", settings.download_path.display())
            })?;
        println!("Saved {}", settings.download_path.display());
    }
    Ok(())
}

async fn print_status(backend: &dyn ProcessingBackend) -> Result<()> {
    let snapshot = backend.fetch_status().await?;
    let counters = snapshot.counters();
    println!(
        "findings: {}  steps: {}  images: {}  complete: {}",
        counters.findings, counters.steps, counters.images, snapshot.complete
    );
    if let Some(line) = status_line(&snapshot) {
        println!("{line}");
    }
    for record in &snapshot.logs {
        println!("[{}] {}", record.timestamp, record.message);
    }
    Ok(())
}

#[derive(Default)]
struct EventPrinter {
    last_status: String,
}

impl EventPrinter {
    fn print(&mut self, event: &SessionEvent) -> Option<Phase> {
        match event {
            SessionEvent::PhaseChanged { from, to } => {
                debug!(%from, %to, "phase changed");
                if to.is_terminal() {
                    return Some(*to);
                }
            }
            SessionEvent::Toast(toast) => println!("({}) {}", toast.kind, toast.message),
            SessionEvent::LogAppended(line) => println!("  {line}"),
            SessionEvent::Progress { status_text, .. } => {
                if *status_text != self.last_status {
                    println!("{status_text}");
                    self.last_status.clone_from(status_text);
                }
            }
        }
        None
    }

    fn drain(&mut self, events: &mut broadcast::Receiver<SessionEvent>) {
        while let Ok(event) = events.try_recv() {
            self.print(&event);
        }
    }
}
