//! Client for the notes archive processing server: selection, upload,
//! processing, status polling and reset, with a renderable view of the
//! session.

use shared::domain::{Counters, Phase};

pub mod archive;
pub mod backend;
pub mod controller;
pub mod error;
pub mod format;
pub mod session;
pub mod view;

pub use archive::{ArchiveFile, ArchiveSource};
pub use backend::{HttpBackend, ProcessingBackend};
pub use controller::{
    ControllerConfig, PollOutcome, UploadSessionController, DEFAULT_POLL_INTERVAL,
};
pub use error::{ControllerError, Operation};
pub use format::format_file_size;
pub use session::{LogLine, Session, Toast, ToastKind};
pub use view::{render, View};

#[derive(Debug, Clone)]
pub enum SessionEvent {
    PhaseChanged { from: Phase, to: Phase },
    Toast(Toast),
    LogAppended(LogLine),
    Progress { counters: Counters, status_text: String },
}
