use std::fmt;

use shared::{domain::Phase, error::ValidationError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Upload,
    Process,
    Status,
    Reset,
    Download,
    RemoveFile,
}

impl Operation {
    pub fn generic_failure(self) -> &'static str {
        match self {
            Operation::Select => "Selection failed",
            Operation::Upload => "Upload failed",
            Operation::Process => "Processing failed",
            Operation::Status => "Status check failed",
            Operation::Reset => "Reset failed",
            Operation::Download => "Download failed",
            Operation::RemoveFile => "Remove failed",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Select => "select",
            Operation::Upload => "upload",
            Operation::Process => "process",
            Operation::Status => "status",
            Operation::Reset => "reset",
            Operation::Download => "download",
            Operation::RemoveFile => "remove_file",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{operation} rejected by server: {message}")]
    Rejected { operation: Operation, message: String },
    #[error("{operation} request failed: {detail}")]
    Transport { operation: Operation, detail: String },
    #[error("{operation} is not allowed while {phase}")]
    InvalidPhase { operation: Operation, phase: Phase },
    #[error("{operation} response discarded after the session moved on")]
    Superseded { operation: Operation },
}

impl ControllerError {
    /// Message shown to the user for collaborator failures: the server text
    /// when one was supplied, else the operation's generic message.
    pub fn display_message(&self) -> String {
        match self {
            ControllerError::Validation(err) => err.user_message().to_string(),
            ControllerError::Rejected { message, .. } => message.clone(),
            ControllerError::Transport { operation, .. } => {
                operation.generic_failure().to_string()
            }
            other => other.to_string(),
        }
    }
}
