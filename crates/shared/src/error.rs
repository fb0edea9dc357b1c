use thiserror::Error;

/// Client-side rejection of a selected archive. Never sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'{name}' is not a .zip archive")]
    NotAZipArchive { name: String },
    #[error("archive is {size_bytes} bytes, limit is {limit_bytes} bytes")]
    TooLarge { size_bytes: u64, limit_bytes: u64 },
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::NotAZipArchive { .. } => "Please upload a ZIP file",
            ValidationError::TooLarge { .. } => "File size exceeds 100MB limit",
        }
    }
}
