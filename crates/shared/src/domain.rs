use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MAX_ARCHIVE_BYTES: u64 = 100 * 1024 * 1024;

pub const ARCHIVE_EXTENSION: &str = ".zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Selected,
    Uploading,
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl Phase {
    pub fn holds_selection(self) -> bool {
        matches!(
            self,
            Phase::Selected | Phase::Uploading | Phase::Uploaded | Phase::Processing
        )
    }

    pub fn shows_upload_panel(self) -> bool {
        matches!(
            self,
            Phase::Idle | Phase::Selected | Phase::Uploading | Phase::Uploaded
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Selected => "selected",
            Phase::Uploading => "uploading",
            Phase::Uploaded => "uploaded",
            Phase::Processing => "processing",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counters {
    pub findings: u64,
    pub steps: u64,
    pub images: u64,
}

impl Counters {
    pub fn new(findings: u64, steps: u64, images: u64) -> Self {
        Self {
            findings,
            steps,
            images,
        }
    }
}

pub fn validate_archive(name: &str, size_bytes: u64) -> Result<(), ValidationError> {
    if !name.ends_with(ARCHIVE_EXTENSION) {
        return Err(ValidationError::NotAZipArchive {
            name: name.to_string(),
        });
    }
    if size_bytes > MAX_ARCHIVE_BYTES {
        return Err(ValidationError::TooLarge {
            size_bytes,
            limit_bytes: MAX_ARCHIVE_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zip_at_exact_limit() {
        assert!(validate_archive("notes.zip", MAX_ARCHIVE_BYTES).is_ok());
        assert!(validate_archive("notes.zip", 0).is_ok());
    }

    #[test]
    fn rejects_other_extensions() {
        for name in ["notes.tar", "notes.ZIP", "notes.zip.txt", "zip", ""] {
            let err = validate_archive(name, 10).expect_err("must reject");
            assert!(matches!(err, ValidationError::NotAZipArchive { .. }), "{name}");
        }
    }

    #[test]
    fn rejects_oversized_archive_regardless_of_extension() {
        let err = validate_archive("notes.zip", MAX_ARCHIVE_BYTES + 1).expect_err("too large");
        assert!(matches!(err, ValidationError::TooLarge { .. }));

        assert!(validate_archive("notes.rar", MAX_ARCHIVE_BYTES + 1).is_err());
    }

    #[test]
    fn selection_is_held_only_in_active_phases() {
        assert!(!Phase::Idle.holds_selection());
        assert!(Phase::Uploaded.holds_selection());
        assert!(Phase::Processing.holds_selection());
        assert!(!Phase::Completed.holds_selection());
        assert!(!Phase::Failed.holds_selection());
    }
}
