use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::Counters;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Acknowledgement {
    pub fn accepted() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }

    /// Server-supplied failure text, ignoring blank messages.
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub timestamp: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinalStats {
    #[serde(default, deserialize_with = "zero_if_null")]
    pub findings: u64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub steps: u64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub images: u64,
}

impl From<FinalStats> for Counters {
    fn from(value: FinalStats) -> Self {
        Counters::new(value.findings, value.steps, value.images)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default, deserialize_with = "zero_if_null")]
    pub findings: u64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub steps: u64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub images: u64,
    #[serde(default, deserialize_with = "false_if_null")]
    pub complete: bool,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub logs: Vec<LogRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<FinalStats>,
}

impl StatusSnapshot {
    pub fn counters(&self) -> Counters {
        Counters::new(self.findings, self.steps, self.images)
    }
}

fn zero_if_null<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or_default())
}

fn false_if_null<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_if_null<'de, D>(deserializer: D) -> Result<Vec<LogRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<LogRecord>>::deserialize(deserializer)?.unwrap_or_default())
}
