use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a document.
///
/// Statuses form a strict chain `REGISTERED -> UPLOADED -> PROCESSED`.
/// A record only ever advances by one step and never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Registered,
    Uploaded,
    Processed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown document status: {0}")]
pub struct UnknownStatus(pub String);

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Registered => "REGISTERED",
            DocumentStatus::Uploaded => "UPLOADED",
            DocumentStatus::Processed => "PROCESSED",
        }
    }

    /// The status this one advances to, if any.
    pub fn next(&self) -> Option<DocumentStatus> {
        match self {
            DocumentStatus::Registered => Some(DocumentStatus::Uploaded),
            DocumentStatus::Uploaded => Some(DocumentStatus::Processed),
            DocumentStatus::Processed => None,
        }
    }

    /// Returns true when `target` is exactly one step ahead of `self`.
    pub fn can_advance_to(&self, target: DocumentStatus) -> bool {
        self.next() == Some(target)
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGISTERED" => Ok(DocumentStatus::Registered),
            "UPLOADED" => Ok(DocumentStatus::Uploaded),
            "PROCESSED" => Ok(DocumentStatus::Processed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
