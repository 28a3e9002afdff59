//! Bookkeeping records stored alongside a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity and timestamps of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub problem_type: String,
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub description: Option<String>,
}

impl SessionMetadata {
    pub fn new(problem_type: impl Into<String>, schema_version: u32) -> Self {
        let now = Utc::now();
        Self {
            problem_type: problem_type.into(),
            schema_version,
            created_at: now,
            last_modified: now,
            description: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

/// One step of the session history. Audit only, never replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub success: bool,
    pub notes: Option<String>,
}

impl LogEntry {
    pub fn success(operation: impl Into<String>, notes: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            success: true,
            notes,
        }
    }

    pub fn failure(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            success: false,
            notes: Some(error.into()),
        }
    }
}

/// An export produced by [`CalibrationSession::export`](super::CalibrationSession::export).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord<E> {
    pub timestamp: DateTime<Utc>,
    pub export: E,
    pub notes: Option<String>,
}

impl<E> ExportRecord<E> {
    pub fn new(export: E, notes: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            export,
            notes,
        }
    }
}
