//! Error log DTOs

use serde::{Deserialize, Serialize};

use crate::domain::error_log::ErrorLog;

/// Error log entry together with its human-readable rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogView {
    #[serde(flatten)]
    pub entry: ErrorLog,
    pub formatted: String,
}

impl From<ErrorLog> for ErrorLogView {
    fn from(entry: ErrorLog) -> Self {
        let formatted = entry.format();
        Self { entry, formatted }
    }
}
