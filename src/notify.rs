// src/notify.rs
// =============================================================================
// User-facing notifications.
//
// Nothing in a run is fatal. When something worth telling the user happens
// (a run starts, lines were skipped, a report was sent) the engine emits a
// Notification and carries on. The terminal front-end decides how to show it.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Danger,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(Severity::Danger, message)
    }

    // Mirrors the notification into the log at a matching level
    pub fn log(&self) {
        match self.severity {
            Severity::Info | Severity::Success => info!(severity = self.severity.label(), "{}", self.message),
            Severity::Warning => warn!("{}", self.message),
            Severity::Danger => error!("{}", self.message),
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            Severity::Info => "ℹ️ ",
            Severity::Success => "✅",
            Severity::Warning => "⚠️ ",
            Severity::Danger => "❌",
        };
        write!(f, "{} {}", icon, self.message)
    }
}
