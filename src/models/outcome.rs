//! Result of handing an artifact to the catalog.

use serde::Serialize;

/// Catalog verdict for one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The catalog created at least one new flyer.
    Created {
        id: Option<String>,
        message: Option<String>,
    },
    /// The catalog already knew this document.
    Duplicate { message: Option<String> },
    /// Rejected, unreachable, or unintelligible response.
    Failed { message: String },
}

impl UploadOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Duplicate { .. } => "duplicate",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Created { message, .. } | Self::Duplicate { message } => message.as_deref(),
            Self::Failed { message } => Some(message),
        }
    }
}
