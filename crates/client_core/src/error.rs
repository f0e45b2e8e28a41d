use shared::{
    domain::SectionId,
    error::{ErrorCode, ErrorReport},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SectionError {
    #[error("invalid section: {0}")]
    Validation(String),
    #[error("section {0} not found")]
    NotFound(SectionId),
    #[error("{field} left blank, nothing changed")]
    Cancelled { field: &'static str },
    #[error("store request failed: {0:#}")]
    Io(anyhow::Error),
    #[error("section list worker has stopped")]
    Closed,
}

impl SectionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SectionError::Validation(_) => ErrorCode::Validation,
            SectionError::NotFound(_) => ErrorCode::NotFound,
            SectionError::Cancelled { .. } => ErrorCode::Cancelled,
            SectionError::Io(_) => ErrorCode::Io,
            SectionError::Closed => ErrorCode::Internal,
        }
    }

    /// Dialog title used when the failure is shown to the user.
    pub fn title(&self) -> &'static str {
        match self.code() {
            ErrorCode::Validation => "Invalid section",
            ErrorCode::Io => "Storage error",
            _ => "Error",
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.code(), self.to_string())
    }
}
