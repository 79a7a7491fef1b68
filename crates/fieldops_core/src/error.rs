//! Error types for audit operations.

use crate::validation::ItemIssue;
use fieldops_backend::BackendError;
use fieldops_protocol::{BackendConfig, MediaError};
use fieldops_session::SessionError;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("A signature is required before submitting")]
    MissingSignature,

    /// Zero-based index of the first incomplete item.
    #[error("Item {} is incomplete: {}", .index + 1, describe(.issues))]
    Incomplete { index: usize, issues: Vec<ItemIssue> },

    #[error("Video for '{item}' is {size} bytes, over the {limit} byte limit")]
    VideoTooLarge { item: String, size: u64, limit: u64 },

    #[error("Invalid media for {slot}: {source}")]
    Media {
        slot: String,
        #[source]
        source: MediaError,
    },

    #[error("Report rendering failed: {0}")]
    Report(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Failed to set up session: {0}")]
    SessionSetup(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

fn describe(issues: &[ItemIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Hint appended when storage reports a missing bucket.
pub fn bucket_hint(photos_bucket: &str, reports_bucket: &str) -> String {
    format!(
        "This is a configuration issue in the backing project. Make sure both the '{}' and '{}' \
         storage buckets exist and that their access policies allow uploads.",
        photos_bucket, reports_bucket
    )
}

impl AuditError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn is_bucket_missing(&self) -> bool {
        matches!(self, AuditError::Backend(e) if e.is_bucket_missing())
    }

    /// Readable text for the person operating the client.
    pub fn user_message(&self) -> String {
        self.user_message_for(&BackendConfig::default())
    }

    /// Like [`user_message`](Self::user_message) with the configured bucket names in hints.
    pub fn user_message_for(&self, backend: &BackendConfig) -> String {
        let base = match self {
            AuditError::Backend(e) => e.to_string(),
            other => other.to_string(),
        };
        if self.is_bucket_missing() {
            format!(
                "{}\n\n{}",
                base,
                bucket_hint(&backend.photos_bucket, &backend.reports_bucket)
            )
        } else {
            base
        }
    }
}

/// Pipeline step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionStage {
    Preflight,
    UploadMedia,
    SaveFindings,
    SaveChecklist,
    RenderReport,
    UploadReport,
    LinkReport,
}

impl SubmissionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStage::Preflight => "preflight",
            SubmissionStage::UploadMedia => "upload media",
            SubmissionStage::SaveFindings => "save findings",
            SubmissionStage::SaveChecklist => "save checklist",
            SubmissionStage::RenderReport => "render report",
            SubmissionStage::UploadReport => "upload report",
            SubmissionStage::LinkReport => "link report",
        }
    }
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_missing_gets_hint() {
        let err = AuditError::from(BackendError::BucketNotFound("Bucket not found".into()));
        let message = err.user_message();
        assert!(message.contains("Bucket not found"));
        assert!(message.contains("field-ops-photos"));
        assert!(message.contains("field-ops-reports"));
    }

    #[test]
    fn test_incomplete_reports_one_based_item() {
        let err = AuditError::Incomplete {
            index: 2,
            issues: vec![ItemIssue::MissingValue, ItemIssue::MissingNote],
        };
        let text = err.to_string();
        assert!(text.starts_with("Item 3 is incomplete"), "{}", text);
        assert!(text.contains("note"), "{}", text);
    }

    #[test]
    fn test_other_errors_have_no_hint() {
        let err = AuditError::MissingSignature;
        assert_eq!(err.user_message(), "A signature is required before submitting");
    }
}
