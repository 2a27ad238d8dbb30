//! Typed errors for the cascade, report import and archive layers.
//!
//! Provider and infrastructure failures travel as `anyhow::Error`; these
//! enums cover the cases a caller is expected to act on.

use crate::model::StageId;
use std::path::PathBuf;
use thiserror::Error;

/// Caller errors from the cascade resolver. State is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CascadeError {
    #[error("'{candidate_id}' is not a candidate of the {stage} stage")]
    UnknownCandidate { stage: StageId, candidate_id: String },

    #[error("the {stage} stage has no values to select")]
    SentinelNotSelectable { stage: StageId },

    #[error("select a {upstream} before choosing a {stage}")]
    UpstreamNotSelected { stage: StageId, upstream: StageId },

    #[error("the {stage} stage is still loading")]
    StillLoading { stage: StageId },
}

/// Failures while importing an assessment report file
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Selected invalid format import file: {}", path.display())]
    InvalidFormat { path: PathBuf },

    #[error("Failed to read assessment report '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Assessment report '{}' is outside the import directory", path.display())]
    OutsideImportDirectory { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Saved report '{hash}' not found")]
    NotFound { hash: String },

    #[error("Saved report storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Saved report is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}
