use thiserror::Error;

use crate::types::CurationStatus;

/// Why a curation run stopped short of publishing.
#[derive(Error, Debug)]
pub enum CuratorError {
    #[error("no topics discovered")]
    NoTopicsDiscovered,

    #[error("no relevant topics")]
    NoRelevantTopics,

    #[error("no relevant topics: all {checked} candidates duplicate recent posts")]
    AllDuplicates { checked: usize },

    #[error("research failed: {0}")]
    Research(String),

    #[error("quality evaluation failed: {0}")]
    QualityEvaluation(String),

    #[error("quality gate rejected: {feedback}")]
    QualityRejected { feedback: String },

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("daily limit reached")]
    QuotaExceeded { published: usize, limit: u32 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CuratorError {
    /// Store failures and unexpected errors need an operator; the rest are
    /// normal reasons to sit out an hour.
    pub fn status(&self) -> CurationStatus {
        match self {
            CuratorError::Publish(_) | CuratorError::Internal(_) => CurationStatus::Failed,
            _ => CurationStatus::Skipped,
        }
    }
}
