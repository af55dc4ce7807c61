use thiserror::Error;
use crate::utils::types::RecordId;

/// Central error enum for the linkage engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkageError {
    /// Malformed or unparsable field data met while computing a distance
    /// or evaluating a rule over a pair of records.
    #[error("Metric evaluation failed: {0}")]
    MetricEvaluation(String),

    #[error("Field set length mismatch: {left} fields paired with {right}")]
    FieldSetMismatch {
        left: usize,
        right: usize,
    },

    #[error("Record with ID {0} not found")]
    RecordNotFound(RecordId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised (as a panic) when a search structure is queried after
    /// termination. Never returned to callers.
    #[error("Search index unavailable: queried after termination")]
    IndexUnavailable,
}

pub type LinkageResult<T> = Result<T, LinkageError>;
