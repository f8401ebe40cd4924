use std::path::PathBuf;

use thiserror::Error;

use crate::models::DatasetId;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("dataset {dataset} is unavailable at {}: {source}", .path.display())]
    DataUnavailable {
        dataset: DatasetId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset {dataset} line {line}: {reason}")]
    SchemaMismatch {
        dataset: DatasetId,
        line: u64,
        reason: String,
    },

    #[error("{operation}: need at least {required} records, got {actual}")]
    InsufficientData {
        operation: String,
        required: usize,
        actual: usize,
    },

    #[error("{operation}: set is empty")]
    EmptySet { operation: String },
}

impl AnalysisError {
    pub fn insufficient(operation: impl Into<String>, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            operation: operation.into(),
            required,
            actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
