use std::path::PathBuf;

use crate::contract::{FieldsError, UploadError};

/// Everything that can stop [`crate::upload_folder::upload_folder`] before it produces outcomes.
///
/// Transient upload failures never show up here; they end up in the returned outcome list.
#[derive(Debug, thiserror::Error)]
pub enum UploadFolderError {
    #[error("source folder {path} is not accessible: {source}")]
    SourceRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("invalid ignore rules for {path}: {source}")]
    IgnoreRules {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("failed to create a directory for generated fields: {0}")]
    WriteDir(#[source] std::io::Error),

    #[error(transparent)]
    Fields(#[from] FieldsError),

    /// A fatal error from the upload client, unmodified.
    #[error(transparent)]
    Fatal(UploadError),

    #[error("upload task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("upload pool was closed")]
    PoolClosed,
}
