//! High-level pipeline: pushes a local folder to the remote store.
//!
//! [`upload_folder`] walks the source tree, filters and classifies its files,
//! then uploads them phase by phase through an [`UploadPool`]:
//!
//! 1. `other`, 2. bundle assets, 3. styles and scripts, 4. templates, 5. data.
//!
//! A phase only starts once every upload of the previous phase has finished.
//! Uploads failing with a transient error are queued and retried exactly once
//! after the last phase; the outcomes of those retries are what the pipeline returns.
//!
//! # Error Handling
//! Configuration problems, a malformed `fields.js` and fatal upload errors
//! abort the run and come back as [`UploadFolderError`]. Transient errors never
//! escape; they are folded into the returned [`UploadOutcome`] list.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::classify::{Classifier, LocalFile};
use crate::config::UploadFolderOptions;
use crate::contract::{ErrorKind, FieldsTransformer, QueryOptions, UploadError, Uploader};
use crate::destination::destination_path;
use crate::error::UploadFolderError;
use crate::pool::UploadPool;
use crate::scan::{filter_eligible, walk, IgnoreRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Success,
    Failure,
}

/// Result of a retried upload.
#[derive(Debug)]
pub struct UploadOutcome {
    pub status: UploadStatus,
    pub file: PathBuf,
    pub error: Option<UploadError>,
}

/// One file and where it goes in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub source: PathBuf,
    pub destination: String,
}

impl UploadTask {
    pub fn new(file: &LocalFile, destination_root: &str) -> Self {
        Self {
            source: file.path().to_path_buf(),
            destination: destination_path(destination_root, file.relative()),
        }
    }
}

/// True when any retried upload still failed.
pub fn has_upload_errors(outcomes: &[UploadOutcome]) -> bool {
    outcomes
        .iter()
        .any(|outcome| outcome.status == UploadStatus::Failure)
}

/// Uploads every eligible file below `source_root` to `destination_root`.
///
/// The returned list only describes files whose first attempt failed with a
/// transient error: each appears once, tagged with the result of its single
/// retry. Files that uploaded fine on the first attempt are deliberately not
/// listed, so an empty list means everything was uploaded. Use
/// [`has_upload_errors`] to decide whether the run failed.
pub async fn upload_folder<U>(
    uploader: Arc<U>,
    transformer: &dyn FieldsTransformer,
    pool: &UploadPool,
    account_id: u64,
    source_root: &Path,
    destination_root: &str,
    options: &UploadFolderOptions,
) -> Result<Vec<UploadOutcome>, UploadFolderError>
where
    U: Uploader + ?Sized + 'static,
{
    let root = source_root
        .canonicalize()
        .map_err(|source| UploadFolderError::SourceRoot {
            path: source_root.to_path_buf(),
            source,
        })?;
    info!(
        source = %root.display(),
        destination = destination_root,
        account_id,
        concurrency = pool.limit(),
        "Starting folder upload"
    );

    let rules = IgnoreRules::load(&root, options.ignore_file.as_deref())?;
    let walked = walk(&root, &rules)?;
    let eligible = filter_eligible(&walked, &options.extra_extensions, &rules);
    let enumerated: HashSet<PathBuf> = walked.into_iter().collect();

    // Generated descriptors are uploaded from here and removed when the run ends.
    let scratch = tempfile::tempdir().map_err(UploadFolderError::WriteDir)?;

    let files: Vec<LocalFile> = eligible
        .into_iter()
        .filter_map(|path| LocalFile::new(&root, path))
        .collect();
    let classifier = Classifier::new(
        transformer,
        &enumerated,
        scratch.path(),
        &options.field_options,
        options.convert_fields,
    )
    .save_output(options.save_output);
    let classified = classifier.classify(files)?;
    info!(count = classified.len(), "Classified files for upload");

    let mut retries = Vec::new();
    for (category, batch) in classified.into_batches() {
        if batch.is_empty() {
            continue;
        }
        info!(category = %category, count = batch.len(), "Uploading batch");
        let tasks = batch.iter().map(|file| {
            first_attempt(
                Arc::clone(&uploader),
                account_id,
                UploadTask::new(file, destination_root),
                options.query.clone(),
            )
        });
        let queued = pool.run_batch(tasks).await?;
        retries.extend(queued.into_iter().flatten());
    }

    if retries.is_empty() {
        info!("All files uploaded on the first attempt");
        return Ok(Vec::new());
    }

    info!(count = retries.len(), "Retrying failed uploads");
    let tasks = retries.into_iter().map(|task| {
        retry_attempt(
            Arc::clone(&uploader),
            account_id,
            task,
            options.query.clone(),
        )
    });
    let outcomes = pool.run_batch(tasks).await?;

    drop(scratch);
    Ok(outcomes)
}

/// Returns the task back when it should be retried.
async fn first_attempt<U>(
    uploader: Arc<U>,
    account_id: u64,
    task: UploadTask,
    query: QueryOptions,
) -> Result<Option<UploadTask>, UploadFolderError>
where
    U: Uploader + ?Sized,
{
    match uploader
        .upload(account_id, &task.source, &task.destination, &query)
        .await
    {
        Ok(()) => {
            info!(file = %task.source.display(), destination = %task.destination, "Uploaded file");
            Ok(None)
        }
        Err(e) => match e.kind() {
            ErrorKind::Fatal => {
                error!(file = %task.source.display(), destination = %task.destination, error = %e, "Fatal upload error");
                Err(UploadFolderError::Fatal(e))
            }
            ErrorKind::Transient => {
                warn!(file = %task.source.display(), destination = %task.destination, error = %e, "Upload failed, will retry");
                Ok(Some(task))
            }
        },
    }
}

async fn retry_attempt<U>(
    uploader: Arc<U>,
    account_id: u64,
    task: UploadTask,
    query: QueryOptions,
) -> Result<UploadOutcome, UploadFolderError>
where
    U: Uploader + ?Sized,
{
    match uploader
        .upload(account_id, &task.source, &task.destination, &query)
        .await
    {
        Ok(()) => {
            info!(file = %task.source.display(), destination = %task.destination, "Uploaded file on retry");
            Ok(UploadOutcome {
                status: UploadStatus::Success,
                file: task.source,
                error: None,
            })
        }
        Err(e) => match e.kind() {
            ErrorKind::Fatal => {
                error!(file = %task.source.display(), destination = %task.destination, error = %e, "Fatal upload error on retry");
                Err(UploadFolderError::Fatal(e))
            }
            ErrorKind::Transient => {
                error!(file = %task.source.display(), destination = %task.destination, error = %e, "Upload failed after retry");
                Ok(UploadOutcome {
                    status: UploadStatus::Failure,
                    file: task.source,
                    error: Some(e),
                })
            }
        },
    }
}
