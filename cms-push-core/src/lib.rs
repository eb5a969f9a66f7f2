#![doc = "cms-push-core: upload pipeline for cms-push."]

//! This crate holds everything needed to push a local folder to a remote
//! content store, minus the transport: walking and filtering the tree,
//! classifying files into ordered phases, converting scripted field
//! definitions, and uploading under a bounded pool with a single retry pass.
//!
//! # Usage
//! Implement [`contract::Uploader`] for the remote store (the `cms-push`
//! binary ships an HTTP client) and call [`upload_folder::upload_folder`].

pub mod classify;
pub mod config;
pub mod contract;
pub mod destination;
pub mod error;
pub mod fields;
pub mod pool;
pub mod scan;
pub mod upload_folder;

pub use config::{UploadFolderOptions, DEFAULT_CONCURRENCY};
pub use contract::{BuildMode, ErrorKind, FieldsTransformer, QueryOptions, UploadError, Uploader};
pub use error::UploadFolderError;
pub use fields::NodeFieldsTransformer;
pub use pool::UploadPool;
pub use upload_folder::{has_upload_errors, upload_folder, UploadOutcome, UploadStatus};
