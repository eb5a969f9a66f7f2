use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::contract::QueryOptions;

/// Upper bound of uploads in flight when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Per-run knobs of [`crate::upload_folder::upload_folder`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadFolderOptions {
    /// Evaluate `fields.js` inside bundles and upload the generated `fields.json`.
    pub convert_fields: bool,
    /// Also keep each generated descriptor as `fields.output.json` next to its `fields.js`.
    pub save_output: bool,
    /// Passed as the argument of an exported fields function.
    pub field_options: Vec<String>,
    /// Extensions accepted on top of the built-in allow-list.
    pub extra_extensions: Vec<String>,
    /// Ignore file to use instead of `<source>/.hsignore`; relative paths start at the source folder.
    pub ignore_file: Option<PathBuf>,
    #[serde(skip)]
    pub query: QueryOptions,
}

impl Default for UploadFolderOptions {
    fn default() -> Self {
        Self {
            convert_fields: true,
            save_output: false,
            field_options: Vec::new(),
            extra_extensions: Vec::new(),
            ignore_file: None,
            query: QueryOptions::default(),
        }
    }
}

impl UploadFolderOptions {
    pub fn trace_loaded(&self) {
        info!(
            convert_fields = self.convert_fields,
            save_output = self.save_output,
            build_mode = ?self.query.build_mode,
            "Loaded upload options"
        );
        debug!(?self, "Upload options loaded (full debug)");
    }
}
