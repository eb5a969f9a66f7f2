//! Node.js backed [`FieldsTransformer`].
//!
//! A `fields.js` file is a CommonJS module exporting either an array of field
//! definitions or a (possibly async) function returning one. It is evaluated
//! in a child `node` process; the JSON printed on stdout is validated and
//! written as `fields.json`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, error};

use crate::classify::FIELDS_DESCRIPTOR_FILE;
use crate::contract::{FieldsError, FieldsTransformer};

const LOADER: &str = r#"
const path = require('path');
const [file, rawOptions] = process.argv.slice(1);
const options = JSON.parse(rawOptions || '[]');
Promise.resolve()
  .then(() => {
    let exported = require(path.resolve(file));
    if (exported && exported.default !== undefined) exported = exported.default;
    return typeof exported === 'function' ? exported(options) : exported;
  })
  .then((fields) => {
    process.stdout.write(JSON.stringify(fields === undefined ? null : fields));
  })
  .catch((err) => {
    process.stderr.write(String((err && err.stack) || err));
    process.exit(1);
  });
"#;

pub struct NodeFieldsTransformer {
    node: PathBuf,
}

impl Default for NodeFieldsTransformer {
    fn default() -> Self {
        Self::new("node")
    }
}

impl NodeFieldsTransformer {
    pub fn new(node: impl Into<PathBuf>) -> Self {
        Self { node: node.into() }
    }
}

impl FieldsTransformer for NodeFieldsTransformer {
    fn convert(
        &self,
        scripted: &Path,
        write_dir: &Path,
        field_options: &[String],
    ) -> Result<PathBuf, FieldsError> {
        let options = serde_json::to_string(field_options).map_err(|source| FieldsError::Malformed {
            path: scripted.to_path_buf(),
            source,
        })?;

        debug!(file = %scripted.display(), node = %self.node.display(), "Evaluating scripted fields");
        let output = Command::new(&self.node)
            .arg("-e")
            .arg(LOADER)
            .arg(scripted)
            .arg(&options)
            .output()
            .map_err(|source| {
                error!(error = ?source, node = %self.node.display(), "Failed to launch node");
                FieldsError::Spawn {
                    path: scripted.to_path_buf(),
                    source,
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(file = %scripted.display(), status = ?output.status, "Scripted fields evaluation failed");
            return Err(FieldsError::Script {
                path: scripted.to_path_buf(),
                stderr,
            });
        }

        let fields: serde_json::Value =
            serde_json::from_slice(&output.stdout).map_err(|source| FieldsError::Malformed {
                path: scripted.to_path_buf(),
                source,
            })?;
        if !fields.is_array() {
            return Err(FieldsError::NotAnArray {
                path: scripted.to_path_buf(),
            });
        }

        let rendered = serde_json::to_vec_pretty(&fields).map_err(|source| FieldsError::Malformed {
            path: scripted.to_path_buf(),
            source,
        })?;
        let target = write_dir.join(FIELDS_DESCRIPTOR_FILE);
        fs::create_dir_all(write_dir)
            .and_then(|_| fs::write(&target, rendered))
            .map_err(|source| FieldsError::Write {
                path: target.clone(),
                source,
            })?;

        Ok(target)
    }
}
