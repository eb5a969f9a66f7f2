//! Splitting eligible files into the ordered upload phases.
//!
//! Files inside a bundle folder (a directory whose name ends in
//! [`BUNDLE_SUFFIX`]) always land in [`Category::BundleAsset`], whatever their
//! extension. Everything else is classified by extension alone.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::contract::{FieldsError, FieldsTransformer};
use crate::scan::extension_of;

pub const BUNDLE_SUFFIX: &str = ".module";
pub const BUNDLE_METADATA_FILE: &str = "meta.json";
pub const FIELDS_DESCRIPTOR_FILE: &str = "fields.json";
pub const SCRIPTED_FIELDS_FILE: &str = "fields.js";
/// Copy of a generated descriptor kept next to its `fields.js` when output is saved.
pub const SAVED_FIELDS_OUTPUT_FILE: &str = "fields.output.json";

/// Upload phase. Variants are declared in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Other,
    BundleAsset,
    StyleScript,
    Template,
    Data,
}

impl Category {
    pub const ORDER: [Category; 5] = [
        Category::Other,
        Category::BundleAsset,
        Category::StyleScript,
        Category::Template,
        Category::Data,
    ];

    /// Category of a file outside any bundle folder.
    pub fn for_extension(extension: &str) -> Self {
        match extension {
            "js" | "css" => Category::StyleScript,
            "html" => Category::Template,
            "json" => Category::Data,
            _ => Category::Other,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Other => "other",
            Category::BundleAsset => "bundle assets",
            Category::StyleScript => "styles and scripts",
            Category::Template => "templates",
            Category::Data => "data",
        };
        f.write_str(label)
    }
}

/// A file picked up from the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
    relative: PathBuf,
    extension: String,
    bundle: Option<PathBuf>,
}

impl LocalFile {
    /// Returns `None` when `path` does not live below `root`.
    ///
    /// Bundle detection looks at the directories between the file and `root`,
    /// `root` included; folders above the source root never count.
    pub fn new(root: &Path, path: PathBuf) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?.to_path_buf();
        let extension = extension_of(&path).unwrap_or_default();
        let bundle = path
            .ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(root))
            .find(|dir| is_bundle_folder(dir))
            .map(Path::to_path_buf);
        Some(Self {
            path,
            relative,
            extension,
            bundle,
        })
    }

    /// Where the bytes to upload are read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location relative to the source root; decides the destination.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn bundle(&self) -> Option<&Path> {
        self.bundle.as_deref()
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// The same logical file, but read from a generated `artifact`.
    fn replaced_by(&self, artifact: PathBuf) -> Self {
        let name = artifact
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| FIELDS_DESCRIPTOR_FILE.into());
        Self {
            relative: self.relative.with_file_name(name),
            extension: extension_of(&artifact).unwrap_or_default(),
            bundle: self.bundle.clone(),
            path: artifact,
        }
    }
}

fn is_bundle_folder(dir: &Path) -> bool {
    dir.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(BUNDLE_SUFFIX))
}

/// The five upload phases with their files.
#[derive(Debug, Default)]
pub struct ClassifiedFiles {
    batches: [Vec<LocalFile>; 5],
}

impl ClassifiedFiles {
    pub fn push(&mut self, category: Category, file: LocalFile) {
        self.batches[category as usize].push(file);
    }

    pub fn files(&self, category: Category) -> &[LocalFile] {
        &self.batches[category as usize]
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Batches in processing order, empty ones included.
    pub fn into_batches(self) -> impl Iterator<Item = (Category, Vec<LocalFile>)> {
        Category::ORDER.into_iter().zip(self.batches)
    }
}

/// Assigns eligible files to phases, converting scripted fields on the way.
pub struct Classifier<'a> {
    transformer: &'a dyn FieldsTransformer,
    enumerated: &'a HashSet<PathBuf>,
    write_root: &'a Path,
    field_options: &'a [String],
    convert_fields: bool,
    save_output: bool,
}

impl<'a> Classifier<'a> {
    /// `enumerated` is the full walker output and answers sibling lookups.
    /// Generated descriptors are written below `write_root`, mirroring the source layout.
    pub fn new(
        transformer: &'a dyn FieldsTransformer,
        enumerated: &'a HashSet<PathBuf>,
        write_root: &'a Path,
        field_options: &'a [String],
        convert_fields: bool,
    ) -> Self {
        Self {
            transformer,
            enumerated,
            write_root,
            field_options,
            convert_fields,
            save_output: false,
        }
    }

    /// Also copy every generated descriptor to `fields.output.json` next to its script.
    pub fn save_output(mut self, save_output: bool) -> Self {
        self.save_output = save_output;
        self
    }

    /// Fails on the first scripted fields file that cannot be converted.
    pub fn classify(&self, files: Vec<LocalFile>) -> Result<ClassifiedFiles, FieldsError> {
        let mut classified = ClassifiedFiles::default();
        for file in files {
            if let Some((category, file)) = self.classify_file(file)? {
                classified.push(category, file);
            }
        }
        Ok(classified)
    }

    fn classify_file(&self, file: LocalFile) -> Result<Option<(Category, LocalFile)>, FieldsError> {
        if file.bundle().is_none() {
            let category = Category::for_extension(file.extension());
            return Ok(Some((category, file)));
        }

        let name = file.file_name();
        if self.convert_fields && name == SCRIPTED_FIELDS_FILE {
            let write_dir = match file.relative().parent() {
                Some(dir) => self.write_root.join(dir),
                None => self.write_root.to_path_buf(),
            };
            let artifact = self
                .transformer
                .convert(file.path(), &write_dir, self.field_options)?;
            info!(
                file = %file.path().display(),
                output = %artifact.display(),
                "Converted scripted fields"
            );
            if self.save_output {
                self.keep_output(file.path(), &artifact)?;
            }
            return Ok(Some((Category::BundleAsset, file.replaced_by(artifact))));
        }

        if name == BUNDLE_METADATA_FILE {
            return Ok(Some((Category::BundleAsset, file)));
        }

        if file.extension() == "json" {
            if name == FIELDS_DESCRIPTOR_FILE && !self.has_scripted_sibling(&file) {
                return Ok(Some((Category::BundleAsset, file)));
            }
            debug!(file = %file.path().display(), "Dropping JSON file inside bundle folder");
            return Ok(None);
        }

        Ok(Some((Category::BundleAsset, file)))
    }

    fn keep_output(&self, scripted: &Path, artifact: &Path) -> Result<(), FieldsError> {
        let saved = scripted.with_file_name(SAVED_FIELDS_OUTPUT_FILE);
        fs::copy(artifact, &saved).map_err(|source| FieldsError::Write {
            path: saved.clone(),
            source,
        })?;
        debug!(output = %saved.display(), "Saved generated fields");
        Ok(())
    }

    fn has_scripted_sibling(&self, file: &LocalFile) -> bool {
        self.convert_fields
            && self
                .enumerated
                .contains(&file.path().with_file_name(SCRIPTED_FIELDS_FILE))
    }
}
