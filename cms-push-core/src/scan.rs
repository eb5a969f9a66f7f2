//! Enumerating the source tree and deciding which files are eligible for upload.
//!
//! Eligibility is two checks, cheapest first: the extension must be on the
//! allow-list, then the file must not match any ignore rule. Ignore rules use
//! gitignore syntax and are rooted at the source folder.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::UploadFolderError;

/// Extensions the remote store accepts.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "css", "js", "json", "html", "txt", "md", "jpg", "jpeg", "png", "gif", "map", "svg", "eot",
    "ttf", "woff", "woff2", "zip",
];

/// Ignore file looked up in the source root when none is configured.
pub const DEFAULT_IGNORE_FILE: &str = ".hsignore";

const DEFAULT_IGNORE_RULES: &[&str] = &[
    "fields.output.json",
    "hubspot.config.yml",
    "hubspot.config.yaml",
    "node_modules",
    ".*",
    "*.log",
    "npm-debug.log*",
    "yarn-debug.log*",
    "yarn-error.log*",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
];

/// Recursively lists every file below `root`, in a stable order.
///
/// Directories matched by `rules` are not entered. Ignored files inside
/// visited directories are still listed, so sibling lookups can see them.
/// Symlinks are followed; a dangling link is skipped, a symlink loop is an error.
pub fn walk(root: &Path, rules: &IgnoreRules) -> Result<Vec<PathBuf>, UploadFolderError> {
    let mut files = Vec::new();
    let entries = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let pruned =
                entry.depth() > 0 && entry.file_type().is_dir() && rules.is_ignored(entry.path(), true);
            if pruned {
                debug!(dir = %entry.path().display(), "Skipping ignored directory");
            }
            !pruned
        });
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_dangling_link(&e) => {
                warn!(path = ?e.path(), error = %e, "Skipping dangling symlink");
                continue;
            }
            Err(source) => {
                return Err(UploadFolderError::Walk {
                    path: root.to_path_buf(),
                    source,
                })
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_dangling_link(err: &walkdir::Error) -> bool {
    err.loop_ancestor().is_none()
        && err
            .io_error()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}

/// Lowercased extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn is_allowed_extension(path: &Path, extra: &[String]) -> bool {
    let Some(ext) = extension_of(path) else {
        return false;
    };
    ALLOWED_EXTENSIONS.contains(&ext.as_str())
        || extra
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
}

/// Gitignore-style rules: the built-in defaults plus the user's ignore file.
pub struct IgnoreRules {
    matcher: Gitignore,
}

impl IgnoreRules {
    /// Builds the rules for `root`.
    ///
    /// A configured `ignore_file` must exist; a relative one is resolved against `root`.
    /// Without one, `<root>/.hsignore` is used when present.
    pub fn load(root: &Path, ignore_file: Option<&Path>) -> Result<Self, UploadFolderError> {
        let mut builder = GitignoreBuilder::new(root);
        for rule in DEFAULT_IGNORE_RULES {
            builder
                .add_line(None, rule)
                .map_err(|source| UploadFolderError::IgnoreRules {
                    path: root.to_path_buf(),
                    source,
                })?;
        }

        let user_file = match ignore_file {
            Some(path) => Some(root.join(path)),
            None => Some(root.join(DEFAULT_IGNORE_FILE)).filter(|p| p.is_file()),
        };
        if let Some(user_file) = user_file {
            if let Some(source) = builder.add(&user_file) {
                return Err(UploadFolderError::IgnoreRules {
                    path: user_file,
                    source,
                });
            }
            debug!(ignore_file = %user_file.display(), "Loaded ignore rules");
        }

        let matcher = builder
            .build()
            .map_err(|source| UploadFolderError::IgnoreRules {
                path: root.to_path_buf(),
                source,
            })?;
        Ok(Self { matcher })
    }

    /// `path` must lie below the root the rules were loaded for.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }
}

/// Applies the extension allow-list, then the ignore rules.
pub fn filter_eligible(files: &[PathBuf], extra_extensions: &[String], rules: &IgnoreRules) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|path| {
            let allowed = is_allowed_extension(path, extra_extensions);
            if !allowed {
                debug!(file = %path.display(), "Skipping file with unsupported extension");
            }
            allowed
        })
        .filter(|path| {
            let ignored = rules.is_ignored(path, false);
            if ignored {
                debug!(file = %path.display(), "Skipping ignored file");
            }
            !ignored
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("main.css"), b"body {}").unwrap();
        fs::write(root.join("README.MD"), b"# hi").unwrap();
        fs::write(root.join("build.exe"), b"MZ").unwrap();
        fs::write(root.join(".DS_Store"), b"").unwrap();
        fs::write(root.join("debug.log"), b"").unwrap();

        fs::create_dir_all(root.join("node_modules").join("lib")).unwrap();
        fs::write(root.join("node_modules").join("lib").join("index.js"), b"").unwrap();

        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::write(root.join("drafts").join("page.html"), b"<p/>").unwrap();

        fs::create_dir_all(root.join("templates")).unwrap();
        fs::write(root.join("templates").join("page.html"), b"<p/>").unwrap();

        dir
    }

    #[test]
    fn walk_lists_nested_files_and_skips_ignored_directories() {
        let dir = create_test_tree();
        let rules = IgnoreRules::load(dir.path(), None).unwrap();
        let files = walk(dir.path(), &rules).unwrap();

        assert_eq!(files.len(), 7);
        assert!(files.iter().all(|p| p.is_file()));
        assert!(files.contains(&dir.path().join("templates").join("page.html")));
        // Ignored files in visited directories stay listed.
        assert!(files.contains(&dir.path().join(".DS_Store")));
        assert!(!files.iter().any(|p| p.starts_with(dir.path().join("node_modules"))));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlinks_do_not_abort_the_walk() {
        let dir = create_test_tree();
        let bin = dir.path().join("node_modules").join(".bin");
        fs::create_dir_all(&bin).unwrap();
        std::os::unix::fs::symlink("../gone/cli.js", bin.join("tool")).unwrap();
        std::os::unix::fs::symlink("missing.css", dir.path().join("broken.css")).unwrap();

        let rules = IgnoreRules::load(dir.path(), None).unwrap();
        let files = walk(dir.path(), &rules).unwrap();

        assert!(files.contains(&dir.path().join("main.css")));
        assert!(!files.contains(&dir.path().join("broken.css")));
    }

    #[test]
    fn extension_check_is_case_insensitive_and_extendable() {
        assert!(is_allowed_extension(Path::new("a/README.MD"), &[]));
        assert!(!is_allowed_extension(Path::new("build.exe"), &[]));
        assert!(!is_allowed_extension(Path::new("Makefile"), &[]));
        assert!(is_allowed_extension(
            Path::new("font.OTF"),
            &[".otf".to_string()]
        ));
    }

    #[test]
    fn default_rules_drop_hidden_logs_and_node_modules() {
        let dir = create_test_tree();
        let rules = IgnoreRules::load(dir.path(), None).unwrap();

        assert!(rules.is_ignored(&dir.path().join(".DS_Store"), false));
        assert!(rules.is_ignored(&dir.path().join("debug.log"), false));
        assert!(rules.is_ignored(&dir.path().join("node_modules"), true));
        assert!(rules.is_ignored(&dir.path().join("node_modules").join("lib").join("index.js"), false));
        assert!(!rules.is_ignored(&dir.path().join("main.css"), false));
    }

    #[test]
    fn user_ignore_file_is_picked_up_from_root() {
        let dir = create_test_tree();
        fs::write(dir.path().join(DEFAULT_IGNORE_FILE), "drafts/\n").unwrap();

        let rules = IgnoreRules::load(dir.path(), None).unwrap();
        let files = walk(dir.path(), &rules).unwrap();
        let eligible = filter_eligible(&files, &[], &rules);

        let mut names: Vec<String> = eligible
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        names.sort();
        assert_eq!(names, vec!["README.MD", "main.css", "templates/page.html"]);
    }

    #[test]
    fn relative_ignore_file_is_resolved_against_the_root() {
        let dir = create_test_tree();
        fs::write(dir.path().join("deploy.ignore"), "templates/\n").unwrap();

        let rules = IgnoreRules::load(dir.path(), Some(Path::new("deploy.ignore"))).unwrap();
        assert!(rules.is_ignored(&dir.path().join("templates").join("page.html"), false));
        assert!(!rules.is_ignored(&dir.path().join("drafts").join("page.html"), false));
    }

    #[test]
    fn configured_ignore_file_must_exist() {
        let dir = create_test_tree();
        let missing = dir.path().join("nope.ignore");
        let result = IgnoreRules::load(dir.path(), Some(&missing));
        assert!(matches!(result, Err(UploadFolderError::IgnoreRules { .. })));
    }
}
