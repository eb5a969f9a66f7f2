use std::path::{Component, Path};

/// Joins `relative` onto `destination_root` as a forward-slash path.
///
/// The result does not depend on the host's separator: backslashes are
/// normalized, `.` segments vanish and `..` pops the previous segment.
/// A leading `/` on the destination root is preserved.
pub fn destination_path(destination_root: &str, relative: &Path) -> String {
    let root = destination_root.replace('\\', "/");
    let relative = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().replace('\\', "/")),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    let mut segments: Vec<&str> = Vec::new();
    for segment in root.split('/').chain(relative.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if root.starts_with('/') {
        format!("/{joined}")
    } else {
        joined
    }
}
