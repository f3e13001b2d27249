//! Lexical path helpers for build-relative paths
//!
//! Build graphs store paths as `/`-separated strings relative to the output
//! directory. These helpers work on those strings without touching the
//! filesystem.

/// Lexically normalize a `/`-separated path.
///
/// Removes `.` segments and empty segments and folds `name/..` pairs. Leading
/// `..` segments of relative paths are kept. An empty result becomes `.`.
///
/// # Examples
///
/// ```
/// use supersize::paths::normalize_path;
///
/// assert_eq!(normalize_path("obj/base/../foo.o"), "obj/foo.o");
/// assert_eq!(normalize_path("../../third_party/./a.cc"), "../../third_party/a.cc");
/// assert_eq!(normalize_path("a/.."), ".");
/// ```
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Directory part of a `/`-separated path, empty when there is none
pub fn dirname(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}

/// Final segment of a `/`-separated path
pub fn basename(path: &str) -> &str {
    path.rfind('/').map_or(path, |i| &path[i + 1..])
}

/// Join two `/`-separated paths. An empty base yields `path` unchanged.
pub fn join(base: &str, path: &str) -> String {
    if base.is_empty() {
        path.to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }
}
