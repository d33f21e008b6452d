//! Path normalization shared by every converter.
//!
//! Canonical form: repository-relative, `/`-separated, no leading `./`
//! or `/`, no empty segments. Git reports changed files in exactly this
//! form, so converters must produce it too.

/// Normalize separators to `/` and collapse empty segments.
#[must_use]
pub fn normalize_slashes(path: &str) -> String {
    let replaced = if path.contains('\\') {
        path.replace('\\', "/")
    } else {
        path.to_string()
    };
    if !replaced.contains("//") {
        return replaced;
    }
    let leading = if replaced.starts_with('/') { "/" } else { "" };
    let joined = replaced
        .split('/')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    format!("{leading}{joined}")
}

/// Strip `./` prefixes and leading slashes from an already relative path.
#[must_use]
pub fn normalize_rel_path(path: &str) -> String {
    let normalized = normalize_slashes(path);
    let mut rest = normalized.as_str();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }
    rest.to_string()
}

/// Make a tool-reported path relative to the workspace root.
///
/// Absolute paths under `root` lose the root prefix. Relative paths are
/// taken as already workspace-relative. Absolute paths outside `root`
/// come back with separators normalized only, so they never match a
/// changed file.
#[must_use]
pub fn relative_to_root(raw: &str, root: &str) -> String {
    let path = normalize_slashes(raw.trim());
    let root = normalize_slashes(root.trim());
    let root = root.trim_end_matches('/');

    if !root.is_empty() && root != "." {
        if let Some(rest) = path.strip_prefix(root) {
            if rest.is_empty() {
                return String::new();
            }
            if rest.starts_with('/') {
                return normalize_rel_path(rest);
            }
        }
    }

    if is_absolute(&path) {
        path
    } else {
        normalize_rel_path(&path)
    }
}

/// Join a source root and a package-qualified file path.
#[must_use]
pub fn join_source(src_root: &str, rel: &str) -> String {
    let root = normalize_rel_path(src_root.trim());
    let root = root.trim_end_matches('/');
    let rel = normalize_rel_path(rel.trim());
    if root.is_empty() || root == "." {
        rel
    } else {
        format!("{root}/{rel}")
    }
}

fn is_absolute(path: &str) -> bool {
    if path.starts_with('/') {
        return true;
    }
    // Windows drive letter, e.g. `C:/work`.
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}
