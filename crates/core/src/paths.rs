//! Remote path helpers.
//!
//! Remote paths are plain `/`-separated strings. They are used as identity
//! keys in the download history, so every path goes through
//! [`normalize_remote_path`] before it is compared or stored.

/// Collapse runs of `/` into a single separator.
///
/// `a//b` and `a/b` name the same remote object. A trailing separator is
/// preserved because WebDAV servers use it to mark collections.
pub fn normalize_remote_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if !previous_slash {
                out.push(ch);
            }
            previous_slash = true;
        } else {
            out.push(ch);
            previous_slash = false;
        }
    }
    out
}

/// Join a remote directory and a child name with exactly one separator.
pub fn join_remote(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    normalize_remote_path(&format!("{dir}/{name}"))
}

/// Last path component, ignoring a trailing separator.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Parent directory of a remote path (`/` for top-level entries).
pub fn parent(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}

/// File name without its final extension.
pub fn file_stem(name: &str) -> &str {
    let name = file_name(name);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Case-insensitive extension check (`ext` without the leading dot).
pub fn has_extension(name: &str, ext: &str) -> bool {
    let name = file_name(name);
    match name.rfind('.') {
        Some(idx) => name[idx + 1..].eq_ignore_ascii_case(ext),
        None => false,
    }
}
