//! Scope enforcement and local path derivation.
//!
//! Two jobs live here, both pure functions consulted by the dispatcher:
//! deciding whether a discovered URL is inside the crawl scope, and turning a
//! URL (plus an optional server-supplied filename) into a filesystem path
//! that mirrors the remote directory layout. URLs and Content-Disposition
//! headers are attacker-controlled, so every path segment is sanitized
//! independently before it touches the filesystem.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

/// Fallback name for directory-like URLs that serve a document without
/// declaring a filename.
pub const FALLBACK_DOCUMENT_NAME: &str = "index_doc.pdf";

/// Returns true iff `candidate` lies inside `scope_root`.
///
/// This is a strict prefix test on the string form of the URL, not a
/// semantic path comparison. Any `#fragment` on the candidate is ignored,
/// and the root is normalized to end with `/` before comparing, so callers
/// may pass the root with or without a trailing slash.
pub fn is_in_scope(candidate: &str, scope_root: &str) -> bool {
    let candidate = candidate
        .split_once('#')
        .map(|(base, _)| base)
        .unwrap_or(candidate);

    // Dot-dot segments would satisfy the prefix test while pointing outside
    // the scope once a server resolves them.
    if candidate.contains("/../") || candidate.ends_with("/..") {
        return false;
    }

    if scope_root.ends_with('/') {
        candidate.starts_with(scope_root)
    } else {
        let mut root = String::with_capacity(scope_root.len() + 1);
        root.push_str(scope_root);
        root.push('/');
        candidate.starts_with(&root)
    }
}

/// Normalizes a scope root so it ends with a single `/`.
pub fn normalize_root(root: &str) -> String {
    if root.ends_with('/') {
        root.to_string()
    } else {
        format!("{root}/")
    }
}

/// Extracts the filename from a `Content-Disposition` header value, e.g.
/// `attachment; filename="Annual Report 2024.pdf"`. Quoted and unquoted
/// forms are both accepted.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let re = Regex::new(r#"filename="?([^";]+)"?"#).ok()?;
    let name = re.captures(header)?.get(1)?.as_str().trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Strips a single path segment down to something safe on the most
/// restrictive supported filesystem: control characters are removed and the
/// Windows-reserved set is replaced with `_`. Empty and dot-only results
/// collapse to `_`, so no segment can ever step out of its directory.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}

fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Whether a path basename looks like a file rather than a directory.
fn has_extension(basename: &str) -> bool {
    basename.contains('.')
}

/// Derives the local storage path for `url` under `base_dir`, mirroring the
/// remote host and directory structure.
///
/// Filename precedence:
///
/// 1. the server-declared `Content-Disposition` filename, if any
/// 2. the URL's own basename, when it carries an extension-like suffix
/// 3. [`FALLBACK_DOCUMENT_NAME`] for directory-like URLs
///
/// Percent-encoding is decoded before sanitization so encoded traversal
/// tricks (`%2e%2e`) are neutralized along with literal `.`/`..` segments.
/// Returns `None` only when `url` does not parse as an absolute URL.
pub fn local_path_for(base_dir: &Path, url: &str, disposition: Option<&str>) -> Option<PathBuf> {
    let parsed = Url::parse(url).ok()?;
    // Mirror the full authority so crawls of different ports never collide.
    let host_raw = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => "unknown-host".to_string(),
    };
    let host = sanitize_component(&host_raw);

    let decoded_path = decode_segment(parsed.path());
    let trimmed = decoded_path.trim_start_matches('/');
    let basename = trimmed.rsplit('/').next().unwrap_or("");

    // A trailing file-like segment belongs to the filename, not the mirrored
    // directory tree.
    let dir_part = if has_extension(basename) {
        match trimmed.rsplit_once('/') {
            Some((dirs, _)) => dirs,
            None => "",
        }
    } else {
        trimmed
    };

    let mut path = base_dir.join(host);
    for segment in dir_part.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        path.push(sanitize_component(segment));
    }

    let filename = disposition
        .and_then(filename_from_disposition)
        .or_else(|| {
            let raw = parsed.path().rsplit('/').next().unwrap_or("");
            let decoded = decode_segment(raw);
            has_extension(&decoded).then_some(decoded)
        })
        .unwrap_or_else(|| FALLBACK_DOCUMENT_NAME.to_string());

    // Sanitization last: a decoded "../../etc/passwd" disposition becomes a
    // single flat component.
    path.push(sanitize_component(&filename));
    Some(path)
}
