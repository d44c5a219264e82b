//! Browsing what the downloader has written to disk

use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const DOWNLOADS_ROUTE: &str = "/gallery-dl/downloads";

#[derive(Debug, Error)]
pub enum DownloadsError {
    #[error("Missing download path.")]
    MissingPath,

    #[error("Invalid download path.")]
    OutsideRoot,

    #[error("Download not found.")]
    NotFound,

    #[error("Unable to scan download directory: {0}")]
    Scan(#[from] walkdir::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadEntry {
    pub name: String,
    /// Relative to the download root, `/`-separated
    pub path: String,
    pub url: String,
}

/// Every file under `root`, sorted case-insensitively by relative path.
/// `max_depth` limits how many directory levels below the root are listed;
/// `Some(0)` lists only files directly in it. A missing root lists nothing.
pub fn list_downloads(root: &Path, max_depth: Option<usize>) -> Result<Vec<DownloadEntry>, DownloadsError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(root).min_depth(1).follow_links(false);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth + 1);
    }

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };

        let path = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");

        entries.push(DownloadEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            url: format!("{DOWNLOADS_ROUTE}/{}", encode_path(&path)),
            path,
        });
    }

    entries.sort_by_cached_key(|e| e.path.to_lowercase());
    Ok(entries)
}

/// Map a request path onto a regular file inside `root`
pub fn resolve_download(root: &Path, relative: &str) -> Result<PathBuf, DownloadsError> {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        return Err(DownloadsError::MissingPath);
    }

    let root = root.canonicalize().map_err(|_| DownloadsError::NotFound)?;
    let target = root
        .join(relative)
        .canonicalize()
        .map_err(|_| DownloadsError::NotFound)?;

    if !target.starts_with(&root) {
        return Err(DownloadsError::OutsideRoot);
    }
    if !target.is_file() {
        return Err(DownloadsError::NotFound);
    }
    Ok(target)
}

/// Percent-encode everything outside the RFC 3986 unreserved set, keeping `/`
pub fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
