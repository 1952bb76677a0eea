//! Source/target path rules shared by every entry point.
//!
//! A source file is "rendered" once a PNG with the same stem exists next to
//! it. Nothing else (timestamps, metadata) is consulted.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into when walking a tree.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", ".next", "dist", "build"];

/// The two kinds of widget source the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// React component (`.jsx` / `.js`) compiled, server-rendered and hydrated
    Jsx,
    /// Standalone document (`.html` / `.htm`) loaded straight from disk
    Html,
}

impl SourceKind {
    /// Classify a path by extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = extension_of(path);
        match ext.as_str() {
            ".jsx" | ".js" => Ok(SourceKind::Jsx),
            ".html" | ".htm" => Ok(SourceKind::Html),
            _ => Err(Error::UnsupportedExtension(ext)),
        }
    }

    /// Whether a file belongs in a batch of this kind.
    ///
    /// JSX batches only pick up `.jsx`; plain `.js` files in a results tree are
    /// usually helpers rather than widgets.
    pub fn batch_accepts(self, path: &Path) -> bool {
        let ext = extension_of(path);
        match self {
            SourceKind::Jsx => ext == ".jsx",
            SourceKind::Html => ext == ".html" || ext == ".htm",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Jsx => "jsx",
            SourceKind::Html => "html",
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Derive the PNG sibling of a source file: same directory, extension replaced.
pub fn get_png_path(source: &Path) -> PathBuf {
    source.with_extension("png")
}

/// Whether the derived PNG already exists.
pub fn png_exists(source: &Path) -> bool {
    get_png_path(source).is_file()
}

/// `file://` URL for a local file, made absolute first.
pub fn file_url(path: &Path) -> Result<String> {
    let abs = absolute(path)?;
    url::Url::from_file_path(&abs)
        .map(|u| u.to_string())
        .map_err(|_| Error::Other(format!("Cannot build file URL for {}", abs.display())))
}

/// Resolve `path` against the current directory without touching symlinks.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Every regular file under `root` accepted by `keep`, sorted by path.
pub fn walk_files<F>(root: &Path, mut keep: F) -> Result<Vec<PathBuf>>
where
    F: FnMut(&Path) -> bool,
{
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| !is_skipped_dir(e)) {
        let entry = entry.map_err(|e| Error::Other(format!("Failed to walk {}: {}", root.display(), e)))?;
        if entry.file_type().is_file() && keep(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
