//! Remove rendered PNGs from a tree.

use crate::paths::walk_files;
use crate::Result;
use futures::stream::{self, StreamExt};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// How many failures [`CleanReport::error_lines`] shows.
const SHOWN_ERRORS: usize = 5;

#[derive(Debug, Default)]
pub struct CleanReport {
    pub found: usize,
    pub deleted: usize,
    pub errors: Vec<(PathBuf, String)>,
}

impl CleanReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// First few failures, plus a count of the rest.
    pub fn error_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .errors
            .iter()
            .take(SHOWN_ERRORS)
            .map(|(path, e)| format!(" - {}: {}", path.display(), e))
            .collect();
        if self.errors.len() > SHOWN_ERRORS {
            lines.push(format!(" ... and {} more", self.errors.len() - SHOWN_ERRORS));
        }
        lines
    }
}

fn is_png(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

/// Delete every `.png` under `root` with a bounded number of concurrent removals.
pub async fn clean_pngs(root: &Path) -> Result<CleanReport> {
    let files = walk_files(root, is_png)?;
    let found = files.len();
    info!("[clean] Scanning: {}", root.display());
    info!("[clean] Found {} .png file(s)", found);
    if found == 0 {
        return Ok(CleanReport::default());
    }

    let concurrency = (2 * num_cpus::get()).max(4).min(found);
    let errors = Mutex::new(Vec::new());
    let deleted = stream::iter(files)
        .map(|path| async move {
            let res = tokio::fs::remove_file(&path).await;
            (path, res)
        })
        .buffer_unordered(concurrency)
        .filter_map(|(path, res)| {
            let ok = match res {
                Ok(()) => Some(()),
                Err(e) => {
                    errors
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push((path, e.to_string()));
                    None
                }
            };
            async move { ok }
        })
        .count()
        .await;

    let errors = errors.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    let report = CleanReport { found, deleted, errors };
    info!("[clean] Deleted {} file(s)", report.deleted);
    Ok(report)
}
