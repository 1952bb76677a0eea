//! Per-run render coverage of a results tree.

use crate::paths::{png_exists, walk_files};
use crate::{Error, Result};
use std::fmt;
use std::path::Path;

const SOURCE_EXTENSIONS: &[&str] = &["html", "htm", "jsx", "js"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    pub total: usize,
    pub with_png: usize,
}

impl Coverage {
    pub fn missing(&self) -> usize {
        self.total - self.with_png
    }

    pub fn missing_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.missing() as f64 * 100.0 / self.total as f64
        }
    }

    fn add(&mut self, other: &Coverage) {
        self.total += other.total;
        self.with_png += other.with_png;
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} with_png={} missing={} missing%={:.1}%",
            self.total,
            self.with_png,
            self.missing(),
            self.missing_percent()
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    /// One entry per immediate subdirectory of the root, sorted by name
    pub runs: Vec<(String, Coverage)>,
    pub overall: Coverage,
}

impl CoverageReport {
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.runs.iter().map(|(name, c)| format!("{}: {}", name, c)).collect();
        lines.push(format!("OVERALL: {}", self.overall));
        lines
    }
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
}

/// Count sources and rendered PNGs for every run directory under `root`.
pub fn check_coverage(root: &Path) -> Result<CoverageReport> {
    if !root.is_dir() {
        return Err(Error::InputNotFound(root.to_path_buf()));
    }

    let mut runs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            runs.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }
    runs.sort();

    let mut report = CoverageReport::default();
    for (name, dir) in runs {
        let mut coverage = Coverage::default();
        for source in walk_files(&dir, is_source)? {
            coverage.total += 1;
            if png_exists(&source) {
                coverage.with_png += 1;
            }
        }
        report.overall.add(&coverage);
        report.runs.push((name, coverage));
    }
    Ok(report)
}
