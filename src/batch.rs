//! Batch rendering over a directory tree.
//!
//! One browser per batch, shared by a bounded set of workers. Workers claim
//! the next file index from a shared counter, so a slow file never holds up
//! the rest of the queue. A failing file is recorded and skipped; only a
//! browser that cannot be launched, or dies mid-batch, fails the batch as a
//! whole.

use crate::browser::WidgetBrowser;
use crate::document::warm_up_document;
use crate::paths::{png_exists, walk_files};
use crate::pipeline::Pipeline;
use crate::registry::{ActiveRenderRegistry, JobResult};
use crate::{Error, MeasuredBox, Result, SourceKind};
use futures::future::join_all;
use log::{info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a batch does with sources whose PNG already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingPng {
    /// Leave them alone
    Skip,
    /// Render them again, overwriting the PNG
    Rerender,
}

impl ExistingPng {
    /// Policy a batch of `kind` uses when the caller does not choose one.
    ///
    /// JSX batches skip rendered files; HTML batches always re-render.
    pub fn default_for(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Jsx => ExistingPng::Skip,
            SourceKind::Html => ExistingPng::Rerender,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Worker count; defaults per kind, see [`default_concurrency`]
    pub concurrency: Option<usize>,
    /// Existing-PNG policy; defaults per kind, see [`ExistingPng::default_for`]
    pub existing: Option<ExistingPng>,
}

impl BatchOptions {
    pub fn with_concurrency(concurrency: Option<usize>) -> Self {
        Self { concurrency, existing: None }
    }
}

/// Per-file result of a batch.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub source: PathBuf,
    pub result: std::result::Result<RenderSuccess, String>,
}

#[derive(Debug, Clone)]
pub struct RenderSuccess {
    pub png: PathBuf,
    pub size: MeasuredBox,
    pub elapsed: Duration,
}

impl RenderOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// `OK <file> -> <png> WxH Nms` or `FAIL <file> <error>`.
    pub fn report_line(&self) -> String {
        match &self.result {
            Ok(s) => format!(
                "OK {} -> {} {} {}ms",
                self.source.display(),
                s.png.display(),
                s.size.size_label(),
                s.elapsed.as_millis()
            ),
            Err(e) => format!("FAIL {} {}", self.source.display(), e),
        }
    }
}

/// Outcomes in completion order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub outcomes: Vec<RenderOutcome>,
}

impl BatchReport {
    pub fn ok_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.ok_count()
    }

    pub fn summary_line(&self) -> String {
        let processed = self.outcomes.len();
        format!(
            "Summary: {}/{} {} completed, OK={} FAIL={}",
            processed,
            self.total,
            percent(processed, self.total),
            self.ok_count(),
            self.failed_count()
        )
    }
}

fn percent(done: usize, total: usize) -> String {
    if total == 0 {
        return "100.0%".to_string();
    }
    format!("{:.1}%", done as f64 * 100.0 / total as f64)
}

/// Workers for a batch of `file_count` files.
///
/// HTML pages are cheap to open, so HTML batches oversubscribe the CPUs; JSX
/// batches also run esbuild and node per file and stay at one worker per CPU.
pub fn default_concurrency(kind: SourceKind, file_count: usize, cpus: usize) -> usize {
    let cpus = cpus.max(1);
    let workers = match kind {
        SourceKind::Html => (2 * cpus).max(4),
        SourceKind::Jsx => cpus,
    };
    workers.min(file_count).max(1)
}

/// Sources under `root` eligible for a batch of `kind`.
pub fn collect_sources(root: &Path, kind: SourceKind, existing: ExistingPng) -> Result<Vec<PathBuf>> {
    walk_files(root, |path| {
        kind.batch_accepts(path) && (existing == ExistingPng::Rerender || !png_exists(path))
    })
}

impl Pipeline {
    /// Render every `.jsx` under `dir` that has no PNG yet.
    pub async fn render_jsx_batch(&self, dir: &Path, concurrency: Option<usize>) -> Result<BatchReport> {
        self.render_batch(dir, SourceKind::Jsx, BatchOptions::with_concurrency(concurrency)).await
    }

    /// Render every `.html`/`.htm` under `dir`, overwriting existing PNGs.
    pub async fn render_html_batch(&self, dir: &Path, concurrency: Option<usize>) -> Result<BatchReport> {
        self.render_batch(dir, SourceKind::Html, BatchOptions::with_concurrency(concurrency)).await
    }

    pub async fn render_batch(&self, dir: &Path, kind: SourceKind, options: BatchOptions) -> Result<BatchReport> {
        let tag = format!("[render-{}-batch]", kind.label());
        let dir = crate::paths::absolute(dir)?;
        let existing = options.existing.unwrap_or_else(|| ExistingPng::default_for(kind));
        let files = collect_sources(&dir, kind, existing)?;
        let total = files.len();
        if total == 0 {
            info!("{} No .{} files to render under: {}", tag, kind.label(), dir.display());
            return Ok(BatchReport::default());
        }

        let concurrency = match options.concurrency {
            Some(0) => return Err(Error::ConfigError("concurrency must be at least 1".into())),
            Some(n) => n.min(total),
            None => default_concurrency(kind, total, num_cpus::get()),
        };
        info!("{} Folder: {}", tag, dir.display());
        info!("{} Files: {}", tag, total);
        info!("{} Concurrency: {}", tag, concurrency);

        let browser = self.launch().await?;
        if self.config().warm_up {
            self.warm_up(Arc::clone(&browser), kind).await;
        }

        let queue = WorkQueue {
            files: &files,
            next: AtomicUsize::new(0),
            outcomes: Mutex::new(Vec::with_capacity(total)),
            fatal: Mutex::new(None),
            tag: &tag,
        };
        join_all((0..concurrency).map(|_| self.worker(&browser, &queue))).await;

        if let Err(e) = browser.close() {
            warn!("{} Failed to close browser: {}", tag, e);
        }

        let WorkQueue { outcomes, fatal, .. } = queue;
        if let Some(e) = fatal.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()) {
            return Err(e);
        }
        let outcomes = outcomes.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        let report = BatchReport { total, outcomes };
        for outcome in &report.outcomes {
            info!("{} {}", tag, outcome.report_line());
        }
        info!("{} {}", tag, report.summary_line());
        Ok(report)
    }

    /// Batch several directories, one after the other.
    ///
    /// Each directory runs `kinds` in order as one job registered in
    /// `registry` under its absolute path, and finishes (browser closed)
    /// before the next one starts. A directory listed twice runs once; one
    /// whose key another caller already has running is awaited instead of
    /// started. Returns each directory key with its job result.
    pub async fn render_dirs(
        &self,
        registry: &ActiveRenderRegistry,
        dirs: &[PathBuf],
        kinds: &[SourceKind],
        options: BatchOptions,
    ) -> Result<Vec<(String, JobResult)>> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for dir in dirs {
            let dir = crate::paths::absolute(dir)?;
            let key = dir.display().to_string();
            if !seen.insert(key.clone()) {
                info!("[batch] {} already listed", key);
                continue;
            }

            let pipeline = self.clone();
            let kinds = kinds.to_vec();
            let (job, started) = registry.start(&key, async move {
                for kind in kinds {
                    pipeline.render_batch(&dir, kind, options).await.map_err(|e| e.to_string())?;
                }
                Ok(())
            });
            if !started {
                info!("[batch] {} is already running, waiting for it", key);
            }
            results.push((key, job.await));
        }
        Ok(results)
    }

    async fn worker(&self, browser: &Arc<dyn WidgetBrowser>, queue: &WorkQueue<'_>) {
        while !queue.stopped() {
            let i = queue.next.fetch_add(1, Ordering::SeqCst);
            let Some(source) = queue.files.get(i) else { break };
            let result = match SourceKind::from_path(source) {
                Ok(kind) => self.render_on(Arc::clone(browser), source, kind).await,
                Err(e) => Err(e),
            };
            let result = match result {
                Ok(c) => Ok(RenderSuccess { png: c.png, size: c.size, elapsed: c.elapsed }),
                Err(e) if e.is_infrastructure() => {
                    warn!("{} Stopping batch at {}: {}", queue.tag, source.display(), e);
                    queue.stop(e);
                    break;
                }
                Err(e) => Err(e.to_string()),
            };
            queue.record(RenderOutcome { source: source.clone(), result });
        }
    }

    /// Load the CDN scripts once so the first real pages hit a warm cache.
    async fn warm_up(&self, browser: Arc<dyn WidgetBrowser>, kind: SourceKind) {
        let html = warm_up_document(self.config().tailwind_cdn.as_deref(), kind == SourceKind::Html);
        let timeout = self.config().load_timeout();
        let res = tokio::task::spawn_blocking(move || {
            let page = browser.open_page()?;
            let loaded = page.set_content(&html, timeout);
            page.close()?;
            loaded
        })
        .await;
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Warm-up page failed (ignored): {}", e),
            Err(e) => warn!("Warm-up task failed (ignored): {}", e),
        }
    }
}

/// State shared by the workers of one batch.
struct WorkQueue<'a> {
    files: &'a [PathBuf],
    next: AtomicUsize,
    outcomes: Mutex<Vec<RenderOutcome>>,
    /// First error that makes further work pointless (the browser went away)
    fatal: Mutex<Option<Error>>,
    tag: &'a str,
}

impl WorkQueue<'_> {
    fn stopped(&self) -> bool {
        self.fatal.lock().map(|f| f.is_some()).unwrap_or(true)
    }

    fn stop(&self, e: Error) {
        let mut fatal = self.fatal.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        fatal.get_or_insert(e);
    }

    fn record(&self, outcome: RenderOutcome) {
        let total = self.files.len();
        let mut outcomes = self.outcomes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        info!(
            "{} [{}/{}] {} {}",
            self.tag,
            outcomes.len() + 1,
            total,
            percent(outcomes.len() + 1, total),
            outcome.report_line()
        );
        outcomes.push(outcome);
    }
}
