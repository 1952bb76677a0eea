//! Single-file rendering and the shared per-file protocol used by batches.

use crate::browser::{BrowserLauncher, WidgetBrowser};
use crate::capture::{capture_widget, PageLoad};
use crate::compile::WidgetCompiler;
use crate::paths::{file_url, get_png_path};
use crate::{Error, MeasuredBox, RenderConfig, Result, SourceKind};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A finished capture of one source file.
#[derive(Debug, Clone)]
pub struct Captured {
    pub png: PathBuf,
    pub size: MeasuredBox,
    pub elapsed: Duration,
}

/// The render pipeline: a compiler for JSX and a way to start browsers.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<RenderConfig>,
    compiler: Arc<dyn WidgetCompiler>,
    launcher: Arc<dyn BrowserLauncher>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(config: RenderConfig, compiler: Arc<dyn WidgetCompiler>, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self { config: Arc::new(config), compiler, launcher }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render a JSX/JS component unconditionally, overwriting any existing PNG.
    pub async fn render_jsx(&self, source: &Path) -> Result<PathBuf> {
        self.render_single(source, SourceKind::Jsx).await
    }

    /// Render an HTML document unconditionally, overwriting any existing PNG.
    pub async fn render_html(&self, source: &Path) -> Result<PathBuf> {
        self.render_single(source, SourceKind::Html).await
    }

    /// Returns the PNG path derived from `source` as given, so relative
    /// inputs yield relative outputs, the same as [`get_png_path`].
    async fn render_single(&self, requested: &Path, expected: SourceKind) -> Result<PathBuf> {
        let source = crate::paths::absolute(requested)?;
        check_source(&source, expected)?;
        let tag = format!("[render-{}]", expected.label());

        let load = self.prepare(&source, expected).await?;
        info!("{} Launching headless Chromium...", tag);
        let browser = self.launch().await?;
        let result = self.capture(Arc::clone(&browser), load, get_png_path(&source)).await;
        if let Err(e) = browser.close() {
            warn!("{} Failed to close browser: {}", tag, e);
        }

        let captured = result?;
        info!("{} Widget size: {}", tag, captured.size.size_label());
        info!("{} Saved PNG -> {}", tag, captured.png.display());
        Ok(get_png_path(requested))
    }

    /// Start a browser on a blocking thread.
    pub(crate) async fn launch(&self) -> Result<Arc<dyn WidgetBrowser>> {
        let launcher = Arc::clone(&self.launcher);
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || launcher.launch(&config))
            .await
            .map_err(|e| Error::InitializationError(format!("browser launch task failed: {}", e)))?
    }

    /// Everything before the browser: compile JSX, or build the file URL for HTML.
    pub(crate) async fn prepare(&self, source: &Path, kind: SourceKind) -> Result<PageLoad> {
        match kind {
            SourceKind::Jsx => {
                let compiled = self.compiler.compile(source).await?;
                Ok(PageLoad::Document { html: compiled.document, client_script: compiled.client_script })
            }
            SourceKind::Html => Ok(PageLoad::Url(file_url(source)?)),
        }
    }

    /// Open a page on `browser`, capture into `png`, and always close the page.
    pub(crate) async fn capture(&self, browser: Arc<dyn WidgetBrowser>, load: PageLoad, png: PathBuf) -> Result<Captured> {
        let config = Arc::clone(&self.config);
        let started = Instant::now();
        tokio::task::spawn_blocking(move || {
            let page = browser.open_page()?;
            let result = capture_widget(page.as_ref(), &load, &config, &png);
            if let Err(e) = page.close() {
                warn!("Failed to close page: {}", e);
            }
            result.map(|size| Captured { png, size, elapsed: started.elapsed() })
        })
        .await
        .map_err(|e| Error::Other(format!("capture task failed: {}", e)))?
    }

    /// Prepare and capture one file on an already running browser (batch workers).
    pub(crate) async fn render_on(&self, browser: Arc<dyn WidgetBrowser>, source: &Path, kind: SourceKind) -> Result<Captured> {
        let started = Instant::now();
        let load = self.prepare(source, kind).await?;
        let captured = self.capture(browser, load, get_png_path(source)).await?;
        Ok(Captured { elapsed: started.elapsed(), ..captured })
    }
}

fn check_source(source: &Path, expected: SourceKind) -> Result<()> {
    if !source.is_file() {
        return Err(Error::InputNotFound(source.to_path_buf()));
    }
    let kind = SourceKind::from_path(source)?;
    if kind != expected {
        let ext = source.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
        return Err(Error::UnsupportedExtension(format!("{} (expected a {} source)", ext, expected.label())));
    }
    Ok(())
}
