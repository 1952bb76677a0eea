//! In-memory browser and compiler used by the pipeline tests.

#![allow(dead_code)]

use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use widgetshot::{
    BrowserLauncher, BuildTarget, CompiledWidget, Error, MeasuredBox, Pipeline, RenderConfig, Result, RetryPolicy,
    Viewport, WidgetBrowser, WidgetCompiler, WidgetPage,
};

/// Smallest thing that starts like a PNG.
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

/// How fake pages behave and what they saw.
#[derive(Default)]
pub struct PageScript {
    /// Boxes returned by successive `measure` calls; the last one repeats
    pub boxes: Mutex<VecDeque<MeasuredBox>>,
    /// Marker never attaches when set
    pub no_marker: AtomicBool,
    /// This many `set_content` calls fail before they start succeeding
    pub failing_loads: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
    pub viewports: Mutex<Vec<Viewport>>,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
}

impl PageScript {
    pub fn with_box(width: f64, height: f64) -> Arc<Self> {
        let script = Self::default();
        script.push_box(width, height);
        Arc::new(script)
    }

    pub fn push_box(&self, width: f64, height: f64) {
        self.boxes.lock().unwrap().push_back(MeasuredBox { x: 8.0, y: 8.0, width, height });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

pub struct FakePage {
    script: Arc<PageScript>,
}

impl FakePage {
    pub fn new(script: Arc<PageScript>) -> Self {
        Self { script }
    }
}

impl WidgetPage for FakePage {
    fn set_content(&self, html: &str, _timeout: Duration) -> Result<()> {
        self.script.log(format!("set_content {}", html.len()));
        let left = self.script.failing_loads.load(Ordering::SeqCst);
        if left > 0 {
            self.script.failing_loads.store(left - 1, Ordering::SeqCst);
            return Err(Error::LoadError("net::ERR_NAME_NOT_RESOLVED".into()));
        }
        Ok(())
    }

    fn goto(&self, url: &str) -> Result<()> {
        self.script.log(format!("goto {}", url));
        Ok(())
    }

    fn add_script(&self, _source: &str) -> Result<()> {
        self.script.log("add_script");
        Ok(())
    }

    fn evaluate(&self, _expression: &str) -> Result<serde_json::Value> {
        self.script.log("evaluate");
        Ok(serde_json::Value::Bool(true))
    }

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.script.log(format!("wait_for_selector {}", selector));
        if self.script.no_marker.load(Ordering::SeqCst) {
            return Err(Error::Timeout(timeout.as_millis() as u64));
        }
        Ok(())
    }

    fn measure(&self, _selector: &str) -> Result<MeasuredBox> {
        let mut boxes = self.script.boxes.lock().unwrap();
        let b = if boxes.len() > 1 { boxes.pop_front() } else { boxes.front().copied() };
        b.ok_or_else(|| Error::Other("no element".into()))
    }

    fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.script.viewports.lock().unwrap().push(viewport);
        Ok(())
    }

    fn screenshot(&self, clip: MeasuredBox) -> Result<Vec<u8>> {
        self.script.log(format!("screenshot {}", clip.size_label()));
        Ok(FAKE_PNG.to_vec())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.script.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeBrowser {
    script: Arc<PageScript>,
    closed: AtomicBool,
    live: Arc<AtomicUsize>,
    /// Pages open fine until this many have been opened, then the browser is gone
    pub dies_after: Option<usize>,
}

impl WidgetBrowser for FakeBrowser {
    fn open_page(&self) -> Result<Box<dyn WidgetPage>> {
        let opened = self.script.pages_opened.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) || self.dies_after.is_some_and(|n| opened >= n) {
            return Err(Error::InitializationError("browser already closed".into()));
        }
        Ok(Box::new(FakePage::new(Arc::clone(&self.script))))
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLauncher {
    pub script: Arc<PageScript>,
    pub launches: AtomicUsize,
    /// Browsers launched and not yet closed
    pub live: Arc<AtomicUsize>,
    pub max_live: AtomicUsize,
    pub fail: bool,
    pub dies_after: Option<usize>,
}

impl FakeLauncher {
    pub fn new(script: Arc<PageScript>) -> Self {
        Self { script, ..Default::default() }
    }
}

impl BrowserLauncher for FakeLauncher {
    fn launch(&self, _config: &RenderConfig) -> Result<Arc<dyn WidgetBrowser>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::InitializationError("no chrome here".into()));
        }
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(Arc::new(FakeBrowser {
            script: Arc::clone(&self.script),
            closed: AtomicBool::new(false),
            live: Arc::clone(&self.live),
            dies_after: self.dies_after,
        }))
    }
}

/// Compiles anything except files whose name contains `broken`.
#[derive(Default)]
pub struct FakeCompiler {
    pub compiled: AtomicUsize,
}

impl WidgetCompiler for FakeCompiler {
    fn compile<'a>(&'a self, source: &'a Path) -> BoxFuture<'a, Result<CompiledWidget>> {
        Box::pin(async move {
            self.compiled.fetch_add(1, Ordering::SeqCst);
            let name = source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if name.contains("broken") {
                return Err(Error::Build {
                    target: BuildTarget::Server,
                    message: format!("{}: Unexpected token", name),
                });
            }
            let markup = "<div class=\"widget\">Hello</div>".to_string();
            Ok(CompiledWidget {
                document: widgetshot::document::jsx_document(&markup, None),
                markup,
                client_script: "void 0".to_string(),
            })
        })
    }
}

/// Fast settings: no settle pause, short layout deadline, no warm-up.
pub fn test_config() -> RenderConfig {
    RenderConfig {
        settle_ms: 0,
        layout_retry: RetryPolicy::fixed(Duration::from_millis(1), Duration::from_millis(30)),
        warm_up: false,
        ..Default::default()
    }
}

pub fn pipeline_with(launcher: Arc<FakeLauncher>, compiler: Arc<FakeCompiler>) -> Pipeline {
    Pipeline::new(test_config(), compiler, launcher)
}
