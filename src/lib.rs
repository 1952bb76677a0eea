//! Widgetshot
//!
//! Renders widget sources (standalone HTML documents and React/JSX
//! components) to PNG screenshots cropped to the widget's marker element.
//!
//! # Features
//!
//! - **CDP Backend** (default): Drives headless Chrome via the DevTools Protocol
//! - **JSX path**: esbuild server bundle, node SSR, browser bundle for hydration
//! - **Batch rendering**: bounded worker pool over a directory tree sharing one browser
//! - **Idempotence**: a source counts as rendered once `<stem>.png` sits next to it
//!
//! # Example
//!
//! ```no_run
//! use widgetshot::{ensure_rendered, RenderConfig};
//!
//! # async fn run() -> widgetshot::Result<()> {
//! let config = RenderConfig {
//!     node_root: "./viewer".into(),
//!     ..Default::default()
//! };
//!
//! let pipeline = widgetshot::new_pipeline(config);
//! let png = ensure_rendered(&pipeline, "results/run-1/img-3/widget.jsx".as_ref()).await?;
//! println!("PNG at {}", png.display());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub mod error;
pub use error::{BuildTarget, Error, Result};

pub mod paths;
pub use paths::{get_png_path, png_exists, SourceKind};

pub mod normalize;
pub mod retry;
pub use retry::RetryPolicy;

// JSX build stage: icon shim, document template, esbuild, node SSR
pub mod icons;
pub mod document;
pub mod bundler;
pub mod ssr;
pub mod compile;
pub use compile::{CompiledWidget, EsbuildCompiler, WidgetCompiler};

// Browser seam and the capture state machine built on it
pub mod browser;
pub use browser::{BrowserLauncher, WidgetBrowser, WidgetPage};
pub mod capture;

#[cfg(feature = "cdp")]
pub mod cdp;

pub mod pipeline;
pub use pipeline::Pipeline;
pub mod batch;
pub use batch::{BatchOptions, BatchReport, ExistingPng, RenderOutcome};
pub mod coordinator;
pub use coordinator::{ensure_rendered, Renderer};
pub mod registry;
pub use registry::ActiveRenderRegistry;

// Maintenance commands over result trees
pub mod clean;
pub mod coverage;

/// What to do when the widget is still zero-sized once the layout deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroSizePolicy {
    /// Screenshot whatever was measured last (may be a degenerate image)
    #[default]
    Proceed,
    /// Treat it as a capture failure
    Fail,
}

/// Configuration for the render pipeline
///
/// The defaults mirror what the renderers have always used: a 1200×1000
/// starting viewport, a `.widget` marker that must attach within ten seconds,
/// and a three second layout deadline polled every 50ms.
///
/// # Examples
///
/// ```
/// let cfg = widgetshot::RenderConfig::default();
/// assert_eq!(cfg.marker_selector, ".widget");
/// assert_eq!(cfg.min_viewport, 400);
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Directory whose `node_modules` provides react / react-dom to compiled widgets
    pub node_root: PathBuf,
    /// esbuild executable
    pub esbuild_bin: String,
    /// node executable used for server-side rendering
    pub node_bin: String,
    /// CSS utility framework script injected into JSX documents (None disables it)
    pub tailwind_cdn: Option<String>,
    /// Viewport every page starts with
    pub viewport: Viewport,
    /// Selector of the element whose box is captured
    pub marker_selector: String,
    /// How long the marker has to attach, in milliseconds
    pub attach_timeout_ms: u64,
    /// How long a document may take to finish loading, in milliseconds
    pub load_timeout_ms: u64,
    /// Pause after the marker attaches so hydration, fonts and icons settle
    pub settle_ms: u64,
    /// Re-measure policy while the marker has a zero width or height
    pub layout_retry: RetryPolicy,
    /// Space kept right of and below the widget when sizing the viewport
    pub viewport_margin: u32,
    /// Lower bound for both viewport dimensions
    pub min_viewport: u32,
    /// What a zero-sized widget means after `layout_retry` is exhausted
    pub zero_size: ZeroSizePolicy,
    /// Chrome is shut down after this long without commands
    pub idle_browser_timeout_ms: u64,
    /// Load the CDN scripts once before a batch starts
    pub warm_up: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            node_root: PathBuf::from("."),
            esbuild_bin: "esbuild".to_string(),
            node_bin: "node".to_string(),
            tailwind_cdn: Some(document::TAILWIND_CDN.to_string()),
            viewport: Viewport::default(),
            marker_selector: ".widget".to_string(),
            attach_timeout_ms: 10_000,
            load_timeout_ms: 30_000,
            settle_ms: 80,
            layout_retry: RetryPolicy::default(),
            viewport_margin: 20,
            min_viewport: 400,
            zero_size: ZeroSizePolicy::default(),
            idle_browser_timeout_ms: 600_000,
            warm_up: true,
        }
    }
}

impl RenderConfig {
    pub fn attach_timeout(&self) -> Duration {
        Duration::from_millis(self.attach_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 1000,
        }
    }
}

/// Bounding box of the marker element, as returned by `getBoundingClientRect`
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct MeasuredBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl MeasuredBox {
    /// Zero width or height: the element exists but has not been laid out yet.
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// `WxH` rounded to whole pixels, as printed in batch reports.
    pub fn size_label(&self) -> String {
        format!("{}x{}", self.width.round(), self.height.round())
    }
}

/// Create a pipeline with the default backends (esbuild + node for JSX, headless Chrome for capture).
#[cfg(feature = "cdp")]
pub fn new_pipeline(config: RenderConfig) -> Pipeline {
    let compiler = std::sync::Arc::new(EsbuildCompiler::new(&config));
    Pipeline::new(config, compiler, std::sync::Arc::new(cdp::CdpLauncher))
}
