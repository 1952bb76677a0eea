//! Per-page capture state machine.
//!
//! `Loading → Styling → WaitingForMarker → Settling → Measuring →
//! ResizingViewport → Screenshotting → Writing`. Each stage starts only after
//! the previous one settled; any error aborts the capture and names the stage.
//! The PNG is written last, through a `.png.part` sibling renamed into place,
//! so a failed capture never leaves a partial image behind.

use crate::browser::{WidgetPage, TRANSPARENT_PAGE_SCRIPT};
use crate::retry::{poll_until, Polled};
use crate::{Error, MeasuredBox, RenderConfig, Result, Viewport, ZeroSizePolicy};
use log::{debug, warn};
use std::fmt;
use std::path::Path;

/// How the widget gets into the page.
#[derive(Debug, Clone)]
pub enum PageLoad {
    /// Assembled document plus the hydration bundle injected after load (JSX)
    Document { html: String, client_script: String },
    /// Local file URL navigated to directly (HTML)
    Url(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    Loading,
    Styling,
    WaitingForMarker,
    Settling,
    Measuring,
    ResizingViewport,
    Screenshotting,
    Writing,
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptureStage::Loading => "loading the page",
            CaptureStage::Styling => "resetting page styles",
            CaptureStage::WaitingForMarker => "waiting for the widget element",
            CaptureStage::Settling => "waiting for the page to settle",
            CaptureStage::Measuring => "measuring the widget",
            CaptureStage::ResizingViewport => "resizing the viewport",
            CaptureStage::Screenshotting => "taking the screenshot",
            CaptureStage::Writing => "writing the PNG",
        };
        f.write_str(s)
    }
}

fn in_stage<T>(stage: CaptureStage, res: Result<T>) -> Result<T> {
    if res.is_ok() {
        debug!("capture: done {}", stage);
    }
    res.map_err(|e| match e {
        Error::Capture { .. } => e,
        other => Error::Capture { stage: stage.to_string(), message: other.to_string() },
    })
}

/// Viewport that fits the box plus `margin`, never smaller than `min` in either dimension.
pub fn viewport_for(b: &MeasuredBox, margin: u32, min: u32) -> Viewport {
    let fit = |start: f64, extent: f64| -> u32 {
        let needed = (start.max(0.0) + extent.max(0.0) + f64::from(margin)).ceil();
        if needed >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            (needed as u32).max(min)
        }
    };
    Viewport { width: fit(b.x, b.width), height: fit(b.y, b.height) }
}

/// Drive one page from load to PNG at `out`. Returns the box that was captured.
///
/// The page is not closed here; the caller owns it.
pub fn capture_widget(page: &dyn WidgetPage, load: &PageLoad, config: &RenderConfig, out: &Path) -> Result<MeasuredBox> {
    in_stage(CaptureStage::Loading, match load {
        PageLoad::Document { html, client_script } => page
            .set_content(html, config.load_timeout())
            .and_then(|_| page.add_script(client_script)),
        PageLoad::Url(url) => page.goto(url),
    })?;

    in_stage(CaptureStage::Styling, page.evaluate(TRANSPARENT_PAGE_SCRIPT).map(|_| ()))?;

    let selector = config.marker_selector.as_str();
    in_stage(
        CaptureStage::WaitingForMarker,
        page.wait_for_selector(selector, config.attach_timeout()).map_err(|e| {
            Error::Other(format!(
                "No element with class {} found in the rendered output within {}ms ({})",
                selector, config.attach_timeout_ms, e
            ))
        }),
    )?;

    debug!("capture: {}", CaptureStage::Settling);
    std::thread::sleep(config.settle());

    let polled = in_stage(
        CaptureStage::Measuring,
        poll_until(&config.layout_retry, || page.measure(selector), |b| !b.is_degenerate()),
    )?;
    let mut measured = match polled {
        Polled::Ready(b) => b,
        Polled::Exhausted(b) => match config.zero_size {
            ZeroSizePolicy::Proceed => {
                warn!("widget still {} after {:?}; capturing anyway", b.size_label(), config.layout_retry.deadline);
                b
            }
            ZeroSizePolicy::Fail => {
                return Err(Error::Capture {
                    stage: CaptureStage::Measuring.to_string(),
                    message: format!("widget is {} after {:?}", b.size_label(), config.layout_retry.deadline),
                })
            }
        },
    };

    let viewport = viewport_for(&measured, config.viewport_margin, config.min_viewport);
    in_stage(CaptureStage::ResizingViewport, page.set_viewport(viewport))?;
    // layout can shift once the viewport changes; keep the old box if the new one is unusable
    if let Ok(again) = page.measure(selector) {
        if !again.is_degenerate() {
            measured = again;
        }
    }

    let clip = MeasuredBox { width: measured.width.max(1.0), height: measured.height.max(1.0), ..measured };
    let png = in_stage(CaptureStage::Screenshotting, page.screenshot(clip))?;
    in_stage(CaptureStage::Writing, write_png(out, &png))?;
    Ok(measured)
}

fn write_png(out: &Path, data: &[u8]) -> Result<()> {
    let part = out.with_extension("png.part");
    if let Err(e) = std::fs::write(&part, data).and_then(|_| std::fs::rename(&part, out)) {
        let _ = std::fs::remove_file(&part);
        return Err(e.into());
    }
    Ok(())
}
