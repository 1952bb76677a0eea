//! Chrome DevTools Protocol backend (uses the `headless_chrome` crate)

use crate::browser::{
    add_script_script, measure_script, set_content_script, BrowserLauncher, WidgetBrowser, WidgetPage, READY_STATE_SCRIPT,
};
use crate::retry::{poll_until, RetryPolicy};
use crate::{Error, MeasuredBox, RenderConfig, Result, Viewport};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page, DOM};
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Launches one headless Chrome per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdpLauncher;

impl BrowserLauncher for CdpLauncher {
    fn launch(&self, config: &RenderConfig) -> Result<Arc<dyn WidgetBrowser>> {
        Ok(Arc::new(CdpBrowser::launch(config)?))
    }
}

/// A headless Chrome process; every page is a new tab.
pub struct CdpBrowser {
    browser: Mutex<Option<Browser>>,
    viewport: Viewport,
}

impl CdpBrowser {
    pub fn launch(config: &RenderConfig) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(Duration::from_millis(config.idle_browser_timeout_ms))
            .args(vec![
                OsStr::new("--allow-file-access-from-files"),
                OsStr::new("--force-device-scale-factor=1"),
                OsStr::new("--hide-scrollbars"),
            ])
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;
        debug!("launched headless Chrome");

        Ok(Self { browser: Mutex::new(Some(browser)), viewport: config.viewport })
    }
}

impl WidgetBrowser for CdpBrowser {
    fn open_page(&self) -> Result<Box<dyn WidgetPage>> {
        let guard = self.browser.lock().map_err(|_| Error::Other("browser lock poisoned".into()))?;
        let browser = guard
            .as_ref()
            .ok_or_else(|| Error::InitializationError("browser already closed".into()))?;
        let tab = browser.new_tab().map_err(tab_error)?;
        drop(guard);

        let page = CdpPage { tab };
        page.set_viewport(self.viewport)?;
        Ok(Box::new(page))
    }

    fn close(&self) -> Result<()> {
        // dropping the handle terminates the Chrome process
        let mut guard = self.browser.lock().map_err(|_| Error::Other("browser lock poisoned".into()))?;
        drop(guard.take());
        Ok(())
    }
}

/// A tab that could not be created fails only the page that wanted it.
fn tab_error(e: anyhow::Error) -> Error {
    Error::CdpError(format!("Failed to create tab: {}", e))
}

/// One tab of a [`CdpBrowser`].
pub struct CdpPage {
    tab: Arc<Tab>,
}

impl WidgetPage for CdpPage {
    fn set_content(&self, html: &str, timeout: Duration) -> Result<()> {
        self.tab
            .evaluate(&set_content_script(html), false)
            .map_err(|e| Error::LoadError(format!("Setting content failed: {}", e)))?;

        let policy = RetryPolicy::fixed(Duration::from_millis(50), timeout);
        let state = poll_until(
            &policy,
            || self.evaluate(READY_STATE_SCRIPT),
            |v| v.as_str() == Some("complete"),
        )?;
        if !state.is_ready() {
            return Err(Error::Timeout(timeout.as_millis() as u64));
        }
        Ok(())
    }

    fn goto(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;
        Ok(())
    }

    fn add_script(&self, source: &str) -> Result<()> {
        self.evaluate(&add_script_script(source)).map(|_| ())
    }

    fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let result = self.tab.evaluate(expression, false)?;
        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|_| Error::Timeout(timeout.as_millis() as u64))
    }

    fn measure(&self, selector: &str) -> Result<MeasuredBox> {
        match self.evaluate(&measure_script(selector))? {
            serde_json::Value::String(s) => {
                serde_json::from_str(&s).map_err(|e| Error::Other(format!("Unexpected bounding box {}: {}", s, e)))
            }
            _ => Err(Error::Other(format!("No element matching {} found", selector))),
        }
    }

    fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.tab.set_bounds(Bounds::Normal {
            left: None,
            top: None,
            width: Some(f64::from(viewport.width)),
            height: Some(f64::from(viewport.height)),
        })?;
        Ok(())
    }

    fn screenshot(&self, clip: MeasuredBox) -> Result<Vec<u8>> {
        // omit the default white background so the PNG keeps transparency
        self.tab.call_method(Emulation::SetDefaultBackgroundColorOverride {
            color: Some(DOM::RGBA { r: 0, g: 0, b: 0, a: Some(0.0) }),
        })?;

        let viewport = Page::Viewport { x: clip.x, y: clip.y, width: clip.width, height: clip.height, scale: 1.0 };
        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(viewport), true)
            .map_err(|e| Error::Other(format!("Screenshot failed: {}", e)))
    }

    fn close(self: Box<Self>) -> Result<()> {
        if let Err(e) = self.tab.close(false) {
            warn!("Failed to close tab: {}", e);
        }
        Ok(())
    }
}
