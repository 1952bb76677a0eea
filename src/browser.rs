//! Headless browser seam.
//!
//! The capture state machine only talks to these traits. The CDP backend
//! implements them over headless Chrome; tests implement them in memory.

use crate::{MeasuredBox, RenderConfig, Result, Viewport};
use std::sync::Arc;
use std::time::Duration;

/// A running browser shared by every page of one render call or batch.
pub trait WidgetBrowser: Send + Sync {
    /// Open a fresh page sized to the configured initial viewport.
    fn open_page(&self) -> Result<Box<dyn WidgetPage>>;

    /// Shut the browser down. Pages opened afterwards fail.
    fn close(&self) -> Result<()>;
}

/// One page, exclusively owned by the worker that opened it.
pub trait WidgetPage: Send {
    /// Replace the document with `html` and wait until it has finished loading.
    fn set_content(&self, html: &str, timeout: Duration) -> Result<()>;

    /// Navigate to `url` and wait for the load event.
    fn goto(&self, url: &str) -> Result<()>;

    /// Append an inline `<script>` with `source` to the document.
    fn add_script(&self, source: &str) -> Result<()>;

    /// Evaluate an expression in the page and return its JSON value.
    fn evaluate(&self, expression: &str) -> Result<serde_json::Value>;

    /// Wait until an element matching `selector` is attached to the DOM.
    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Bounding client rect of the first element matching `selector`.
    fn measure(&self, selector: &str) -> Result<MeasuredBox>;

    /// Resize the page viewport.
    fn set_viewport(&self, viewport: Viewport) -> Result<()>;

    /// PNG of the `clip` region with the default background omitted.
    fn screenshot(&self, clip: MeasuredBox) -> Result<Vec<u8>>;

    /// Close the page.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Starts browsers.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, config: &RenderConfig) -> Result<Arc<dyn WidgetBrowser>>;
}

/// Script measuring the first element matching `selector`; yields `null` when absent.
pub fn measure_script(selector: &str) -> String {
    let sel = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(function(){{const el=document.querySelector({sel});if(!el)return null;const r=el.getBoundingClientRect();return JSON.stringify({{x:r.x,y:r.y,width:r.width,height:r.height}});}})()"
    )
}

/// Script appending an inline script element carrying `source`.
pub fn add_script_script(source: &str) -> String {
    let src = serde_json::to_string(source).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(function(){{const s=document.createElement('script');s.textContent={src};(document.head||document.documentElement).appendChild(s);return true;}})()"
    )
}

/// Script replacing the current document with `html`.
pub fn set_content_script(html: &str) -> String {
    let doc = serde_json::to_string(html).unwrap_or_else(|_| "\"\"".to_string());
    format!("(function(){{document.open();document.write({doc});document.close();return true;}})()")
}

/// Transparent page background and no scrollbars influencing layout.
pub const TRANSPARENT_PAGE_SCRIPT: &str = "(function(){document.documentElement.style.background='transparent';if(document.body){document.body.style.background='transparent';document.body.style.overflow='hidden';}return true;})()";

/// Current `document.readyState`.
pub const READY_STATE_SCRIPT: &str = "document.readyState";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_escape_their_payloads() {
        let s = measure_script(".widget\"x");
        assert!(s.contains(r#"document.querySelector(".widget\"x")"#));

        let s = add_script_script("console.log(\"</script>\")");
        assert!(s.contains(r#"s.textContent="console.log(\"</script>\")""#));

        let s = set_content_script("<p>\n</p>");
        assert!(s.contains(r#"document.write("<p>\n</p>")"#));
    }
}
