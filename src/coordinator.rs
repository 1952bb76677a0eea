//! Render-if-missing entry point.

use crate::paths::{get_png_path, png_exists};
use crate::pipeline::Pipeline;
use crate::{Result, SourceKind};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;
use std::path::{Path, PathBuf};

/// Anything that can render a single source to its sibling PNG.
pub trait Renderer: Send + Sync {
    fn render_jsx<'a>(&'a self, source: &'a Path) -> BoxFuture<'a, Result<PathBuf>>;
    fn render_html<'a>(&'a self, source: &'a Path) -> BoxFuture<'a, Result<PathBuf>>;
}

impl Renderer for Pipeline {
    fn render_jsx<'a>(&'a self, source: &'a Path) -> BoxFuture<'a, Result<PathBuf>> {
        Pipeline::render_jsx(self, source).boxed()
    }

    fn render_html<'a>(&'a self, source: &'a Path) -> BoxFuture<'a, Result<PathBuf>> {
        Pipeline::render_html(self, source).boxed()
    }
}

/// Return the sibling PNG of `source`, rendering it first if it does not exist yet.
///
/// An existing PNG is trusted as-is, whatever its age. The kind is chosen by
/// extension: `.jsx`/`.js` go through the JSX pipeline, `.html`/`.htm` are
/// loaded directly.
pub async fn ensure_rendered<R: Renderer + ?Sized>(renderer: &R, source: &Path) -> Result<PathBuf> {
    let png = get_png_path(source);
    if png_exists(source) {
        debug!("{} already rendered", source.display());
        return Ok(png);
    }
    force_render(renderer, source).await
}

/// Render `source` regardless of an existing PNG.
pub async fn force_render<R: Renderer + ?Sized>(renderer: &R, source: &Path) -> Result<PathBuf> {
    match SourceKind::from_path(source)? {
        SourceKind::Jsx => renderer.render_jsx(source).await,
        SourceKind::Html => renderer.render_html(source).await,
    }
}
