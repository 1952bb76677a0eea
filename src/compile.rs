//! JSX build stage: source → (document with SSR markup, hydration script).

use crate::bundler::Bundler;
use crate::document::jsx_document;
use crate::normalize::write_normalized;
use crate::ssr::ServerRenderer;
use crate::{RenderConfig, Result};
use futures::future::BoxFuture;
use log::debug;
use std::path::Path;

/// Everything the browser needs to show a JSX widget.
#[derive(Debug, Clone)]
pub struct CompiledWidget {
    /// Static markup produced by the server render
    pub markup: String,
    /// Complete document with the markup inside `#root`
    pub document: String,
    /// Browser bundle source, injected inline after the document loads
    pub client_script: String,
}

/// Turns a JSX source file into a [`CompiledWidget`].
pub trait WidgetCompiler: Send + Sync {
    fn compile<'a>(&'a self, source: &'a Path) -> BoxFuture<'a, Result<CompiledWidget>>;
}

/// esbuild + node implementation.
///
/// Each call works in its own temporary directory, removed when the call
/// returns, so concurrent renders of the same file never share artifacts.
#[derive(Debug, Clone)]
pub struct EsbuildCompiler {
    bundler: Bundler,
    ssr: ServerRenderer,
    tailwind_cdn: Option<String>,
}

impl EsbuildCompiler {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            bundler: Bundler::new(config.esbuild_bin.clone(), config.node_root.clone()),
            ssr: ServerRenderer::new(config.node_bin.clone(), config.node_root.clone()),
            tailwind_cdn: config.tailwind_cdn.clone(),
        }
    }

    async fn compile_in_scratch(&self, source: &Path) -> Result<CompiledWidget> {
        let scratch = tempfile::Builder::new().prefix("render-jsx-").tempdir()?;
        let ssr_out = scratch.path().join("ssr.mjs");
        let client_out = scratch.path().join("client.js");
        let normalized = write_normalized(source, scratch.path())?;
        let working_dir = source.parent().unwrap_or(scratch.path());

        debug!("Bundling for SSR: {}", source.display());
        self.bundler.build_server(&normalized, &ssr_out, working_dir).await?;

        debug!("Rendering SSR markup...");
        let markup = self.ssr.render(&ssr_out, scratch.path()).await?;

        debug!("Bundling client for hydration...");
        self.bundler.build_browser(&normalized, &client_out, working_dir).await?;
        let client_script = tokio::fs::read_to_string(&client_out).await?;

        let document = jsx_document(&markup, self.tailwind_cdn.as_deref());
        Ok(CompiledWidget { markup, document, client_script })
    }
}

impl WidgetCompiler for EsbuildCompiler {
    fn compile<'a>(&'a self, source: &'a Path) -> BoxFuture<'a, Result<CompiledWidget>> {
        Box::pin(self.compile_in_scratch(source))
    }
}
