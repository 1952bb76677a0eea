//! Server-side render of a freshly built server bundle.
//!
//! The bundle is executed by a short-lived `node` process, so every render
//! loads its own module with no cache shared between renders. The process
//! prints the static markup on stdout.

use crate::bundler::{failure_text, run_tool};
use crate::icons::icon_shim_script;
use crate::{Error, Result};
use log::debug;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Exit status the runner uses when the module has no component export.
const MISSING_EXPORT_EXIT: i32 = 3;

/// Runs `node` against server bundles.
#[derive(Debug, Clone)]
pub struct ServerRenderer {
    node: String,
    node_root: PathBuf,
}

impl ServerRenderer {
    pub fn new(node: impl Into<String>, node_root: impl Into<PathBuf>) -> Self {
        Self { node: node.into(), node_root: node_root.into() }
    }

    /// Render the default export (or `Widget` / `Component`) of `bundle` to markup.
    ///
    /// The runner script is written into `scratch_dir`, next to the bundle.
    pub async fn render(&self, bundle: &Path, scratch_dir: &Path) -> Result<String> {
        let runner = scratch_dir.join("ssr-runner.mjs");
        std::fs::write(&runner, runner_source())?;
        let root = crate::paths::absolute(&self.node_root)?;

        debug!("ssr {}", bundle.display());
        let mut cmd = Command::new(&self.node);
        cmd.arg(&runner).arg(bundle).arg(&root).current_dir(scratch_dir);
        let output = run_tool(&mut cmd)
            .await
            .map_err(|e| Error::Ssr(format!("failed to run {}: {}", self.node, e)))?;

        match output.status.code() {
            Some(0) => String::from_utf8(output.stdout).map_err(|e| Error::Ssr(format!("markup is not UTF-8: {}", e))),
            Some(MISSING_EXPORT_EXIT) => Err(Error::MissingExport(bundle.to_path_buf())),
            _ => Err(Error::Ssr(failure_text(&output))),
        }
    }
}

/// ESM script: `node ssr-runner.mjs <bundle> <node_root>`.
///
/// react and react-dom are resolved from `node_root`; `React` and the icon
/// placeholders are installed as globals before the bundle is imported.
pub fn runner_source() -> String {
    format!(
        r#"import {{ createRequire }} from 'node:module';
import path from 'node:path';
import {{ pathToFileURL }} from 'node:url';

const [bundlePath, nodeRoot] = process.argv.slice(2);
const require = createRequire(path.join(nodeRoot, 'package.json'));
const React = require('react');
const {{ renderToString }} = require('react-dom/server');
globalThis.React = globalThis.React || React;
{shim}

const mod = await import(pathToFileURL(bundlePath).href);
const Widget = mod.default || mod.Widget || mod.Component;
if (!Widget) {{
  process.stderr.write('module has no default export');
  process.exit({missing});
}}
process.stdout.write(renderToString(React.createElement(Widget)));
"#,
        shim = icon_shim_script(),
        missing = MISSING_EXPORT_EXIT,
    )
}
