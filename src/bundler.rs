//! Dual esbuild invocation for JSX widgets.
//!
//! Every render builds the component twice: an ESM module for node (server
//! render) and an IIFE for the page (hydration into `#root`). Module lookup is
//! pointed at `node_root` so `react` resolves even when the widget lives
//! outside the project tree.

use crate::{BuildTarget, Error, Result};
use log::debug;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

/// esbuild front-end bound to one project root.
#[derive(Debug, Clone)]
pub struct Bundler {
    esbuild: String,
    node_root: PathBuf,
}

impl Bundler {
    pub fn new(esbuild: impl Into<String>, node_root: impl Into<PathBuf>) -> Self {
        Self { esbuild: esbuild.into(), node_root: node_root.into() }
    }

    /// Bundle `entry` into a single ESM file importable by node.
    ///
    /// esbuild runs inside `working_dir`, normally the directory of the original source.
    pub async fn build_server(&self, entry: &Path, outfile: &Path, working_dir: &Path) -> Result<()> {
        let args = server_args(entry, outfile);
        self.run(BuildTarget::Server, working_dir, args).await
    }

    /// Bundle a synthesized hydration entry for `component` into an IIFE.
    ///
    /// The entry file is written next to `outfile` (`client.js` => `client.entry.js`).
    pub async fn build_browser(&self, component: &Path, outfile: &Path, working_dir: &Path) -> Result<()> {
        let entry = outfile.with_extension("entry.js");
        std::fs::write(&entry, browser_entry_source(component))?;
        let args = browser_args(&entry, outfile);
        self.run(BuildTarget::Browser, working_dir, args).await
    }

    async fn run(&self, target: BuildTarget, working_dir: &Path, args: Vec<OsString>) -> Result<()> {
        debug!("esbuild ({}) in {}", target, working_dir.display());
        let mut cmd = Command::new(&self.esbuild);
        cmd.args(&args).env("NODE_PATH", self.node_path()?);
        if !working_dir.as_os_str().is_empty() {
            cmd.current_dir(working_dir);
        }
        let output = run_tool(&mut cmd)
            .await
            .map_err(|e| Error::Build { target, message: format!("failed to run {}: {}", self.esbuild, e) })?;
        if !output.status.success() {
            return Err(Error::Build { target, message: failure_text(&output) });
        }
        Ok(())
    }

    /// `NODE_PATH` value: the project root and its `node_modules`.
    pub fn node_path(&self) -> Result<OsString> {
        let root = crate::paths::absolute(&self.node_root)?;
        std::env::join_paths([root.clone(), root.join("node_modules")])
            .map_err(|e| Error::ConfigError(format!("node root {}: {}", root.display(), e)))
    }
}

/// Source of the hydration entry importing the widget's default export.
pub fn browser_entry_source(component: &Path) -> String {
    let import_path = serde_json::to_string(&component.to_string_lossy()).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"import React from 'react';
import {{ hydrateRoot }} from 'react-dom/client';
import Widget from {import_path};
window.React = window.React || React;
const root = document.getElementById('root');
hydrateRoot(root, React.createElement(Widget));
"#
    )
}

fn common_args(entry: &Path, outfile: &Path) -> Vec<OsString> {
    let mut outfile_arg = OsString::from("--outfile=");
    outfile_arg.push(outfile);
    vec![
        entry.as_os_str().to_os_string(),
        "--bundle".into(),
        outfile_arg,
        "--jsx=automatic".into(),
        "--jsx-import-source=react".into(),
        "--log-level=error".into(),
    ]
}

pub fn server_args(entry: &Path, outfile: &Path) -> Vec<OsString> {
    let mut args = common_args(entry, outfile);
    args.extend(["--platform=node", "--format=esm", "--target=node18"].map(OsString::from));
    args
}

pub fn browser_args(entry: &Path, outfile: &Path) -> Vec<OsString> {
    let mut args = common_args(entry, outfile);
    args.extend(
        [
            "--platform=browser",
            "--format=iife",
            "--target=es2020",
            "--define:process.env.NODE_ENV=\"production\"",
        ]
        .map(OsString::from),
    );
    args
}

/// Run a tool to completion with captured output.
pub(crate) async fn run_tool(cmd: &mut Command) -> std::io::Result<Output> {
    cmd.stdin(std::process::Stdio::null()).kill_on_drop(true).output().await
}

/// Best error text for a failed tool run: stderr, else stdout, else the status.
pub(crate) fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim().to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        return stdout.trim().to_string();
    }
    format!("exited with {}", output.status)
}
