//! Rewrites raw `<style>` blocks in JSX so they parse as expressions.
//!
//! Generated widgets often contain `<style>.a { color: red }</style>`, which is
//! not valid JSX because the braces open an expression. Such blocks become
//! `<style>{`...`}</style>`. Blocks that already start with `{` are left alone,
//! so the rewrite is idempotent.

use crate::Result;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn style_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<style>(.*?)</style>").expect("style block pattern is valid"))
}

/// Wrap every unwrapped `<style>` body in a template literal.
pub fn normalize_source(src: &str) -> Cow<'_, str> {
    style_block().replace_all(src, |caps: &Captures<'_>| {
        let css = &caps[1];
        if css.trim_start().starts_with('{') {
            caps[0].to_string()
        } else {
            format!("<style>{{`{}`}}</style>", css.replace('`', "\\`"))
        }
    })
}

/// Write the normalized copy of `input` into `scratch_dir`, keeping its file name.
///
/// The original file is never modified.
pub fn write_normalized(input: &Path, scratch_dir: &Path) -> Result<PathBuf> {
    let src = std::fs::read_to_string(input)?;
    let name = input.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("widget.jsx"));
    let out = scratch_dir.join(name);
    std::fs::write(&out, normalize_source(&src).as_bytes())?;
    Ok(out)
}
