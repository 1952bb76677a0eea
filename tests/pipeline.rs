//! Pipeline, batch and coordinator behaviour against in-memory browsers

mod common;

use common::{pipeline_with, test_config, FakeCompiler, FakeLauncher, FakePage, PageScript, FAKE_PNG};
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use widgetshot::capture::{capture_widget, PageLoad};
use widgetshot::{
    ensure_rendered, ActiveRenderRegistry, BatchOptions, Error, ExistingPng, Pipeline, RenderConfig, SourceKind, Viewport,
    ZeroSizePolicy,
};

fn touch(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

#[tokio::test]
async fn jsx_batch_skips_rendered_files() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("x.jsx"), b"export default () => null");
    touch(&dir.path().join("x.png"), b"old");
    touch(&dir.path().join("nested/y.jsx"), b"export default () => null");
    let before = fs::metadata(dir.path().join("x.png")).unwrap().modified().unwrap();

    let launcher = Arc::new(FakeLauncher::new(PageScript::with_box(120.0, 80.0)));
    let compiler = Arc::new(FakeCompiler::default());
    let pipeline = pipeline_with(Arc::clone(&launcher), Arc::clone(&compiler));

    let report = pipeline.render_jsx_batch(dir.path(), None).await.unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.ok_count(), 1);
    assert_eq!(compiler.compiled.load(Ordering::SeqCst), 1);
    assert_eq!(fs::read(dir.path().join("nested/y.png")).unwrap(), FAKE_PNG);
    assert_eq!(fs::read(dir.path().join("x.png")).unwrap(), b"old");
    assert_eq!(fs::metadata(dir.path().join("x.png")).unwrap().modified().unwrap(), before);
}

#[tokio::test]
async fn html_batch_rerenders_everything() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("a.html"), b"<div class=\"widget\"></div>");
    touch(&dir.path().join("a.png"), b"old");
    touch(&dir.path().join("b.htm"), b"<div class=\"widget\"></div>");

    let script = PageScript::with_box(300.0, 200.0);
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&script)));
    let pipeline = pipeline_with(Arc::clone(&launcher), Arc::new(FakeCompiler::default()));

    let report = pipeline.render_html_batch(dir.path(), Some(8)).await.unwrap();
    assert_eq!((report.total, report.ok_count(), report.failed_count()), (2, 2, 0));
    assert_eq!(fs::read(dir.path().join("a.png")).unwrap(), FAKE_PNG);
    assert!(dir.path().join("b.png").is_file());
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(script.pages_opened.load(Ordering::SeqCst), 2);
    assert_eq!(script.pages_closed.load(Ordering::SeqCst), 2);
    assert!(script.calls().iter().filter(|c| c.starts_with("goto file://")).count() == 2);
}

#[tokio::test]
async fn explicit_policy_overrides_kind_default() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("a.html"), b"");
    touch(&dir.path().join("a.png"), b"old");

    let launcher = Arc::new(FakeLauncher::new(PageScript::with_box(10.0, 10.0)));
    let pipeline = pipeline_with(Arc::clone(&launcher), Arc::new(FakeCompiler::default()));
    let options = BatchOptions { concurrency: None, existing: Some(ExistingPng::Skip) };

    let report = pipeline.render_batch(dir.path(), SourceKind::Html, options).await.unwrap();
    assert_eq!(report.total, 0);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    assert_eq!(fs::read(dir.path().join("a.png")).unwrap(), b"old");
}

#[tokio::test]
async fn one_broken_file_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("broken.jsx"), b"export default (");
    touch(&dir.path().join("good.jsx"), b"export default () => null");

    let launcher = Arc::new(FakeLauncher::new(PageScript::with_box(120.0, 80.0)));
    let pipeline = pipeline_with(launcher, Arc::new(FakeCompiler::default()));

    let report = pipeline.render_jsx_batch(dir.path(), Some(2)).await.unwrap();
    assert_eq!(report.ok_count(), 1);
    assert_eq!(report.failed_count(), 1);
    assert!(dir.path().join("good.png").is_file());
    assert!(!dir.path().join("broken.png").exists());

    let failure = report.outcomes.iter().find(|o| !o.is_ok()).unwrap();
    assert!(failure.report_line().starts_with("FAIL "));
    assert!(failure.report_line().contains("server build failed"));
}

#[tokio::test]
async fn launch_failure_fails_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("w.html"), b"");
    let launcher = Arc::new(FakeLauncher { fail: true, ..FakeLauncher::new(PageScript::with_box(1.0, 1.0)) });
    let pipeline = pipeline_with(launcher, Arc::new(FakeCompiler::default()));

    let err = pipeline.render_html_batch(dir.path(), None).await.unwrap_err();
    assert!(err.is_infrastructure());
    assert!(!dir.path().join("w.png").exists());
}

#[tokio::test]
async fn browser_dying_mid_batch_fails_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.html", "b.html", "c.html"] {
        touch(&dir.path().join(name), b"");
    }
    let launcher = Arc::new(FakeLauncher { dies_after: Some(1), ..FakeLauncher::new(PageScript::with_box(5.0, 5.0)) });
    let pipeline = pipeline_with(launcher, Arc::new(FakeCompiler::default()));

    let err = pipeline.render_html_batch(dir.path(), Some(1)).await.unwrap_err();
    assert!(matches!(err, Error::InitializationError(_)));
    assert!(dir.path().join("a.png").is_file());
    assert!(!dir.path().join("c.png").exists());
}

#[tokio::test]
async fn zero_concurrency_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("w.html"), b"");
    let pipeline = pipeline_with(Arc::new(FakeLauncher::default()), Arc::new(FakeCompiler::default()));
    let err = pipeline.render_html_batch(dir.path(), Some(0)).await.unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
}

#[tokio::test]
async fn empty_directory_launches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(FakeLauncher::default());
    let pipeline = pipeline_with(Arc::clone(&launcher), Arc::new(FakeCompiler::default()));
    let report = pipeline.render_jsx_batch(dir.path(), None).await.unwrap();
    assert_eq!(report.total, 0);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_warm_up_does_not_stop_the_batch() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    touch(&dir.path().join("a.html"), b"");
    touch(&dir.path().join("b.html"), b"");

    let script = PageScript::with_box(50.0, 50.0);
    script.failing_loads.store(1, Ordering::SeqCst);
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&script)));
    let config = RenderConfig { warm_up: true, ..test_config() };
    let pipeline = Pipeline::new(config, Arc::new(FakeCompiler::default()), launcher);

    let report = pipeline.render_html_batch(dir.path(), Some(2)).await?;
    assert_eq!((report.ok_count(), report.failed_count()), (2, 0));
    assert!(dir.path().join("a.png").is_file());
    assert!(dir.path().join("b.png").is_file());
    assert_eq!(script.pages_opened.load(Ordering::SeqCst), 3);
    assert_eq!(script.pages_closed.load(Ordering::SeqCst), 3);
    assert!(script.calls()[0].starts_with("set_content"));
    Ok(())
}

#[tokio::test]
async fn directories_are_batched_one_browser_at_a_time() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let dirs: Vec<_> = ["run-1", "run-2", "run-3"].iter().map(|d| root.path().join(d)).collect();
    for dir in &dirs {
        touch(&dir.join("w.html"), b"");
        touch(&dir.join("w.jsx"), b"export default () => null");
    }
    let mut listed = dirs.clone();
    listed.push(dirs[0].clone());

    let launcher = Arc::new(FakeLauncher::new(PageScript::with_box(64.0, 32.0)));
    let pipeline = pipeline_with(Arc::clone(&launcher), Arc::new(FakeCompiler::default()));
    let registry = ActiveRenderRegistry::new();

    let results = pipeline
        .render_dirs(&registry, &listed, &[SourceKind::Jsx, SourceKind::Html], BatchOptions::default())
        .await?;
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 6);
    assert_eq!(launcher.max_live.load(Ordering::SeqCst), 1);
    assert_eq!(launcher.live.load(Ordering::SeqCst), 0);
    assert!(registry.active_keys().is_empty());
    Ok(())
}

#[tokio::test]
async fn ensure_rendered_renders_once() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("card.jsx");
    touch(&src, b"export default () => null");

    let launcher = Arc::new(FakeLauncher::new(PageScript::with_box(120.0, 80.0)));
    let compiler = Arc::new(FakeCompiler::default());
    let pipeline = pipeline_with(Arc::clone(&launcher), Arc::clone(&compiler));

    assert!(!dir.path().join("card.png").exists());
    let first = ensure_rendered(&pipeline, &src).await.unwrap();
    let second = ensure_rendered(&pipeline, &src).await.unwrap();
    assert_eq!(first, dir.path().join("card.png"));
    assert_eq!(first, second);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(compiler.compiled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_render_checks_its_input() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(Arc::new(FakeLauncher::default()), Arc::new(FakeCompiler::default()));

    let err = pipeline.render_jsx(&dir.path().join("missing.jsx")).await.unwrap_err();
    assert!(matches!(err, Error::InputNotFound(_)));

    let page = dir.path().join("page.html");
    touch(&page, b"");
    let err = pipeline.render_jsx(&page).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedExtension(_)));
}

#[tokio::test]
async fn jsx_render_injects_client_script_after_content() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("w.jsx");
    touch(&src, b"export default () => null");
    let script = PageScript::with_box(120.0, 80.0);
    let pipeline = pipeline_with(Arc::new(FakeLauncher::new(Arc::clone(&script))), Arc::new(FakeCompiler::default()));

    pipeline.render_jsx(&src).await.unwrap();
    let calls = script.calls();
    let content = calls.iter().position(|c| c.starts_with("set_content")).unwrap();
    let inject = calls.iter().position(|c| c == "add_script").unwrap();
    let wait = calls.iter().position(|c| c == "wait_for_selector .widget").unwrap();
    assert!(content < inject && inject < wait);
    assert_eq!(calls.last().unwrap(), "screenshot 120x80");
}

#[test]
fn layout_retry_waits_for_a_real_box() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("w.png");
    let script = PageScript::with_box(0.0, 0.0);
    script.push_box(0.0, 40.0);
    script.push_box(1000.0, 900.0);
    let page = FakePage::new(Arc::clone(&script));

    let b = capture_widget(&page, &PageLoad::Url("file:///w.html".into()), &test_config(), &out).unwrap();
    assert_eq!((b.width, b.height), (1000.0, 900.0));
    assert_eq!(script.viewports.lock().unwrap()[0], Viewport { width: 1028, height: 928 });
    assert!(out.is_file());
}

#[test]
fn zero_size_proceeds_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("w.png");
    let script = PageScript::with_box(0.0, 0.0);
    let page = FakePage::new(Arc::clone(&script));

    let b = capture_widget(&page, &PageLoad::Url("file:///w.html".into()), &test_config(), &out).unwrap();
    assert!(b.is_degenerate());
    assert_eq!(script.viewports.lock().unwrap()[0], Viewport { width: 400, height: 400 });
    assert!(script.calls().contains(&"screenshot 1x1".to_string()));
    assert!(out.is_file());
}

#[test]
fn zero_size_can_fail_the_render() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("w.png");
    let page = FakePage::new(PageScript::with_box(0.0, 0.0));
    let config = widgetshot::RenderConfig { zero_size: ZeroSizePolicy::Fail, ..test_config() };

    let err = capture_widget(&page, &PageLoad::Url("file:///w.html".into()), &config, &out).unwrap_err();
    assert!(err.to_string().starts_with("Capture failed while measuring the widget"));
    assert!(!out.exists());
}

#[test]
fn missing_marker_leaves_no_png() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("w.png");
    let script = PageScript::with_box(100.0, 100.0);
    script.no_marker.store(true, Ordering::SeqCst);
    let page = FakePage::new(Arc::clone(&script));

    let err = capture_widget(&page, &PageLoad::Url("file:///w.html".into()), &test_config(), &out).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("waiting for the widget element"), "{}", msg);
    assert!(msg.contains("No element with class .widget found"), "{}", msg);
    assert!(!out.exists());
    assert!(!script.calls().iter().any(|c| c.starts_with("screenshot")));
}
