//! widgetshot CLI
//!
//! - `render`: render single files to their sibling PNGs
//! - `batch`: render every widget under one or more directories
//! - `clean`: delete rendered PNGs under a tree
//! - `coverage`: report rendered/missing counts per run directory

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use widgetshot::coordinator::force_render;
use widgetshot::{
    ensure_rendered, ActiveRenderRegistry, BatchOptions, ExistingPng, RenderConfig, Result, SourceKind,
    ZeroSizePolicy,
};

#[derive(Parser)]
#[command(name = "widgetshot", version, about = "Render HTML and JSX widgets to PNG")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Directory whose node_modules provides react and react-dom
    #[arg(long, global = true, env = "WIDGETSHOT_NODE_ROOT", default_value = ".")]
    node_root: PathBuf,
    /// esbuild executable
    #[arg(long, global = true, env = "WIDGETSHOT_ESBUILD", default_value = "esbuild")]
    esbuild: String,
    /// node executable
    #[arg(long, global = true, env = "WIDGETSHOT_NODE", default_value = "node")]
    node: String,
    /// Do not inject the Tailwind CDN script into JSX documents
    #[arg(long, global = true)]
    no_tailwind: bool,
    /// Fail a render whose widget is still zero-sized after the layout deadline
    #[arg(long, global = true)]
    fail_on_zero_size: bool,
    /// Skip loading the CDN scripts before a batch starts
    #[arg(long, global = true)]
    no_warm_up: bool,
}

impl ConfigArgs {
    fn into_config(self) -> RenderConfig {
        let defaults = RenderConfig::default();
        RenderConfig {
            node_root: self.node_root,
            esbuild_bin: self.esbuild,
            node_bin: self.node,
            tailwind_cdn: if self.no_tailwind { None } else { defaults.tailwind_cdn.clone() },
            zero_size: if self.fail_on_zero_size { ZeroSizePolicy::Fail } else { ZeroSizePolicy::Proceed },
            warm_up: !self.no_warm_up,
            ..defaults
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render files to sibling PNGs (skips files that already have one)
    Render {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Re-render even when the PNG exists
        #[arg(long)]
        force: bool,
    },
    /// Render every widget under the given directories
    Batch {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
        /// Number of concurrent pages
        #[arg(short = 'j', long = "jobs")]
        jobs: Option<usize>,
        #[arg(long, value_enum, default_value_t = KindArg::All)]
        kind: KindArg,
        /// Re-render files that already have a PNG
        #[arg(long, conflicts_with = "skip_rendered")]
        force: bool,
        /// Skip files that already have a PNG
        #[arg(long)]
        skip_rendered: bool,
    },
    /// Delete every .png under a directory
    Clean { dir: PathBuf },
    /// Report how many widgets per run directory have a PNG
    Coverage { root: PathBuf },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Jsx,
    Html,
    All,
}

impl KindArg {
    fn kinds(self) -> &'static [SourceKind] {
        match self {
            KindArg::Jsx => &[SourceKind::Jsx],
            KindArg::Html => &[SourceKind::Html],
            KindArg::All => &[SourceKind::Jsx, SourceKind::Html],
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.config.into_config();
    let result = match cli.command {
        Commands::Render { files, force } => render(config, files, force).await,
        Commands::Batch { dirs, jobs, kind, force, skip_rendered } => {
            let existing = if force {
                Some(ExistingPng::Rerender)
            } else if skip_rendered {
                Some(ExistingPng::Skip)
            } else {
                None
            };
            batch(config, dirs, kind, BatchOptions { concurrency: jobs, existing }).await
        }
        Commands::Clean { dir } => clean(dir).await,
        Commands::Coverage { root } => coverage(root),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(1)
        }
    }
}

async fn render(config: RenderConfig, files: Vec<PathBuf>, force: bool) -> Result<()> {
    let pipeline = widgetshot::new_pipeline(config);
    for file in files {
        let png = if force {
            force_render(&pipeline, &file).await?
        } else {
            ensure_rendered(&pipeline, &file).await?
        };
        info!("[render] OK {} -> {}", file.display(), png.display());
    }
    Ok(())
}

async fn batch(config: RenderConfig, dirs: Vec<PathBuf>, kind: KindArg, options: BatchOptions) -> Result<()> {
    let pipeline = widgetshot::new_pipeline(config);
    let registry = ActiveRenderRegistry::new();

    let results = pipeline.render_dirs(&registry, &dirs, kind.kinds(), options).await?;
    let failed: Vec<String> = results
        .into_iter()
        .filter_map(|(key, result)| result.err().map(|e| format!("{}: {}", key, e)))
        .collect();
    for line in &failed {
        error!("[batch] {}", line);
    }
    if failed.is_empty() {
        Ok(())
    } else {
        Err(widgetshot::Error::Other(format!("{} batch(es) could not run", failed.len())))
    }
}

async fn clean(dir: PathBuf) -> Result<()> {
    let report = widgetshot::clean::clean_pngs(&dir).await?;
    if report.is_clean() {
        return Ok(());
    }
    for line in report.error_lines() {
        error!("[clean]{}", line);
    }
    Err(widgetshot::Error::Other(format!("{} deletion(s) failed", report.errors.len())))
}

fn coverage(root: PathBuf) -> Result<()> {
    let report = widgetshot::coverage::check_coverage(&root)?;
    info!("[coverage] Root: {}", root.display());
    for line in report.lines() {
        info!("[coverage] {}", line);
    }
    Ok(())
}
