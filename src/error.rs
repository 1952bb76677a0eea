//! Error types for the render pipeline

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which of the two JSX bundles a build error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTarget {
    /// ESM bundle executed by node for server-side rendering
    Server,
    /// IIFE bundle injected into the page for hydration
    Browser,
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildTarget::Server => f.write_str("server"),
            BuildTarget::Browser => f.write_str("browser"),
        }
    }
}

/// Errors that can occur while rendering widgets
#[derive(Error, Debug)]
pub enum Error {
    /// The source file does not exist
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// The source file has an extension the pipeline cannot render
    #[error("Unsupported file type: {0}")]
    UnsupportedExtension(String),

    /// The compiled module has no usable component export
    #[error("Could not find a default export for the component in {}. Make sure the file exports default function Widget() {{ ... }}", .0.display())]
    MissingExport(PathBuf),

    /// esbuild failed for one of the bundles
    #[error("{target} build failed: {message}")]
    Build { target: BuildTarget, message: String },

    /// The node process rendering static markup failed
    #[error("Server-side render failed: {0}")]
    Ssr(String),

    /// Failed to launch or reach the browser
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load the document or file URL into a page
    #[error("Failed to load page: {0}")]
    LoadError(String),

    /// A step of the capture state machine failed
    #[error("Capture failed while {stage}: {message}")]
    Capture { stage: String, message: String },

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration or arguments
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors that stop a whole batch rather than a single file.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Error::InitializationError(_))
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
