//! Build error types.

use std::path::PathBuf;

/// Errors that can occur while compiling, loading or calling a replacement.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The compiler executable could not be started.
    #[error("failed to invoke compiler `{compiler}`: {source}")]
    Spawn {
        compiler: String,
        #[source]
        source: std::io::Error,
    },

    /// The compiler rejected the source.
    #[error("compiling `{function}` failed ({status}): {stderr}")]
    CompileFailed {
        function: String,
        status: String,
        stderr: String,
    },

    /// An artifact or translation unit could not be written.
    #[error("cache error at {}: {detail}", .path.display())]
    CacheError { path: PathBuf, detail: String },

    /// The original host function reported a failure.
    #[error("`{function}` failed: {detail}")]
    Host { function: String, detail: String },

    /// Binding, marshalling or invocation error.
    #[error(transparent)]
    Ffi(#[from] loial_ffi::FfiError),

    /// Core data model error.
    #[error(transparent)]
    Core(#[from] loial_core::CoreError),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;
