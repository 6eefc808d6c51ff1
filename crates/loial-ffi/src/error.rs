//! FFI error types.

use std::path::PathBuf;

/// Errors raised while binding, marshalling and invoking native calls.
#[derive(Debug, thiserror::Error)]
pub enum FfiError {
    /// A required parameter received no argument and has no default.
    #[error("missing required argument: {name}")]
    MissingArgument { name: String },

    /// More positional arguments than declared parameters.
    #[error("too many positional arguments: expected at most {expected}, got {got}")]
    TooManyArguments { expected: usize, got: usize },

    /// A keyword argument names no declared parameter.
    #[error("unexpected keyword argument: {name}")]
    UnexpectedKeyword { name: String },

    /// A parameter was bound both positionally and by keyword.
    #[error("multiple values for argument: {name}")]
    DuplicateArgument { name: String },

    /// Marshalling one argument failed.
    #[error("argument `{name}`: {source}")]
    Argument {
        name: String,
        #[source]
        source: Box<FfiError>,
    },

    /// A host value cannot be converted to the requested native type.
    #[error("cannot convert {found} to {expected}")]
    Coerce { expected: String, found: String },

    /// The requested conversion is not supported on this target.
    #[error("unsupported: {detail}")]
    Unsupported { detail: String },

    /// Failed to parse a C function signature.
    #[error("invalid C signature: {detail}")]
    InvalidCSignature { detail: String },

    /// The compiled artifact could not be loaded.
    #[error("failed to load {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    /// The artifact does not export a bridge for the symbol.
    #[error("symbol `{symbol}` not found in {}", .path.display())]
    SymbolNotFound { symbol: String, path: PathBuf },

    /// The call supplies fewer arguments than the native function takes.
    #[error("`{symbol}` takes {expected} arguments, got {got}")]
    ArityMismatch {
        symbol: String,
        expected: usize,
        got: usize,
    },

    /// Error from the core data model.
    #[error(transparent)]
    Core(#[from] loial_core::CoreError),
}

impl FfiError {
    pub(crate) fn coerce(expected: impl Into<String>, found: &loial_core::Value) -> Self {
        FfiError::Coerce {
            expected: expected.into(),
            found: found.type_name().to_string(),
        }
    }

    /// Attach the name of the argument being marshalled.
    pub(crate) fn for_argument(self, name: &str) -> Self {
        FfiError::Argument {
            name: name.to_string(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for FFI operations.
pub type Result<T> = std::result::Result<T, FfiError>;
