//! Core error types.

/// Errors raised while building values and struct definitions.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A struct value was addressed by a field name its definition lacks.
    #[error("struct `{structure}` has no field `{field}`")]
    UnknownField { structure: String, field: String },

    /// A struct value was built from the wrong number of field values.
    #[error("struct `{structure}` expects {expected} field values, got {got}")]
    FieldCount {
        structure: String,
        expected: usize,
        got: usize,
    },

    /// A Rust type could not be mapped onto a native struct layout.
    #[error("cannot derive a native layout: {detail}")]
    Derive { detail: String },
}

impl serde::ser::Error for CoreError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        CoreError::Derive {
            detail: msg.to_string(),
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
