//! Core data model for loial.
//!
//! A host function declares a [`DeclaredSignature`]; a call supplies
//! [`CallArgs`] made of host [`Value`]s and argument passing wrappers. The
//! fixed native type table ([`NativeType`]) and struct definitions
//! ([`StructDef`]) describe what those values become on the native side.
//!
//! ## Modules
//!
//! - [`types`] — Native C type table and type hints
//! - [`value`] — Dynamically-typed host values
//! - [`args`] — Call arguments and the by-pointer / by-reference wrappers
//! - [`signature`] — Declared parameter lists and return hints
//! - [`structs`] — Struct definitions, values and C declarations
//! - [`derive`] — Struct definitions synthesised from serde-serializable types
//! - [`hash`] — Source hashing for artifact keys

pub mod args;
pub mod derive;
pub mod error;
pub mod hash;
pub mod signature;
pub mod structs;
pub mod types;
pub mod value;

pub use args::{Arg, AsPointer, AsRef, CallArgs};
pub use error::{CoreError, Result};
pub use hash::SourceHash;
pub use signature::{DeclaredSignature, Param};
pub use structs::{Field, FieldType, StructDef, StructValue};
pub use types::{NativeClass, NativeInfo, NativeType, TypeHint};
pub use value::Value;
