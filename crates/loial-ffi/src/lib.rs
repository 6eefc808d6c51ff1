//! Native call bridge for loial.
//!
//! Takes bound host arguments across to compiled C code and back.
//!
//! ## Modules
//!
//! - [`csig`] — C function signature parser and definition lookup
//! - [`layout`] — C ABI struct layout
//! - [`coerce`] — Host value ↔ native byte conversion by type class
//! - [`marshal`] — Argument binding and call frame construction
//! - [`bridge`] — Generated C trampolines and their slot tags
//! - [`invoke`] — Artifact loading and bridge invocation

pub mod bridge;
pub mod buffer;
pub mod coerce;
pub mod csig;
pub mod error;
pub mod invoke;
pub mod layout;
pub mod marshal;

pub use bridge::generate_bridge;
pub use csig::{find_signature, CSignature, CType};
pub use error::{FfiError, Result};
pub use invoke::LoadedArtifact;
pub use layout::StructLayout;
pub use marshal::{bind, marshal, BoundArgs, CallFrame, PassingMode};
