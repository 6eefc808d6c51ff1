//! Native replacements for host functions.
//!
//! A [`HostFunction`] declares its parameters and keeps its original body. A
//! [`BackendRegistry`] builds a [`Decorator`] for a piece of embedded C; the
//! decorator compiles it into a cached shared library and returns a
//! [`Wrapper`] whose calls go to native code. Anything that stops the build
//! leaves the original body in place.
//!
//! ## Modules
//!
//! - [`config`] — Compiler configuration, loadable from TOML
//! - [`cache`] — Cache directory resolution
//! - [`compiler`] — Translation units, the toolchain and artifacts
//! - [`function`] — Host functions
//! - [`registry`] — Backends, the decorator and wrappers
//! - [`cc`] — The C backend

pub mod cache;
pub mod cc;
pub mod compiler;
pub mod config;
pub mod error;
pub mod function;
pub mod registry;

pub use cache::ArtifactCache;
pub use cc::{CcBackend, NativeFunction};
pub use compiler::{ensure, try_ensure, Artifact};
pub use config::{CompilerConfig, SharedConfig};
pub use error::{BuildError, Result};
pub use function::{HostBody, HostFunction};
pub use loial_ffi::BoundArgs;
pub use registry::{
    Backend, BackendFactory, BackendRegistry, BuildOptions, Callable, Decorator, Wrapper, CC,
};
