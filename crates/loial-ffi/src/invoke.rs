//! Loading artifacts and invoking their bridges.

use std::ffi::{c_int, c_void};
use std::path::{Path, PathBuf};

use loial_core::{NativeType, TypeHint, Value};
use tracing::debug;

use crate::bridge::{bridge_symbol, meta_symbol};
use crate::buffer::{NativeBuffer, BUFFER_ALIGN};
use crate::coerce;
use crate::error::{FfiError, Result};
use crate::layout::StructLayout;
use crate::marshal::CallFrame;

/// Uniform signature of every generated bridge.
type BridgeFn = unsafe extern "C" fn(*const *mut c_void, *const c_int, *mut c_void);

/// A compiled artifact loaded into the process.
#[derive(Debug)]
pub struct LoadedArtifact {
    /// Kept alive for as long as bridges may be called.
    library: libloading::Library,
    path: PathBuf,
}

impl LoadedArtifact {
    pub fn load(path: &Path) -> Result<Self> {
        // SAFETY: artifacts are produced by this crate's toolchain step from
        // C source with no load-time constructors of ours.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| FfiError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "loaded artifact");
        Ok(LoadedArtifact {
            library,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `(arity, returns_value)` recorded next to the bridge of `symbol`.
    pub fn meta(&self, symbol: &str) -> Result<(usize, bool)> {
        // SAFETY: the metadata symbol is a `const int[2]` emitted by the
        // bridge generator.
        let [arity, returns] = unsafe {
            let meta: libloading::Symbol<*const [c_int; 2]> = self
                .library
                .get(meta_symbol(symbol).as_bytes())
                .map_err(|_| self.not_found(symbol))?;
            **meta
        };
        Ok((usize::try_from(arity).unwrap_or(0), returns != 0))
    }

    /// Call the bridge for `symbol` with `frame` and decode the result as
    /// `return_hint` (`int` when absent). By-pointer arguments are read back.
    pub fn invoke(
        &self,
        symbol: &str,
        frame: &mut CallFrame,
        return_hint: Option<&TypeHint>,
    ) -> Result<Value> {
        let (arity, returns) = self.meta(symbol)?;
        if frame.len() < arity {
            return Err(FfiError::ArityMismatch {
                symbol: symbol.to_string(),
                expected: arity,
                got: frame.len(),
            });
        }

        let return_layout = match return_hint {
            Some(TypeHint::Struct(def)) => Some(StructLayout::of(def)),
            _ => None,
        };
        let size = return_layout.as_ref().map_or(0, |l| l.size).max(BUFFER_ALIGN);
        let mut ret = NativeBuffer::zeroed(size);

        debug!(symbol, arguments = frame.len(), "invoking bridge");
        {
            // SAFETY: the bridge was generated for this symbol with the
            // `BridgeFn` signature; every slot pointer and the return buffer
            // stay alive and aligned for the duration of the call.
            let bridge: libloading::Symbol<BridgeFn> = unsafe {
                self.library
                    .get(bridge_symbol(symbol).as_bytes())
                    .map_err(|_| self.not_found(symbol))?
            };
            let (args, tags) = frame.raw();
            unsafe { bridge(args.as_ptr(), tags.as_ptr(), ret.as_mut_ptr()) };
        }

        frame.read_back()?;

        if !returns {
            return Ok(Value::None);
        }
        match (return_hint, return_layout) {
            (Some(TypeHint::Struct(_)), Some(layout)) => {
                Ok(Value::Struct(layout.decode(ret.as_bytes())?))
            }
            (Some(TypeHint::Native(NativeType::LongDouble)), _) => {
                coerce::decode(NativeType::Double, ret.as_bytes())
            }
            (Some(TypeHint::Native(ty)), _) => coerce::decode(*ty, ret.as_bytes()),
            _ => coerce::decode(NativeType::Int, ret.as_bytes()),
        }
    }

    fn not_found(&self, symbol: &str) -> FfiError {
        FfiError::SymbolNotFound {
            symbol: symbol.to_string(),
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoadedArtifact::load(&dir.path().join("absent.so")).unwrap_err();
        assert!(matches!(err, FfiError::Load { .. }));
    }
}
