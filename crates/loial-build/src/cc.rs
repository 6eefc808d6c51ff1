//! The `"CC"` backend: C source compiled with the system toolchain.

use loial_core::{CallArgs, Value};
use loial_ffi::{bind, marshal};
use tracing::debug;

use crate::compiler::{ensure, Artifact};
use crate::config::SharedConfig;
use crate::error::{BuildError, Result};
use crate::function::HostFunction;
use crate::registry::{Backend, BackendRegistry, Callable, CC};

/// Register the C backend under `"CC"`.
pub fn register(registry: &mut BackendRegistry) {
    registry.register(
        CC,
        Box::new(|code: &str, config: SharedConfig| -> Box<dyn Backend> {
            Box::new(CcBackend::new(code, config))
        }),
    );
}

/// Compiles one piece of C source.
#[derive(Debug)]
pub struct CcBackend {
    code: String,
    config: SharedConfig,
}

impl CcBackend {
    pub fn new(code: impl Into<String>, config: SharedConfig) -> Self {
        CcBackend {
            code: code.into(),
            config,
        }
    }
}

impl Backend for CcBackend {
    fn compile(&self, function: &HostFunction) -> Option<Box<dyn Callable>> {
        let artifact = ensure(&self.code, function, &mut self.config.borrow_mut())?;
        Some(Box::new(NativeFunction {
            function: function.clone(),
            artifact,
            config: self.config.clone(),
        }))
    }
}

/// A host function whose calls go to a loaded artifact.
#[derive(Debug)]
pub struct NativeFunction {
    function: HostFunction,
    artifact: Artifact,
    config: SharedConfig,
}

impl Callable for NativeFunction {
    fn call(&self, args: &CallArgs) -> Result<Value> {
        let signature = self.function.signature();
        let bound = bind(args, signature)?;
        let mut frame = marshal(&bound, &self.config.borrow().refs)?;
        let library = self.artifact.library().ok_or_else(|| BuildError::CacheError {
            path: self.artifact.path().to_path_buf(),
            detail: "artifact is no longer loaded".to_string(),
        })?;
        debug!(
            function = %self.function.qualified_name(),
            symbol = self.artifact.symbol(),
            "calling native replacement"
        );
        Ok(library.invoke(self.artifact.symbol(), &mut frame, signature.return_hint())?)
    }

    fn artifact(&self) -> Option<&Artifact> {
        Some(&self.artifact)
    }

    fn artifact_mut(&mut self) -> Option<&mut Artifact> {
        Some(&mut self.artifact)
    }
}
