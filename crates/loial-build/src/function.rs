//! Host functions: named functions with their own Rust bodies.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use loial_core::{CallArgs, DeclaredSignature, Value};
use loial_ffi::{bind, BoundArgs};

use crate::error::Result;
use crate::registry::Callable;

/// Body of a host function, called with its bound arguments.
pub type HostBody = Rc<dyn Fn(&BoundArgs<'_>) -> Result<Value>>;

/// A named function with a declared signature and an original body.
///
/// The module path and name key the compiled artifacts; the source
/// directory, when known, is added to the compiler's include path.
#[derive(Clone)]
pub struct HostFunction {
    module: String,
    name: String,
    source_dir: Option<PathBuf>,
    signature: DeclaredSignature,
    body: HostBody,
}

impl HostFunction {
    /// `module` may be a Rust module path; `::` separators become `.`.
    pub fn new<F>(module: &str, name: &str, signature: DeclaredSignature, body: F) -> Self
    where
        F: Fn(&BoundArgs<'_>) -> Result<Value> + 'static,
    {
        HostFunction {
            module: module.replace("::", "."),
            name: name.to_string(),
            source_dir: None,
            signature,
            body: Rc::new(body),
        }
    }

    /// Record the directory the function is declared in.
    pub fn declared_in(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `module.name`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    pub fn signature(&self) -> &DeclaredSignature {
        &self.signature
    }
}

impl Callable for HostFunction {
    fn call(&self, args: &CallArgs) -> Result<Value> {
        let bound = bind(args, &self.signature)?;
        (self.body)(&bound)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("source_dir", &self.source_dir)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Declare a [`HostFunction`] in the calling module.
///
/// The module path comes from `module_path!()` and the source directory
/// from the calling crate's manifest directory.
///
/// ```
/// use loial_build::host_function;
/// use loial_core::{DeclaredSignature, Value};
///
/// let double = host_function!("double", DeclaredSignature::new().arg("a"), |args| {
///     Ok(Value::Int(args.int("a")? * 2))
/// });
/// assert_eq!(double.name(), "double");
/// ```
#[macro_export]
macro_rules! host_function {
    ($name:expr, $signature:expr, $body:expr $(,)?) => {
        $crate::HostFunction::new(::std::module_path!(), $name, $signature, $body)
            .declared_in(::std::env!("CARGO_MANIFEST_DIR"))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use loial_core::call_args;

    fn adder() -> HostFunction {
        HostFunction::new(
            "demo::math",
            "add",
            DeclaredSignature::new().arg("a").arg("b"),
            |args| Ok(Value::Int(args.int("a")? + args.int("b")?)),
        )
    }

    #[test]
    fn module_path_separators_are_normalised() {
        let function = adder();
        assert_eq!(function.module(), "demo.math");
        assert_eq!(function.qualified_name(), "demo.math.add");
        assert!(function.source_dir().is_none());
    }

    #[test]
    fn calling_binds_then_runs_the_body() {
        let function = adder();
        assert_eq!(function.call(&call_args![2; b = 5]).unwrap(), Value::Int(7));
    }

    #[test]
    fn binding_errors_are_reported() {
        let err = adder().call(&call_args![2]).unwrap_err();
        assert_eq!(err.to_string(), "missing required argument: b");
    }

    #[test]
    fn macro_records_module_and_directory() {
        let function = crate::host_function!("noop", DeclaredSignature::new(), |_| Ok(Value::None));
        assert_eq!(function.module(), "loial_build.function.tests");
        assert_eq!(
            function.source_dir(),
            Some(Path::new(env!("CARGO_MANIFEST_DIR")))
        );
    }
}
