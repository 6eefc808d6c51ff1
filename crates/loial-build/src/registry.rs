//! Backend registry and the decorator that swaps function bodies.
//!
//! A [`BackendRegistry`] maps code-type tags (`"CC"`) to factories. Building
//! with [`BuildOptions`] gives a [`Decorator`]; wrapping a [`HostFunction`]
//! compiles the code and returns a [`Wrapper`] that calls the native
//! replacement, or the original function when no replacement could be made.

use std::collections::BTreeMap;
use std::fmt;

use loial_core::{CallArgs, Value};
use tracing::{debug, warn};

use crate::compiler::Artifact;
use crate::config::{CompilerConfig, SharedConfig};
use crate::error::Result;
use crate::function::HostFunction;

/// Tag of the built-in C backend.
pub const CC: &str = "CC";

/// Something that can be called with host arguments.
pub trait Callable: fmt::Debug {
    fn call(&self, args: &CallArgs) -> Result<Value>;

    /// The compiled artifact behind this callable, if any.
    fn artifact(&self) -> Option<&Artifact> {
        None
    }

    fn artifact_mut(&mut self) -> Option<&mut Artifact> {
        None
    }
}

/// Compiles embedded code into a replacement for a host function.
pub trait Backend {
    /// `None` when no replacement could be built.
    fn compile(&self, function: &HostFunction) -> Option<Box<dyn Callable>>;
}

/// Creates a backend for a piece of code and a configuration.
pub type BackendFactory = Box<dyn Fn(&str, SharedConfig) -> Box<dyn Backend>>;

/// Options for one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Embedded source; nothing is replaced without it.
    pub code: Option<String>,
    /// Backend tag.
    pub code_type: String,
    /// Configuration; the registry default when absent.
    pub config: Option<SharedConfig>,
    /// Whether to replace the function body at all.
    pub replace: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            code: None,
            code_type: CC.to_string(),
            config: None,
            replace: true,
        }
    }
}

impl BuildOptions {
    pub fn new(code: impl Into<String>) -> Self {
        BuildOptions {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn with_code_type(mut self, code_type: impl Into<String>) -> Self {
        self.code_type = code_type.into();
        self
    }

    /// Use `config` instead of the registry default.
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = Some(config.shared());
        self
    }

    pub fn with_shared_config(mut self, config: SharedConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

/// Registered backends and the default configuration.
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
    default_config: SharedConfig,
}

impl BackendRegistry {
    /// A registry without backends.
    pub fn new() -> Self {
        BackendRegistry {
            factories: BTreeMap::new(),
            default_config: CompilerConfig::default().shared(),
        }
    }

    /// A registry with the `"CC"` backend registered.
    pub fn with_builtin_backends() -> Self {
        let mut registry = Self::new();
        crate::cc::register(&mut registry);
        registry
    }

    /// Register `factory` under `code_type`, replacing any previous one.
    pub fn register(&mut self, code_type: impl Into<String>, factory: BackendFactory) {
        self.factories.insert(code_type.into(), factory);
    }

    /// Registered tags.
    pub fn backends(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// The configuration used by builds that do not bring their own.
    /// Changes apply to every later build.
    pub fn default_config(&self) -> SharedConfig {
        self.default_config.clone()
    }

    /// Restore the default configuration to its initial settings.
    pub fn reset_default_config(&self) {
        self.default_config.replace(CompilerConfig::default());
    }

    /// Remove the default configuration's cache directory.
    pub fn clean_cache(&self) {
        self.default_config.borrow_mut().clean_cache();
    }

    /// Prepare a decorator for `options`.
    pub fn build(&self, options: BuildOptions) -> Decorator {
        let backend = match (&options.code, options.replace) {
            (Some(code), true) => match self.factories.get(&options.code_type) {
                Some(factory) => {
                    let config = options.config.unwrap_or_else(|| self.default_config());
                    Some(factory(code.as_str(), config))
                }
                None => {
                    warn!(code_type = %options.code_type, "no backend registered");
                    None
                }
            },
            _ => None,
        };
        Decorator { backend }
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.factories.keys().collect::<Vec<_>>())
            .field("default_config", &self.default_config)
            .finish()
    }
}

/// Replaces host function bodies with compiled code.
pub struct Decorator {
    backend: Option<Box<dyn Backend>>,
}

impl Decorator {
    /// Wrap `function`, compiling its replacement now.
    pub fn wrap(&self, function: HostFunction) -> Wrapper {
        let replacement = self
            .backend
            .as_ref()
            .and_then(|backend| backend.compile(&function));
        debug!(
            function = %function.qualified_name(),
            replaced = replacement.is_some(),
            "wrapped host function"
        );
        Wrapper {
            function,
            replacement,
        }
    }
}

/// A host function together with its native replacement, if one was built.
#[derive(Debug)]
pub struct Wrapper {
    function: HostFunction,
    replacement: Option<Box<dyn Callable>>,
}

impl Wrapper {
    pub fn call(&self, args: &CallArgs) -> Result<Value> {
        match &self.replacement {
            Some(native) => native.call(args),
            None => self.function.call(args),
        }
    }

    /// Whether calls go to native code.
    pub fn is_replaced(&self) -> bool {
        self.replacement.is_some()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.replacement.as_ref().and_then(|native| native.artifact())
    }

    /// Tear the artifact down now rather than on drop.
    pub fn teardown(&mut self) {
        if let Some(native) = self.replacement.as_mut() {
            if let Some(artifact) = native.artifact_mut() {
                artifact.teardown();
            }
        }
    }

    pub fn function(&self) -> &HostFunction {
        &self.function
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loial_core::{call_args, DeclaredSignature};
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Constant(i64);

    impl Callable for Constant {
        fn call(&self, _args: &CallArgs) -> Result<Value> {
            Ok(Value::Int(self.0))
        }
    }

    struct ConstantBackend(i64);

    impl Backend for ConstantBackend {
        fn compile(&self, _function: &HostFunction) -> Option<Box<dyn Callable>> {
            Some(Box::new(Constant(self.0)))
        }
    }

    fn original() -> HostFunction {
        HostFunction::new("tests", "one", DeclaredSignature::new(), |_| Ok(Value::Int(1)))
    }

    fn registry() -> BackendRegistry {
        let mut registry = BackendRegistry::new();
        registry.register(
            "CONST",
            Box::new(|code: &str, _config: SharedConfig| -> Box<dyn Backend> {
                Box::new(ConstantBackend(code.parse().unwrap_or(0)))
            }),
        );
        registry
    }

    #[test]
    fn registered_backend_replaces_the_body() {
        let wrapper = registry()
            .build(BuildOptions::new("42").with_code_type("CONST"))
            .wrap(original());
        assert!(wrapper.is_replaced());
        assert!(wrapper.artifact().is_none());
        assert_eq!(wrapper.call(&call_args![]).unwrap(), Value::Int(42));
    }

    #[test]
    fn replace_false_keeps_the_original() {
        let wrapper = registry()
            .build(BuildOptions::new("42").with_code_type("CONST").replace(false))
            .wrap(original());
        assert!(!wrapper.is_replaced());
        assert_eq!(wrapper.call(&call_args![]).unwrap(), Value::Int(1));
    }

    #[test]
    fn unknown_code_type_keeps_the_original() {
        let wrapper = registry()
            .build(BuildOptions::new("42").with_code_type("FORTRAN"))
            .wrap(original());
        assert!(!wrapper.is_replaced());
    }

    #[test]
    fn missing_code_keeps_the_original() {
        let options = BuildOptions {
            code_type: "CONST".to_string(),
            ..BuildOptions::default()
        };
        let wrapper = registry().build(options).wrap(original());
        assert_eq!(wrapper.call(&call_args![]).unwrap(), Value::Int(1));
    }

    #[test]
    fn factories_receive_the_default_config() {
        let seen = Rc::new(Cell::new(false));
        let mut registry = BackendRegistry::new();
        registry.default_config().borrow_mut().compiler = "tcc".to_string();
        let flag = seen.clone();
        registry.register(
            "CHECK",
            Box::new(move |_code: &str, config: SharedConfig| -> Box<dyn Backend> {
                flag.set(config.borrow().compiler == "tcc");
                Box::new(ConstantBackend(0))
            }),
        );
        registry.build(BuildOptions::new("").with_code_type("CHECK"));
        assert!(seen.get());
    }

    #[test]
    fn reset_default_config_restores_defaults() {
        let registry = BackendRegistry::with_builtin_backends();
        let shared = registry.default_config();
        shared.borrow_mut().delete_on_exit = true;
        registry.reset_default_config();
        assert!(!shared.borrow().delete_on_exit);
        assert!(registry.backends().any(|tag| tag == CC));
    }
}
