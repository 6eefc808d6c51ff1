//! Compiler configuration.
//!
//! A [`CompilerConfig`] can be built in code with the `with_*` methods or
//! loaded from TOML:
//!
//! ```toml
//! cache-search-path = ["/var/cache/loial", "./loial"]
//! compiler = "clang"
//! compiler-flags = ["-fPIC", "-shared", "-xc", "-O2"]
//! includes = ["include"]
//! refs = ["out"]
//! delete-on-exit = true
//! ```

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Deserialize;

use crate::cache::{dirs_or_home, ArtifactCache};
use crate::error::Result;

/// Configuration handle shared between a registry and its backends.
pub type SharedConfig = Rc<RefCell<CompilerConfig>>;

/// Settings for compiling and calling native replacements.
#[derive(Debug, Clone, Deserialize)]
pub struct CompilerConfig {
    /// Candidate cache directories, first usable wins.
    #[serde(default = "default_cache_search_path", alias = "cache-search-path")]
    pub cache_search_path: Vec<PathBuf>,
    /// Compiler executable.
    #[serde(default = "default_compiler")]
    pub compiler: String,
    /// Flags passed before the output path.
    #[serde(default = "default_compiler_flags", alias = "compiler-flags")]
    pub compiler_flags: Vec<String>,
    /// Extra `-I` directories.
    #[serde(default)]
    pub includes: Vec<PathBuf>,
    /// Extra source files compiled with the embedded code.
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    /// Parameter names always passed by reference.
    #[serde(default)]
    pub refs: BTreeSet<String>,
    /// Native symbol to call instead of the host function's name.
    #[serde(default)]
    pub function: Option<String>,
    /// Remove artifacts when they are dropped.
    #[serde(default, alias = "delete-on-exit")]
    pub delete_on_exit: bool,
    #[serde(skip)]
    cache: ArtifactCache,
}

fn default_cache_search_path() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs_or_home() {
        paths.push(home.join(".loial"));
    }
    paths.push(PathBuf::from("./loial"));
    paths
}

fn default_compiler() -> String {
    "cc".to_string()
}

fn default_compiler_flags() -> Vec<String> {
    ["-fPIC", "-shared", "-xc"].iter().map(|f| f.to_string()).collect()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            cache_search_path: default_cache_search_path(),
            compiler: default_compiler(),
            compiler_flags: default_compiler_flags(),
            includes: Vec::new(),
            sources: Vec::new(),
            refs: BTreeSet::new(),
            function: None,
            delete_on_exit: false,
            cache: ArtifactCache::default(),
        }
    }
}

impl CompilerConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Wrap into a handle that can be shared with a registry.
    pub fn shared(self) -> SharedConfig {
        Rc::new(RefCell::new(self))
    }

    /// The cache directory, resolved from the search path on first use.
    pub fn cache_dir(&mut self) -> PathBuf {
        self.cache.resolve(&self.cache_search_path)
    }

    /// The cache directory if already resolved.
    pub fn resolved_cache_dir(&self) -> Option<&Path> {
        self.cache.resolved()
    }

    /// Override the cache directory; `None` resolves it again on next use.
    pub fn set_cache_dir(&mut self, dir: Option<PathBuf>) {
        self.cache.set(dir);
    }

    /// Remove the cache directory with everything in it.
    pub fn clean_cache(&mut self) {
        self.cache.clear();
    }

    pub fn with_cache_search_path(mut self, paths: Vec<PathBuf>) -> Self {
        self.cache_search_path = paths;
        self.cache.set(None);
        self
    }

    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = compiler.into();
        self
    }

    pub fn with_compiler_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compiler_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.includes.push(dir.into());
        self
    }

    pub fn with_source(mut self, file: impl Into<PathBuf>) -> Self {
        self.sources.push(file.into());
        self
    }

    /// Always pass the parameter called `name` by reference.
    pub fn with_ref(mut self, name: impl Into<String>) -> Self {
        self.refs.insert(name.into());
        self
    }

    pub fn with_function(mut self, symbol: impl Into<String>) -> Self {
        self.function = Some(symbol.into());
        self
    }

    pub fn with_delete_on_exit(mut self, delete: bool) -> Self {
        self.delete_on_exit = delete;
        self
    }
}
