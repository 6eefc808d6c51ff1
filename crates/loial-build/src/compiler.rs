//! Compiling embedded C source into loadable artifacts.
//!
//! The embedded source is combined with the bridge prelude and a generated
//! bridge for the target symbol into one translation unit. The unit's hash
//! keys the artifact, so an unchanged unit is loaded straight from the cache.

use std::env::consts::DLL_EXTENSION;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use loial_core::{SourceHash, TypeHint};
use loial_ffi::bridge::prelude;
use loial_ffi::{find_signature, generate_bridge, CSignature, LoadedArtifact};
use tracing::{debug, error, warn};

use crate::config::CompilerConfig;
use crate::error::{BuildError, Result};
use crate::function::HostFunction;

/// A compiled and loaded replacement.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    unit: Option<PathBuf>,
    symbol: String,
    key: String,
    compiled: bool,
    delete_on_exit: bool,
    removed: bool,
    library: Option<LoadedArtifact>,
}

impl Artifact {
    /// Path of the shared library.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the written translation unit, when compiled from files.
    pub fn unit_path(&self) -> Option<&Path> {
        self.unit.as_deref()
    }

    /// Native symbol the bridge was generated for.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Hex key derived from the translation unit.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `false` when an existing artifact was reused.
    pub fn compiled(&self) -> bool {
        self.compiled
    }

    pub fn library(&self) -> Option<&LoadedArtifact> {
        self.library.as_ref()
    }

    /// Remove the artifact file (and its translation unit) when configured
    /// to delete on exit. Safe to call more than once; the library stays
    /// loaded.
    pub fn teardown(&mut self) {
        if !self.delete_on_exit || self.removed {
            return;
        }
        self.removed = true;
        for path in std::iter::once(&self.path).chain(self.unit.as_ref()) {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed artifact"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove artifact"),
            }
        }
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if self.delete_on_exit {
            // Unload first so the file can be removed on every platform.
            self.library.take();
        }
        self.teardown();
    }
}

/// Build (or reuse) the artifact for `function` from `source`.
///
/// Failures are logged and yield `None`; the caller keeps the original
/// function.
pub fn ensure(source: &str, function: &HostFunction, config: &mut CompilerConfig) -> Option<Artifact> {
    match try_ensure(source, function, config) {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            error!(function = %function.qualified_name(), error = %e, "native build failed, keeping the original function");
            None
        }
    }
}

/// Like [`ensure`], reporting why the build failed.
pub fn try_ensure(
    source: &str,
    function: &HostFunction,
    config: &mut CompilerConfig,
) -> Result<Artifact> {
    let symbol = config
        .function
        .clone()
        .unwrap_or_else(|| function.name().to_string());
    let unit = translation_unit(
        source,
        &symbol,
        function.signature().return_hint(),
        &config.sources,
    );
    let key = SourceHash::compute(&unit).key().to_string();

    let cache_dir = config.cache_dir();
    let prefix = artifact_prefix(function);
    let path = cache_dir.join(format!("{prefix}{key}.{DLL_EXTENSION}"));
    let unit_path = (!config.sources.is_empty()).then(|| cache_dir.join(format!("{prefix}{key}.c")));

    sweep(&cache_dir, &prefix, &key);

    let compiled = if path.exists() {
        debug!(path = %path.display(), "reusing cached artifact");
        false
    } else {
        if let Some(unit_path) = &unit_path {
            fs::write(unit_path, &unit).map_err(|e| BuildError::CacheError {
                path: unit_path.clone(),
                detail: e.to_string(),
            })?;
        }
        run_toolchain(config, function, &unit, &path, unit_path.as_deref())?;
        true
    };

    let library = LoadedArtifact::load(&path)?;
    Ok(Artifact {
        path,
        unit: unit_path,
        symbol,
        key,
        compiled,
        delete_on_exit: config.delete_on_exit,
        removed: false,
        library: Some(library),
    })
}

/// `{module}.{function}_`, the file name prefix shared by every artifact of
/// one function.
fn artifact_prefix(function: &HostFunction) -> String {
    format!("{}.{}_", function.module(), function.name())
}

/// Prelude, embedded source and the bridge for `symbol`.
fn translation_unit(
    source: &str,
    symbol: &str,
    return_hint: Option<&TypeHint>,
    extra_sources: &[PathBuf],
) -> String {
    let mut unit = String::new();
    unit.push_str(&prelude());
    unit.push('\n');
    unit.push_str(source);
    unit.push('\n');
    match locate(source, symbol, extra_sources) {
        Some((signature, declare)) => {
            unit.push('\n');
            unit.push_str(&generate_bridge(&signature, return_hint, declare));
        }
        None => warn!(symbol, "no C definition found, the artifact will have no bridge"),
    }
    unit
}

/// Find `symbol` in the embedded source, then in the extra source files.
/// The flag is set when the bridge must declare the prototype itself.
fn locate(source: &str, symbol: &str, extra_sources: &[PathBuf]) -> Option<(CSignature, bool)> {
    match find_signature(source, symbol) {
        Ok(Some(signature)) => return Some((signature, false)),
        Ok(None) => {}
        Err(e) => {
            warn!(symbol, error = %e, "unsupported C signature");
            return None;
        }
    }
    for path in extra_sources {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read source file");
                continue;
            }
        };
        match find_signature(&text, symbol) {
            Ok(Some(signature)) => return Some((signature, true)),
            Ok(None) => {}
            Err(e) => {
                warn!(symbol, path = %path.display(), error = %e, "unsupported C signature");
                return None;
            }
        }
    }
    None
}

/// Remove artifacts of the same function built from other sources.
fn sweep(cache_dir: &Path, prefix: &str, key: &str) {
    let pattern = format!(
        "{}/{}*",
        glob::Pattern::escape(&cache_dir.to_string_lossy()),
        glob::Pattern::escape(prefix)
    );
    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(pattern, error = %e, "invalid artifact pattern");
            return;
        }
    };
    for path in entries.flatten() {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((stale, extension)) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.split_once('.'))
        else {
            continue;
        };
        if stale == key
            || !SourceHash::is_key(stale)
            || !(extension == DLL_EXTENSION || extension == "c")
        {
            continue;
        }
        debug!(path = %path.display(), "removing stale artifact");
        if let Err(e) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "failed to remove stale artifact");
        }
    }
}

fn include_dirs<'a>(config: &'a CompilerConfig, function: &'a HostFunction) -> Vec<&'a Path> {
    let mut dirs: Vec<&Path> = config.includes.iter().map(PathBuf::as_path).collect();
    if let Some(dir) = function.source_dir() {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

/// Run the compiler, feeding `unit` on stdin unless it was written to
/// `unit_path`.
fn run_toolchain(
    config: &CompilerConfig,
    function: &HostFunction,
    unit: &str,
    output: &Path,
    unit_path: Option<&Path>,
) -> Result<()> {
    let mut command = Command::new(&config.compiler);
    for dir in include_dirs(config, function) {
        command.arg("-I").arg(dir);
    }
    command.args(&config.compiler_flags).arg("-o").arg(output);
    match unit_path {
        Some(unit_path) => {
            command.arg(unit_path).args(&config.sources).stdin(Stdio::null());
        }
        None => {
            command.arg("-").stdin(Stdio::piped());
        }
    }
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    debug!(command = ?command, "invoking compiler");

    let mut child = command.spawn().map_err(|source| BuildError::Spawn {
        compiler: config.compiler.clone(),
        source,
    })?;
    let writer = child.stdin.take().map(|mut stdin| {
        let unit = unit.to_string();
        thread::spawn(move || stdin.write_all(unit.as_bytes()))
    });
    let result = child.wait_with_output()?;
    if let Some(Ok(Err(e))) = writer.map(|w| w.join()) {
        debug!(error = %e, "compiler closed stdin early");
    }

    if !result.status.success() {
        return Err(BuildError::CompileFailed {
            function: function.qualified_name(),
            status: result.status.to_string(),
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
        });
    }
    debug!(
        path = %output.display(),
        stdout = %String::from_utf8_lossy(&result.stdout),
        "compiled artifact"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loial_core::{DeclaredSignature, NativeType, Value};

    fn function(name: &str) -> HostFunction {
        HostFunction::new("tests", name, DeclaredSignature::new(), |_| Ok(Value::None))
    }

    #[test]
    fn unit_contains_source_and_bridge() {
        let unit = translation_unit("int fun(int a) { return a; }", "fun", None, &[]);
        assert!(unit.contains("int fun(int a) { return a; }"));
        assert!(unit.contains("loial_bridge_fun"));
        assert!(unit.contains("loial_meta_fun"));
    }

    #[test]
    fn unit_without_definition_has_no_bridge() {
        let unit = translation_unit("int other(void) { return 0; }", "fun", None, &[]);
        assert!(!unit.contains("loial_bridge_fun"));
    }

    #[test]
    fn definition_in_extra_source_is_declared() {
        let dir = tempfile::tempdir().unwrap();
        let extra = dir.path().join("ext.c");
        fs::write(&extra, "long ext(long a) { return a * 7; }\n").unwrap();

        let (signature, declare) = locate("static int unused;", "ext", &[extra]).unwrap();
        assert!(declare);
        assert_eq!(signature.name, "ext");
    }

    #[test]
    fn return_hint_changes_the_key() {
        let source = "int fun(int a) { return a; }";
        let plain = translation_unit(source, "fun", None, &[]);
        let hinted = translation_unit(
            source,
            "fun",
            Some(&TypeHint::Native(NativeType::Double)),
            &[],
        );
        assert_ne!(SourceHash::compute(&plain), SourceHash::compute(&hinted));
    }

    #[test]
    fn sweep_removes_only_stale_keys_of_the_same_function() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = artifact_prefix(&function("fun"));
        let current = "0123456789abcdef";
        let names = [
            format!("{prefix}{current}.{DLL_EXTENSION}"),
            format!("{prefix}fedcba9876543210.{DLL_EXTENSION}"),
            format!("{prefix}fedcba9876543210.c"),
            format!("tests.fun_x_fedcba9876543210.{DLL_EXTENSION}"),
            format!("tests.other_fedcba9876543210.{DLL_EXTENSION}"),
            format!("{prefix}fedcba9876543210.txt"),
        ];
        for name in &names {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        sweep(dir.path(), &prefix, current);

        let exists = |name: &String| dir.path().join(name).exists();
        assert!(exists(&names[0]));
        assert!(!exists(&names[1]));
        assert!(!exists(&names[2]));
        assert!(exists(&names[3]));
        assert!(exists(&names[4]));
        assert!(exists(&names[5]));
    }

    #[test]
    fn missing_compiler_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CompilerConfig::default()
            .with_cache_search_path(vec![dir.path().to_path_buf()])
            .with_compiler("loial-no-such-compiler");
        let err = try_ensure("int fun(void) { return 1; }", &function("fun"), &mut config)
            .unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }));
        assert!(ensure("int fun(void) { return 1; }", &function("fun"), &mut config).is_none());
    }

    #[test]
    fn include_dirs_add_source_dir_once() {
        let config = CompilerConfig::default().with_include("/opt/include");
        let host = function("fun").declared_in("/opt/include");
        assert_eq!(include_dirs(&config, &host), vec![Path::new("/opt/include")]);

        let host = function("fun").declared_in("/src");
        assert_eq!(
            include_dirs(&config, &host),
            vec![Path::new("/opt/include"), Path::new("/src")]
        );
    }

    fn unloaded(path: &Path, delete_on_exit: bool) -> Artifact {
        Artifact {
            path: path.to_path_buf(),
            unit: None,
            symbol: "fun".to_string(),
            key: "0123456789abcdef".to_string(),
            compiled: true,
            delete_on_exit,
            removed: false,
            library: None,
        }
    }

    #[test]
    fn teardown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.so");
        fs::write(&path, b"").unwrap();
        let mut artifact = unloaded(&path, true);
        artifact.teardown();
        assert!(!path.exists());
        artifact.teardown();
    }

    #[test]
    fn teardown_keeps_artifacts_unless_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.so");
        fs::write(&path, b"").unwrap();
        let mut artifact = unloaded(&path, false);
        artifact.teardown();
        drop(artifact);
        assert!(path.exists());
    }
}
