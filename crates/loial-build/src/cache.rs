//! Resolution of the directory holding compiled artifacts.
//!
//! The first entry of the search path that can be created and written to
//! wins. When none can, an ephemeral `loial_*` directory is created and
//! owned by the cache; if even that fails the system temp directory is used.
//! Resolution never fails.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum Location {
    /// A directory from the search path, or one set explicitly.
    Configured(PathBuf),
    /// A temporary directory removed with the last handle.
    Ephemeral(Rc<TempDir>),
    /// The system temp directory; never removed.
    System(PathBuf),
}

impl Location {
    fn path(&self) -> &Path {
        match self {
            Location::Configured(path) | Location::System(path) => path,
            Location::Ephemeral(dir) => dir.path(),
        }
    }
}

/// Memoized cache directory.
#[derive(Debug, Clone, Default)]
pub struct ArtifactCache {
    location: Option<Location>,
}

impl ArtifactCache {
    /// The cache directory, resolving it from `search_path` on first use.
    pub fn resolve(&mut self, search_path: &[PathBuf]) -> PathBuf {
        if let Some(location) = &self.location {
            return location.path().to_path_buf();
        }
        let location = search(search_path);
        let path = location.path().to_path_buf();
        self.location = Some(location);
        path
    }

    /// The memoized directory, if resolved.
    pub fn resolved(&self) -> Option<&Path> {
        self.location.as_ref().map(Location::path)
    }

    /// Whether the directory is a temporary one created by this cache.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self.location, Some(Location::Ephemeral(_)))
    }

    /// Override the memoized directory; `None` forces a new search.
    pub fn set(&mut self, dir: Option<PathBuf>) {
        self.location = dir.map(Location::Configured);
    }

    /// Remove the resolved directory and everything in it, then forget it.
    /// Errors are ignored.
    pub fn clear(&mut self) {
        let Some(location) = self.location.take() else {
            return;
        };
        match &location {
            Location::Configured(path) => remove_tree(path),
            Location::Ephemeral(dir) => remove_tree(dir.path()),
            Location::System(_) => {}
        }
    }
}

fn remove_tree(path: &Path) {
    debug!(path = %path.display(), "removing cache directory");
    if let Err(e) = fs::remove_dir_all(path) {
        debug!(path = %path.display(), error = %e, "cache directory not removed");
    }
}

fn search(search_path: &[PathBuf]) -> Location {
    for candidate in search_path {
        match prepare(candidate) {
            Ok(()) => {
                debug!(path = %candidate.display(), "using cache directory");
                return Location::Configured(candidate.clone());
            }
            Err(e) => {
                debug!(path = %candidate.display(), error = %e, "cache directory unusable");
            }
        }
    }
    match tempfile::Builder::new().prefix("loial_").tempdir() {
        Ok(dir) => {
            debug!(path = %dir.path().display(), "using temporary cache directory");
            Location::Ephemeral(Rc::new(dir))
        }
        Err(e) => {
            warn!(error = %e, "no usable cache directory; using the system temp directory");
            Location::System(std::env::temp_dir())
        }
    }
}

/// Create `dir` if needed and check that files can be created in it.
fn prepare(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty path"));
    }
    fs::create_dir_all(dir)?;
    tempfile::Builder::new()
        .prefix(".loial-probe")
        .tempfile_in(dir)?;
    Ok(())
}

/// Get the user's home directory.
pub(crate) fn dirs_or_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_usable_entry_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("cache1");
        let second = dir.path().join("cache2");
        let mut cache = ArtifactCache::default();
        assert_eq!(cache.resolve(&[first.clone(), second]), first);
        assert!(first.is_dir());
        assert!(!cache.is_ephemeral());
    }

    #[test]
    fn unusable_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();
        let wanted = dir.path().join("cache2");

        let mut cache = ArtifactCache::default();
        let resolved = cache.resolve(&[PathBuf::new(), blocker.join("sub"), wanted.clone()]);
        assert_eq!(resolved, wanted);
    }

    #[test]
    fn all_unusable_falls_back_to_an_existing_directory() {
        let mut cache = ArtifactCache::default();
        let resolved = cache.resolve(&[PathBuf::new()]);
        assert!(resolved.is_dir());
        assert!(cache.is_ephemeral());

        cache.clear();
        assert!(!resolved.exists());
        assert!(cache.resolved().is_none());
    }

    #[test]
    fn resolution_is_memoized_until_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a");
        let mut cache = ArtifactCache::default();
        cache.resolve(&[first.clone()]);
        assert_eq!(cache.resolve(&[dir.path().join("b")]), first);

        cache.clear();
        assert!(!first.exists());
        assert_eq!(cache.resolve(&[dir.path().join("b")]), dir.path().join("b"));
    }

    #[test]
    fn set_overrides_and_none_forces_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ArtifactCache::default();
        cache.set(Some(dir.path().join("explicit")));
        assert_eq!(cache.resolve(&[dir.path().join("ignored")]), dir.path().join("explicit"));

        cache.set(None);
        assert_eq!(cache.resolve(&[dir.path().join("found")]), dir.path().join("found"));
    }

    #[test]
    fn clear_without_resolution_is_a_no_op() {
        let mut cache = ArtifactCache::default();
        cache.clear();
        assert!(cache.resolved().is_none());
    }
}
