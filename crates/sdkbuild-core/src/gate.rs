//! Version-gated execution.
//!
//! Each installation step is wrapped in a [`VersionGate`]. After the step
//! succeeds the gate records the version it installed in a marker; the next
//! run compares the requested version with the marker and skips the step
//! when they match. A failed step never writes the marker, so it is retried.
//!
//! The marker is trusted as-is: if the installed files are deleted or
//! damaged while the marker survives, the step will not run again until the
//! marker is cleared (`--force <dep>`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Storage for the last successfully installed version of one dependency.
pub trait Marker {
    /// Recorded version, or `None` if nothing was recorded.
    fn read(&self) -> io::Result<Option<String>>;
    /// Record `version` verbatim.
    fn write(&mut self, version: &str) -> io::Result<()>;
    /// Forget any recorded version. Clearing an absent marker succeeds.
    fn clear(&mut self) -> io::Result<()>;
}

/// A `<dep>.version` file holding the raw version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMarker {
    path: PathBuf,
}

impl FileMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Marker for FileMarker {
    fn read(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, version: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, version)
    }

    fn clear(&mut self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Runs a step only when the requested version differs from the marker.
#[derive(Debug)]
pub struct VersionGate<M: Marker> {
    marker: M,
    ignore_cache: bool,
}

impl<M: Marker> VersionGate<M> {
    pub fn new(marker: M) -> Self {
        Self {
            marker,
            ignore_cache: false,
        }
    }

    /// Clear the marker before checking it, forcing the step to run.
    pub fn ignore_cache(mut self, ignore: bool) -> Self {
        self.ignore_cache = ignore;
        self
    }

    pub fn marker(&self) -> &M {
        &self.marker
    }

    /// Whether `version` is already recorded (surrounding whitespace ignored).
    ///
    /// # Errors
    ///
    /// Propagates marker read failures.
    pub fn is_current(&self, version: &str) -> io::Result<bool> {
        Ok(self
            .marker
            .read()?
            .is_some_and(|recorded| recorded.trim() == version.trim()))
    }

    /// Run `step` unless `version` is already installed.
    ///
    /// Returns `Ok(None)` when skipped and `Ok(Some(value))` after a
    /// successful run, at which point `version` has been recorded verbatim.
    /// A failing step leaves the marker untouched.
    ///
    /// # Errors
    ///
    /// Returns the step's error, or a marker I/O error converted into `E`.
    pub fn execute<T, E, F>(&mut self, version: &str, step: F) -> Result<Option<T>, E>
    where
        F: FnOnce(&str) -> Result<T, E>,
        E: From<io::Error>,
    {
        if self.ignore_cache {
            self.marker.clear()?;
        }

        if self.is_current(version)? {
            tracing::debug!("{version} is already installed, skipping");
            return Ok(None);
        }

        let value = step(version)?;
        self.marker.write(version)?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct MemoryMarker {
        value: Option<String>,
        writes: usize,
        clears: usize,
    }

    impl Marker for MemoryMarker {
        fn read(&self) -> io::Result<Option<String>> {
            Ok(self.value.clone())
        }

        fn write(&mut self, version: &str) -> io::Result<()> {
            self.writes += 1;
            self.value = Some(version.to_string());
            Ok(())
        }

        fn clear(&mut self) -> io::Result<()> {
            self.clears += 1;
            self.value = None;
            Ok(())
        }
    }

    fn ok_step(runs: &mut usize) -> impl FnOnce(&str) -> Result<(), io::Error> + '_ {
        move |_| {
            *runs += 1;
            Ok(())
        }
    }

    #[test]
    fn test_second_run_is_skipped() {
        let mut gate = VersionGate::new(MemoryMarker::default());
        let mut runs = 0;

        assert_eq!(gate.execute("1.83.0", ok_step(&mut runs)).unwrap(), Some(()));
        assert_eq!(gate.execute("1.83.0", ok_step(&mut runs)).unwrap(), None);
        assert_eq!(runs, 1);
        assert_eq!(gate.marker().value.as_deref(), Some("1.83.0"));
    }

    #[test]
    fn test_version_change_reruns() {
        let mut gate = VersionGate::new(MemoryMarker {
            value: Some("1.82.0".into()),
            ..MemoryMarker::default()
        });
        let mut runs = 0;
        gate.execute("1.83.0", ok_step(&mut runs)).unwrap();
        assert_eq!(runs, 1);
        assert_eq!(gate.marker().value.as_deref(), Some("1.83.0"));
    }

    #[test]
    fn test_whitespace_is_ignored_when_comparing_only() {
        let mut gate = VersionGate::new(MemoryMarker {
            value: Some("m120.6099.1.0\n".into()),
            ..MemoryMarker::default()
        });
        let mut runs = 0;
        assert_eq!(
            gate.execute("  m120.6099.1.0", ok_step(&mut runs)).unwrap(),
            None
        );
        assert_eq!(runs, 0);

        // A real run records the requested string exactly.
        let mut gate = VersionGate::new(MemoryMarker::default());
        gate.execute(" v2 ", ok_step(&mut runs)).unwrap();
        assert_eq!(gate.marker().value.as_deref(), Some(" v2 "));
    }

    #[test]
    fn test_failure_leaves_marker_alone() {
        let mut gate = VersionGate::new(MemoryMarker {
            value: Some("old".into()),
            ..MemoryMarker::default()
        });
        let result: Result<Option<()>, io::Error> =
            gate.execute("new", |_| Err(io::Error::other("boom")));
        assert!(result.is_err());
        assert_eq!(gate.marker().value.as_deref(), Some("old"));
        assert_eq!(gate.marker().writes, 0);
    }

    #[test]
    fn test_ignore_cache_forces_run() {
        let mut gate = VersionGate::new(MemoryMarker {
            value: Some("3.27.7".into()),
            ..MemoryMarker::default()
        })
        .ignore_cache(true);
        let mut runs = 0;
        assert_eq!(gate.execute("3.27.7", ok_step(&mut runs)).unwrap(), Some(()));
        assert_eq!(runs, 1);
        assert_eq!(gate.marker().clears, 1);
    }

    #[test]
    fn test_step_receives_version() {
        let mut gate = VersionGate::new(MemoryMarker::default());
        let seen: Option<String> = gate
            .execute("r26b", |v| Ok::<_, io::Error>(v.to_string()))
            .unwrap();
        assert_eq!(seen.as_deref(), Some("r26b"));
    }

    #[test]
    fn test_file_marker_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("install/boost.version");
        let mut gate = VersionGate::new(FileMarker::new(&path));
        let mut runs = 0;

        gate.execute("1.83.0", ok_step(&mut runs)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1.83.0");

        let mut gate = VersionGate::new(FileMarker::new(&path));
        gate.execute("1.83.0", ok_step(&mut runs)).unwrap();
        assert_eq!(runs, 1);

        let mut gate = VersionGate::new(FileMarker::new(&path)).ignore_cache(true);
        let result: Result<Option<()>, io::Error> =
            gate.execute("1.83.0", |_| Err(io::Error::other("interrupted")));
        assert!(result.is_err());
        assert!(!path.exists());
    }
}
