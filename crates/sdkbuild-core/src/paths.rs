use std::path::{Path, PathBuf};

use sdkbuild_schema::PlatformDescriptor;

/// `debug` or `release`, the last component of every layout root.
pub fn configuration(debug: bool) -> &'static str {
    if debug { "debug" } else { "release" }
}

/// Forward-slash form of a path, as CMake expects on every host.
pub fn cmake_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// The four parallel trees a build writes to.
///
/// ```text
/// <root>/_source/<target>/<config>   downloaded archives, checkouts
/// <root>/_build/<target>/<config>    out-of-tree build directories
/// <root>/_install/<target>/<config>  installed dependencies + markers
/// <root>/_package/<target>/<config>  release archives
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    source: PathBuf,
    build: PathBuf,
    install: PathBuf,
    package: PathBuf,
}

impl InstallLayout {
    pub fn new(root: &Path, target: &PlatformDescriptor, debug: bool) -> Self {
        let tail = Path::new(&target.package_name()).join(configuration(debug));
        Self {
            root: root.to_path_buf(),
            source: root.join("_source").join(&tail),
            build: root.join("_build").join(&tail),
            install: root.join("_install").join(&tail),
            package: root.join("_package").join(&tail),
        }
    }

    /// Project root: holds `VERSION`, `multistrap/`, `test/` and the SDK sources.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_dir(&self) -> &Path {
        &self.source
    }

    pub fn build_dir(&self) -> &Path {
        &self.build
    }

    pub fn install_dir(&self) -> &Path {
        &self.install
    }

    pub fn package_dir(&self) -> &Path {
        &self.package
    }

    /// Create the source, build and install roots. The package root is only
    /// created when packaging.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn create_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.source, &self.build, &self.install] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Marker recording the installed version of `dep`.
    pub fn marker_path(&self, dep: &str) -> PathBuf {
        self.install.join(format!("{dep}.version"))
    }
}
