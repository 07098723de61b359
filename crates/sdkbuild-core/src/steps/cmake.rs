//! A pinned CMake release for the build host.

use std::path::{Path, PathBuf};

use sdkbuild_schema::{Arch, Os, PlatformDescriptor, PlatformError};

use crate::context::Context;
use crate::error::DepsError;
use crate::io::download::download;
use crate::io::extract::extract;

const RELEASES_URL: &str = "https://github.com/Kitware/CMake/releases/download";

/// Release asset platform and archive extension for the build host.
///
/// # Errors
///
/// [`PlatformError::UnsupportedPlatform`] when no release is published for
/// the host.
pub fn release_platform(build: &PlatformDescriptor) -> Result<(&'static str, &'static str), PlatformError> {
    match (build.os, build.arch) {
        (Os::Windows, Some(Arch::X86_64)) => Ok(("windows-x86_64", "zip")),
        (Os::Macos, _) => Ok(("macos-universal", "tar.gz")),
        (Os::Ubuntu, Some(Arch::X86_64)) => Ok(("linux-x86_64", "tar.gz")),
        (Os::Ubuntu, Some(Arch::Arm64)) => Ok(("linux-aarch64", "tar.gz")),
        _ => Err(PlatformError::UnsupportedPlatform(format!(
            "no CMake release for {build}"
        ))),
    }
}

pub fn download_url(version: &str, platform: &str, ext: &str) -> String {
    format!("{RELEASES_URL}/v{version}/cmake-{version}-{platform}.{ext}")
}

/// Directory holding the `cmake` executable.
pub fn bin_dir(install_dir: &Path, build: &PlatformDescriptor) -> PathBuf {
    let cmake = install_dir.join("cmake");
    if build.os == Os::Macos {
        cmake.join("CMake.app").join("Contents").join("bin")
    } else {
        cmake.join("bin")
    }
}

/// # Errors
///
/// Propagates download and extraction failures.
pub fn install(ctx: &Context, version: &str) -> Result<(), DepsError> {
    let (platform, ext) = release_platform(ctx.build())?;
    let archive = download(
        &ctx.env,
        &download_url(version, platform, ext),
        ctx.layout.source_dir(),
        None,
    )?;
    let cmake_dir = extract(&archive, ctx.layout.install_dir(), "cmake", None)?;

    // Gradle's CMake integration looks for ninja next to cmake.
    #[cfg(unix)]
    {
        if platform.starts_with("linux") {
            std::os::unix::fs::symlink("/usr/bin/ninja", cmake_dir.join("bin").join("ninja"))?;
        }
    }
    #[cfg(not(unix))]
    let _ = cmake_dir;
    Ok(())
}

/// Put the installed `cmake` first on the search path.
pub fn apply_env(ctx: &mut Context) {
    let dir = bin_dir(ctx.layout.install_dir(), ctx.build());
    ctx.env.prepend_path(dir);
}
