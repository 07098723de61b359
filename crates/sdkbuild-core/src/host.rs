//! Build-host introspection.

use sdkbuild_schema::{Arch, Os, PlatformDescriptor, PlatformError, VersionMap};

use crate::error::DepsError;
use crate::tools::ToolEnv;

/// Where Linux distributions describe themselves.
pub const OS_RELEASE: &str = "/etc/os-release";

/// Describe the machine sdkbuild is running on.
///
/// # Errors
///
/// [`PlatformError::UnsupportedPlatform`] for an OS or CPU the pipeline
/// cannot build on, or a Linux distribution other than Ubuntu.
pub fn build_platform(env: &ToolEnv) -> Result<PlatformDescriptor, DepsError> {
    let (os, os_version) = host_os(env)?;
    let arch = Arch::host().ok_or_else(|| {
        PlatformError::UnsupportedPlatform(format!(
            "Arch {} not supported",
            std::env::consts::ARCH
        ))
    })?;
    Ok(PlatformDescriptor {
        os,
        os_version,
        arch: Some(arch),
    })
}

/// OS family and release from an `os-release` file.
///
/// # Errors
///
/// Fails when `NAME` or `VERSION_ID` is missing or the distribution is not Ubuntu.
pub fn linux_os(release: &VersionMap) -> Result<(Os, Option<String>), DepsError> {
    let name = release.get("NAME")?;
    if name != "Ubuntu" {
        return Err(PlatformError::UnsupportedPlatform(format!("OS {name} not supported")).into());
    }
    Ok((Os::Ubuntu, Some(release.get("VERSION_ID")?.to_string())))
}

#[cfg(target_os = "linux")]
fn host_os(_env: &ToolEnv) -> Result<(Os, Option<String>), DepsError> {
    let release = VersionMap::load(std::path::Path::new(OS_RELEASE))?;
    linux_os(&release)
}

#[cfg(target_os = "macos")]
fn host_os(env: &ToolEnv) -> Result<(Os, Option<String>), DepsError> {
    let version = match env.command("sw_vers").arg("-productVersion").capture() {
        Ok(version) if !version.is_empty() => Some(version),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Could not determine macOS version: {e}");
            None
        }
    };
    Ok((Os::Macos, version))
}

#[cfg(windows)]
fn host_os(_env: &ToolEnv) -> Result<(Os, Option<String>), DepsError> {
    Ok((Os::Windows, None))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
fn host_os(_env: &ToolEnv) -> Result<(Os, Option<String>), DepsError> {
    Err(PlatformError::UnsupportedPlatform(format!("OS {} not supported", std::env::consts::OS)).into())
}
