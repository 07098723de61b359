//! CUDA's `nvcc` component, unpacked from the Windows network installer.

use crate::context::Context;
use crate::error::DepsError;
use crate::io::download::download;
use crate::io::remove_all;

/// Installer for a supported CUDA release.
///
/// # Errors
///
/// Fails for any version without a known installer.
pub fn installer_url(version: &str) -> Result<&'static str, DepsError> {
    match version {
        "10.2.89-1" => Ok(
            "http://developer.download.nvidia.com/compute/cuda/10.2/Prod/local_installers/cuda_10.2.89_441.22_win10.exe",
        ),
        other => Err(DepsError::context("resolving CUDA installer", format!("Unknown CUDA version {other}"))),
    }
}

/// # Errors
///
/// Propagates download, `7z` and filesystem failures.
pub fn install(ctx: &Context, version: &str) -> Result<(), DepsError> {
    let build_dir = ctx.layout.build_dir().join("cuda");
    let install_dir = ctx.layout.install_dir().join("cuda");
    remove_all(&build_dir)?;
    remove_all(&install_dir)?;

    let installer = download(&ctx.env, installer_url(version)?, ctx.layout.source_dir(), None)?;
    std::fs::create_dir_all(&build_dir)?;
    std::fs::create_dir_all(&install_dir)?;

    ctx.env
        .command("7z")
        .arg("x")
        .arg(&installer)
        .current_dir(&build_dir)
        .run()?;
    std::fs::rename(build_dir.join("nvcc"), install_dir.join("nvcc"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_known_releases_resolve() {
        assert!(installer_url("10.2.89-1").unwrap().ends_with("cuda_10.2.89_441.22_win10.exe"));

        let err = installer_url("11.0.0").unwrap_err();
        assert!(err.to_string().contains("Unknown CUDA version 11.0.0"));
    }
}
