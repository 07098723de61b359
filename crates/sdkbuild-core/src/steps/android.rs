//! Android NDK and SDK command-line tools.

use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::error::DepsError;
use crate::io::download::download;
use crate::io::extract::extract;
use crate::io::remove_all;

const REPOSITORY_URL: &str = "https://dl.google.com/android/repository";

/// Licence prompts answered by `sdkmanager --licenses`.
const LICENSE_ANSWERS: usize = 64;

/// # Errors
///
/// Propagates download and extraction failures.
pub fn install_ndk(ctx: &Context, version: &str) -> Result<(), DepsError> {
    let archive = download(
        &ctx.env,
        &format!("{REPOSITORY_URL}/android-ndk-{version}-linux.zip"),
        ctx.layout.source_dir(),
        None,
    )?;
    let install_dir = ctx.layout.install_dir();
    remove_all(&install_dir.join("android-ndk"))?;
    extract(&archive, install_dir, "android-ndk", None)?;
    Ok(())
}

/// Root of the SDK installed by [`install_sdk_cmdline_tools`].
pub fn sdk_root(install_dir: &Path) -> PathBuf {
    install_dir.join("android-sdk-cmdline-tools")
}

/// Directory holding `sdkmanager`.
pub fn sdk_bin_dir(install_dir: &Path) -> PathBuf {
    sdk_root(install_dir).join("cmdline-tools").join("bin")
}

/// An Android SDK the user already set up through `ANDROID_SDK_ROOT`.
pub fn existing_sdk_root(ctx: &Context) -> Option<PathBuf> {
    ctx.env
        .var("ANDROID_SDK_ROOT")
        .map(PathBuf::from)
        .filter(|root| root.exists())
}

/// Install the command-line tools and accept every SDK licence.
///
/// # Errors
///
/// Propagates download, extraction and `sdkmanager` failures.
pub fn install_sdk_cmdline_tools(ctx: &Context, version: &str) -> Result<(), DepsError> {
    let archive = download(
        &ctx.env,
        &format!("{REPOSITORY_URL}/commandlinetools-linux-{version}_latest.zip"),
        ctx.layout.source_dir(),
        None,
    )?;
    let tools_dir = sdk_root(ctx.layout.install_dir());
    remove_all(&tools_dir)?;
    extract(&archive, &tools_dir, "cmdline-tools", None)?;

    let sdkmanager = sdk_bin_dir(ctx.layout.install_dir()).join("sdkmanager");
    ctx.env
        .command(sdkmanager.to_string_lossy())
        .arg(format!("--sdk_root={}", tools_dir.display()))
        .arg("--licenses")
        .stdin_bytes("y\n".repeat(LICENSE_ANSWERS))
        .run()?;
    Ok(())
}

/// Make the installed SDK visible to later tools.
pub fn apply_sdk_env(ctx: &mut Context) {
    let install_dir = ctx.layout.install_dir().to_path_buf();
    ctx.env.prepend_path(sdk_bin_dir(&install_dir));
    ctx.env
        .set_var("ANDROID_SDK_ROOT", sdk_root(&install_dir).to_string_lossy());
}

/// `llvm-readelf` from the installed NDK.
pub fn ndk_readelf(install_dir: &Path) -> PathBuf {
    ndk_toolchain_bin(install_dir).join("llvm-readelf")
}

/// Prebuilt LLVM toolchain shipped inside the NDK.
pub fn ndk_toolchain_bin(install_dir: &Path) -> PathBuf {
    install_dir
        .join("android-ndk")
        .join("toolchains/llvm/prebuilt/linux-x86_64/bin")
}

/// Sysroot shipped inside the NDK.
pub fn ndk_sysroot(install_dir: &Path) -> PathBuf {
    install_dir
        .join("android-ndk")
        .join("toolchains/llvm/prebuilt/linux-x86_64/sysroot")
}
