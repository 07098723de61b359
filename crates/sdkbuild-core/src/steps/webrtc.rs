//! The media engine: prebuilt release archives or a build from source.

use std::path::PathBuf;

use sdkbuild_schema::{Os, PlatformDescriptor, VersionMap};

use crate::context::Context;
use crate::error::DepsError;
use crate::git;
use crate::io::download::download;
use crate::io::extract::extract;
use crate::io::remove_all;
use crate::paths::InstallLayout;

const RELEASES_URL: &str = "https://github.com/shiguredo-webrtc-build/webrtc-build/releases/download";
const BUILD_REPO_URL: &str = "https://github.com/shiguredo-webrtc-build/webrtc-build.git";

/// Flags forwarded to the upstream build script when building from source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebrtcBuildConfig {
    pub webrtcbuild_fetch: bool,
    pub webrtcbuild_fetch_force: bool,
    pub webrtc_fetch: bool,
    pub webrtc_fetch_force: bool,
    pub webrtc_gen: bool,
    pub webrtc_gen_force: bool,
    pub webrtc_extra_gn_args: String,
    pub webrtc_nobuild: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WebrtcSource {
    /// Download a release archive.
    #[default]
    Prebuilt,
    /// Check out the build repository and compile.
    Build(WebrtcBuildConfig),
}

impl WebrtcSource {
    pub fn is_prebuilt(&self) -> bool {
        matches!(self, Self::Prebuilt)
    }
}

/// Name the release archives use for `target`.
pub fn webrtc_platform(target: &PlatformDescriptor) -> String {
    match target.os {
        // Jetson ships the generic arm64 Ubuntu build.
        Os::Jetson => "ubuntu-20.04_armv8".to_string(),
        _ => target.package_name(),
    }
}

/// Locations of the installed media engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebrtcInfo {
    /// `KEY=VALUE` file describing the engine and its toolchain pins.
    pub version_file: PathBuf,
    pub include_dir: PathBuf,
    pub library_dir: PathBuf,
    pub clang_dir: PathBuf,
    pub libcxx_dir: PathBuf,
}

impl WebrtcInfo {
    pub fn new(source: &WebrtcSource, layout: &InstallLayout) -> Self {
        match source {
            WebrtcSource::Build(_) => {
                let src = layout.source_dir().join("webrtc");
                let build = layout.build_dir().join("webrtc");
                Self {
                    version_file: layout.source_dir().join("webrtc-build").join("VERSION"),
                    include_dir: src.join("src"),
                    library_dir: if cfg!(windows) { build.join("obj") } else { build },
                    clang_dir: src.join("src/third_party/llvm-build/Release+Asserts"),
                    libcxx_dir: src.join("src/buildtools/third_party/libc++/trunk"),
                }
            }
            WebrtcSource::Prebuilt => {
                let install = layout.install_dir();
                Self {
                    version_file: install.join("webrtc").join("VERSIONS"),
                    include_dir: install.join("webrtc").join("include"),
                    library_dir: install.join("webrtc").join("lib"),
                    clang_dir: install.join("llvm").join("clang"),
                    libcxx_dir: install.join("llvm").join("libcxx"),
                }
            }
        }
    }

    /// Parse the engine's version file.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or malformed.
    pub fn versions(&self) -> Result<VersionMap, DepsError> {
        Ok(VersionMap::load(&self.version_file)?)
    }
}

/// Download and unpack the release archive for `version`.
///
/// # Errors
///
/// Propagates download and extraction failures.
pub fn install_prebuilt(ctx: &Context, version: &str) -> Result<(), DepsError> {
    let platform = webrtc_platform(ctx.target());
    let ext = if platform.starts_with("windows_") { "zip" } else { "tar.gz" };
    let filename = format!("webrtc.{platform}.{ext}");
    let source_dir = ctx.layout.source_dir();
    let install_dir = ctx.layout.install_dir();

    // Archive names do not change between releases.
    remove_all(&source_dir.join(&filename))?;
    let archive = download(
        &ctx.env,
        &format!("{RELEASES_URL}/{version}/{filename}"),
        source_dir,
        None,
    )?;
    remove_all(&install_dir.join("webrtc"))?;
    extract(&archive, install_dir, "webrtc", None)?;
    Ok(())
}

/// Arguments for `run.py build <platform>` in the build repository.
pub fn build_script_args(
    platform: &str,
    layout: &InstallLayout,
    debug: bool,
    config: &WebrtcBuildConfig,
) -> Vec<String> {
    let mut args = vec![
        "run.py".to_string(),
        "build".to_string(),
        platform.to_string(),
        "--source-dir".to_string(),
        layout.source_dir().to_string_lossy().into_owned(),
        "--build-dir".to_string(),
        layout.build_dir().to_string_lossy().into_owned(),
        "--webrtc-nobuild-ios-framework".to_string(),
        "--webrtc-nobuild-android-aar".to_string(),
    ];
    let flags = [
        (debug, "--debug"),
        (config.webrtc_fetch, "--webrtc-fetch"),
        (config.webrtc_fetch_force, "--webrtc-fetch-force"),
        (config.webrtc_gen, "--webrtc-gen"),
        (config.webrtc_gen_force, "--webrtc-gen-force"),
    ];
    args.extend(
        flags
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, flag)| (*flag).to_string()),
    );
    if !config.webrtc_extra_gn_args.is_empty() {
        args.push("--webrtc-extra-gn-args".to_string());
        args.push(config.webrtc_extra_gn_args.clone());
    }
    if config.webrtc_nobuild {
        args.push("--webrtc-nobuild".to_string());
    }
    args
}

/// Check out the build repository at `version` and compile the engine.
///
/// # Errors
///
/// Propagates `git`, `python3` and filesystem failures.
pub fn build_from_source(
    ctx: &mut Context,
    version: &str,
    config: &WebrtcBuildConfig,
) -> Result<(), DepsError> {
    let platform = webrtc_platform(ctx.target());
    let repo_dir = ctx.layout.source_dir().join("webrtc-build");

    git::clone_and_checkout(
        &mut ctx.env,
        BUILD_REPO_URL,
        version,
        &repo_dir,
        config.webrtcbuild_fetch,
        config.webrtcbuild_fetch_force,
    )?;

    let args = build_script_args(&platform, &ctx.layout, ctx.debug, config);
    ctx.env
        .command("python3")
        .args(&args)
        .current_dir(&repo_dir)
        .run()?;

    // Keep __config_site next to the libc++ headers so no extra include
    // directory is needed.
    let libcxx_dir = ctx
        .layout
        .source_dir()
        .join("webrtc/src/buildtools/third_party/libc++");
    let installed = libcxx_dir.join("trunk/include/__config_site");
    if !installed.exists() {
        std::fs::copy(libcxx_dir.join("__config_site"), &installed)?;
    }
    Ok(())
}
