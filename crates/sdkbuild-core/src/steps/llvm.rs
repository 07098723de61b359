//! The clang/libc++ toolchain the prebuilt media engine was compiled with.

use sdkbuild_schema::{VersionFileError, VersionMap};

use crate::context::Context;
use crate::error::DepsError;
use crate::git;
use crate::io::remove_all;

/// Repositories and commits pinned by the media engine's `VERSIONS` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlvmSources {
    pub tools_url: String,
    pub tools_commit: String,
    pub libcxx_url: String,
    pub libcxx_commit: String,
    pub buildtools_url: String,
    pub buildtools_commit: String,
}

impl LlvmSources {
    /// # Errors
    ///
    /// [`VersionFileError::MissingKey`] for the first absent pin.
    pub fn from_versions(versions: &VersionMap) -> Result<Self, VersionFileError> {
        let get = |key: &str| versions.get(key).map(str::to_string);
        Ok(Self {
            tools_url: get("WEBRTC_SRC_TOOLS_URL")?,
            tools_commit: get("WEBRTC_SRC_TOOLS_COMMIT")?,
            libcxx_url: get("WEBRTC_SRC_BUILDTOOLS_THIRD_PARTY_LIBCXX_TRUNK_URL")?,
            libcxx_commit: get("WEBRTC_SRC_BUILDTOOLS_THIRD_PARTY_LIBCXX_TRUNK_COMMIT")?,
            buildtools_url: get("WEBRTC_SRC_BUILDTOOLS_URL")?,
            buildtools_commit: get("WEBRTC_SRC_BUILDTOOLS_COMMIT")?,
        })
    }

    /// Composite version recorded in the marker; changes when any pin does.
    pub fn version(&self) -> String {
        format!(
            "{}.{}.{}.{}.{}.{}",
            self.tools_url,
            self.tools_commit,
            self.libcxx_url,
            self.libcxx_commit,
            self.buildtools_url,
            self.buildtools_commit
        )
    }
}

/// # Errors
///
/// Propagates `git`, `python3` and filesystem failures.
pub fn install(ctx: &mut Context, sources: &LlvmSources) -> Result<(), DepsError> {
    let llvm_dir = ctx.layout.install_dir().join("llvm");
    remove_all(&llvm_dir)?;
    std::fs::create_dir_all(&llvm_dir)?;

    // tools/clang/scripts/update.py fetches the matching clang binaries.
    let tools_dir = llvm_dir.join("tools");
    git::clone_shallow(&mut ctx.env, &sources.tools_url, &sources.tools_commit, &tools_dir)?;
    ctx.env
        .command("python3")
        .arg(tools_dir.join("clang").join("scripts").join("update.py"))
        .arg("--output-dir")
        .arg(llvm_dir.join("clang"))
        .current_dir(&tools_dir)
        .run()?;

    let libcxx_dir = llvm_dir.join("libcxx");
    git::clone_shallow(&mut ctx.env, &sources.libcxx_url, &sources.libcxx_commit, &libcxx_dir)?;

    // buildtools only contributes libc++'s __config_site.
    let buildtools_dir = llvm_dir.join("buildtools");
    git::clone_shallow(
        &mut ctx.env,
        &sources.buildtools_url,
        &sources.buildtools_commit,
        &buildtools_dir,
    )?;
    std::fs::copy(
        buildtools_dir.join("third_party/libc++/__config_site"),
        libcxx_dir.join("include/__config_site"),
    )?;
    Ok(())
}
