//! sdkbuild - fetch, build and package the native SDK
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Installs the SDK's third-party dependencies into a per-target tree,
//! skipping any whose recorded version already matches, then configures,
//! builds, tests and packages the SDK itself.
//!
//! # Directory Layout
//!
//! ```text
//! <root>/
//! ├── VERSION                          # KEY=VALUE version declarations
//! ├── _source/<target>/<config>/       # checkouts
//! ├── _build/<target>/<config>/        # build trees
//! ├── _install/<target>/<config>/      # installed deps and *.version markers
//! └── _package/<target>/<config>/      # release archives
//! ```

pub mod cmd;

use std::path::PathBuf;

use clap::{Args, Parser};
use sdkbuild_core::{Dependency, WebrtcBuildConfig, WebrtcSource};
use sdkbuild_schema::Target;

#[derive(Debug, Parser)]
#[command(name = "sdkbuild")]
#[command(author, version, about = "Fetch, build and package the native SDK", long_about = None)]
pub struct Cli {
    /// Platform to build for
    pub target: Target,

    /// Debug configuration instead of release
    #[arg(long)]
    pub debug: bool,

    /// Project root holding VERSION, multistrap/ and test/
    #[arg(long, env = "SDKBUILD_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Reinstall a dependency even if its recorded version matches
    /// (repeatable, or comma separated)
    #[arg(long, value_name = "DEP", value_delimiter = ',')]
    pub force: Vec<Dependency>,

    /// Reinstall every dependency
    #[arg(long)]
    pub force_all: bool,

    #[command(flatten)]
    pub webrtc: WebrtcArgs,

    /// Build the test application
    #[arg(long)]
    pub test: bool,

    /// Run the test application after building it
    #[arg(long, requires = "test")]
    pub run: bool,

    /// Archive the installed SDK
    #[arg(long)]
    pub package: bool,

    /// Stop after installing dependencies
    #[arg(long, conflicts_with_all = ["test", "package"])]
    pub deps_only: bool,
}

/// Media engine source selection.
#[derive(Debug, Args)]
pub struct WebrtcArgs {
    /// Build the media engine from source instead of downloading a release
    #[arg(long)]
    pub webrtcbuild: bool,

    #[arg(long, requires = "webrtcbuild")]
    pub webrtcbuild_fetch: bool,

    #[arg(long, requires = "webrtcbuild")]
    pub webrtcbuild_fetch_force: bool,

    #[arg(long, requires = "webrtcbuild")]
    pub webrtc_fetch: bool,

    #[arg(long, requires = "webrtcbuild")]
    pub webrtc_fetch_force: bool,

    #[arg(long, requires = "webrtcbuild")]
    pub webrtc_gen: bool,

    #[arg(long, requires = "webrtcbuild")]
    pub webrtc_gen_force: bool,

    /// Extra GN arguments, passed through verbatim
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub webrtc_extra_gn_args: String,

    #[arg(long, requires = "webrtcbuild")]
    pub webrtc_nobuild: bool,
}

impl WebrtcArgs {
    pub fn source(&self) -> WebrtcSource {
        if !self.webrtcbuild {
            return WebrtcSource::Prebuilt;
        }
        WebrtcSource::Build(WebrtcBuildConfig {
            webrtcbuild_fetch: self.webrtcbuild_fetch,
            webrtcbuild_fetch_force: self.webrtcbuild_fetch_force,
            webrtc_fetch: self.webrtc_fetch,
            webrtc_fetch_force: self.webrtc_fetch_force,
            webrtc_gen: self.webrtc_gen,
            webrtc_gen_force: self.webrtc_gen_force,
            webrtc_extra_gn_args: self.webrtc_extra_gn_args.clone(),
            webrtc_nobuild: self.webrtc_nobuild,
        })
    }
}
