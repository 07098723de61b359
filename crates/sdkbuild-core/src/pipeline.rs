//! Dependency pipeline.
//!
//! [`plan`] picks the dependencies a platform pair needs and orders them so
//! every step runs after the steps whose output it reads. [`DependencyPipeline`]
//! then walks the plan, wrapping each versioned step in a [`VersionGate`]
//! backed by `<install>/<dep>.version`.

use std::fmt;
use std::str::FromStr;

use sdkbuild_schema::{Arch, Os, PlatformPair};

use crate::context::Context;
use crate::error::DepsError;
use crate::gate::{FileMarker, VersionGate};
use crate::steps::llvm::LlvmSources;
use crate::steps::webrtc::WebrtcSource;
use crate::steps::{android, boost, cmake, cuda, ldflags, llvm, msdk, rootfs, webrtc};

/// Everything the SDK can depend on, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dependency {
    Rootfs,
    AndroidNdk,
    AndroidSdkCmdlineTools,
    Webrtc,
    Llvm,
    Boost,
    Cmake,
    Cuda,
    Libva,
    Msdk,
    WebrtcLdflags,
}

impl Dependency {
    pub const ALL: [Dependency; 11] = [
        Dependency::Rootfs,
        Dependency::AndroidNdk,
        Dependency::AndroidSdkCmdlineTools,
        Dependency::Webrtc,
        Dependency::Llvm,
        Dependency::Boost,
        Dependency::Cmake,
        Dependency::Cuda,
        Dependency::Libva,
        Dependency::Msdk,
        Dependency::WebrtcLdflags,
    ];

    /// Name used on the command line and for the marker file.
    pub fn name(self) -> &'static str {
        match self {
            Self::Rootfs => "rootfs",
            Self::AndroidNdk => "android-ndk",
            Self::AndroidSdkCmdlineTools => "android-sdk-cmdline-tools",
            Self::Webrtc => "webrtc",
            Self::Llvm => "llvm",
            Self::Boost => "boost",
            Self::Cmake => "cmake",
            Self::Cuda => "cuda",
            Self::Libva => "libva",
            Self::Msdk => "msdk",
            Self::WebrtcLdflags => "webrtc-ldflags",
        }
    }

    /// Dependencies whose output this one reads.
    pub fn requires(self) -> &'static [Dependency] {
        match self {
            Self::Webrtc => &[Self::Rootfs, Self::AndroidNdk],
            Self::Llvm => &[Self::Webrtc],
            Self::Boost => &[Self::Webrtc, Self::Llvm, Self::AndroidNdk, Self::Rootfs],
            Self::Msdk => &[Self::Libva, Self::Cmake],
            Self::WebrtcLdflags => &[Self::Webrtc, Self::AndroidNdk],
            Self::Rootfs
            | Self::AndroidNdk
            | Self::AndroidSdkCmdlineTools
            | Self::Cmake
            | Self::Cuda
            | Self::Libva => &[],
        }
    }

    /// Whether the pipeline needs this dependency for `pair`.
    pub fn applies(
        self,
        pair: &PlatformPair,
        webrtc: &WebrtcSource,
        android_sdk_present: bool,
    ) -> bool {
        let target = pair.target();
        let x86_64 = target.arch == Some(Arch::X86_64);
        match self {
            Self::Rootfs => target.os == Os::Jetson,
            Self::AndroidNdk | Self::WebrtcLdflags => target.os == Os::Android,
            Self::AndroidSdkCmdlineTools => target.os == Os::Android && !android_sdk_present,
            Self::Webrtc | Self::Boost | Self::Cmake => true,
            // Windows builds with MSVC, Apple platforms with Apple clang.
            Self::Llvm => {
                !matches!(target.os, Os::Windows | Os::Macos | Os::Ios) && webrtc.is_prebuilt()
            }
            Self::Cuda => target.os == Os::Windows,
            Self::Libva => target.os == Os::Ubuntu && x86_64,
            Self::Msdk => matches!(target.os, Os::Windows | Os::Ubuntu) && x86_64,
        }
    }

    /// Versioned steps are skipped when their marker matches.
    fn is_gated(self, ctx: &Context) -> bool {
        match self {
            Self::WebrtcLdflags => false,
            // The upstream build script tracks its own incremental state.
            Self::Webrtc => ctx.webrtc.is_prebuilt(),
            _ => true,
        }
    }

    /// Version recorded in this dependency's marker.
    ///
    /// # Errors
    ///
    /// Fails when the declaring file lacks the key or cannot be read.
    pub fn version(self, ctx: &Context) -> Result<String, DepsError> {
        let declared = |key: &str| -> Result<String, DepsError> {
            Ok(ctx.versions.get(key)?.to_string())
        };
        match self {
            Self::Rootfs => {
                rootfs::conf_digest(&rootfs::conf_path(ctx.layout.root(), ctx.target()))
            }
            Self::AndroidNdk => declared("ANDROID_NDK_VERSION"),
            Self::AndroidSdkCmdlineTools => declared("ANDROID_SDK_CMDLINE_TOOLS_VERSION"),
            Self::Webrtc => declared("WEBRTC_BUILD_VERSION"),
            Self::Llvm => Ok(LlvmSources::from_versions(&ctx.webrtc_info().versions()?)?.version()),
            Self::Boost => declared("BOOST_VERSION"),
            Self::Cmake => declared("CMAKE_VERSION"),
            Self::Cuda => declared("CUDA_VERSION"),
            Self::Libva => declared("LIBVA_VERSION"),
            Self::Msdk => declared("MSDK_VERSION"),
            Self::WebrtcLdflags => Ok(String::new()),
        }
    }

    fn install(self, ctx: &mut Context, version: &str) -> Result<(), DepsError> {
        match self {
            Self::Rootfs => rootfs::install(ctx, version),
            Self::AndroidNdk => android::install_ndk(ctx, version),
            Self::AndroidSdkCmdlineTools => android::install_sdk_cmdline_tools(ctx, version),
            Self::Webrtc => match ctx.webrtc.clone() {
                WebrtcSource::Prebuilt => webrtc::install_prebuilt(ctx, version),
                WebrtcSource::Build(config) => webrtc::build_from_source(ctx, version, &config),
            },
            Self::Llvm => {
                let sources = LlvmSources::from_versions(&ctx.webrtc_info().versions()?)?;
                llvm::install(ctx, &sources)
            }
            Self::Boost => boost::install(ctx, version),
            Self::Cmake => cmake::install(ctx, version),
            Self::Cuda => cuda::install(ctx, version),
            Self::Libva => msdk::install_libva(ctx, version),
            Self::Msdk if ctx.target().os == Os::Windows => msdk::install_windows(ctx, version),
            Self::Msdk => msdk::install_linux(ctx, version),
            Self::WebrtcLdflags => ldflags::generate(ctx),
        }
    }

    /// Changes later tools must see, applied whether or not the step ran.
    fn apply_env(self, ctx: &mut Context) {
        match self {
            Self::Cmake => cmake::apply_env(ctx),
            Self::AndroidSdkCmdlineTools => android::apply_sdk_env(ctx),
            _ => {}
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dependency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|dep| dep.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|dep| dep.name()).collect();
                format!("unknown dependency '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// The dependencies `pair` needs, each after everything it [requires](Dependency::requires).
///
/// Kahn's algorithm over the applicable set; among ready dependencies the
/// earliest declared goes first, so the order is stable.
pub fn plan(
    pair: &PlatformPair,
    webrtc: &WebrtcSource,
    android_sdk_present: bool,
) -> Vec<Dependency> {
    let mut pending: Vec<Dependency> = Dependency::ALL
        .into_iter()
        .filter(|dep| dep.applies(pair, webrtc, android_sdk_present))
        .collect();
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|dep| dep.requires().iter().all(|req| !pending.contains(req)))
            // requires() is acyclic; never taken.
            .unwrap_or(0);
        ordered.push(pending.remove(ready));
    }
    ordered
}

/// What happened to one dependency during [`DependencyPipeline::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step ran and its marker was written.
    Installed,
    /// The marker already held the requested version.
    Skipped,
    /// Unversioned step; always runs.
    Ran,
}

/// Runs the plan for a [`Context`], fail-fast.
#[derive(Debug)]
pub struct DependencyPipeline<'a> {
    ctx: &'a mut Context,
    force: Vec<Dependency>,
    force_all: bool,
}

impl<'a> DependencyPipeline<'a> {
    pub fn new(ctx: &'a mut Context) -> Self {
        Self {
            ctx,
            force: Vec::new(),
            force_all: false,
        }
    }

    /// Ignore the markers of `deps`.
    pub fn force(mut self, deps: impl IntoIterator<Item = Dependency>) -> Self {
        self.force.extend(deps);
        self
    }

    /// Ignore every marker.
    pub fn force_all(mut self, force_all: bool) -> Self {
        self.force_all = force_all;
        self
    }

    pub fn plan(&self) -> Vec<Dependency> {
        plan(
            &self.ctx.pair,
            &self.ctx.webrtc,
            android::existing_sdk_root(&*self.ctx).is_some(),
        )
    }

    /// Execute the plan in order and stop at the first failure.
    ///
    /// # Errors
    ///
    /// The first step, version lookup or marker error encountered.
    pub fn run(&mut self) -> Result<Vec<(Dependency, StepOutcome)>, DepsError> {
        let plan = self.plan();
        tracing::info!(
            "Dependencies: {}",
            plan.iter().map(|dep| dep.name()).collect::<Vec<_>>().join(", ")
        );

        let mut outcomes = Vec::with_capacity(plan.len());
        for dep in plan {
            let outcome = self.run_step(dep)?;
            dep.apply_env(self.ctx);
            outcomes.push((dep, outcome));
        }
        Ok(outcomes)
    }

    fn run_step(&mut self, dep: Dependency) -> Result<StepOutcome, DepsError> {
        let ctx = &mut *self.ctx;
        let version = dep.version(ctx)?;

        if !dep.is_gated(ctx) {
            tracing::info!("Running {dep}");
            dep.install(ctx, &version)?;
            return Ok(StepOutcome::Ran);
        }

        let forced = self.force_all || self.force.contains(&dep);
        let marker = FileMarker::new(ctx.layout.marker_path(dep.name()));
        let mut gate = VersionGate::new(marker).ignore_cache(forced);
        let installed = gate.execute(&version, |version| {
            tracing::info!("Installing {dep} {version}");
            dep.install(ctx, version)
        })?;

        Ok(match installed {
            Some(()) => StepOutcome::Installed,
            None => {
                tracing::info!("{dep} {version} is up to date");
                StepOutcome::Skipped
            }
        })
    }
}
