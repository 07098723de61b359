//! Boost, built with `b2` for the target toolchain.
//!
//! Only Boost.JSON is compiled; everything else the SDK uses is header-only.

use std::path::{Path, PathBuf};

use sdkbuild_schema::{Arch, Os, PlatformDescriptor};

use crate::context::Context;
use crate::error::DepsError;
use crate::io::download::download;
use crate::io::extract::extract;
use crate::io::{copy_dir_all, files_under, remove_all};
use crate::steps::android::{ndk_sysroot, ndk_toolchain_bin};
use crate::steps::webrtc::WebrtcInfo;

const DOWNLOAD_URL: &str = "https://archives.boost.io/release";

/// iOS libraries are built once per slice and merged with `lipo`.
const IOS_SLICES: [(&str, &str); 2] = [("x86_64", "iphonesimulator"), ("arm64", "iphoneos")];

/// How the compiler is handed to `b2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toolchain {
    /// Default toolset, optionally pinned to a specific `cxx`.
    Host { cxx: Option<String> },
    /// NDK clang for `aarch64-linux-android<api_level>`.
    Android { ndk: PathBuf, api_level: String },
    /// Xcode clang, one build per [`IOS_SLICES`] entry.
    Ios,
}

/// `b2` properties for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoostConfig {
    pub toolchain: Toolchain,
    pub toolset: &'static str,
    pub target_os: &'static str,
    pub architecture: &'static str,
    pub visibility: &'static str,
    pub compileflags: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub linkflags: Vec<String>,
}

fn strings<const N: usize>(flags: [&str; N]) -> Vec<String> {
    flags.iter().map(|f| (*f).to_string()).collect()
}

/// Flags that replace the system C++ library with the engine's libc++.
fn libcxx_flags(webrtc: &WebrtcInfo) -> Vec<String> {
    vec![
        "-D_LIBCPP_ABI_UNSTABLE".to_string(),
        "-D_LIBCPP_DISABLE_AVAILABILITY".to_string(),
        "-nostdinc++".to_string(),
        format!("-isystem{}", webrtc.libcxx_dir.join("include").display()),
    ]
}

impl BoostConfig {
    fn base(toolchain: Toolchain, toolset: &'static str, target_os: &'static str) -> Self {
        Self {
            toolchain,
            toolset,
            target_os,
            architecture: "x86",
            visibility: "global",
            compileflags: Vec::new(),
            cflags: Vec::new(),
            cxxflags: Vec::new(),
            linkflags: Vec::new(),
        }
    }

    /// Configuration for `target`.
    ///
    /// `macos_sysroot` is the SDK path reported by `xcrun` and only read for
    /// macOS; `api_level` is only read for Android.
    pub fn for_target(
        target: &PlatformDescriptor,
        build: &PlatformDescriptor,
        install_dir: &Path,
        webrtc: &WebrtcInfo,
        macos_sysroot: &str,
        api_level: &str,
    ) -> Self {
        match target.os {
            Os::Windows => {
                let mut config = Self::base(Toolchain::Host { cxx: None }, "msvc", "windows");
                config.cxxflags = strings(["-D_HAS_ITERATOR_DEBUGGING=0"]);
                config
            }
            Os::Macos => {
                let mut config = Self::base(
                    Toolchain::Host {
                        cxx: Some("clang++".to_string()),
                    },
                    "clang",
                    "darwin",
                );
                let (triple, architecture) = match target.arch {
                    Some(Arch::Arm64) => ("aarch64-apple-darwin", "arm"),
                    _ => ("x86_64-apple-darwin", "x86"),
                };
                let sysroot = format!("--sysroot={macos_sysroot}");
                config.cflags = vec![sysroot.clone(), "-target".into(), triple.into()];
                config.cxxflags = vec![
                    "-fPIC".into(),
                    sysroot,
                    "-std=gnu++17".into(),
                    "-target".into(),
                    triple.into(),
                ];
                config.visibility = "hidden";
                config.architecture = architecture;
                config
            }
            Os::Ios => {
                let mut config = Self::base(Toolchain::Ios, "clang", "iphone");
                config.cxxflags = strings(["-std=gnu++17"]);
                config
            }
            Os::Android => {
                let mut config = Self::base(
                    Toolchain::Android {
                        ndk: install_dir.join("android-ndk"),
                        api_level: api_level.to_string(),
                    },
                    "clang",
                    "android",
                );
                config.compileflags = vec![format!("--sysroot={}", ndk_sysroot(install_dir).display())];
                config.cflags = strings(["-fPIC"]);
                config.cxxflags = strings(["-fPIC"]);
                config.cxxflags.extend(libcxx_flags(webrtc));
                config.cxxflags.insert(4, "-std=gnu++17".to_string());
                config.architecture = "arm";
                config
            }
            Os::Jetson => {
                let sysroot = install_dir.join("rootfs");
                let cxx = if build.arch == Some(Arch::X86_64) {
                    webrtc.clang_dir.join("bin").join("clang++").to_string_lossy().into_owned()
                } else {
                    "clang++".to_string()
                };
                let sysroot_flag = format!("--sysroot={}", sysroot.display());
                let include = format!("-I{}", sysroot.join("usr/include/aarch64-linux-gnu").display());
                let libdir = sysroot.join("usr/lib/aarch64-linux-gnu");

                let mut config = Self::base(Toolchain::Host { cxx: Some(cxx) }, "clang", "linux");
                config.cflags = vec![
                    "-fPIC".into(),
                    sysroot_flag.clone(),
                    "--target=aarch64-linux-gnu".into(),
                    include.clone(),
                ];
                config.cxxflags = vec![
                    "-fPIC".into(),
                    "--target=aarch64-linux-gnu".into(),
                    sysroot_flag,
                    include,
                ];
                config.cxxflags.extend(libcxx_flags(webrtc));
                config.cxxflags.push("-std=gnu++17".into());
                config.linkflags = vec![
                    format!("-L{}", libdir.display()),
                    format!("-B{}", libdir.display()),
                ];
                config.architecture = "arm";
                config
            }
            Os::Ubuntu | Os::RaspberryPiOs => {
                let cxx = webrtc.clang_dir.join("bin").join("clang++");
                let mut config = Self::base(
                    Toolchain::Host {
                        cxx: Some(cxx.to_string_lossy().into_owned()),
                    },
                    "clang",
                    "linux",
                );
                config.cxxflags = libcxx_flags(webrtc);
                config.cxxflags.push("-fPIC".into());
                config
            }
        }
    }

    fn runtime_link(&self) -> &'static str {
        if self.target_os == "windows" { "static" } else { "shared" }
    }

    /// Arguments to `b2 install`.
    ///
    /// `build_dir` is only passed for multi-slice builds that must not share
    /// intermediate objects; `architecture` overrides the configured one.
    pub fn b2_args(
        &self,
        prefix: &Path,
        build_dir: Option<&Path>,
        debug: bool,
        architecture: Option<&str>,
    ) -> Vec<String> {
        let mut args = strings(["install", "-d+0"]);
        if let Some(dir) = build_dir {
            args.push(format!("--build-dir={}", dir.display()));
        }
        args.push(format!("--prefix={}", prefix.display()));
        args.extend(strings(["--with-json", "--layout=system", "--ignore-site-config"]));
        args.push(format!("variant={}", crate::paths::configuration(debug)));
        if !self.compileflags.is_empty() {
            args.push(format!("compileflags={}", self.compileflags.join(" ")));
        }
        args.push(format!("cflags={}", self.cflags.join(" ")));
        args.push(format!("cxxflags={}", self.cxxflags.join(" ")));
        args.push(format!("linkflags={}", self.linkflags.join(" ")));
        args.push(format!("toolset={}", self.toolset));
        args.push(format!("visibility={}", self.visibility));
        args.push(format!("target-os={}", self.target_os));
        args.push("address-model=64".into());
        args.push("link=static".into());
        args.push(format!("runtime-link={}", self.runtime_link()));
        args.push("threading=multi".into());
        args.push(format!(
            "architecture={}",
            architecture.unwrap_or(self.architecture)
        ));
        args
    }

    /// `project-config.jam` for everything but iOS, if one is needed.
    pub fn project_config(&self) -> Option<String> {
        match &self.toolchain {
            Toolchain::Host { cxx: Some(cxx) } => Some(format!("using {} : : {cxx} : ;", self.toolset)),
            Toolchain::Host { cxx: None } | Toolchain::Ios => None,
            Toolchain::Android { ndk, api_level } => {
                let install_dir = ndk.parent().unwrap_or(ndk.as_path());
                let bin = ndk_toolchain_bin(install_dir);
                Some(format!(
                    "using clang : android : {} --sysroot={} : <archiver>{} <ranlib>{} ;",
                    bin.join(format!("aarch64-linux-android{api_level}-clang++")).display(),
                    ndk_sysroot(install_dir).display(),
                    bin.join("llvm-ar").display(),
                    bin.join("llvm-ranlib").display(),
                ))
            }
        }
    }
}

/// `project-config.jam` for one iOS slice.
pub fn ios_project_config(clangpp: &str, arch: &str, sysroot: &str) -> String {
    format!(
        "using clang : iphone : {clangpp} -arch {arch} -isysroot {sysroot} \
         -fembed-bitcode -mios-version-min=10.0 -fvisibility=hidden \
         : <striper> <root>{sysroot} ;"
    )
}

/// Release tarball for `version`, e.g. `1.83.0`.
pub fn download_url(version: &str) -> String {
    let underscored = version.replace('.', "_");
    format!("{DOWNLOAD_URL}/{version}/source/boost_{underscored}.tar.gz")
}

fn target_config(ctx: &Context) -> Result<BoostConfig, DepsError> {
    let macos_sysroot = if ctx.target().os == Os::Macos {
        ctx.env
            .command("xcrun")
            .args(["--sdk", "macosx", "--show-sdk-path"])
            .capture()?
    } else {
        String::new()
    };
    let api_level = if ctx.target().os == Os::Android {
        ctx.versions.get("ANDROID_NATIVE_API_LEVEL")?.to_string()
    } else {
        String::new()
    };
    Ok(BoostConfig::for_target(
        ctx.target(),
        ctx.build(),
        ctx.layout.install_dir(),
        &ctx.webrtc_info(),
        &macos_sysroot,
        &api_level,
    ))
}

/// # Errors
///
/// Propagates download, extraction, `bootstrap`, `b2` and `lipo` failures.
pub fn install(ctx: &Context, version: &str) -> Result<(), DepsError> {
    let config = target_config(ctx)?;
    let archive = download(&ctx.env, &download_url(version), ctx.layout.source_dir(), None)?;
    let boost_dir = extract(&archive, ctx.layout.build_dir(), "boost", None)?;
    let prefix = ctx.layout.install_dir().join("boost");

    let (bootstrap, b2) = if config.target_os == "windows" {
        (".\\bootstrap.bat", ".\\b2.exe")
    } else {
        ("./bootstrap.sh", "./b2")
    };
    ctx.env.command(bootstrap).current_dir(&boost_dir).run()?;

    if config.toolchain == Toolchain::Ios {
        return install_ios(ctx, &config, &boost_dir, b2, &prefix);
    }

    if let Some(jam) = config.project_config() {
        std::fs::write(boost_dir.join("project-config.jam"), jam)?;
    }
    ctx.env
        .command(b2)
        .args(config.b2_args(&prefix, None, ctx.debug, None))
        .current_dir(&boost_dir)
        .run()?;
    Ok(())
}

fn install_ios(
    ctx: &Context,
    config: &BoostConfig,
    boost_dir: &Path,
    b2: &str,
    prefix: &Path,
) -> Result<(), DepsError> {
    let slice_prefix = |arch: &str, sdk: &str| boost_dir.join(format!("install-{arch}-{sdk}"));

    for (arch, sdk) in IOS_SLICES {
        let clangpp = ctx
            .env
            .command("xcodebuild")
            .args(["-find", "clang++"])
            .capture()?;
        let sysroot = ctx
            .env
            .command("xcrun")
            .args(["--sdk", sdk, "--show-sdk-path"])
            .capture()?;
        std::fs::write(
            boost_dir.join("project-config.jam"),
            ios_project_config(&clangpp, arch, &sysroot),
        )?;

        let boost_arch = if arch == "x86_64" { "x86" } else { "arm" };
        let build_dir = boost_dir.join(format!("build-{arch}-{sdk}"));
        ctx.env
            .command(b2)
            .args(config.b2_args(
                &slice_prefix(arch, sdk),
                Some(&build_dir),
                ctx.debug,
                Some(boost_arch),
            ))
            .current_dir(boost_dir)
            .run()?;
    }

    // Headers come from the first slice, libraries are merged.
    let (arch, sdk) = IOS_SLICES[0];
    let first = slice_prefix(arch, sdk);
    remove_all(prefix)?;
    copy_dir_all(&first, prefix)?;

    let lib_dir = first.join("lib");
    for lib in files_under(&lib_dir, &lib_dir)? {
        if lib.extension().is_none_or(|ext| ext != "a") {
            continue;
        }
        let slices: Vec<PathBuf> = IOS_SLICES
            .iter()
            .map(|(arch, sdk)| slice_prefix(arch, sdk).join("lib").join(&lib))
            .collect();
        ctx.env
            .command("lipo")
            .arg("-create")
            .arg("-output")
            .arg(prefix.join("lib").join(&lib))
            .args(&slices)
            .run()?;
    }
    Ok(())
}
