//! Building, testing and packaging the SDK itself.
//!
//! These stages run after the dependency pipeline and read its output
//! through [`InstallLayout`] and [`WebrtcInfo`].

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use sdkbuild_schema::{Arch, Os, PlatformPair, VersionMap};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::context::{Context, jobs_flag};
use crate::error::DepsError;
use crate::git;
use crate::io::{files_under, remove_all};
use crate::paths::{InstallLayout, cmake_path};
use crate::steps::webrtc::WebrtcInfo;

/// Facts looked up outside the layout that end up on the CMake command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdkMetadata {
    pub sdk_version: String,
    pub sdk_commit: String,
    pub webrtc_build_version: String,
    pub webrtc_readable_version: String,
    pub webrtc_commit: String,
    pub android_native_api_level: String,
    /// `xcrun --sdk macosx --show-sdk-path`; empty off macOS.
    pub macos_sysroot: String,
}

/// `Debug` or `Release`, as CMake spells build types.
pub fn cmake_build_type(debug: bool) -> &'static str {
    if debug { "Debug" } else { "Release" }
}

fn define(key: &str, value: impl AsRef<str>) -> String {
    format!("-D{key}={}", value.as_ref())
}

fn macos_triple(arch: Option<Arch>) -> &'static str {
    if arch == Some(Arch::X86_64) {
        "x86_64-apple-darwin"
    } else {
        "aarch64-apple-darwin"
    }
}

/// Compiler and sysroot selection shared by the SDK and its test program.
fn toolchain_args(
    pair: &PlatformPair,
    layout: &InstallLayout,
    info: &WebrtcInfo,
    meta: &SdkMetadata,
) -> Vec<String> {
    let target = pair.target();
    let arch = target.arch.map(|a| a.as_str()).unwrap_or_default();
    let clang = |name: &str| cmake_path(&info.clang_dir.join("bin").join(name));
    let libcxx_include = define(
        "LIBCXX_INCLUDE_DIR",
        cmake_path(&info.libcxx_dir.join("include")),
    );
    let mut args = Vec::new();

    match target.os {
        Os::Ubuntu => {
            if target.arch == Some(Arch::X86_64) {
                args.push(define("CMAKE_C_COMPILER", "clang-12"));
                args.push(define("CMAKE_CXX_COMPILER", "clang++-12"));
            } else {
                args.push(define("CMAKE_C_COMPILER", clang("clang")));
                args.push(define("CMAKE_CXX_COMPILER", clang("clang++")));
            }
            args.push(define("USE_LIBCXX", "ON"));
            args.push(libcxx_include);
        }
        Os::Macos => {
            let triple = macos_triple(target.arch);
            args.push(define("CMAKE_SYSTEM_PROCESSOR", arch));
            args.push(define("CMAKE_OSX_ARCHITECTURES", arch));
            args.push(define("CMAKE_C_COMPILER_TARGET", triple));
            args.push(define("CMAKE_CXX_COMPILER_TARGET", triple));
            args.push(define("CMAKE_OBJCXX_COMPILER_TARGET", triple));
            args.push(define("CMAKE_SYSROOT", &meta.macos_sysroot));
        }
        Os::Jetson => {
            let sysroot = layout.install_dir().join("rootfs");
            args.push(define("CMAKE_SYSTEM_NAME", "Linux"));
            args.push(define("CMAKE_SYSTEM_PROCESSOR", "aarch64"));
            args.push(define("CMAKE_SYSROOT", sysroot.to_string_lossy()));
            args.push(define("CMAKE_C_COMPILER_TARGET", "aarch64-linux-gnu"));
            args.push(define("CMAKE_CXX_COMPILER_TARGET", "aarch64-linux-gnu"));
            args.push(define("CMAKE_FIND_ROOT_PATH", sysroot.to_string_lossy()));
            args.push(define("USE_LIBCXX", "ON"));
            args.push(libcxx_include);
            if pair.build().arch == Some(Arch::X86_64) {
                args.push(define("CMAKE_C_COMPILER", clang("clang")));
                args.push(define("CMAKE_CXX_COMPILER", clang("clang++")));
            }
        }
        Os::Windows | Os::Ios | Os::Android | Os::RaspberryPiOs => {}
    }
    args
}

/// Configure arguments for the SDK, minus the source directory.
pub fn sdk_cmake_args(
    pair: &PlatformPair,
    layout: &InstallLayout,
    info: &WebrtcInfo,
    debug: bool,
    meta: &SdkMetadata,
) -> Vec<String> {
    let target = pair.target();
    let install = layout.install_dir();
    let x86_64 = target.arch == Some(Arch::X86_64);

    let mut args = vec![
        define("CMAKE_BUILD_TYPE", cmake_build_type(debug)),
        define("CMAKE_INSTALL_PREFIX", cmake_path(&install.join("sora"))),
        define("BOOST_ROOT", cmake_path(&install.join("boost"))),
        define("WEBRTC_INCLUDE_DIR", cmake_path(&info.include_dir)),
        define("WEBRTC_LIBRARY_DIR", cmake_path(&info.library_dir)),
        define("SORA_CPP_SDK_VERSION", &meta.sdk_version),
        define("SORA_CPP_SDK_COMMIT", &meta.sdk_commit),
        define("SORA_CPP_SDK_TARGET", target.package_name()),
        define("WEBRTC_BUILD_VERSION", &meta.webrtc_build_version),
        define("WEBRTC_READABLE_VERSION", &meta.webrtc_readable_version),
        define("WEBRTC_COMMIT", &meta.webrtc_commit),
    ];
    args.extend(toolchain_args(pair, layout, info, meta));

    match target.os {
        Os::Ios => {
            args.extend(["-G".to_string(), "Xcode".to_string()]);
            args.push(define("CMAKE_SYSTEM_NAME", "iOS"));
            args.push(define("CMAKE_OSX_ARCHITECTURES", "x86_64;arm64"));
            args.push(define("CMAKE_OSX_DEPLOYMENT_TARGET", "10.0"));
            args.push(define("CMAKE_XCODE_ATTRIBUTE_ONLY_ACTIVE_ARCH", "NO"));
        }
        Os::Android => {
            let toolchain = install.join("android-ndk/build/cmake/android.toolchain.cmake");
            args.push(define("CMAKE_TOOLCHAIN_FILE", toolchain.to_string_lossy()));
            args.push(define("ANDROID_NATIVE_API_LEVEL", &meta.android_native_api_level));
            args.push(define("ANDROID_ABI", "arm64-v8a"));
            args.push(define("ANDROID_STL", "none"));
            args.push(define("USE_LIBCXX", "ON"));
            args.push(define(
                "LIBCXX_INCLUDE_DIR",
                cmake_path(&info.libcxx_dir.join("include")),
            ));
            args.push(define("ANDROID_CPP_FEATURES", "exceptions rtti"));
            // Some NDK releases ignore ANDROID_CPP_FEATURES=exceptions.
            args.push(define("CMAKE_ANDROID_EXCEPTIONS", "ON"));
            args.push(define(
                "SORA_WEBRTC_LDFLAGS",
                install.join("webrtc.ldflags").to_string_lossy(),
            ));
        }
        Os::Jetson => args.push(define("USE_JETSON_ENCODER", "ON")),
        _ => {}
    }

    if matches!(target.os, Os::Windows | Os::Ubuntu) && x86_64 {
        args.push(define("USE_NVCODEC_ENCODER", "ON"));
        if target.os == Os::Windows {
            args.push(define(
                "CUDA_TOOLKIT_ROOT_DIR",
                cmake_path(&install.join("cuda/nvcc")),
            ));
        }
        args.push(define("USE_MSDK_ENCODER", "ON"));
        args.push(define("MSDK_ROOT_DIR", cmake_path(&install.join("msdk"))));
        if target.os == Os::Ubuntu {
            args.push(define("LIBVA_ROOT_DIR", cmake_path(&install.join("libva"))));
        }
    }
    args
}

/// Configure arguments for the `test/` program.
pub fn test_cmake_args(
    pair: &PlatformPair,
    layout: &InstallLayout,
    info: &WebrtcInfo,
    debug: bool,
    meta: &SdkMetadata,
) -> Vec<String> {
    let install = layout.install_dir();
    let mut args = vec![
        define("CMAKE_BUILD_TYPE", cmake_build_type(debug)),
        define("BOOST_ROOT", cmake_path(&install.join("boost"))),
        define("WEBRTC_INCLUDE_DIR", cmake_path(&info.include_dir)),
        define("WEBRTC_LIBRARY_DIR", cmake_path(&info.library_dir)),
        define("SORA_DIR", cmake_path(&install.join("sora"))),
    ];
    if pair.target().os == Os::Jetson {
        args.push(define("HELLO_JETSON", "ON"));
        for (kind, mode) in [
            ("PROGRAM", "NEVER"),
            ("LIBRARY", "BOTH"),
            ("INCLUDE", "BOTH"),
            ("PACKAGE", "BOTH"),
        ] {
            args.push(define(&format!("CMAKE_FIND_ROOT_PATH_MODE_{kind}"), mode));
        }
    }
    args.extend(toolchain_args(pair, layout, info, meta));
    args
}

fn metadata(ctx: &Context) -> Result<SdkMetadata, DepsError> {
    let webrtc: VersionMap = ctx.webrtc_info().versions()?;
    let android_native_api_level = if ctx.target().os == Os::Android {
        ctx.versions.get("ANDROID_NATIVE_API_LEVEL")?.to_string()
    } else {
        String::new()
    };
    let macos_sysroot = if ctx.target().os == Os::Macos {
        ctx.env
            .command("xcrun")
            .args(["--sdk", "macosx", "--show-sdk-path"])
            .capture()?
    } else {
        String::new()
    };
    Ok(SdkMetadata {
        sdk_version: ctx.versions.get("SORA_CPP_SDK_VERSION")?.to_string(),
        sdk_commit: git::head_commit(&ctx.env, ctx.layout.root())?,
        webrtc_build_version: webrtc.get("WEBRTC_BUILD_VERSION")?.to_string(),
        webrtc_readable_version: webrtc.get("WEBRTC_READABLE_VERSION")?.to_string(),
        webrtc_commit: webrtc.get("WEBRTC_COMMIT")?.to_string(),
        android_native_api_level,
        macos_sysroot,
    })
}

/// Configure, build and install the SDK into `<install>/sora`.
///
/// # Errors
///
/// Propagates version lookups and `cmake`/`lipo` failures.
pub fn build(ctx: &mut Context) -> Result<(), DepsError> {
    let meta = metadata(ctx)?;
    let info = ctx.webrtc_info();
    let args = sdk_cmake_args(&ctx.pair, &ctx.layout, &info, ctx.debug, &meta);
    let build_type = cmake_build_type(ctx.debug);
    let build_dir = ctx.layout.build_dir().join("sora");
    let install_dir = ctx.layout.install_dir().join("sora");
    let root = ctx.layout.root().to_path_buf();
    let is_ios = ctx.target().os == Os::Ios;
    let target_os = ctx.target().os;
    std::fs::create_dir_all(&build_dir)?;

    let scope = ctx.env.in_dir(&build_dir);
    scope.command("cmake").arg(&root).args(&args).run()?;

    if is_ios {
        for (arch, sdk) in [("x86_64", "iphonesimulator"), ("arm64", "iphoneos")] {
            scope
                .command("cmake")
                .args(["--build", "."])
                .arg(jobs_flag())
                .args(["--config", build_type, "--target", "sora", "--"])
                .args(["-arch", arch, "-sdk", sdk])
                .run()?;
        }
        // Installs headers and metadata; the library is replaced below.
        scope.command("cmake").args(["--install", "."]).run()?;
        let universal = build_dir.join("libsora.a");
        scope
            .command("lipo")
            .arg("-create")
            .arg("-output")
            .arg(&universal)
            .arg(build_dir.join(format!("{build_type}-iphonesimulator/libsora.a")))
            .arg(build_dir.join(format!("{build_type}-iphoneos/libsora.a")))
            .run()?;
        std::fs::copy(&universal, install_dir.join("lib/libsora.a"))?;
    } else {
        scope
            .command("cmake")
            .args(["--build", "."])
            .arg(jobs_flag())
            .args(["--config", build_type])
            .run()?;
        scope
            .command("cmake")
            .args(["--install", ".", "--config", build_type])
            .run()?;
    }

    // The bundled library merges the SDK with the engine.
    let bundled = match target_os {
        Os::Windows => Some("sora.lib"),
        Os::Ubuntu => Some("libsora.a"),
        _ => None,
    };
    if let Some(name) = bundled {
        std::fs::copy(
            build_dir.join("bundled").join(name),
            install_dir.join("lib").join(name),
        )?;
    }
    Ok(())
}

/// Build the test program and optionally run it against `test/.testparam.json`.
///
/// # Errors
///
/// Propagates build tool and test program failures.
pub fn build_tests(ctx: &mut Context, run: bool) -> Result<(), DepsError> {
    let root = ctx.layout.root().to_path_buf();

    match ctx.target().os {
        Os::Ios => {
            // Device builds need signing; the simulator build is enough.
            ctx.env
                .command("xcodebuild")
                .args(["build", "-project", "test/ios/hello.xcodeproj"])
                .args(["-target", "hello", "-arch", "x86_64", "-sdk", "iphonesimulator"])
                .args(["-configuration", "Release"])
                .current_dir(&root)
                .run()?;
            if run {
                tracing::warn!("--run is not supported for iOS");
            }
        }
        Os::Android => {
            let project = root.join("test").join("android");
            ctx.env
                .command("./gradlew")
                .args(["--no-daemon", "assemble"])
                .current_dir(&project)
                .run()?;
            if run {
                tracing::warn!("--run is not supported for Android");
            }
        }
        _ => {
            let meta = metadata(ctx)?;
            let info = ctx.webrtc_info();
            let args = test_cmake_args(&ctx.pair, &ctx.layout, &info, ctx.debug, &meta);
            let build_type = cmake_build_type(ctx.debug);
            let test_build_dir = ctx.layout.build_dir().join("test");
            let hello = if ctx.target().os == Os::Windows {
                test_build_dir.join(build_type).join("hello.exe")
            } else {
                test_build_dir.join("hello")
            };
            std::fs::create_dir_all(&test_build_dir)?;

            let scope = ctx.env.in_dir(&test_build_dir);
            scope.command("cmake").arg(root.join("test")).args(&args).run()?;
            scope
                .command("cmake")
                .args(["--build", "."])
                .arg(jobs_flag())
                .args(["--config", build_type])
                .run()?;
            if run {
                scope
                    .command(hello.to_string_lossy())
                    .arg(root.join("test").join(".testparam.json"))
                    .run()?;
            }
        }
    }
    Ok(())
}

/// Name of the release archive.
pub fn package_name(sdk_version: &str, target_package: &str, zip: bool) -> String {
    let ext = if zip { "zip" } else { "tar.gz" };
    format!("sora-cpp-sdk-{sdk_version}_{target_package}.{ext}")
}

/// Archive `<install>/sora` into the package root and describe it in
/// `sora.env`. Returns the archive path.
///
/// # Errors
///
/// Fails if `SORA_CPP_SDK_VERSION` is missing, the installed `sora` tree
/// cannot be walked, or the archive cannot be written.
pub fn package(ctx: &Context) -> Result<PathBuf, DepsError> {
    let package_dir = ctx.layout.package_dir();
    std::fs::create_dir_all(package_dir)?;
    remove_all(&package_dir.join("sora"))?;
    let env_file = package_dir.join("sora.env");
    remove_all(&env_file)?;

    let use_zip = ctx.target().os == Os::Windows;
    let name = package_name(
        ctx.versions.get("SORA_CPP_SDK_VERSION")?,
        &ctx.target().package_name(),
        use_zip,
    );
    let archive = package_dir.join(&name);
    let install_dir = ctx.layout.install_dir();
    let files = files_under(&install_dir.join("sora"), install_dir)?;
    tracing::info!("Packaging {} files into {}", files.len(), archive.display());

    let content_type = if use_zip {
        write_zip(&archive, install_dir, &files)?;
        "application/zip"
    } else {
        write_tar_gz(&archive, install_dir, &files)?;
        "application/gzip"
    };
    std::fs::write(
        env_file,
        format!("CONTENT_TYPE={content_type}\nPACKAGE_NAME={name}\n"),
    )?;
    Ok(archive)
}

/// Member name with forward slashes regardless of host.
fn member_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_tar_gz(archive: &Path, base: &Path, files: &[PathBuf]) -> io::Result<()> {
    let encoder = GzEncoder::new(File::create(archive)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for file in files {
        builder.append_path_with_name(base.join(file), member_name(file))?;
    }
    builder.into_inner()?.finish()?.flush()
}

fn write_zip(archive: &Path, base: &Path, files: &[PathBuf]) -> Result<(), DepsError> {
    let zip_err = |e: zip::result::ZipError| DepsError::context("writing zip package", e);
    let mut writer = ZipWriter::new(File::create(archive)?);
    let options = SimpleFileOptions::default();
    for file in files {
        writer.start_file(member_name(file), options).map_err(zip_err)?;
        io::copy(&mut File::open(base.join(file))?, &mut writer)?;
    }
    writer.finish().map_err(zip_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdkbuild_schema::{PlatformDescriptor, Target};

    use crate::steps::webrtc::WebrtcSource;

    fn context(target: Target, host: PlatformDescriptor, root: &Path) -> Context {
        let descriptor = target.descriptor(&host);
        let pair = PlatformPair::validate(host, descriptor).unwrap();
        let layout = InstallLayout::new(root, pair.target(), false);
        let versions = VersionMap::parse("SORA_CPP_SDK_VERSION=2024.1.0\n").unwrap();
        Context::new(pair, layout, versions, false, WebrtcSource::Prebuilt)
    }

    fn ubuntu_host() -> PlatformDescriptor {
        PlatformDescriptor::new(Os::Ubuntu, Some("22.04"), Some(Arch::X86_64))
    }

    fn meta() -> SdkMetadata {
        SdkMetadata {
            sdk_version: "2024.1.0".into(),
            sdk_commit: "abc123".into(),
            webrtc_build_version: "m120.6099.1.2".into(),
            webrtc_readable_version: "M120.6099@{#1}".into(),
            webrtc_commit: "def456".into(),
            android_native_api_level: "29".into(),
            macos_sysroot: "/sdk/MacOSX.sdk".into(),
        }
    }

    #[test]
    fn test_ubuntu_enables_hardware_encoders() {
        let ctx = context(Target::Ubuntu2204X86_64, ubuntu_host(), Path::new("/w"));
        let args = sdk_cmake_args(&ctx.pair, &ctx.layout, &ctx.webrtc_info(), false, &meta());

        assert_eq!(args[0], "-DCMAKE_BUILD_TYPE=Release");
        assert!(args.contains(&"-DSORA_CPP_SDK_TARGET=ubuntu-22.04_x86_64".to_string()));
        assert!(args.contains(&"-DCMAKE_CXX_COMPILER=clang++-12".to_string()));
        assert!(args.contains(&"-DUSE_MSDK_ENCODER=ON".to_string()));
        assert!(args.contains(&"-DUSE_NVCODEC_ENCODER=ON".to_string()));
        assert!(
            args.contains(&"-DLIBVA_ROOT_DIR=/w/_install/ubuntu-22.04_x86_64/release/libva".to_string())
        );
        assert!(!args.iter().any(|a| a.starts_with("-DCUDA_TOOLKIT_ROOT_DIR")));
    }

    #[test]
    fn test_android_points_at_ndk_toolchain() {
        let ctx = context(Target::Android, ubuntu_host(), Path::new("/w"));
        let args = sdk_cmake_args(&ctx.pair, &ctx.layout, &ctx.webrtc_info(), true, &meta());

        assert_eq!(args[0], "-DCMAKE_BUILD_TYPE=Debug");
        assert!(args.contains(
            &"-DCMAKE_TOOLCHAIN_FILE=/w/_install/android/release/android-ndk/build/cmake/android.toolchain.cmake"
                .to_string()
        ));
        assert!(args.contains(&"-DANDROID_NATIVE_API_LEVEL=29".to_string()));
        assert!(args.contains(&"-DSORA_WEBRTC_LDFLAGS=/w/_install/android/release/webrtc.ldflags".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("-DUSE_MSDK_ENCODER")));
    }

    #[test]
    fn test_jetson_cross_compiles_from_x86_64() {
        let ctx = context(Target::Ubuntu2004Armv8Jetson, ubuntu_host(), Path::new("/w"));
        let info = ctx.webrtc_info();
        let args = sdk_cmake_args(&ctx.pair, &ctx.layout, &info, false, &meta());
        assert!(args.contains(&"-DUSE_JETSON_ENCODER=ON".to_string()));
        assert!(args.contains(&"-DCMAKE_SYSROOT=/w/_install/ubuntu-20.04_armv8_jetson/release/rootfs".to_string()));
        assert!(args.iter().any(|a| a.starts_with("-DCMAKE_CXX_COMPILER=") && a.ends_with("llvm/clang/bin/clang++")));

        let test_args = test_cmake_args(&ctx.pair, &ctx.layout, &info, false, &meta());
        assert!(test_args.contains(&"-DHELLO_JETSON=ON".to_string()));
        assert!(test_args.contains(&"-DCMAKE_FIND_ROOT_PATH_MODE_PROGRAM=NEVER".to_string()));
        assert!(test_args.contains(&"-DSORA_DIR=/w/_install/ubuntu-20.04_armv8_jetson/release/sora".to_string()));
    }

    #[test]
    fn test_macos_and_ios() {
        let mac = PlatformDescriptor::new(Os::Macos, Some("14.4"), Some(Arch::Arm64));
        let ctx = context(Target::MacosX86_64, mac.clone(), Path::new("/w"));
        let args = sdk_cmake_args(&ctx.pair, &ctx.layout, &ctx.webrtc_info(), false, &meta());
        assert!(args.contains(&"-DCMAKE_OSX_ARCHITECTURES=x86_64".to_string()));
        assert!(args.contains(&"-DCMAKE_CXX_COMPILER_TARGET=x86_64-apple-darwin".to_string()));
        assert!(args.contains(&"-DCMAKE_SYSROOT=/sdk/MacOSX.sdk".to_string()));

        let ctx = context(Target::Ios, mac, Path::new("/w"));
        let args = sdk_cmake_args(&ctx.pair, &ctx.layout, &ctx.webrtc_info(), false, &meta());
        let generator = args.iter().position(|a| a == "-G").unwrap();
        assert_eq!(args[generator + 1], "Xcode");
        assert!(args.contains(&"-DCMAKE_OSX_ARCHITECTURES=x86_64;arm64".to_string()));
    }

    #[test]
    fn test_package_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(Target::Ubuntu2204X86_64, ubuntu_host(), dir.path());
        let sora = ctx.layout.install_dir().join("sora");
        std::fs::create_dir_all(sora.join("include/sora")).unwrap();
        std::fs::create_dir_all(sora.join("lib")).unwrap();
        std::fs::write(sora.join("include/sora/sora.h"), "#pragma once\n").unwrap();
        std::fs::write(sora.join("lib/libsora.a"), "!<arch>\n").unwrap();

        let archive = package(&ctx).unwrap();
        assert_eq!(
            archive.file_name().unwrap(),
            "sora-cpp-sdk-2024.1.0_ubuntu-22.04_x86_64.tar.gz"
        );
        assert_eq!(
            std::fs::read_to_string(ctx.layout.package_dir().join("sora.env")).unwrap(),
            "CONTENT_TYPE=application/gzip\nPACKAGE_NAME=sora-cpp-sdk-2024.1.0_ubuntu-22.04_x86_64.tar.gz\n"
        );

        let mut members: Vec<String> = tar::Archive::new(flate2::read::GzDecoder::new(File::open(&archive).unwrap()))
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        members.sort();
        assert_eq!(members, ["sora/include/sora/sora.h", "sora/lib/libsora.a"]);
    }

    #[test]
    fn test_package_zip_for_windows() {
        let dir = tempfile::tempdir().unwrap();
        let host = PlatformDescriptor::new(Os::Windows, None, Some(Arch::X86_64));
        let ctx = context(Target::WindowsX86_64, host, dir.path());
        let lib = ctx.layout.install_dir().join("sora").join("lib");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(lib.join("sora.lib"), "lib").unwrap();

        let archive = package(&ctx).unwrap();
        assert_eq!(archive.file_name().unwrap(), "sora-cpp-sdk-2024.1.0_windows_x86_64.zip");
        let env = std::fs::read_to_string(ctx.layout.package_dir().join("sora.env")).unwrap();
        assert!(env.starts_with("CONTENT_TYPE=application/zip\n"));

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
        assert_eq!(zip.by_index(0).unwrap().name(), "sora/lib/sora.lib");
    }

    #[test]
    fn test_package_fails_without_installed_sdk() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(Target::Ubuntu2204X86_64, ubuntu_host(), dir.path());

        let err = package(&ctx).unwrap_err();
        assert!(matches!(err, DepsError::Io(_)), "{err}");
        assert!(!ctx.layout.package_dir().join("sora.env").exists());
    }

    #[test]
    fn test_package_requires_sdk_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(Target::Ubuntu2204X86_64, ubuntu_host(), dir.path());
        ctx.versions = VersionMap::default();
        let err = package(&ctx).unwrap_err();
        assert!(err.to_string().contains("SORA_CPP_SDK_VERSION"));
    }
}
