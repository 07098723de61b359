//! Intel Media SDK dispatcher, and libva which it needs on Linux.

use std::io;
use std::path::{Path, PathBuf};

use crate::context::{Context, jobs_flag};
use crate::error::DepsError;
use crate::git;
use crate::io::{copy_dir_all, remove_all};
use crate::paths::cmake_path;

const LIBVA_REPO_URL: &str = "https://github.com/intel/libva.git";
const MSDK_REPO_URL: &str = "https://github.com/Intel-Media-SDK/MediaSDK.git";

/// Default Visual Studio 2019 location; CI runners already have MSBuild on PATH.
const MSBUILD_DIR: &str =
    r"C:\Program Files (x86)\Microsoft Visual Studio\2019\Community\MSBuild\Current\Bin";

/// # Errors
///
/// Propagates `git`, `autogen.sh` and `make` failures.
pub fn install_libva(ctx: &mut Context, version: &str) -> Result<(), DepsError> {
    let source_dir = ctx.layout.source_dir().join("libva");
    let build_dir = ctx.layout.build_dir().join("libva");
    let install_dir = ctx.layout.install_dir().join("libva");
    remove_all(&source_dir)?;
    remove_all(&build_dir)?;
    remove_all(&install_dir)?;

    git::clone_shallow(&mut ctx.env, LIBVA_REPO_URL, version, &source_dir)?;
    std::fs::create_dir_all(&build_dir)?;

    let scope = ctx.env.in_dir(&build_dir);
    scope
        .command(source_dir.join("autogen.sh").to_string_lossy())
        .args([
            "--enable-static",
            "--disable-shared",
            "--with-drivers-path=/usr/lib/x86_64-linux-gnu/dri",
            "--prefix",
        ])
        .arg(&install_dir)
        .env("CC", "clang-12")
        .env("CFLAGS", "-fPIC")
        .run()?;
    scope.command("make").arg(jobs_flag()).run()?;
    scope.command("make").arg("install").run()?;
    Ok(())
}

/// Rewrite `add_library(... SHARED ...)` to `STATIC` in every
/// `CMakeLists.txt` below `dir`. Returns the number of files changed.
///
/// # Errors
///
/// Propagates read and write failures.
pub fn make_static(dir: &Path) -> io::Result<usize> {
    let lists: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == "CMakeLists.txt")
        .map(walkdir::DirEntry::into_path)
        .collect();

    let mut changed = 0;
    for path in lists {
        let content = std::fs::read_to_string(&path)?;
        if content.contains("SHARED") {
            std::fs::write(&path, content.replace("SHARED", "STATIC"))?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Configure arguments for the Linux build.
pub fn linux_cmake_args(
    source_dir: &Path,
    install_dir: &Path,
    libva_dir: &Path,
    libcxx_dir: &Path,
) -> Vec<String> {
    let cxxflags = [
        "-nostdinc++".to_string(),
        format!("-isystem{}", libcxx_dir.join("include").display()),
        "-D_LIBCPP_ABI_UNSTABLE".to_string(),
        "-D_LIBCPP_DISABLE_AVAILABILITY".to_string(),
    ];
    vec![
        format!("-DCMAKE_INSTALL_PREFIX={}", cmake_path(install_dir)),
        "-DCMAKE_BUILD_TYPE=Release".to_string(),
        format!("-DCMAKE_PREFIX_PATH={}", libva_dir.display()),
        "-DBUILD_RUNTIME=OFF".to_string(),
        "-DBUILD_SAMPLES=OFF".to_string(),
        "-DBUILD_TUTORIALS=OFF".to_string(),
        source_dir.to_string_lossy().into_owned(),
        "-DCMAKE_C_COMPILER=clang-12".to_string(),
        "-DCMAKE_CXX_COMPILER=clang++-12".to_string(),
        format!("-DCMAKE_CXX_FLAGS={}", cxxflags.join(" ")),
    ]
}

/// Static dispatcher library built with CMake against the installed libva.
///
/// # Errors
///
/// Propagates `git`, `cmake` and filesystem failures.
pub fn install_linux(ctx: &mut Context, version: &str) -> Result<(), DepsError> {
    let source_dir = ctx.layout.source_dir().join("msdk");
    let build_dir = ctx.layout.build_dir().join("msdk");
    let install_dir = ctx.layout.install_dir().join("msdk");
    remove_all(&source_dir)?;
    remove_all(&build_dir)?;
    remove_all(&install_dir)?;

    git::clone_shallow(&mut ctx.env, MSDK_REPO_URL, version, &source_dir)?;
    let changed = make_static(&source_dir)?;
    tracing::debug!("Switched {changed} CMakeLists.txt to static libraries");
    std::fs::create_dir_all(&build_dir)?;

    let args = linux_cmake_args(
        &source_dir,
        &install_dir,
        &ctx.layout.install_dir().join("libva"),
        &ctx.webrtc_info().libcxx_dir,
    );
    let scope = ctx.env.in_dir(&build_dir);
    scope.command("cmake").args(&args).run()?;
    scope
        .command("cmake")
        .args(["--build", "."])
        .arg(jobs_flag())
        .run()?;
    scope.command("cmake").args(["--install", "."]).run()?;
    Ok(())
}

/// `/p:Configuration=` value for MSBuild.
pub fn msbuild_configuration(windows_sdk_version: &str) -> String {
    [
        "Release",
        "Platform=x64",
        "PlatformToolset=v142",
        "SpectreMitigation=false",
        &format!("WindowsTargetPlatformVersion={windows_sdk_version}"),
    ]
    .join(";")
}

/// Windows SDK version announced by the Visual Studio developer environment.
fn windows_sdk_version(ctx: &Context) -> Result<String, DepsError> {
    let raw = ctx.env.var("WindowsSDKVersion").ok_or_else(|| {
        DepsError::context(
            "locating the Windows SDK",
            "WindowsSDKVersion is not set; run from a Visual Studio developer prompt",
        )
    })?;
    Ok(raw.trim().trim_end_matches('\\').to_string())
}

/// Dispatcher library built with MSBuild; headers copied from the API tree.
///
/// # Errors
///
/// Propagates `git`, `MSBuild` and filesystem failures.
pub fn install_windows(ctx: &mut Context, version: &str) -> Result<(), DepsError> {
    // MSBuild writes its output next to the checkout, hence the extra level.
    let source_dir = ctx.layout.source_dir().join("msdk").join("MediaSDK");
    let build_dir = ctx.layout.source_dir().join("msdk").join("build");
    let install_dir = ctx.layout.install_dir().join("msdk");
    remove_all(&source_dir)?;
    remove_all(&build_dir)?;
    remove_all(&install_dir)?;

    git::clone_shallow(&mut ctx.env, MSDK_REPO_URL, version, &source_dir)?;
    std::fs::create_dir_all(install_dir.join("lib"))?;
    copy_dir_all(
        &source_dir.join("api").join("include"),
        &install_dir.join("include").join("mfx"),
    )?;

    let configuration = msbuild_configuration(&windows_sdk_version(ctx)?);
    let mut scope = ctx.env.scope();
    scope.prepend_path(MSBUILD_DIR);
    scope
        .command("MSBuild")
        .arg("/t:build")
        .arg(format!("/p:Configuration={configuration}"))
        .arg(source_dir.join(r"api\mfx_dispatch\windows\libmfx_vs2015.vcxproj"))
        .run()?;
    drop(scope);

    std::fs::copy(
        build_dir.join(r"win_x64\Release\lib\libmfx_vs2015.lib"),
        install_dir.join("lib").join("libmfx.lib"),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_static_rewrites_every_cmakelists() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("api/mfx_dispatch/linux");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            dir.path().join("CMakeLists.txt"),
            "add_subdirectory(api)\n",
        )
        .unwrap();
        std::fs::write(
            nested.join("CMakeLists.txt"),
            "add_library(mfx SHARED ${sources})\nset(LIB_TYPE SHARED)\n",
        )
        .unwrap();
        std::fs::write(nested.join("notes.txt"), "SHARED").unwrap();

        assert_eq!(make_static(dir.path()).unwrap(), 1);
        assert_eq!(
            std::fs::read_to_string(nested.join("CMakeLists.txt")).unwrap(),
            "add_library(mfx STATIC ${sources})\nset(LIB_TYPE STATIC)\n"
        );
        assert_eq!(std::fs::read_to_string(nested.join("notes.txt")).unwrap(), "SHARED");
    }

    #[test]
    fn test_linux_cmake_args() {
        let args = linux_cmake_args(
            Path::new("/s/msdk"),
            Path::new("/i/msdk"),
            Path::new("/i/libva"),
            Path::new("/i/llvm/libcxx"),
        );
        assert_eq!(args[0], "-DCMAKE_INSTALL_PREFIX=/i/msdk");
        assert!(args.contains(&"-DCMAKE_PREFIX_PATH=/i/libva".to_string()));
        assert!(args.contains(&"/s/msdk".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some(
                "-DCMAKE_CXX_FLAGS=-nostdinc++ -isystem/i/llvm/libcxx/include \
                 -D_LIBCPP_ABI_UNSTABLE -D_LIBCPP_DISABLE_AVAILABILITY"
            )
        );
    }

    #[test]
    fn test_msbuild_configuration() {
        assert_eq!(
            msbuild_configuration("10.0.19041.0"),
            "Release;Platform=x64;PlatformToolset=v142;SpectreMitigation=false;\
             WindowsTargetPlatformVersion=10.0.19041.0"
        );
    }
}
