//! Cross-compilation sysroot for Jetson, bootstrapped with `multistrap`.

use std::path::{Path, PathBuf};

use sdkbuild_schema::{Arch, PlatformDescriptor};
use sha2::{Digest, Sha256};

use crate::context::Context;
use crate::error::DepsError;
use crate::io::remove_all;

/// `multistrap/<target>.conf` under the project root.
pub fn conf_path(root: &Path, target: &PlatformDescriptor) -> PathBuf {
    root.join("multistrap")
        .join(format!("{}.conf", target.package_name()))
}

/// The rootfs is versioned by the content of its multistrap configuration.
///
/// # Errors
///
/// Fails if the configuration cannot be read.
pub fn conf_digest(conf: &Path) -> Result<String, DepsError> {
    let bytes = std::fs::read(conf).map_err(|e| {
        DepsError::context(
            "reading multistrap configuration",
            format!("{}: {e}", conf.display()),
        )
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// # Errors
///
/// Propagates `mknod`/`multistrap` and filesystem failures.
pub fn install(ctx: &Context, _version: &str) -> Result<(), DepsError> {
    let rootfs = ctx.layout.install_dir().join("rootfs");
    let conf = conf_path(ctx.layout.root(), ctx.target());
    remove_all(&rootfs)?;

    if ctx.build().arch == Some(Arch::Arm64) {
        // dbus setup inside the rootfs reads /dev/urandom.
        let dev = rootfs.join("dev");
        std::fs::create_dir_all(&dev)?;
        ctx.env
            .command("mknod")
            .arg(dev.join("urandom"))
            .args(["c", "1", "9"])
            .run()?;
    }

    ctx.env
        .command("multistrap")
        .args(["--no-auth", "-a", "arm64", "-d"])
        .arg(&rootfs)
        .arg("-f")
        .arg(&conf)
        .run()?;

    #[cfg(unix)]
    {
        let rewritten = relativize_absolute_symlinks(&rootfs)?;
        tracing::info!("Rewrote {rewritten} absolute symlinks in rootfs");
        link_nvbuf_fdmap(&rootfs)?;
    }
    Ok(())
}

/// Rewrite symlinks pointing at absolute paths so they resolve inside `rootfs`.
///
/// A link is only rewritten when its target exists under `rootfs`. Returns
/// the number of links rewritten.
///
/// # Errors
///
/// Propagates filesystem errors.
#[cfg(unix)]
pub fn relativize_absolute_symlinks(rootfs: &Path) -> std::io::Result<usize> {
    let links: Vec<PathBuf> = walkdir::WalkDir::new(rootfs)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path_is_symlink())
        .map(walkdir::DirEntry::into_path)
        .collect();

    let mut rewritten = 0;
    for link in links {
        let Ok(target) = std::fs::read_link(&link) else {
            continue;
        };
        let Ok(inside) = target.strip_prefix("/") else {
            continue;
        };
        let target_path = rootfs.join(inside);
        if !target_path.exists() {
            continue;
        }
        let Some(link_dir) = link.parent() else {
            continue;
        };

        let relative = crate::io::relative_path(link_dir, &target_path);
        tracing::debug!(
            "{} targets {} to {}",
            link.strip_prefix(rootfs).unwrap_or(&link).display(),
            target.display(),
            relative.display()
        );
        std::fs::remove_file(&link)?;
        std::os::unix::fs::symlink(&relative, &link)?;
        rewritten += 1;
    }
    Ok(rewritten)
}

/// L4T ships `libnvbuf_fdmap.so.1.0.0` without the unversioned link.
#[cfg(unix)]
fn link_nvbuf_fdmap(rootfs: &Path) -> std::io::Result<()> {
    let tegra = rootfs.join("usr/lib/aarch64-linux-gnu/tegra");
    let file = tegra.join("libnvbuf_fdmap.so.1.0.0");
    let link = tegra.join("libnvbuf_fdmap.so");
    if file.exists() && !link.exists() {
        std::os::unix::fs::symlink("libnvbuf_fdmap.so.1.0.0", &link)?;
    }
    Ok(())
}
