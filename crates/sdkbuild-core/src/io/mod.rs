//! IO modules - side effects (external downloads, filesystem)

pub mod download;
pub mod extract;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Remove a file, symlink or directory tree. A missing path is not an error.
///
/// # Errors
///
/// Returns any error other than `NotFound` raised while removing.
pub fn remove_all(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("rm -rf {} => path not found", path.display());
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
        tracing::debug!("rm -rf {} => directory removed", path.display());
    } else {
        fs::remove_file(path)?;
        tracing::debug!("rm -rf {} => file removed", path.display());
    }
    Ok(())
}

/// Path that leads from `from_dir` to `to_path`, both absolute.
pub fn relative_path(from_dir: &Path, to_path: &Path) -> PathBuf {
    let from_components: Vec<_> = from_dir.components().collect();
    let to_components: Vec<_> = to_path.components().collect();

    let common_len = from_components
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common_len..from_components.len() {
        result.push("..");
    }
    for part in &to_components[common_len..] {
        result.push(part);
    }
    result
}

/// Recursively copy the contents of `src` into `dst`, overwriting.
///
/// # Errors
///
/// Returns an error if any file or directory cannot be copied.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    fs_extra::dir::copy(
        src,
        dst,
        &fs_extra::dir::CopyOptions::new()
            .content_only(true)
            .overwrite(true),
    )
    .map_err(|e| io::Error::other(format!("Copy {} failed: {e}", src.display())))?;
    Ok(())
}

/// Every regular file below `dir`, as paths relative to `base`, sorted.
///
/// # Errors
///
/// Returns the first error hit while walking, such as an unreadable
/// directory. A missing `dir` is an error too.
pub fn files_under(dir: &Path, base: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(base) {
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
