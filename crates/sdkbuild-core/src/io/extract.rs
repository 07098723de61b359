//! Archive normalization
//!
//! Upstream archives disagree on whether their contents sit under a single
//! top-level directory (`boost_1_83_0/`, `cmake-3.27.7-linux-x86_64/`) or at
//! the archive root. [`extract`] hides the difference: the result always
//! lands in `output_dir/output_dirname`, with a lone wrapping directory
//! stripped.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;
use zip::ZipArchive;

use super::remove_all;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Compression container understood by [`extract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// gzip-compressed tarball
    TarGz,
    /// zip
    Zip,
}

impl ArchiveKind {
    /// Detect the kind from the file name (case-insensitive).
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// One member of an archive, as seen before extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// `/`-separated path with `.` components removed and no trailing `/`.
    pub path: String,
    pub is_dir: bool,
    /// POSIX mode bits, when the archive recorded them.
    pub mode: Option<u32>,
    pub symlink_target: Option<String>,
}

fn normalize_name(name: &str) -> String {
    name.split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn zip_err(e: zip::result::ZipError) -> ExtractError {
    ExtractError::Archive(e.to_string())
}

/// Reader over a `.tar.gz`. The stream is reopened for each pass.
#[derive(Debug)]
pub struct TarReader {
    path: PathBuf,
}

impl TarReader {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        // Fail early on a missing file rather than on first use.
        File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn archive(&self) -> Result<tar::Archive<GzDecoder<BufReader<File>>>, ExtractError> {
        let file = File::open(&self.path)?;
        Ok(tar::Archive::new(GzDecoder::new(BufReader::new(file))))
    }

    pub fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ExtractError> {
        let mut archive = self.archive()?;
        let mut entries = Vec::new();

        for entry in archive.entries()? {
            let entry = entry?;
            let header = entry.header();
            let entry_type = header.entry_type();
            // Extended headers describe other members and are never unpacked.
            if entry_type.is_pax_global_extensions()
                || entry_type.is_pax_local_extensions()
                || entry_type.is_gnu_longname()
                || entry_type.is_gnu_longlink()
            {
                continue;
            }
            let path = normalize_name(&entry.path()?.to_string_lossy());
            if path.is_empty() {
                continue;
            }

            let symlink_target = if entry_type.is_symlink() {
                entry
                    .link_name()?
                    .map(|target| target.to_string_lossy().into_owned())
            } else {
                None
            };

            entries.push(ArchiveEntry {
                path,
                is_dir: entry_type.is_dir(),
                mode: header.mode().ok(),
                symlink_target,
            });
        }

        Ok(entries)
    }

    /// Native tar extraction. Permissions and symlinks come through as-is.
    pub fn unpack(&mut self, dest: &Path) -> Result<(), ExtractError> {
        fs::create_dir_all(dest)?;
        let mut archive = self.archive()?;
        archive.set_preserve_permissions(true);
        archive.set_overwrite(true);
        archive.unpack(dest)?;
        Ok(())
    }
}

/// Reader over a `.zip`.
#[derive(Debug)]
pub struct ZipReader {
    archive: ZipArchive<File>,
}

impl ZipReader {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file).map_err(zip_err)?;
        Ok(Self { archive })
    }

    pub fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ExtractError> {
        let mut entries = Vec::with_capacity(self.archive.len());
        for i in 0..self.archive.len() {
            let file = self.archive.by_index_raw(i).map_err(zip_err)?;
            let path = normalize_name(file.name());
            if path.is_empty() {
                continue;
            }
            entries.push(ArchiveEntry {
                path,
                is_dir: file.is_dir(),
                mode: file.unix_mode(),
                symlink_target: None,
            });
        }
        Ok(entries)
    }

    /// Write every member's raw bytes, then restore POSIX metadata.
    ///
    /// The bulk pass turns symlink members into small regular files holding
    /// the link target; the metadata pass runs afterwards so that a link can
    /// point at a member stored later in the archive.
    pub fn unpack(&mut self, dest: &Path) -> Result<(), ExtractError> {
        fs::create_dir_all(dest)?;
        let mut with_mode = Vec::new();

        for i in 0..self.archive.len() {
            let mut file = self.archive.by_index(i).map_err(zip_err)?;
            let Some(relative_path) = file.enclosed_name() else {
                tracing::warn!("Skipping zip entry outside destination: {}", file.name());
                continue;
            };
            let absolute_path = dest.join(&relative_path);

            if file.is_dir() {
                fs::create_dir_all(&absolute_path)?;
                continue;
            }

            if let Some(parent) = absolute_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&absolute_path)?;
            io::copy(&mut file, &mut outfile)?;

            if let Some(mode) = file.unix_mode() {
                with_mode.push((absolute_path, mode));
            }
        }

        #[cfg(unix)]
        for (path, mode) in &with_mode {
            restore_unix_metadata(path, *mode)?;
        }
        #[cfg(not(unix))]
        drop(with_mode);

        Ok(())
    }
}

#[cfg(unix)]
const S_IFMT: u32 = 0o170_000;
#[cfg(unix)]
const S_IFLNK: u32 = 0o120_000;

#[cfg(unix)]
fn restore_unix_metadata(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if mode & S_IFMT == S_IFLNK {
        let target = fs::read_to_string(path)?;
        fs::remove_file(path)?;
        let link_dir = path.parent().unwrap_or_else(|| Path::new("."));
        if link_dir.join(&target).exists() {
            std::os::unix::fs::symlink(&target, path)?;
        } else {
            tracing::debug!(
                "Dropping dangling symlink {} -> {target}",
                path.display()
            );
        }
        return Ok(());
    }

    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
}

/// An opened archive of either supported kind.
#[derive(Debug)]
pub enum ArchiveReader {
    Tar(TarReader),
    Zip(ZipReader),
}

impl ArchiveReader {
    pub fn open(path: &Path, kind: ArchiveKind) -> Result<Self, ExtractError> {
        Ok(match kind {
            ArchiveKind::TarGz => Self::Tar(TarReader::open(path)?),
            ArchiveKind::Zip => Self::Zip(ZipReader::open(path)?),
        })
    }

    pub fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ExtractError> {
        match self {
            Self::Tar(reader) => reader.entries(),
            Self::Zip(reader) => reader.entries(),
        }
    }

    pub fn unpack(&mut self, dest: &Path) -> Result<(), ExtractError> {
        match self {
            Self::Tar(reader) => reader.unpack(dest),
            Self::Zip(reader) => reader.unpack(dest),
        }
    }
}

/// Name of the one top-level directory every entry lives under, if any.
///
/// A file sitting directly at the root, or a second top-level name, means
/// there is no wrapping directory. An empty archive has none either.
pub fn single_wrapping_dir(entries: &[ArchiveEntry]) -> Option<String> {
    let mut wrapping: Option<&str> = None;

    for entry in entries {
        let name = entry.path.trim_end_matches('/');
        let top = match name.split_once('/') {
            Some((first, _)) => first,
            None if entry.is_dir => name,
            None => return None,
        };
        match wrapping {
            Some(existing) if existing != top => return None,
            _ => wrapping = Some(top),
        }
    }

    wrapping.map(str::to_string)
}

/// Extract `archive_path` into `output_dir/output_dirname`.
///
/// Any previous `output_dir/output_dirname` is deleted first. When the
/// archive wraps everything in one directory `D`, `output_dir/D` is deleted,
/// the archive is unpacked into `output_dir`, and `D` is renamed to
/// `output_dirname`. Otherwise the archive is unpacked verbatim into a fresh
/// `output_dir/output_dirname`.
///
/// `kind` overrides detection from the file extension.
///
/// # Errors
///
/// [`ExtractError::UnsupportedFormat`] is returned before anything on disk
/// changes. A failure part-way through leaves partial output behind.
pub fn extract(
    archive_path: &Path,
    output_dir: &Path,
    output_dirname: &str,
    kind: Option<ArchiveKind>,
) -> Result<PathBuf, ExtractError> {
    let kind = kind
        .or_else(|| ArchiveKind::detect(archive_path))
        .ok_or_else(|| {
            ExtractError::UnsupportedFormat(format!(
                "{} should end with .tar.gz or .zip",
                archive_path.display()
            ))
        })?;

    let target = output_dir.join(output_dirname);
    tracing::info!(
        "Extract {} to {}",
        archive_path.display(),
        target.display()
    );

    let mut reader = ArchiveReader::open(archive_path, kind)?;
    let entries = reader.entries()?;
    remove_all(&target)?;

    match single_wrapping_dir(&entries) {
        None => {
            fs::create_dir_all(&target)?;
            reader.unpack(&target)?;
        }
        Some(dir) => {
            tracing::info!("Directory {dir} is stripped");
            let wrapped = output_dir.join(&dir);
            remove_all(&wrapped)?;
            reader.unpack(output_dir)?;
            if wrapped != target {
                tracing::debug!("mv {} {}", wrapped.display(), target.display());
                fs::rename(&wrapped, &target)?;
            }
        }
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(path: &str, is_dir: bool) -> ArchiveEntry {
        ArchiveEntry {
            path: path.to_string(),
            is_dir,
            mode: None,
            symlink_target: None,
        }
    }

    enum Member<'a> {
        Dir(&'a str),
        File(&'a str, &'a [u8], u32),
        Symlink(&'a str, &'a str),
        PaxGlobal(&'a str, &'a [u8]),
    }

    fn write_tar_gz(path: &Path, members: &[Member<'_>]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for member in members {
            let mut header = tar::Header::new_gnu();
            match member {
                Member::Dir(name) => {
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_size(0);
                    header.set_mode(0o755);
                    builder.append_data(&mut header, name, io::empty()).unwrap();
                }
                Member::File(name, data, mode) => {
                    header.set_size(data.len() as u64);
                    header.set_mode(*mode);
                    builder.append_data(&mut header, name, *data).unwrap();
                }
                Member::Symlink(name, target) => {
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_size(0);
                    header.set_mode(0o777);
                    builder.append_link(&mut header, name, target).unwrap();
                }
                Member::PaxGlobal(name, records) => {
                    let mut header = tar::Header::new_ustar();
                    header.set_entry_type(tar::EntryType::XGlobalHeader);
                    header.set_size(records.len() as u64);
                    header.set_mode(0o644);
                    builder.append_data(&mut header, name, *records).unwrap();
                }
            }
        }

        builder.into_inner().unwrap().finish().unwrap();
    }

    fn write_zip(path: &Path, members: &[Member<'_>]) {
        use zip::write::SimpleFileOptions;

        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for member in members {
            match member {
                Member::Dir(name) => {
                    zip.add_directory(*name, SimpleFileOptions::default())
                        .unwrap();
                }
                Member::File(name, data, mode) => {
                    let options = SimpleFileOptions::default().unix_permissions(*mode);
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(data).unwrap();
                }
                Member::Symlink(name, target) => {
                    zip.add_symlink(*name, *target, SimpleFileOptions::default())
                        .unwrap();
                }
                Member::PaxGlobal(..) => unreachable!("tar-only member"),
            }
        }
        zip.finish().unwrap();
    }

    /// Every path under `root`, relative and `/`-separated, sorted.
    fn listing(root: &Path) -> Vec<String> {
        let mut paths: Vec<String> = walkdir::WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|e| {
                let e = e.unwrap();
                e.path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(
            ArchiveKind::detect(Path::new("boost_1_83_0.TAR.GZ")),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(
            ArchiveKind::detect(Path::new("x.tgz")),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(
            ArchiveKind::detect(Path::new("webrtc.windows_x86_64.zip")),
            Some(ArchiveKind::Zip)
        );
        assert_eq!(ArchiveKind::detect(Path::new("cuda.exe")), None);
    }

    #[test]
    fn test_single_wrapping_dir() {
        assert_eq!(single_wrapping_dir(&[]), None);

        let wrapped = [
            entry("pkg", true),
            entry("pkg/bin", true),
            entry("pkg/bin/tool", false),
        ];
        assert_eq!(single_wrapping_dir(&wrapped).as_deref(), Some("pkg"));

        // Zip-style trailing separator on a directory-only archive.
        assert_eq!(
            single_wrapping_dir(&[entry("only/", true)]).as_deref(),
            Some("only")
        );

        let root_file = [entry("pkg/a", false), entry("LICENSE", false)];
        assert_eq!(single_wrapping_dir(&root_file), None);

        let two_dirs = [entry("a/x", false), entry("b/y", false)];
        assert_eq!(single_wrapping_dir(&two_dirs), None);
    }

    #[test]
    fn test_normalize_drops_current_dir() {
        assert_eq!(normalize_name("./pkg/./bin/"), "pkg/bin");
        assert_eq!(normalize_name("./"), "");
    }

    #[test]
    fn test_unsupported_format_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("out/keep");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("marker"), "still here").unwrap();

        let archive = dir.path().join("thing.rar");
        fs::write(&archive, "not an archive").unwrap();

        let err = extract(&archive, &dir.path().join("out"), "keep", None).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
        assert!(existing.join("marker").is_file());
    }

    #[test]
    fn test_tar_wrapping_dir_is_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("lib-1.2.tar.gz");
        write_tar_gz(
            &archive,
            &[
                Member::Dir("lib-1.2/"),
                Member::File("lib-1.2/include/lib.h", b"// lib", 0o644),
                Member::File("lib-1.2/bin/tool", b"#!/bin/sh\n", 0o755),
            ],
        );

        let out = dir.path().join("install");
        fs::create_dir_all(out.join("lib")).unwrap();
        fs::write(out.join("lib/stale"), "old").unwrap();

        let result = extract(&archive, &out, "lib", None).unwrap();
        assert_eq!(result, out.join("lib"));
        assert_eq!(
            listing(&result),
            ["bin", "bin/tool", "include", "include/lib.h"]
        );
        assert!(result.join("include/lib.h").is_file());
        assert!(!result.join("stale").exists());
        assert!(!out.join("lib-1.2").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(result.join("bin/tool"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_tar_with_root_file_keeps_layout() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("lib.tar.gz");
        write_tar_gz(
            &archive,
            &[
                Member::File("lib-1.2/file1", b"1", 0o644),
                Member::File("LICENSE", b"MIT", 0o644),
            ],
        );

        let result = extract(&archive, dir.path(), "lib", None).unwrap();
        assert_eq!(listing(&result), ["LICENSE", "lib-1.2", "lib-1.2/file1"]);
        assert!(result.join("lib-1.2/file1").is_file());
        assert!(result.join("LICENSE").is_file());
    }

    #[test]
    fn test_tar_dot_prefixed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("dot.tar.gz");
        write_tar_gz(
            &archive,
            &[
                Member::Dir("./"),
                Member::File("./pkg/readme", b"hi", 0o644),
            ],
        );

        let result = extract(&archive, dir.path(), "dot", None).unwrap();
        assert!(result.join("readme").is_file());
    }

    #[test]
    fn test_tar_pax_global_header_is_not_a_member() {
        // `git archive` puts a global extended header before the wrapping dir.
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("libyuv.tar.gz");
        write_tar_gz(
            &archive,
            &[
                Member::PaxGlobal("pax_global_header", b"19 comment=git-sha\n"),
                Member::Dir("libyuv-main/"),
                Member::File("libyuv-main/include/libyuv.h", b"// yuv", 0o644),
            ],
        );

        let mut reader = ArchiveReader::open(&archive, ArchiveKind::TarGz).unwrap();
        let paths: Vec<String> = reader
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, ["libyuv-main", "libyuv-main/include/libyuv.h"]);

        let result = extract(&archive, dir.path(), "libyuv", None).unwrap();
        assert_eq!(listing(&result), ["include", "include/libyuv.h"]);
        assert!(!dir.path().join("libyuv-main").exists());
        assert!(!dir.path().join("pax_global_header").exists());
    }

    #[test]
    fn test_reextract_replaces_previous_archive() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("cmake-3.27.7.tar.gz");
        write_tar_gz(
            &old,
            &[
                Member::File("cmake-3.27.7/bin/cmake", b"old", 0o755),
                Member::File("cmake-3.27.7/doc/old-only.txt", b"gone", 0o644),
            ],
        );
        let new = dir.path().join("cmake-3.28.1.zip");
        write_zip(
            &new,
            &[
                Member::Dir("cmake-3.28.1/"),
                Member::File("cmake-3.28.1/bin/cmake", b"new", 0o755),
                Member::File("cmake-3.28.1/share/new-only.txt", b"here", 0o644),
            ],
        );

        let out = dir.path().join("install");
        extract(&old, &out, "cmake", None).unwrap();
        let result = extract(&new, &out, "cmake", None).unwrap();

        assert_eq!(
            listing(&result),
            ["bin", "bin/cmake", "share", "share/new-only.txt"]
        );
        assert_eq!(fs::read_to_string(result.join("bin/cmake")).unwrap(), "new");
        assert_eq!(
            listing(&out),
            ["cmake", "cmake/bin", "cmake/bin/cmake", "cmake/share", "cmake/share/new-only.txt"]
        );
    }

    #[test]
    fn test_wrapping_dir_matching_output_name() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("cmake.tar.gz");
        write_tar_gz(&archive, &[Member::File("cmake/bin/cmake", b"", 0o755)]);

        let result = extract(&archive, dir.path(), "cmake", None).unwrap();
        assert!(result.join("bin/cmake").is_file());
    }

    #[test]
    fn test_explicit_kind_overrides_extension() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("download.bin");
        write_zip(&archive, &[Member::File("a.txt", b"a", 0o644)]);

        let result = extract(&archive, dir.path(), "out", Some(ArchiveKind::Zip)).unwrap();
        assert_eq!(fs::read_to_string(result.join("a.txt")).unwrap(), "a");
    }

    #[cfg(unix)]
    #[test]
    fn test_tar_symlinks_survive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("links.tar.gz");
        write_tar_gz(
            &archive,
            &[
                Member::File("pkg/lib/libfoo.so.1", b"elf", 0o644),
                Member::Symlink("pkg/lib/libfoo.so", "libfoo.so.1"),
            ],
        );

        let result = extract(&archive, dir.path(), "foo", None).unwrap();
        let link = result.join("lib/libfoo.so");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(link).unwrap(), PathBuf::from("libfoo.so.1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_zip_restores_permissions_and_symlinks() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("android-ndk-r26b-linux.zip");
        write_zip(
            &archive,
            &[
                Member::Dir("android-ndk-r26b/"),
                Member::File("android-ndk-r26b/ndk-build", b"#!/bin/sh\n", 0o755),
                Member::File("android-ndk-r26b/source.properties", b"Pkg.Revision=26", 0o600),
                Member::Symlink("android-ndk-r26b/ndk-link", "ndk-build"),
                Member::Symlink("android-ndk-r26b/dangling", "does-not-exist"),
            ],
        );

        let result = extract(&archive, dir.path(), "android-ndk", None).unwrap();

        let mode = |p: &str| {
            fs::metadata(result.join(p)).unwrap().permissions().mode() & 0o777
        };
        assert_eq!(mode("ndk-build"), 0o755);
        assert_eq!(mode("source.properties"), 0o600);

        let link = result.join("ndk-link");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("ndk-build"));

        assert!(result.join("dangling").symlink_metadata().is_err());
    }

    #[test]
    fn test_zip_slip_entry_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(
            &archive,
            &[
                Member::File("good.txt", b"ok", 0o644),
                Member::File("../escaped.txt", b"bad", 0o644),
            ],
        );

        let out = dir.path().join("nested");
        fs::create_dir_all(&out).unwrap();
        let result = extract(&archive, &out, "evil", None).unwrap();
        assert!(result.join("good.txt").is_file());
        assert!(!out.join("escaped.txt").exists());
        assert!(!dir.path().join("escaped.txt").exists());
    }

    #[test]
    fn test_empty_zip_creates_empty_target() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("empty.zip");
        write_zip(&archive, &[]);

        let result = extract(&archive, dir.path(), "empty", None).unwrap();
        assert!(result.is_dir());
        assert_eq!(fs::read_dir(&result).unwrap().count(), 0);
    }
}
