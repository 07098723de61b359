//! `KEY=VALUE` version declaration files.
//!
//! The same line format is used by the project's `VERSION` file, by the
//! `VERSIONS` file shipped inside the prebuilt media engine, and by
//! `/etc/os-release`, so a single parser serves all three.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

/// Errors produced while loading or querying a [`VersionMap`].
#[derive(Error, Debug)]
pub enum VersionFileError {
    /// The file could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// File that failed to load.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A non-comment, non-blank line had no `=` separator.
    #[error("Malformed version line {line_number}: {line:?}")]
    MalformedLine {
        /// 1-based line number.
        line_number: usize,
        /// The offending line, trimmed.
        line: String,
    },

    /// A key the caller required is not declared.
    #[error("Missing version key: {0}")]
    MissingKey(String),
}

/// Declared versions, keyed by dependency name.
///
/// Immutable once loaded; lookups go through [`VersionMap::get`] so that a
/// missing declaration surfaces as [`VersionFileError::MissingKey`] instead
/// of a silent default.
///
/// # Example
///
/// ```
/// use sdkbuild_schema::VersionMap;
///
/// let versions = VersionMap::parse("# pinned\nBOOST_VERSION=\"1.82.0\"\n").unwrap();
/// assert_eq!(versions.get("BOOST_VERSION").unwrap(), "1.82.0");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMap(BTreeMap<String, String>);

impl VersionMap {
    /// Read and parse a version declaration file.
    ///
    /// # Errors
    ///
    /// Returns [`VersionFileError::Io`] if the file cannot be read and
    /// [`VersionFileError::MalformedLine`] on the first line without `=`.
    pub fn load(path: &Path) -> Result<Self, VersionFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| VersionFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse version declarations from text.
    ///
    /// Lines are trimmed; blank lines and lines starting with `#` are skipped.
    /// The first `=` separates key from value, so any later `=` stays part of
    /// the value. Surrounding double quotes are stripped from the value.
    ///
    /// # Errors
    ///
    /// Returns [`VersionFileError::MalformedLine`] for a line with no `=`.
    pub fn parse(content: &str) -> Result<Self, VersionFileError> {
        let mut map = BTreeMap::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(VersionFileError::MalformedLine {
                    line_number: idx + 1,
                    line: line.to_string(),
                });
            };

            map.insert(
                key.trim().to_string(),
                value.trim().trim_matches('"').to_string(),
            );
        }

        Ok(Self(map))
    }

    /// Look up a declared version.
    ///
    /// # Errors
    ///
    /// Returns [`VersionFileError::MissingKey`] if `key` was never declared.
    pub fn get(&self, key: &str) -> Result<&str, VersionFileError> {
        self.0
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| VersionFileError::MissingKey(key.to_string()))
    }

    /// Look up a declared version, returning `None` when absent.
    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of declared keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no keys were declared.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_value_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VERSION");
        std::fs::write(&path, "KEY=\"value\"\n").unwrap();

        let versions = VersionMap::load(&path).unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions.get("KEY").unwrap(), "value");
    }

    #[test]
    fn test_comments_and_blank_lines_are_ignored() {
        let versions = VersionMap::parse(
            "# header comment\n\n  CMAKE_VERSION = 3.27.7  \n   # indented comment\nBOOST_VERSION=1.83.0\n",
        )
        .unwrap();

        assert_eq!(versions.len(), 2);
        assert_eq!(versions.get("CMAKE_VERSION").unwrap(), "3.27.7");
        assert_eq!(versions.get("BOOST_VERSION").unwrap(), "1.83.0");
    }

    #[test]
    fn test_only_first_equals_splits() {
        let versions = VersionMap::parse("WEBRTC_SRC_TOOLS_URL=https://x/y?a=b=c\n").unwrap();
        assert_eq!(
            versions.get("WEBRTC_SRC_TOOLS_URL").unwrap(),
            "https://x/y?a=b=c"
        );
    }

    #[test]
    fn test_line_without_separator_is_malformed() {
        let err = VersionMap::parse("A=1\nnot a declaration\n").unwrap_err();
        match err {
            VersionFileError::MalformedLine { line_number, line } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "not a declaration");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_key() {
        let versions = VersionMap::parse("A=1\n").unwrap();
        assert!(matches!(
            versions.get("B"),
            Err(VersionFileError::MissingKey(key)) if key == "B"
        ));
        assert_eq!(versions.get_opt("B"), None);
    }

    #[test]
    fn test_os_release_format() {
        let versions =
            VersionMap::parse("NAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\nID=ubuntu\n").unwrap();
        assert_eq!(versions.get("NAME").unwrap(), "Ubuntu");
        assert_eq!(versions.get("VERSION_ID").unwrap(), "22.04");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = VersionMap::load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, VersionFileError::Io { .. }));
    }
}
