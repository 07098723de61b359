//! Archive downloads through an external HTTP client.
//!
//! `curl` is preferred, `wget` is the fallback. An archive that is already
//! present in the destination directory is reused as-is.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::remove_all;
use crate::tools::{ToolEnv, ToolError};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Neither curl nor wget is available")]
    NoDownloader,

    #[error("Cannot derive a file name from {0}")]
    NoFilename(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extract the filename from a URL, ignoring any query or fragment.
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.split('/').next_back().unwrap_or("")
}

/// Download `url` into `output_dir`, named after the URL unless `filename`
/// is given. Returns the local path.
///
/// # Errors
///
/// Fails if no downloader is installed or the download command fails; in the
/// latter case the partially written file is removed.
pub fn download(
    env: &ToolEnv,
    url: &str,
    output_dir: &Path,
    filename: Option<&str>,
) -> Result<PathBuf, DownloadError> {
    let name = match filename {
        Some(name) => name,
        None => filename_from_url(url),
    };
    if name.is_empty() {
        return Err(DownloadError::NoFilename(url.to_string()));
    }
    let output_path = output_dir.join(name);

    if output_path.exists() {
        tracing::debug!("{} already downloaded", output_path.display());
        return Ok(output_path);
    }
    std::fs::create_dir_all(output_dir)?;

    tracing::info!("Downloading {url}");
    let result = if env.resolve("curl").is_ok() {
        env.command("curl")
            .arg("-fLo")
            .arg(&output_path)
            .arg(url)
            .run()
    } else if env.resolve("wget").is_ok() {
        env.command("wget")
            .arg("-cO")
            .arg(&output_path)
            .arg(url)
            .run()
    } else {
        return Err(DownloadError::NoDownloader);
    };

    if let Err(e) = result {
        // A leftover partial file would be taken as a finished download.
        remove_all(&output_path)?;
        return Err(e.into());
    }

    Ok(output_path)
}
