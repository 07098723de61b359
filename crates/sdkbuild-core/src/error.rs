//! Errors raised while installing dependencies or building the SDK

use sdkbuild_schema::{PlatformError, VersionFileError};
use thiserror::Error;

use crate::io::download::DownloadError;
use crate::io::extract::ExtractError;
use crate::tools::ToolError;

#[derive(Error, Debug)]
pub enum DepsError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Version(#[from] VersionFileError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{context}: {message}")]
    Context {
        context: &'static str,
        message: String,
    },
}

impl DepsError {
    /// Create an error with context for better debugging.
    pub fn context(ctx: &'static str, msg: impl std::fmt::Display) -> Self {
        Self::Context {
            context: ctx,
            message: msg.to_string(),
        }
    }
}
