//! Shared vocabulary for `sdkbuild`.
//!
//! Platforms, the build-host/target compatibility matrix and the `KEY=VALUE`
//! version declarations. Nothing in this crate touches the filesystem except
//! [`VersionMap::load`].

pub mod arch;
pub mod platform;
pub mod versions;

// Re-exports
pub use arch::*;
pub use platform::{
    COMPATIBILITY, CompatRule, Os, PlatformDescriptor, PlatformError, PlatformPair,
    SUPPORTED_BUILD_OS, SUPPORTED_TARGET_OS, Target,
};
pub use versions::{VersionFileError, VersionMap};

/// Name of the version declaration file at the project root.
pub const VERSION_FILE: &str = "VERSION";
