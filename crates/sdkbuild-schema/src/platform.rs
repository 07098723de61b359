//! Build-host / target platform vocabulary and the compatibility matrix.
//!
//! A [`PlatformPair`] can only be obtained through [`PlatformPair::validate`],
//! so every pair that reaches the dependency pipeline is known to be legal.
//! Validation stops at the first violated rule.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Arch;

/// Raised when a platform, or a combination of platforms, is not supported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The first violated platform rule, described for humans.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

fn unsupported(msg: impl Into<String>) -> PlatformError {
    PlatformError::UnsupportedPlatform(msg.into())
}

/// Operating system family of a build host or a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Os {
    /// Microsoft Windows.
    Windows,
    /// Apple macOS.
    Macos,
    /// Ubuntu Linux (the only Linux distribution accepted as a build host).
    Ubuntu,
    /// Apple iOS.
    Ios,
    /// Google Android.
    Android,
    /// Raspberry Pi OS.
    RaspberryPiOs,
    /// NVIDIA Jetson (Ubuntu-based L4T).
    Jetson,
}

/// Operating systems a build may run on.
pub const SUPPORTED_BUILD_OS: &[Os] = &[Os::Windows, Os::Macos, Os::Ubuntu];

/// Operating systems a build may target (a superset of [`SUPPORTED_BUILD_OS`]).
pub const SUPPORTED_TARGET_OS: &[Os] = &[
    Os::Windows,
    Os::Macos,
    Os::Ubuntu,
    Os::Ios,
    Os::Android,
    Os::RaspberryPiOs,
    Os::Jetson,
];

impl Os {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Macos => "macos",
            Self::Ubuntu => "ubuntu",
            Self::Ios => "ios",
            Self::Android => "android",
            Self::RaspberryPiOs => "raspberry-pi-os",
            Self::Jetson => "jetson",
        }
    }

    /// Architectures an OS of this family may be paired with.
    ///
    /// `None` means the platform must not carry an architecture at all.
    pub fn legal_arches(&self) -> Option<&'static [Arch]> {
        match self {
            Self::RaspberryPiOs => Some(&[Arch::Armv6, Arch::Armv7, Arch::Armv8]),
            Self::Jetson => Some(&[Arch::Armv8]),
            Self::Ios | Self::Android => None,
            Self::Windows | Self::Macos | Self::Ubuntu => Some(&[Arch::X86_64, Arch::Arm64]),
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Os {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SUPPORTED_TARGET_OS
            .iter()
            .copied()
            .find(|os| os.as_str() == s)
            .ok_or_else(|| unsupported(format!("OS {s} not supported")))
    }
}

/// One side of a platform pair: `{os, os_version, arch}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// Operating system family.
    pub os: Os,
    /// OS release (e.g. `22.04`), when it matters.
    pub os_version: Option<String>,
    /// CPU architecture; absent for platforms that produce fat binaries.
    pub arch: Option<Arch>,
}

impl PlatformDescriptor {
    /// Create a descriptor.
    pub fn new(os: Os, os_version: Option<&str>, arch: Option<Arch>) -> Self {
        Self {
            os,
            os_version: os_version.map(str::to_string),
            arch,
        }
    }

    /// Directory-safe identifier used to partition the install tree and to
    /// name packages (e.g. `ubuntu-22.04_x86_64`).
    pub fn package_name(&self) -> String {
        let arch = self.arch.map(|a| a.as_str()).unwrap_or_default();
        match self.os {
            Os::Windows => format!("windows_{arch}"),
            Os::Macos => format!("macos_{arch}"),
            Os::Ubuntu => format!(
                "ubuntu-{}_{arch}",
                self.os_version.as_deref().unwrap_or_default()
            ),
            Os::Ios => "ios".to_string(),
            Os::Android => "android".to_string(),
            Os::RaspberryPiOs => format!("raspberry-pi-os_{arch}"),
            Os::Jetson => "ubuntu-20.04_armv8_jetson".to_string(),
        }
    }

    fn describe(&self) -> String {
        match (&self.os_version, self.arch) {
            (Some(ver), Some(arch)) => format!("{} {ver} {arch}", self.os),
            (None, Some(arch)) => format!("{} {arch}", self.os),
            (Some(ver), None) => format!("{} {ver}", self.os),
            (None, None) => self.os.to_string(),
        }
    }
}

impl std::fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A row of the compatibility table: which build hosts may produce a target.
#[derive(Debug, Clone, Copy)]
pub struct CompatRule {
    /// Target OS the rule applies to.
    pub target: Os,
    /// Target architectures allowed by this rule; `None` accepts any
    /// architecture that is legal for the target OS.
    pub target_arch: Option<&'static [Arch]>,
    /// Required build OS.
    pub build: Os,
    /// Allowed build-host architectures.
    pub build_arch: &'static [Arch],
    /// Whether build and target must run the same OS release.
    pub same_os_version: bool,
}

/// Static compatibility table, one row per target OS.
pub const COMPATIBILITY: &[CompatRule] = &[
    CompatRule {
        target: Os::Windows,
        target_arch: Some(&[Arch::X86_64]),
        build: Os::Windows,
        build_arch: &[Arch::X86_64],
        same_os_version: false,
    },
    CompatRule {
        target: Os::Macos,
        target_arch: None,
        build: Os::Macos,
        build_arch: &[Arch::X86_64, Arch::Arm64],
        same_os_version: false,
    },
    CompatRule {
        target: Os::Ios,
        target_arch: None,
        build: Os::Macos,
        build_arch: &[Arch::X86_64, Arch::Arm64],
        same_os_version: false,
    },
    CompatRule {
        target: Os::Android,
        target_arch: None,
        build: Os::Ubuntu,
        build_arch: &[Arch::X86_64],
        same_os_version: false,
    },
    CompatRule {
        target: Os::Ubuntu,
        target_arch: None,
        build: Os::Ubuntu,
        build_arch: &[Arch::X86_64],
        same_os_version: true,
    },
    CompatRule {
        target: Os::RaspberryPiOs,
        target_arch: None,
        build: Os::Ubuntu,
        build_arch: &[Arch::X86_64],
        same_os_version: false,
    },
    CompatRule {
        target: Os::Jetson,
        target_arch: None,
        build: Os::Ubuntu,
        build_arch: &[Arch::X86_64, Arch::Arm64],
        same_os_version: false,
    },
];

impl CompatRule {
    /// Look up the rule governing `target`.
    pub fn for_target(target: Os) -> Option<&'static CompatRule> {
        COMPATIBILITY.iter().find(|rule| rule.target == target)
    }

    /// Check a pair against this rule, reporting the first mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnsupportedPlatform`] naming the violated
    /// column of the rule.
    pub fn check(
        &self,
        build: &PlatformDescriptor,
        target: &PlatformDescriptor,
    ) -> Result<(), PlatformError> {
        let arch_allowed = |allowed: &[Arch]| target.arch.is_some_and(|a| allowed.contains(&a));
        if self.target_arch.is_some_and(|allowed| !arch_allowed(allowed)) {
            return Err(unsupported(format!(
                "target {} is not a supported {} architecture",
                target, self.target
            )));
        }
        if build.os != self.build {
            return Err(unsupported(format!(
                "target {} must be built on {}, not {}",
                target, self.build, build
            )));
        }
        if !build.arch.is_some_and(|a| self.build_arch.contains(&a)) {
            return Err(unsupported(format!(
                "target {target} cannot be built on a {build} host"
            )));
        }
        if self.same_os_version && build.os_version != target.os_version {
            return Err(unsupported(format!(
                "target {target} must be built on the same OS release (host is {build})"
            )));
        }
        Ok(())
    }
}

fn check_arch(role: &str, platform: &PlatformDescriptor) -> Result<(), PlatformError> {
    let legal = match (platform.os.legal_arches(), platform.arch) {
        (None, None) => true,
        (Some(allowed), Some(arch)) => allowed.contains(&arch),
        _ => false,
    };
    if legal {
        Ok(())
    } else {
        Err(unsupported(format!(
            "{role} platform {platform} has an illegal architecture for {}",
            platform.os
        )))
    }
}

/// A validated `(build host, target)` combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformPair {
    build: PlatformDescriptor,
    target: PlatformDescriptor,
}

impl PlatformPair {
    /// Validate a build/target combination.
    ///
    /// Rules are evaluated in a fixed order and the first violation is
    /// returned:
    /// 1. the build OS and target OS are in their supported sets,
    /// 2. each side's architecture is legal for its OS,
    /// 3. the pair matches the [`COMPATIBILITY`] row for the target OS.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnsupportedPlatform`] for the first broken rule.
    pub fn validate(
        build: PlatformDescriptor,
        target: PlatformDescriptor,
    ) -> Result<Self, PlatformError> {
        if !SUPPORTED_BUILD_OS.contains(&build.os) {
            return Err(unsupported(format!(
                "building on {} is not supported",
                build.os
            )));
        }
        if !SUPPORTED_TARGET_OS.contains(&target.os) {
            return Err(unsupported(format!(
                "targeting {} is not supported",
                target.os
            )));
        }

        check_arch("build", &build)?;
        check_arch("target", &target)?;

        let rule = CompatRule::for_target(target.os)
            .ok_or_else(|| unsupported(format!("no build host can produce {}", target.os)))?;
        rule.check(&build, &target)?;

        Ok(Self { build, target })
    }

    /// The build host.
    pub fn build(&self) -> &PlatformDescriptor {
        &self.build
    }

    /// The platform the SDK is being built for.
    pub fn target(&self) -> &PlatformDescriptor {
        &self.target
    }
}

/// The fixed set of targets selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// `windows_x86_64`
    #[serde(rename = "windows_x86_64")]
    WindowsX86_64,
    /// `macos_x86_64`
    #[serde(rename = "macos_x86_64")]
    MacosX86_64,
    /// `macos_arm64`
    #[serde(rename = "macos_arm64")]
    MacosArm64,
    /// `ubuntu-20.04_x86_64`
    #[serde(rename = "ubuntu-20.04_x86_64")]
    Ubuntu2004X86_64,
    /// `ubuntu-22.04_x86_64`
    #[serde(rename = "ubuntu-22.04_x86_64")]
    Ubuntu2204X86_64,
    /// `ubuntu-20.04_armv8_jetson`
    #[serde(rename = "ubuntu-20.04_armv8_jetson")]
    Ubuntu2004Armv8Jetson,
    /// `ios`
    #[serde(rename = "ios")]
    Ios,
    /// `android`
    #[serde(rename = "android")]
    Android,
}

impl Target {
    /// Every selectable target, in display order.
    pub const ALL: [Target; 8] = [
        Self::WindowsX86_64,
        Self::MacosX86_64,
        Self::MacosArm64,
        Self::Ubuntu2004X86_64,
        Self::Ubuntu2204X86_64,
        Self::Ubuntu2004Armv8Jetson,
        Self::Ios,
        Self::Android,
    ];

    /// Command-line spelling of the target.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WindowsX86_64 => "windows_x86_64",
            Self::MacosX86_64 => "macos_x86_64",
            Self::MacosArm64 => "macos_arm64",
            Self::Ubuntu2004X86_64 => "ubuntu-20.04_x86_64",
            Self::Ubuntu2204X86_64 => "ubuntu-22.04_x86_64",
            Self::Ubuntu2004Armv8Jetson => "ubuntu-20.04_armv8_jetson",
            Self::Ios => "ios",
            Self::Android => "android",
        }
    }

    /// Build the target descriptor.
    ///
    /// Desktop targets that are always built natively inherit the host's OS
    /// release when the host runs the same OS.
    pub fn descriptor(&self, host: &PlatformDescriptor) -> PlatformDescriptor {
        let host_version = |os: Os| {
            if host.os == os {
                host.os_version.as_deref()
            } else {
                None
            }
        };
        match self {
            Self::WindowsX86_64 => {
                PlatformDescriptor::new(Os::Windows, host_version(Os::Windows), Some(Arch::X86_64))
            }
            Self::MacosX86_64 => {
                PlatformDescriptor::new(Os::Macos, host_version(Os::Macos), Some(Arch::X86_64))
            }
            Self::MacosArm64 => {
                PlatformDescriptor::new(Os::Macos, host_version(Os::Macos), Some(Arch::Arm64))
            }
            Self::Ubuntu2004X86_64 => {
                PlatformDescriptor::new(Os::Ubuntu, Some("20.04"), Some(Arch::X86_64))
            }
            Self::Ubuntu2204X86_64 => {
                PlatformDescriptor::new(Os::Ubuntu, Some("22.04"), Some(Arch::X86_64))
            }
            Self::Ubuntu2004Armv8Jetson => {
                PlatformDescriptor::new(Os::Jetson, None, Some(Arch::Armv8))
            }
            Self::Ios => PlatformDescriptor::new(Os::Ios, None, None),
            Self::Android => PlatformDescriptor::new(Os::Android, None, None),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Target {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.as_str() == s).ok_or_else(|| {
            let names: Vec<&str> = Self::ALL.iter().map(Target::as_str).collect();
            unsupported(format!(
                "unknown target {s} (expected one of: {})",
                names.join(", ")
            ))
        })
    }
}
