//! CPU architectures.

/// CPU architecture of a build host or a target.
///
/// Desktop hosts are either `x86_64` or `arm64`. The embedded Linux targets
/// distinguish the ARM revision they were built for. Mobile targets carry no
/// architecture at all (their libraries are produced as fat binaries), which
/// is modelled as `Option<Arch>::None` on the platform descriptor.
///
/// # Example
///
/// ```
/// use sdkbuild_schema::Arch;
///
/// let arch: Arch = "aarch64".parse().unwrap();
/// assert_eq!(arch, Arch::Arm64);
/// assert_eq!(arch.to_string(), "arm64");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit Intel/AMD.
    #[serde(rename = "x86_64")]
    X86_64,
    /// 64-bit ARM desktop/server hardware (Apple Silicon, Graviton, ...).
    Arm64,
    /// ARMv6 (Raspberry Pi Zero / 1).
    Armv6,
    /// ARMv7 (32-bit Raspberry Pi OS).
    Armv7,
    /// ARMv8 as used by the embedded boards (Raspberry Pi 64-bit, Jetson).
    Armv8,
}

impl Arch {
    /// Architecture of the machine this binary was compiled for.
    ///
    /// Returns `None` on hosts the pipeline cannot build on.
    pub fn host() -> Option<Self> {
        match std::env::consts::ARCH {
            "x86_64" => Some(Self::X86_64),
            "aarch64" => Some(Self::Arm64),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
            Self::Armv6 => "armv6",
            Self::Armv7 => "armv7",
            Self::Armv8 => "armv8",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" => Ok(Self::X86_64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "armv6" => Ok(Self::Armv6),
            "armv7" => Ok(Self::Armv7),
            "armv8" => Ok(Self::Armv8),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("AMD64".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert_eq!("armv8".parse::<Arch>().unwrap(), Arch::Armv8);
        assert!("mips".parse::<Arch>().is_err());
    }

    #[test]
    fn test_display_matches_package_names() {
        assert_eq!(Arch::X86_64.to_string(), "x86_64");
        assert_eq!(Arch::Armv7.to_string(), "armv7");
    }
}
