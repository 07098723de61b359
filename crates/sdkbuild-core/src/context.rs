//! Shared build context.
//!
//! Groups the state every installation step needs: the validated platform
//! pair, the directory layout, the declared versions and the tool
//! environment.

use sdkbuild_schema::{PlatformDescriptor, PlatformPair, VersionMap};

use crate::paths::InstallLayout;
use crate::steps::webrtc::{WebrtcInfo, WebrtcSource};
use crate::tools::ToolEnv;

#[derive(Debug)]
pub struct Context {
    pub pair: PlatformPair,
    pub layout: InstallLayout,
    /// Declarations from the project's `VERSION` file.
    pub versions: VersionMap,
    pub env: ToolEnv,
    pub debug: bool,
    pub webrtc: WebrtcSource,
}

impl Context {
    pub fn new(
        pair: PlatformPair,
        layout: InstallLayout,
        versions: VersionMap,
        debug: bool,
        webrtc: WebrtcSource,
    ) -> Self {
        Self {
            pair,
            layout,
            versions,
            env: ToolEnv::new(),
            debug,
            webrtc,
        }
    }

    pub fn build(&self) -> &PlatformDescriptor {
        self.pair.build()
    }

    pub fn target(&self) -> &PlatformDescriptor {
        self.pair.target()
    }

    /// Where the media engine's headers, libraries and toolchain live.
    pub fn webrtc_info(&self) -> WebrtcInfo {
        WebrtcInfo::new(&self.webrtc, &self.layout)
    }
}

/// Parallelism passed to `make -j` / `cmake --build -j`.
pub fn jobs_flag() -> String {
    format!("-j{}", num_cpus::get())
}
