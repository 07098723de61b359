pub mod context;
pub mod error;
pub mod gate;
pub mod git;
pub mod host;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod sdk;
pub mod steps;
pub mod tools;

pub use context::Context;
pub use error::DepsError;
pub use gate::{FileMarker, Marker, VersionGate};
pub use paths::InstallLayout;
pub use pipeline::{Dependency, DependencyPipeline, StepOutcome, plan};
pub use steps::webrtc::{WebrtcBuildConfig, WebrtcSource};
pub use tools::{ToolEnv, ToolError};
