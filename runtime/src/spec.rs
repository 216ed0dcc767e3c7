use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Reference to a built engine image, e.g. `gust-engine:1a2b3c4d5e6f`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Input to [crate::ContainerRuntime::build].
///
/// The Dockerfile is carried as a string and streamed to the runtime, so no
/// build context directory is needed.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    pub tag: ImageRef,
    pub dockerfile: String,
}

/// How the run container is attached to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    /// The runtime's default network.
    Default,
    /// The default network plus a `host.docker.internal` alias for the host
    /// gateway, so the engine can reach services on the host.
    HostGatewayAlias,
}

/// A bind mount into the run container.
#[derive(Debug, Clone)]
pub struct Mount {
    pub source: PathBuf,
    pub target: String,
    pub read_only: bool,
}

/// Input to [crate::ContainerRuntime::run].
///
/// The env map is ordered so a spec renders identically on every run.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub image: ImageRef,
    pub name: String,
    pub env: BTreeMap<String, String>,
    pub mounts: Vec<Mount>,
    pub network: NetworkMode,
    pub auto_remove: bool,
    pub args: Vec<String>,
}

/// Exit status and captured output of one engine run.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub exit_code: i32,
    pub output_tail: Vec<String>,
}

impl EngineOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn tail(&self) -> String {
        self.output_tail.join("\n")
    }
}
