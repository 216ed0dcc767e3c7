mod docker;
mod spec;

use async_trait::async_trait;

use crate::spec::{BuildSpec, EngineOutput, RunSpec};

/// The capabilities the orchestrator needs from a container runtime.
///
/// The production implementation is [docker::DockerCli]. Tests inject stubs
/// through this trait so the executor and image builder can be exercised
/// without a container runtime on the host.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Build an image from the spec and publish it under the spec's tag.
    async fn build(&self, spec: &BuildSpec) -> anyhow::Result<()>;

    /// Run a container to completion and return the engine's exit status and
    /// captured output tail.
    async fn run(&self, spec: &RunSpec) -> anyhow::Result<EngineOutput>;

    /// Stop and remove a container by name. Stopping a container that has
    /// already exited is not an error.
    async fn stop(&self, name: &str) -> anyhow::Result<()>;
}

pub mod prelude {
    pub use crate::docker::{DockerCli, GUST_DOCKER_PATH_ENV};
    pub use crate::spec::{BuildSpec, EngineOutput, ImageRef, Mount, NetworkMode, RunSpec};
    pub use crate::ContainerRuntime;
}
