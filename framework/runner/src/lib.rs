mod cli;
mod executor;
mod guard;
mod init;
mod monitor;
mod progress;
mod report;
mod resolver;
mod run;
mod secrets;
mod sink;
mod types;

pub mod prelude {
    pub use crate::cli::GustRunCli;
    pub use crate::executor::{RunExecutor, RunOutcome, RunResult, RunState, DEFAULT_TIMEOUT_GRACE};
    pub use crate::guard::{TargetGuard, TargetKey, TargetPermit};
    pub use crate::init::init;
    pub use crate::resolver::{
        Defaults, DeclaredSinks, EnvironmentName, Overrides, Resolver, RunConfig,
        SecretCoordinates,
    };
    pub use crate::run::{run, Orchestrator};
    pub use crate::secrets::{EnvSecretProvider, SecretProvider, StaticSecretProvider};
    pub use crate::sink::{FanOut, SinkAuth, SinkConfig, SinkKind};
    pub use crate::types::GustResult;

    pub use gust_core::prelude::{CancelHandle, CancelListener, OrchestratorError};
}
