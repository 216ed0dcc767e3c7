/// Terminal failure kinds for a single load-test run.
///
/// None of these are retried by the orchestrator: a load test has side
/// effects on the target system and rerunning it blindly would double-count
/// load and metrics. Each kind maps to a stable process exit code so the
/// external trigger can report a cause without parsing log output.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// A required configuration field was missing or invalid after merging
    /// defaults, secrets and overrides.
    #[display("incomplete configuration: field `{field}` {detail}")]
    ConfigIncomplete { field: String, detail: String },

    /// The secret provider returned no value for a credential the resolved
    /// mode requires.
    #[display("missing credential `{key}`")]
    CredentialMissing { key: String },

    /// The engine image could not be built. No partial image is published.
    #[display("engine image build failed: {detail}")]
    BuildFailed { detail: String },

    /// The engine exceeded the configured duration plus grace and was killed.
    #[display("engine exceeded the run time limit of {limit_secs}s")]
    RunTimeout { limit_secs: u64 },

    /// The engine exited non-zero. Reported verbatim, with the captured
    /// output tail.
    #[display("engine exited with code {code}: {detail}")]
    EngineFailure { code: i32, detail: String },

    /// An external cancellation signal ended the run.
    #[display("run cancelled by external signal")]
    Cancelled,
}

impl OrchestratorError {
    pub fn config_incomplete(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ConfigIncomplete {
            field: field.into(),
            detail: detail.into(),
        }
    }

    pub fn credential_missing(key: impl Into<String>) -> Self {
        Self::CredentialMissing { key: key.into() }
    }

    /// Process exit code reported to the external trigger.
    ///
    /// An engine failure propagates the engine's own exit code unchanged
    /// where it fits in the conventional range, and cancellation uses the
    /// 128+SIGINT convention.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigIncomplete { .. } => 2,
            Self::CredentialMissing { .. } => 3,
            Self::BuildFailed { .. } => 4,
            Self::RunTimeout { .. } => 5,
            Self::EngineFailure { code, .. } if (1..=125).contains(code) => *code,
            Self::EngineFailure { .. } => 6,
            Self::Cancelled => 130,
        }
    }
}
