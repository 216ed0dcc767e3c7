use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use gust_core::prelude::{CancelListener, OrchestratorError};
use gust_runtime::prelude::{ImageRef, Mount, NetworkMode, RunSpec};
use gust_runtime::ContainerRuntime;

use crate::resolver::RunConfig;

/// Lifecycle states of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum RunState {
    #[display("pending")]
    Pending,
    #[display("environment-ready")]
    EnvironmentReady,
    #[display("running")]
    Running,
    #[display("completed")]
    Completed,
    #[display("failed")]
    Failed,
    #[display("cancelled")]
    Cancelled,
    #[display("torn-down")]
    TornDown,
}

/// How a finished run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Success,
    Failed(OrchestratorError),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    pub fn error(&self) -> Option<&OrchestratorError> {
        match self {
            RunOutcome::Success => None,
            RunOutcome::Failed(err) => Some(err),
        }
    }

    /// Process exit code reported to the external trigger.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::Failed(err) => err.exit_code(),
        }
    }
}

/// Produced once per run and handed back to the external trigger.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_observed: Duration,
    pub outcome: RunOutcome,
}

/// Grace on top of the configured duration before a hung engine is killed.
///
/// The engine bounds its own test duration; this limit is a backstop against
/// a hang, not the primary clock, so it leaves the engine time for its own
/// shutdown and summary output.
pub const DEFAULT_TIMEOUT_GRACE: Duration = Duration::from_secs(30);

/// Runs the engine inside an isolated container and reports its outcome.
pub struct RunExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    timeout_grace: Duration,
}

impl RunExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            timeout_grace: DEFAULT_TIMEOUT_GRACE,
        }
    }

    /// Mainly for tests that need a short hang bound.
    pub fn with_timeout_grace(mut self, grace: Duration) -> Self {
        self.timeout_grace = grace;
        self
    }

    /// Run the engine to completion.
    ///
    /// Blocks until the engine exits, the run time limit passes or
    /// cancellation is signalled. Never retries: a load test has side
    /// effects on the target, so a failed run is reported verbatim instead
    /// of rerun. The isolated environment is torn down on every path.
    pub async fn execute(
        &self,
        config: &RunConfig,
        image: &ImageRef,
        cancel: CancelListener,
    ) -> RunResult {
        let run_id = format!("gust-run-{}", nanoid::nanoid!(10));
        let started_at = Utc::now();
        let started = Instant::now();
        let mut state = RunState::Pending;

        let outcome = self
            .run_to_completion(config, image, &run_id, &mut state, cancel)
            .await;

        let terminal = match &outcome {
            RunOutcome::Success => RunState::Completed,
            RunOutcome::Failed(OrchestratorError::Cancelled) => RunState::Cancelled,
            RunOutcome::Failed(_) => RunState::Failed,
        };
        transition(&run_id, &mut state, terminal);
        transition(&run_id, &mut state, RunState::TornDown);

        match outcome.error() {
            None => log::info!("Run {run_id} completed successfully"),
            Some(err) => log::error!("Run {run_id} failed: {err}"),
        }

        RunResult {
            run_id,
            started_at,
            duration_observed: started.elapsed(),
            outcome,
        }
    }

    async fn run_to_completion(
        &self,
        config: &RunConfig,
        image: &ImageRef,
        run_id: &str,
        state: &mut RunState,
        mut cancel: CancelListener,
    ) -> RunOutcome {
        if cancel.is_cancelled() {
            return RunOutcome::Failed(OrchestratorError::Cancelled);
        }

        let spec = match run_spec(config, image, run_id) {
            Ok(spec) => spec,
            Err(err) => return RunOutcome::Failed(err),
        };
        transition(run_id, state, RunState::EnvironmentReady);

        transition(run_id, state, RunState::Running);
        log::info!(
            "Run {run_id}: engine started against {target} with {vus} VUs for {secs}s",
            target = config.target_url,
            vus = config.vus,
            secs = config.duration.as_secs()
        );

        let limit = config.duration + self.timeout_grace;
        let outcome = tokio::select! {
            result = self.runtime.run(&spec) => match result {
                Ok(output) if output.success() => RunOutcome::Success,
                Ok(output) => RunOutcome::Failed(OrchestratorError::EngineFailure {
                    code: output.exit_code,
                    detail: output.tail(),
                }),
                Err(err) => RunOutcome::Failed(OrchestratorError::EngineFailure {
                    code: -1,
                    detail: format!("failed to launch the engine: {err:#}"),
                }),
            },
            _ = tokio::time::sleep(limit) => {
                RunOutcome::Failed(OrchestratorError::RunTimeout {
                    limit_secs: limit.as_secs(),
                })
            }
            _ = cancel.cancelled() => RunOutcome::Failed(OrchestratorError::Cancelled),
        };

        // Teardown runs on every path. On a clean exit the container has
        // already removed itself and this is a no-op; after a timeout or
        // cancellation it kills the still-running engine.
        if let Err(err) = self.runtime.stop(run_id).await {
            log::warn!("Failed to tear down container {run_id}: {err:#}");
        }

        outcome
    }
}

fn transition(run_id: &str, state: &mut RunState, to: RunState) {
    log::debug!("Run {run_id}: {state} -> {to}");
    *state = to;
}

/// Assemble the container run spec: engine image, read-only script mount,
/// host-gateway network access and the full engine environment.
fn run_spec(
    config: &RunConfig,
    image: &ImageRef,
    run_id: &str,
) -> Result<RunSpec, OrchestratorError> {
    let script = &config.script;
    let file_name = script
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            OrchestratorError::config_incomplete(
                "script",
                format!("`{}` has no file name", script.display()),
            )
        })?
        .to_string();

    if !script.is_file() {
        return Err(OrchestratorError::config_incomplete(
            "script",
            format!("`{}` does not exist", script.display()),
        ));
    }

    let script_dir = match script.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let script_dir = script_dir.canonicalize().map_err(|e| {
        OrchestratorError::config_incomplete(
            "script",
            format!("cannot resolve `{}`: {e}", script_dir.display()),
        )
    })?;

    Ok(RunSpec {
        image: image.clone(),
        name: run_id.to_string(),
        env: engine_env(config, run_id),
        mounts: vec![Mount {
            source: script_dir,
            target: "/scripts".to_string(),
            read_only: true,
        }],
        network: NetworkMode::HostGatewayAlias,
        auto_remove: true,
        args: vec!["run".to_string(), format!("/scripts/{file_name}")],
    })
}

/// Serialize every run parameter into the engine's environment. This is the
/// only boundary where configuration becomes environment variables.
fn engine_env(config: &RunConfig, run_id: &str) -> BTreeMap<String, String> {
    let mut env = config.fan_out.engine_env();
    env.insert("BASE_URL".to_string(), config.target_url.to_string());
    env.insert("K6_VUS".to_string(), config.vus.to_string());
    env.insert(
        "K6_DURATION".to_string(),
        format!("{}s", config.duration.as_secs()),
    );
    env.insert(
        "GUST_ENVIRONMENT".to_string(),
        config.environment.to_string(),
    );
    env.insert("GUST_RUN_ID".to_string(), run_id.to_string());
    env
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::resolver::EnvironmentName;
    use crate::sink::{FanOut, SinkAuth, SinkConfig};

    fn stdout_config() -> RunConfig {
        RunConfig {
            target_url: Url::parse("http://test-app:3000").unwrap(),
            vus: 5,
            duration: Duration::from_secs(30),
            environment: EnvironmentName::NonProd,
            fan_out: FanOut::StdoutOnly,
            script: "dist/test.js".into(),
        }
    }

    #[test]
    fn engine_env_carries_every_run_parameter() {
        let env = engine_env(&stdout_config(), "gust-run-test");

        assert_eq!(env.get("BASE_URL").map(String::as_str), Some("http://test-app:3000/"));
        assert_eq!(env.get("K6_VUS").map(String::as_str), Some("5"));
        assert_eq!(env.get("K6_DURATION").map(String::as_str), Some("30s"));
        assert_eq!(env.get("K6_OUT").map(String::as_str), Some("stdout"));
        assert_eq!(
            env.get("GUST_ENVIRONMENT").map(String::as_str),
            Some("non-prod")
        );
        assert_eq!(
            env.get("GUST_RUN_ID").map(String::as_str),
            Some("gust-run-test")
        );
    }

    #[test]
    fn engine_env_includes_sink_endpoints_in_multi_sink_mode() {
        let mut config = stdout_config();
        config.fan_out = FanOut::MultiSink(vec![
            SinkConfig::search_index(
                Url::parse("http://elasticsearch:9200").unwrap(),
                "k6-index",
                SinkAuth {
                    username: "elastic".to_string(),
                    password: "secret".to_string(),
                },
            ),
            SinkConfig::remote_write(Url::parse("http://prometheus:9090/api/v1/write").unwrap()),
        ]);

        let env = engine_env(&config, "gust-run-test");
        assert_eq!(
            env.get("K6_OUT").map(String::as_str),
            Some("output-elasticsearch,xk6-prometheus-rw")
        );
        assert!(env.contains_key("K6_ELASTICSEARCH_URL"));
        assert!(env.contains_key("K6_PROMETHEUS_RW_SERVER_URL"));
    }

    #[test]
    fn run_spec_rejects_a_missing_script() {
        let mut config = stdout_config();
        config.script = "does/not/exist.js".into();

        let err = run_spec(&config, &ImageRef::new("gust-engine:abc"), "gust-run-test")
            .expect_err("expected missing script to be rejected");
        assert!(matches!(
            err,
            OrchestratorError::ConfigIncomplete { ref field, .. } if field == "script"
        ));
    }
}
