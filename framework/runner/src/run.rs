use std::sync::Arc;

use anyhow::Context;

use gust_core::prelude::{CancelHandle, CancelListener, OrchestratorError};
use gust_runtime::prelude::DockerCli;
use gust_runtime::ContainerRuntime;
use image_builder::EnvironmentBuilder;

use crate::cli::GustRunCli;
use crate::executor::{RunExecutor, RunResult};
use crate::guard::{TargetGuard, TargetKey};
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::report;
use crate::resolver::{Defaults, Overrides, Resolver, RunConfig};
use crate::secrets::{EnvSecretProvider, SecretProvider};
use crate::types::GustResult;

/// Wires the resolver, environment builder, target guard and executor into
/// one pipeline. Construction injects the immutable defaults and the
/// container runtime; everything else arrives per run.
pub struct Orchestrator {
    resolver: Resolver,
    builder: EnvironmentBuilder,
    executor: RunExecutor,
    guard: TargetGuard,
}

impl Orchestrator {
    pub fn new(defaults: Defaults, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            resolver: Resolver::new(defaults),
            builder: EnvironmentBuilder::new(runtime.clone()),
            executor: RunExecutor::new(runtime),
            guard: TargetGuard::new(),
        }
    }

    /// Mainly for tests that need a short hang bound.
    pub fn with_timeout_grace(mut self, grace: std::time::Duration) -> Self {
        self.executor = self.executor.with_timeout_grace(grace);
        self
    }

    /// Resolve one run's configuration. Pure; performs no build or run step.
    pub fn resolve(
        &self,
        overrides: &Overrides,
        secrets: &dyn SecretProvider,
    ) -> Result<RunConfig, OrchestratorError> {
        self.resolver.resolve(overrides, secrets)
    }

    /// Take the target slot, make sure the engine image exists and execute
    /// the run.
    ///
    /// If another run is in flight for the same (target, environment) pair
    /// this waits until it reaches a terminal state. Cancellation during the
    /// wait or the build aborts before anything runs, and an interrupted
    /// build publishes nothing to the image cache.
    pub async fn launch(
        &self,
        config: &RunConfig,
        mut cancel: CancelListener,
    ) -> Result<RunResult, OrchestratorError> {
        let key = TargetKey::new(&config.target_url, config.environment);
        let permit = tokio::select! {
            permit = self.guard.acquire(key) => permit,
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
        };

        let plugin_set = config.plugin_set();
        let image = tokio::select! {
            image = self.builder.build_if_absent(&plugin_set) => {
                image.map_err(|e| OrchestratorError::BuildFailed {
                    detail: format!("{e:#}"),
                })?
            }
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
        };

        let result = self.executor.execute(config, &image, cancel).await;
        drop(permit);

        Ok(result)
    }
}

/// Run one load test end-to-end from parsed CLI arguments.
///
/// This is the whole `run` operation: resolve the configuration, build or
/// reuse the engine image, execute the run, and print a summary. The
/// returned [RunResult] carries the exit code for the external trigger.
pub fn run(cli: GustRunCli) -> GustResult<RunResult> {
    let defaults = match &cli.config {
        Some(path) => Defaults::from_toml_file(path)?,
        None => Defaults::baseline(),
    };
    let overrides = cli.overrides()?;
    let secrets = EnvSecretProvider;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let cancel_handle = start_cancel_on_ctrl_c(&runtime);

    let docker = DockerCli::discover()?;
    let orchestrator = Orchestrator::new(defaults, Arc::new(docker));

    let config = orchestrator.resolve(&overrides, &secrets)?;
    log::info!(
        "Resolved run against {target} ({environment}): {vus} VUs for {secs}s, sinks: {sinks}",
        target = config.target_url,
        environment = config.environment,
        vus = config.vus,
        secs = config.duration.as_secs(),
        sinks = config.fan_out.output_selector()
    );

    if !cli.no_progress {
        start_progress(config.duration, cancel_handle.listener());
    }
    start_monitor(cancel_handle.listener());

    let result = runtime.block_on(orchestrator.launch(&config, cancel_handle.listener()))?;

    // The run is over; wind down the progress and monitor threads.
    cancel_handle.cancel();

    report::print_summary(&config, &result);

    Ok(result)
}

fn start_cancel_on_ctrl_c(runtime: &tokio::runtime::Runtime) -> CancelHandle {
    let handle = CancelHandle::new();

    let signal_handle = handle.clone();
    runtime.spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        println!("Received cancellation signal, tearing down...");
        signal_handle.cancel();
    });

    handle
}
