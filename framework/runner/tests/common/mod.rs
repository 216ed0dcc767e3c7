#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use url::Url;

use gust_runner::prelude::{EnvironmentName, FanOut, RunConfig};
use gust_runtime::prelude::{BuildSpec, EngineOutput, RunSpec};
use gust_runtime::ContainerRuntime;

/// What the stub engine does when it is run.
pub enum Behaviour {
    Exit { code: i32, output: Vec<String> },
    Hang,
}

/// Scriptable engine stand-in that records every runtime interaction.
pub struct StubEngine {
    pub behaviour: Behaviour,
    pub fail_builds: bool,
    pub builds: Mutex<Vec<BuildSpec>>,
    pub runs: Mutex<Vec<RunSpec>>,
    pub stops: Mutex<Vec<String>>,
    /// When set, a run waits for a permit before exiting.
    pub run_gate: Option<Arc<Semaphore>>,
}

impl StubEngine {
    fn with_behaviour(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            fail_builds: false,
            builds: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
            stops: Mutex::new(Vec::new()),
            run_gate: None,
        }
    }

    pub fn succeeding() -> Self {
        Self::with_behaviour(Behaviour::Exit {
            code: 0,
            output: vec!["checks.........: 100.00%".to_string()],
        })
    }

    pub fn failing(code: i32, output: &[&str]) -> Self {
        Self::with_behaviour(Behaviour::Exit {
            code,
            output: output.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn hanging() -> Self {
        Self::with_behaviour(Behaviour::Hang)
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        let mut stub = Self::succeeding();
        stub.run_gate = Some(gate);
        stub
    }

    pub fn with_failing_builds(mut self) -> Self {
        self.fail_builds = true;
        self
    }

    pub fn recorded_runs(&self) -> Vec<RunSpec> {
        self.runs.lock().expect("runs lock poisoned").clone()
    }

    pub fn recorded_builds(&self) -> Vec<BuildSpec> {
        self.builds.lock().expect("builds lock poisoned").clone()
    }

    pub fn recorded_stops(&self) -> Vec<String> {
        self.stops.lock().expect("stops lock poisoned").clone()
    }
}

#[async_trait]
impl ContainerRuntime for StubEngine {
    async fn build(&self, spec: &BuildSpec) -> anyhow::Result<()> {
        self.builds
            .lock()
            .expect("builds lock poisoned")
            .push(spec.clone());
        if self.fail_builds {
            anyhow::bail!("simulated toolchain failure");
        }
        Ok(())
    }

    async fn run(&self, spec: &RunSpec) -> anyhow::Result<EngineOutput> {
        self.runs
            .lock()
            .expect("runs lock poisoned")
            .push(spec.clone());

        if let Some(gate) = &self.run_gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        match &self.behaviour {
            Behaviour::Exit { code, output } => Ok(EngineOutput {
                exit_code: *code,
                output_tail: output.clone(),
            }),
            Behaviour::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn stop(&self, name: &str) -> anyhow::Result<()> {
        self.stops
            .lock()
            .expect("stops lock poisoned")
            .push(name.to_string());
        Ok(())
    }
}

/// Write a minimal compiled test script into a scratch directory.
///
/// The returned [tempfile::TempDir] must stay alive for as long as the
/// script is used.
pub fn write_script() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("failed to create scratch dir");
    let path = dir.path().join("test.js");
    std::fs::write(&path, "export default function () {}\n").expect("failed to write script");
    (dir, path)
}

/// A stdout-only run config pointing at the given script.
pub fn stdout_config(script: PathBuf) -> RunConfig {
    RunConfig {
        target_url: Url::parse("http://test-app:3000").expect("valid URL"),
        vus: 5,
        duration: Duration::from_secs(30),
        environment: EnvironmentName::NonProd,
        fan_out: FanOut::StdoutOnly,
        script,
    }
}
