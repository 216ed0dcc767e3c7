use std::collections::VecDeque;
use std::env;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::spec::{BuildSpec, EngineOutput, Mount, NetworkMode, RunSpec};
use crate::ContainerRuntime;

/// Environment variable to override the path to the `docker` binary.
pub const GUST_DOCKER_PATH_ENV: &str = "GUST_DOCKER_PATH";

/// Number of output lines kept as the captured tail of a build or run.
const OUTPUT_TAIL_LINES: usize = 40;

/// The production [ContainerRuntime], shelling out to the Docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: PathBuf,
}

impl DockerCli {
    /// Locate the `docker` binary.
    ///
    /// If the [`GUST_DOCKER_PATH_ENV`] environment variable is set, its value
    /// is used as the path to the binary. Otherwise the user's `PATH` is
    /// searched.
    pub fn discover() -> anyhow::Result<Self> {
        match env::var(GUST_DOCKER_PATH_ENV).ok().as_deref() {
            Some("") => {
                bail!("'{GUST_DOCKER_PATH_ENV}' set to empty string");
            }
            Some(path) => {
                let bin = PathBuf::from(path);
                if !bin.exists() {
                    bail!(
                        "Path to docker binary overridden with '{GUST_DOCKER_PATH_ENV}={path}' but that path doesn't exist",
                        path = bin.display()
                    );
                }
                Ok(Self { bin })
            }
            None => {
                let bin = which::which("docker").context(
                    "Docker binary not found in PATH. Please install Docker or set \
                     'GUST_DOCKER_PATH' to the correct path.",
                )?;
                Ok(Self { bin })
            }
        }
    }

    pub fn with_binary(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn build(&self, spec: &BuildSpec) -> anyhow::Result<()> {
        log::info!("Building image {}", spec.tag);

        let mut child = Command::new(&self.bin)
            .args(build_args(spec))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to run `docker build`")?;

        let mut stdin = child
            .stdin
            .take()
            .context("Failed to get stdin for `docker build`")?;
        stdin
            .write_all(spec.dockerfile.as_bytes())
            .await
            .context("Failed to stream Dockerfile to `docker build`")?;
        // The build does not start until stdin is closed.
        drop(stdin);

        let stdout = child
            .stdout
            .take()
            .context("Failed to get stdout for `docker build`")?;
        let stderr = child
            .stderr
            .take()
            .context("Failed to get stderr for `docker build`")?;

        let (mut tail, stderr_tail) = tokio::join!(
            collect_lines(stdout, |line| log::debug!(target: "docker_build", "{line}")),
            collect_lines(stderr, |line| log::debug!(target: "docker_build", "{line}")),
        );
        tail.extend(stderr_tail);
        let tail = truncate_tail(tail);

        let status = child
            .wait()
            .await
            .context("Failed to wait for `docker build`")?;
        if !status.success() {
            bail!(
                "`docker build` for {tag} failed with {status}:\n{tail}",
                tag = spec.tag,
                tail = tail.join("\n")
            );
        }

        log::info!("Built image {}", spec.tag);
        Ok(())
    }

    async fn run(&self, spec: &RunSpec) -> anyhow::Result<EngineOutput> {
        log::info!(
            "Running container {name} from image {image}",
            name = spec.name,
            image = spec.image
        );

        let mut child = Command::new(&self.bin)
            .args(run_args(spec))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to run `docker run`")?;

        let stdout = child
            .stdout
            .take()
            .context("Failed to get stdout for the engine container")?;
        let stderr = child
            .stderr
            .take()
            .context("Failed to get stderr for the engine container")?;

        // The engine's stdout is user-facing output (it is the stdout sink),
        // so it is passed through rather than hidden behind a log level.
        let (mut tail, stderr_tail) = tokio::join!(
            collect_lines(stdout, |line| println!("{line}")),
            collect_lines(stderr, |line| log::warn!(target: "engine", "{line}")),
        );
        tail.extend(stderr_tail);
        let output_tail = truncate_tail(tail);

        let status = child
            .wait()
            .await
            .context("Failed to wait for the engine container")?;

        Ok(EngineOutput {
            // A termination by signal has no exit code; report it out of the
            // conventional range so it is never mistaken for an engine code.
            exit_code: status.code().unwrap_or(-1),
            output_tail,
        })
    }

    async fn stop(&self, name: &str) -> anyhow::Result<()> {
        log::debug!("Stopping container {name}");

        let output = Command::new(&self.bin)
            .args(["rm", "--force", name])
            .output()
            .await
            .context("Failed to run `docker rm`")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // The container auto-removes on exit, so it is usually gone by
            // the time teardown runs.
            if stderr.contains("No such container") {
                return Ok(());
            }
            bail!("`docker rm --force {name}` failed: {}", stderr.trim());
        }

        Ok(())
    }
}

fn build_args(spec: &BuildSpec) -> Vec<String> {
    vec![
        "build".to_string(),
        "--tag".to_string(),
        spec.tag.as_str().to_string(),
        // Read the Dockerfile from stdin; the engine image needs no build
        // context because everything is fetched inside the builder stage.
        "-".to_string(),
    ]
}

fn run_args(spec: &RunSpec) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--name".to_string(), spec.name.clone()];

    if spec.auto_remove {
        args.push("--rm".to_string());
    }

    if spec.network == NetworkMode::HostGatewayAlias {
        args.push("--add-host=host.docker.internal:host-gateway".to_string());
    }

    for Mount {
        source,
        target,
        read_only,
    } in &spec.mounts
    {
        args.push("--volume".to_string());
        let mode = if *read_only { ":ro" } else { "" };
        args.push(format!("{}:{}{}", source.display(), target, mode));
    }

    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{key}={value}"));
    }

    args.push(spec.image.as_str().to_string());
    args.extend(spec.args.iter().cloned());

    args
}

async fn collect_lines<R>(reader: R, mut sink: impl FnMut(&str)) -> VecDeque<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        sink(&line);
        if tail.len() == OUTPUT_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail
}

fn truncate_tail(tail: VecDeque<String>) -> Vec<String> {
    let mut tail: Vec<String> = tail.into();
    if tail.len() > OUTPUT_TAIL_LINES {
        tail.drain(..tail.len() - OUTPUT_TAIL_LINES);
    }
    tail
}
