use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use url::Url;

use crate::resolver::{EnvironmentName, Overrides};

/// Command line surface for a single load-test run.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
pub struct GustRunCli {
    /// Base URL of the service to put under load
    #[clap(short, long)]
    pub target_url: Option<String>,

    /// The number of virtual users to run
    #[clap(long)]
    pub vus: Option<u32>,

    /// How long to run the test for, e.g. `30s`, `5m` or `2h`
    #[clap(long)]
    pub duration: Option<String>,

    /// The environment the target service runs in
    #[clap(long, value_enum)]
    pub environment: Option<EnvironmentName>,

    /// Enable every declared telemetry sink instead of stdout only
    #[clap(long, default_value = "false")]
    pub multi_sink: bool,

    /// Path to the compiled test script the engine runs
    #[clap(long)]
    pub script: Option<PathBuf>,

    /// Path to a TOML file supplying baseline defaults
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't
    /// being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,
}

impl GustRunCli {
    /// Convert the parsed flags into resolver overrides.
    pub fn overrides(&self) -> anyhow::Result<Overrides> {
        let target_url = self
            .target_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("Invalid --target-url")?;

        Ok(Overrides {
            target_url,
            vus: self.vus,
            duration: self.duration.clone(),
            environment: self.environment,
            // The flag can only switch multi-sink on; leaving it off defers
            // to the injected defaults.
            multi_sink: self.multi_sink.then_some(true),
            script: self.script.clone(),
        })
    }
}
