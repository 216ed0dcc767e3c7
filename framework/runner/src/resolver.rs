use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use gust_core::prelude::OrchestratorError;
use image_builder::PluginSet;

use crate::secrets::SecretProvider;
use crate::sink::{FanOut, SinkAuth, SinkConfig};
use crate::types::GustResult;

/// The environment class of the target service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentName {
    NonProd,
    Prod,
}

impl fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentName::NonProd => write!(f, "non-prod"),
            EnvironmentName::Prod => write!(f, "prod"),
        }
    }
}

impl FromStr for EnvironmentName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "non-prod" => Ok(EnvironmentName::NonProd),
            "prod" => Ok(EnvironmentName::Prod),
            other => Err(format!("unknown environment name `{other}`")),
        }
    }
}

/// Where in the secret store a group of credential fields lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecretCoordinates {
    pub namespace: String,
    pub path: String,
}

/// The telemetry destinations a run may fan out to.
///
/// Declared here; enabled only by the run-level fan-out decision.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeclaredSinks {
    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: Url,
    #[serde(default = "default_search_index")]
    pub search_index: String,
    #[serde(default = "default_remote_write_endpoint")]
    pub remote_write_endpoint: Url,
    /// Where the search sink's `username` and `password` fields live.
    #[serde(default = "default_search_credentials")]
    pub search_credentials: SecretCoordinates,
}

impl Default for DeclaredSinks {
    fn default() -> Self {
        Self {
            search_endpoint: default_search_endpoint(),
            search_index: default_search_index(),
            remote_write_endpoint: default_remote_write_endpoint(),
            search_credentials: default_search_credentials(),
        }
    }
}

fn default_search_endpoint() -> Url {
    Url::parse("http://elasticsearch:9200").expect("valid baseline URL")
}

fn default_search_index() -> String {
    "k6-index".to_string()
}

fn default_remote_write_endpoint() -> Url {
    Url::parse("http://prometheus:9090/api/v1/write").expect("valid baseline URL")
}

fn default_search_credentials() -> SecretCoordinates {
    SecretCoordinates {
        namespace: "secret".to_string(),
        path: "loadtest/search".to_string(),
    }
}

fn default_vus() -> u32 {
    5
}

fn default_duration() -> String {
    "30s".to_string()
}

fn default_script() -> PathBuf {
    PathBuf::from("dist/test.js")
}

fn default_parameter_secrets() -> SecretCoordinates {
    SecretCoordinates {
        namespace: "secret".to_string(),
        path: "loadtest/run".to_string(),
    }
}

/// Baseline run parameters, injected into the resolver at construction.
///
/// This is an explicit immutable value, never read from ambient process
/// state. Load it from a TOML file or start from [Defaults::baseline].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub target_url: Option<Url>,
    #[serde(default = "default_vus")]
    pub vus: u32,
    #[serde(default = "default_duration")]
    pub duration: String,
    #[serde(default)]
    pub environment: Option<EnvironmentName>,
    #[serde(default)]
    pub multi_sink: bool,
    #[serde(default = "default_script")]
    pub script: PathBuf,
    #[serde(default)]
    pub sinks: DeclaredSinks,
    /// Where run parameters the secret store may supply live.
    #[serde(default = "default_parameter_secrets")]
    pub parameter_secrets: SecretCoordinates,
}

impl Defaults {
    /// The hard-coded baseline. Target URL and environment are deliberately
    /// unset so a run cannot silently point at anything.
    pub fn baseline() -> Self {
        Self {
            target_url: None,
            vus: default_vus(),
            duration: default_duration(),
            environment: None,
            multi_sink: false,
            script: default_script(),
            sinks: DeclaredSinks::default(),
            parameter_secrets: default_parameter_secrets(),
        }
    }

    pub fn from_toml_file(path: &Path) -> GustResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read defaults file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse defaults file {}", path.display()))
    }
}

/// Caller-supplied partial parameters, assembled from the external trigger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub target_url: Option<Url>,
    pub vus: Option<u32>,
    pub duration: Option<String>,
    pub environment: Option<EnvironmentName>,
    pub multi_sink: Option<bool>,
    pub script: Option<PathBuf>,
}

/// The fully merged, immutable configuration for one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub target_url: Url,
    pub vus: u32,
    pub duration: Duration,
    pub environment: EnvironmentName,
    pub fan_out: FanOut,
    pub script: PathBuf,
}

impl RunConfig {
    /// The plugins the engine image must carry for this run's sinks.
    pub fn plugin_set(&self) -> PluginSet {
        self.fan_out
            .active_sinks()
            .iter()
            .filter_map(|sink| sink.kind.plugin())
            .collect()
    }
}

/// Merges defaults, caller overrides and secret-provided values into one
/// [RunConfig].
pub struct Resolver {
    defaults: Defaults,
}

impl Resolver {
    pub fn new(defaults: Defaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Resolve one run's configuration.
    ///
    /// Merge precedence is override > secret > default, field by field. Pure
    /// over its inputs: no clock, randomness or filesystem access, so the
    /// same inputs always produce the same config.
    pub fn resolve(
        &self,
        overrides: &Overrides,
        secrets: &dyn SecretProvider,
    ) -> Result<RunConfig, OrchestratorError> {
        let d = &self.defaults;
        let params = &d.parameter_secrets;
        let secret_param =
            |field: &str| secrets.fetch(&params.namespace, &params.path, field).ok();

        let target_url = match (&overrides.target_url, secret_param("target-url")) {
            (Some(url), _) => url.clone(),
            (None, Some(raw)) => Url::parse(&raw).map_err(|e| {
                OrchestratorError::config_incomplete(
                    "target_url",
                    format!("from the secret store is not a valid URL: {e}"),
                )
            })?,
            (None, None) => d.target_url.clone().ok_or_else(|| {
                OrchestratorError::config_incomplete(
                    "target_url",
                    "is not set in overrides, secrets or defaults",
                )
            })?,
        };

        let environment = match (overrides.environment, secret_param("environment")) {
            (Some(environment), _) => environment,
            (None, Some(raw)) => raw.parse().map_err(|e| {
                OrchestratorError::config_incomplete("environment", format!("{e}"))
            })?,
            (None, None) => d.environment.ok_or_else(|| {
                OrchestratorError::config_incomplete(
                    "environment",
                    "is not set in overrides, secrets or defaults",
                )
            })?,
        };

        let vus = match (overrides.vus, secret_param("vus")) {
            (Some(vus), _) => vus,
            (None, Some(raw)) => raw.parse().map_err(|_| {
                OrchestratorError::config_incomplete(
                    "vus",
                    format!("from the secret store is not an integer: `{raw}`"),
                )
            })?,
            (None, None) => d.vus,
        };
        if vus == 0 {
            return Err(OrchestratorError::config_incomplete(
                "vus",
                "must be a positive integer",
            ));
        }

        let duration_raw = overrides
            .duration
            .clone()
            .or_else(|| secret_param("duration"))
            .unwrap_or_else(|| d.duration.clone());
        let duration = parse_duration(&duration_raw)?;

        let multi_sink = match (overrides.multi_sink, secret_param("multi-sink")) {
            (Some(multi_sink), _) => multi_sink,
            (None, Some(raw)) => raw.parse().map_err(|_| {
                OrchestratorError::config_incomplete(
                    "multi_sink",
                    format!("from the secret store is not a boolean: `{raw}`"),
                )
            })?,
            (None, None) => d.multi_sink,
        };

        // The fan-out decision: all declared sinks or stdout only, decided
        // exactly once from configuration.
        let fan_out = if multi_sink {
            let creds = &d.sinks.search_credentials;
            let auth = SinkAuth {
                username: secrets.fetch(&creds.namespace, &creds.path, "username")?,
                password: secrets.fetch(&creds.namespace, &creds.path, "password")?,
            };
            FanOut::MultiSink(vec![
                SinkConfig::search_index(
                    d.sinks.search_endpoint.clone(),
                    d.sinks.search_index.clone(),
                    auth,
                ),
                SinkConfig::remote_write(d.sinks.remote_write_endpoint.clone()),
            ])
        } else {
            FanOut::StdoutOnly
        };

        let script = overrides.script.clone().unwrap_or_else(|| d.script.clone());

        Ok(RunConfig {
            target_url,
            vus,
            duration,
            environment,
            fan_out,
            script,
        })
    }
}

/// Parse a `30s` / `5m` / `2h` style duration. A bare integer is seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, OrchestratorError> {
    let raw = raw.trim();
    let invalid = || {
        OrchestratorError::config_incomplete(
            "duration",
            format!("`{raw}` is not a duration like `30s`, `5m` or `2h`"),
        )
    };

    let (digits, multiplier) = match raw.chars().last() {
        Some('s') => (&raw[..raw.len() - 1], 1),
        Some('m') => (&raw[..raw.len() - 1], 60),
        Some('h') => (&raw[..raw.len() - 1], 3600),
        Some(c) if c.is_ascii_digit() => (raw, 1),
        _ => return Err(invalid()),
    };

    let count: u64 = digits.parse().map_err(|_| invalid())?;
    if count == 0 {
        return Err(OrchestratorError::config_incomplete(
            "duration",
            "must be positive",
        ));
    }

    Ok(Duration::from_secs(count * multiplier))
}
