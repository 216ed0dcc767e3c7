use std::collections::HashMap;

use gust_core::prelude::OrchestratorError;

/// Supplies credential values by (namespace, path, field).
///
/// The orchestrator never talks to a vault itself; the external secret
/// provider is expected to have delivered values before the run starts.
/// Implementations fail with [OrchestratorError::CredentialMissing] when a
/// field has no value.
pub trait SecretProvider: Send + Sync {
    fn fetch(&self, namespace: &str, path: &str, field: &str)
        -> Result<String, OrchestratorError>;
}

/// Reads credentials the external provider injected into the process
/// environment.
///
/// A request for `("secret", "loadtest/search", "password")` reads
/// `SECRET_LOADTEST_SEARCH_PASSWORD`: the three parts are joined with
/// underscores, uppercased, and every non-alphanumeric character is folded
/// to an underscore. An empty value counts as missing.
pub struct EnvSecretProvider;

impl EnvSecretProvider {
    fn var_name(namespace: &str, path: &str, field: &str) -> String {
        [namespace, path, field]
            .join("_")
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl SecretProvider for EnvSecretProvider {
    fn fetch(
        &self,
        namespace: &str,
        path: &str,
        field: &str,
    ) -> Result<String, OrchestratorError> {
        let key = Self::var_name(namespace, path, field);
        match std::env::var(&key) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(OrchestratorError::credential_missing(format!(
                "{namespace}/{path}#{field}"
            ))),
        }
    }
}

/// Fixed in-memory credentials, for tests and fully offline runs.
#[derive(Debug, Default, Clone)]
pub struct StaticSecretProvider {
    values: HashMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        namespace: &str,
        path: &str,
        field: &str,
        value: impl Into<String>,
    ) -> Self {
        self.values
            .insert(Self::key(namespace, path, field), value.into());
        self
    }

    fn key(namespace: &str, path: &str, field: &str) -> String {
        format!("{namespace}/{path}#{field}")
    }
}

impl SecretProvider for StaticSecretProvider {
    fn fetch(
        &self,
        namespace: &str,
        path: &str,
        field: &str,
    ) -> Result<String, OrchestratorError> {
        self.values
            .get(&Self::key(namespace, path, field))
            .cloned()
            .ok_or_else(|| {
                OrchestratorError::credential_missing(format!("{namespace}/{path}#{field}"))
            })
    }
}
