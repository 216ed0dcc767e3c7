use std::collections::BTreeSet;
use std::fmt;

/// An engine output plugin compiled into the image for one sink kind.
///
/// The stdout sink needs no plugin; a stock engine already has it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SinkPlugin {
    /// Bulk indexing into a search backend.
    SearchIndex,
    /// Prometheus remote-write to a time-series backend.
    RemoteWrite,
}

impl SinkPlugin {
    /// The module the engine build tool compiles in for this plugin.
    pub fn module(&self) -> &'static str {
        match self {
            SinkPlugin::SearchIndex => "github.com/elastic/xk6-output-elasticsearch",
            SinkPlugin::RemoteWrite => "github.com/grafana/xk6-output-prometheus-remote",
        }
    }
}

impl fmt::Display for SinkPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.module())
    }
}

/// A de-duplicated, canonically ordered set of plugins for one engine image.
///
/// The ordering makes the set's fingerprint independent of the order the
/// plugins were requested in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginSet(BTreeSet<SinkPlugin>);

impl PluginSet {
    pub fn new(plugins: impl IntoIterator<Item = SinkPlugin>) -> Self {
        Self(plugins.into_iter().collect())
    }

    /// The minimal image: the engine with no output plugins, enough for a
    /// stdout-only run.
    pub fn baseline() -> Self {
        Self::default()
    }

    pub fn plugins(&self) -> impl Iterator<Item = SinkPlugin> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<SinkPlugin> for PluginSet {
    fn from_iter<T: IntoIterator<Item = SinkPlugin>>(iter: T) -> Self {
        Self::new(iter)
    }
}
