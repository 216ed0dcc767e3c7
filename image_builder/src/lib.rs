mod builder;
mod dockerfile;
mod fingerprint;
mod plugins;

pub use builder::{EnvironmentBuilder, IMAGE_REPOSITORY};
pub use fingerprint::Fingerprint;
pub use plugins::{PluginSet, SinkPlugin};
