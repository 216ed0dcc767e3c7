use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::OnceCell;

use gust_runtime::prelude::{BuildSpec, ImageRef};
use gust_runtime::ContainerRuntime;

use crate::dockerfile;
use crate::fingerprint::Fingerprint;
use crate::plugins::PluginSet;

/// Repository part of every engine image reference.
pub const IMAGE_REPOSITORY: &str = "gust-engine";

/// Builds engine images and caches them by plugin-set fingerprint.
///
/// Building is idempotent: a second request for the same plugin set returns
/// the image built by the first, and concurrent requests for one fingerprint
/// serialize on the first builder and share its result. A failed build
/// publishes nothing, so a later request simply builds again.
pub struct EnvironmentBuilder {
    runtime: Arc<dyn ContainerRuntime>,
    built: parking_lot::Mutex<HashMap<Fingerprint, Arc<OnceCell<ImageRef>>>>,
}

impl EnvironmentBuilder {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            built: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Return the image for this plugin set, building it only if no prior
    /// build for the same fingerprint has succeeded.
    pub async fn build_if_absent(&self, plugins: &PluginSet) -> anyhow::Result<ImageRef> {
        let fingerprint = Fingerprint::of(plugins);
        let cell = self
            .built
            .lock()
            .entry(fingerprint)
            .or_default()
            .clone();

        cell.get_or_try_init(|| async {
            let image = ImageRef::new(format!("{IMAGE_REPOSITORY}:{}", fingerprint.short()));
            log::info!("Building engine image {image} (fingerprint {fingerprint})");

            let spec = BuildSpec {
                tag: image.clone(),
                dockerfile: dockerfile::render(plugins),
            };
            self.runtime
                .build(&spec)
                .await
                .with_context(|| format!("Failed to build engine image {image}"))?;

            Ok::<_, anyhow::Error>(image)
        })
        .await
        .cloned()
    }
}
