use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use gust_runtime::prelude::{BuildSpec, EngineOutput, ImageRef, RunSpec};
use gust_runtime::ContainerRuntime;
use image_builder::{EnvironmentBuilder, Fingerprint, PluginSet, SinkPlugin};

/// Counts build invocations and can be made to fail or block on demand.
#[derive(Default)]
struct CountingRuntime {
    builds_started: AtomicUsize,
    builds_finished: AtomicUsize,
    fail_remaining: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl CountingRuntime {
    fn failing(count: usize) -> Self {
        Self {
            fail_remaining: AtomicUsize::new(count),
            ..Default::default()
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ContainerRuntime for CountingRuntime {
    async fn build(&self, _spec: &BuildSpec) -> anyhow::Result<()> {
        self.builds_started.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            anyhow::bail!("simulated toolchain failure");
        }

        self.builds_finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn run(&self, _spec: &RunSpec) -> anyhow::Result<EngineOutput> {
        unimplemented!("the builder never runs containers")
    }

    async fn stop(&self, _name: &str) -> anyhow::Result<()> {
        unimplemented!("the builder never stops containers")
    }
}

fn multi_sink_plugins() -> PluginSet {
    PluginSet::new([SinkPlugin::SearchIndex, SinkPlugin::RemoteWrite])
}

#[tokio::test]
async fn builds_once_for_identical_plugin_sets() {
    let runtime = Arc::new(CountingRuntime::default());
    let builder = EnvironmentBuilder::new(runtime.clone());

    let first = builder
        .build_if_absent(&multi_sink_plugins())
        .await
        .expect("first build failed");
    let second = builder
        .build_if_absent(&multi_sink_plugins())
        .await
        .expect("second build failed");

    assert_eq!(first, second);
    assert_eq!(runtime.builds_started.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn image_reference_is_content_addressed() {
    let runtime = Arc::new(CountingRuntime::default());
    let builder = EnvironmentBuilder::new(runtime);

    let plugins = multi_sink_plugins();
    let image = builder
        .build_if_absent(&plugins)
        .await
        .expect("build failed");

    let expected = format!("gust-engine:{}", Fingerprint::of(&plugins).short());
    assert_eq!(image, ImageRef::new(expected));
}

#[tokio::test]
async fn distinct_plugin_sets_build_distinct_images() {
    let runtime = Arc::new(CountingRuntime::default());
    let builder = EnvironmentBuilder::new(runtime.clone());

    let baseline = builder
        .build_if_absent(&PluginSet::baseline())
        .await
        .expect("baseline build failed");
    let multi = builder
        .build_if_absent(&multi_sink_plugins())
        .await
        .expect("multi-sink build failed");

    assert_ne!(baseline, multi);
    assert_eq!(runtime.builds_started.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_requests_share_one_build() {
    let gate = Arc::new(Notify::new());
    let runtime = Arc::new(CountingRuntime::gated(gate.clone()));
    let builder = Arc::new(EnvironmentBuilder::new(runtime.clone()));

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let builder = builder.clone();
            tokio::spawn(async move { builder.build_if_absent(&multi_sink_plugins()).await })
        })
        .collect();

    // Give both requests time to reach the builder; only one build may start.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runtime.builds_started.load(Ordering::SeqCst), 1);

    gate.notify_waiters();

    let mut images = Vec::new();
    for task in tasks {
        images.push(
            task.await
                .expect("task panicked")
                .expect("build failed"),
        );
    }

    assert_eq!(images[0], images[1]);
    assert_eq!(runtime.builds_started.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_build_publishes_nothing() {
    let runtime = Arc::new(CountingRuntime::failing(1));
    let builder = EnvironmentBuilder::new(runtime.clone());

    let first = builder.build_if_absent(&PluginSet::baseline()).await;
    assert!(first.is_err());

    // The failure was not cached; the next request builds again and succeeds.
    let second = builder
        .build_if_absent(&PluginSet::baseline())
        .await
        .expect("retry after failed build should succeed");
    assert!(second.as_str().starts_with("gust-engine:"));
    assert_eq!(runtime.builds_started.load(Ordering::SeqCst), 2);
}
