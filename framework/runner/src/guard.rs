use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use url::Url;

use crate::resolver::EnvironmentName;

/// Key identifying the (target, environment) pair a run holds exclusively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetKey {
    target: String,
    environment: EnvironmentName,
}

impl TargetKey {
    pub fn new(target_url: &Url, environment: EnvironmentName) -> Self {
        Self {
            // Normalise away a trailing slash so `…/` and `…` queue together.
            target: target_url.as_str().trim_end_matches('/').to_string(),
            environment,
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.target, self.environment)
    }
}

/// Serializes runs against the same target and environment.
///
/// At most one run is in flight per [TargetKey]; a request for a pair that
/// is already running queues on the pair's lock and starts only once the
/// in-flight run reaches a terminal state. Non-preemptive: nothing is ever
/// aborted to make room.
#[derive(Default)]
pub struct TargetGuard {
    locks: parking_lot::Mutex<HashMap<TargetKey, Arc<Mutex<()>>>>,
}

impl TargetGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other run is in flight for `key`, then hold the slot
    /// until the returned permit is dropped.
    pub async fn acquire(&self, key: TargetKey) -> TargetPermit {
        let lock = self.locks.lock().entry(key.clone()).or_default().clone();

        let guard = match lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                log::info!("A run is already in flight for {key}, queueing this one");
                lock.lock_owned().await
            }
        };

        TargetPermit { key, _guard: guard }
    }
}

/// Exclusive hold on a (target, environment) pair for the lifetime of a run.
pub struct TargetPermit {
    key: TargetKey,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for TargetPermit {
    fn drop(&mut self) {
        log::debug!("Releasing target slot for {key}", key = self.key);
    }
}
