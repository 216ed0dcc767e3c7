use std::sync::Arc;

use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;

/// Broadcasts an external cancellation signal to every stage of a run.
///
/// A single handle is created per process and cloned into whatever needs to
/// request cancellation (the Ctrl-C task, the pipeline abort hook). Stages
/// that need to react subscribe through [CancelHandle::listener].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Sender<()>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
        }
    }

    /// Request cancellation of the in-flight run.
    pub fn cancel(&self) {
        if let Err(e) = self.sender.send(()) {
            // Fails only when nothing is listening any more, which means the
            // run already reached a terminal state.
            log::debug!("No listeners for cancellation signal: {e:?}");
        }
    }

    pub fn listener(&self) -> CancelListener {
        CancelListener::new(self.sender.subscribe())
    }
}

/// A subscriber to the cancellation signal, handed to one stage of a run.
#[derive(Clone, Debug)]
pub struct CancelListener {
    receiver: Arc<Mutex<Receiver<()>>>,
}

impl CancelListener {
    pub(crate) fn new(receiver: Receiver<()>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Point-in-time check whether cancellation has been requested. Work
    /// should stop as soon as this returns true so the run can be torn down.
    pub fn is_cancelled(&mut self) -> bool {
        match self.receiver.try_lock() {
            Ok(mut guard) => match guard.try_recv() {
                Ok(_) => true,
                Err(tokio::sync::broadcast::error::TryRecvError::Closed) => true,
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    /// Wait until cancellation is requested. Safe to race against another
    /// future so the signal can interrupt work in progress. A dropped
    /// [CancelHandle] counts as cancellation, so no stage can outlive the
    /// process that launched it.
    pub async fn cancelled(&mut self) {
        let mut guard = self.receiver.lock().await;
        loop {
            match guard.recv().await {
                Ok(_) => return,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    }
}
