//! Tree-change observer subscription.
//!
//! The diagnostics `advise` call blocks while the host replays the
//! existing tree and deadlocks on some hosts when issued from the UI
//! thread it reports on, so the subscription is always made from a
//! short-lived helper thread. Events themselves are delivered by the
//! host on the UI thread through the session's event sink.

use std::cell::RefCell;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, error};

use glaze_tree::host::TreeDiagnostics;

/// Where the diagnostics subscription currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdviseStatus {
    Idle,
    Pending,
    Subscribed,
    Failed(String),
}

/// Owns the helper thread that advises tree-change diagnostics.
pub struct ObserverBridge {
    diagnostics: Arc<dyn TreeDiagnostics>,
    status: Arc<Mutex<AdviseStatus>>,
    worker: RefCell<Option<JoinHandle<()>>>,
}

impl ObserverBridge {
    pub fn new(diagnostics: Arc<dyn TreeDiagnostics>) -> ObserverBridge {
        ObserverBridge {
            diagnostics,
            status: Arc::new(Mutex::new(AdviseStatus::Idle)),
            worker: RefCell::new(None),
        }
    }

    /// Kicks off the advise call on a helper thread. Returns immediately;
    /// events start flowing once the host accepts the subscription.
    pub fn subscribe(&self) {
        if self.worker.borrow().is_some() {
            return;
        }
        self.set_status(AdviseStatus::Pending);
        let diagnostics = self.diagnostics.clone();
        let status = self.status.clone();
        let spawned = std::thread::Builder::new()
            .name("glaze-tree-advise".into())
            .spawn(move || {
                debug!("advising tree-change diagnostics from helper thread");
                let next = match diagnostics.advise() {
                    Ok(()) => AdviseStatus::Subscribed,
                    Err(e) => {
                        error!(error = %e, "tree-change advise failed");
                        AdviseStatus::Failed(e.to_string())
                    }
                };
                if let Ok(mut guard) = status.lock() {
                    *guard = next;
                }
            });
        match spawned {
            Ok(handle) => *self.worker.borrow_mut() = Some(handle),
            Err(e) => {
                error!(error = %e, "failed to spawn advise helper thread");
                self.set_status(AdviseStatus::Failed(e.to_string()));
            }
        }
    }

    /// Waits for the helper thread and reports whether the subscription
    /// is active.
    pub fn wait_subscribed(&self) -> bool {
        self.join_worker();
        self.status() == AdviseStatus::Subscribed
    }

    /// Tears the subscription down.
    pub fn unsubscribe(&self) {
        self.join_worker();
        if self.status() == AdviseStatus::Subscribed {
            self.diagnostics.unadvise();
        }
        self.set_status(AdviseStatus::Idle);
    }

    pub fn status(&self) -> AdviseStatus {
        self.status
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(AdviseStatus::Failed("status lock poisoned".into()))
    }

    fn set_status(&self, next: AdviseStatus) {
        if let Ok(mut guard) = self.status.lock() {
            *guard = next;
        }
    }

    fn join_worker(&self) {
        if let Some(handle) = self.worker.borrow_mut().take() {
            if handle.join().is_err() {
                error!("advise helper thread panicked");
                self.set_status(AdviseStatus::Failed("advise helper panicked".into()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glaze_tree::MemoryTree;

    #[test]
    fn subscribe_advises_off_the_calling_thread() {
        let host = MemoryTree::new();
        let bridge = ObserverBridge::new(host.diagnostics().clone());
        bridge.subscribe();
        assert!(bridge.wait_subscribed());
        assert!(host.diagnostics().is_advised());
        bridge.unsubscribe();
        assert!(!host.diagnostics().is_advised());
        assert_eq!(bridge.status(), AdviseStatus::Idle);
    }

    #[test]
    fn advise_failure_is_reported_not_raised() {
        let host = MemoryTree::new();
        host.diagnostics().fail_next_advise();
        let bridge = ObserverBridge::new(host.diagnostics().clone());
        bridge.subscribe();
        assert!(!bridge.wait_subscribed());
        assert!(matches!(bridge.status(), AdviseStatus::Failed(_)));
        // Unsubscribe after failure is a no-op, not a panic.
        bridge.unsubscribe();
    }

    #[test]
    fn repeated_subscribe_is_idempotent_while_pending() {
        let host = MemoryTree::new();
        let bridge = ObserverBridge::new(host.diagnostics().clone());
        bridge.subscribe();
        bridge.subscribe();
        assert!(bridge.wait_subscribed());
        bridge.unsubscribe();
    }
}
