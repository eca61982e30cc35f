// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Entry point of the sync engine.
//!
//! A [`SyncCoordinator`] owns a registry of namespaces. Starting a namespace
//! spawns three tasks sharing its state:
//!
//! - the debouncer, which batches intercepted writes and flushes them
//! - the subscriber, which applies remote changes
//! - the reconciler, which runs once after a short delay
//!
//! All three stop when the namespace's cancellation token fires. The
//! coordinator never panics into the host; failures surface as
//! [`SyncEvent`]s and in [`SyncStatus`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use kvs_core::{ClockSource, LocalStore, SystemClock};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::events::{EventBus, SyncEvent};
use crate::flusher::FlushOutcome;
use crate::identity::IdentityProvider;
use crate::interceptor::{intercept, InterceptedStore};
use crate::namespace::{Namespace, Shared, SyncStatus};
use crate::queue::{run_debouncer, FlushSignal};
use crate::reconciler::{run_reconciler, ReconcileReport, ReconcileState};
use crate::remote::RemoteStore;
use crate::subscriber::run_subscriber;

/// What to sync: a namespace, the user it belongs to, and its keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub namespace: String,
    pub user_id: String,
    pub keys: Vec<String>,
}

impl SyncOptions {
    pub fn new<I, K>(namespace: impl Into<String>, user_id: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        SyncOptions {
            namespace: namespace.into(),
            user_id: user_id.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.namespace.contains('/') {
            return Err(Error::InvalidOptions(format!(
                "namespace '{}' must be non-empty without '/'",
                self.namespace
            )));
        }
        if self.user_id.is_empty() || self.user_id.contains('/') {
            return Err(Error::InvalidOptions(format!(
                "user id '{}' must be non-empty without '/'",
                self.user_id
            )));
        }
        Ok(())
    }
}

struct Inner {
    shared: Arc<Shared>,
    namespaces: Mutex<HashMap<String, Arc<Namespace>>>,
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<Namespace>>> {
        self.namespaces.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get(&self, namespace: &str) -> Option<Arc<Namespace>> {
        self.registry().get(namespace).cloned()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for ns in self.registry().values() {
            ns.shutdown();
        }
    }
}

/// Drives sync for any number of namespaces over one local and one remote
/// store.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    /// Creates a coordinator with default timing and the system clock.
    pub fn new(store: Arc<dyn LocalStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self::with_options(store, remote, SyncConfig::default(), Arc::new(SystemClock))
    }

    /// Creates a coordinator with explicit timing and clock.
    pub fn with_options(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        config: SyncConfig,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        SyncCoordinator {
            inner: Arc::new(Inner {
                shared: Arc::new(Shared {
                    store,
                    remote,
                    clock,
                    config,
                    events: EventBus::new(),
                }),
                namespaces: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Starts syncing a namespace, replacing any running instance of it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_sync(&self, options: SyncOptions) -> Result<SyncHandle> {
        options.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::InvalidOptions(
                "sync must be started from within a tokio runtime".to_string(),
            ));
        }

        let (ns, signals) = Namespace::new(&options.namespace, &options.user_id, options.keys);
        let previous = self
            .inner
            .registry()
            .insert(options.namespace.clone(), ns.clone());
        if let Some(previous) = previous {
            info!(namespace = %previous.id, "restarting sync");
            previous.shutdown();
        }

        let shared = &self.inner.shared;
        let restored = ns.restore_outbox(shared.store.as_ref());
        if restored > 0 {
            info!(namespace = %ns.id, restored, "resending writes left from an earlier run");
        }
        tokio::spawn(run_debouncer(ns.clone(), shared.clone(), signals));
        tokio::spawn(run_subscriber(ns.clone(), shared.clone()));
        tokio::spawn(run_reconciler(ns.clone(), shared.clone()));
        info!(
            namespace = %ns.id,
            user = %ns.user_id,
            keys = ns.tracked_keys.len(),
            "sync started"
        );

        Ok(SyncHandle {
            coordinator: Arc::downgrade(&self.inner),
            ns: Arc::downgrade(&ns),
            namespace: options.namespace,
        })
    }

    /// Stops a namespace. Unflushed writes stay in the local store's outbox
    /// and go out the next time the namespace starts. Returns false if it
    /// was not running.
    pub fn stop_sync(&self, namespace: &str) -> bool {
        let removed = self.inner.registry().remove(namespace);
        match removed {
            Some(ns) => {
                ns.shutdown();
                info!(namespace, "sync stopped");
                true
            }
            None => false,
        }
    }

    /// Stops every namespace.
    pub fn stop_all(&self) {
        let drained: Vec<_> = self.inner.registry().drain().collect();
        for (id, ns) in drained {
            ns.shutdown();
            info!(namespace = %id, "sync stopped");
        }
    }

    /// Names of running namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.registry().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn sync_status(&self, namespace: &str) -> Option<SyncStatus> {
        self.inner.get(namespace).map(|ns| ns.status())
    }

    /// Status of every running namespace, sorted by name.
    pub fn statuses(&self) -> Vec<SyncStatus> {
        let mut statuses: Vec<_> = self.inner.registry().values().map(|ns| ns.status()).collect();
        statuses.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        statuses
    }

    /// Flushes a namespace's queued writes without waiting for the quiet
    /// period.
    pub async fn flush_now(&self, namespace: &str) -> Result<FlushOutcome> {
        let ns = self
            .inner
            .get(namespace)
            .ok_or_else(|| Error::NotSyncing(namespace.to_string()))?;
        let (reply, rx) = oneshot::channel();
        ns.signal(FlushSignal::Now(Some(reply)));
        tokio::select! {
            _ = ns.cancel.cancelled() => Ok(FlushOutcome::Cancelled),
            outcome = rx => Ok(outcome.unwrap_or(FlushOutcome::Cancelled)),
        }
    }

    /// Waits until a namespace's initial reconciliation has finished.
    pub async fn reconciled(&self, namespace: &str) -> Result<ReconcileReport> {
        let ns = self
            .inner
            .get(namespace)
            .ok_or_else(|| Error::NotSyncing(namespace.to_string()))?;
        wait_reconciled(&ns).await
    }

    /// Receives every event emitted from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.shared.events.subscribe()
    }

    /// The local store, wrapped so writes are synced.
    pub fn store(&self) -> InterceptedStore {
        InterceptedStore::new(self.inner.shared.store.clone(), self.clone())
    }

    /// Reports a local write to every namespace tracking `key`.
    pub(crate) fn on_local_write(&self, key: &str, value: Option<&str>) {
        let namespaces: Vec<_> = self.inner.registry().values().cloned().collect();
        for ns in namespaces {
            let outcome = intercept(&ns, &self.inner.shared, key, value);
            debug!(namespace = %ns.id, key, ?outcome, "intercepted local write");
        }
    }

    /// Keeps `namespace` synced for whoever is signed in: started on
    /// sign-in, restarted when the user changes, stopped on sign-out.
    ///
    /// The returned task ends when the identity provider goes away or the
    /// coordinator is dropped.
    pub fn follow_identity(
        &self,
        identity: &dyn IdentityProvider,
        namespace: impl Into<String>,
        keys: Vec<String>,
    ) -> JoinHandle<()> {
        let mut users = identity.watch();
        let weak = Arc::downgrade(&self.inner);
        let namespace = namespace.into();

        tokio::spawn(async move {
            let mut current: Option<String> = None;
            loop {
                let user = users.borrow_and_update().clone();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let coordinator = SyncCoordinator { inner };
                if user != current {
                    match &user {
                        Some(user_id) => {
                            let options = SyncOptions::new(&namespace, user_id, keys.clone());
                            if let Err(err) = coordinator.start_sync(options) {
                                warn!(namespace = %namespace, "cannot start sync: {}", err);
                            }
                        }
                        None => {
                            coordinator.stop_sync(&namespace);
                        }
                    }
                    current = user;
                }
                drop(coordinator);

                if users.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

async fn wait_reconciled(ns: &Namespace) -> Result<ReconcileReport> {
    let mut states = ns.watch_reconcile();
    loop {
        let state = states.borrow_and_update().clone();
        match state {
            ReconcileState::Done(report) => return Ok(report),
            ReconcileState::Failed(message) => return Err(Error::ReconcileFailed(message)),
            ReconcileState::Pending => {}
        }
        tokio::select! {
            _ = ns.cancel.cancelled() => return Err(Error::NotSyncing(ns.id.clone())),
            changed = states.changed() => {
                if changed.is_err() {
                    return Err(Error::NotSyncing(ns.id.clone()));
                }
            }
        }
    }
}

/// A started namespace.
///
/// Dropping the handle does not stop sync; call [`stop`](Self::stop).
#[derive(Clone)]
pub struct SyncHandle {
    coordinator: Weak<Inner>,
    ns: Weak<Namespace>,
    namespace: String,
}

impl fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHandle")
            .field("namespace", &self.namespace)
            .field("running", &self.is_running())
            .finish()
    }
}

impl SyncHandle {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// True while this instance is the one registered and not cancelled.
    pub fn is_running(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<(Arc<Inner>, Arc<Namespace>)> {
        let inner = self.coordinator.upgrade()?;
        let ns = self.ns.upgrade()?;
        let registered = inner.get(&self.namespace)?;
        if Arc::ptr_eq(&registered, &ns) && !ns.cancel.is_cancelled() {
            Some((inner, ns))
        } else {
            None
        }
    }

    /// Stops this instance. A newer start of the same namespace is left
    /// running.
    pub fn stop(&self) {
        if let Some((inner, ns)) = self.current() {
            let removed = {
                let mut registry = inner.registry();
                match registry.get(&self.namespace) {
                    Some(registered) if Arc::ptr_eq(registered, &ns) => {
                        registry.remove(&self.namespace)
                    }
                    _ => None,
                }
            };
            if let Some(ns) = removed {
                ns.shutdown();
                info!(namespace = %self.namespace, "sync stopped");
            }
        }
    }

    pub fn status(&self) -> Option<SyncStatus> {
        self.ns.upgrade().map(|ns| ns.status())
    }

    /// Waits until this instance's initial reconciliation has finished.
    pub async fn reconciled(&self) -> Result<ReconcileReport> {
        let ns = self
            .ns
            .upgrade()
            .ok_or_else(|| Error::NotSyncing(self.namespace.clone()))?;
        wait_reconciled(&ns).await
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
