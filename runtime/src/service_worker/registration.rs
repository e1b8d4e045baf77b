//! Service Worker Registration
//!
//! Page-side view of the worker registration. Tracks the installing, waiting
//! and active worker slots from the lifecycle changes the host relays, tells
//! the application when content is cached for offline use or a new version
//! is ready, and (by default) asks a waiting worker to take over.

use std::sync::Arc;

use super::{ControlMessage, LifecycleEvent, Scope, ServiceWorkerId, WorkerState};

/// A worker as seen by the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    id: ServiceWorkerId,
    /// Cache version the worker was deployed with
    version: String,
}

impl WorkerHandle {
    pub fn new(id: ServiceWorkerId, version: impl Into<String>) -> Self {
        Self {
            id,
            version: version.into(),
        }
    }

    pub fn id(&self) -> ServiceWorkerId {
        self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Application callbacks
pub trait RegistrationObserver: Send + Sync {
    /// First worker installed; content is cached for offline use
    fn on_success(&self, _registration: &Registration) {}

    /// A new worker installed while another one controls the page
    fn on_update(&self, _registration: &Registration) {}
}

/// Registration options
#[derive(Debug, Clone)]
pub struct RegistrationOptions {
    /// Scope; defaults to the script's directory
    pub scope: Option<String>,
    /// Post `SKIP_WAITING` to a worker as soon as it is waiting behind an
    /// active one
    pub auto_skip_waiting: bool,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            scope: None,
            auto_skip_waiting: true,
        }
    }
}

/// A service worker registration
pub struct Registration {
    scope: Scope,
    script_url: String,
    installing: Option<WorkerHandle>,
    waiting: Option<WorkerHandle>,
    active: Option<WorkerHandle>,
    auto_skip_waiting: bool,
    observer: Option<Arc<dyn RegistrationObserver>>,
    /// Messages posted to workers, not yet delivered by the host
    outbox: Vec<(ServiceWorkerId, ControlMessage)>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("scope", &self.scope)
            .field("script_url", &self.script_url)
            .field("installing", &self.installing)
            .field("waiting", &self.waiting)
            .field("active", &self.active)
            .field("outbox", &self.outbox)
            .finish()
    }
}

impl Registration {
    /// Register a worker script
    pub fn register(
        script_url: impl Into<String>,
        options: RegistrationOptions,
        observer: Option<Arc<dyn RegistrationObserver>>,
    ) -> Self {
        let script_url = script_url.into();
        let scope = match options.scope {
            Some(scope) => Scope::new(scope),
            None => Scope::for_script(&script_url),
        };
        log::debug!("[PWA] Registering {} for scope {}", script_url, scope.path());
        Self {
            scope,
            script_url,
            installing: None,
            waiting: None,
            active: None,
            auto_skip_waiting: options.auto_skip_waiting,
            observer,
            outbox: Vec::new(),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn script_url(&self) -> &str {
        &self.script_url
    }

    pub fn installing(&self) -> Option<&WorkerHandle> {
        self.installing.as_ref()
    }

    pub fn waiting(&self) -> Option<&WorkerHandle> {
        self.waiting.as_ref()
    }

    pub fn active(&self) -> Option<&WorkerHandle> {
        self.active.as_ref()
    }

    /// A new worker started installing
    pub fn worker_installing(&mut self, worker: WorkerHandle) {
        self.installing = Some(worker);
    }

    /// The installing worker finished installing
    pub fn worker_installed(&mut self, id: ServiceWorkerId) {
        let Some(worker) = take_if_id(&mut self.installing, id) else {
            return;
        };
        self.waiting = Some(worker);

        if self.active.is_some() {
            log::info!("[PWA] New version available");
            if let Some(observer) = self.observer.clone() {
                observer.on_update(self);
            }
            if self.auto_skip_waiting {
                self.post_message(id, ControlMessage::SkipWaiting);
            }
        } else {
            log::info!("[PWA] Content cached for offline use");
            if let Some(observer) = self.observer.clone() {
                observer.on_success(self);
            }
        }
    }

    /// A worker became active; the previous one is retired
    pub fn worker_activated(&mut self, id: ServiceWorkerId) {
        let worker = take_if_id(&mut self.waiting, id).or_else(|| take_if_id(&mut self.installing, id));
        if let Some(worker) = worker {
            self.active = Some(worker);
        }
    }

    /// A worker became redundant
    pub fn worker_redundant(&mut self, id: ServiceWorkerId) {
        take_if_id(&mut self.installing, id);
        take_if_id(&mut self.waiting, id);
        take_if_id(&mut self.active, id);
    }

    /// Apply a lifecycle event relayed from a worker
    pub fn observe(&mut self, worker: &WorkerHandle, event: &LifecycleEvent) {
        let LifecycleEvent::StateChange { to, .. } = event else {
            return;
        };
        match to {
            WorkerState::Installing => self.worker_installing(worker.clone()),
            WorkerState::Waiting => self.worker_installed(worker.id()),
            WorkerState::Active => self.worker_activated(worker.id()),
            WorkerState::Redundant => self.worker_redundant(worker.id()),
            WorkerState::Uninstalled | WorkerState::Activating => {}
        }
    }

    /// Queue a message for a worker
    pub fn post_message(&mut self, to: ServiceWorkerId, message: ControlMessage) {
        self.outbox.push((to, message));
    }

    /// Take queued messages for delivery
    pub fn take_outbox(&mut self) -> Vec<(ServiceWorkerId, ControlMessage)> {
        std::mem::take(&mut self.outbox)
    }

    /// Unregister: drop every worker slot
    pub fn unregister(&mut self) {
        self.installing = None;
        self.waiting = None;
        self.active = None;
    }
}

fn take_if_id(slot: &mut Option<WorkerHandle>, id: ServiceWorkerId) -> Option<WorkerHandle> {
    if slot.as_ref().is_some_and(|w| w.id() == id) {
        slot.take()
    } else {
        None
    }
}
