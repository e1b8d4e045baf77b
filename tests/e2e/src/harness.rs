//! Test harness for running E2E tests
//!
//! Plays the host platform: owns the cache store, network and page, deploys
//! worker versions, relays lifecycle changes to the page's registration and
//! delivers the messages the page posts back.

use std::sync::Arc;

use spin::Mutex;
use storefront_sw::service_worker::testing::{MockNetwork, RecordingHost};
use storefront_sw::service_worker::{
    ActivateEvent, CacheManager, CacheStore, ConfigError, ControlChannel, ControlMessage, Dispatched,
    FetchEvent, InstallEvent, MemoryCacheStore, MessageEvent, Registration, RegistrationObserver,
    RegistrationOptions, Request, Response, ServiceWorkerId, WorkerConfig, WorkerEvent,
    WorkerHandle, WorkerState,
};

use crate::fixtures::{self, ORIGIN, SCRIPT_URL};

/// Counts the registration callbacks the application receives
#[derive(Debug, Default)]
pub struct UpdateLog {
    success: Mutex<usize>,
    update: Mutex<usize>,
}

impl UpdateLog {
    pub fn successes(&self) -> usize {
        *self.success.lock()
    }

    pub fn updates(&self) -> usize {
        *self.update.lock()
    }
}

impl RegistrationObserver for UpdateLog {
    fn on_success(&self, _registration: &Registration) {
        *self.success.lock() += 1;
    }

    fn on_update(&self, _registration: &Registration) {
        *self.update.lock() += 1;
    }
}

/// One deployed worker version
pub struct Deployment {
    channel: ControlChannel,
    handle: WorkerHandle,
}

impl Deployment {
    pub fn channel(&self) -> &ControlChannel {
        &self.channel
    }

    pub fn manager(&self) -> &CacheManager {
        self.channel.manager()
    }

    pub fn state(&self) -> WorkerState {
        self.manager().state()
    }

    pub fn id(&self) -> ServiceWorkerId {
        self.handle.id()
    }
}

/// Result of a page fetch through the worker
#[derive(Debug)]
pub struct PageFetch {
    pub dispatched: Dispatched,
    pub response: Option<Response>,
}

impl PageFetch {
    /// Body of the worker's response as text
    pub fn text(&mut self) -> Option<String> {
        self.response.as_mut().and_then(|r| r.text_body().ok())
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }
}

/// The storefront page plus the platform pieces the worker runs on
pub struct Storefront {
    store: Arc<MemoryCacheStore>,
    network: Arc<MockNetwork>,
    host: Arc<RecordingHost>,
    updates: Arc<UpdateLog>,
    registration: Registration,
}

impl Storefront {
    /// A page registering the worker with default options
    pub fn new() -> Self {
        Self::with_options(RegistrationOptions::default())
    }

    pub fn with_options(options: RegistrationOptions) -> Self {
        Self::build(options, MemoryCacheStore::new())
    }

    /// A page whose origin storage holds at most `quota` bytes
    pub fn with_quota(quota: usize) -> Self {
        Self::build(RegistrationOptions::default(), MemoryCacheStore::with_quota(quota))
    }

    fn build(options: RegistrationOptions, store: MemoryCacheStore) -> Self {
        let updates = Arc::new(UpdateLog::default());
        let observer: Arc<dyn RegistrationObserver> = updates.clone();
        Self {
            store: Arc::new(store),
            network: Arc::new(MockNetwork::with_app_shell(&fixtures::config("v0"))),
            host: Arc::new(RecordingHost::new()),
            updates,
            registration: Registration::register(SCRIPT_URL, options, Some(observer)),
        }
    }

    pub fn store(&self) -> &Arc<MemoryCacheStore> {
        &self.store
    }

    pub fn network(&self) -> &Arc<MockNetwork> {
        &self.network
    }

    pub fn host(&self) -> &Arc<RecordingHost> {
        &self.host
    }

    pub fn updates(&self) -> &UpdateLog {
        &self.updates
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Names of every cache in the store
    pub async fn cache_names(&self) -> Vec<String> {
        self.store.keys().await.unwrap_or_default()
    }

    /// Deploy a worker version with the default storefront configuration
    pub async fn deploy(&mut self, version: &str) -> Result<Deployment, ConfigError> {
        self.deploy_with(fixtures::config(version)).await
    }

    /// Deploy a worker: install it, relay its progress to the page and
    /// activate it unless it has to wait behind the current one.
    pub async fn deploy_with(&mut self, config: WorkerConfig) -> Result<Deployment, ConfigError> {
        let handle = WorkerHandle::new(ServiceWorkerId::new(), config.cache_version.clone());
        let manager = CacheManager::new(
            config,
            self.store.clone(),
            self.network.clone(),
            self.host.clone(),
        )?;
        let deployment = Deployment {
            channel: ControlChannel::new(Arc::new(manager), self.host.clone()),
            handle,
        };
        log::debug!("[E2E] Deploying worker {:?}", deployment.id());

        self.dispatch(&deployment, WorkerEvent::Install(InstallEvent::new()))
            .await;
        self.deliver(&deployment).await;

        let first = self.registration.active().is_none();
        if deployment.state() == WorkerState::Activating
            || (deployment.state() == WorkerState::Waiting && first)
        {
            self.activate(&deployment).await;
        }
        Ok(deployment)
    }

    /// Dispatch the activate event
    pub async fn activate(&mut self, deployment: &Deployment) -> Dispatched {
        self.dispatch(deployment, WorkerEvent::Activate(ActivateEvent::new()))
            .await
    }

    /// Post a command from the page to a worker
    pub async fn post(&mut self, deployment: &Deployment, message: ControlMessage) -> Dispatched {
        match message.to_json() {
            Ok(data) => self.post_raw(deployment, data).await,
            Err(e) => {
                log::warn!("[E2E] Could not encode {:?}: {}", message, e);
                Dispatched::Ignored
            }
        }
    }

    /// Post an arbitrary payload from the page to a worker
    pub async fn post_raw(&mut self, deployment: &Deployment, data: Vec<u8>) -> Dispatched {
        self.dispatch(deployment, WorkerEvent::Message(MessageEvent::new(data, ORIGIN)))
            .await
    }

    /// Fetch through the worker, waiting for any work it left behind
    pub async fn fetch(&self, deployment: &Deployment, request: Request) -> PageFetch {
        let mut event = WorkerEvent::Fetch(FetchEvent::new(request));
        let dispatched = deployment.channel.dispatch(&mut event).await;
        event.settle().await;
        let response = match event {
            WorkerEvent::Fetch(mut fetch) => fetch.take_response(),
            _ => None,
        };
        PageFetch {
            dispatched,
            response,
        }
    }

    /// Navigate the page to a storefront path
    pub async fn navigate(&self, deployment: &Deployment, path: &str) -> PageFetch {
        self.fetch(deployment, Request::navigate(fixtures::url(path)))
            .await
    }

    /// Unregister the worker: the page forgets it and its caches are dropped
    pub async fn unregister(&mut self, deployment: &Deployment) -> Dispatched {
        let cleared = self.post(deployment, ControlMessage::ClearCache).await;
        self.registration.unregister();
        cleared
    }

    /// Dispatch any event, settle it, and relay resulting lifecycle changes
    pub async fn dispatch(&mut self, deployment: &Deployment, mut event: WorkerEvent) -> Dispatched {
        let dispatched = deployment.channel.dispatch(&mut event).await;
        event.settle().await;
        self.relay(deployment);
        dispatched
    }

    fn relay(&mut self, deployment: &Deployment) {
        for event in deployment.manager().drain_events() {
            self.registration.observe(&deployment.handle, &event);
        }
    }

    /// Deliver the page's queued messages addressed to `deployment`
    async fn deliver(&mut self, deployment: &Deployment) {
        for (to, message) in self.registration.take_outbox() {
            if to == deployment.id() {
                self.post(deployment, message).await;
            }
        }
    }
}

impl Default for Storefront {
    fn default() -> Self {
        Self::new()
    }
}
