//! Control Channel
//!
//! Routes platform events into the worker. Lifecycle events go to the
//! [`CacheManager`], page messages are decoded into [`ControlMessage`]
//! commands, and push, notification-click and sync events are handled here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use spin::Mutex;

use super::{
    run_sync, ActivateEvent, ActivateReport, CacheManager, ExtendableEvent, FetchEvent,
    FetchOutcome, FetchSource, InstallEvent, InstallReport, MessageEvent, Notifier,
    NotificationClickEvent, PushEvent, ServiceWorkerId, SyncEvent, SyncId, SyncManager,
    SyncState, WorkerError,
};

/// Command posted by a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Leave `Waiting` now
    SkipWaiting,
    /// Delete every cache of the application
    ClearCache,
}

impl ControlMessage {
    /// Decode a message payload; `None` for anything that is not a command
    pub fn parse(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }

    /// Encode as the JSON a page posts
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Event dispatched into the worker
#[derive(Debug)]
pub enum WorkerEvent {
    Install(InstallEvent),
    Activate(ActivateEvent),
    Fetch(FetchEvent),
    Message(MessageEvent),
    Push(PushEvent),
    NotificationClick(NotificationClickEvent),
    Sync(SyncEvent),
}

impl WorkerEvent {
    /// The event's lifetime handle
    pub fn extendable(&mut self) -> &mut dyn ExtendableEvent {
        match self {
            WorkerEvent::Install(e) => e,
            WorkerEvent::Activate(e) => e,
            WorkerEvent::Fetch(e) => e,
            WorkerEvent::Message(e) => e,
            WorkerEvent::Push(e) => e,
            WorkerEvent::NotificationClick(e) => e,
            WorkerEvent::Sync(e) => e,
        }
    }

    /// Wait for work the handler spawned and left on the event
    pub async fn settle(&mut self) -> usize {
        self.extendable().lifetime_mut().settle().await
    }
}

/// What a dispatched event did
#[derive(Debug)]
pub enum Dispatched {
    Installed(InstallReport),
    Activated(ActivateReport),
    /// The fetch event was answered; the response is on the event
    Responded(FetchSource),
    /// The fetch was left to the platform
    Passthrough,
    /// A page command was applied
    Command(ControlMessage),
    /// Message was not a command
    Ignored,
    /// Notification shown or window opened
    Notified,
    /// Sync completed with the given state
    Synced(SyncState),
    /// The event could not be handled in the current state
    Rejected(WorkerError),
}

/// Event dispatcher for one worker instance
pub struct ControlChannel {
    manager: Arc<CacheManager>,
    notifier: Arc<dyn Notifier>,
    sync: Mutex<SyncManager>,
}

impl ControlChannel {
    /// Create a channel in front of `manager`
    pub fn new(manager: Arc<CacheManager>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            manager,
            notifier,
            sync: Mutex::new(SyncManager::new(ServiceWorkerId::new())),
        }
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    /// Register a background sync tag on behalf of a page
    pub fn register_sync(&self, tag: impl Into<String>) -> SyncId {
        self.sync.lock().register(tag)
    }

    /// Sync events for every tag waiting to (re)fire, e.g. once back online
    pub fn pending_syncs(&self) -> Vec<SyncEvent> {
        self.sync.lock().fire_pending()
    }

    /// Registered sync tags
    pub fn sync_tags(&self) -> Vec<String> {
        self.sync.lock().tags()
    }

    /// Dispatch an event.
    ///
    /// Work the handler awaits marks the event as extended; best-effort
    /// work is left on the event and finishes when the caller settles it.
    pub async fn dispatch(&self, event: &mut WorkerEvent) -> Dispatched {
        match event {
            WorkerEvent::Install(e) => {
                e.lifetime_mut().extend();
                match self.manager.install().await {
                    Ok(report) => Dispatched::Installed(report),
                    Err(e) => Self::reject("install", e),
                }
            }
            WorkerEvent::Activate(e) => {
                e.lifetime_mut().extend();
                match self.manager.activate().await {
                    Ok(report) => Dispatched::Activated(report),
                    Err(e) => Self::reject("activate", e),
                }
            }
            WorkerEvent::Fetch(e) => self.handle_fetch(e).await,
            WorkerEvent::Message(e) => self.handle_message(e).await,
            WorkerEvent::Push(e) => self.handle_push(e).await,
            WorkerEvent::NotificationClick(e) => self.handle_notification_click(e).await,
            WorkerEvent::Sync(e) => self.handle_sync(e),
        }
    }

    fn reject(what: &str, e: WorkerError) -> Dispatched {
        log::warn!("[SW] Ignoring {} event: {}", what, e);
        Dispatched::Rejected(e)
    }

    async fn handle_fetch(&self, event: &mut FetchEvent) -> Dispatched {
        let request = event.request().clone();
        match self.manager.fetch(&request, event.lifetime_mut()).await {
            FetchOutcome::Passthrough => Dispatched::Passthrough,
            FetchOutcome::Respond(response, source) => {
                event.respond_with(response);
                Dispatched::Responded(source)
            }
        }
    }

    async fn handle_message(&self, event: &mut MessageEvent) -> Dispatched {
        let Some(message) = ControlMessage::parse(event.data()) else {
            log::debug!(
                "[SW] Ignoring message from {}: {} bytes",
                event.origin(),
                event.data().len()
            );
            return Dispatched::Ignored;
        };

        match message {
            ControlMessage::SkipWaiting => {
                if let Err(e) = self.manager.skip_waiting() {
                    return Self::reject("SKIP_WAITING", e);
                }
            }
            ControlMessage::ClearCache => {
                event.lifetime_mut().extend();
                if let Err(e) = self.manager.clear_all().await {
                    return Self::reject("CLEAR_CACHE", e.into());
                }
            }
        }
        Dispatched::Command(message)
    }

    async fn handle_push(&self, event: &mut PushEvent) -> Dispatched {
        let text = event.text();
        let notification = self.manager.config().notification.for_push(text.as_deref());
        log::info!("[SW] Push received: {}", notification.body);

        event.lifetime_mut().extend();
        if let Err(e) = self.notifier.show(notification).await {
            log::warn!("[SW] Failed to show notification: {}", e);
        }
        Dispatched::Notified
    }

    async fn handle_notification_click(&self, event: &mut NotificationClickEvent) -> Dispatched {
        event.close_notification();
        let config = self.manager.config();
        let url = config.absolute_url(&config.notification.click_url);
        log::debug!("[SW] Notification clicked, opening {}", url);

        event.lifetime_mut().extend();
        if let Err(e) = self.manager.clients().open_window(&url).await {
            log::warn!("[SW] Failed to open window: {}", e);
        }
        Dispatched::Notified
    }

    fn handle_sync(&self, event: &mut SyncEvent) -> Dispatched {
        event.lifetime_mut().extend();
        let success = run_sync(event.tag());
        let state = self.sync.lock().complete(event.tag(), success);
        if state != SyncState::Success && event.last_chance() {
            log::warn!("[SW] Sync {} failed for good", event.tag());
        }
        Dispatched::Synced(state)
    }
}
