//! Service Worker Events
//!
//! Event types the platform dispatches into the worker, the lifetime
//! extension every extendable event carries, and the page-facing clients
//! handle.

use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::HostError;

/// Event type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Install event
    Install,
    /// Activate event
    Activate,
    /// Fetch event
    Fetch,
    /// Message posted by a page
    Message,
    /// Push event
    Push,
    /// Background sync event
    Sync,
    /// Notification click event
    NotificationClick,
}

/// Keeps an event alive until its asynchronous work is done.
///
/// Handlers that await their work inline call [`extend`](Self::extend);
/// work that must not delay the handler's answer is spawned and handed to
/// [`wait_until`](Self::wait_until). The platform calls
/// [`settle`](Self::settle) before it lets the worker go idle. Dropping the
/// lifetime without settling abandons whatever is still running.
#[derive(Debug, Default)]
pub struct EventLifetime {
    /// Whether the handler extended the event
    extended: bool,
    /// Spawned work still tied to the event
    pending: Vec<JoinHandle<()>>,
}

impl EventLifetime {
    /// Create a new lifetime
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the event as extended by inline async work
    pub fn extend(&mut self) {
        self.extended = true;
    }

    /// Tie spawned work to the event
    pub fn wait_until(&mut self, task: JoinHandle<()>) {
        self.extended = true;
        self.pending.push(task);
    }

    /// Check if the event was extended
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Number of spawned tasks not yet settled
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every spawned task; returns how many were joined
    pub async fn settle(&mut self) -> usize {
        let tasks = std::mem::take(&mut self.pending);
        let count = tasks.len();
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                log::debug!("[SW] Extended task ended abnormally: {}", e);
            }
        }
        count
    }
}

/// Extendable event trait
pub trait ExtendableEvent {
    /// Get event type
    fn event_type(&self) -> EventType;

    /// Event lifetime
    fn lifetime(&self) -> &EventLifetime;

    /// Event lifetime (mutable)
    fn lifetime_mut(&mut self) -> &mut EventLifetime;

    /// Tie spawned work to this event
    fn wait_until(&mut self, task: JoinHandle<()>) {
        self.lifetime_mut().wait_until(task);
    }

    /// Check if the event was extended
    fn has_wait_until(&self) -> bool {
        self.lifetime().is_extended()
    }
}

macro_rules! plain_extendable_event {
    ($name:ident, $kind:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Default)]
        pub struct $name {
            lifetime: EventLifetime,
        }

        impl $name {
            /// Create new event
            pub fn new() -> Self {
                Self::default()
            }
        }

        impl ExtendableEvent for $name {
            fn event_type(&self) -> EventType {
                $kind
            }

            fn lifetime(&self) -> &EventLifetime {
                &self.lifetime
            }

            fn lifetime_mut(&mut self) -> &mut EventLifetime {
                &mut self.lifetime
            }
        }
    };
}

plain_extendable_event!(InstallEvent, EventType::Install, "Install event");
plain_extendable_event!(ActivateEvent, EventType::Activate, "Activate event");

/// Message event data
#[derive(Debug)]
pub struct MessageEvent {
    /// Message data (serialized)
    data: Vec<u8>,
    /// Origin of the posting page
    origin: String,
    /// Source client ID
    source: Option<String>,
    /// Lifetime extension
    lifetime: EventLifetime,
}

impl MessageEvent {
    /// Create new message event
    pub fn new(data: Vec<u8>, origin: impl Into<String>) -> Self {
        Self {
            data,
            origin: origin.into(),
            source: None,
            lifetime: EventLifetime::new(),
        }
    }

    /// Get data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get origin
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Get source
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Set source
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }
}

impl ExtendableEvent for MessageEvent {
    fn event_type(&self) -> EventType {
        EventType::Message
    }

    fn lifetime(&self) -> &EventLifetime {
        &self.lifetime
    }

    fn lifetime_mut(&mut self) -> &mut EventLifetime {
        &mut self.lifetime
    }
}

/// Push event data
#[derive(Debug)]
pub struct PushEvent {
    /// Push data
    data: Option<Vec<u8>>,
    /// Lifetime extension
    lifetime: EventLifetime,
}

impl PushEvent {
    /// Create new push event
    pub fn new(data: Option<Vec<u8>>) -> Self {
        Self {
            data,
            lifetime: EventLifetime::new(),
        }
    }

    /// Get data
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Get data as text
    pub fn text(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| std::str::from_utf8(d).ok().map(|s| s.to_string()))
    }
}

impl ExtendableEvent for PushEvent {
    fn event_type(&self) -> EventType {
        EventType::Push
    }

    fn lifetime(&self) -> &EventLifetime {
        &self.lifetime
    }

    fn lifetime_mut(&mut self) -> &mut EventLifetime {
        &mut self.lifetime
    }
}

/// Notification click event
#[derive(Debug, Default)]
pub struct NotificationClickEvent {
    /// Notification tag
    notification_tag: Option<String>,
    /// Action clicked
    action: Option<String>,
    /// Whether the notification was closed
    closed: bool,
    /// Lifetime extension
    lifetime: EventLifetime,
}

impl NotificationClickEvent {
    /// Create new notification click event
    pub fn new() -> Self {
        Self::default()
    }

    /// Set notification tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.notification_tag = Some(tag.into());
        self
    }

    /// Set action
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Get notification tag
    pub fn notification_tag(&self) -> Option<&str> {
        self.notification_tag.as_deref()
    }

    /// Get action
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Close the clicked notification
    pub fn close_notification(&mut self) {
        self.closed = true;
    }

    /// Whether the notification was closed
    pub fn notification_closed(&self) -> bool {
        self.closed
    }
}

impl ExtendableEvent for NotificationClickEvent {
    fn event_type(&self) -> EventType {
        EventType::NotificationClick
    }

    fn lifetime(&self) -> &EventLifetime {
        &self.lifetime
    }

    fn lifetime_mut(&mut self) -> &mut EventLifetime {
        &mut self.lifetime
    }
}

/// Clients API: the pages within the worker's scope
#[async_trait]
pub trait Clients: Send + Sync {
    /// Take control of every open page in scope without a reload
    async fn claim(&self) -> Result<(), HostError>;

    /// Open (or focus) a window on the given URL
    async fn open_window(&self, url: &str) -> Result<(), HostError>;
}
