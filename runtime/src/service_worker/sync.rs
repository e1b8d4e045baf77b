//! Background Sync
//!
//! Tracks sync tags registered by the page and the retry bookkeeping for
//! each. The storefront only knows one tag, [`ORDER_SYNC_TAG`]; the worker
//! completes it as soon as it fires.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{EventLifetime, EventType, ExtendableEvent, ServiceWorkerId};

/// Tag the checkout page registers for queued orders
pub const ORDER_SYNC_TAG: &str = "sync-orders";

/// Attempts before a registration gets its last chance
pub const MAX_SYNC_ATTEMPTS: u32 = 3;

/// Sync ID counter
static NEXT_SYNC_ID: AtomicU64 = AtomicU64::new(1);

/// Sync registration ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncId(u64);

impl SyncId {
    fn new() -> Self {
        Self(NEXT_SYNC_ID.fetch_add(1, Ordering::SeqCst))
    }
}

/// Sync registration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Waiting for connectivity
    #[default]
    Pending,
    /// Sync event dispatched, not completed yet
    Firing,
    /// Failed, will fire again
    Reregistering,
    /// Completed successfully
    Success,
    /// Out of attempts
    Failed,
}

/// Sync registration
#[derive(Debug, Clone)]
pub struct SyncRegistration {
    id: SyncId,
    tag: String,
    state: SyncState,
    attempts: u32,
    last_chance: bool,
}

impl SyncRegistration {
    /// Create new registration
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            id: SyncId::new(),
            tag: tag.into(),
            state: SyncState::Pending,
            attempts: 0,
            last_chance: false,
        }
    }

    pub fn id(&self) -> SyncId {
        self.id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Failed attempts so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the next firing is the final one
    pub fn last_chance(&self) -> bool {
        self.last_chance
    }

    fn ready(&self) -> bool {
        matches!(self.state, SyncState::Pending | SyncState::Reregistering)
    }

    fn mark_firing(&mut self) {
        self.state = SyncState::Firing;
    }

    /// Record a failed attempt; returns `true` if another attempt follows
    fn mark_failed(&mut self) -> bool {
        if self.last_chance {
            self.state = SyncState::Failed;
            return false;
        }
        self.attempts += 1;
        if self.attempts >= MAX_SYNC_ATTEMPTS {
            self.last_chance = true;
        }
        self.state = SyncState::Reregistering;
        true
    }
}

/// Sync event dispatched into the worker
#[derive(Debug)]
pub struct SyncEvent {
    tag: String,
    last_chance: bool,
    lifetime: EventLifetime,
}

impl SyncEvent {
    /// Create new sync event
    pub fn new(tag: impl Into<String>, last_chance: bool) -> Self {
        Self {
            tag: tag.into(),
            last_chance,
            lifetime: EventLifetime::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether the platform will not fire this tag again after a failure
    pub fn last_chance(&self) -> bool {
        self.last_chance
    }
}

impl ExtendableEvent for SyncEvent {
    fn event_type(&self) -> EventType {
        EventType::Sync
    }

    fn lifetime(&self) -> &EventLifetime {
        &self.lifetime
    }

    fn lifetime_mut(&mut self) -> &mut EventLifetime {
        &mut self.lifetime
    }
}

/// Sync registrations for one worker
#[derive(Debug)]
pub struct SyncManager {
    worker_id: ServiceWorkerId,
    /// Registrations by tag
    registrations: BTreeMap<String, SyncRegistration>,
}

impl SyncManager {
    /// Create new sync manager
    pub fn new(worker_id: ServiceWorkerId) -> Self {
        Self {
            worker_id,
            registrations: BTreeMap::new(),
        }
    }

    pub fn worker_id(&self) -> ServiceWorkerId {
        self.worker_id
    }

    /// Register a tag; registering a known tag returns its existing ID
    pub fn register(&mut self, tag: impl Into<String>) -> SyncId {
        let tag = tag.into();
        self.registrations
            .entry(tag.clone())
            .or_insert_with(|| SyncRegistration::new(tag))
            .id()
    }

    pub fn get(&self, tag: &str) -> Option<&SyncRegistration> {
        self.registrations.get(tag)
    }

    /// Registered tags
    pub fn tags(&self) -> Vec<String> {
        self.registrations.keys().cloned().collect()
    }

    pub fn unregister(&mut self, tag: &str) -> bool {
        self.registrations.remove(tag).is_some()
    }

    /// Fire every registration waiting for a (re)try
    pub fn fire_pending(&mut self) -> Vec<SyncEvent> {
        self.registrations
            .values_mut()
            .filter(|r| r.ready())
            .map(|r| {
                r.mark_firing();
                SyncEvent::new(r.tag.clone(), r.last_chance)
            })
            .collect()
    }

    /// Complete a fired sync. Finished registrations are dropped; failed
    /// ones are queued again until their last chance is spent. Tags fired by
    /// the platform without a registration here just report the outcome.
    pub fn complete(&mut self, tag: &str, success: bool) -> SyncState {
        let Some(registration) = self.registrations.get_mut(tag) else {
            return if success {
                SyncState::Success
            } else {
                SyncState::Failed
            };
        };

        if success {
            registration.state = SyncState::Success;
        } else if registration.mark_failed() {
            log::debug!(
                "[SW] Sync {} failed, attempt {}",
                tag,
                registration.attempts
            );
            return registration.state;
        } else {
            log::warn!("[SW] Sync {} gave up", tag);
        }

        let state = registration.state;
        self.registrations.remove(tag);
        state
    }
}

/// Run the work behind a sync tag; returns whether it succeeded
pub fn run_sync(tag: &str) -> bool {
    match tag {
        ORDER_SYNC_TAG => {
            log::info!("[SW] Syncing orders");
            true
        }
        _ => {
            log::debug!("[SW] No handler for sync tag {}", tag);
            false
        }
    }
}
