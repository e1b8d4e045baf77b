//! Service Worker Lifecycle Management
//!
//! Handles worker state transitions and records the lifecycle events the
//! host relays to the page (state changes, controller changes).

use std::fmt;

use super::WorkerError;

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Script evaluated, install not started yet
    Uninstalled,
    /// Install event running (pre-caching the app shell)
    Installing,
    /// Installed, waiting for the previous worker to release its clients
    Waiting,
    /// Activate event running (evicting stale caches)
    Activating,
    /// Active and intercepting fetches
    Active,
    /// Replaced by a newer worker
    Redundant,
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::Uninstalled
    }
}

impl WorkerState {
    /// Check if this state allows fetch interception
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Active)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Uninstalled => "uninstalled",
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Lifecycle events observable by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// State change
    StateChange {
        from: WorkerState,
        to: WorkerState,
    },
    /// Worker asked to leave the waiting state early
    SkipWaiting,
    /// Worker claimed all open clients
    ControllerChange,
    /// A stale cache was deleted during activation
    CacheEvicted(String),
    /// Every cache was deleted on page request
    CachesCleared(usize),
}

/// Lifecycle bookkeeping for one worker instance
#[derive(Debug, Default)]
pub struct Lifecycle {
    /// Current state
    state: WorkerState,
    /// Whether skip-waiting was requested
    skip_waiting: bool,
    /// Events not yet drained by the host
    pending_events: Vec<LifecycleEvent>,
}

impl Lifecycle {
    /// Create new lifecycle in the `Uninstalled` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current state
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Whether skip-waiting has been requested
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    /// Record an event
    pub fn record(&mut self, event: LifecycleEvent) {
        self.pending_events.push(event);
    }

    /// Get pending events
    pub fn pending_events(&self) -> &[LifecycleEvent] {
        &self.pending_events
    }

    /// Take all pending events
    pub fn drain_events(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Transition to a new state
    pub fn transition(&mut self, to: WorkerState) -> Result<(), WorkerError> {
        let from = self.state;
        if !is_valid_transition(from, to) {
            return Err(WorkerError::InvalidStateTransition { from, to });
        }

        self.state = to;
        log::debug!("[SW] State {} -> {}", from, to);
        self.record(LifecycleEvent::StateChange { from, to });
        Ok(())
    }

    /// Request skip-waiting.
    ///
    /// Moves a waiting worker straight to `Activating` and returns `true`.
    /// In any other state only the request is remembered, so a worker still
    /// installing leaves `Waiting` as soon as it gets there.
    pub fn skip_waiting(&mut self) -> Result<bool, WorkerError> {
        if !self.skip_waiting {
            self.skip_waiting = true;
            self.record(LifecycleEvent::SkipWaiting);
        }

        if self.state == WorkerState::Waiting {
            self.transition(WorkerState::Activating)?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Check if a state transition is valid
fn is_valid_transition(from: WorkerState, to: WorkerState) -> bool {
    use WorkerState::*;

    matches!(
        (from, to),
        (Uninstalled, Installing)
            | (Installing, Waiting)
            | (Installing, Redundant)
            | (Waiting, Activating)
            | (Waiting, Redundant)
            | (Activating, Active)
            | (Activating, Redundant)
            | (Active, Redundant)
    )
}

/// Outcome of the install step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Cache the app shell was written into
    pub cache_name: String,
    /// Number of assets stored
    pub cached: usize,
    /// Why pre-caching failed, if it did
    pub error: Option<WorkerError>,
}

impl InstallReport {
    /// Whether every static asset was stored
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of the activate step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    /// Stale caches deleted
    pub evicted: Vec<String>,
    /// Stale caches whose deletion failed; retried on the next activation
    pub failed: Vec<String>,
    /// Whether open clients were claimed
    pub claimed: bool,
}
