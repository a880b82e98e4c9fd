//! The trigger dispatch engine.
//!
//! One observer instance owns one subscription to one target element and the
//! triggers registered on it. Two flavours share the same machinery:
//! callback observers invoke a reaction per matching selector, event
//! observers raise `nodeInserted` / `nodeRemoved` notifications.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Callback-keyed observers.
pub mod callbacks;
/// Batch dispatch and failure reporting.
pub mod dispatcher;
/// Event-keyed observers and notifications.
pub mod events;
/// Subscription lifecycle shared by both observer flavours.
pub mod lifecycle;
/// Ordered trigger registries.
pub mod registry;

pub use callbacks::{CallbackObserver, CallbackOptions, Reaction};
pub use dispatcher::{CallbackDispatcher, Dispatch, DispatchReport, EventDispatcher, ReactionFailure};
pub use events::{EventObserver, EventOptions, Notification, NotificationKind};
pub use registry::{CallbackTriggers, SelectorSet, TriggerRegistry};

/// Unique identifier of an observer instance, used to correlate logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchId(Uuid);

impl WatchId {
    /// Create a new random watch id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for WatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
