//! Event-keyed observers.
//!
//! Triggers are a bare selector set. Matching nodes raise a `nodeInserted` or
//! `nodeRemoved` notification against the target through the host
//! [`Notifier`](crate::host::Notifier). An empty set matches every node.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, WatchResult};
use crate::host::{Host, Matcher, MutationFeed};
use crate::mutation::Direction;
use crate::selector::{IntoSelector, Selector};

use super::dispatcher::EventDispatcher;
use super::lifecycle::LiveSubscription;
use super::registry::SelectorSet;
use super::WatchId;

/// Notification name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    /// A matching node was added to the target.
    NodeInserted,
    /// A matching node was removed from the target.
    NodeRemoved,
}

impl NotificationKind {
    /// Event name raised on the target.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::NodeInserted => "nodeInserted",
            Self::NodeRemoved => "nodeRemoved",
        }
    }
}

impl From<Direction> for NotificationKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Inserted => Self::NodeInserted,
            Direction::Removed => Self::NodeRemoved,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// A notification raised against a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification<T, N> {
    /// Observer that raised it.
    pub watch_id: WatchId,
    /// Inserted or removed.
    pub kind: NotificationKind,
    /// Element the observer is attached to.
    pub target: T,
    /// The affected node.
    pub node: N,
    /// Selector that matched; `None` when the trigger set was empty.
    pub selector: Option<Selector>,
}

/// Initial triggers of an event observer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventOptions {
    /// Selectors to watch; empty means every node.
    pub triggers: Vec<String>,
}

impl EventOptions {
    /// No triggers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a trigger selector.
    #[must_use]
    pub fn trigger(mut self, selector: impl Into<String>) -> Self {
        self.triggers.push(selector.into());
        self
    }

    /// Parses options from JSON, e.g. `{"triggers": [".item"]}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidOptions {
            reason: format!("invalid event options: {e}"),
        })
    }

    pub(crate) fn into_selector_set(self) -> Result<SelectorSet, ConfigError> {
        let mut set = SelectorSet::new();
        for raw in self.triggers {
            set.insert(Selector::parse(raw)?);
        }
        Ok(set)
    }
}

/// Observer raising notifications for matching nodes.
pub struct EventObserver<F: MutationFeed> {
    id: WatchId,
    target: F::Target,
    triggers: Rc<RefCell<SelectorSet>>,
    matcher: Rc<dyn Matcher<F::Node>>,
    subscription: LiveSubscription<F>,
}

impl<F: MutationFeed> fmt::Debug for EventObserver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventObserver")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("triggers", &self.triggers())
            .field("active", &self.is_active())
            .finish()
    }
}

impl<F: MutationFeed> EventObserver<F> {
    /// Creates the observer and subscribes it to `target`.
    pub fn init(host: &Host<F>, target: F::Target, options: EventOptions) -> WatchResult<Self> {
        let id = WatchId::new();
        let triggers = options.into_selector_set()?;
        triggers.validate(host.matcher.as_ref())?;
        let triggers = Rc::new(RefCell::new(triggers));

        let dispatcher = EventDispatcher::new(
            id,
            target.clone(),
            Rc::clone(&triggers),
            Rc::clone(&host.matcher),
            Rc::clone(&host.notifier),
        );
        let subscription = LiveSubscription::open(id, host, &target, dispatcher)?;

        tracing::debug!(
            watch_id = %id,
            ?target,
            triggers = triggers.borrow().len(),
            "event observer attached"
        );

        Ok(Self {
            id,
            target,
            triggers,
            matcher: Rc::clone(&host.matcher),
            subscription,
        })
    }

    /// Adds a trigger. Returns false if it was already present.
    ///
    /// A selector the host matcher cannot evaluate is rejected.
    pub fn add(&mut self, selector: impl IntoSelector) -> WatchResult<bool> {
        self.subscription.ensure_active()?;
        let selector = selector.into_selector()?;
        self.matcher.validate(&selector)?;
        Ok(self.triggers.borrow_mut().insert(selector))
    }

    /// Removes a trigger. Returns false if it was absent.
    pub fn remove(&mut self, selector: impl IntoSelector) -> WatchResult<bool> {
        self.subscription.ensure_active()?;
        let selector = selector.into_selector()?;
        Ok(self.triggers.borrow_mut().remove(&selector).is_some())
    }

    /// Cancels the subscription. Any later mutating call fails.
    pub fn destroy(&mut self) -> WatchResult<()> {
        self.subscription.cancel()?;
        tracing::debug!(watch_id = %self.id, target = ?self.target, "event observer destroyed");
        Ok(())
    }

    /// Current triggers in registry order.
    #[must_use]
    pub fn triggers(&self) -> Vec<Selector> {
        self.triggers.borrow().patterns().cloned().collect()
    }

    /// Instance id.
    #[must_use]
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Observed element.
    #[must_use]
    pub fn target(&self) -> &F::Target {
        &self.target
    }

    /// Returns true until destroyed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }
}
