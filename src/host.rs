//! Host capabilities consumed by the engine.
//!
//! These traits define the contract a host environment must implement:
//! - a mutation feed that subscribes to a target and delivers batches
//! - a matcher answering "does this node match this selector?"
//! - a notifier raising notifications against a target
//!
//! The in-memory host (`crate::memory`) implements all three for tests and
//! embedded use; the browser host (`crate::web`) binds them to `web-sys`.

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use crate::config::WatchConfig;
use crate::error::{ConfigError, MatchError};
use crate::mutation::MutationBatch;
use crate::selector::Selector;
use crate::watch::dispatcher::ReactionFailure;
use crate::watch::events::Notification;

/// Delivery callback handed to [`MutationFeed::subscribe`].
pub type Delivery<N> = Box<dyn FnMut(MutationBatch<N>)>;

/// Native mutation subscription.
///
/// Batches for one subscription are never delivered concurrently, and no
/// batch may be delivered after `unsubscribe` returns.
pub trait MutationFeed: 'static {
    /// Node type carried by mutation records.
    type Node: Clone + fmt::Debug + 'static;
    /// Identity of an observable element.
    type Target: Clone + Eq + Hash + fmt::Debug + 'static;
    /// Live subscription handle.
    type Subscription;

    /// Starts delivering batches for `target` to `delivery`.
    fn subscribe(
        &self,
        target: &Self::Target,
        config: &crate::config::ObserveConfig,
        delivery: Delivery<Self::Node>,
    ) -> Result<Self::Subscription, ConfigError>;

    /// Cancels a subscription.
    fn unsubscribe(&self, subscription: Self::Subscription);

    /// Top-level handler for reaction failures.
    fn report_failure(&self, failure: &ReactionFailure) {
        tracing::error!(
            watch_id = %failure.watch_id,
            selector = %failure.selector,
            direction = %failure.direction,
            error = %failure.error,
            "reaction failed"
        );
    }
}

/// Selector matching capability.
pub trait Matcher<N> {
    /// Tests `node` against `selector`.
    ///
    /// Non-element nodes must answer `Ok(false)`. Errors are treated as a miss
    /// by the dispatcher and never abort a batch.
    fn matches(&self, node: &N, selector: &Selector) -> Result<bool, MatchError>;

    /// Checks that `selector` can be evaluated at all.
    ///
    /// Called when a trigger is registered, so a malformed or unsupported
    /// selector is rejected up front instead of silently never matching.
    fn validate(&self, selector: &Selector) -> Result<(), MatchError> {
        let _ = selector;
        Ok(())
    }
}

impl<N, F> Matcher<N> for F
where
    F: Fn(&N, &Selector) -> Result<bool, MatchError>,
{
    fn matches(&self, node: &N, selector: &Selector) -> Result<bool, MatchError> {
        self(node, selector)
    }
}

/// Raises node notifications against a target element.
pub trait Notifier<T, N> {
    /// Emits one notification.
    fn notify(&self, notification: Notification<T, N>);
}

/// Notifier that only logs. Used until a host wires a real one.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl<T: fmt::Debug, N: fmt::Debug> Notifier<T, N> for LogNotifier {
    fn notify(&self, notification: Notification<T, N>) {
        tracing::debug!(
            watch_id = %notification.watch_id,
            event = notification.kind.event_name(),
            target = ?notification.target,
            node = ?notification.node,
            "notification"
        );
    }
}

/// The capabilities an observer is created from.
pub struct Host<F: MutationFeed> {
    pub(crate) feed: Rc<F>,
    pub(crate) matcher: Rc<dyn Matcher<F::Node>>,
    pub(crate) notifier: Rc<dyn Notifier<F::Target, F::Node>>,
    pub(crate) config: WatchConfig,
}

impl<F: MutationFeed> Clone for Host<F> {
    fn clone(&self) -> Self {
        Self {
            feed: Rc::clone(&self.feed),
            matcher: Rc::clone(&self.matcher),
            notifier: Rc::clone(&self.notifier),
            config: self.config.clone(),
        }
    }
}

impl<F: MutationFeed> fmt::Debug for Host<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<F: MutationFeed> Host<F> {
    /// Host with the default configuration and a logging notifier.
    pub fn new(feed: Rc<F>, matcher: Rc<dyn Matcher<F::Node>>) -> Self {
        Self {
            feed,
            matcher,
            notifier: Rc::new(LogNotifier),
            config: WatchConfig::default(),
        }
    }

    /// Replaces the notifier used by event observers.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Rc<dyn Notifier<F::Target, F::Node>>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: WatchConfig) -> Self {
        self.config = config;
        self
    }

    /// The mutation feed.
    #[must_use]
    pub fn feed(&self) -> &Rc<F> {
        &self.feed
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }
}
