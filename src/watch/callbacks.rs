//! Callback-keyed observers.
//!
//! Triggers map a selector to a [`Reaction`]. When a node matching the
//! selector is added to (or removed from) the target, the reaction runs with
//! the node as its argument.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{ConfigError, ReactionError, WatchResult};
use crate::host::{Host, Matcher, MutationFeed};
use crate::selector::{IntoSelector, Selector};

use super::dispatcher::CallbackDispatcher;
use super::lifecycle::LiveSubscription;
use super::registry::CallbackTriggers;
use super::WatchId;

type ReactionFn<N> = dyn Fn(&N) -> Result<(), ReactionError>;

/// A user supplied reaction. Cheap to clone; clones share the same function.
pub struct Reaction<N>(Rc<ReactionFn<N>>);

impl<N> Reaction<N> {
    /// Wraps a fallible reaction.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&N) -> Result<(), ReactionError> + 'static,
    {
        Self(Rc::new(f))
    }

    /// Wraps a reaction that cannot fail.
    pub fn infallible<F>(f: F) -> Self
    where
        F: Fn(&N) + 'static,
    {
        Self::new(move |node| {
            f(node);
            Ok(())
        })
    }

    /// Runs the reaction.
    pub fn call(&self, node: &N) -> Result<(), ReactionError> {
        (self.0)(node)
    }

    /// Returns true if both handles share one function.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<N> Clone for Reaction<N> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<N> fmt::Debug for Reaction<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reaction").field(&Rc::as_ptr(&self.0).cast::<()>()).finish()
    }
}

/// Initial triggers of a callback observer.
///
/// Selectors are validated when the observer is created, so a bad selector
/// fails the attach call. Duplicates keep the first reaction.
pub struct CallbackOptions<N> {
    insert_triggers: Vec<(String, Reaction<N>)>,
    remove_triggers: Vec<(String, Reaction<N>)>,
}

impl<N> Default for CallbackOptions<N> {
    fn default() -> Self {
        Self {
            insert_triggers: Vec::new(),
            remove_triggers: Vec::new(),
        }
    }
}

impl<N> fmt::Debug for CallbackOptions<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = |v: &[(String, Reaction<N>)]| v.iter().map(|(s, _)| s.clone()).collect::<Vec<_>>();
        f.debug_struct("CallbackOptions")
            .field("insert_triggers", &keys(&self.insert_triggers))
            .field("remove_triggers", &keys(&self.remove_triggers))
            .finish()
    }
}

impl<N> CallbackOptions<N> {
    /// No triggers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an insertion trigger.
    #[must_use]
    pub fn on_insert(mut self, selector: impl Into<String>, reaction: Reaction<N>) -> Self {
        self.insert_triggers.push((selector.into(), reaction));
        self
    }

    /// Adds a removal trigger.
    #[must_use]
    pub fn on_remove(mut self, selector: impl Into<String>, reaction: Reaction<N>) -> Self {
        self.remove_triggers.push((selector.into(), reaction));
        self
    }

    fn registry(entries: Vec<(String, Reaction<N>)>) -> Result<CallbackTriggers<N>, ConfigError> {
        let mut registry = CallbackTriggers::new();
        for (raw, reaction) in entries {
            registry.add(Selector::parse(raw)?, reaction);
        }
        Ok(registry)
    }

    pub(crate) fn into_registries(
        self,
    ) -> Result<(CallbackTriggers<N>, CallbackTriggers<N>), ConfigError> {
        Ok((
            Self::registry(self.insert_triggers)?,
            Self::registry(self.remove_triggers)?,
        ))
    }
}

/// Observer invoking reactions for matching nodes.
pub struct CallbackObserver<F: MutationFeed> {
    id: WatchId,
    target: F::Target,
    insert_triggers: Rc<RefCell<CallbackTriggers<F::Node>>>,
    remove_triggers: Rc<RefCell<CallbackTriggers<F::Node>>>,
    matcher: Rc<dyn Matcher<F::Node>>,
    subscription: LiveSubscription<F>,
}

impl<F: MutationFeed> fmt::Debug for CallbackObserver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackObserver")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("insert_triggers", &self.insert_triggers())
            .field("remove_triggers", &self.remove_triggers())
            .field("active", &self.is_active())
            .finish()
    }
}

impl<F: MutationFeed> CallbackObserver<F> {
    /// Creates the observer and subscribes it to `target`.
    pub fn init(
        host: &Host<F>,
        target: F::Target,
        options: CallbackOptions<F::Node>,
    ) -> WatchResult<Self> {
        let id = WatchId::new();
        let (insert, remove) = options.into_registries()?;
        insert.validate(host.matcher.as_ref())?;
        remove.validate(host.matcher.as_ref())?;
        let insert_triggers = Rc::new(RefCell::new(insert));
        let remove_triggers = Rc::new(RefCell::new(remove));

        let dispatcher = CallbackDispatcher::new(
            id,
            Rc::clone(&insert_triggers),
            Rc::clone(&remove_triggers),
            Rc::clone(&host.matcher),
        );
        let subscription = LiveSubscription::open(id, host, &target, dispatcher)?;

        tracing::debug!(
            watch_id = %id,
            ?target,
            insert_triggers = insert_triggers.borrow().len(),
            remove_triggers = remove_triggers.borrow().len(),
            "callback observer attached"
        );

        Ok(Self {
            id,
            target,
            insert_triggers,
            remove_triggers,
            matcher: Rc::clone(&host.matcher),
            subscription,
        })
    }

    /// Registers an insertion trigger. Returns false if `selector` was already
    /// registered, in which case the existing reaction is kept.
    ///
    /// A selector the host matcher cannot evaluate fails with
    /// [`WatchError::Match`](crate::error::WatchError::Match).
    pub fn insert(&mut self, selector: impl IntoSelector, reaction: Reaction<F::Node>) -> WatchResult<bool> {
        let selector = self.checked(selector)?;
        Ok(self.insert_triggers.borrow_mut().add(selector, reaction))
    }

    /// Registers a removal trigger. Returns false if `selector` was already
    /// registered, in which case the existing reaction is kept.
    pub fn remove(&mut self, selector: impl IntoSelector, reaction: Reaction<F::Node>) -> WatchResult<bool> {
        let selector = self.checked(selector)?;
        Ok(self.remove_triggers.borrow_mut().add(selector, reaction))
    }

    fn checked(&self, selector: impl IntoSelector) -> WatchResult<Selector> {
        self.subscription.ensure_active()?;
        let selector = selector.into_selector()?;
        self.matcher.validate(&selector)?;
        Ok(selector)
    }

    /// Unregisters an insertion trigger. Returns false if it was absent.
    pub fn forget_insert(&mut self, selector: impl IntoSelector) -> WatchResult<bool> {
        self.subscription.ensure_active()?;
        let selector = selector.into_selector()?;
        Ok(self.insert_triggers.borrow_mut().remove(&selector).is_some())
    }

    /// Unregisters a removal trigger. Returns false if it was absent.
    pub fn forget_remove(&mut self, selector: impl IntoSelector) -> WatchResult<bool> {
        self.subscription.ensure_active()?;
        let selector = selector.into_selector()?;
        Ok(self.remove_triggers.borrow_mut().remove(&selector).is_some())
    }

    /// Cancels the subscription. Any later mutating call fails.
    pub fn destroy(&mut self) -> WatchResult<()> {
        self.subscription.cancel()?;
        tracing::debug!(watch_id = %self.id, target = ?self.target, "callback observer destroyed");
        Ok(())
    }

    /// Reaction bound to an insertion selector.
    #[must_use]
    pub fn insert_reaction(&self, selector: &Selector) -> Option<Reaction<F::Node>> {
        self.insert_triggers.borrow().get(selector).cloned()
    }

    /// Reaction bound to a removal selector.
    #[must_use]
    pub fn remove_reaction(&self, selector: &Selector) -> Option<Reaction<F::Node>> {
        self.remove_triggers.borrow().get(selector).cloned()
    }

    /// Insertion selectors in registry order.
    #[must_use]
    pub fn insert_triggers(&self) -> Vec<Selector> {
        self.insert_triggers.borrow().patterns().cloned().collect()
    }

    /// Removal selectors in registry order.
    #[must_use]
    pub fn remove_triggers(&self) -> Vec<Selector> {
        self.remove_triggers.borrow().patterns().cloned().collect()
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
