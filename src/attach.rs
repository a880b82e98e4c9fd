//! Per-element attachment.
//!
//! [`Attachments`] keeps at most one observer per target element and routes
//! a closed set of commands to it. Routing a command to an element that has
//! no observer yet creates one with default options first; `Destroy` on such
//! an element does nothing.
//!
//! An observer destroyed directly (through [`Attachments::get_mut`]) no longer
//! counts as attached: lookups skip it and the next `attach` or command
//! replaces it with a fresh instance.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use crate::error::WatchResult;
use crate::host::{Host, MutationFeed};
use crate::watch::{CallbackObserver, CallbackOptions, EventObserver, EventOptions, Reaction};

/// An observer that can be attached to an element.
pub trait Attachable<F: MutationFeed>: Sized {
    /// Options accepted on attach.
    type Options: Default;
    /// Commands routed to an attached instance.
    type Command;

    /// Creates and subscribes an instance.
    fn init(host: &Host<F>, target: F::Target, options: Self::Options) -> WatchResult<Self>;

    /// Applies a command.
    fn apply(&mut self, command: Self::Command) -> WatchResult<()>;

    /// Returns true for the command that tears the instance down.
    fn is_destroy(command: &Self::Command) -> bool;

    /// Returns true until the instance is destroyed.
    fn is_active(&self) -> bool;
}

/// Commands for callback observers.
pub enum CallbackCommand<N> {
    /// Register an insertion trigger.
    Insert(String, Reaction<N>),
    /// Register a removal trigger.
    Remove(String, Reaction<N>),
    /// Unregister an insertion trigger.
    ForgetInsert(String),
    /// Unregister a removal trigger.
    ForgetRemove(String),
    /// Tear the observer down.
    Destroy,
}

impl<N> fmt::Debug for CallbackCommand<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert(s, _) => f.debug_tuple("Insert").field(s).finish(),
            Self::Remove(s, _) => f.debug_tuple("Remove").field(s).finish(),
            Self::ForgetInsert(s) => f.debug_tuple("ForgetInsert").field(s).finish(),
            Self::ForgetRemove(s) => f.debug_tuple("ForgetRemove").field(s).finish(),
            Self::Destroy => f.write_str("Destroy"),
        }
    }
}

/// Commands for event observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventCommand {
    /// Add a trigger selector.
    Add(String),
    /// Remove a trigger selector.
    Remove(String),
    /// Tear the observer down.
    Destroy,
}

impl<F: MutationFeed> Attachable<F> for CallbackObserver<F> {
    type Options = CallbackOptions<F::Node>;
    type Command = CallbackCommand<F::Node>;

    fn init(host: &Host<F>, target: F::Target, options: Self::Options) -> WatchResult<Self> {
        CallbackObserver::init(host, target, options)
    }

    fn apply(&mut self, command: Self::Command) -> WatchResult<()> {
        match command {
            CallbackCommand::Insert(selector, reaction) => self.insert(selector, reaction).map(drop),
            CallbackCommand::Remove(selector, reaction) => self.remove(selector, reaction).map(drop),
            CallbackCommand::ForgetInsert(selector) => self.forget_insert(selector).map(drop),
            CallbackCommand::ForgetRemove(selector) => self.forget_remove(selector).map(drop),
            CallbackCommand::Destroy => self.destroy(),
        }
    }

    fn is_destroy(command: &Self::Command) -> bool {
        matches!(command, CallbackCommand::Destroy)
    }

    fn is_active(&self) -> bool {
        CallbackObserver::is_active(self)
    }
}

impl<F: MutationFeed> Attachable<F> for EventObserver<F> {
    type Options = EventOptions;
    type Command = EventCommand;

    fn init(host: &Host<F>, target: F::Target, options: Self::Options) -> WatchResult<Self> {
        EventObserver::init(host, target, options)
    }

    fn apply(&mut self, command: Self::Command) -> WatchResult<()> {
        match command {
            EventCommand::Add(selector) => self.add(selector).map(drop),
            EventCommand::Remove(selector) => self.remove(selector).map(drop),
            EventCommand::Destroy => self.destroy(),
        }
    }

    fn is_destroy(command: &Self::Command) -> bool {
        matches!(command, EventCommand::Destroy)
    }

    fn is_active(&self) -> bool {
        EventObserver::is_active(self)
    }
}

/// Element identity to observer instance.
pub struct Attachments<F: MutationFeed, O> {
    host: Host<F>,
    instances: HashMap<F::Target, O>,
}

/// Attachments of callback observers.
pub type CallbackAttachments<F> = Attachments<F, CallbackObserver<F>>;

/// Attachments of event observers.
pub type EventAttachments<F> = Attachments<F, EventObserver<F>>;

impl<F: MutationFeed, O> fmt::Debug for Attachments<F, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachments")
            .field("targets", &self.instances.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<F: MutationFeed, O: Attachable<F>> Attachments<F, O> {
    /// Empty registry creating observers from `host`.
    pub fn new(host: Host<F>) -> Self {
        Self {
            host,
            instances: HashMap::new(),
        }
    }

    /// Returns the observer of `target`, creating it with `options` if absent.
    ///
    /// Options are ignored when a live observer already exists. A destroyed
    /// one is replaced.
    pub fn attach(&mut self, target: F::Target, options: O::Options) -> WatchResult<&mut O> {
        match self.instances.entry(target) {
            Entry::Occupied(entry) if entry.get().is_active() => {
                tracing::trace!(target = ?entry.key(), "already attached; options ignored");
                Ok(entry.into_mut())
            }
            Entry::Occupied(mut entry) => {
                tracing::debug!(target = ?entry.key(), "replacing destroyed observer");
                let observer = O::init(&self.host, entry.key().clone(), options)?;
                entry.insert(observer);
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let observer = O::init(&self.host, entry.key().clone(), options)?;
                Ok(entry.insert(observer))
            }
        }
    }

    /// Routes `command` to the observer of `target`.
    pub fn dispatch(&mut self, target: F::Target, command: O::Command) -> WatchResult<()> {
        if O::is_destroy(&command) {
            let Some(mut observer) = self.instances.remove(&target) else {
                tracing::trace!(?target, "destroy routed to unattached element");
                return Ok(());
            };
            if !observer.is_active() {
                tracing::trace!(?target, "destroy routed to destroyed observer");
                return Ok(());
            }
            return observer.apply(command);
        }
        self.attach(target, O::Options::default())?.apply(command)
    }

    /// The live observer attached to `target`.
    #[must_use]
    pub fn get(&self, target: &F::Target) -> Option<&O> {
        self.instances.get(target).filter(|o| o.is_active())
    }

    /// Mutable access to the live observer attached to `target`.
    pub fn get_mut(&mut self, target: &F::Target) -> Option<&mut O> {
        self.instances.get_mut(target).filter(|o| o.is_active())
    }

    /// Returns true if `target` has a live observer.
    #[must_use]
    pub fn contains(&self, target: &F::Target) -> bool {
        self.get(target).is_some()
    }

    /// Number of elements with a live observer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.values().filter(|o| o.is_active()).count()
    }

    /// Returns true when no element has a live observer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops observers that were destroyed directly.
    pub fn prune(&mut self) -> usize {
        let before = self.instances.len();
        self.instances.retain(|_, o| o.is_active());
        before - self.instances.len()
    }

    /// The host observers are created from.
    #[must_use]
    pub fn host(&self) -> &Host<F> {
        &self.host
    }
}
