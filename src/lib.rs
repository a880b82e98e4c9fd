//! # nodewatch - selector-keyed reactions to DOM child list changes
//!
//! nodewatch attaches an observer to a target element and reacts when nodes
//! matching a CSS selector are inserted into, or removed from, that element's
//! child list. Two observer flavours share one dispatch engine:
//!
//! - **Callback observers** map each selector to a reaction invoked with the
//!   matching node.
//! - **Event observers** keep a plain selector set and raise `nodeInserted` /
//!   `nodeRemoved` notifications against the target.
//!
//! The engine is host-agnostic. A host supplies a [`MutationFeed`], a
//! [`Matcher`] and a [`Notifier`]; [`memory`] provides an in-memory document
//! for tests and embedding, and the `web` feature binds the browser.
//!
//! ## Usage
//!
//! ```rust
//! use nodewatch::memory::{MemoryDom, NodeId};
//! use nodewatch::{CallbackObserver, CallbackOptions, Reaction};
//!
//! let dom = MemoryDom::new();
//! let list = dom.create_element("ul");
//!
//! let mut observer = CallbackObserver::init(&dom.host(), list, CallbackOptions::new())?;
//! observer.insert(".item", Reaction::infallible(|node: &NodeId| println!("added {node}")))?;
//!
//! let item = dom.create_element("li");
//! dom.add_class(item, "item")?;
//! dom.append_child(list, item)?;
//! dom.flush();
//!
//! observer.destroy()?;
//! # Ok::<(), nodewatch::WatchError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod config;
pub mod error;
pub mod mutation;
pub mod selector;

// Engine
pub mod attach;
pub mod host;
pub mod watch;

// Hosts
pub mod memory;
#[cfg(feature = "web")]
pub mod web;

// Re-export primary types at crate root for convenience
pub use attach::{
    Attachable, Attachments, CallbackAttachments, CallbackCommand, EventAttachments, EventCommand,
};
pub use config::{ObserveConfig, WatchConfig};
pub use error::{
    ConfigError, DomError, LifecycleError, MatchError, ReactionError, WatchError, WatchResult,
};
pub use host::{Delivery, Host, LogNotifier, Matcher, MutationFeed, Notifier};
pub use mutation::{Direction, MutationBatch, MutationKind, MutationRecord};
pub use selector::{IntoSelector, Selector};
pub use watch::{
    CallbackObserver, CallbackOptions, DispatchReport, EventObserver, EventOptions, Notification,
    NotificationKind, Reaction, ReactionFailure, WatchId,
};
