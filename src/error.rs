//! Error types for nodewatch.
//!
//! All errors are strongly typed using thiserror, layered the same way at every
//! boundary: each concern has its own enum and they fold into [`WatchError`].

use thiserror::Error;

use crate::watch::WatchId;

/// Errors raised while configuring an observer or attaching it to a target.
///
/// These are fatal to the attach attempt and surface immediately.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Selector cannot be empty")]
    EmptySelector,

    #[error("Mutation observation is unavailable: {reason}")]
    Unsupported {
        reason: String,
    },

    #[error("Observe config must watch child list changes")]
    ChildListDisabled,

    #[error("Target cannot be observed: {reason}")]
    InvalidTarget {
        reason: String,
    },

    #[error("Invalid options: {reason}")]
    InvalidOptions {
        reason: String,
    },
}

/// Errors about the observer lifecycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Observer {watch_id} has been destroyed")]
    Destroyed {
        watch_id: WatchId,
    },
}

/// Errors produced by a [`Matcher`](crate::host::Matcher).
///
/// The dispatcher treats every one of these as "no match".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector {
        selector: String,
        reason: String,
    },

    #[error("Unsupported selector '{selector}': {reason}")]
    Unsupported {
        selector: String,
        reason: String,
    },

    #[error("Unknown node: {node}")]
    UnknownNode {
        node: String,
    },
}

/// Failure returned by a user supplied reaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ReactionError {
    message: String,
}

impl ReactionError {
    /// Creates a reaction error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Captures the display form of any error.
    #[must_use]
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self::new(err.to_string())
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors from tree edits on the in-memory host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("Node not found: {0}")]
    UnknownNode(String),

    #[error("Node {0} is not an element")]
    NotAnElement(String),

    #[error("Node {0} has no character data")]
    NotCharacterData(String),

    #[error("Node {child} is not a child of {parent}")]
    NotAChild {
        parent: String,
        child: String,
    },

    #[error("Inserting {child} into {parent} would create a cycle")]
    HierarchyRequest {
        parent: String,
        child: String,
    },
}

/// Top-level error type for nodewatch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Match error: {0}")]
    Match(#[from] MatchError),

    #[error("Reaction failed: {0}")]
    Reaction(#[from] ReactionError),

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),
}

impl WatchError {
    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if the observer was already destroyed.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        matches!(self, Self::Lifecycle(LifecycleError::Destroyed { .. }))
    }

    /// Returns true if this is a DOM edit error.
    #[must_use]
    pub const fn is_dom(&self) -> bool {
        matches!(self, Self::Dom(_))
    }
}

/// Result type alias for nodewatch operations.
pub type WatchResult<T> = Result<T, WatchError>;
