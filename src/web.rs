//! Browser host bound through `web-sys`.
//!
//! [`WebFeed`] wraps one `MutationObserver` per subscription, [`WebMatcher`]
//! delegates to `Element.matches`, and [`WebNotifier`] dispatches bubbling
//! `CustomEvent`s named `nodeInserted` / `nodeRemoved` whose `detail` is the
//! affected node.

use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Once;

use js_sys::{Array, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CustomEvent, CustomEventInit, Element, MutationObserver, MutationObserverInit, Node};

use crate::config::ObserveConfig;
use crate::error::{ConfigError, MatchError};
use crate::host::{Delivery, Host, Matcher, MutationFeed, Notifier};
use crate::mutation::{MutationBatch, MutationKind, MutationRecord};
use crate::selector::Selector;
use crate::watch::{Notification, ReactionFailure};

const KEY_PROPERTY: &str = "__nodewatchKey";

thread_local! {
    static NEXT_KEY: Cell<u32> = const { Cell::new(0) };
}

/// An element used as an attachment target.
///
/// Identity is a key stored on the element itself, so two handles to the
/// same element compare equal.
#[derive(Clone)]
pub struct WebTarget {
    element: Element,
    key: u32,
}

impl WebTarget {
    /// Wraps `element`, assigning it a key on first use.
    pub fn new(element: Element) -> Self {
        let existing = Reflect::get(&element, &JsValue::from_str(KEY_PROPERTY))
            .ok()
            .and_then(|v| v.as_f64());
        let key = match existing {
            Some(key) => key as u32,
            None => {
                let key = NEXT_KEY.with(|next| {
                    let key = next.get() + 1;
                    next.set(key);
                    key
                });
                if Reflect::set(&element, &JsValue::from_str(KEY_PROPERTY), &JsValue::from(key)).is_err() {
                    tracing::warn!(key, "could not store target key on element");
                }
                key
            }
        };
        Self { element, key }
    }

    /// The wrapped element.
    #[must_use]
    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl PartialEq for WebTarget {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for WebTarget {}

impl Hash for WebTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for WebTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebTarget")
            .field("tag", &self.element.tag_name())
            .field("key", &self.key)
            .finish()
    }
}

/// A live `MutationObserver` and the closure it calls.
pub struct WebSubscription {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl fmt::Debug for WebSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSubscription").finish_non_exhaustive()
    }
}

fn node_list(list: &web_sys::NodeList) -> Vec<Node> {
    (0..list.length()).filter_map(|i| list.item(i)).collect()
}

fn convert(record: &web_sys::MutationRecord) -> Option<MutationRecord<Node>> {
    match MutationKind::parse(&record.type_())? {
        MutationKind::ChildList => Some(MutationRecord::child_list(
            node_list(&record.added_nodes()),
            node_list(&record.removed_nodes()),
        )),
        MutationKind::Attributes => Some(MutationRecord::attributes()),
        MutationKind::CharacterData => Some(MutationRecord::character_data()),
    }
}

/// Mutation feed backed by the browser's `MutationObserver`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebFeed;

impl WebFeed {
    /// Host wired to the browser: `MutationObserver`, `Element.matches`
    /// and `CustomEvent` notifications.
    #[must_use]
    pub fn host() -> Host<Self> {
        Host::new(Rc::new(Self), Rc::new(WebMatcher)).with_notifier(Rc::new(WebNotifier))
    }
}

impl MutationFeed for WebFeed {
    type Node = Node;
    type Target = WebTarget;
    type Subscription = WebSubscription;

    fn subscribe(
        &self,
        target: &WebTarget,
        config: &ObserveConfig,
        mut delivery: Delivery<Node>,
    ) -> Result<WebSubscription, ConfigError> {
        config.validate()?;

        let callback = Closure::<dyn FnMut(Array, MutationObserver)>::new(
            move |records: Array, _observer: MutationObserver| {
                let batch: MutationBatch<Node> = records
                    .iter()
                    .filter_map(|r| convert(r.unchecked_ref::<web_sys::MutationRecord>()))
                    .collect();
                delivery(batch);
            },
        );

        let observer = MutationObserver::new(callback.as_ref().unchecked_ref()).map_err(|e| {
            ConfigError::Unsupported {
                reason: format!("MutationObserver unavailable: {e:?}"),
            }
        })?;

        let init = MutationObserverInit::new();
        init.set_attributes(config.attributes);
        init.set_child_list(config.child_list);
        init.set_character_data(config.character_data);
        observer
            .observe_with_options(target.element(), &init)
            .map_err(|e| ConfigError::InvalidTarget {
                reason: format!("{e:?}"),
            })?;

        Ok(WebSubscription {
            observer,
            _callback: callback,
        })
    }

    fn unsubscribe(&self, subscription: WebSubscription) {
        subscription.observer.disconnect();
    }

    fn report_failure(&self, failure: &ReactionFailure) {
        tracing::error!(
            watch_id = %failure.watch_id,
            selector = %failure.selector,
            direction = %failure.direction,
            error = %failure.error,
            "reaction failed"
        );
        web_sys::console::error_1(&JsValue::from_str(&format!(
            "nodewatch: {} reaction for '{}' failed: {}",
            failure.direction, failure.selector, failure.error
        )));
    }
}

/// Matcher delegating to `Element.matches`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebMatcher;

impl Matcher<Node> for WebMatcher {
    fn matches(&self, node: &Node, selector: &Selector) -> Result<bool, MatchError> {
        let Some(element) = node.dyn_ref::<Element>() else {
            return Ok(false);
        };
        element
            .matches(selector.as_str())
            .map_err(|e| MatchError::InvalidSelector {
                selector: selector.to_string(),
                reason: format!("{e:?}"),
            })
    }

    /// Asks the document to parse the selector. Without a document there is
    /// nothing to check against, so the selector is accepted.
    fn validate(&self, selector: &Selector) -> Result<(), MatchError> {
        let Some(document) = web_sys::window().and_then(|window| window.document()) else {
            return Ok(());
        };
        document
            .query_selector(selector.as_str())
            .map(|_| ())
            .map_err(|e| MatchError::InvalidSelector {
                selector: selector.to_string(),
                reason: format!("{e:?}"),
            })
    }
}

/// Notifier dispatching bubbling `CustomEvent`s on the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebNotifier;

impl Notifier<WebTarget, Node> for WebNotifier {
    fn notify(&self, notification: Notification<WebTarget, Node>) {
        let init = CustomEventInit::new();
        init.set_bubbles(true);
        init.set_detail(&notification.node);

        let name = notification.kind.event_name();
        let dispatched = CustomEvent::new_with_event_init_dict(name, &init)
            .and_then(|event| notification.target.element().dispatch_event(&event));
        if let Err(err) = dispatched {
            tracing::warn!(
                watch_id = %notification.watch_id,
                event = name,
                error = ?err,
                "failed to dispatch notification"
            );
        }
    }
}

/// Routes `tracing` output to the browser console. Safe to call repeatedly.
pub fn install_tracing() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        tracing_wasm::set_as_global_default_with_config(
            tracing_wasm::WASMLayerConfigBuilder::default()
                .set_max_level(tracing::Level::DEBUG)
                .build(),
        );
    });
}
