use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use nodewatch::memory::{MemoryDom, NodeId};
use nodewatch::{
    CallbackObserver, CallbackOptions, ConfigError, Direction, MatchError, ObserveConfig, Reaction,
    ReactionError, Selector, WatchConfig, WatchError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn recorder(log: &Rc<RefCell<Vec<(&'static str, NodeId)>>>, tag: &'static str) -> Reaction<NodeId> {
    let log = Rc::clone(log);
    Reaction::infallible(move |node: &NodeId| log.borrow_mut().push((tag, *node)))
}

fn item(dom: &MemoryDom, class: &str) -> NodeId {
    let li = dom.create_element("li");
    dom.add_class(li, class).unwrap();
    li
}

#[test]
fn insert_trigger_fires_for_matching_nodes_only() {
    init_tracing();
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut observer = CallbackObserver::init(&dom.host(), list, CallbackOptions::new()).unwrap();
    assert!(observer.insert(".item", recorder(&log, "item")).unwrap());

    let a = item(&dom, "item");
    let b = item(&dom, "other");
    let text = dom.create_text("item");
    dom.append_all(list, &[a, b, text]).unwrap();
    assert_eq!(dom.flush(), 1);

    assert_eq!(*log.borrow(), vec![("item", a)]);
}

#[test]
fn remove_trigger_fires_on_removal() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let a = item(&dom, "item");
    dom.append_child(list, a).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    let options = CallbackOptions::new()
        .on_insert(".item", recorder(&log, "in"))
        .on_remove(".item", recorder(&log, "out"));
    let _observer = CallbackObserver::init(&dom.host(), list, options).unwrap();

    dom.remove_child(list, a).unwrap();
    dom.flush();
    assert_eq!(*log.borrow(), vec![("out", a)]);
}

#[test]
fn registration_is_idempotent_and_first_wins() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut observer = CallbackObserver::init(&dom.host(), list, CallbackOptions::new()).unwrap();
    let first = recorder(&log, "first");
    assert!(observer.insert(".item", first.clone()).unwrap());
    assert!(!observer.insert(".item", recorder(&log, "second")).unwrap());
    assert!(!observer.insert("  .item ", recorder(&log, "third")).unwrap());
    assert_eq!(observer.insert_triggers().len(), 1);

    let selector = Selector::parse(".item").unwrap();
    assert!(observer.insert_reaction(&selector).unwrap().ptr_eq(&first));

    let a = item(&dom, "item");
    dom.append_child(list, a).unwrap();
    dom.flush();
    assert_eq!(*log.borrow(), vec![("first", a)]);

    assert!(observer.forget_insert(".item").unwrap());
    assert!(!observer.forget_insert(".item").unwrap());
    assert!(!observer.forget_remove(".never").unwrap());
}

#[test]
fn every_matching_selector_fires_in_registration_order() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let log = Rc::new(RefCell::new(Vec::new()));

    let options = CallbackOptions::new()
        .on_insert("li", recorder(&log, "li"))
        .on_insert(".item", recorder(&log, "item"));
    let _observer = CallbackObserver::init(&dom.host(), list, options).unwrap();

    let a = item(&dom, "item");
    dom.append_child(list, a).unwrap();
    dom.flush();
    assert_eq!(*log.borrow(), vec![("li", a), ("item", a)]);
}

#[test]
fn repeated_moves_in_one_batch_fire_each_time() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let log = Rc::new(RefCell::new(Vec::new()));

    let options = CallbackOptions::new()
        .on_insert(".item", recorder(&log, "in"))
        .on_remove(".item", recorder(&log, "out"));
    let _observer = CallbackObserver::init(&dom.host(), list, options).unwrap();

    let a = item(&dom, "item");
    dom.append_child(list, a).unwrap();
    dom.remove_child(list, a).unwrap();
    dom.append_child(list, a).unwrap();
    assert_eq!(dom.flush(), 1);
    assert_eq!(*log.borrow(), vec![("in", a), ("out", a), ("in", a)]);
}

#[test]
fn added_nodes_fire_before_removed_nodes_of_a_record() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let old = item(&dom, "item");
    dom.append_child(list, old).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    let options = CallbackOptions::new()
        .on_insert(".item", recorder(&log, "in"))
        .on_remove(".item", recorder(&log, "out"));
    let _observer = CallbackObserver::init(&dom.host(), list, options).unwrap();

    let new = item(&dom, "item");
    dom.replace_children(list, &[new]).unwrap();
    dom.flush();
    assert_eq!(*log.borrow(), vec![("in", new), ("out", old)]);
}

#[test]
fn attribute_and_text_changes_are_ignored() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let text = dom.create_text("a");
    dom.append_child(list, text).unwrap();
    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);

    let options = CallbackOptions::new().on_insert(
        "*",
        Reaction::infallible(move |_: &NodeId| counter.set(counter.get() + 1)),
    );
    let _observer = CallbackObserver::init(&dom.host(), list, options).unwrap();

    dom.set_attribute(list, "class", "item").unwrap();
    dom.set_text(text, "b").unwrap();
    dom.flush();
    assert_eq!(hits.get(), 0);
}

#[test]
fn failing_reaction_is_reported_and_siblings_still_run() {
    init_tracing();
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let log = Rc::new(RefCell::new(Vec::new()));

    let options = CallbackOptions::new()
        .on_insert(".item", Reaction::new(|_: &NodeId| Err(ReactionError::new("boom"))))
        .on_insert("li", recorder(&log, "li"));
    let observer = CallbackObserver::init(&dom.host(), list, options).unwrap();

    let a = item(&dom, "item");
    let b = item(&dom, "item");
    dom.append_all(list, &[a, b]).unwrap();
    dom.flush();

    assert_eq!(*log.borrow(), vec![("li", a), ("li", b)]);
    let failures = dom.uncaught_failures();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].watch_id, observer.id());
    assert_eq!(failures[0].direction, Direction::Inserted);
    assert_eq!(failures[0].selector.as_str(), ".item");
    assert_eq!(failures[0].error.message(), "boom");
}

#[test]
fn unsupported_selector_is_rejected_at_registration() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let log = Rc::new(RefCell::new(Vec::new()));

    let options = CallbackOptions::new()
        .on_insert("ul li", recorder(&log, "descendant"))
        .on_insert("li", recorder(&log, "li"));
    let err = CallbackObserver::init(&dom.host(), list, options).unwrap_err();
    assert!(matches!(err, WatchError::Match(MatchError::Unsupported { .. })));
    assert_eq!(dom.subscription_count(), 0);

    let mut observer = CallbackObserver::init(
        &dom.host(),
        list,
        CallbackOptions::new().on_insert("li", recorder(&log, "li")),
    )
    .unwrap();
    let err = observer
        .insert("li:first-child", recorder(&log, "first"))
        .unwrap_err();
    assert!(matches!(err, WatchError::Match(MatchError::Unsupported { .. })));
    let err = observer.remove("li..x", recorder(&log, "bad")).unwrap_err();
    assert!(matches!(err, WatchError::Match(MatchError::InvalidSelector { .. })));
    assert_eq!(observer.insert_triggers().len(), 1);
    assert!(observer.remove_triggers().is_empty());

    let a = item(&dom, "item");
    dom.append_child(list, a).unwrap();
    dom.flush();
    assert_eq!(*log.borrow(), vec![("li", a)]);
    assert!(dom.uncaught_failures().is_empty());
}

#[test]
fn panicking_reaction_does_not_wedge_the_document() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut observer = CallbackObserver::init(
        &dom.host(),
        list,
        CallbackOptions::new()
            .on_insert(".boom", Reaction::infallible(|_: &NodeId| panic!("reaction blew up")))
            .on_insert(".ok", recorder(&log, "ok")),
    )
    .unwrap();

    dom.append_child(list, item(&dom, "boom")).unwrap();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| dom.flush()));
    assert!(outcome.is_err());

    observer.forget_insert(".boom").unwrap();
    let ok = item(&dom, "ok");
    dom.append_child(list, ok).unwrap();
    assert_eq!(dom.flush(), 1);
    assert_eq!(*log.borrow(), vec![("ok", ok)]);
}

#[test]
fn destroy_is_terminal() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut observer = CallbackObserver::init(
        &dom.host(),
        list,
        CallbackOptions::new().on_insert(".item", recorder(&log, "item")),
    )
    .unwrap();
    let subscription = dom.subscriptions_for(list)[0];

    // Queued before destroy, never delivered.
    dom.append_child(list, item(&dom, "item")).unwrap();
    observer.destroy().unwrap();
    assert!(!observer.is_active());
    assert_eq!(dom.cancellations(subscription), 1);
    assert_eq!(dom.flush(), 0);
    assert!(log.borrow().is_empty());

    let err = observer.destroy().unwrap_err();
    assert!(err.is_destroyed());
    assert!(observer.insert(".x", recorder(&log, "x")).unwrap_err().is_destroyed());
    assert!(observer.forget_remove(".x").unwrap_err().is_destroyed());
    assert_eq!(dom.cancellations(subscription), 1);

    drop(observer);
    assert_eq!(dom.cancellations(subscription), 1);
}

#[test]
fn dropping_an_active_observer_unsubscribes() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let observer = CallbackObserver::init(&dom.host(), list, CallbackOptions::new()).unwrap();
    let subscription = dom.subscriptions_for(list)[0];
    assert_eq!(dom.subscription_count(), 1);

    drop(observer);
    assert_eq!(dom.subscription_count(), 0);
    assert_eq!(dom.cancellations(subscription), 1);
}

#[test]
fn reaction_can_register_triggers_on_its_own_observer() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let log = Rc::new(RefCell::new(Vec::new()));

    let observer = Rc::new(RefCell::new(
        CallbackObserver::init(&dom.host(), list, CallbackOptions::new()).unwrap(),
    ));
    let handle: Weak<RefCell<CallbackObserver<MemoryDom>>> = Rc::downgrade(&observer);
    let late = recorder(&log, "second");
    observer
        .borrow_mut()
        .insert(
            ".first",
            Reaction::infallible(move |_: &NodeId| {
                if let Some(observer) = handle.upgrade() {
                    observer.borrow_mut().insert(".second", late.clone()).unwrap();
                }
            }),
        )
        .unwrap();

    let first = item(&dom, "first");
    let second = item(&dom, "second");
    dom.append_all(list, &[first, second]).unwrap();
    dom.flush();
    assert_eq!(*log.borrow(), vec![("second", second)]);
}

#[test]
fn reaction_edits_are_delivered_in_a_later_round() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let log = Rc::new(RefCell::new(Vec::new()));

    let weak_dom = Rc::downgrade(&dom);
    let options = CallbackOptions::new()
        .on_insert(
            ".seed",
            Reaction::infallible(move |_: &NodeId| {
                if let Some(dom) = weak_dom.upgrade() {
                    let grown = item(&dom, "grown");
                    dom.append_child(list, grown).unwrap();
                    assert_eq!(dom.flush(), 0);
                }
            }),
        )
        .on_insert(".grown", recorder(&log, "grown"));
    let _observer = CallbackObserver::init(&dom.host(), list, options).unwrap();

    dom.append_child(list, item(&dom, "seed")).unwrap();
    assert_eq!(dom.flush(), 2);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn configuration_errors_surface_at_init() {
    let dom = MemoryDom::without_observation();
    let list = dom.create_element("ul");
    let err = CallbackObserver::init(&dom.host(), list, CallbackOptions::new()).unwrap_err();
    assert!(err.is_config());
    assert!(matches!(err, WatchError::Config(ConfigError::Unsupported { .. })));

    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let host = dom.host().with_config(WatchConfig {
        observe: ObserveConfig {
            child_list: false,
            ..ObserveConfig::default()
        },
        ..WatchConfig::default()
    });
    let err = CallbackObserver::init(&host, list, CallbackOptions::new()).unwrap_err();
    assert_eq!(err, WatchError::Config(ConfigError::ChildListDisabled));
    assert_eq!(dom.subscription_count(), 0);

    let options = CallbackOptions::new().on_insert("   ", Reaction::infallible(|_: &NodeId| {}));
    let err = CallbackObserver::init(&dom.host(), list, options).unwrap_err();
    assert_eq!(err, WatchError::Config(ConfigError::EmptySelector));

    let mut observer = CallbackObserver::init(&dom.host(), list, CallbackOptions::new()).unwrap();
    let err = observer
        .insert("", Reaction::infallible(|_: &NodeId| {}))
        .unwrap_err();
    assert!(err.is_config());
}
