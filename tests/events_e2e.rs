use std::rc::Rc;

use nodewatch::memory::{MemoryDom, NodeId, NotificationStream};
use nodewatch::{
    ConfigError, EventObserver, EventOptions, Host, MatchError, Notifier, NotificationKind, Selector,
    WatchError,
};

fn host_with_stream(dom: &Rc<MemoryDom>) -> (Host<MemoryDom>, Rc<NotificationStream<NodeId, NodeId>>) {
    let stream = Rc::new(NotificationStream::new(64));
    let host = dom
        .host()
        .with_notifier(Rc::clone(&stream) as Rc<dyn Notifier<NodeId, NodeId>>);
    (host, stream)
}

fn summary(stream: &NotificationStream<NodeId, NodeId>) -> Vec<(NotificationKind, NodeId, Option<String>)> {
    stream
        .drain()
        .into_iter()
        .map(|n| (n.kind, n.node, n.selector.map(|s| s.to_string())))
        .collect()
}

#[test]
fn empty_trigger_set_matches_every_node() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let (host, stream) = host_with_stream(&dom);
    let observer = EventObserver::init(&host, list, EventOptions::new()).unwrap();

    let li = dom.create_element("li");
    let text = dom.create_text("hello");
    let comment = dom.create_comment("note");
    dom.append_all(list, &[li, text, comment]).unwrap();
    dom.remove_child(list, text).unwrap();
    dom.flush();

    assert_eq!(
        summary(&stream),
        vec![
            (NotificationKind::NodeInserted, li, None),
            (NotificationKind::NodeInserted, text, None),
            (NotificationKind::NodeInserted, comment, None),
            (NotificationKind::NodeRemoved, text, None),
        ]
    );
    assert!(observer.triggers().is_empty());
}

#[test]
fn notifications_carry_target_and_observer() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let (host, stream) = host_with_stream(&dom);
    let observer = EventObserver::init(&host, list, EventOptions::new()).unwrap();

    dom.append_child(list, dom.create_element("li")).unwrap();
    dom.flush();

    let note = stream.try_recv().unwrap();
    assert_eq!(note.target, list);
    assert_eq!(note.watch_id, observer.id());
    assert_eq!(note.kind.event_name(), "nodeInserted");
}

#[test]
fn one_notification_per_matching_selector() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let (host, stream) = host_with_stream(&dom);
    let options = EventOptions::new().trigger(".item").trigger("li").trigger(".other");
    let _observer = EventObserver::init(&host, list, options).unwrap();

    let a = dom.create_element("li");
    dom.add_class(a, "item").unwrap();
    let text = dom.create_text("item");
    dom.append_all(list, &[a, text]).unwrap();
    dom.remove_child(list, a).unwrap();
    dom.flush();

    assert_eq!(
        summary(&stream),
        vec![
            (NotificationKind::NodeInserted, a, Some(".item".to_string())),
            (NotificationKind::NodeInserted, a, Some("li".to_string())),
            (NotificationKind::NodeRemoved, a, Some(".item".to_string())),
            (NotificationKind::NodeRemoved, a, Some("li".to_string())),
        ]
    );
}

#[test]
fn add_and_remove_triggers() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let (host, stream) = host_with_stream(&dom);
    let mut observer = EventObserver::init(&host, list, EventOptions::new().trigger(".a")).unwrap();

    assert!(observer.add(".b").unwrap());
    assert!(!observer.add(".b").unwrap());
    assert!(!observer.add(".a").unwrap());
    assert_eq!(
        observer.triggers(),
        vec![Selector::parse(".a").unwrap(), Selector::parse(".b").unwrap()]
    );
    assert!(observer.remove(".a").unwrap());
    assert!(!observer.remove(".a").unwrap());

    let a = dom.create_element("p");
    dom.add_class(a, "a").unwrap();
    let b = dom.create_element("p");
    dom.add_class(b, "b").unwrap();
    dom.append_all(list, &[a, b]).unwrap();
    dom.flush();
    assert_eq!(
        summary(&stream),
        vec![(NotificationKind::NodeInserted, b, Some(".b".to_string()))]
    );

    // Removing the last trigger makes the observer universal again.
    assert!(observer.remove(".b").unwrap());
    dom.remove_child(list, a).unwrap();
    dom.flush();
    assert_eq!(summary(&stream), vec![(NotificationKind::NodeRemoved, a, None)]);
}

#[test]
fn unusable_triggers_are_rejected() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let (host, stream) = host_with_stream(&dom);

    let err = EventObserver::init(&host, list, EventOptions::new().trigger("ul > li")).unwrap_err();
    assert!(matches!(err, WatchError::Match(MatchError::Unsupported { .. })));
    assert_eq!(dom.subscription_count(), 0);

    let mut observer = EventObserver::init(&host, list, EventOptions::new()).unwrap();
    let err = observer.add("li..x").unwrap_err();
    assert!(matches!(err, WatchError::Match(MatchError::InvalidSelector { .. })));
    assert!(observer.triggers().is_empty());

    // Still universal: the rejected trigger never narrowed the set.
    let li = dom.create_element("li");
    dom.append_child(list, li).unwrap();
    dom.flush();
    assert_eq!(summary(&stream), vec![(NotificationKind::NodeInserted, li, None)]);
}

#[test]
fn attribute_changes_raise_nothing() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let (host, stream) = host_with_stream(&dom);
    let _observer = EventObserver::init(&host, list, EventOptions::new()).unwrap();

    dom.set_attribute(list, "data-state", "busy").unwrap();
    assert_eq!(dom.flush(), 1);
    assert!(stream.is_empty());
}

#[test]
fn destroy_stops_notifications() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let (host, stream) = host_with_stream(&dom);
    let mut observer = EventObserver::init(&host, list, EventOptions::new()).unwrap();
    let subscription = dom.subscriptions_for(list)[0];

    observer.destroy().unwrap();
    dom.append_child(list, dom.create_element("li")).unwrap();
    dom.flush();
    assert!(stream.is_empty());
    assert_eq!(dom.cancellations(subscription), 1);

    assert!(observer.destroy().unwrap_err().is_destroyed());
    assert!(observer.add(".x").unwrap_err().is_destroyed());
    assert!(observer.remove(".x").unwrap_err().is_destroyed());
    assert_eq!(dom.cancellations(subscription), 1);
}

#[test]
fn options_from_json() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let (host, stream) = host_with_stream(&dom);
    let options = EventOptions::from_json(r#"{ "triggers": ["li.item"] }"#).unwrap();
    let _observer = EventObserver::init(&host, list, options).unwrap();

    let a = dom.create_element("li");
    dom.add_class(a, "item").unwrap();
    dom.append_child(list, a).unwrap();
    dom.append_child(list, dom.create_element("li")).unwrap();
    dom.flush();
    assert_eq!(
        summary(&stream),
        vec![(NotificationKind::NodeInserted, a, Some("li.item".to_string()))]
    );

    let err = EventObserver::init(&host, list, EventOptions::new().trigger(" ")).unwrap_err();
    assert_eq!(err, WatchError::Config(ConfigError::EmptySelector));
    assert!(EventOptions::from_json("[1, 2]").is_err());
}

#[test]
fn separate_observers_on_one_target_are_independent() {
    let dom = MemoryDom::new();
    let list = dom.create_element("ul");
    let (host, stream) = host_with_stream(&dom);
    let mut first = EventObserver::init(&host, list, EventOptions::new().trigger("li")).unwrap();
    let _second = EventObserver::init(&host, list, EventOptions::new().trigger("li")).unwrap();
    assert_eq!(dom.subscriptions_for(list).len(), 2);

    first.destroy().unwrap();
    dom.append_child(list, dom.create_element("li")).unwrap();
    dom.flush();
    assert_eq!(stream.len(), 1);
}
