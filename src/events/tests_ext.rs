use std::sync::Arc;

use parking_lot::Mutex;

use super::topics::{ForceRefresh, RefreshUi, StatusChanged};
use super::{ChangeNotifier, RefreshUiEvent, StatusChangedEvent, Topic};

fn status_event(path: &str) -> StatusChangedEvent {
    StatusChangedEvent {
        path: path.to_string(),
        statuses: vec!["active".to_string()],
    }
}

#[test]
fn topic_strings_cover_every_variant() {
    let names = Topic::ALL
        .iter()
        .map(|topic| topic.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names.len(), 9);
    assert!(names.contains(&"plugin-settings-changed"));
    assert!(names.contains(&"batch-update-complete"));
}

#[test]
fn delivers_in_subscription_order() {
    let notifier = ChangeNotifier::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for id in ["first", "second", "third"] {
        let seen = Arc::clone(&seen);
        notifier.subscribe::<StatusChanged, _>(id, move |_| seen.lock().push(id));
    }

    let delivered = notifier.publish::<StatusChanged>(status_event("a.md"));
    assert_eq!(delivered, 3);
    assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
}

#[test]
fn resubscribing_same_id_replaces_callback() {
    let notifier = ChangeNotifier::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&seen);
    notifier.subscribe::<StatusChanged, _>("explorer", move |_| first.lock().push("old"));
    let second = Arc::clone(&seen);
    notifier.subscribe::<StatusChanged, _>("explorer", move |_| second.lock().push("new"));

    notifier.publish::<StatusChanged>(status_event("a.md"));
    assert_eq!(*seen.lock(), vec!["new"]);
    assert_eq!(notifier.subscriber_count(Topic::StatusChanged), 1);
}

#[test]
fn same_id_on_different_topics_is_independent() {
    let notifier = ChangeNotifier::new();
    notifier.subscribe::<StatusChanged, _>("toolbar", |_| {});
    notifier.subscribe::<ForceRefresh, _>("toolbar", |_| {});

    assert!(notifier.unsubscribe(Topic::StatusChanged, "toolbar"));
    assert!(!notifier.is_subscribed(Topic::StatusChanged, "toolbar"));
    assert!(notifier.is_subscribed(Topic::ForceRefresh, "toolbar"));
}

#[test]
fn subscription_handle_unsubscribes() {
    let notifier = ChangeNotifier::new();
    let count = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&count);
    let subscription =
        notifier.subscribe::<ForceRefresh, _>("pane", move |_| *counter.lock() += 1);
    assert_eq!(subscription.topic(), Topic::ForceRefresh);
    assert_eq!(subscription.subscriber_id(), "pane");

    notifier.publish::<ForceRefresh>(());
    assert!(subscription.unsubscribe());
    notifier.publish::<ForceRefresh>(());
    assert_eq!(*count.lock(), 1);
}

#[test]
fn reentrant_publish_does_not_deadlock() {
    let notifier = ChangeNotifier::new();
    let refreshes = Arc::new(Mutex::new(Vec::new()));

    let inner = Arc::clone(&notifier);
    notifier.subscribe::<StatusChanged, _>("bridge", move |envelope| {
        inner.publish::<RefreshUi>(RefreshUiEvent {
            reason: envelope.payload.path.clone(),
        });
    });
    let sink = Arc::clone(&refreshes);
    notifier.subscribe::<RefreshUi, _>("status-bar", move |envelope| {
        sink.lock().push(envelope.payload.reason.clone());
    });

    notifier.publish::<StatusChanged>(status_event("notes/a.md"));
    assert_eq!(*refreshes.lock(), vec!["notes/a.md".to_string()]);
}

#[test]
fn subscribing_from_inside_callback_is_allowed() {
    let notifier = ChangeNotifier::new();
    let inner = Arc::clone(&notifier);
    notifier.subscribe::<ForceRefresh, _>("late-binder", move |_| {
        inner.subscribe::<ForceRefresh, _>("late", |_| {});
    });

    assert_eq!(notifier.publish::<ForceRefresh>(()), 1);
    assert_eq!(notifier.publish::<ForceRefresh>(()), 2);
}

#[test]
fn every_delivery_carries_fresh_metadata() {
    let notifier = ChangeNotifier::new();
    let ids = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&ids);
    notifier.subscribe::<StatusChanged, _>("audit", move |envelope| {
        assert!(!envelope.meta.occurred_at.is_empty());
        sink.lock().push(envelope.meta.event_id.clone());
    });

    notifier.publish::<StatusChanged>(status_event("a.md"));
    notifier.publish::<StatusChanged>(status_event("b.md"));
    let ids = ids.lock();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn publishing_without_subscribers_delivers_nothing() {
    let notifier = ChangeNotifier::new();
    assert_eq!(notifier.publish::<ForceRefresh>(()), 0);
    assert!(!notifier.unsubscribe(Topic::ForceRefresh, "nobody"));
}
