//! Process-wide publish/subscribe hub.
//!
//! Topics form a closed set. Each topic is bound to exactly one payload type
//! through a marker type implementing [`EventTopic`], so publishing the wrong
//! payload for a topic does not compile.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::mutator::Operation;
use crate::settings::{SettingKey, SettingValue, Settings};

pub mod topics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Topic {
    FileChanged,
    ActiveFileChanged,
    LayoutChanged,
    StatusChanged,
    SettingsChanged,
    RefreshUi,
    BatchUpdateComplete,
    ForceRefresh,
    ModalRequested,
}

impl Topic {
    pub const ALL: [Topic; 9] = [
        Topic::FileChanged,
        Topic::ActiveFileChanged,
        Topic::LayoutChanged,
        Topic::StatusChanged,
        Topic::SettingsChanged,
        Topic::RefreshUi,
        Topic::BatchUpdateComplete,
        Topic::ForceRefresh,
        Topic::ModalRequested,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::FileChanged => "file-changed",
            Topic::ActiveFileChanged => "active-file-changed",
            Topic::LayoutChanged => "layout-changed",
            Topic::StatusChanged => "status-changed",
            Topic::SettingsChanged => "plugin-settings-changed",
            Topic::RefreshUi => "refresh-ui",
            Topic::BatchUpdateComplete => "batch-update-complete",
            Topic::ForceRefresh => "force-refresh",
            Topic::ModalRequested => "modal-requested",
        }
    }
}

/// Binds a topic to its payload type.
pub trait EventTopic: 'static {
    const TOPIC: Topic;
    type Payload: Send + Sync + 'static;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileChangedEvent {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActiveFileChangedEvent {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusChangedEvent {
    pub path: String,
    pub statuses: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SettingsChangedEvent {
    pub key: SettingKey,
    pub value: SettingValue,
    pub snapshot: Arc<Settings>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RefreshUiEvent {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BatchUpdateCompleteEvent {
    pub statuses: Vec<String>,
    pub file_count: usize,
    pub mode: Operation,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ModalKind {
    StatusSelector,
    GroupedView,
    Dashboard,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModalRequestedEvent {
    pub modal: ModalKind,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EventMeta {
    pub event_id: String,
    pub occurred_at: String,
}

impl EventMeta {
    pub fn new() -> Self {
        Self {
            event_id: new_event_id(),
            occurred_at: now_utc_rfc3339(),
        }
    }
}

impl Default for EventMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// One delivery of a payload.
#[derive(Debug, Clone)]
pub struct Envelope<P> {
    pub meta: EventMeta,
    pub payload: P,
}

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct Registration {
    subscriber_id: String,
    callback: Callback,
}

#[derive(Default)]
pub struct ChangeNotifier {
    registrations: Mutex<HashMap<Topic, Vec<Registration>>>,
}

impl ChangeNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `callback` for topic `T` under `subscriber_id`.
    ///
    /// Re-registering an existing `(topic, subscriber_id)` pair replaces the
    /// previous callback in place and keeps its delivery slot.
    pub fn subscribe<T, F>(self: &Arc<Self>, subscriber_id: impl Into<String>, callback: F) -> Subscription
    where
        T: EventTopic,
        F: Fn(&Envelope<T::Payload>) + Send + Sync + 'static,
    {
        let subscriber_id = subscriber_id.into();
        let callback: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(envelope) = any.downcast_ref::<Envelope<T::Payload>>() {
                callback(envelope);
            }
        });

        let mut registrations = self.registrations.lock();
        let slots = registrations.entry(T::TOPIC).or_default();
        match slots
            .iter_mut()
            .find(|slot| slot.subscriber_id == subscriber_id)
        {
            Some(slot) => {
                tracing::debug!(topic = T::TOPIC.as_str(), subscriber = %subscriber_id, "replacing subscription");
                slot.callback = callback;
            }
            None => slots.push(Registration {
                subscriber_id: subscriber_id.clone(),
                callback,
            }),
        }

        Subscription {
            topic: T::TOPIC,
            subscriber_id,
            notifier: Arc::downgrade(self),
        }
    }

    pub fn unsubscribe(&self, topic: Topic, subscriber_id: &str) -> bool {
        let mut registrations = self.registrations.lock();
        let Some(slots) = registrations.get_mut(&topic) else {
            return false;
        };
        let before = slots.len();
        slots.retain(|slot| slot.subscriber_id != subscriber_id);
        before != slots.len()
    }

    /// Delivers `payload` to every subscriber of `T` in subscription order and
    /// returns the number of callbacks invoked.
    ///
    /// No lock is held while callbacks run, so a callback may publish again.
    pub fn publish<T: EventTopic>(&self, payload: T::Payload) -> usize {
        let callbacks = {
            let registrations = self.registrations.lock();
            registrations
                .get(&T::TOPIC)
                .map(|slots| {
                    slots
                        .iter()
                        .map(|slot| Arc::clone(&slot.callback))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };

        let envelope = Envelope {
            meta: EventMeta::new(),
            payload,
        };
        tracing::trace!(
            topic = T::TOPIC.as_str(),
            event_id = %envelope.meta.event_id,
            subscribers = callbacks.len(),
            "publish"
        );
        for callback in &callbacks {
            callback(&envelope);
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registrations
            .lock()
            .get(&topic)
            .map_or(0, Vec::len)
    }

    pub fn is_subscribed(&self, topic: Topic, subscriber_id: &str) -> bool {
        self.registrations
            .lock()
            .get(&topic)
            .is_some_and(|slots| slots.iter().any(|slot| slot.subscriber_id == subscriber_id))
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`]. Dropping it keeps the
/// registration alive; call [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    topic: Topic,
    subscriber_id: String,
    notifier: Weak<ChangeNotifier>,
}

impl Subscription {
    #[cfg(test)]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    #[cfg(test)]
    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    pub fn unsubscribe(self) -> bool {
        match self.notifier.upgrade() {
            Some(notifier) => notifier.unsubscribe(self.topic, &self.subscriber_id),
            None => false,
        }
    }
}

pub fn new_event_id() -> String {
    Uuid::now_v7().to_string()
}

pub fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "tests_ext.rs"]
mod tests_ext;
