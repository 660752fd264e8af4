use super::{
    ActiveFileChangedEvent, BatchUpdateCompleteEvent, EventTopic, FileChangedEvent,
    ModalRequestedEvent, RefreshUiEvent, SettingsChangedEvent, StatusChangedEvent, Topic,
};

pub struct FileChanged;
pub struct ActiveFileChanged;
pub struct LayoutChanged;
pub struct StatusChanged;
pub struct SettingsChanged;
pub struct RefreshUi;
pub struct BatchUpdateComplete;
pub struct ForceRefresh;
pub struct ModalRequested;

impl EventTopic for FileChanged {
    const TOPIC: Topic = Topic::FileChanged;
    type Payload = FileChangedEvent;
}

impl EventTopic for ActiveFileChanged {
    const TOPIC: Topic = Topic::ActiveFileChanged;
    type Payload = ActiveFileChangedEvent;
}

impl EventTopic for LayoutChanged {
    const TOPIC: Topic = Topic::LayoutChanged;
    type Payload = ();
}

impl EventTopic for StatusChanged {
    const TOPIC: Topic = Topic::StatusChanged;
    type Payload = StatusChangedEvent;
}

impl EventTopic for SettingsChanged {
    const TOPIC: Topic = Topic::SettingsChanged;
    type Payload = SettingsChangedEvent;
}

impl EventTopic for RefreshUi {
    const TOPIC: Topic = Topic::RefreshUi;
    type Payload = RefreshUiEvent;
}

impl EventTopic for BatchUpdateComplete {
    const TOPIC: Topic = Topic::BatchUpdateComplete;
    type Payload = BatchUpdateCompleteEvent;
}

impl EventTopic for ForceRefresh {
    const TOPIC: Topic = Topic::ForceRefresh;
    type Payload = ();
}

impl EventTopic for ModalRequested {
    const TOPIC: Topic = Topic::ModalRequested;
    type Payload = ModalRequestedEvent;
}
