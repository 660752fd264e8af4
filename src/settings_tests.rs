use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    FileSettingsStore, MemorySettingsStore, SettingKey, SettingValue, Settings, SettingsError,
    SettingsService, SettingsStore,
};
use crate::domain::status::Status;
use crate::events::topics::SettingsChanged;
use crate::events::ChangeNotifier;

fn unique_vault() -> PathBuf {
    let root = std::env::temp_dir().join(format!("vault-status-settings-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&root).expect("temp vault should be creatable");
    root
}

fn service_with(store: Arc<MemorySettingsStore>) -> (SettingsService, Arc<ChangeNotifier>) {
    let notifier = ChangeNotifier::new();
    let service =
        SettingsService::open(store, Arc::clone(&notifier)).expect("settings should load");
    (service, notifier)
}

#[test]
fn parses_camel_and_snake_case_keys() {
    assert_eq!(
        SettingKey::from_str("tagPrefix").expect("camel key should parse"),
        SettingKey::TagPrefix
    );
    assert_eq!(
        SettingKey::from_str("show_status_icons_in_explorer").expect("snake key should parse"),
        SettingKey::ShowStatusIconsInExplorer
    );
    let err = SettingKey::from_str("colour").expect_err("unknown key should fail");
    assert_eq!(err.to_string(), "unknown setting 'colour'");
}

#[test]
fn every_key_round_trips_through_get_and_apply() {
    let mut settings = Settings::default();
    for key in SettingKey::ALL {
        let value = settings.get(key);
        settings
            .apply(key, value)
            .expect("current value should be re-appliable");
    }
    assert_eq!(settings, Settings::default());
}

#[test]
fn apply_rejects_mismatched_value_types() {
    let mut settings = Settings::default();
    let err = settings
        .apply(SettingKey::CompactView, SettingValue::Text("yes".to_string()))
        .expect_err("text for boolean key should fail");
    assert!(matches!(
        err,
        SettingsError::TypeMismatch {
            key: SettingKey::CompactView,
            expected: "boolean"
        }
    ));
}

#[test]
fn apply_validates_custom_statuses_and_threshold() {
    let mut settings = Settings::default();
    let duplicate = vec![Status::new("Done", "a"), Status::new("done", "b")];
    assert!(settings
        .apply(SettingKey::CustomStatuses, SettingValue::Statuses(duplicate))
        .is_err());
    let reserved = vec![Status::new("unknown", "?")];
    assert!(settings
        .apply(SettingKey::CustomStatuses, SettingValue::Statuses(reserved))
        .is_err());
    assert!(settings
        .apply(SettingKey::BatchRemoveThreshold, SettingValue::Number(1.0))
        .is_err());
    assert!(settings
        .apply(SettingKey::TagPrefix, SettingValue::Text("  ".to_string()))
        .is_err());
}

#[test]
fn parse_value_handles_each_value_shape() {
    assert_eq!(
        SettingKey::StrictStatuses
            .parse_value("on")
            .expect("bool should parse"),
        SettingValue::Bool(true)
    );
    assert_eq!(
        SettingKey::EnabledTemplates
            .parse_value("minimal, academic")
            .expect("list should parse"),
        SettingValue::List(vec!["minimal".to_string(), "academic".to_string()])
    );
    assert_eq!(
        SettingKey::StatusColors
            .parse_value("active=#00ff00")
            .expect("colors should parse"),
        SettingValue::Colors(BTreeMap::from([(
            "active".to_string(),
            "#00ff00".to_string()
        )]))
    );
    assert!(SettingKey::CollapsedStatuses
        .parse_value("active=maybe")
        .is_err());
    assert!(SettingKey::BatchRemoveThreshold.parse_value("half").is_err());
    let statuses = SettingKey::CustomStatuses
        .parse_value(r#"[{"name":"idea","icon":"💡"}]"#)
        .expect("json statuses should parse");
    assert_eq!(
        statuses,
        SettingValue::Statuses(vec![Status::new("idea", "💡")])
    );
}

#[test]
fn status_keys_lists_primary_key_first_without_duplicates() {
    let mut settings = Settings::default();
    settings.extra_status_keys = vec!["state".to_string(), "status".to_string()];
    assert_eq!(settings.status_keys(), vec!["status", "state"]);
}

#[test]
fn on_settings_change_persists_swaps_then_publishes() {
    let store = Arc::new(MemorySettingsStore::default());
    let (service, notifier) = service_with(Arc::clone(&store));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    notifier.subscribe::<SettingsChanged, _>("test", move |envelope| {
        let event = &envelope.payload;
        sink.lock().push((event.key, event.snapshot.tag_prefix.clone()));
    });

    let before = service.snapshot();
    service
        .on_settings_change(SettingKey::TagPrefix, SettingValue::Text("state".to_string()))
        .expect("change should succeed");

    assert_eq!(before.tag_prefix, "status");
    assert_eq!(service.snapshot().tag_prefix, "state");
    assert_eq!(
        store.saved().expect("settings should be saved").tag_prefix,
        "state"
    );
    assert_eq!(
        *seen.lock(),
        vec![(SettingKey::TagPrefix, "state".to_string())]
    );
}

#[test]
fn failed_persist_leaves_snapshot_and_subscribers_untouched() {
    let store = Arc::new(MemorySettingsStore::default());
    let (service, notifier) = service_with(Arc::clone(&store));
    let published = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&published);
    notifier.subscribe::<SettingsChanged, _>("test", move |_| *counter.lock() += 1);

    store.fail_saves(true);
    let result =
        service.on_settings_change(SettingKey::CompactView, SettingValue::Bool(true));
    assert!(matches!(result, Err(SettingsError::Io(_))));
    assert!(!service.snapshot().compact_view);
    assert_eq!(*published.lock(), 0);
}

#[test]
fn backfill_only_fills_missing_colors_and_stays_silent() {
    let store = Arc::new(MemorySettingsStore::default());
    let (service, notifier) = service_with(store);
    let published = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&published);
    notifier.subscribe::<SettingsChanged, _>("test", move |_| *counter.lock() += 1);

    let colors = BTreeMap::from([
        ("active".to_string(), "#123456".to_string()),
        ("idea".to_string(), "#FFEB3B".to_string()),
    ]);
    assert!(service
        .backfill_status_colors(&colors)
        .expect("backfill should succeed"));
    let snapshot = service.snapshot();
    assert_eq!(snapshot.status_colors["active"], "#00ff00");
    assert_eq!(snapshot.status_colors["idea"], "#FFEB3B");
    assert!(!service
        .backfill_status_colors(&colors)
        .expect("second backfill should succeed"));
    assert_eq!(*published.lock(), 0);
}

#[test]
fn file_store_round_trips_and_defaults_when_missing() {
    let root = unique_vault();
    let store = FileSettingsStore::for_vault(&root);
    assert_eq!(
        store.load().expect("missing file should load defaults"),
        Settings::default()
    );

    let mut settings = Settings::default();
    settings.enabled_templates = vec!["minimal".to_string()];
    settings
        .custom_statuses
        .push(Status::new("idea", "💡").with_color("#FFEB3B"));
    store.save(&settings).expect("save should succeed");
    assert!(store.path().ends_with(".vault-status/settings.toml"));
    assert_eq!(store.load().expect("saved file should load"), settings);

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn file_store_reports_invalid_toml() {
    let root = unique_vault();
    let store = FileSettingsStore::for_vault(&root);
    std::fs::create_dir_all(root.join(".vault-status")).expect("dir should be creatable");
    std::fs::write(store.path(), "tagPrefix = [").expect("file should be writable");
    assert!(matches!(store.load(), Err(SettingsError::Parse(_))));
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn hand_edited_custom_statuses_are_sanitized_on_open() {
    let root = unique_vault();
    let store = FileSettingsStore::for_vault(&root);
    std::fs::create_dir_all(root.join(".vault-status")).expect("dir should be creatable");
    std::fs::write(
        store.path(),
        r#"
[[customStatuses]]
name = "active"
icon = "▶️"

[[customStatuses]]
name = "Active"
icon = "⏩"

[[customStatuses]]
name = "unknown"
icon = "❓"

[[customStatuses]]
name = " idea "
icon = "💡"
"#,
    )
    .expect("file should be writable");

    let service = SettingsService::open(Arc::new(store), ChangeNotifier::new())
        .expect("settings should load");
    let names = service
        .snapshot()
        .custom_statuses
        .iter()
        .map(|status| status.name.clone())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["active", "idea"]);
    assert_eq!(service.snapshot().custom_statuses[0].icon, "▶️");

    let _ = std::fs::remove_dir_all(root);
}
