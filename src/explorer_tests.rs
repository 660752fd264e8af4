use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use super::{ExplorerIconScheduler, SchedulerConfig, TextExplorer};
use crate::context::fixtures::context_with;
use crate::context::{AppContext, ContextError};
use crate::events::topics::{FileChanged, ForceRefresh};
use crate::events::FileChangedEvent;
use crate::mutator::{MutationRequest, Operation};
use crate::settings::{SettingKey, SettingValue, Settings};
use crate::vault::{MemoryVault, VaultFile};

struct Fixture {
    context: Arc<AppContext>,
    vault: Arc<MemoryVault>,
    surface: Arc<TextExplorer>,
    scheduler: ExplorerIconScheduler,
}

fn fixture(settings: Settings, files: &[(&str, Value)]) -> Fixture {
    let vault = Arc::new(MemoryVault::new());
    for (path, status) in files {
        vault.insert_with(path, "status", status.clone());
    }
    let context = context_with(settings, Arc::clone(&vault));
    let surface = Arc::new(TextExplorer::new());
    let scheduler = ExplorerIconScheduler::new(
        Arc::clone(&context),
        surface.clone(),
        SchedulerConfig::default(),
    )
    .expect("scheduler should build");
    Fixture {
        context,
        vault,
        surface,
        scheduler,
    }
}

fn three_notes() -> Vec<(&'static str, Value)> {
    vec![
        ("a.md", json!(["active"])),
        ("b.md", json!("completed")),
        ("c.md", json!(["onHold", "active"])),
    ]
}

#[tokio::test(start_paused = true)]
async fn burst_of_enqueues_produces_one_refresh_pass() {
    let fx = fixture(Settings::default(), &three_notes());
    for _ in 0..25 {
        for path in ["a.md", "b.md", "c.md"] {
            assert!(fx.scheduler.queue_file_update(&VaultFile::new(path)));
        }
    }
    assert_eq!(fx.scheduler.pending(), 3);

    fx.scheduler.on_idle().await;

    assert_eq!(fx.scheduler.passes(), 1);
    for path in ["a.md", "b.md", "c.md"] {
        assert_eq!(fx.surface.render_count(path), 1, "{path} should render once");
    }
    let icons = fx.surface.icons("a.md");
    assert_eq!(icons.len(), 1);
    assert_eq!(icons[0].icon, "▶️");
    assert_eq!(icons[0].color.as_deref(), Some("#00ff00"));
    assert_eq!(icons[0].tooltip, "active: Currently being worked on");
    assert_eq!(fx.surface.icons("c.md").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn late_arrivals_are_picked_up_by_the_trailing_drain() {
    let fx = fixture(Settings::default(), &three_notes());
    fx.scheduler.queue_file_update(&VaultFile::new("a.md"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.surface.render_count("a.md"), 1);

    fx.scheduler.queue_file_update(&VaultFile::new("b.md"));
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(
        fx.surface.render_count("b.md"),
        0,
        "trailing drain waits for the quiet period"
    );

    fx.scheduler.on_idle().await;
    assert_eq!(fx.surface.render_count("b.md"), 1);
    assert_eq!(fx.surface.render_count("a.md"), 1);
    assert_eq!(fx.scheduler.passes(), 2);
}

#[tokio::test(start_paused = true)]
async fn unrelated_setting_change_does_not_rescan() {
    let fx = fixture(Settings::default(), &three_notes());
    fx.context
        .settings
        .on_settings_change(SettingKey::CompactView, SettingValue::Bool(true))
        .expect("compact view should change");
    fx.context
        .settings
        .on_settings_change(
            SettingKey::StatusColors,
            SettingValue::Colors(Default::default()),
        )
        .expect("colors should change");
    fx.scheduler.on_idle().await;
    assert_eq!(fx.scheduler.passes(), 0);
    assert_eq!(fx.surface.total_renders(), 0);

    fx.context
        .settings
        .on_settings_change(SettingKey::StrictStatuses, SettingValue::Bool(true))
        .expect("strict mode should change");
    fx.scheduler.on_idle().await;
    assert_eq!(fx.scheduler.passes(), 1);
    assert_eq!(fx.surface.total_renders(), 3);
}

#[tokio::test(start_paused = true)]
async fn unmounted_explorer_keeps_queue_and_retries() {
    let fx = fixture(Settings::default(), &three_notes());
    fx.surface.set_mounted(false);
    fx.scheduler.queue_file_update(&VaultFile::new("a.md"));

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(fx.surface.render_count("a.md"), 0);
    assert_eq!(fx.scheduler.pending(), 1);

    fx.surface.set_mounted(true);
    fx.scheduler.on_idle().await;
    assert_eq!(fx.surface.render_count("a.md"), 1);
    assert_eq!(fx.scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn per_file_failures_do_not_stop_the_batch() {
    let mut files = three_notes();
    files.push(("d.md", json!(["dropped"])));
    let fx = fixture(Settings::default(), &files);
    fx.vault.fail_reads_of("b.md");
    fx.surface.fail_renders_of("c.md");

    let queued = fx.scheduler.queue_all().await.expect("listing should succeed");
    assert_eq!(queued, 4);
    fx.scheduler.on_idle().await;

    assert_eq!(fx.surface.render_count("a.md"), 1);
    assert_eq!(fx.surface.render_count("b.md"), 0);
    assert_eq!(fx.surface.render_count("c.md"), 0);
    assert_eq!(fx.surface.render_count("d.md"), 1);
    assert_eq!(fx.scheduler.pending(), 0);
    assert_eq!(fx.scheduler.passes(), 1);
}

#[tokio::test(start_paused = true)]
async fn large_vault_drains_in_one_chunked_pass() {
    let files = (0..120)
        .map(|index| (format!("notes/{index:03}.md"), json!(["active"])))
        .collect::<Vec<_>>();
    let borrowed = files
        .iter()
        .map(|(path, value)| (path.as_str(), value.clone()))
        .collect::<Vec<_>>();
    let fx = fixture(Settings::default(), &borrowed);
    fx.vault.insert_with("cover.png", "status", json!(["active"]));

    fx.context.notifier.publish::<ForceRefresh>(());
    fx.scheduler.on_idle().await;

    assert_eq!(fx.surface.total_renders(), 120);
    assert_eq!(fx.surface.render_count("cover.png"), 0);
    assert_eq!(fx.scheduler.passes(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_statuses_can_be_hidden() {
    let notes = [("none.md", json!(null)), ("a.md", json!(["active"]))];
    let fx = fixture(Settings::default(), &notes);
    fx.scheduler.queue_file_update(&VaultFile::new("none.md"));
    fx.scheduler.on_idle().await;
    assert_eq!(fx.surface.icons("none.md")[0].icon, "❓");

    fx.context
        .settings
        .on_settings_change(SettingKey::HideUnknownStatusInExplorer, SettingValue::Bool(true))
        .expect("setting should change");
    fx.scheduler.on_idle().await;
    assert!(fx.surface.icons("none.md").is_empty());
    assert_eq!(fx.surface.icons("a.md").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn disabling_icons_clears_them_and_enabling_rescans() {
    let fx = fixture(Settings::default(), &three_notes());
    fx.scheduler.queue_all().await.expect("listing should succeed");
    fx.scheduler.on_idle().await;
    assert_eq!(fx.surface.snapshot().len(), 3);

    fx.context
        .settings
        .on_settings_change(SettingKey::ShowStatusIconsInExplorer, SettingValue::Bool(false))
        .expect("setting should change");
    assert!(fx.surface.snapshot().is_empty());
    assert!(!fx.scheduler.queue_file_update(&VaultFile::new("a.md")));

    fx.context
        .settings
        .on_settings_change(SettingKey::ShowStatusIconsInExplorer, SettingValue::Bool(true))
        .expect("setting should change");
    fx.scheduler.on_idle().await;
    assert_eq!(fx.surface.snapshot().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn status_and_file_events_enqueue_paths() {
    let fx = fixture(Settings::default(), &three_notes());
    fx.context
        .mutator
        .modify(
            MutationRequest::new(vec![VaultFile::new("a.md")], vec!["completed".to_string()])
                .with_operation(Operation::Set),
        )
        .await
        .expect("set should succeed");
    fx.context.notifier.publish::<FileChanged>(FileChangedEvent {
        path: "b.md".to_string(),
    });
    fx.scheduler.on_idle().await;

    assert_eq!(fx.surface.icons("a.md")[0].icon, "✅");
    assert_eq!(fx.surface.render_count("b.md"), 1);
    assert_eq!(fx.surface.render_count("c.md"), 0);
}

#[tokio::test(start_paused = true)]
async fn scheduler_is_a_singleton_and_shutdown_stops_enqueueing() {
    let fx = fixture(Settings::default(), &three_notes());
    let second = ExplorerIconScheduler::new(
        Arc::clone(&fx.context),
        Arc::new(TextExplorer::new()),
        SchedulerConfig::default(),
    );
    assert!(matches!(
        second,
        Err(ContextError::DuplicateSingleton(super::SCHEDULER_NAME))
    ));

    fx.scheduler.queue_file_update(&VaultFile::new("a.md"));
    fx.scheduler.shutdown();
    assert!(!fx.scheduler.queue_file_update(&VaultFile::new("b.md")));
    fx.scheduler.on_idle().await;

    let replacement = ExplorerIconScheduler::new(
        Arc::clone(&fx.context),
        Arc::new(TextExplorer::new()),
        SchedulerConfig::default(),
    );
    assert!(replacement.is_ok());
}

#[tokio::test(start_paused = true)]
async fn unreadable_file_loses_its_stale_icon() {
    let fx = fixture(Settings::default(), &three_notes());
    fx.scheduler.queue_all().await.expect("listing should succeed");
    fx.scheduler.on_idle().await;
    assert_eq!(fx.surface.icons("a.md").len(), 1);

    fx.vault.fail_reads_of("a.md");
    assert!(fx.scheduler.queue_file_update(&VaultFile::new("a.md")));
    fx.scheduler.on_idle().await;

    assert!(fx.surface.icons("a.md").is_empty());
    assert_eq!(fx.surface.icons("b.md").len(), 1);
}
