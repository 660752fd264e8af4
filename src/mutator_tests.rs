use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use super::{apply_operation, majority_operation, MutationError, MutationRequest, Operation};
use crate::context::fixtures::context_with;
use crate::events::topics::{BatchUpdateComplete, StatusChanged};
use crate::settings::Settings;
use crate::vault::{MemoryVault, VaultFile};

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn add_is_idempotent() {
    let once = apply_operation(&names(&["active"]), &names(&["completed"]), Operation::Add, true);
    let twice = apply_operation(&once, &names(&["completed"]), Operation::Add, true);
    assert_eq!(once, names(&["active", "completed"]));
    assert_eq!(once, twice);
}

#[test]
fn add_drops_the_unknown_floor() {
    assert_eq!(
        apply_operation(&names(&["unknown"]), &names(&["active"]), Operation::Add, true),
        names(&["active"])
    );
}

#[test]
fn toggle_twice_restores_the_original_set() {
    let original = names(&["active", "onHold"]);
    for requested in [names(&["onHold"]), names(&["completed"])] {
        let toggled = apply_operation(&original, &requested, Operation::Toggle, true);
        assert_ne!(toggled, original);
        let restored = apply_operation(&toggled, &requested, Operation::Toggle, true);
        assert_eq!(restored, original);
    }
}

#[test]
fn removing_everything_writes_the_unknown_floor() {
    assert_eq!(
        apply_operation(&names(&["active"]), &names(&["ACTIVE"]), Operation::Remove, true),
        names(&["unknown"])
    );
    assert_eq!(
        apply_operation(&names(&["active"]), &[], Operation::Set, true),
        names(&["unknown"])
    );
}

#[test]
fn single_mode_keeps_one_status() {
    assert_eq!(
        apply_operation(&names(&["active"]), &names(&["completed"]), Operation::Add, false),
        names(&["completed"])
    );
    assert_eq!(
        apply_operation(&names(&["active"]), &names(&["completed"]), Operation::Toggle, false),
        names(&["completed"])
    );
    assert_eq!(
        apply_operation(&[], &names(&["a", "b"]), Operation::Set, false),
        names(&["a"])
    );
}

#[test]
fn majority_threshold_picks_remove_above_half() {
    let current = vec![names(&["active"]), names(&["Active", "x"]), names(&[])];
    assert_eq!(majority_operation(&current, "active", 0.5), Operation::Remove);
    let current = vec![names(&["active"]), names(&[]), names(&[]), names(&["active"])];
    assert_eq!(majority_operation(&current, "active", 0.5), Operation::Add);
    assert_eq!(majority_operation(&current, "active", 0.25), Operation::Remove);
}

#[tokio::test]
async fn set_then_read_returns_the_requested_statuses() {
    let vault = Arc::new(MemoryVault::new());
    let file = vault.insert_with("a.md", "status", json!("dropped"));
    let context = context_with(Settings::default(), Arc::clone(&vault));

    let outcome = context
        .mutator
        .modify(
            MutationRequest::new(vec![file.clone()], names(&["Active", "completed"]))
                .with_operation(Operation::Set),
        )
        .await
        .expect("set should succeed");

    assert_eq!(outcome.operation, Operation::Set);
    assert_eq!(outcome.files[0].before, names(&["dropped"]));
    assert_eq!(
        context
            .resolver
            .file_statuses(&file)
            .await
            .expect("file should resolve"),
        names(&["active", "completed"])
    );
    let stored = vault.frontmatter("a.md").expect("file should exist");
    assert_eq!(stored["status"], json!(["active", "completed"]));
}

#[tokio::test]
async fn two_of_three_carrying_the_status_removes_it_from_all() {
    let vault = Arc::new(MemoryVault::new());
    let a = vault.insert_with("a.md", "status", json!(["active"]));
    let b = vault.insert_with("b.md", "status", json!(["active", "onHold"]));
    let c = vault.insert_with("c.md", "status", json!(["onHold"]));
    let context = context_with(Settings::default(), Arc::clone(&vault));

    let batches = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    context
        .notifier
        .subscribe::<BatchUpdateComplete, _>("test", move |envelope| {
            sink.lock().push(envelope.payload.clone());
        });

    let outcome = context
        .mutator
        .modify(MutationRequest::new(vec![a, b, c], names(&["active"])))
        .await
        .expect("batch should succeed");

    assert_eq!(outcome.operation, Operation::Remove);
    assert_eq!(vault.frontmatter("a.md").expect("a")["status"], json!(["unknown"]));
    assert_eq!(vault.frontmatter("b.md").expect("b")["status"], json!(["onHold"]));
    assert_eq!(vault.frontmatter("c.md").expect("c")["status"], json!(["onHold"]));
    assert_eq!(outcome.changed_count(), 2);

    let batches = batches.lock();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].file_count, 3);
    assert_eq!(batches[0].mode, Operation::Remove);
}

#[tokio::test]
async fn single_file_without_operation_toggles_and_publishes_after_write() {
    let vault = Arc::new(MemoryVault::new());
    let file = vault.insert_with("note.md", "status", json!(["active"]));
    let context = context_with(Settings::default(), Arc::clone(&vault));

    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let stored_view = Arc::clone(&vault);
    context
        .notifier
        .subscribe::<StatusChanged, _>("test", move |envelope| {
            let stored = stored_view
                .frontmatter(&envelope.payload.path)
                .and_then(|frontmatter| frontmatter.get("status").cloned());
            sink.lock().push((envelope.payload.statuses.clone(), stored));
        });

    let outcome = context
        .mutator
        .modify(MutationRequest::new(vec![file], names(&["active"])))
        .await
        .expect("toggle should succeed");

    assert_eq!(outcome.operation, Operation::Toggle);
    assert_eq!(
        *observed.lock(),
        vec![(names(&["unknown"]), Some(json!(["unknown"])))]
    );
}

#[tokio::test]
async fn non_markdown_files_are_skipped_and_empty_targets_rejected() {
    let vault = Arc::new(MemoryVault::new());
    let note = vault.insert_with("note.md", "status", json!([]));
    vault.insert_with("image.png", "status", json!([]));
    let context = context_with(Settings::default(), Arc::clone(&vault));

    let outcome = context
        .mutator
        .modify(
            MutationRequest::new(vec![note, VaultFile::new("image.png")], names(&["active"]))
                .with_operation(Operation::Add),
        )
        .await
        .expect("mixed batch should succeed");
    assert_eq!(outcome.skipped, names(&["image.png"]));
    assert_eq!(vault.frontmatter("image.png").expect("png")["status"], json!([]));
    assert_eq!(vault.write_count(), 1);

    let err = context
        .mutator
        .modify(MutationRequest::new(Vec::new(), names(&["active"])))
        .await
        .expect_err("empty request should fail");
    assert!(matches!(err, MutationError::NoTarget));
}

#[tokio::test]
async fn write_failures_are_reported_and_siblings_stay_committed() {
    let vault = Arc::new(MemoryVault::new());
    let a = vault.insert_with("a.md", "status", json!([]));
    let b = vault.insert_with("b.md", "status", json!([]));
    vault.fail_writes_to("b.md");
    let context = context_with(Settings::default(), Arc::clone(&vault));

    let err = context
        .mutator
        .modify(MutationRequest::new(vec![a, b], names(&["active"])).with_operation(Operation::Add))
        .await
        .expect_err("failing write should surface");

    match err {
        MutationError::Write {
            failures,
            committed,
        } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].path, "b.md");
            assert_eq!(committed.len(), 1);
            assert_eq!(committed[0].path, "a.md");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(vault.frontmatter("a.md").expect("a")["status"], json!(["active"]));
}

#[tokio::test]
async fn adding_twice_writes_once() {
    let vault = Arc::new(MemoryVault::new());
    let file = vault.insert_with("a.md", "status", json!("Active"));
    let context = context_with(Settings::default(), Arc::clone(&vault));
    for _ in 0..2 {
        context
            .mutator
            .modify(
                MutationRequest::new(vec![file.clone()], names(&["completed"]))
                    .with_operation(Operation::Add),
            )
            .await
            .expect("add should succeed");
    }
    assert_eq!(vault.write_count(), 1);
    assert_eq!(
        vault.frontmatter("a.md").expect("a")["status"],
        json!(["Active", "completed"])
    );
}

#[tokio::test]
async fn read_failures_keep_their_path_while_siblings_change() {
    let vault = Arc::new(MemoryVault::new());
    let a = vault.insert_with("a.md", "status", json!([]));
    let b = vault.insert_with("b.md", "status", json!([]));
    vault.fail_reads_of("a.md");
    let context = context_with(Settings::default(), Arc::clone(&vault));

    let err = context
        .mutator
        .modify(MutationRequest::new(vec![a, b], names(&["active"])).with_operation(Operation::Add))
        .await
        .expect_err("failing read should surface");

    match err {
        MutationError::Write {
            failures,
            committed,
        } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].path, "a.md");
            assert_eq!(committed.len(), 1);
            assert_eq!(committed[0].path, "b.md");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(vault.frontmatter("b.md").expect("b")["status"], json!(["active"]));
    assert_eq!(vault.frontmatter("a.md").expect("a")["status"], json!([]));
}
