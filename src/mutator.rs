use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::domain::status::{is_unknown, status_key, unknown_floor};
use crate::events::topics::{BatchUpdateComplete, StatusChanged};
use crate::events::{BatchUpdateCompleteEvent, ChangeNotifier, StatusChangedEvent};
use crate::registry::StatusRegistry;
use crate::resolver::raw_status_values;
use crate::settings::{Settings, SettingsService};
use crate::vault::{status_array, FrontmatterStore, VaultError, VaultFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Set,
    Add,
    Remove,
    Toggle,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Set => "set",
            Operation::Add => "add",
            Operation::Remove => "remove",
            Operation::Toggle => "toggle",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MutationRequest {
    pub files: Vec<VaultFile>,
    pub statuses: Vec<String>,
    pub operation: Option<Operation>,
    pub is_multiple_selection: bool,
    pub show_notice: bool,
}

impl MutationRequest {
    pub fn new(files: Vec<VaultFile>, statuses: Vec<String>) -> Self {
        Self {
            is_multiple_selection: files.len() > 1,
            files,
            statuses,
            operation: None,
            show_notice: true,
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn quiet(mut self) -> Self {
        self.show_notice = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub path: String,
    pub before: Vec<String>,
    pub after: Vec<String>,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub operation: Operation,
    pub statuses: Vec<String>,
    pub files: Vec<FileOutcome>,
    pub skipped: Vec<String>,
    #[serde(skip)]
    pub show_notice: bool,
}

impl MutationOutcome {
    pub fn changed_count(&self) -> usize {
        self.files.iter().filter(|file| file.changed).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("no file selected")]
    NoTarget,
    #[error("failed to update status of {}", failed_paths(.failures))]
    Write {
        failures: Vec<FileFailure>,
        committed: Vec<FileOutcome>,
    },
}

fn failed_paths(failures: &[FileFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn contains(statuses: &[String], name: &str) -> bool {
    let key = status_key(name);
    statuses.iter().any(|status| status_key(status) == key)
}

fn push_unique(statuses: &mut Vec<String>, name: &str) {
    if !contains(statuses, name) {
        statuses.push(name.to_string());
    }
}

/// Applies one operation to a file's current statuses. Never returns an empty
/// list; single-status mode keeps one entry.
pub fn apply_operation(
    current: &[String],
    requested: &[String],
    operation: Operation,
    multiple: bool,
) -> Vec<String> {
    let baseline = current
        .iter()
        .filter(|status| !is_unknown(status))
        .cloned()
        .collect::<Vec<_>>();

    let mut next = match operation {
        Operation::Set => {
            let mut next = Vec::new();
            for name in requested.iter().filter(|name| !is_unknown(name)) {
                push_unique(&mut next, name);
            }
            next
        }
        Operation::Add if !multiple => requested
            .iter()
            .find(|name| !is_unknown(name))
            .map(|name| vec![name.clone()])
            .unwrap_or(baseline),
        Operation::Add => {
            let mut next = Vec::new();
            for name in baseline.iter().chain(requested.iter()) {
                if !is_unknown(name) {
                    push_unique(&mut next, name);
                }
            }
            next
        }
        Operation::Remove => baseline
            .into_iter()
            .filter(|status| !contains(requested, status))
            .collect(),
        Operation::Toggle => {
            let mut next = baseline;
            for name in requested.iter().filter(|name| !is_unknown(name)) {
                if contains(&next, name) {
                    let key = status_key(name);
                    next.retain(|status| status_key(status) != key);
                } else if multiple {
                    next.push(name.clone());
                } else {
                    next = vec![name.clone()];
                }
            }
            next
        }
    };

    if !multiple {
        next.truncate(1);
    }
    if next.is_empty() {
        return unknown_floor();
    }
    next
}

/// `Remove` when more than `threshold` of the files already carry `status`,
/// `Add` otherwise.
pub fn majority_operation(current: &[Vec<String>], status: &str, threshold: f64) -> Operation {
    let carrying = current
        .iter()
        .filter(|statuses| contains(statuses, status))
        .count();
    if carrying as f64 > threshold * current.len() as f64 {
        Operation::Remove
    } else {
        Operation::Add
    }
}

fn select_operation(
    request: &MutationRequest,
    current: &[Vec<String>],
    settings: &Settings,
) -> Operation {
    if let Some(operation) = request.operation {
        return operation;
    }
    match request.statuses.first() {
        Some(first) if request.is_multiple_selection && current.len() > 1 => {
            majority_operation(current, first, settings.batch_remove_threshold)
        }
        _ => Operation::Toggle,
    }
}

/// Writes status changes and publishes them.
pub struct StatusMutator {
    settings: Arc<SettingsService>,
    registry: Arc<StatusRegistry>,
    store: Arc<dyn FrontmatterStore>,
    notifier: Arc<ChangeNotifier>,
}

impl StatusMutator {
    pub fn new(
        settings: Arc<SettingsService>,
        registry: Arc<StatusRegistry>,
        store: Arc<dyn FrontmatterStore>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        Self {
            settings,
            registry,
            store,
            notifier,
        }
    }

    pub async fn modify(&self, request: MutationRequest) -> Result<MutationOutcome, MutationError> {
        if request.files.is_empty() {
            return Err(MutationError::NoTarget);
        }
        let settings = self.settings.snapshot();
        let key = settings.tag_prefix.clone();
        let requested = request
            .statuses
            .iter()
            .map(|raw| raw.trim())
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                self.registry
                    .canonical_name(raw)
                    .unwrap_or_else(|| raw.to_string())
            })
            .collect::<Vec<_>>();

        let mut skipped = Vec::new();
        let mut targets = Vec::new();
        let mut seen = BTreeSet::new();
        for file in &request.files {
            if !file.is_markdown() {
                tracing::debug!(path = %file, "skipping non-markdown file");
                skipped.push(file.path().to_string());
            } else if seen.insert(file.clone()) {
                targets.push(file.clone());
            }
        }

        let mut failures = Vec::new();
        let mut current = Vec::with_capacity(targets.len());
        let reads = targets
            .into_iter()
            .map(|file| {
                let store = Arc::clone(&self.store);
                let key = key.clone();
                let target = file.clone();
                let handle = tokio::spawn(async move {
                    let frontmatter = store.read_frontmatter(&target).await?;
                    Ok::<_, VaultError>(raw_status_values(frontmatter.get(&key)))
                });
                (file, handle)
            })
            .collect::<Vec<_>>();
        for (file, handle) in reads {
            match handle.await {
                Ok(Ok(statuses)) => current.push((file, statuses)),
                Ok(Err(err)) => failures.push(failure(&file, err.to_string())),
                Err(err) => failures.push(failure(&file, err.to_string())),
            }
        }

        let carried = current
            .iter()
            .map(|(_, statuses)| statuses.clone())
            .collect::<Vec<_>>();
        let request = MutationRequest {
            statuses: requested.clone(),
            ..request
        };
        let operation = select_operation(&request, &carried, &settings);
        tracing::debug!(
            operation = operation.as_str(),
            files = current.len(),
            statuses = ?requested,
            "applying status change"
        );

        let writes = current
            .into_iter()
            .map(|(file, before)| {
                let after = apply_operation(
                    &before,
                    &requested,
                    operation,
                    settings.use_multiple_statuses,
                );
                let changed = after != before;
                let handle = changed.then(|| {
                    let store = Arc::clone(&self.store);
                    let key = key.clone();
                    let target = file.clone();
                    let value = status_array(&after);
                    tokio::spawn(async move { store.write_frontmatter_key(&target, &key, value).await })
                });
                (file, before, after, handle)
            })
            .collect::<Vec<_>>();

        let mut files = Vec::new();
        for (file, before, after, handle) in writes {
            let result = match handle {
                None => Ok(false),
                Some(handle) => match handle.await {
                    Ok(Ok(())) => Ok(true),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(err) => Err(err.to_string()),
                },
            };
            match result {
                Ok(changed) => {
                    if changed {
                        self.notifier.publish::<StatusChanged>(StatusChangedEvent {
                            path: file.path().to_string(),
                            statuses: after.clone(),
                        });
                    }
                    files.push(FileOutcome {
                        path: file.path().to_string(),
                        before,
                        after,
                        changed,
                    });
                }
                Err(message) => {
                    tracing::warn!(path = %file, error = %message, "status write failed");
                    failures.push(FileFailure {
                        path: file.path().to_string(),
                        message,
                    });
                }
            }
        }

        if request.files.len() > 1 {
            self.notifier
                .publish::<BatchUpdateComplete>(BatchUpdateCompleteEvent {
                    statuses: requested.clone(),
                    file_count: files.len(),
                    mode: operation,
                });
        }

        if !failures.is_empty() {
            return Err(MutationError::Write {
                failures,
                committed: files,
            });
        }
        Ok(MutationOutcome {
            operation,
            statuses: requested,
            files,
            skipped,
            show_notice: request.show_notice,
        })
    }
}

fn failure(file: &VaultFile, message: String) -> FileFailure {
    tracing::warn!(path = %file, error = %message, "failed to read current statuses");
    FileFailure {
        path: file.path().to_string(),
        message,
    }
}

#[cfg(test)]
#[path = "mutator_tests.rs"]
mod tests;
