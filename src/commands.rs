//! User-facing command entry points. Each one converts its failure into a
//! [`Notice`] at the boundary instead of propagating it to the host.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::context::AppContext;
use crate::domain::status::{is_unknown, join_statuses, split_statuses, status_key};
use crate::events::topics::ModalRequested;
use crate::events::{ModalKind, ModalRequestedEvent};
use crate::mutator::{MutationError, MutationOutcome, MutationRequest, Operation};
use crate::settings::{SettingKey, SettingValue, SettingsError, SETTINGS_DIR};
use crate::vault::{VaultError, VaultFile};

pub const CLIPBOARD_FILE: &str = "clipboard.txt";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no active file")]
    NoActiveFile,
    #[error("'{0}' is not a known status")]
    UnknownStatus(String),
    #[error("the status catalog is empty")]
    EmptyCatalog,
    #[error("clipboard holds no statuses")]
    EmptyClipboard,
    #[error("clipboard unavailable: {0}")]
    Clipboard(#[from] std::io::Error),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Short message shown to the user after a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&CommandError> for Notice {
    fn from(err: &CommandError) -> Self {
        Notice::error(err.to_string())
    }
}

/// The summary notice for a finished change, unless the request asked for
/// none.
pub fn outcome_notice(outcome: &MutationOutcome) -> Option<Notice> {
    if !outcome.show_notice {
        return None;
    }
    let statuses = join_statuses(&outcome.statuses);
    let notice = match outcome.files.as_slice() {
        [] => Notice::info("no markdown files to update"),
        [file] if !file.changed => Notice::info(format!("{} already up to date", file.path)),
        [file] => Notice::info(format!(
            "{}: {}",
            file.path,
            join_statuses(&file.after)
        )),
        files => Notice::info(format!(
            "{} {} on {} of {} files",
            operation_verb(outcome.operation),
            if statuses.is_empty() { "statuses" } else { statuses.as_str() },
            outcome.changed_count(),
            files.len()
        )),
    };
    Some(notice)
}

fn operation_verb(operation: Operation) -> &'static str {
    match operation {
        Operation::Set => "set",
        Operation::Add => "added",
        Operation::Remove => "removed",
        Operation::Toggle => "toggled",
    }
}

pub trait Clipboard: Send + Sync {
    fn read_text(&self) -> Result<Option<String>, CommandError>;
    fn write_text(&self, text: &str) -> Result<(), CommandError>;
}

/// Clipboard kept in the vault's settings directory, so copy and paste work
/// across separate `vst` invocations.
#[derive(Debug, Clone)]
pub struct FileClipboard {
    path: PathBuf,
}

impl FileClipboard {
    pub fn for_vault(vault_root: &Path) -> Self {
        Self {
            path: vault_root.join(SETTINGS_DIR).join(CLIPBOARD_FILE),
        }
    }
}

impl Clipboard for FileClipboard {
    fn read_text(&self) -> Result<Option<String>, CommandError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_text(&self, text: &str) -> Result<(), CommandError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: parking_lot::Mutex<Option<String>>,
}

#[cfg(test)]
impl Clipboard for MemoryClipboard {
    fn read_text(&self) -> Result<Option<String>, CommandError> {
        Ok(self.text.lock().clone())
    }

    fn write_text(&self, text: &str) -> Result<(), CommandError> {
        *self.text.lock() = Some(text.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub path: String,
    pub statuses: Vec<String>,
}

pub struct StatusCommands {
    context: Arc<AppContext>,
}

impl StatusCommands {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    fn target(active: Option<&VaultFile>) -> Result<&VaultFile, CommandError> {
        active.ok_or(CommandError::NoActiveFile)
    }

    pub async fn change_status(
        &self,
        files: Vec<VaultFile>,
        statuses: Vec<String>,
        operation: Option<Operation>,
    ) -> Result<MutationOutcome, CommandError> {
        let mut request = MutationRequest::new(files, statuses);
        request.operation = operation;
        self.submit(request).await
    }

    /// Runs a fully specified request through the mutator.
    pub async fn submit(&self, request: MutationRequest) -> Result<MutationOutcome, CommandError> {
        if request.files.is_empty() {
            return Err(CommandError::NoActiveFile);
        }
        Ok(self.context.mutator.modify(request).await?)
    }

    /// Moves the active file to the catalog status after its primary one.
    pub async fn cycle_status(
        &self,
        active: Option<&VaultFile>,
    ) -> Result<MutationOutcome, CommandError> {
        let file = Self::target(active)?;
        let catalog = self.context.registry.all_statuses();
        let Some(first) = catalog.first() else {
            return Err(CommandError::EmptyCatalog);
        };
        let primary = self.context.resolver.file_primary_status(file).await?;
        let next = catalog
            .iter()
            .position(|status| status.key() == status_key(&primary))
            .and_then(|index| catalog.get((index + 1) % catalog.len()))
            .unwrap_or(first);
        tracing::debug!(path = %file, from = %primary, to = %next.name, "cycling status");
        self.change_status(vec![file.clone()], vec![next.name.clone()], Some(Operation::Set))
            .await
    }

    pub async fn clear_status(
        &self,
        active: Option<&VaultFile>,
    ) -> Result<MutationOutcome, CommandError> {
        let file = Self::target(active)?;
        self.change_status(vec![file.clone()], Vec::new(), Some(Operation::Set))
            .await
    }

    /// Copies the active file's statuses, comma-joined. Returns the copied text.
    pub async fn copy_status(
        &self,
        active: Option<&VaultFile>,
        clipboard: &dyn Clipboard,
    ) -> Result<String, CommandError> {
        let file = Self::target(active)?;
        let statuses = self
            .context
            .resolver
            .file_statuses(file)
            .await?
            .into_iter()
            .filter(|status| !is_unknown(status))
            .collect::<Vec<_>>();
        let text = join_statuses(&statuses);
        clipboard.write_text(&text)?;
        Ok(text)
    }

    /// Replaces the active file's statuses with the clipboard's. In strict mode
    /// names missing from the catalog are rejected.
    pub async fn paste_status(
        &self,
        active: Option<&VaultFile>,
        clipboard: &dyn Clipboard,
    ) -> Result<MutationOutcome, CommandError> {
        let file = Self::target(active)?;
        let text = clipboard.read_text()?.unwrap_or_default();
        let statuses = split_statuses(&text);
        if statuses.is_empty() {
            return Err(CommandError::EmptyClipboard);
        }
        if self.context.settings.snapshot().strict_statuses {
            if let Some(unknown) = statuses
                .iter()
                .find(|status| !self.context.registry.is_known(status))
            {
                return Err(CommandError::UnknownStatus(unknown.clone()));
            }
        }
        self.change_status(vec![file.clone()], statuses, Some(Operation::Set))
            .await
    }

    /// Flips `useMultipleStatuses` and returns the new value.
    pub fn toggle_multiple_statuses(&self) -> Result<bool, CommandError> {
        let next = !self.context.settings.snapshot().use_multiple_statuses;
        self.context
            .settings
            .on_settings_change(SettingKey::UseMultipleStatuses, SettingValue::Bool(next))?;
        Ok(next)
    }

    /// Files carrying a status whose name contains `query`, case-insensitively.
    pub async fn search_by_status(&self, query: &str) -> Result<Vec<SearchHit>, CommandError> {
        let needle = status_key(query);
        let mut hits = Vec::new();
        for file in self.context.store.list_files().await? {
            if !file.is_markdown() {
                continue;
            }
            let statuses = match self.context.resolver.file_statuses(&file).await {
                Ok(statuses) => statuses,
                Err(err) => {
                    tracing::warn!(path = %file, error = %err, "skipping unreadable file");
                    continue;
                }
            };
            if statuses
                .iter()
                .any(|status| status_key(status).contains(&needle))
            {
                hits.push(SearchHit {
                    path: file.path().to_string(),
                    statuses,
                });
            }
        }
        Ok(hits)
    }

    /// Configured quick commands that name a catalog status.
    pub fn quick_commands(&self) -> Vec<String> {
        self.context
            .settings
            .snapshot()
            .quick_status_commands
            .iter()
            .filter_map(|name| self.context.registry.canonical_name(name))
            .collect()
    }

    /// Toggles one quick status on the active file.
    pub async fn quick_status(
        &self,
        active: Option<&VaultFile>,
        name: &str,
    ) -> Result<MutationOutcome, CommandError> {
        let file = Self::target(active)?;
        let status = self
            .quick_commands()
            .into_iter()
            .find(|candidate| status_key(candidate) == status_key(name))
            .ok_or_else(|| CommandError::UnknownStatus(name.trim().to_string()))?;
        self.change_status(vec![file.clone()], vec![status], Some(Operation::Toggle))
            .await
    }

    pub fn request_modal(&self, modal: ModalKind, paths: Vec<String>) -> usize {
        self.context
            .notifier
            .publish::<ModalRequested>(ModalRequestedEvent { modal, paths })
    }
}
