use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::commands::{CommandError, FileClipboard, StatusCommands};
use crate::context::{AppContext, ContextError};
use crate::events::topics::{ActiveFileChanged, FileChanged, LayoutChanged, RefreshUi};
use crate::events::{ActiveFileChangedEvent, FileChangedEvent, RefreshUiEvent};
use crate::mutator::MutationError;
use crate::settings::{FileSettingsStore, SettingsError};
use crate::templates::TemplateError;
use crate::vault::{FrontmatterStore, FsVault, VaultError, VaultFile};

/// Notifications the host delivers about its documents and layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    MetadataChanged(VaultFile),
    ActiveFileChanged(Option<VaultFile>),
    LayoutChanged,
}

pub struct App {
    context: Arc<AppContext>,
    commands: StatusCommands,
    active_file: Mutex<Option<VaultFile>>,
    vault_root: Option<PathBuf>,
}

impl App {
    /// Opens the vault rooted at `vault_root` with file-backed settings.
    pub fn open(vault_root: PathBuf) -> Result<Self, AppError> {
        if !vault_root.is_dir() {
            return Err(AppError::InvalidArgument(format!(
                "vault root '{}' is not a directory",
                vault_root.display()
            )));
        }
        let settings = Arc::new(FileSettingsStore::for_vault(&vault_root));
        let store: Arc<dyn FrontmatterStore> = Arc::new(FsVault::new(&vault_root));
        let context = AppContext::new(settings, store)?;
        tracing::debug!(root = %vault_root.display(), "vault opened");
        let mut app = Self::with_context(context);
        app.vault_root = Some(vault_root);
        Ok(app)
    }

    pub fn with_context(context: Arc<AppContext>) -> Self {
        Self {
            commands: StatusCommands::new(Arc::clone(&context)),
            context,
            active_file: Mutex::new(None),
            vault_root: None,
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.context
    }

    pub fn commands(&self) -> &StatusCommands {
        &self.commands
    }

    pub fn active_file(&self) -> Option<VaultFile> {
        self.active_file.lock().clone()
    }

    pub fn clipboard(&self) -> Result<FileClipboard, AppError> {
        let root = self.vault_root.as_deref().ok_or_else(|| {
            AppError::InvalidArgument("clipboard requires an on-disk vault".to_string())
        })?;
        Ok(FileClipboard::for_vault(root))
    }

    /// Normalizes a host event and republishes it on the notifier.
    pub fn handle_host_event(&self, event: HostEvent) {
        match event {
            HostEvent::MetadataChanged(file) => {
                tracing::trace!(path = %file, "metadata changed");
                self.context
                    .notifier
                    .publish::<FileChanged>(FileChangedEvent {
                        path: file.path().to_string(),
                    });
            }
            HostEvent::ActiveFileChanged(file) => {
                let path = file.as_ref().map(|file| file.path().to_string());
                *self.active_file.lock() = file;
                self.context
                    .notifier
                    .publish::<ActiveFileChanged>(ActiveFileChangedEvent { path });
            }
            HostEvent::LayoutChanged => {
                self.context.notifier.publish::<LayoutChanged>(());
                self.context.notifier.publish::<RefreshUi>(RefreshUiEvent {
                    reason: "layout-changed".to_string(),
                });
            }
        }
    }

    pub fn close(&self) {
        self.context.close();
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    InvalidArgument(String),
}
