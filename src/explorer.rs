//! Explorer icon refresh pipeline.
//!
//! Change notifications enqueue paths; a leading+trailing debounce coalesces
//! bursts; the queue drains in bounded batches that yield to the runtime
//! between chunks. Only one drain runs at a time.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::context::{AppContext, ContextError};
use crate::domain::status::is_unknown_only;
use crate::events::topics::{FileChanged, ForceRefresh, SettingsChanged, StatusChanged};
use crate::events::{Subscription, SettingsChangedEvent};
use crate::settings::SettingKey;
use crate::vault::{VaultError, VaultFile};

pub const SCHEDULER_NAME: &str = "explorer-icon-scheduler";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub debounce: Duration,
    pub batch_size: usize,
    pub remount_retry: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            batch_size: 50,
            remount_retry: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedIcon {
    pub status: String,
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub tooltip: String,
}

#[derive(Debug, Error)]
pub enum IconError {
    #[error(transparent)]
    Resolve(#[from] VaultError),
    #[error("explorer rejected icons for '{path}': {message}")]
    Render { path: String, message: String },
}

/// The explorer widget the icons are drawn into.
pub trait IconSurface: Send + Sync {
    fn is_mounted(&self) -> bool;
    fn clear_icons(&self, path: &str);
    fn clear_all(&self);
    fn render_icons(&self, path: &str, icons: &[RenderedIcon]) -> Result<(), IconError>;
}

/// Headless explorer that keeps rendered icons in memory.
#[derive(Debug)]
pub struct TextExplorer {
    icons: Mutex<BTreeMap<String, Vec<RenderedIcon>>>,
    renders: Mutex<BTreeMap<String, usize>>,
    failing: Mutex<BTreeSet<String>>,
    mounted: AtomicBool,
}

impl Default for TextExplorer {
    fn default() -> Self {
        Self {
            icons: Mutex::new(BTreeMap::new()),
            renders: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(BTreeSet::new()),
            mounted: AtomicBool::new(true),
        }
    }
}

impl TextExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn set_mounted(&self, mounted: bool) {
        self.mounted.store(mounted, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn fail_renders_of(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    #[cfg(test)]
    pub fn icons(&self, path: &str) -> Vec<RenderedIcon> {
        self.icons.lock().get(path).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Vec<RenderedIcon>> {
        self.icons.lock().clone()
    }

    #[cfg(test)]
    pub fn render_count(&self, path: &str) -> usize {
        self.renders.lock().get(path).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub fn total_renders(&self) -> usize {
        self.renders.lock().values().sum()
    }
}

impl IconSurface for TextExplorer {
    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn clear_icons(&self, path: &str) {
        self.icons.lock().remove(path);
    }

    fn clear_all(&self) {
        self.icons.lock().clear();
    }

    fn render_icons(&self, path: &str, icons: &[RenderedIcon]) -> Result<(), IconError> {
        if self.failing.lock().contains(path) {
            return Err(IconError::Render {
                path: path.to_string(),
                message: "element detached".to_string(),
            });
        }
        self.icons.lock().insert(path.to_string(), icons.to_vec());
        *self.renders.lock().entry(path.to_string()).or_default() += 1;
        Ok(())
    }
}

#[derive(Default)]
struct SchedulerState {
    pending: BTreeSet<String>,
    timer: Option<JoinHandle<()>>,
    timer_generation: u64,
    trailing: bool,
    retry: Option<JoinHandle<()>>,
    processing: bool,
    rescans: usize,
    passes: usize,
    shut_down: bool,
    subscriptions: Vec<Subscription>,
}

impl SchedulerState {
    fn is_idle(&self) -> bool {
        self.timer.is_none()
            && self.retry.is_none()
            && !self.processing
            && self.rescans == 0
            && (self.pending.is_empty() || self.shut_down)
    }
}

struct Inner {
    context: Arc<AppContext>,
    surface: Arc<dyn IconSurface>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    idle: Notify,
}

/// Debounced, chunked background updater for explorer icons.
pub struct ExplorerIconScheduler {
    inner: Arc<Inner>,
}

impl ExplorerIconScheduler {
    /// Builds the scheduler and subscribes it to the notifier. Only one
    /// scheduler may exist per context.
    pub fn new(
        context: Arc<AppContext>,
        surface: Arc<dyn IconSurface>,
        config: SchedulerConfig,
    ) -> Result<Self, ContextError> {
        context.claim_singleton(SCHEDULER_NAME)?;
        let inner = Arc::new(Inner {
            context,
            surface,
            config,
            state: Mutex::new(SchedulerState::default()),
            idle: Notify::new(),
        });
        let subscriptions = Inner::subscribe(&inner);
        inner.state.lock().subscriptions = subscriptions;
        Ok(Self { inner })
    }

    pub fn queue_file_update(&self, file: &VaultFile) -> bool {
        self.inner.queue_file_update(file)
    }

    /// Enqueues every markdown file of the vault. Returns how many were queued.
    pub async fn queue_all(&self) -> Result<usize, VaultError> {
        Inner::queue_all(&self.inner).await
    }

    /// Runs a drain now, bypassing the debounce timer.
    pub async fn drain(&self) {
        self.inner.cancel_timer();
        Inner::process_update_queue(&self.inner).await;
    }

    pub async fn process_update_queue(&self) {
        Inner::process_update_queue(&self.inner).await;
    }

    /// Resolves once nothing is pending, timed, retrying or processing.
    pub async fn on_idle(&self) {
        self.inner.on_idle().await;
    }

    pub fn pending(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Drain runs that refreshed at least one path.
    pub fn passes(&self) -> usize {
        self.inner.state.lock().passes
    }

    pub fn is_processing(&self) -> bool {
        self.inner.state.lock().processing
    }

    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl Drop for ExplorerIconScheduler {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl Inner {
    fn subscribe(inner: &Arc<Self>) -> Vec<Subscription> {
        let notifier = &inner.context.notifier;
        let weak = Arc::downgrade(inner);
        let on_file = {
            let weak = Weak::clone(&weak);
            notifier.subscribe::<FileChanged, _>(SCHEDULER_NAME, move |envelope| {
                if let Some(inner) = weak.upgrade() {
                    inner.queue_file_update(&VaultFile::new(envelope.payload.path.as_str()));
                }
            })
        };
        let on_status = {
            let weak = Weak::clone(&weak);
            notifier.subscribe::<StatusChanged, _>(SCHEDULER_NAME, move |envelope| {
                if let Some(inner) = weak.upgrade() {
                    inner.queue_file_update(&VaultFile::new(envelope.payload.path.as_str()));
                }
            })
        };
        let on_force = {
            let weak = Weak::clone(&weak);
            notifier.subscribe::<ForceRefresh, _>(SCHEDULER_NAME, move |_| {
                if let Some(inner) = weak.upgrade() {
                    Inner::spawn_rescan(&inner, "force refresh");
                }
            })
        };
        let on_settings = notifier.subscribe::<SettingsChanged, _>(SCHEDULER_NAME, move |envelope| {
            if let Some(inner) = weak.upgrade() {
                Inner::on_settings_changed(&inner, &envelope.payload);
            }
        });
        vec![on_file, on_status, on_force, on_settings]
    }

    fn on_settings_changed(inner: &Arc<Self>, event: &SettingsChangedEvent) {
        match event.key {
            SettingKey::ShowStatusIconsInExplorer if !event.snapshot.show_status_icons_in_explorer => {
                tracing::debug!("explorer icons disabled; clearing");
                inner.state.lock().pending.clear();
                inner.surface.clear_all();
                inner.idle.notify_waiters();
            }
            SettingKey::ShowStatusIconsInExplorer => Inner::spawn_rescan(inner, "icons enabled"),
            key if key.requires_icon_rescan() => Inner::spawn_rescan(inner, key.as_str()),
            _ => {}
        }
    }

    fn queue_file_update(self: &Arc<Self>, file: &VaultFile) -> bool {
        if !file.is_markdown() || !self.context.settings.snapshot().show_status_icons_in_explorer {
            return false;
        }
        {
            let mut state = self.state.lock();
            if state.shut_down {
                return false;
            }
            state.pending.insert(file.path().to_string());
        }
        self.schedule();
        true
    }

    async fn queue_all(self: &Arc<Self>) -> Result<usize, VaultError> {
        if !self.context.settings.snapshot().show_status_icons_in_explorer {
            return Ok(0);
        }
        let files = self.context.store.list_files().await?;
        let mut queued = 0;
        {
            let mut state = self.state.lock();
            if state.shut_down {
                return Ok(0);
            }
            for file in files.iter().filter(|file| file.is_markdown()) {
                state.pending.insert(file.path().to_string());
                queued += 1;
            }
        }
        tracing::debug!(files = queued, "queued full explorer rescan");
        if queued > 0 {
            self.schedule();
        }
        Ok(queued)
    }

    fn spawn_rescan(inner: &Arc<Self>, reason: &str) {
        {
            let mut state = inner.state.lock();
            if state.shut_down {
                return;
            }
            state.rescans += 1;
        }
        tracing::debug!(reason, "explorer rescan requested");
        let task = Arc::clone(inner);
        let spawned = spawn_on_runtime(async move {
            if let Err(err) = Inner::queue_all(&task).await {
                tracing::warn!(error = %err, "explorer rescan could not list files");
            }
            task.state.lock().rescans -= 1;
            task.idle.notify_waiters();
        });
        if spawned.is_none() {
            inner.state.lock().rescans -= 1;
        }
    }

    /// Leading edge drains immediately; later calls in the burst restart the
    /// quiet-period timer and arm a trailing drain.
    fn schedule(self: &Arc<Self>) {
        let leading = {
            let mut state = self.state.lock();
            if state.shut_down {
                return;
            }
            let leading = match state.timer.take() {
                Some(timer) => {
                    timer.abort();
                    state.trailing = true;
                    false
                }
                None => true,
            };
            state.timer_generation += 1;
            let generation = state.timer_generation;
            let inner = Arc::clone(self);
            let debounce = self.config.debounce;
            state.timer = spawn_on_runtime(async move {
                tokio::time::sleep(debounce).await;
                Inner::timer_expired(&inner, generation).await;
            });
            leading
        };
        if leading {
            let inner = Arc::clone(self);
            spawn_on_runtime(async move { Inner::process_update_queue(&inner).await });
        }
    }

    async fn timer_expired(inner: &Arc<Self>, generation: u64) {
        let trailing = {
            let mut state = inner.state.lock();
            if state.timer_generation != generation {
                return;
            }
            state.timer = None;
            std::mem::take(&mut state.trailing)
        };
        if trailing {
            Inner::process_update_queue(inner).await;
        }
        inner.idle.notify_waiters();
    }

    fn cancel_timer(&self) {
        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.timer_generation += 1;
        state.trailing = false;
        drop(state);
        self.idle.notify_waiters();
    }

    async fn process_update_queue(inner: &Arc<Self>) {
        {
            let mut state = inner.state.lock();
            if state.processing || state.shut_down || state.pending.is_empty() {
                return;
            }
            if !inner.surface.is_mounted() {
                if state.retry.is_none() {
                    tracing::debug!(
                        pending = state.pending.len(),
                        "explorer not mounted; retrying later"
                    );
                    state.retry = Inner::spawn_retry(inner);
                }
                return;
            }
            state.processing = true;
        }

        let mut refreshed = 0usize;
        loop {
            let batch = {
                let mut state = inner.state.lock();
                if state.shut_down || state.pending.is_empty() {
                    state.processing = false;
                    if refreshed > 0 {
                        state.passes += 1;
                    }
                    break;
                }
                let size = inner.config.batch_size.max(1);
                let mut batch = Vec::with_capacity(size);
                while batch.len() < size {
                    match state.pending.pop_first() {
                        Some(path) => batch.push(path),
                        None => break,
                    }
                }
                batch
            };
            for path in &batch {
                if let Err(err) = inner.refresh_path(path).await {
                    tracing::warn!(path = %path, error = %err, "failed to refresh explorer icons");
                }
            }
            refreshed += batch.len();
            tokio::task::yield_now().await;
        }
        tracing::debug!(files = refreshed, "explorer icon pass complete");
        inner.idle.notify_waiters();
    }

    fn spawn_retry(inner: &Arc<Self>) -> Option<JoinHandle<()>> {
        let task = Arc::clone(inner);
        let delay = inner.config.remount_retry;
        spawn_on_runtime(async move {
            tokio::time::sleep(delay).await;
            task.state.lock().retry = None;
            Inner::process_update_queue(&task).await;
            task.idle.notify_waiters();
        })
    }

    async fn refresh_path(&self, path: &str) -> Result<(), IconError> {
        self.surface.clear_icons(path);
        let file = VaultFile::new(path);
        let statuses = self.context.resolver.file_statuses(&file).await?;
        let settings = self.context.settings.snapshot();
        if !settings.show_status_icons_in_explorer {
            return Ok(());
        }
        if settings.hide_unknown_status_in_explorer && is_unknown_only(&statuses) {
            return Ok(());
        }
        let registry = &self.context.registry;
        let icons = statuses
            .iter()
            .map(|status| RenderedIcon {
                status: status.clone(),
                icon: registry.status_icon(status),
                color: registry.status_color(status),
                tooltip: registry
                    .status_description(status)
                    .map(|description| format!("{status}: {description}"))
                    .unwrap_or_else(|| status.clone()),
            })
            .collect::<Vec<_>>();
        self.surface.render_icons(path, &icons)
    }

    async fn on_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.state.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn shutdown(&self) {
        let subscriptions = {
            let mut state = self.state.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            if let Some(retry) = state.retry.take() {
                retry.abort();
            }
            state.trailing = false;
            std::mem::take(&mut state.subscriptions)
        };
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        self.context.release_singleton(SCHEDULER_NAME);
        tracing::debug!("explorer icon scheduler shut down");
        self.idle.notify_waiters();
    }
}

fn spawn_on_runtime<F>(future: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future)),
        Err(_) => {
            tracing::warn!("no async runtime available; explorer refresh skipped");
            None
        }
    }
}

#[cfg(test)]
#[path = "explorer_tests.rs"]
mod tests;
