use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::status::{status_key, Status, UNKNOWN_STATUS};
use crate::events::topics::SettingsChanged;
use crate::events::{ChangeNotifier, SettingsChangedEvent};

pub const SETTINGS_DIR: &str = ".vault-status";
pub const SETTINGS_FILE: &str = "settings.toml";
pub const DEFAULT_TAG_PREFIX: &str = "status";
pub const DEFAULT_BATCH_REMOVE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub custom_statuses: Vec<Status>,
    pub status_colors: BTreeMap<String, String>,
    pub enabled_templates: Vec<String>,
    pub use_custom_statuses_only: bool,
    pub use_multiple_statuses: bool,
    pub tag_prefix: String,
    pub extra_status_keys: Vec<String>,
    pub strict_statuses: bool,
    pub show_status_icons_in_explorer: bool,
    pub hide_unknown_status_in_explorer: bool,
    pub exclude_unknown_status: bool,
    pub collapsed_statuses: BTreeMap<String, bool>,
    pub compact_view: bool,
    pub quick_status_commands: Vec<String>,
    pub batch_remove_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            custom_statuses: vec![
                Status::new("active", "▶️").with_description("Currently being worked on"),
                Status::new("onHold", "⏸️").with_description("Paused"),
                Status::new("completed", "✅").with_description("Finished"),
                Status::new("dropped", "❌").with_description("Abandoned"),
            ],
            status_colors: BTreeMap::from([
                ("active".to_string(), "#00ff00".to_string()),
                ("onHold".to_string(), "#ffa500".to_string()),
                ("completed".to_string(), "#0000ff".to_string()),
                ("dropped".to_string(), "#ff0000".to_string()),
            ]),
            enabled_templates: Vec::new(),
            use_custom_statuses_only: false,
            use_multiple_statuses: true,
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            extra_status_keys: Vec::new(),
            strict_statuses: false,
            show_status_icons_in_explorer: true,
            hide_unknown_status_in_explorer: false,
            exclude_unknown_status: true,
            collapsed_statuses: BTreeMap::new(),
            compact_view: false,
            quick_status_commands: vec!["active".to_string(), "completed".to_string()],
            batch_remove_threshold: DEFAULT_BATCH_REMOVE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SettingKey {
    CustomStatuses,
    StatusColors,
    EnabledTemplates,
    UseCustomStatusesOnly,
    UseMultipleStatuses,
    TagPrefix,
    ExtraStatusKeys,
    StrictStatuses,
    ShowStatusIconsInExplorer,
    HideUnknownStatusInExplorer,
    ExcludeUnknownStatus,
    CollapsedStatuses,
    CompactView,
    QuickStatusCommands,
    BatchRemoveThreshold,
}

impl SettingKey {
    pub const ALL: [SettingKey; 15] = [
        SettingKey::CustomStatuses,
        SettingKey::StatusColors,
        SettingKey::EnabledTemplates,
        SettingKey::UseCustomStatusesOnly,
        SettingKey::UseMultipleStatuses,
        SettingKey::TagPrefix,
        SettingKey::ExtraStatusKeys,
        SettingKey::StrictStatuses,
        SettingKey::ShowStatusIconsInExplorer,
        SettingKey::HideUnknownStatusInExplorer,
        SettingKey::ExcludeUnknownStatus,
        SettingKey::CollapsedStatuses,
        SettingKey::CompactView,
        SettingKey::QuickStatusCommands,
        SettingKey::BatchRemoveThreshold,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::CustomStatuses => "customStatuses",
            SettingKey::StatusColors => "statusColors",
            SettingKey::EnabledTemplates => "enabledTemplates",
            SettingKey::UseCustomStatusesOnly => "useCustomStatusesOnly",
            SettingKey::UseMultipleStatuses => "useMultipleStatuses",
            SettingKey::TagPrefix => "tagPrefix",
            SettingKey::ExtraStatusKeys => "extraStatusKeys",
            SettingKey::StrictStatuses => "strictStatuses",
            SettingKey::ShowStatusIconsInExplorer => "showStatusIconsInExplorer",
            SettingKey::HideUnknownStatusInExplorer => "hideUnknownStatusInExplorer",
            SettingKey::ExcludeUnknownStatus => "excludeUnknownStatus",
            SettingKey::CollapsedStatuses => "collapsedStatuses",
            SettingKey::CompactView => "compactView",
            SettingKey::QuickStatusCommands => "quickStatusCommands",
            SettingKey::BatchRemoveThreshold => "batchRemoveThreshold",
        }
    }

    /// Keys whose change alters the status catalog.
    pub fn affects_catalog(self) -> bool {
        matches!(
            self,
            SettingKey::CustomStatuses
                | SettingKey::EnabledTemplates
                | SettingKey::UseCustomStatusesOnly
                | SettingKey::StatusColors
        )
    }

    /// Keys whose change requires re-rendering every explorer icon.
    pub fn requires_icon_rescan(self) -> bool {
        matches!(
            self,
            SettingKey::TagPrefix
                | SettingKey::ExtraStatusKeys
                | SettingKey::StrictStatuses
                | SettingKey::UseMultipleStatuses
                | SettingKey::HideUnknownStatusInExplorer
                | SettingKey::CustomStatuses
                | SettingKey::EnabledTemplates
                | SettingKey::UseCustomStatusesOnly
        )
    }

    /// Parses a command-line representation of a value for this key.
    pub fn parse_value(self, raw: &str) -> Result<SettingValue, SettingsError> {
        let raw = raw.trim();
        match self {
            SettingKey::UseCustomStatusesOnly
            | SettingKey::UseMultipleStatuses
            | SettingKey::StrictStatuses
            | SettingKey::ShowStatusIconsInExplorer
            | SettingKey::HideUnknownStatusInExplorer
            | SettingKey::ExcludeUnknownStatus
            | SettingKey::CompactView => parse_bool(raw)
                .map(SettingValue::Bool)
                .ok_or_else(|| self.invalid(format!("expected true or false, got '{raw}'"))),
            SettingKey::TagPrefix => Ok(SettingValue::Text(raw.to_string())),
            SettingKey::EnabledTemplates
            | SettingKey::ExtraStatusKeys
            | SettingKey::QuickStatusCommands => Ok(SettingValue::List(split_list(raw))),
            SettingKey::BatchRemoveThreshold => raw
                .parse::<f64>()
                .map(SettingValue::Number)
                .map_err(|_| self.invalid(format!("expected a number, got '{raw}'"))),
            SettingKey::StatusColors => {
                let mut colors = BTreeMap::new();
                for (name, color) in split_pairs(self, raw)? {
                    colors.insert(name, color);
                }
                Ok(SettingValue::Colors(colors))
            }
            SettingKey::CollapsedStatuses => {
                let mut flags = BTreeMap::new();
                for (name, flag) in split_pairs(self, raw)? {
                    let flag = parse_bool(&flag)
                        .ok_or_else(|| self.invalid(format!("invalid flag '{flag}' for '{name}'")))?;
                    flags.insert(name, flag);
                }
                Ok(SettingValue::Flags(flags))
            }
            SettingKey::CustomStatuses => serde_json::from_str::<Vec<Status>>(raw)
                .map(SettingValue::Statuses)
                .map_err(|err| self.invalid(format!("expected a JSON status array: {err}"))),
        }
    }

    fn invalid(self, message: String) -> SettingsError {
        SettingsError::InvalidValue { key: self, message }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = compact_key(value);
        SettingKey::ALL
            .into_iter()
            .find(|key| compact_key(key.as_str()) == normalized)
            .ok_or_else(|| SettingsError::UnknownKey(value.trim().to_string()))
    }
}

fn compact_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|ch| !matches!(ch, '_' | '-'))
        .collect::<String>()
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
    Number(f64),
    Colors(BTreeMap<String, String>),
    Flags(BTreeMap<String, bool>),
    Statuses(Vec<Status>),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(value) => write!(f, "{value}"),
            SettingValue::Text(value) => f.write_str(value),
            SettingValue::List(values) => f.write_str(&values.join(",")),
            SettingValue::Number(value) => write!(f, "{value}"),
            SettingValue::Colors(values) => f.write_str(&join_pairs(values)),
            SettingValue::Flags(values) => f.write_str(&join_pairs(values)),
            SettingValue::Statuses(values) => {
                let names = values
                    .iter()
                    .map(|status| status.to_string())
                    .collect::<Vec<_>>();
                f.write_str(&names.join(", "))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown setting '{0}'")]
    UnknownKey(String),
    #[error("setting '{key}' expects a {expected} value")]
    TypeMismatch {
        key: SettingKey,
        expected: &'static str,
    },
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: SettingKey, message: String },
    #[error("invalid settings TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("I/O error while persisting settings: {0}")]
    Io(#[from] std::io::Error),
}

impl Settings {
    pub fn get(&self, key: SettingKey) -> SettingValue {
        match key {
            SettingKey::CustomStatuses => SettingValue::Statuses(self.custom_statuses.clone()),
            SettingKey::StatusColors => SettingValue::Colors(self.status_colors.clone()),
            SettingKey::EnabledTemplates => SettingValue::List(self.enabled_templates.clone()),
            SettingKey::UseCustomStatusesOnly => SettingValue::Bool(self.use_custom_statuses_only),
            SettingKey::UseMultipleStatuses => SettingValue::Bool(self.use_multiple_statuses),
            SettingKey::TagPrefix => SettingValue::Text(self.tag_prefix.clone()),
            SettingKey::ExtraStatusKeys => SettingValue::List(self.extra_status_keys.clone()),
            SettingKey::StrictStatuses => SettingValue::Bool(self.strict_statuses),
            SettingKey::ShowStatusIconsInExplorer => {
                SettingValue::Bool(self.show_status_icons_in_explorer)
            }
            SettingKey::HideUnknownStatusInExplorer => {
                SettingValue::Bool(self.hide_unknown_status_in_explorer)
            }
            SettingKey::ExcludeUnknownStatus => SettingValue::Bool(self.exclude_unknown_status),
            SettingKey::CollapsedStatuses => SettingValue::Flags(self.collapsed_statuses.clone()),
            SettingKey::CompactView => SettingValue::Bool(self.compact_view),
            SettingKey::QuickStatusCommands => {
                SettingValue::List(self.quick_status_commands.clone())
            }
            SettingKey::BatchRemoveThreshold => SettingValue::Number(self.batch_remove_threshold),
        }
    }

    /// Applies one typed change, validating it first.
    pub fn apply(&mut self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        match (key, value) {
            (SettingKey::CustomStatuses, SettingValue::Statuses(statuses)) => {
                self.custom_statuses = validate_custom_statuses(statuses)?;
            }
            (SettingKey::StatusColors, SettingValue::Colors(colors)) => {
                self.status_colors = colors;
            }
            (SettingKey::EnabledTemplates, SettingValue::List(ids)) => {
                self.enabled_templates = dedup_lowercase(ids);
            }
            (SettingKey::UseCustomStatusesOnly, SettingValue::Bool(flag)) => {
                self.use_custom_statuses_only = flag;
            }
            (SettingKey::UseMultipleStatuses, SettingValue::Bool(flag)) => {
                self.use_multiple_statuses = flag;
            }
            (SettingKey::TagPrefix, SettingValue::Text(prefix)) => {
                let prefix = prefix.trim();
                if prefix.is_empty() {
                    return Err(SettingsError::InvalidValue {
                        key,
                        message: "front-matter key cannot be empty".to_string(),
                    });
                }
                self.tag_prefix = prefix.to_string();
            }
            (SettingKey::ExtraStatusKeys, SettingValue::List(keys)) => {
                self.extra_status_keys = keys
                    .into_iter()
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
                    .collect();
            }
            (SettingKey::StrictStatuses, SettingValue::Bool(flag)) => {
                self.strict_statuses = flag;
            }
            (SettingKey::ShowStatusIconsInExplorer, SettingValue::Bool(flag)) => {
                self.show_status_icons_in_explorer = flag;
            }
            (SettingKey::HideUnknownStatusInExplorer, SettingValue::Bool(flag)) => {
                self.hide_unknown_status_in_explorer = flag;
            }
            (SettingKey::ExcludeUnknownStatus, SettingValue::Bool(flag)) => {
                self.exclude_unknown_status = flag;
            }
            (SettingKey::CollapsedStatuses, SettingValue::Flags(flags)) => {
                self.collapsed_statuses = flags;
            }
            (SettingKey::CompactView, SettingValue::Bool(flag)) => {
                self.compact_view = flag;
            }
            (SettingKey::QuickStatusCommands, SettingValue::List(names)) => {
                self.quick_status_commands = names
                    .into_iter()
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect();
            }
            (SettingKey::BatchRemoveThreshold, SettingValue::Number(threshold)) => {
                if !(0.0..1.0).contains(&threshold) {
                    return Err(SettingsError::InvalidValue {
                        key,
                        message: format!("threshold must be in [0, 1), got {threshold}"),
                    });
                }
                self.batch_remove_threshold = threshold;
            }
            (key, _) => {
                return Err(SettingsError::TypeMismatch {
                    key,
                    expected: expected_kind(key),
                });
            }
        }
        Ok(())
    }

    /// Front-matter keys scanned for statuses, primary key first.
    pub fn status_keys(&self) -> Vec<String> {
        let mut keys = vec![self.tag_prefix.clone()];
        for key in &self.extra_status_keys {
            if !keys.iter().any(|existing| existing == key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    pub fn is_collapsed(&self, status: &str) -> bool {
        self.collapsed_statuses
            .iter()
            .any(|(name, collapsed)| *collapsed && status_key(name) == status_key(status))
    }
}

fn expected_kind(key: SettingKey) -> &'static str {
    match key {
        SettingKey::CustomStatuses => "status list",
        SettingKey::StatusColors => "color map",
        SettingKey::CollapsedStatuses => "flag map",
        SettingKey::TagPrefix => "text",
        SettingKey::BatchRemoveThreshold => "number",
        SettingKey::EnabledTemplates
        | SettingKey::ExtraStatusKeys
        | SettingKey::QuickStatusCommands => "list",
        _ => "boolean",
    }
}

fn validate_custom_statuses(statuses: Vec<Status>) -> Result<Vec<Status>, SettingsError> {
    let mut seen = Vec::new();
    let mut validated = Vec::with_capacity(statuses.len());
    for mut status in statuses {
        let key = status.key();
        if key.is_empty() || key == UNKNOWN_STATUS {
            return Err(SettingsError::InvalidValue {
                key: SettingKey::CustomStatuses,
                message: format!("'{}' is not a valid status name", status.name),
            });
        }
        if seen.contains(&key) {
            return Err(SettingsError::InvalidValue {
                key: SettingKey::CustomStatuses,
                message: format!("duplicate status '{}'", status.name),
            });
        }
        seen.push(key);
        status.name = status.name.trim().to_string();
        status.template_id = None;
        validated.push(status);
    }
    Ok(validated)
}

/// Load-time counterpart of [`validate_custom_statuses`]: invalid and
/// case-duplicate entries are dropped, first one wins.
fn sanitize_custom_statuses(statuses: Vec<Status>) -> Vec<Status> {
    let mut seen = Vec::new();
    let mut kept = Vec::with_capacity(statuses.len());
    for mut status in statuses {
        let key = status.key();
        if key.is_empty() || key == UNKNOWN_STATUS || seen.contains(&key) {
            tracing::warn!(status = %status.name, "dropping invalid custom status from settings");
            continue;
        }
        seen.push(key);
        status.name = status.name.trim().to_string();
        status.template_id = None;
        kept.push(status);
    }
    kept
}

fn dedup_lowercase(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let normalized = value.trim().to_ascii_lowercase();
        if !normalized.is_empty() && !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_pairs(key: SettingKey, raw: &str) -> Result<Vec<(String, String)>, SettingsError> {
    split_list(raw)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(key.invalid(format!("expected name=value, got '{pair}'"))),
        })
        .collect()
}

fn join_pairs<V: fmt::Display>(values: &BTreeMap<String, V>) -> String {
    values
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings, SettingsError>;
    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;
}

/// TOML file under the vault's `.vault-status/` directory.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn for_vault(vault_root: &Path) -> Self {
        Self {
            path: vault_root.join(SETTINGS_DIR).join(SETTINGS_FILE),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&raw)?)
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(settings)?;
        let staging = self.path.with_extension("toml.tmp");
        std::fs::write(&staging, rendered)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    saved: Mutex<Option<Settings>>,
    fail_saves: Mutex<bool>,
}

#[cfg(test)]
impl MemorySettingsStore {
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            saved: Mutex::new(Some(settings)),
            fail_saves: Mutex::new(false),
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }

    pub fn saved(&self) -> Option<Settings> {
        self.saved.lock().clone()
    }
}

#[cfg(test)]
impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        Ok(self.saved.lock().clone().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if *self.fail_saves.lock() {
            return Err(SettingsError::Io(std::io::Error::other("settings store rejected write")));
        }
        *self.saved.lock() = Some(settings.clone());
        Ok(())
    }
}

/// Sole owner of the settings snapshot.
///
/// Readers take an `Arc<Settings>` snapshot; writers go through
/// [`SettingsService::on_settings_change`], which persists, swaps the snapshot
/// wholesale and only then publishes `SettingsChanged`.
pub struct SettingsService {
    current: ArcSwap<Settings>,
    store: Arc<dyn SettingsStore>,
    notifier: Arc<ChangeNotifier>,
    write_lock: Mutex<()>,
}

impl SettingsService {
    pub fn open(
        store: Arc<dyn SettingsStore>,
        notifier: Arc<ChangeNotifier>,
    ) -> Result<Self, SettingsError> {
        let mut settings = store.load()?;
        settings.custom_statuses = sanitize_custom_statuses(settings.custom_statuses);
        Ok(Self {
            current: ArcSwap::from_pointee(settings),
            store,
            notifier,
            write_lock: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    pub fn on_settings_change(
        &self,
        key: SettingKey,
        value: SettingValue,
    ) -> Result<Arc<Settings>, SettingsError> {
        let snapshot = {
            let _guard = self.write_lock.lock();
            let mut next = Settings::clone(&self.current.load());
            next.apply(key, value)?;
            self.store.save(&next)?;
            let snapshot = Arc::new(next);
            self.current.store(Arc::clone(&snapshot));
            snapshot
        };

        tracing::info!(key = %key, "settings changed");
        self.notifier.publish::<SettingsChanged>(SettingsChangedEvent {
            key,
            value: snapshot.get(key),
            snapshot: Arc::clone(&snapshot),
        });
        Ok(snapshot)
    }

    /// Fills in colors for names that have none yet. Does not publish.
    pub fn backfill_status_colors(
        &self,
        colors: &BTreeMap<String, String>,
    ) -> Result<bool, SettingsError> {
        let _guard = self.write_lock.lock();
        let mut next = Settings::clone(&self.current.load());
        let mut changed = false;
        for (name, color) in colors {
            if !next.status_colors.contains_key(name) {
                next.status_colors.insert(name.clone(), color.clone());
                changed = true;
            }
        }
        if !changed {
            return Ok(false);
        }
        self.store.save(&next)?;
        self.current.store(Arc::new(next));
        tracing::debug!(count = colors.len(), "backfilled template status colors");
        Ok(true)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
