use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::domain::status::{is_unknown, is_unknown_only, unknown_floor};
use crate::registry::StatusRegistry;
use crate::settings::{Settings, SettingsService};
use crate::vault::{Frontmatter, FrontmatterStore, VaultError, VaultFile};

/// Resolved statuses of one document, per scanned front-matter key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatusSet {
    pub path: String,
    pub by_key: Vec<(String, Vec<String>)>,
    pub statuses: Vec<String>,
}

impl FileStatusSet {
    pub fn primary(&self) -> &str {
        self.statuses
            .first()
            .map(String::as_str)
            .unwrap_or(crate::domain::status::UNKNOWN_STATUS)
    }

    pub fn is_unknown(&self) -> bool {
        is_unknown_only(&self.statuses)
    }
}

/// Raw status strings stored in a front-matter value, trimmed, blanks dropped.
/// Arrays yield every element, scalars one element.
pub fn raw_status_values(value: Option<&Value>) -> Vec<String> {
    let scalar = |value: &Value| match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    };
    let values = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
        Some(other) => scalar(other).into_iter().collect(),
    };
    values.into_iter().filter(|value| !value.is_empty()).collect()
}

/// Normalizes one front-matter value to a never-empty list of status names.
pub fn resolve_with(
    value: Option<&Value>,
    settings: &Settings,
    registry: &StatusRegistry,
) -> Vec<String> {
    let mut resolved = Vec::new();
    for raw in raw_status_values(value) {
        match registry.canonical_name(&raw) {
            Some(name) => resolved.push(name),
            None if settings.strict_statuses => {}
            None => resolved.push(raw),
        }
    }
    if !settings.use_multiple_statuses {
        resolved.truncate(1);
    }
    if resolved.is_empty() {
        return unknown_floor();
    }
    resolved
}

/// Merges per-key results in key order; `unknown` floors vanish unless every
/// key resolved to nothing.
fn merge_keys(per_key: &[(String, Vec<String>)], settings: &Settings) -> Vec<String> {
    let mut merged = per_key
        .iter()
        .flat_map(|(_, statuses)| statuses.iter())
        .filter(|status| !is_unknown(status))
        .cloned()
        .collect::<Vec<_>>();
    if !settings.use_multiple_statuses {
        merged.truncate(1);
    }
    if merged.is_empty() {
        return unknown_floor();
    }
    merged
}

/// Reads front-matter through the store and resolves it against the catalog.
#[derive(Clone)]
pub struct StatusResolver {
    settings: Arc<SettingsService>,
    registry: Arc<StatusRegistry>,
    store: Arc<dyn FrontmatterStore>,
}

impl StatusResolver {
    pub fn new(
        settings: Arc<SettingsService>,
        registry: Arc<StatusRegistry>,
        store: Arc<dyn FrontmatterStore>,
    ) -> Self {
        Self {
            settings,
            registry,
            store,
        }
    }

    pub fn resolve_value(&self, value: &Value) -> Vec<String> {
        resolve_with(Some(value), &self.settings.snapshot(), &self.registry)
    }

    /// Resolves an already-read front-matter mapping.
    pub fn resolve_frontmatter(&self, file: &VaultFile, frontmatter: &Frontmatter) -> FileStatusSet {
        let settings = self.settings.snapshot();
        let by_key = settings
            .status_keys()
            .into_iter()
            .map(|key| {
                let statuses = resolve_with(frontmatter.get(&key), &settings, &self.registry);
                (key, statuses)
            })
            .collect::<Vec<_>>();
        let statuses = merge_keys(&by_key, &settings);
        FileStatusSet {
            path: file.path().to_string(),
            by_key,
            statuses,
        }
    }

    pub async fn file_status_set(&self, file: &VaultFile) -> Result<FileStatusSet, VaultError> {
        let frontmatter = self.store.read_frontmatter(file).await?;
        Ok(self.resolve_frontmatter(file, &frontmatter))
    }

    pub async fn file_statuses(&self, file: &VaultFile) -> Result<Vec<String>, VaultError> {
        Ok(self.file_status_set(file).await?.statuses)
    }

    pub async fn file_primary_status(&self, file: &VaultFile) -> Result<String, VaultError> {
        Ok(self.file_status_set(file).await?.primary().to_string())
    }

    pub fn store(&self) -> &Arc<dyn FrontmatterStore> {
        &self.store
    }
}
