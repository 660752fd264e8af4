use std::collections::BTreeMap;

use serde::Serialize;

use crate::context::AppContext;
use crate::domain::status::{is_unknown, status_key, Status, UNKNOWN_STATUS};
use crate::registry::StatusRegistry;
use crate::resolver::FileStatusSet;
use crate::settings::{SettingKey, SettingValue, Settings, SettingsError};
use crate::vault::{VaultError, VaultFile};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFilter {
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusGroup {
    pub status: String,
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub collapsed: bool,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedView {
    pub groups: Vec<StatusGroup>,
    pub total_files: usize,
    pub hidden_unassigned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub icon: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub total_files: usize,
    pub with_status: usize,
    pub unassigned: usize,
    pub share_with_status: f64,
    pub counts: Vec<StatusCount>,
}

/// Resolves every markdown file of the vault. Unreadable files are skipped.
pub async fn collect_status_sets(context: &AppContext) -> Result<Vec<FileStatusSet>, VaultError> {
    let mut sets = Vec::new();
    for file in context.store.list_files().await? {
        if !file.is_markdown() {
            continue;
        }
        match context.resolver.file_status_set(&file).await {
            Ok(set) => sets.push(set),
            Err(err) => tracing::warn!(path = %file, error = %err, "skipping unreadable file"),
        }
    }
    Ok(sets)
}

/// Groups files by status: catalog order first, then lenient names the
/// catalog does not know, then `unknown` unless excluded.
pub fn group_by_status(
    sets: &[FileStatusSet],
    catalog: &[Status],
    registry: &StatusRegistry,
    settings: &Settings,
    filter: &GroupFilter,
) -> GroupedView {
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|query| !query.is_empty())
        .map(str::to_lowercase);

    let mut members: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut spelling: BTreeMap<String, String> = BTreeMap::new();
    let mut total_files = 0;
    let mut hidden_unassigned = 0;
    for set in sets {
        if let Some(query) = search.as_deref() {
            if !matches_search(&set.path, query) {
                continue;
            }
        }
        total_files += 1;
        if set.is_unknown() && settings.exclude_unknown_status {
            hidden_unassigned += 1;
            continue;
        }
        for status in &set.statuses {
            let key = status_key(status);
            let files = members.entry(key.clone()).or_default();
            if !files.contains(&set.path) {
                files.push(set.path.clone());
            }
            spelling.entry(key).or_insert_with(|| status.clone());
        }
    }

    let mut order = catalog.iter().map(Status::key).collect::<Vec<_>>();
    let mut extras = members
        .keys()
        .filter(|key| !order.contains(key) && !is_unknown(key))
        .cloned()
        .collect::<Vec<_>>();
    extras.sort();
    order.extend(extras);
    order.push(UNKNOWN_STATUS.to_string());

    let groups = order
        .into_iter()
        .filter_map(|key| {
            let files = members.remove(&key)?;
            let name = catalog
                .iter()
                .find(|status| status.key() == key)
                .map(|status| status.name.clone())
                .or_else(|| spelling.get(&key).cloned())
                .unwrap_or(key);
            Some(StatusGroup {
                icon: registry.status_icon(&name),
                color: registry.status_color(&name),
                collapsed: settings.is_collapsed(&name),
                status: name,
                files,
            })
        })
        .collect();

    GroupedView {
        groups,
        total_files,
        hidden_unassigned,
    }
}

fn matches_search(path: &str, query: &str) -> bool {
    let file = VaultFile::new(path);
    file.path().to_lowercase().contains(query) || file.basename().to_lowercase().contains(query)
}

/// Per-status counts across the vault. Catalog statuses are listed even when
/// no file carries them.
pub fn build_dashboard(
    sets: &[FileStatusSet],
    catalog: &[Status],
    registry: &StatusRegistry,
) -> Dashboard {
    let mut counts: Vec<StatusCount> = catalog
        .iter()
        .map(|status| StatusCount {
            status: status.name.clone(),
            icon: status.icon.clone(),
            count: 0,
        })
        .collect();
    let mut unassigned = 0;
    for set in sets {
        if set.is_unknown() {
            unassigned += 1;
            continue;
        }
        let mut seen = Vec::new();
        for status in &set.statuses {
            let key = status_key(status);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key.clone());
            match counts.iter_mut().find(|count| status_key(&count.status) == key) {
                Some(count) => count.count += 1,
                None => counts.push(StatusCount {
                    status: status.clone(),
                    icon: registry.status_icon(status),
                    count: 1,
                }),
            }
        }
    }

    let total_files = sets.len();
    let with_status = total_files - unassigned;
    let share_with_status = if total_files == 0 {
        0.0
    } else {
        with_status as f64 / total_files as f64
    };
    Dashboard {
        total_files,
        with_status,
        unassigned,
        share_with_status,
        counts,
    }
}

/// Reveals the `unknown` group by turning `excludeUnknownStatus` off.
pub fn show_unassigned(context: &AppContext) -> Result<bool, SettingsError> {
    if !context.settings.snapshot().exclude_unknown_status {
        return Ok(false);
    }
    context
        .settings
        .on_settings_change(SettingKey::ExcludeUnknownStatus, SettingValue::Bool(false))?;
    Ok(true)
}

pub async fn grouped_view(
    context: &AppContext,
    filter: &GroupFilter,
) -> Result<GroupedView, VaultError> {
    let sets = collect_status_sets(context).await?;
    let catalog = context.registry.all_statuses();
    let settings = context.settings.snapshot();
    Ok(group_by_status(
        &sets,
        &catalog,
        &context.registry,
        &settings,
        filter,
    ))
}

pub async fn dashboard(context: &AppContext) -> Result<Dashboard, VaultError> {
    let sets = collect_status_sets(context).await?;
    let catalog = context.registry.all_statuses();
    Ok(build_dashboard(&sets, &catalog, &context.registry))
}
