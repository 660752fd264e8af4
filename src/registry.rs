use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::domain::status::{status_key, Status, StatusRef, FALLBACK_ICON, UNKNOWN_STATUS};
use crate::events::topics::SettingsChanged;
use crate::events::{ChangeNotifier, Subscription};
use crate::settings::{Settings, SettingsService};
use crate::templates::TemplateRegistry;

const SUBSCRIBER_ID: &str = "status-registry";

/// The de-duplicated status catalog derived from settings and templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCatalog {
    pub statuses: Vec<Status>,
    /// Template colors for names that `statusColors` does not cover yet.
    #[serde(skip)]
    pub color_backfill: BTreeMap<String, String>,
}

/// Custom statuses first, then every enabled template's statuses whose name is
/// not taken yet. Pure; the backfill is returned, never applied.
pub fn build_catalog(settings: &Settings, templates: &TemplateRegistry) -> StatusCatalog {
    let mut catalog = StatusCatalog {
        statuses: settings.custom_statuses.clone(),
        color_backfill: BTreeMap::new(),
    };
    if settings.use_custom_statuses_only {
        return catalog;
    }

    for template_id in &settings.enabled_templates {
        let Some(template) = templates.get(template_id) else {
            tracing::warn!(template = %template_id, "enabled template is not defined; skipping");
            continue;
        };
        for status in &template.statuses {
            let key = status.key();
            let taken = catalog
                .statuses
                .iter()
                .any(|existing| existing.key() == key);
            if !taken {
                catalog.statuses.push(status.clone());
                continue;
            }
            let Some(color) = status.color.as_ref() else {
                continue;
            };
            let has_color = settings
                .status_colors
                .keys()
                .any(|name| status_key(name) == key);
            if !has_color && !catalog.color_backfill.contains_key(&status.name) {
                catalog
                    .color_backfill
                    .insert(status.name.clone(), color.clone());
            }
        }
    }
    catalog
}

/// Catalog owner. Readers get cheap snapshots; the catalog is rebuilt on
/// catalog-relevant `SettingsChanged` events.
pub struct StatusRegistry {
    catalog: ArcSwap<StatusCatalog>,
    settings: Arc<SettingsService>,
    templates: Arc<TemplateRegistry>,
}

impl StatusRegistry {
    pub fn new(settings: Arc<SettingsService>, templates: Arc<TemplateRegistry>) -> Arc<Self> {
        let registry = Arc::new(Self {
            catalog: ArcSwap::from_pointee(StatusCatalog::default()),
            settings,
            templates,
        });
        registry.rebuild(&registry.settings.snapshot());
        registry
    }

    /// Subscribes the registry to settings changes.
    pub fn attach(self: &Arc<Self>, notifier: &Arc<ChangeNotifier>) -> Subscription {
        let registry: Weak<Self> = Arc::downgrade(self);
        notifier.subscribe::<SettingsChanged, _>(SUBSCRIBER_ID, move |envelope| {
            let event = &envelope.payload;
            if !event.key.affects_catalog() {
                return;
            }
            if let Some(registry) = registry.upgrade() {
                tracing::debug!(key = %event.key, "rebuilding status catalog");
                registry.rebuild(&event.snapshot);
            }
        })
    }

    fn rebuild(&self, settings: &Settings) {
        let catalog = build_catalog(settings, &self.templates);
        if !catalog.color_backfill.is_empty() {
            if let Err(err) = self.settings.backfill_status_colors(&catalog.color_backfill) {
                tracing::warn!(error = %err, "failed to persist template color backfill");
            }
        }
        self.catalog.store(Arc::new(catalog));
    }

    pub fn catalog(&self) -> Arc<StatusCatalog> {
        self.catalog.load_full()
    }

    pub fn all_statuses(&self) -> Vec<Status> {
        self.catalog.load().statuses.clone()
    }

    /// Looks a status up by bare or `template:name` reference.
    ///
    /// A scoped reference to an enabled template whose status is shadowed by
    /// a custom status resolves to the custom entry.
    pub fn status(&self, raw: &str) -> Option<Status> {
        let catalog = self.catalog.load();
        if let Some(found) = catalog.statuses.iter().find(|status| status.matches(raw)) {
            return Some(found.clone());
        }
        let reference = StatusRef::parse(raw);
        let template_id = reference.template_id?;
        let settings = self.settings.snapshot();
        if !settings.enabled_templates.contains(&template_id) {
            return None;
        }
        let template = self.templates.get(&template_id)?;
        template
            .statuses
            .iter()
            .find(|status| status.key() == reference.name)?;
        catalog
            .statuses
            .iter()
            .find(|status| status.key() == reference.name)
            .cloned()
    }

    /// The catalog spelling of `raw`, if it names a known status.
    pub fn canonical_name(&self, raw: &str) -> Option<String> {
        self.status(raw).map(|status| status.name)
    }

    pub fn is_known(&self, raw: &str) -> bool {
        self.status(raw).is_some()
    }

    pub fn status_icon(&self, raw: &str) -> String {
        if status_key(raw) == UNKNOWN_STATUS {
            return FALLBACK_ICON.to_string();
        }
        self.status(raw)
            .map(|status| status.icon)
            .unwrap_or_else(|| FALLBACK_ICON.to_string())
    }

    /// Color from `statusColors`, falling back to the status's own color.
    pub fn status_color(&self, raw: &str) -> Option<String> {
        let name = StatusRef::parse(raw).name;
        let settings = self.settings.snapshot();
        let configured = settings
            .status_colors
            .iter()
            .find(|(candidate, _)| status_key(candidate) == name)
            .map(|(_, color)| color.clone());
        configured.or_else(|| self.status(raw).and_then(|status| status.color))
    }

    pub fn status_description(&self, raw: &str) -> Option<String> {
        self.status(raw).and_then(|status| status.description)
    }

    /// Statuses contributed by the enabled templates, in settings order.
    pub fn template_statuses(&self) -> Vec<Status> {
        let settings = self.settings.snapshot();
        settings
            .enabled_templates
            .iter()
            .filter_map(|id| self.templates.get(id))
            .flat_map(|template| template.statuses.iter().cloned())
            .collect()
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }
}
