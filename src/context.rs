use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::events::{ChangeNotifier, Subscription};
use crate::mutator::StatusMutator;
use crate::registry::StatusRegistry;
use crate::resolver::StatusResolver;
use crate::settings::{SettingsError, SettingsService, SettingsStore};
use crate::templates::{TemplateError, TemplateRegistry};
use crate::vault::FrontmatterStore;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("'{0}' is already running in this context")]
    DuplicateSingleton(&'static str),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Templates(#[from] TemplateError),
}

/// Everything a component needs, built once and passed explicitly.
pub struct AppContext {
    pub notifier: Arc<ChangeNotifier>,
    pub settings: Arc<SettingsService>,
    pub templates: Arc<TemplateRegistry>,
    pub registry: Arc<StatusRegistry>,
    pub resolver: StatusResolver,
    pub mutator: StatusMutator,
    pub store: Arc<dyn FrontmatterStore>,
    singletons: Mutex<BTreeSet<&'static str>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl AppContext {
    pub fn new(
        settings_store: Arc<dyn SettingsStore>,
        store: Arc<dyn FrontmatterStore>,
    ) -> Result<Arc<Self>, ContextError> {
        let notifier = ChangeNotifier::new();
        let settings = Arc::new(SettingsService::open(settings_store, Arc::clone(&notifier))?);
        let templates = Arc::new(TemplateRegistry::load()?);
        let registry = StatusRegistry::new(Arc::clone(&settings), Arc::clone(&templates));
        let registry_subscription = registry.attach(&notifier);
        let resolver = StatusResolver::new(
            Arc::clone(&settings),
            Arc::clone(&registry),
            Arc::clone(&store),
        );
        let mutator = StatusMutator::new(
            Arc::clone(&settings),
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&notifier),
        );

        Ok(Arc::new(Self {
            notifier,
            settings,
            templates,
            registry,
            resolver,
            mutator,
            store,
            singletons: Mutex::new(BTreeSet::new()),
            subscriptions: Mutex::new(vec![registry_subscription]),
        }))
    }

    /// Marks `name` as constructed. A second claim fails until released.
    pub fn claim_singleton(&self, name: &'static str) -> Result<(), ContextError> {
        if !self.singletons.lock().insert(name) {
            return Err(ContextError::DuplicateSingleton(name));
        }
        Ok(())
    }

    pub fn release_singleton(&self, name: &'static str) -> bool {
        self.singletons.lock().remove(name)
    }

    pub fn close(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }
}
