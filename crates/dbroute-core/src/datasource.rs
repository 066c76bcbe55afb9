//! Physical data source registry

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{DataSourceDescriptor, RouterSettings};

/// Registry of named physical data sources plus one default
///
/// `T` is whatever handle the connection layer uses (a pool, a client, a descriptor).
/// The registry never opens connections itself.
pub struct DataSourceRegistry<T> {
    targets: Arc<RwLock<HashMap<String, Arc<T>>>>,
    default: Arc<T>,
}

impl<T> DataSourceRegistry<T> {
    /// Create an empty registry with the given default target
    pub fn new(default: T) -> Self {
        Self {
            targets: Arc::new(RwLock::new(HashMap::new())),
            default: Arc::new(default),
        }
    }

    /// Build a registry from settings, turning each descriptor into a target
    pub fn from_settings<F>(settings: &RouterSettings, mut build: F) -> Self
    where
        F: FnMut(&str, &DataSourceDescriptor) -> T,
    {
        let registry = Self::new(build("default", &settings.default_data_source));
        for (name, descriptor) in &settings.data_sources {
            registry.register(name.clone(), build(name, descriptor));
        }

        info!(
            data_sources = settings.data_sources.len(),
            "Data source registry initialised"
        );
        registry
    }

    /// Register a target, replacing any existing one with the same name
    pub fn register(&self, name: impl Into<String>, target: T) {
        let name = name.into();
        let replaced = self
            .targets
            .write()
            .insert(name.clone(), Arc::new(target))
            .is_some();

        debug!(name = %name, replaced, "Data source registered");
    }

    /// Remove a target
    pub fn deregister(&self, name: &str) -> Option<Arc<T>> {
        self.targets.write().remove(name)
    }

    /// Get a target by name
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.targets.read().get(name).cloned()
    }

    /// The default target
    pub fn default_target(&self) -> Arc<T> {
        Arc::clone(&self.default)
    }

    /// Look up a target; `None` selects the default
    pub fn resolve(&self, name: Option<&str>) -> Option<Arc<T>> {
        match name {
            Some(name) => self.get(name),
            None => Some(self.default_target()),
        }
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.targets.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.targets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.read().is_empty()
    }
}

impl<T> Clone for DataSourceRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            targets: Arc::clone(&self.targets),
            default: Arc::clone(&self.default),
        }
    }
}
