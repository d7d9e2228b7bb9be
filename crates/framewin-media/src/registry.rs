//! Extension to backend lookup.

use crate::backend::{BackendFactory, DecodeBackend};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Extension that matches every file without a more specific entry.
pub const WILDCARD: &str = "*";

/// Table of backend factories keyed by lower-case file extension.
#[derive(Debug, Default, Clone)]
pub struct ReaderRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `extension` (with or without the leading dot).
    ///
    /// The first registration for an extension wins; later ones are ignored
    /// and `false` is returned.
    pub fn register(&mut self, extension: &str, factory: BackendFactory) -> bool {
        let key = normalize(extension);
        if self.factories.contains_key(&key) {
            debug!("Extension {:?} already registered, ignoring", key);
            return false;
        }
        info!("Registered video reader for {:?}", key);
        self.factories.insert(key, factory);
        true
    }

    pub fn is_registered(&self, extension: &str) -> bool {
        self.factories.contains_key(&normalize(extension))
    }

    /// Factory for `extension`, falling back to the wildcard entry.
    pub fn factory_for(&self, extension: &str) -> Option<BackendFactory> {
        self.factories
            .get(&normalize(extension))
            .or_else(|| self.factories.get(WILDCARD))
            .copied()
    }

    /// Fresh backend for the file at `path`, chosen by its extension.
    pub fn create_for_path(&self, path: &Path) -> Option<Box<dyn DecodeBackend>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.factory_for(extension).map(|factory| factory())
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<_> = self.factories.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_lowercase()
}
