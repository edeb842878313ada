//! Named-list registry: maps a logical list name to its compiled engine.
//!
//! An explicit object owned by the embedding layer, not a process-wide
//! singleton. Reads (lookup, snapshot) take a short read lock and clone
//! `Arc`s; a reload builds the replacement engine first and then swaps
//! the reference atomically, so in-flight matches keep the old engine
//! and never observe a partially-built one.

use std::path::Path;
use std::sync::{Arc, RwLock};

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::engine::{Engine, EngineError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown list `{0}`")]
    UnknownList(String),
    #[error("failed to read list file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Default)]
pub struct EngineRegistry {
    // Insertion order is consultation order for multi-list decisions.
    entries: RwLock<Vec<(String, ArcSwap<Engine>)>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `text` and register it under `name`. Replaces an existing
    /// list of the same name atomically (keeping its position); a failed
    /// compile leaves the previous engine untouched and serving.
    pub fn insert(&self, name: &str, text: &str) -> Result<Arc<Engine>, RegistryError> {
        let engine = Arc::new(Engine::from_filter_list(text)?);

        let mut entries = self.entries.write().unwrap();
        match entries.iter().find(|(n, _)| n == name) {
            Some((_, slot)) => slot.store(Arc::clone(&engine)),
            None => entries.push((name.to_string(), ArcSwap::from(Arc::clone(&engine)))),
        }
        log::info!("registered list `{name}` ({} rules)", engine.rule_count());
        Ok(engine)
    }

    /// Compile a list read from `path` and register it under `name`.
    pub fn insert_from_path(
        &self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<Arc<Engine>, RegistryError> {
        let text = std::fs::read_to_string(path)?;
        self.insert(name, &text)
    }

    /// Rebuild the engine for an already-registered list. Unlike
    /// [`insert`](Self::insert), an unknown name is an error.
    pub fn reload(&self, name: &str, text: &str) -> Result<Arc<Engine>, RegistryError> {
        // Build outside the lock; the old engine serves until the store.
        let engine = Arc::new(Engine::from_filter_list(text)?);

        let entries = self.entries.read().unwrap();
        let Some((_, slot)) = entries.iter().find(|(n, _)| n == name) else {
            return Err(RegistryError::UnknownList(name.to_string()));
        };
        slot.store(Arc::clone(&engine));
        log::info!("reloaded list `{name}` ({} rules)", engine.rule_count());
        Ok(engine)
    }

    /// Drop a list. Engines already handed out keep working; only the
    /// registry's reference goes away.
    pub fn remove(&self, name: &str) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|(n, _)| n != name);
        if entries.len() == before {
            return Err(RegistryError::UnknownList(name.to_string()));
        }
        Ok(())
    }

    /// Look up the current engine for a name.
    pub fn get(&self, name: &str) -> Option<Arc<Engine>> {
        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| slot.load_full())
    }

    /// Snapshot of all engines in registration order; the consultation
    /// order for multi-list decisions.
    pub fn engines(&self) -> Vec<Arc<Engine>> {
        let entries = self.entries.read().unwrap();
        entries.iter().map(|(_, slot)| slot.load_full()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap();
        entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("lists", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let registry = EngineRegistry::new();
        registry.insert("ads", "||ads.example.com^\n").unwrap();

        let engine = registry.get("ads").expect("registered list");
        assert_eq!(engine.rule_count(), 1);

        registry.remove("ads").unwrap();
        assert!(registry.get("ads").is_none());
        assert!(matches!(
            registry.remove("ads"),
            Err(RegistryError::UnknownList(_))
        ));
    }

    #[test]
    fn insert_from_path_reads_list_file() {
        let path = std::env::temp_dir().join("ws-registry-test-list.txt");
        std::fs::write(&path, "||ads.example.com^\n/banner/\n").unwrap();

        let registry = EngineRegistry::new();
        let engine = registry.insert_from_path("ads", &path).unwrap();
        assert_eq!(engine.rule_count(), 2);

        std::fs::remove_file(&path).ok();

        assert!(matches!(
            registry.insert_from_path("missing", "/nonexistent/list.txt"),
            Err(RegistryError::Io(_))
        ));
    }

    #[test]
    fn consultation_order_is_insertion_order() {
        let registry = EngineRegistry::new();
        registry.insert("first", "/one/\n").unwrap();
        registry.insert("second", "/two/\n").unwrap();
        assert_eq!(registry.names(), vec!["first", "second"]);
        assert_eq!(registry.engines().len(), 2);
    }

    #[test]
    fn reload_swaps_without_disturbing_old_handles() {
        let registry = EngineRegistry::new();
        registry.insert("ads", "||ads.example.com^\n").unwrap();
        let old = registry.get("ads").unwrap();

        registry
            .reload("ads", "||ads.example.com^\n/banner/\n")
            .unwrap();

        // The handle captured before the reload still serves the old set.
        assert_eq!(old.rule_count(), 1);
        assert_eq!(registry.get("ads").unwrap().rule_count(), 2);
    }

    #[test]
    fn failed_reload_keeps_previous_engine() {
        let registry = EngineRegistry::new();
        registry.insert("ads", "||ads.example.com^\n").unwrap();

        assert!(registry.reload("ads", "$bogus\n").is_err());
        assert_eq!(registry.get("ads").unwrap().rule_count(), 1);
    }

    #[test]
    fn reload_unknown_name_is_error() {
        let registry = EngineRegistry::new();
        assert!(matches!(
            registry.reload("missing", "/x/\n"),
            Err(RegistryError::UnknownList(_))
        ));
    }

    #[test]
    fn insert_replaces_in_place() {
        let registry = EngineRegistry::new();
        registry.insert("a", "/one/\n").unwrap();
        registry.insert("b", "/two/\n").unwrap();
        registry.insert("a", "/one/\n/uno/\n").unwrap();

        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().rule_count(), 2);
    }
}
