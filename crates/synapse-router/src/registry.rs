//! Handler registry: pattern-keyed dispatch with lazy construction
//!
//! Patterns are either exact tokens (`read`, `TodoWrite`) or prefixes ending
//! in `:` (`task:`, `mcp:`). For any command at most one entry wins: exact
//! beats prefix, and among prefixes the longest wins. Handlers may be
//! registered live or as factories that run on first lookup and cache.

use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::handler::Handler;
use synapse_core::{base_token, Error, Layer, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// Matches when the command's base token equals the pattern.
    Exact,
    /// Matches when the base token starts with the pattern; patterns always
    /// end with `:`.
    Prefix,
}

pub type HandlerFactory = Arc<dyn Fn() -> Option<Arc<dyn Handler>> + Send + Sync>;

pub struct RegistryEntry {
    pattern: String,
    mode: MatchMode,
    layer: Layer,
    cached: RwLock<Option<Arc<dyn Handler>>>,
    factory: Option<HandlerFactory>,
}

impl RegistryEntry {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    fn matches(&self, base: &str) -> bool {
        match self.mode {
            MatchMode::Exact => base == self.pattern,
            MatchMode::Prefix => base.starts_with(self.pattern.as_str()),
        }
    }

    /// Resolve to a live handler, running the factory on first use. A
    /// factory returning `None` is a handler-initialization failure,
    /// distinct from handler-not-found.
    pub fn resolve(&self) -> Result<Arc<dyn Handler>> {
        if let Some(handler) = self.cached.read().unwrap().clone() {
            return Ok(handler);
        }
        let mut cached = self.cached.write().unwrap();
        if let Some(handler) = cached.clone() {
            return Ok(handler);
        }
        let factory = self
            .factory
            .as_ref()
            .ok_or_else(|| Error::HandlerInit(self.pattern.clone()))?;
        match factory() {
            Some(handler) => {
                debug!(pattern = %self.pattern, "handler constructed lazily");
                *cached = Some(Arc::clone(&handler));
                Ok(handler)
            }
            None => Err(Error::HandlerInit(self.pattern.clone())),
        }
    }

    fn take_cached(&self) -> Option<Arc<dyn Handler>> {
        self.cached.write().unwrap().take()
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    entries: RwLock<Vec<Arc<RegistryEntry>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live handler. Replaces any entry with the same pattern.
    pub fn register(
        &self,
        pattern: impl Into<String>,
        layer: Layer,
        mode: MatchMode,
        handler: Arc<dyn Handler>,
    ) {
        self.insert(RegistryEntry {
            pattern: pattern.into(),
            mode,
            layer,
            cached: RwLock::new(Some(handler)),
            factory: None,
        });
    }

    /// Register a factory run on first matching lookup.
    pub fn register_factory(
        &self,
        pattern: impl Into<String>,
        layer: Layer,
        mode: MatchMode,
        factory: HandlerFactory,
    ) {
        self.insert(RegistryEntry {
            pattern: pattern.into(),
            mode,
            layer,
            cached: RwLock::new(None),
            factory: Some(factory),
        });
    }

    fn insert(&self, entry: RegistryEntry) {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|e| e.pattern != entry.pattern);
        entries.push(Arc::new(entry));
    }

    /// Find the winning entry for a command, if any.
    pub fn lookup(&self, command: &str) -> Option<Arc<RegistryEntry>> {
        let base = base_token(command);
        if base.is_empty() {
            return None;
        }
        let entries = self.entries.read().unwrap();

        let mut best: Option<&Arc<RegistryEntry>> = None;
        for entry in entries.iter().filter(|e| e.matches(base)) {
            best = Some(match best {
                None => entry,
                Some(current) => {
                    let entry_exact = entry.mode == MatchMode::Exact;
                    let current_exact = current.mode == MatchMode::Exact;
                    if entry_exact && !current_exact {
                        entry
                    } else if !entry_exact && current_exact {
                        current
                    } else if entry.pattern.len() > current.pattern.len() {
                        entry
                    } else {
                        current
                    }
                }
            });
        }
        best.cloned()
    }

    /// Drop every factory-built cached handler so the next lookup
    /// reconstructs it with whatever dependency was swapped underneath.
    pub fn invalidate_cached(&self) {
        let entries = self.entries.read().unwrap();
        for entry in entries.iter() {
            if entry.factory.is_some() {
                entry.take_cached();
            }
        }
        debug!("factory-built handlers invalidated");
    }

    /// Shut down every constructed handler, then clear the map.
    pub async fn shutdown_all(&self) {
        let handlers: Vec<Arc<dyn Handler>> = {
            let mut entries = self.entries.write().unwrap();
            let handlers = entries.iter().filter_map(|e| e.take_cached()).collect();
            entries.clear();
            handlers
        };
        for handler in handlers {
            handler.shutdown().await;
        }
    }

    pub fn patterns(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .map(|e| e.pattern.clone())
            .collect()
    }
}
