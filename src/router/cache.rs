//! Handler cache — fully decorated router handlers keyed by router name

use crate::handler::BoxHandler;
use std::collections::HashMap;
use std::fmt;

/// Memoized router handlers.
///
/// An entry is never refreshed: a router name that is already cached
/// resolves to the same handler even if its configuration changed.
#[derive(Default)]
pub struct HandlerCache {
    handlers: HashMap<String, BoxHandler>,
}

impl HandlerCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached handler for a router
    pub fn get(&self, router: &str) -> Option<BoxHandler> {
        self.handlers.get(router).cloned()
    }

    /// Store a router's handler; an existing entry is kept
    pub fn insert(&mut self, router: &str, handler: BoxHandler) -> BoxHandler {
        self.handlers
            .entry(router.to_string())
            .or_insert(handler)
            .clone()
    }

    /// Whether a router's handler is cached
    pub fn contains(&self, router: &str) -> bool {
        self.handlers.contains_key(router)
    }

    /// Number of cached handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routers: Vec<&String> = self.handlers.keys().collect();
        routers.sort();
        f.debug_struct("HandlerCache").field("routers", &routers).finish()
    }
}
