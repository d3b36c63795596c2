//! Registry mapping opaque host handles to live contexts.
//!
//! Access is guarded by a `parking_lot::RwLock`. Lookups clone the context's
//! `Arc`, so a flush keeps its context alive even if the host exits it
//! concurrently.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;

use crate::context::Context;

/// Opaque identifier the host stores for one plugin instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextHandle(u64);

impl ContextHandle {
    /// Rebuild a handle from the value the host stored.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

pub struct ContextRegistry {
    contexts: RwLock<HashMap<ContextHandle, Arc<Context>>>,
    next: AtomicU64,
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            next: AtomicU64::new(1),
        }
    }

    /// Register `context` under a fresh handle. Handles are never reused.
    pub fn insert(&self, context: Context) -> ContextHandle {
        let handle = ContextHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.contexts.write().insert(handle, Arc::new(context));
        handle
    }

    pub fn get(&self, handle: ContextHandle) -> Option<Arc<Context>> {
        self.contexts.read().get(&handle).cloned()
    }

    /// Unregister the context behind `handle`.
    pub fn remove(&self, handle: ContextHandle) -> Option<Arc<Context>> {
        self.contexts.write().remove(&handle)
    }

    /// Unregister every context.
    pub fn drain(&self) -> Vec<(ContextHandle, Arc<Context>)> {
        self.contexts.write().drain().collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
