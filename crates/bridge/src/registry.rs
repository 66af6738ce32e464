// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-context membership of connected viewers.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::context::ContextKey;

/// Identity of one viewer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerId(u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// Outbound queue of serialized frames for one viewer.
pub type ViewerTx = mpsc::Sender<String>;

/// Viewer sockets grouped by context key.
///
/// Buckets are created on first registration and removed when their last
/// member leaves. Broadcasts skip members whose socket is gone but never
/// remove them; that is the owning connection's job on close.
#[derive(Default)]
pub struct ClientRegistry {
    buckets: Mutex<HashMap<ContextKey, HashMap<ViewerId, ViewerTx>>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a viewer to `key`'s bucket. The viewer stays registered until the
    /// returned guard is dropped or [`Registration::release`] is called.
    pub fn register(self: &Arc<Self>, key: ContextKey, tx: ViewerTx) -> Registration {
        let id = ViewerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.buckets.lock().entry(key.clone()).or_default().insert(id, tx);
        tracing::debug!(context = %key, viewer = %id, "viewer registered");
        Registration { registry: Arc::clone(self), key, id, released: false }
    }

    /// Remove a viewer. Returns whether it was present.
    pub fn unregister(&self, key: &ContextKey, id: ViewerId) -> bool {
        let mut buckets = self.buckets.lock();
        let Some(bucket) = buckets.get_mut(key) else {
            return false;
        };
        let removed = bucket.remove(&id).is_some();
        if bucket.is_empty() {
            buckets.remove(key);
        }
        removed
    }

    /// Send one message to every open viewer of `key`. Returns the number of
    /// viewers it was queued for.
    pub fn broadcast<T: Serialize>(&self, key: &ContextKey, msg: &T) -> usize {
        let text = match serde_json::to_string(msg) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(context = %key, err = %e, "broadcast serialize failed");
                return 0;
            }
        };

        let buckets = self.buckets.lock();
        let Some(bucket) = buckets.get(key) else {
            return 0;
        };
        let mut sent = 0;
        for (id, tx) in bucket {
            if tx.is_closed() {
                continue;
            }
            match tx.try_send(text.clone()) {
                Ok(()) => sent += 1,
                Err(e) => tracing::debug!(context = %key, viewer = %id, err = %e, "broadcast skipped"),
            }
        }
        sent
    }

    pub fn count(&self, key: &ContextKey) -> usize {
        self.buckets.lock().get(key).map_or(0, HashMap::len)
    }

    /// Keys with at least one registered viewer, sorted.
    pub fn active_keys(&self) -> Vec<ContextKey> {
        let mut keys: Vec<_> = self.buckets.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Viewers across all contexts.
    pub fn total(&self) -> usize {
        self.buckets.lock().values().map(HashMap::len).sum()
    }
}

/// Membership guard for one viewer. Dropping it unregisters the viewer.
pub struct Registration {
    registry: Arc<ClientRegistry>,
    key: ContextKey,
    id: ViewerId,
    released: bool,
}

impl Registration {
    pub fn id(&self) -> ViewerId {
        self.id
    }

    pub fn key(&self) -> &ContextKey {
        &self.key
    }

    /// Unregister now. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.unregister(&self.key, self.id);
            tracing::debug!(context = %self.key, viewer = %self.id, "viewer unregistered");
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
