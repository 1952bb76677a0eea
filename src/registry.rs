//! In-flight render bookkeeping for long-lived callers.
//!
//! A server answering "render run X" requests keeps one [`ActiveRenderRegistry`]
//! for its lifetime and hands clones to whoever needs it. Keys are caller
//! chosen (`run-1`, `run-1/img-3`, ...). Each entry holds a shared handle to
//! the pending job, so a second request for the same key can await the first
//! instead of starting a duplicate, and an optional abort handle for
//! best-effort cancellation. Nothing here is persisted.

use futures::future::{AbortHandle, Abortable, BoxFuture, Shared};
use futures::FutureExt;
use log::debug;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Outcome of a registered job. Errors are flattened to text so every waiter gets a copy.
pub type JobResult = std::result::Result<(), String>;

/// A pending job that any number of callers may await.
pub type RenderJob = Shared<BoxFuture<'static, JobResult>>;

struct Entry {
    id: u64,
    pending: RenderJob,
    cancel: Option<AbortHandle>,
}

type Entries = Mutex<HashMap<String, Entry>>;

#[derive(Clone, Default)]
pub struct ActiveRenderRegistry {
    entries: Arc<Entries>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for ActiveRenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveRenderRegistry").field("active", &self.active_keys()).finish()
    }
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<String, Entry>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ActiveRenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, key: &str) -> bool {
        lock(&self.entries).contains_key(key)
    }

    /// Register `pending` under `key`, replacing any previous entry.
    pub fn set_active(&self, key: &str, pending: RenderJob, cancel: Option<AbortHandle>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.entries).insert(key.to_string(), Entry { id, pending, cancel });
    }

    /// Forget `key`. Returns whether an entry was present.
    pub fn remove(&self, key: &str) -> bool {
        lock(&self.entries).remove(key).is_some()
    }

    /// Abort the job under `key` and forget it.
    ///
    /// Returns `false`, leaving the entry in place, when the key is unknown
    /// or was registered without a cancel handle.
    pub fn cancel(&self, key: &str) -> bool {
        let mut entries = lock(&self.entries);
        let Some(handle) = entries.get(key).and_then(|e| e.cancel.clone()) else {
            return false;
        };
        handle.abort();
        entries.remove(key);
        debug!("cancelled render {}", key);
        true
    }

    /// Currently registered keys, sorted.
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.entries).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Handle to the job under `key`, if one is registered.
    pub fn pending(&self, key: &str) -> Option<RenderJob> {
        lock(&self.entries).get(key).map(|e| e.pending.clone())
    }

    /// Run `job` under `key` unless a job with that key is already active.
    ///
    /// Returns the job to await and whether it was started by this call. A
    /// started job is spawned on the current tokio runtime, is cancellable
    /// through [`cancel`](Self::cancel), and removes its own entry when it
    /// finishes. A cancelled job resolves to `Err("cancelled")`.
    pub fn start<F>(&self, key: &str, job: F) -> (RenderJob, bool)
    where
        F: Future<Output = JobResult> + Send + 'static,
    {
        let mut entries = lock(&self.entries);
        if let Some(existing) = entries.get(key) {
            debug!("render {} already active", key);
            return (existing.pending.clone(), false);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (handle, registration) = AbortHandle::new_pair();
        let owner: Weak<Entries> = Arc::downgrade(&self.entries);
        let owned_key = key.to_string();
        let pending = async move {
            let result = Abortable::new(job, registration)
                .await
                .unwrap_or_else(|_| Err("cancelled".to_string()));
            if let Some(entries) = owner.upgrade() {
                let mut entries = lock(&entries);
                // a replacement registered under the same key stays
                if entries.get(&owned_key).is_some_and(|e| e.id == id) {
                    entries.remove(&owned_key);
                }
            }
            result
        }
        .boxed()
        .shared();

        entries.insert(key.to_string(), Entry { id, pending: pending.clone(), cancel: Some(handle) });
        drop(entries);
        tokio::spawn(pending.clone());
        (pending, true)
    }
}
