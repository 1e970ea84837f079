//! In-flight request registry with prefix cancellation.
//!
//! Every cancellable request registers its path and gets a
//! `CancellationToken`.  `cancel_all(prefix)` trips the tokens of all
//! requests whose path starts with `prefix`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct CancelRegistry {
    entries: Mutex<HashMap<Uuid, (String, CancellationToken)>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request.  The entry is removed when the guard drops.
    pub fn register(self: &Arc<Self>, id: Uuid, path: &str) -> CancelGuard {
        let token = CancellationToken::new();
        self.entries
            .lock()
            .insert(id, (path.to_owned(), token.clone()));
        CancelGuard {
            registry: Arc::clone(self),
            id,
            token,
        }
    }

    /// Cancel every registered request whose path starts with `prefix`.
    /// An empty prefix cancels everything.  Returns how many were hit.
    pub fn cancel_all(&self, prefix: &str) -> usize {
        let entries = self.entries.lock();
        let mut hit = 0;
        for (path, token) in entries.values() {
            if path.starts_with(prefix) {
                token.cancel();
                hit += 1;
            }
        }
        hit
    }

    pub fn cancel(&self, id: &Uuid) -> bool {
        match self.entries.lock().get(id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.entries.lock().len()
    }

    fn remove(&self, id: &Uuid) {
        self.entries.lock().remove(id);
    }
}

/// Registration handle held for the lifetime of a request.
#[derive(Debug)]
pub struct CancelGuard {
    registry: Arc<CancelRegistry>,
    id: Uuid,
    token: CancellationToken,
}

impl CancelGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
