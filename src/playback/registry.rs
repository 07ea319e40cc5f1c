//! Outstanding-playback registry and shutdown coordination
//!
//! The single source of truth for what is currently playing. One mutex
//! totally orders membership changes and every handle's liveness/callback
//! state, which is what makes "callback invoked at most once" hold under any
//! interleaving of natural completion, cancel(), and destroy(). A condvar
//! paired with the same mutex lets destroy() block until the registry drains
//! to empty.
//!
//! Callbacks are claimed (taken out of the entry) under the lock but invoked
//! by the caller after the lock is released, so a blocking or re-entrant
//! callback cannot deadlock the registry.

use std::sync::{Condvar, Mutex};

use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::playback::wake::WakeSignal;

/// Completion callback for one playback: invoked at most once, with the
/// caller-assigned id and the playback outcome.
pub type FinishCallback = Box<dyn FnOnce(u32, Result<()>) + Send + 'static>;

/// One in-flight playback, as tracked by the registry.
///
/// The worker owns the device session and the source; the registry only
/// holds what the controller side needs: liveness, the unclaimed callback,
/// and the signal end of the cancellation channel.
pub(crate) struct Outstanding {
    /// Internal registry key; unique even when caller ids collide
    pub(crate) key: Uuid,
    /// Caller-assigned correlation id (duplicates are legal)
    pub(crate) id: u32,
    /// Monotonic liveness flag, set at most once
    pub(crate) dead: bool,
    /// Completion callback, present until claimed
    pub(crate) callback: Option<FinishCallback>,
    /// Signal end of the worker's cancellation channel
    pub(crate) signal: WakeSignal,
}

struct Inner {
    entries: Vec<Outstanding>,
    draining: bool,
}

/// Mutex-protected collection of live playback handles.
pub(crate) struct Registry {
    inner: Mutex<Inner>,
    drained: Condvar,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                draining: false,
            }),
            drained: Condvar::new(),
        }
    }

    /// Register a handle whose worker is about to start.
    pub(crate) fn insert(&self, entry: Outstanding) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.draining {
            return Err(Error::State("driver is shutting down".to_string()));
        }
        inner.entries.push(entry);
        Ok(())
    }

    /// Worker-side callback claim on exit, before the entry is unlinked.
    ///
    /// Marks the handle dead and takes the callback unless cancel()/destroy()
    /// already did; the caller invokes it after the lock is released, then
    /// unlinks via [`Registry::remove`]. Because the entry is still linked
    /// while the callback runs, `destroy` cannot observe an empty registry
    /// before every completion callback has returned.
    pub(crate) fn claim_completion(&self, key: Uuid) -> Option<FinishCallback> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.entries.iter_mut().find(|e| e.key == key)?;
        if entry.dead {
            return None;
        }
        entry.dead = true;
        entry.callback.take()
    }

    /// Worker-side removal on exit.
    ///
    /// Unlinks the entry, runs `release` (the worker hands over its device
    /// session, source, and channel for closing), and posts the drain signal
    /// when this empties a draining registry. All of it is one lock
    /// acquisition, so once `destroy` stops waiting every resource is gone.
    pub(crate) fn remove(&self, key: Uuid, release: impl FnOnce()) {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner.entries.iter().position(|e| e.key == key) else {
            return;
        };
        inner.entries.swap_remove(pos);
        release();
        if inner.entries.is_empty() && inner.draining {
            self.drained.notify_all();
        }
    }

    /// Mark every live handle matching `id` dead, wake its worker, and claim
    /// its callback, all under one lock acquisition.
    pub(crate) fn claim_matching(&self, id: u32) -> Vec<FinishCallback> {
        let mut inner = self.inner.lock().unwrap();
        let mut claimed = Vec::new();
        for entry in inner.entries.iter_mut() {
            if entry.id != id || entry.dead {
                continue;
            }
            entry.dead = true;
            entry.signal.raise();
            if let Some(cb) = entry.callback.take() {
                claimed.push(cb);
            }
        }
        claimed
    }

    /// Mark every still-live handle dead, wake all workers, and set the
    /// draining flag. Returns the claimed callbacks with their ids.
    pub(crate) fn begin_drain(&self) -> Vec<(u32, FinishCallback)> {
        let mut inner = self.inner.lock().unwrap();
        inner.draining = true;
        let mut claimed = Vec::new();
        for entry in inner.entries.iter_mut() {
            if entry.dead {
                continue;
            }
            entry.dead = true;
            entry.signal.raise();
            if let Some(cb) = entry.callback.take() {
                claimed.push((entry.id, cb));
            }
        }
        debug!(outstanding = inner.entries.len(), "registry drain started");
        claimed
    }

    /// Block until the registry is empty. Returns immediately when there is
    /// nothing outstanding.
    pub(crate) fn wait_drained(&self) {
        let mut inner = self.inner.lock().unwrap();
        while !inner.entries.is_empty() {
            inner = self.drained.wait(inner).unwrap();
        }
    }
}
