//! Session storage keyed by [`SessionKey`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use super::{SessionKey, SessionState};
use crate::error::ScriptError;
use crate::Result;

/// Per-key cell holding the current state, if any.
///
/// Holding the slot's lock is what serialises executions against one key.
pub type SessionSlot<S> = Arc<Mutex<Option<SessionState<S>>>>;

/// Thread-safe storage for session state.
///
/// The outer map lock is only held long enough to find or insert a slot, so
/// work on one key never blocks another. Entries are never evicted; hosts
/// that want teardown call [`remove`](Self::remove).
pub struct SessionStore<S> {
    slots: RwLock<HashMap<SessionKey, SessionSlot<S>>>,
}

impl<S> SessionStore<S> {
    /// Create a new empty session store.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn existing_slot(&self, key: &SessionKey) -> Result<Option<SessionSlot<S>>> {
        let slots = self
            .slots
            .read()
            .map_err(|_| ScriptError::LockPoisoned)?;
        Ok(slots.get(key).cloned())
    }

    /// Get the slot for a key, creating an empty one if needed.
    pub fn slot(&self, key: &SessionKey) -> Result<SessionSlot<S>> {
        if let Some(slot) = self.existing_slot(key)? {
            return Ok(slot);
        }

        let mut slots = self
            .slots
            .write()
            .map_err(|_| ScriptError::LockPoisoned)?;
        Ok(Arc::clone(slots.entry(key.clone()).or_default()))
    }

    /// Run `f` against the state stored under `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored. Waits while an execution
    /// holds the key.
    pub fn with_state<F, R>(&self, key: &SessionKey, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&SessionState<S>) -> R,
    {
        let Some(slot) = self.existing_slot(key)? else {
            return Ok(None);
        };
        let guard = slot.lock().map_err(|_| ScriptError::LockPoisoned)?;
        Ok(guard.as_ref().map(f))
    }

    /// Store `state` under `key`, returning the state it replaced.
    pub fn put(&self, key: &SessionKey, state: SessionState<S>) -> Result<Option<SessionState<S>>> {
        let slot = self.slot(key)?;
        let mut guard = slot.lock().map_err(|_| ScriptError::LockPoisoned)?;
        Ok(guard.replace(state))
    }

    /// Check if state is stored for a key.
    pub fn contains(&self, key: &SessionKey) -> Result<bool> {
        Ok(self.with_state(key, |_| ())?.is_some())
    }

    /// Remove a key and return its state, or None if it had none.
    pub fn remove(&self, key: &SessionKey) -> Result<Option<SessionState<S>>> {
        let slot = {
            let mut slots = self
                .slots
                .write()
                .map_err(|_| ScriptError::LockPoisoned)?;
            slots.remove(key)
        };
        match slot {
            Some(slot) => {
                let mut guard = slot.lock().map_err(|_| ScriptError::LockPoisoned)?;
                Ok(guard.take())
            }
            None => Ok(None),
        }
    }

    /// List keys that currently have state.
    pub fn keys(&self) -> Result<Vec<SessionKey>> {
        let slots: Vec<(SessionKey, SessionSlot<S>)> = {
            let slots = self
                .slots
                .read()
                .map_err(|_| ScriptError::LockPoisoned)?;
            slots
                .iter()
                .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
                .collect()
        };

        let mut keys = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            let guard = slot.lock().map_err(|_| ScriptError::LockPoisoned)?;
            if guard.is_some() {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Get the number of keys with stored state.
    pub fn count(&self) -> usize {
        self.keys().map(|k| k.len()).unwrap_or(0)
    }
}

impl<S> Default for SessionStore<S> {
    fn default() -> Self {
        Self::new()
    }
}
