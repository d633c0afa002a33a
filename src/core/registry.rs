// src/core/registry.rs

//! The connection registry: the map from screen name to live connection.
//!
//! This is the only mutable state shared between sessions. Every operation,
//! including iteration for fan-out, runs under one `parking_lot::Mutex`, and
//! the lock is never held across an `.await`. Callers copy out the handles
//! they need and perform network I/O after the guard is dropped.

use crate::core::RelayError;
use crate::core::metrics;
use crate::core::state::ClientHandle;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Maps screen names to connections, preserving join order.
#[derive(Debug, Default)]
pub struct Registry {
    members: Mutex<IndexMap<String, Arc<ClientHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `name`, silently replacing any existing owner.
    ///
    /// Returns the displaced handle, if there was one. The displaced session
    /// keeps its connection but is no longer reachable by name.
    pub fn register(&self, name: &str, handle: Arc<ClientHandle>) -> Option<Arc<ClientHandle>> {
        let mut members = self.members.lock();
        let previous = members.insert(name.to_string(), handle);
        metrics::REGISTERED_USERS.set(members.len() as f64);
        previous
    }

    /// Registers `name` only if nobody holds it yet.
    pub fn try_register(&self, name: &str, handle: Arc<ClientHandle>) -> Result<(), RelayError> {
        let mut members = self.members.lock();
        if members.contains_key(name) {
            return Err(RelayError::NameInUse(name.to_string()));
        }
        members.insert(name.to_string(), handle);
        metrics::REGISTERED_USERS.set(members.len() as f64);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<ClientHandle>> {
        self.members.lock().get(name).cloned()
    }

    /// Unconditionally removes `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<ClientHandle>> {
        let mut members = self.members.lock();
        let removed = members.shift_remove(name);
        metrics::REGISTERED_USERS.set(members.len() as f64);
        removed
    }

    /// Removes `name` only while it is still owned by `session_id`.
    ///
    /// Exactly one caller observes `Some` for a given registration, which is
    /// what keeps LEAVE notifications from being sent twice.
    pub fn remove_if_owner(&self, name: &str, session_id: u64) -> Option<Arc<ClientHandle>> {
        let mut members = self.members.lock();
        let owned = members
            .get(name)
            .is_some_and(|handle| handle.session_id == session_id);
        if !owned {
            return None;
        }
        let removed = members.shift_remove(name);
        metrics::REGISTERED_USERS.set(members.len() as f64);
        removed
    }

    /// A point-in-time list of registered names in join order.
    pub fn snapshot(&self) -> Vec<String> {
        self.members.lock().keys().cloned().collect()
    }

    /// A point-in-time list of every member except `exclude`, for fan-out.
    pub fn targets_except(&self, exclude: Option<&str>) -> Vec<(String, Arc<ClientHandle>)> {
        self.members
            .lock()
            .iter()
            .filter(|(name, _)| Some(name.as_str()) != exclude)
            .map(|(name, handle)| (name.clone(), handle.clone()))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }
}
