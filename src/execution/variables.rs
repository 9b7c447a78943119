//! Variable introspection.

use indexmap::IndexSet;

use crate::backend::{BackendSession, VariableBinding};
use crate::session::{SessionKey, SessionStore};

/// List the variables of the session stored under `key`.
///
/// Each binding is rendered as `"{type} {name}"`; duplicates are dropped and
/// the backend's order is kept. A key with no state, or a store whose lock
/// was poisoned, yields an empty list.
pub fn list_variables<S: BackendSession>(store: &SessionStore<S>, key: &SessionKey) -> Vec<String> {
    store
        .with_state(key, |state| {
            state
                .session()
                .current_bindings()
                .iter()
                .map(VariableBinding::render)
                .collect::<IndexSet<String>>()
                .into_iter()
                .collect()
        })
        .ok()
        .flatten()
        .unwrap_or_default()
}
