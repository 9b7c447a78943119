//! Session management module.
//!
//! This module provides the session key type, the per-key execution state
//! and the thread-safe store the engine keeps it in.

mod key;
mod state;
mod store;

pub use key::SessionKey;
pub use state::SessionState;
pub use store::{SessionSlot, SessionStore};
