//! Session state and its persistence contract.

mod mem;
mod state;

use std::time::Duration;

use async_trait::async_trait;

use crate::{Result, common::InProgress};

pub use mem::MemSessionStore;
pub use state::{HistoryEntry, Role, SessionKey, SessionState};

/// Sessions with a turn or navigation in flight, shared by the flow and navigation services.
pub type SessionLocks = InProgress<SessionKey>;

/// Persistence for per-session state.
#[async_trait]
pub trait SessionStateStore: Send + Sync {
    /// Loads the state for `key`, if any.
    async fn load(
        &self,
        key: &SessionKey,
    ) -> Result<Option<SessionState>>;

    /// Inserts or replaces the state under its own key.
    async fn save(
        &self,
        state: &SessionState,
    ) -> Result<()>;

    /// Drops the state for `key`.
    async fn remove(
        &self,
        key: &SessionKey,
    ) -> Result<()>;

    /// Drops every state not updated within `max_idle`. Returns how many were dropped.
    async fn purge_older_than(
        &self,
        max_idle: Duration,
    ) -> Result<usize>;
}
