use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::{
    Result,
    common::{Clock, MemCache},
    session::{SessionKey, SessionState, SessionStateStore},
};

/// Session store backed by an in-process moka cache.
///
/// Holds at most `capacity` sessions. Past that, moka evicts live sessions, which then
/// restart at the entry node on their next turn; each eviction is logged and counted.
#[derive(Clone)]
pub struct MemSessionStore {
    sessions: MemCache<SessionKey, SessionState>,
    evicted: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
}

impl MemSessionStore {
    pub fn new(
        capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let evicted = Arc::new(AtomicU64::new(0));
        let counter = evicted.clone();
        let sessions = MemCache::with_eviction_listener(capacity, move |key: &SessionKey| {
            counter.fetch_add(1, Ordering::Relaxed);
            warn!(session = %key, capacity, "session store full, evicted session");
        });
        Self {
            sessions,
            evicted,
            clock,
        }
    }

    /// Sessions dropped so far to stay within capacity.
    pub fn evicted(&self) -> u64 {
        self.sessions.run_pending_tasks();
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.sessions.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStateStore for MemSessionStore {
    async fn load(
        &self,
        key: &SessionKey,
    ) -> Result<Option<SessionState>> {
        Ok(self.sessions.get(key))
    }

    async fn save(
        &self,
        state: &SessionState,
    ) -> Result<()> {
        trace!("session::save({})", state.key());
        self.sessions.set(state.key(), state.clone());
        Ok(())
    }

    async fn remove(
        &self,
        key: &SessionKey,
    ) -> Result<()> {
        self.sessions.remove(key);
        Ok(())
    }

    async fn purge_older_than(
        &self,
        max_idle: Duration,
    ) -> Result<usize> {
        let cutoff = self.clock.now_millis() - max_idle.as_millis() as i64;
        let stale: Vec<SessionKey> = self.sessions.iter().filter(|(_, state)| state.last_updated_at < cutoff).map(|(key, _)| (*key).clone()).collect();
        for key in &stale {
            self.sessions.remove(key);
        }
        debug!(purged = stale.len(), "purged inactive sessions");
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ManualClock;

    #[tokio::test]
    async fn test_save_load_and_purge() {
        let clock = Arc::new(ManualClock::new(0));
        let store = MemSessionStore::new(100, clock.clone());

        let old = SessionState::new(&SessionKey::new("t", "u1", "s"), 0);
        store.save(&old).await.unwrap();

        clock.advance(Duration::from_secs(600));
        let fresh = SessionState::new(&SessionKey::new("t", "u2", "s"), clock.now_millis());
        store.save(&fresh).await.unwrap();

        assert_eq!(store.load(&old.key()).await.unwrap(), Some(old.clone()));

        let purged = store.purge_older_than(Duration::from_secs(300)).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.load(&old.key()).await.unwrap().is_none());
        assert!(store.load(&fresh.key()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overflow_evictions_are_counted() {
        let store = MemSessionStore::new(2, Arc::new(ManualClock::new(0)));
        for user in ["u1", "u2", "u3", "u4", "u5"] {
            store.save(&SessionState::new(&SessionKey::new("t", user, "s"), 0)).await.unwrap();
        }

        assert!(store.evicted() >= 3);
        assert!(store.len() <= 2);
    }
}
