//! Process-wide cache of compiled flow graphs, keyed by tenant.
//!
//! Entries expire after a TTL measured with the injected [`Clock`] and are dropped
//! explicitly whenever a tenant's flows change. Every load takes a ticket from a global
//! epoch; `invalidate` stamps the tenant with a newer epoch, and a load only inserts its
//! result if the tenant was not stamped after its ticket. Stamps are forgotten as soon as
//! no load is in flight, so the fence map stays bounded by concurrent traffic.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tracing::debug;

use crate::{
    Result,
    common::{Clock, MemCache},
    graph::FlowGraph,
    store::FlowGraphStore,
};

#[derive(Clone)]
struct CachedFlow {
    graph: Arc<FlowGraph>,
    loaded_at: i64,
}

#[derive(Default)]
struct Fences {
    epoch: u64,
    /// Epoch of the latest invalidation per tenant, kept only while loads are in flight.
    invalidated: HashMap<String, u64>,
    /// Epoch of the latest `clear`.
    cleared: u64,
    loading: usize,
}

impl Fences {
    fn is_current(
        &self,
        tenant_id: &str,
        ticket: u64,
    ) -> bool {
        self.cleared <= ticket && self.invalidated.get(tenant_id).is_none_or(|&at| at <= ticket)
    }
}

/// Releases a load's ticket, dropping all stamps once the last load finishes.
struct LoadTicket<'a> {
    fences: &'a Mutex<Fences>,
    epoch: u64,
}

impl<'a> LoadTicket<'a> {
    fn take(fences: &'a Mutex<Fences>) -> Self {
        let mut guard = fences.lock().unwrap_or_else(PoisonError::into_inner);
        guard.loading += 1;
        Self {
            fences,
            epoch: guard.epoch,
        }
    }
}

impl Drop for LoadTicket<'_> {
    fn drop(&mut self) {
        let mut guard = self.fences.lock().unwrap_or_else(PoisonError::into_inner);
        guard.loading -= 1;
        if guard.loading == 0 {
            guard.invalidated.clear();
        }
    }
}

pub struct FlowCache {
    store: Arc<dyn FlowGraphStore>,
    entries: MemCache<String, CachedFlow>,
    fences: Mutex<Fences>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl FlowCache {
    pub fn new(
        store: Arc<dyn FlowGraphStore>,
        capacity: usize,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            entries: MemCache::new(capacity),
            fences: Mutex::new(Fences::default()),
            ttl,
            clock,
        }
    }

    /// Cached graph for `tenant_id`, if present and not expired.
    pub fn get(
        &self,
        tenant_id: &str,
    ) -> Option<Arc<FlowGraph>> {
        let cached = self.entries.get(tenant_id)?;
        if self.clock.now_millis() - cached.loaded_at >= self.ttl.as_millis() as i64 {
            debug!(tenant = tenant_id, "flow cache entry expired");
            self.entries.remove(tenant_id);
            return None;
        }
        Some(cached.graph)
    }

    /// Drop the tenant's entry and fence off loads already in flight.
    pub fn invalidate(
        &self,
        tenant_id: &str,
    ) {
        let mut fences = self.fences.lock().unwrap_or_else(PoisonError::into_inner);
        fences.epoch += 1;
        if fences.loading > 0 {
            let epoch = fences.epoch;
            fences.invalidated.insert(tenant_id.to_string(), epoch);
        }
        self.entries.remove(tenant_id);
        debug!(tenant = tenant_id, "flow cache invalidated");
    }

    pub fn clear(&self) {
        let mut fences = self.fences.lock().unwrap_or_else(PoisonError::into_inner);
        fences.epoch += 1;
        fences.cleared = fences.epoch;
        self.entries.clear();
    }

    /// Cached graph, or the tenant's active flow compiled from the store.
    /// Returns `None` when the tenant has no active flow.
    pub async fn get_or_load(
        &self,
        tenant_id: &str,
    ) -> Result<Option<Arc<FlowGraph>>> {
        if let Some(graph) = self.get(tenant_id) {
            debug!(tenant = tenant_id, flow = %graph.id, "flow cache hit");
            return Ok(Some(graph));
        }

        debug!(tenant = tenant_id, "flow cache miss");
        let ticket = LoadTicket::take(&self.fences);
        let Some(record) = self.store.get(tenant_id).await? else {
            return Ok(None);
        };
        let graph = Arc::new(FlowGraph::from_model(&record.model()?, record.version)?);

        let fences = self.fences.lock().unwrap_or_else(PoisonError::into_inner);
        if fences.is_current(tenant_id, ticket.epoch) {
            self.insert(tenant_id, graph.clone());
        } else {
            debug!(tenant = tenant_id, "flow cache load raced an invalidation, not caching");
        }
        drop(fences);
        Ok(Some(graph))
    }

    /// Tenants currently fenced by an invalidation.
    #[cfg(test)]
    fn fenced(&self) -> usize {
        self.fences.lock().unwrap_or_else(PoisonError::into_inner).invalidated.len()
    }

    fn insert(
        &self,
        tenant_id: &str,
        graph: Arc<FlowGraph>,
    ) {
        self.entries.set(
            tenant_id.to_string(),
            CachedFlow {
                graph,
                loaded_at: self.clock.now_millis(),
            },
        );
    }
}
