use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

use crate::{common::MemCache, executor::TurnMetrics};

/// Aggregated counters for one tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMetrics {
    pub turns: u64,
    pub errors: u64,
    pub tokens: u64,
    pub hops: u64,
}

#[derive(Default)]
struct Counters {
    turns: AtomicU64,
    errors: AtomicU64,
    tokens: AtomicU64,
    hops: AtomicU64,
}

pub struct MetricsRegistry {
    tenants: MemCache<String, Arc<Counters>>,
}

impl MetricsRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            tenants: MemCache::new(capacity),
        }
    }

    pub fn record(
        &self,
        tenant_id: &str,
        metrics: &TurnMetrics,
    ) {
        let counters = self.tenants.get_with(tenant_id.to_string(), Default::default);
        counters.turns.fetch_add(1, Ordering::Relaxed);
        counters.tokens.fetch_add(metrics.tokens_used, Ordering::Relaxed);
        counters.hops.fetch_add(u64::from(metrics.hops), Ordering::Relaxed);
        if metrics.error.is_some() {
            counters.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(
        &self,
        tenant_id: &str,
    ) -> TenantMetrics {
        match self.tenants.get(tenant_id) {
            Some(c) => TenantMetrics {
                turns: c.turns.load(Ordering::Relaxed),
                errors: c.errors.load(Ordering::Relaxed),
                tokens: c.tokens.load(Ordering::Relaxed),
                hops: c.hops.load(Ordering::Relaxed),
            },
            None => TenantMetrics::default(),
        }
    }
}
