use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use tracing::trace;

use crate::{
    FlowError, Result, ShareLock,
    store::{FlowGraphStore, data::FlowRecord},
};

/// In-memory flow store for testing and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemFlowStore {
    flows: ShareLock<HashMap<String, FlowRecord>>,
}

impl MemFlowStore {
    pub fn new() -> Self {
        Self {
            flows: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl FlowGraphStore for MemFlowStore {
    async fn get(
        &self,
        tenant_id: &str,
    ) -> Result<Option<FlowRecord>> {
        let flows = self.flows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(flows.values().find(|f| f.tenant_id == tenant_id && f.active).cloned())
    }

    async fn find(
        &self,
        flow_id: &str,
    ) -> Result<Option<FlowRecord>> {
        let flows = self.flows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(flows.get(flow_id).cloned())
    }

    async fn list(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<FlowRecord>> {
        let flows = self.flows.read().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<FlowRecord> = flows.values().filter(|f| f.tenant_id == tenant_id).cloned().collect();
        rows.sort_by(|a, b| a.create_time.cmp(&b.create_time).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn upsert(
        &self,
        record: &FlowRecord,
    ) -> Result<FlowRecord> {
        trace!("store::upsert({})", record.id);
        let mut flows = self.flows.write().unwrap_or_else(PoisonError::into_inner);
        let stored = match flows.get(&record.id) {
            Some(existing) => {
                if existing.tenant_id != record.tenant_id {
                    return Err(FlowError::Validation(format!("flow {} belongs to another tenant", record.id)));
                }
                FlowRecord {
                    version: existing.version + 1,
                    active: existing.active,
                    create_time: existing.create_time,
                    update_time: record.update_time,
                    ..record.clone()
                }
            }
            None => record.clone(),
        };
        flows.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete(
        &self,
        flow_id: &str,
    ) -> Result<Option<FlowRecord>> {
        trace!("store::delete({})", flow_id);
        let mut flows = self.flows.write().unwrap_or_else(PoisonError::into_inner);
        Ok(flows.remove(flow_id))
    }

    async fn set_active(
        &self,
        flow_id: &str,
        tenant_id: &str,
    ) -> Result<()> {
        trace!("store::set_active({}, {})", flow_id, tenant_id);
        let mut flows = self.flows.write().unwrap_or_else(PoisonError::into_inner);
        match flows.get(flow_id) {
            None => return Err(FlowError::NotFound(format!("flow {}", flow_id))),
            Some(f) if f.tenant_id != tenant_id => {
                return Err(FlowError::Validation(format!("flow {} does not belong to tenant {}", flow_id, tenant_id)));
            }
            Some(_) => {}
        }
        for flow in flows.values_mut().filter(|f| f.tenant_id == tenant_id) {
            flow.active = flow.id == flow_id;
        }
        Ok(())
    }
}
