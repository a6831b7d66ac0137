//! Storage layer for flow definitions.
//!
//! Provides an abstraction over storage backends; `MemFlowStore` ships for testing and
//! single-process embedding. Relational backends live outside this crate.

mod data;
mod mem;

use async_trait::async_trait;

use crate::Result;

pub use data::FlowRecord;
pub use mem::MemFlowStore;

/// Trait for flow definition persistence.
#[async_trait]
pub trait FlowGraphStore: Send + Sync {
    /// The active flow for a tenant, if one is set.
    async fn get(
        &self,
        tenant_id: &str,
    ) -> Result<Option<FlowRecord>>;

    /// Finds a flow by id.
    async fn find(
        &self,
        flow_id: &str,
    ) -> Result<Option<FlowRecord>>;

    /// All flows of a tenant, oldest first.
    async fn list(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<FlowRecord>>;

    /// Creates or replaces a flow. Returns the record as stored.
    async fn upsert(
        &self,
        record: &FlowRecord,
    ) -> Result<FlowRecord>;

    /// Deletes a flow by id, returning the removed record.
    async fn delete(
        &self,
        flow_id: &str,
    ) -> Result<Option<FlowRecord>>;

    /// Makes `flow_id` the tenant's only active flow.
    async fn set_active(
        &self,
        flow_id: &str,
        tenant_id: &str,
    ) -> Result<()>;
}
