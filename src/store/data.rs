use serde::{Deserialize, Serialize};

use crate::{FlowError, Result, model::FlowModel};

/// A stored flow definition. The authored model is kept as JSON text in `data`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FlowRecord {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub desc: String,
    pub data: String,
    /// Bumped on every update.
    pub version: u64,
    /// At most one active flow per tenant.
    pub active: bool,
    pub create_time: i64,
    pub update_time: i64,
}

impl FlowRecord {
    pub fn from_model(
        model: &FlowModel,
        now: i64,
    ) -> Result<Self> {
        if model.id.is_empty() {
            return Err(FlowError::Validation("missing id in flow".into()));
        }
        if model.tenant_id.is_empty() {
            return Err(FlowError::Validation(format!("missing tenant_id in flow {}", model.id)));
        }
        Ok(Self {
            id: model.id.clone(),
            tenant_id: model.tenant_id.clone(),
            name: model.name.clone(),
            desc: model.desc.clone(),
            data: model.to_json()?,
            version: 1,
            active: false,
            create_time: now,
            update_time: now,
        })
    }

    /// Parse the stored definition.
    pub fn model(&self) -> Result<FlowModel> {
        FlowModel::from_json(&self.data)
    }
}
