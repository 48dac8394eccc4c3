//! Approval gate index
//!
//! Gates live inside their pipeline record; this index maps a gate id back
//! to the owning pipeline so a response can be routed without one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::KvHandle;
use crate::error::{OrchestratorError, Result};
use crate::kv::gate_key;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GateRef {
    pipeline_id: Uuid,
}

#[derive(Clone)]
pub struct GateRepository {
    kv: KvHandle,
}

impl GateRepository {
    pub fn new(kv: KvHandle) -> Self {
        Self { kv }
    }

    pub async fn index(&self, gate_id: Uuid, pipeline_id: Uuid) -> Result<()> {
        self.kv
            .put_json(&gate_key(gate_id), &GateRef { pipeline_id })
            .await?;
        Ok(())
    }

    /// Pipeline owning `gate_id`
    pub async fn pipeline_for(&self, gate_id: Uuid) -> Result<Uuid> {
        self.kv
            .get_json::<GateRef>(&gate_key(gate_id))
            .await?
            .map(|r| r.pipeline_id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("Approval gate {}", gate_id)))
    }
}
