use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use shopcat_core::{AggregateId, TenantId};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// A gap (or a sequence number 0) in a stream; the read model needs a rebuild.
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    /// An update arrived for a record the read model does not hold.
    #[error("no read model record for aggregate {aggregate_id} (seq={seq})")]
    MissingRecord { aggregate_id: AggregateId, seq: u64 },
}

/// What a projection should do with an incoming envelope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorDecision {
    Apply,
    /// Already applied (at-least-once redelivery).
    Skip,
}

/// Last applied sequence number per stream.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|c| c.get(&(tenant_id, aggregate_id)).copied())
            .unwrap_or(0)
    }

    /// Accept `seq` only as the direct successor of the cursor.
    pub fn admit(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<CursorDecision, ProjectionError> {
        let last = self.last(tenant_id, aggregate_id);
        if seq != 0 && seq <= last {
            return Ok(CursorDecision::Skip);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(CursorDecision::Apply)
    }

    pub fn advance(&self, tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut c) = self.inner.write() {
            c.insert((tenant_id, aggregate_id), seq);
        }
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut c) = self.inner.write() {
            c.retain(|(t, _), _| *t != tenant_id);
        }
    }
}
