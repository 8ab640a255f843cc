//! Collaborator traits the scheduler driver is written against.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ExecutionReport, Flow, FlowFilter, FlowStatus, ScheduleState, TriggerEvent};

/// The externally-owned flow store.
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// List flows matching the filter. The driver calls this fresh every
    /// tick; implementations must not serve a stale snapshot.
    async fn list_flows(&self, filter: &FlowFilter) -> Result<Vec<Flow>>;

    /// Fetch one flow by ID.
    async fn get_flow(&self, id: &str) -> Result<Option<Flow>>;

    /// Insert or replace a flow.
    async fn insert_flow(&self, flow: &Flow) -> Result<()>;

    /// Change a flow's status. Returns false if the flow does not exist.
    async fn set_status(&self, id: &str, status: FlowStatus) -> Result<bool>;

    /// Delete a flow. Returns false if the flow does not exist.
    async fn delete_flow(&self, id: &str) -> Result<bool>;

    /// Merge schedule bookkeeping into the flow's metadata under the
    /// "schedule" key, preserving sibling metadata keys.
    async fn update_schedule(&self, id: &str, state: &ScheduleState) -> Result<()>;
}

/// The downstream execution service that actually runs a flow.
#[async_trait]
pub trait FlowExecutor: Send + Sync {
    /// Invoke the flow. An `Err` is the exceptional path (network down,
    /// service unreachable); a report with a non-empty `errors` is the
    /// service answering "the execution itself failed".
    async fn execute(
        &self,
        flow_id: &str,
        trigger: &TriggerEvent,
        metadata: &serde_json::Value,
    ) -> Result<ExecutionReport>;
}
