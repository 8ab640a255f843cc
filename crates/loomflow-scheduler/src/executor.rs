//! Flow executors — hand a triggered flow to whatever actually runs it.
//!
//! The driver only knows the [`FlowExecutor`] seam. `WebhookExecutor` posts
//! trigger events to the platform's execution service; `LogExecutor` records
//! them locally when no service is configured (and for dry runs).

use async_trait::async_trait;
use tracing::{debug, info};

use loomflow_core::config::ExecutorConfig;
use loomflow_core::error::{LoomflowError, Result};
use loomflow_core::traits::FlowExecutor;
use loomflow_core::types::{ExecutionReport, TriggerEvent};

/// Dispatches trigger events to the flow execution service over HTTP.
pub struct WebhookExecutor {
    endpoint: String,
    auth_token: Option<String>,
    timeout: std::time::Duration,
    client: reqwest::Client,
}

impl WebhookExecutor {
    pub fn new(endpoint: &str, auth_token: Option<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth_token,
            timeout: std::time::Duration::from_secs(timeout_secs),
            client: reqwest::Client::new(),
        }
    }

    /// Build from config; `None` when no endpoint is configured.
    pub fn from_config(config: &ExecutorConfig) -> Option<Self> {
        config
            .endpoint
            .as_deref()
            .map(|endpoint| Self::new(endpoint, config.auth_token.clone(), config.timeout_secs))
    }
}

#[async_trait]
impl FlowExecutor for WebhookExecutor {
    async fn execute(
        &self,
        flow_id: &str,
        trigger: &TriggerEvent,
        metadata: &serde_json::Value,
    ) -> Result<ExecutionReport> {
        let url = format!("{}/flows/{}/executions", self.endpoint, flow_id);
        debug!("Dispatching flow '{}' to {}", flow_id, url);

        let mut request = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "flow_id": flow_id,
                "triggered_by": trigger.triggered_by,
                "trigger": trigger,
                "metadata": metadata,
            }))
            .timeout(self.timeout);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LoomflowError::Execution(format!("Dispatch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoomflowError::Execution(format!(
                "Execution service returned HTTP {status}"
            )));
        }

        // The service reports execution_id and any non-fatal errors in the
        // body; an unparseable body reads as a clean report.
        Ok(response.json::<ExecutionReport>().await.unwrap_or_default())
    }
}

/// Logs trigger events instead of dispatching them.
pub struct LogExecutor;

#[async_trait]
impl FlowExecutor for LogExecutor {
    async fn execute(
        &self,
        flow_id: &str,
        trigger: &TriggerEvent,
        _metadata: &serde_json::Value,
    ) -> Result<ExecutionReport> {
        info!(
            "🚀 Flow '{}' triggered at {} (key {})",
            flow_id,
            trigger.run_at.to_rfc3339(),
            trigger.minute_key
        );
        Ok(ExecutionReport {
            execution_id: Some(format!("local-{}", uuid::Uuid::new_v4())),
            errors: Vec::new(),
        })
    }
}
