//! Flow definitions — the core data model for schedule-triggered automation.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// An automation flow.
///
/// Flows are owned by the wider platform; the scheduler only reads their
/// trigger configuration and rewrites the bookkeeping it keeps under
/// `metadata["schedule"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    /// Unique flow ID.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Trigger type: "schedule", "manual", "event".
    pub trigger_type: String,
    /// Trigger configuration (JSON)
    /// - schedule: {"cron": "*/5 * * * *"}
    /// - event: {"topic": "production.order.created"}
    pub trigger_config: serde_json::Value,
    /// Current status. Only active flows are evaluated.
    pub status: FlowStatus,
    /// Freeform metadata. The scheduler driver merges its [`ScheduleState`]
    /// under the "schedule" key and leaves sibling keys untouched.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flow {
    /// Create a new schedule-triggered flow.
    pub fn scheduled(name: &str, cron: &str) -> Self {
        let now = Utc::now();
        Self {
            id: format!("flow-{}", uuid::Uuid::new_v4()),
            name: name.to_string(),
            trigger_type: "schedule".to_string(),
            trigger_config: serde_json::json!({"cron": cron}),
            status: FlowStatus::Active,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    /// The flow's cron expression, if the trigger config carries one.
    pub fn cron(&self) -> Option<&str> {
        self.trigger_config.get("cron").and_then(|v| v.as_str())
    }

    /// The scheduler bookkeeping stored under `metadata["schedule"]`.
    /// Missing or malformed state reads as empty.
    pub fn schedule_state(&self) -> ScheduleState {
        self.metadata
            .get("schedule")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

/// Flow lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Draft,
    Active,
    Paused,
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStatus::Draft => "draft",
            FlowStatus::Active => "active",
            FlowStatus::Paused => "paused",
        }
    }
}

impl std::fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-flow schedule bookkeeping, persisted under `metadata["schedule"]`.
///
/// `last_run_minute_key` is the idempotence token: a tick never re-fires a
/// flow whose recorded key equals the current minute's key. The key is
/// rewritten after every invocation attempt, success or failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_minute_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution_id: Option<String>,
}

impl ScheduleState {
    /// Bookkeeping after a successful invocation.
    pub fn completed(
        minute_key: &str,
        run_at: DateTime<Local>,
        execution_id: Option<String>,
    ) -> Self {
        Self {
            last_run_minute_key: Some(minute_key.to_string()),
            last_run_at: Some(run_at),
            last_status: Some(RunStatus::Completed),
            last_error: None,
            last_execution_id: execution_id,
        }
    }

    /// Bookkeeping after a failed invocation. The minute key is still
    /// recorded so the flow is not retried within the same minute.
    pub fn failed(minute_key: &str, run_at: DateTime<Local>, error: &str) -> Self {
        Self {
            last_run_minute_key: Some(minute_key.to_string()),
            last_run_at: Some(run_at),
            last_status: Some(RunStatus::Failed),
            last_error: Some(error.to_string()),
            last_execution_id: None,
        }
    }
}

/// Outcome of the most recent invocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Trigger metadata handed to the execution service when a flow fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// The cron expression that matched.
    pub cron: String,
    /// The evaluation instant (RFC3339 with local offset on the wire).
    pub run_at: DateTime<Local>,
    /// The minute key recorded for dedup.
    pub minute_key: String,
    /// What fired the flow: "schedule" for driver-fired events.
    pub triggered_by: String,
}

impl TriggerEvent {
    /// Build the event for a driver-fired schedule trigger.
    pub fn schedule(cron: &str, run_at: DateTime<Local>, minute_key: &str) -> Self {
        Self {
            cron: cron.to_string(),
            run_at,
            minute_key: minute_key.to_string(),
            triggered_by: "schedule".to_string(),
        }
    }
}

/// What the execution service reported back.
///
/// A non-empty `errors` is the non-exceptional failure signal: the service
/// answered, but the execution itself went wrong.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Store query filter.
#[derive(Debug, Clone, Default)]
pub struct FlowFilter {
    pub trigger_type: Option<String>,
    pub status: Option<FlowStatus>,
}

impl FlowFilter {
    /// The driver's per-tick selection: active, schedule-triggered flows.
    pub fn scheduled_active() -> Self {
        Self {
            trigger_type: Some("schedule".to_string()),
            status: Some(FlowStatus::Active),
        }
    }
}
