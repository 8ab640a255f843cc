//! Schedule driver — evaluates due flows once per tick and triggers execution.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use loomflow_core::traits::{FlowExecutor, FlowStore};
use loomflow_core::types::{FlowFilter, ScheduleState, TriggerEvent};
use loomflow_cron::{WallClock, cron_matches, minute_key};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Minute key of the evaluation instant.
    pub minute_key: String,
    /// Flows listed for evaluation.
    pub evaluated: usize,
    /// Flows invoked and completed.
    pub fired: usize,
    /// Flows invoked whose execution failed.
    pub failed: usize,
    /// Flows not invoked (not due, no cron, or already fired this minute).
    pub skipped: usize,
}

/// The scheduler driver. Stateless between ticks — all bookkeeping lives in
/// the flow store, so a restart picks up exactly where the last tick left off.
pub struct ScheduleDriver {
    store: Arc<dyn FlowStore>,
    executor: Arc<dyn FlowExecutor>,
}

impl ScheduleDriver {
    pub fn new(store: Arc<dyn FlowStore>, executor: Arc<dyn FlowExecutor>) -> Self {
        Self { store, executor }
    }

    /// Evaluate one tick at the current local time.
    pub async fn tick(&self) -> TickReport {
        self.tick_at(Local::now()).await
    }

    /// Evaluate one tick at an injected instant.
    ///
    /// Flows are walked sequentially; each invocation is awaited before the
    /// next flow is considered, so a flow's dedup check-then-write never
    /// races itself within a tick.
    pub async fn tick_at(&self, now: DateTime<Local>) -> TickReport {
        let now_key = minute_key(&now);
        let mut report = TickReport {
            minute_key: now_key.clone(),
            ..Default::default()
        };

        let flows = match self.store.list_flows(&FlowFilter::scheduled_active()).await {
            Ok(flows) => flows,
            Err(e) => {
                warn!("⚠️ Flow listing failed, skipping tick: {e}");
                return report;
            }
        };

        let at = WallClock::sample(&now);
        for flow in &flows {
            report.evaluated += 1;

            let Some(cron) = flow.cron() else {
                debug!("Flow '{}' has no cron in trigger config, skipping", flow.id);
                report.skipped += 1;
                continue;
            };
            if !cron_matches(cron, &at) {
                report.skipped += 1;
                continue;
            }
            if flow.schedule_state().last_run_minute_key.as_deref() == Some(now_key.as_str()) {
                debug!("Flow '{}' already fired at {}, skipping", flow.id, now_key);
                report.skipped += 1;
                continue;
            }

            info!("🔔 Flow due: '{}' ({})", flow.name, flow.id);
            let trigger = TriggerEvent::schedule(cron, now, &now_key);
            let state = match self.executor.execute(&flow.id, &trigger, &flow.metadata).await {
                Ok(outcome) if outcome.errors.is_empty() => {
                    report.fired += 1;
                    ScheduleState::completed(&now_key, now, outcome.execution_id)
                }
                Ok(outcome) => {
                    warn!(
                        "⚠️ Flow '{}' execution reported {} error(s)",
                        flow.name,
                        outcome.errors.len()
                    );
                    report.failed += 1;
                    ScheduleState::failed(&now_key, now, "Workflow execution returned errors")
                }
                Err(e) => {
                    warn!("⚠️ Flow '{}' execution failed: {e}", flow.name);
                    report.failed += 1;
                    ScheduleState::failed(&now_key, now, &e.to_string())
                }
            };

            if let Err(e) = self.store.update_schedule(&flow.id, &state).await {
                warn!("⚠️ Failed to record schedule state for '{}': {e}", flow.id);
            }
        }

        if report.fired + report.failed > 0 {
            info!(
                "⏱️ Tick {}: {} fired, {} failed, {} skipped",
                report.minute_key, report.fired, report.failed, report.skipped
            );
        }
        report
    }
}

/// Run the driver loop at a fixed cadence until the task is dropped.
pub async fn run_driver(driver: Arc<ScheduleDriver>, tick_secs: u64) {
    info!("⏰ Schedule driver started (tick every {}s)", tick_secs);
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_secs));
    loop {
        interval.tick().await;
        let report = driver.tick().await;
        debug!(
            "Tick {}: {} evaluated, {} fired, {} failed, {} skipped",
            report.minute_key, report.evaluated, report.fired, report.failed, report.skipped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use loomflow_core::Result;
    use loomflow_core::types::{ExecutionReport, Flow, FlowStatus, RunStatus};

    struct MemoryStore {
        flows: Mutex<Vec<Flow>>,
    }

    impl MemoryStore {
        fn with(flows: Vec<Flow>) -> Arc<Self> {
            Arc::new(Self {
                flows: Mutex::new(flows),
            })
        }

        fn state_of(&self, id: &str) -> ScheduleState {
            self.flows
                .lock()
                .unwrap()
                .iter()
                .find(|f| f.id == id)
                .map(|f| f.schedule_state())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl FlowStore for MemoryStore {
        async fn list_flows(&self, filter: &FlowFilter) -> Result<Vec<Flow>> {
            Ok(self
                .flows
                .lock()
                .unwrap()
                .iter()
                .filter(|f| {
                    filter
                        .trigger_type
                        .as_ref()
                        .is_none_or(|t| &f.trigger_type == t)
                        && filter.status.is_none_or(|s| f.status == s)
                })
                .cloned()
                .collect())
        }

        async fn get_flow(&self, id: &str) -> Result<Option<Flow>> {
            Ok(self
                .flows
                .lock()
                .unwrap()
                .iter()
                .find(|f| f.id == id)
                .cloned())
        }

        async fn insert_flow(&self, flow: &Flow) -> Result<()> {
            self.flows.lock().unwrap().push(flow.clone());
            Ok(())
        }

        async fn set_status(&self, id: &str, status: FlowStatus) -> Result<bool> {
            let mut flows = self.flows.lock().unwrap();
            match flows.iter_mut().find(|f| f.id == id) {
                Some(flow) => {
                    flow.status = status;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn delete_flow(&self, id: &str) -> Result<bool> {
            let mut flows = self.flows.lock().unwrap();
            let len = flows.len();
            flows.retain(|f| f.id != id);
            Ok(flows.len() < len)
        }

        async fn update_schedule(&self, id: &str, state: &ScheduleState) -> Result<()> {
            let mut flows = self.flows.lock().unwrap();
            if let Some(flow) = flows.iter_mut().find(|f| f.id == id) {
                flow.metadata["schedule"] = serde_json::to_value(state)?;
            }
            Ok(())
        }
    }

    /// Executor stub: returns a canned outcome per flow ID and records calls.
    struct StubExecutor {
        calls: Mutex<Vec<(String, TriggerEvent)>>,
        outcomes: Mutex<std::collections::HashMap<String, Outcome>>,
    }

    #[derive(Clone)]
    enum Outcome {
        Ok,
        Errors,
        Broken(String),
    }

    impl StubExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                outcomes: Mutex::new(std::collections::HashMap::new()),
            })
        }

        fn outcome(self: &Arc<Self>, flow_id: &str, outcome: Outcome) -> Arc<Self> {
            self.outcomes
                .lock()
                .unwrap()
                .insert(flow_id.to_string(), outcome);
            self.clone()
        }

        fn call_count(&self, flow_id: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| id == flow_id)
                .count()
        }
    }

    #[async_trait]
    impl FlowExecutor for StubExecutor {
        async fn execute(
            &self,
            flow_id: &str,
            trigger: &TriggerEvent,
            _metadata: &serde_json::Value,
        ) -> Result<ExecutionReport> {
            self.calls
                .lock()
                .unwrap()
                .push((flow_id.to_string(), trigger.clone()));
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .get(flow_id)
                .cloned()
                .unwrap_or(Outcome::Ok);
            match outcome {
                Outcome::Ok => Ok(ExecutionReport {
                    execution_id: Some(format!("exec-{flow_id}")),
                    errors: Vec::new(),
                }),
                Outcome::Errors => Ok(ExecutionReport {
                    execution_id: None,
                    errors: vec!["step 3 failed".into()],
                }),
                Outcome::Broken(msg) => {
                    Err(loomflow_core::LoomflowError::Execution(msg))
                }
            }
        }
    }

    fn tick_instant() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 9, 14, 30, 12).unwrap()
    }

    #[tokio::test]
    async fn test_due_flow_fires_and_records_completed() {
        let flow = Flow::scheduled("hourly-cut-plan", "* * * * *");
        let id = flow.id.clone();
        let store = MemoryStore::with(vec![flow]);
        let executor = StubExecutor::new();
        let driver = ScheduleDriver::new(store.clone(), executor.clone());

        let now = tick_instant();
        let report = driver.tick_at(now).await;
        assert_eq!(report.fired, 1);
        assert_eq!(report.failed, 0);

        let state = store.state_of(&id);
        assert_eq!(state.last_run_minute_key.as_deref(), Some("2026-03-09T14:30"));
        assert_eq!(state.last_status, Some(RunStatus::Completed));
        assert_eq!(state.last_execution_id.as_deref(), Some(format!("exec-{id}").as_str()));
        assert_eq!(executor.call_count(&id), 1);

        let calls = executor.calls.lock().unwrap();
        let (_, trigger) = &calls[0];
        assert_eq!(trigger.triggered_by, "schedule");
        assert_eq!(trigger.cron, "* * * * *");
        assert_eq!(trigger.minute_key, "2026-03-09T14:30");
    }

    #[tokio::test]
    async fn test_same_minute_never_refires() {
        let flow = Flow::scheduled("dedup-check", "* * * * *");
        let id = flow.id.clone();
        let store = MemoryStore::with(vec![flow]);
        let executor = StubExecutor::new();
        let driver = ScheduleDriver::new(store.clone(), executor.clone());

        let now = tick_instant();
        driver.tick_at(now).await;
        let second = driver.tick_at(now).await;

        assert_eq!(executor.call_count(&id), 1);
        assert_eq!(second.fired, 0);
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test]
    async fn test_next_minute_fires_again() {
        let flow = Flow::scheduled("every-minute", "* * * * *");
        let id = flow.id.clone();
        let store = MemoryStore::with(vec![flow]);
        let executor = StubExecutor::new();
        let driver = ScheduleDriver::new(store.clone(), executor.clone());

        driver.tick_at(tick_instant()).await;
        driver
            .tick_at(tick_instant() + chrono::Duration::minutes(1))
            .await;

        assert_eq!(executor.call_count(&id), 2);
        assert_eq!(
            store.state_of(&id).last_run_minute_key.as_deref(),
            Some("2026-03-09T14:31")
        );
    }

    #[tokio::test]
    async fn test_non_matching_cron_skipped() {
        // 03:00 daily does not match a 14:30 tick.
        let flow = Flow::scheduled("nightly", "0 3 * * *");
        let id = flow.id.clone();
        let store = MemoryStore::with(vec![flow]);
        let executor = StubExecutor::new();
        let driver = ScheduleDriver::new(store.clone(), executor.clone());

        let report = driver.tick_at(tick_instant()).await;
        assert_eq!(report.skipped, 1);
        assert_eq!(executor.call_count(&id), 0);
        assert_eq!(store.state_of(&id), ScheduleState::default());
    }

    #[tokio::test]
    async fn test_invalid_cron_skipped_without_state_write() {
        let mut flow = Flow::scheduled("broken", "* * * *");
        flow.trigger_config = serde_json::json!({"cron": "* * * *"});
        let id = flow.id.clone();
        let store = MemoryStore::with(vec![flow]);
        let executor = StubExecutor::new();
        let driver = ScheduleDriver::new(store.clone(), executor.clone());

        let report = driver.tick_at(tick_instant()).await;
        assert_eq!(report.skipped, 1);
        assert_eq!(executor.call_count(&id), 0);
        assert_eq!(store.state_of(&id), ScheduleState::default());
    }

    #[tokio::test]
    async fn test_missing_cron_skipped() {
        let mut flow = Flow::scheduled("no-cron", "* * * * *");
        flow.trigger_config = serde_json::json!({});
        let id = flow.id.clone();
        let store = MemoryStore::with(vec![flow]);
        let executor = StubExecutor::new();
        let driver = ScheduleDriver::new(store.clone(), executor.clone());

        let report = driver.tick_at(tick_instant()).await;
        assert_eq!(report.skipped, 1);
        assert_eq!(executor.call_count(&id), 0);
    }

    #[tokio::test]
    async fn test_error_report_records_failed_with_generic_message() {
        let flow = Flow::scheduled("flaky", "* * * * *");
        let id = flow.id.clone();
        let store = MemoryStore::with(vec![flow]);
        let executor = StubExecutor::new().outcome(&id, Outcome::Errors);
        let driver = ScheduleDriver::new(store.clone(), executor.clone());

        let report = driver.tick_at(tick_instant()).await;
        assert_eq!(report.failed, 1);

        let state = store.state_of(&id);
        assert_eq!(state.last_status, Some(RunStatus::Failed));
        assert_eq!(
            state.last_error.as_deref(),
            Some("Workflow execution returned errors")
        );
        // Key still advances so the minute is not retried.
        assert_eq!(state.last_run_minute_key.as_deref(), Some("2026-03-09T14:30"));
    }

    #[tokio::test]
    async fn test_executor_error_records_message_and_isolates() {
        let broken = Flow::scheduled("broken-first", "* * * * *");
        let healthy = Flow::scheduled("healthy-second", "* * * * *");
        let broken_id = broken.id.clone();
        let healthy_id = healthy.id.clone();
        let store = MemoryStore::with(vec![broken, healthy]);
        let executor = StubExecutor::new().outcome(
            &broken_id,
            Outcome::Broken("db timeout".into()),
        );
        let driver = ScheduleDriver::new(store.clone(), executor.clone());

        let report = driver.tick_at(tick_instant()).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.fired, 1);

        let broken_state = store.state_of(&broken_id);
        assert_eq!(broken_state.last_status, Some(RunStatus::Failed));
        assert_eq!(
            broken_state.last_error.as_deref(),
            Some("Execution error: db timeout")
        );

        // The failing flow did not block the next one.
        assert_eq!(executor.call_count(&healthy_id), 1);
        assert_eq!(
            store.state_of(&healthy_id).last_status,
            Some(RunStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_paused_flows_not_listed() {
        let mut flow = Flow::scheduled("paused", "* * * * *");
        flow.status = FlowStatus::Paused;
        let id = flow.id.clone();
        let store = MemoryStore::with(vec![flow]);
        let executor = StubExecutor::new();
        let driver = ScheduleDriver::new(store.clone(), executor.clone());

        let report = driver.tick_at(tick_instant()).await;
        assert_eq!(report.evaluated, 0);
        assert_eq!(executor.call_count(&id), 0);
    }
}
