//! # Loomflow Scheduler
//!
//! The schedule driver and its collaborators: once per minute, decide which
//! schedule-triggered flows are due, invoke the execution service, and record
//! per-flow bookkeeping so the same minute never double-fires.
//!
//! ## Architecture
//! ```text
//! run_driver (tokio interval)
//!   └── ScheduleDriver::tick
//!         ├── FlowStore::list_flows({schedule, active})   — fresh every tick
//!         ├── cron_matches(trigger_config.cron, now)      — loomflow-cron
//!         ├── minute-key dedup against metadata.schedule
//!         ├── FlowExecutor::execute(flow, trigger event)
//!         │     ├── WebhookExecutor — POST to the execution service
//!         │     └── LogExecutor    — local logging fallback / dry runs
//!         └── FlowStore::update_schedule — completed/failed bookkeeping
//! ```
//!
//! Per-flow failures are isolated: one flow's error never aborts the tick.

pub mod driver;
pub mod executor;
pub mod store;

pub use driver::{ScheduleDriver, TickReport, run_driver};
pub use executor::{LogExecutor, WebhookExecutor};
pub use store::SqliteFlowStore;
