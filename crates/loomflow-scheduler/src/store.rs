//! SQLite-backed flow store.
//!
//! Flows carry their trigger and metadata as JSON columns; the scheduler's
//! bookkeeping lives inside `metadata` under the "schedule" key, so a
//! schedule update rewrites the metadata column as a merge, never a
//! replacement of sibling keys.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use loomflow_core::error::{LoomflowError, Result};
use loomflow_core::traits::FlowStore;
use loomflow_core::types::{Flow, FlowFilter, FlowStatus, ScheduleState};

/// Persistent flow storage.
pub struct SqliteFlowStore {
    conn: Mutex<Connection>,
}

impl SqliteFlowStore {
    /// Open or create the flow database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn =
            Connection::open(path).map_err(|e| LoomflowError::Database(format!("DB open: {e}")))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;

             CREATE TABLE IF NOT EXISTS flows (
                 id TEXT PRIMARY KEY,
                 name TEXT NOT NULL,
                 trigger_type TEXT NOT NULL,      -- 'schedule', 'manual', 'event'
                 trigger_config TEXT NOT NULL DEFAULT '{}',  -- JSON
                 status TEXT NOT NULL DEFAULT 'draft',
                 metadata TEXT NOT NULL DEFAULT '{}',        -- JSON, schedule state under 'schedule'
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );",
        )
        .map_err(|e| LoomflowError::Database(format!("Migration: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_flow(row: &rusqlite::Row<'_>) -> rusqlite::Result<Flow> {
        let trigger_config_str: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        let metadata_str: String = row.get(5)?;
        let created_at_str: String = row.get(6)?;
        let updated_at_str: String = row.get(7)?;

        // Corrupt JSON degrades to an empty object rather than failing the listing.
        let trigger_config = serde_json::from_str(&trigger_config_str)
            .unwrap_or_else(|_| serde_json::json!({}));
        let metadata =
            serde_json::from_str(&metadata_str).unwrap_or_else(|_| serde_json::json!({}));

        let status = match status_str.as_str() {
            "active" => FlowStatus::Active,
            "paused" => FlowStatus::Paused,
            _ => FlowStatus::Draft,
        };

        Ok(Flow {
            id: row.get(0)?,
            name: row.get(1)?,
            trigger_type: row.get(2)?,
            trigger_config,
            status,
            metadata,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl FlowStore for SqliteFlowStore {
    async fn list_flows(&self, filter: &FlowFilter) -> Result<Vec<Flow>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT id, name, trigger_type, trigger_config, status, metadata, created_at, updated_at FROM flows",
        );
        let mut clauses = Vec::new();
        let mut params: Vec<String> = Vec::new();
        if let Some(trigger_type) = &filter.trigger_type {
            clauses.push("trigger_type = ?");
            params.push(trigger_type.clone());
        }
        if let Some(status) = &filter.status {
            clauses.push("status = ?");
            params.push(status.as_str().to_string());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LoomflowError::Database(format!("List flows: {e}")))?;
        let flows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), Self::row_to_flow)
            .map_err(|e| LoomflowError::Database(format!("List flows: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| LoomflowError::Database(format!("List flows: {e}")))?;
        Ok(flows)
    }

    async fn get_flow(&self, id: &str) -> Result<Option<Flow>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, trigger_type, trigger_config, status, metadata, created_at, updated_at FROM flows WHERE id = ?1",
            [id],
            Self::row_to_flow,
        )
        .optional()
        .map_err(|e| LoomflowError::Database(format!("Get flow: {e}")))
    }

    async fn insert_flow(&self, flow: &Flow) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO flows
             (id, name, trigger_type, trigger_config, status, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                flow.id,
                flow.name,
                flow.trigger_type,
                flow.trigger_config.to_string(),
                flow.status.as_str(),
                flow.metadata.to_string(),
                flow.created_at.to_rfc3339(),
                flow.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| LoomflowError::Database(format!("Insert flow: {e}")))?;
        Ok(())
    }

    async fn set_status(&self, id: &str, status: FlowStatus) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE flows SET status = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![status.as_str(), Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| LoomflowError::Database(format!("Set status: {e}")))?;
        Ok(changed > 0)
    }

    async fn delete_flow(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM flows WHERE id = ?1", [id])
            .map_err(|e| LoomflowError::Database(format!("Delete flow: {e}")))?;
        Ok(changed > 0)
    }

    async fn update_schedule(&self, id: &str, state: &ScheduleState) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let metadata_str: String = conn
            .query_row("SELECT metadata FROM flows WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .map_err(|e| LoomflowError::Database(format!("Update schedule: {e}")))?;

        let mut metadata: serde_json::Value =
            serde_json::from_str(&metadata_str).unwrap_or_else(|_| serde_json::json!({}));
        if !metadata.is_object() {
            metadata = serde_json::json!({});
        }
        metadata["schedule"] = serde_json::to_value(state)?;

        conn.execute(
            "UPDATE flows SET metadata = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![metadata.to_string(), Utc::now().to_rfc3339(), id],
        )
        .map_err(|e| LoomflowError::Database(format!("Update schedule: {e}")))?;
        Ok(())
    }
}
