//! Append-only SQLite audit history

use crate::error::AuditResult;
use crate::event::AuditEvent;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    event_type TEXT NOT NULL,
    subject TEXT NOT NULL,
    action TEXT NOT NULL,
    server TEXT,
    tool TEXT,
    status TEXT NOT NULL,
    parameters TEXT,
    policy_decision TEXT,
    duration_ms INTEGER,
    error TEXT
);
CREATE INDEX IF NOT EXISTS idx_audit_log_ts ON audit_log(ts);
CREATE INDEX IF NOT EXISTS idx_audit_log_subject ON audit_log(subject);
"#;

/// SQLite-backed audit history; insert-only
pub struct AuditStore {
    pool: SqlitePool,
}

impl AuditStore {
    /// Connect to the audit database, creating file and schema when missing
    pub async fn connect(database_url: &str) -> AuditResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Append one event
    pub async fn insert(&self, event: &AuditEvent) -> AuditResult<()> {
        let parameters = event
            .parameters
            .as_ref()
            .map(|p| p.to_string());

        sqlx::query(
            "INSERT INTO audit_log \
             (ts, event_type, subject, action, server, tool, status, parameters, policy_decision, duration_ms, error) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.ts)
        .bind(event.event_type.as_str())
        .bind(&event.subject)
        .bind(&event.action)
        .bind(&event.server)
        .bind(&event.tool)
        .bind(event.status.as_str())
        .bind(parameters)
        .bind(&event.policy_decision)
        .bind(event.duration_ms.map(|d| d as i64))
        .bind(&event.error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of stored events (used by tests and the health endpoint)
    pub async fn count(&self) -> AuditResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStatus, EventType};

    #[tokio::test]
    async fn insert_and_count() {
        let store = AuditStore::connect("sqlite::memory:").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        let event = AuditEvent::new(EventType::ToolInvocation, "alice", "invoke_tool")
            .with_server("alpha")
            .with_tool("echo")
            .with_status(EventStatus::Success)
            .with_duration_ms(12);

        store.insert(&event).await.unwrap();
        store.insert(&event).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
