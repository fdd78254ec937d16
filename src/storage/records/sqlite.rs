//! `SQLite` learning store.
//!
//! One database holds the orchestrator records the learning services read:
//!
//! | Table | Contents |
//! |-------|----------|
//! | `task_executions` | One row per task attempt |
//! | `behavioral_sessions` | Agent session linked to an execution |
//! | `tool_executions` | Tool invocations within a session |
//! | `file_operations` | File reads/writes within a session |
//! | `lip_events` | Append-only test/build progress events |
//! | `successful_patterns` | Success counters keyed by normalized task hash |
//!
//! Timestamps are stored as Unix milliseconds.

#![allow(clippy::significant_drop_tightening)]

use crate::models::{
    AgentSuccessCount, EventFilter, FileOperation, OperationRates, ProgressEvent,
    ProgressEventType, QcVerdict, SuccessfulPattern, TaskExecution, ToolExecution,
};
use crate::storage::sqlite::{
    acquire_lock, escape_like_wildcards, json_column, numbered_placeholders, open_file,
    open_in_memory, record_operation_metrics, sql_error, status_label,
};
use crate::storage::traits::{BehaviorStore, EventStore, ExecutionStore, PatternStore};
use crate::{Error, Result, current_timestamp};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite_learning";

const EXECUTION_COLUMNS: &str = "id, plan_file, run_number, task_number, task_name, agent, prompt, \
     success, output, error_message, duration_ms, qc_verdict, qc_feedback, failure_patterns, \
     files, timestamp";

const EVENT_COLUMNS: &str =
    "id, task_execution_id, task_number, event_type, timestamp, details, confidence";

const PATTERN_COLUMNS: &str =
    "id, task_hash, pattern_description, last_agent, success_count, last_seen";

/// `SQLite` implementation of every record store trait.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and `busy_timeout`
/// handle concurrent access from other processes writing the same file.
pub struct SqliteLearningStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteLearningStore {
    /// Opens (or creates) a learning database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_file(&db_path, "open_learning_sqlite")?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = open_in_memory("open_learning_sqlite_memory")?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS task_executions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                plan_file TEXT NOT NULL,
                run_number INTEGER NOT NULL DEFAULT 1,
                task_number TEXT NOT NULL,
                task_name TEXT NOT NULL,
                agent TEXT NOT NULL DEFAULT '',
                prompt TEXT NOT NULL DEFAULT '',
                success INTEGER NOT NULL,
                output TEXT NOT NULL DEFAULT '',
                error_message TEXT,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                qc_verdict TEXT,
                qc_feedback TEXT NOT NULL DEFAULT '',
                failure_patterns TEXT NOT NULL DEFAULT '[]',
                files TEXT NOT NULL DEFAULT '[]',
                timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_task_executions_task
                ON task_executions(plan_file, task_number);
            CREATE INDEX IF NOT EXISTS idx_task_executions_timestamp
                ON task_executions(timestamp DESC);
            CREATE INDEX IF NOT EXISTS idx_task_executions_agent
                ON task_executions(agent, success);

            CREATE TABLE IF NOT EXISTS behavioral_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_execution_id INTEGER NOT NULL,
                agent TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_behavioral_sessions_execution
                ON behavioral_sessions(task_execution_id);

            CREATE TABLE IF NOT EXISTS tool_executions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL,
                tool_name TEXT NOT NULL,
                success INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_tool_executions_session
                ON tool_executions(session_id);

            CREATE TABLE IF NOT EXISTS file_operations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL,
                operation TEXT NOT NULL,
                file_path TEXT NOT NULL,
                success INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_file_operations_session
                ON file_operations(session_id);

            CREATE TABLE IF NOT EXISTS lip_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_execution_id INTEGER NOT NULL,
                task_number TEXT NOT NULL DEFAULT '',
                event_type TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                details TEXT NOT NULL DEFAULT '',
                confidence REAL NOT NULL DEFAULT 1.0
            );
            CREATE INDEX IF NOT EXISTS idx_lip_events_execution
                ON lip_events(task_execution_id, event_type);
            CREATE INDEX IF NOT EXISTS idx_lip_events_task ON lip_events(task_number);

            CREATE TABLE IF NOT EXISTS successful_patterns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_hash TEXT NOT NULL UNIQUE,
                pattern_description TEXT NOT NULL DEFAULT '',
                last_agent TEXT NOT NULL DEFAULT '',
                success_count INTEGER NOT NULL DEFAULT 1,
                last_seen INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_successful_patterns_count
                ON successful_patterns(success_count DESC);",
        )
        .map_err(sql_error("create_learning_tables"))
    }

    fn parse_execution_row(row: &Row<'_>) -> rusqlite::Result<TaskExecution> {
        let run_number: i64 = row.get("run_number")?;
        let duration_ms: i64 = row.get("duration_ms")?;
        let qc_verdict: Option<String> = row.get("qc_verdict")?;
        let failure_patterns: String = row.get("failure_patterns")?;
        let files: String = row.get("files")?;
        let timestamp: i64 = row.get("timestamp")?;

        Ok(TaskExecution {
            id: row.get("id")?,
            plan_file: row.get("plan_file")?,
            run_number: u32::try_from(run_number).unwrap_or(1),
            task_number: row.get("task_number")?,
            task_name: row.get("task_name")?,
            agent: row.get("agent")?,
            prompt: row.get("prompt")?,
            success: row.get("success")?,
            output: row.get("output")?,
            error_message: row.get("error_message")?,
            duration_ms: u64::try_from(duration_ms).unwrap_or(0),
            qc_verdict: qc_verdict.as_deref().and_then(QcVerdict::parse),
            qc_feedback: row.get("qc_feedback")?,
            failure_patterns: json_column(&failure_patterns, 13)?,
            files: json_column(&files, 14)?,
            timestamp: from_millis(timestamp),
        })
    }

    fn parse_event_row(row: &Row<'_>) -> rusqlite::Result<ProgressEvent> {
        let event_type: String = row.get("event_type")?;
        let timestamp: i64 = row.get("timestamp")?;

        let event_type = ProgressEventType::parse(&event_type).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.to_string().into())
        })?;

        Ok(ProgressEvent {
            id: row.get("id")?,
            task_execution_id: row.get("task_execution_id")?,
            task_number: row.get("task_number")?,
            event_type,
            timestamp: Some(from_millis(timestamp)),
            details: row.get("details")?,
            confidence: Some(row.get("confidence")?),
        })
    }

    fn parse_pattern_row(row: &Row<'_>) -> rusqlite::Result<SuccessfulPattern> {
        let success_count: i64 = row.get("success_count")?;
        Ok(SuccessfulPattern {
            id: row.get("id")?,
            task_hash: row.get("task_hash")?,
            description: row.get("pattern_description")?,
            last_agent: row.get("last_agent")?,
            success_count: u64::try_from(success_count).unwrap_or(0),
            last_seen: row.get("last_seen")?,
        })
    }

    /// Builds WHERE clause conditions for event queries.
    fn build_event_where_clause(filter: &EventFilter) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref task_number) = filter.task_number {
            params.push(Box::new(task_number.clone()));
            conditions.push(format!("task_number = ?{}", params.len()));
        }

        if let Some(execution_id) = filter.task_execution_id {
            params.push(Box::new(execution_id));
            conditions.push(format!("task_execution_id = ?{}", params.len()));
        }

        if let Some(since) = filter.since {
            params.push(Box::new(since.timestamp_millis()));
            conditions.push(format!("timestamp >= ?{}", params.len()));
        }

        if let Some(until) = filter.until {
            params.push(Box::new(until.timestamp_millis()));
            conditions.push(format!("timestamp <= ?{}", params.len()));
        }

        if !filter.event_types.is_empty() {
            let placeholders = numbered_placeholders(params.len() + 1, filter.event_types.len());
            for event_type in &filter.event_types {
                params.push(Box::new(event_type.as_str()));
            }
            conditions.push(format!("event_type IN ({placeholders})"));
        }

        if let Some(min_confidence) = filter.min_confidence {
            params.push(Box::new(min_confidence));
            conditions.push(format!("confidence >= ?{}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn query_executions(
        conn: &Connection,
        sql: &str,
        params: &[&dyn ToSql],
        operation: &str,
    ) -> Result<Vec<TaskExecution>> {
        let mut stmt = conn.prepare(sql).map_err(sql_error(operation))?;
        let rows = stmt
            .query_map(params, Self::parse_execution_row)
            .map_err(sql_error(operation))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_error(operation))
    }

    fn query_patterns(
        conn: &Connection,
        sql: &str,
        params: &[&dyn ToSql],
        operation: &str,
    ) -> Result<Vec<SuccessfulPattern>> {
        let mut stmt = conn.prepare(sql).map_err(sql_error(operation))?;
        let rows = stmt
            .query_map(params, Self::parse_pattern_row)
            .map_err(sql_error(operation))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_error(operation))
    }

    /// Returns `(total, succeeded)` for a success-flagged child table of
    /// `behavioral_sessions`.
    fn success_counts(conn: &Connection, table: &str, task_execution_id: i64) -> Result<(i64, i64)> {
        let sql = format!(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN t.success THEN 1 ELSE 0 END), 0)
             FROM {table} t
             JOIN behavioral_sessions s ON t.session_id = s.id
             WHERE s.task_execution_id = ?1"
        );
        conn.query_row(&sql, params![task_execution_id], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(sql_error("operation_success_rates"))
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn to_json(values: &[String], operation: &str) -> Result<String> {
    serde_json::to_string(values).map_err(|e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    })
}

fn to_sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(total: i64, succeeded: i64) -> Option<f64> {
    (total > 0).then(|| succeeded as f64 / total as f64)
}

impl ExecutionStore for SqliteLearningStore {
    #[instrument(skip(self, execution), fields(plan_file = %execution.plan_file, task_number = %execution.task_number))]
    fn record_execution(&self, execution: &TaskExecution) -> Result<i64> {
        let start = Instant::now();
        let result: Result<i64> = (|| {
            let failure_patterns = to_json(&execution.failure_patterns, "serialize_failure_patterns")?;
            let files = to_json(&execution.files, "serialize_files")?;
            let conn = acquire_lock(&self.conn);

            conn.execute(
                "INSERT INTO task_executions (
                    plan_file, run_number, task_number, task_name, agent, prompt, success,
                    output, error_message, duration_ms, qc_verdict, qc_feedback,
                    failure_patterns, files, timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    execution.plan_file,
                    i64::from(execution.run_number),
                    execution.task_number,
                    execution.task_name,
                    execution.agent,
                    execution.prompt,
                    execution.success,
                    execution.output,
                    execution.error_message,
                    i64::try_from(execution.duration_ms).unwrap_or(i64::MAX),
                    execution.qc_verdict.map(|v| v.as_str()),
                    execution.qc_feedback,
                    failure_patterns,
                    files,
                    execution.timestamp.timestamp_millis()
                ],
            )
            .map_err(sql_error("record_execution"))?;

            Ok(conn.last_insert_rowid())
        })();

        record_operation_metrics(BACKEND, "record_execution", start, status_label(&result));
        result
    }

    #[instrument(skip(self))]
    fn get_execution(&self, id: i64) -> Result<Option<TaskExecution>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            &format!("SELECT {EXECUTION_COLUMNS} FROM task_executions WHERE id = ?1"),
            params![id],
            Self::parse_execution_row,
        )
        .optional()
        .map_err(sql_error("get_execution"))
    }

    #[instrument(skip(self))]
    fn task_history(&self, plan_file: &str, task_number: &str) -> Result<Vec<TaskExecution>> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            Self::query_executions(
                &conn,
                &format!(
                    "SELECT {EXECUTION_COLUMNS} FROM task_executions
                     WHERE plan_file = ?1 AND task_number = ?2
                     ORDER BY timestamp DESC, id DESC"
                ),
                &[&plan_file, &task_number],
                "task_history",
            )
        };

        record_operation_metrics(BACKEND, "task_history", start, status_label(&result));
        result
    }

    #[instrument(skip(self))]
    fn recent_executions(&self, limit: usize) -> Result<Vec<TaskExecution>> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            Self::query_executions(
                &conn,
                &format!(
                    "SELECT {EXECUTION_COLUMNS} FROM task_executions
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?1"
                ),
                &[&to_sql_limit(limit)],
                "recent_executions",
            )
        };

        record_operation_metrics(BACKEND, "recent_executions", start, status_label(&result));
        result
    }

    #[instrument(skip(self, exclude), fields(excluded = exclude.len()))]
    fn agent_success_counts(
        &self,
        min_successes: u64,
        exclude: &[String],
    ) -> Result<Vec<AgentSuccessCount>> {
        let exclusion = if exclude.is_empty() {
            String::new()
        } else {
            format!(" AND agent NOT IN ({})", numbered_placeholders(2, exclude.len()))
        };
        let sql = format!(
            "SELECT agent, COUNT(*) AS successes FROM task_executions
             WHERE success = 1 AND agent != ''{exclusion}
             GROUP BY agent
             HAVING COUNT(*) >= ?1
             ORDER BY successes DESC, agent ASC"
        );

        let min = i64::try_from(min_successes).unwrap_or(i64::MAX);
        let mut params: Vec<&dyn ToSql> = vec![&min as &dyn ToSql];
        params.extend(exclude.iter().map(|a| a as &dyn ToSql));

        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(sql_error("agent_success_counts_prepare"))?;
        let rows = stmt
            .query_map(params.as_slice(), |row| {
                let successes: i64 = row.get(1)?;
                Ok(AgentSuccessCount {
                    agent: row.get(0)?,
                    successes: u64::try_from(successes).unwrap_or(0),
                })
            })
            .map_err(sql_error("agent_success_counts"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_error("agent_success_counts_row"))
    }
}

impl BehaviorStore for SqliteLearningStore {
    #[instrument(skip(self))]
    fn record_session(&self, task_execution_id: i64, agent: &str) -> Result<i64> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO behavioral_sessions (task_execution_id, agent, created_at)
             VALUES (?1, ?2, ?3)",
            params![task_execution_id, agent, current_timestamp()],
        )
        .map_err(sql_error("record_session"))?;
        Ok(conn.last_insert_rowid())
    }

    #[instrument(skip(self, tool), fields(tool = %tool.tool_name))]
    fn record_tool_execution(&self, session_id: i64, tool: &ToolExecution) -> Result<i64> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO tool_executions (session_id, tool_name, success, duration_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                tool.tool_name,
                tool.success,
                i64::try_from(tool.duration_ms).unwrap_or(i64::MAX)
            ],
        )
        .map_err(sql_error("record_tool_execution"))?;
        Ok(conn.last_insert_rowid())
    }

    #[instrument(skip(self, operation), fields(path = %operation.path))]
    fn record_file_operation(&self, session_id: i64, operation: &FileOperation) -> Result<i64> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO file_operations (session_id, operation, file_path, success)
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, operation.operation, operation.path, operation.success],
        )
        .map_err(sql_error("record_file_operation"))?;
        Ok(conn.last_insert_rowid())
    }

    #[instrument(skip(self))]
    fn operation_success_rates(&self, task_execution_id: i64) -> Result<OperationRates> {
        let conn = acquire_lock(&self.conn);
        let (tools, tools_ok) = Self::success_counts(&conn, "tool_executions", task_execution_id)?;
        let (files, files_ok) = Self::success_counts(&conn, "file_operations", task_execution_id)?;

        Ok(OperationRates {
            tool_success_rate: ratio(tools, tools_ok),
            file_success_rate: ratio(files, files_ok),
        })
    }
}

impl EventStore for SqliteLearningStore {
    #[instrument(skip(self, event), fields(execution_id = event.task_execution_id, event_type = %event.event_type))]
    fn insert_event(&self, event: &ProgressEvent) -> Result<i64> {
        let start = Instant::now();
        let result: Result<i64> = (|| {
            let conn = acquire_lock(&self.conn);
            conn.execute(
                "INSERT INTO lip_events (task_execution_id, task_number, event_type, timestamp, details, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.task_execution_id,
                    event.task_number,
                    event.event_type.as_str(),
                    event.timestamp.unwrap_or_else(Utc::now).timestamp_millis(),
                    event.details,
                    event.effective_confidence()
                ],
            )
            .map_err(sql_error("insert_event"))?;
            Ok(conn.last_insert_rowid())
        })();

        record_operation_metrics(BACKEND, "insert_event", start, status_label(&result));
        result
    }

    #[instrument(skip(self, filter))]
    fn query_events(&self, filter: &EventFilter) -> Result<Vec<ProgressEvent>> {
        let (where_clause, params) = Self::build_event_where_clause(filter);
        let limit = filter
            .limit
            .map(|l| format!(" LIMIT {}", to_sql_limit(l)))
            .unwrap_or_default();
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM lip_events {where_clause} ORDER BY timestamp DESC, id DESC{limit}"
        );

        let conn = acquire_lock(&self.conn);
        let mut stmt = conn.prepare(&sql).map_err(sql_error("query_events_prepare"))?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| &**p).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), Self::parse_event_row)
            .map_err(sql_error("query_events"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_error("query_events_row"))
    }
}

impl PatternStore for SqliteLearningStore {
    #[instrument(skip(self, description))]
    fn record_pattern_success(
        &self,
        task_hash: &str,
        description: &str,
        agent: &str,
    ) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO successful_patterns (task_hash, pattern_description, last_agent, success_count, last_seen)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(task_hash) DO UPDATE SET
                pattern_description = excluded.pattern_description,
                last_agent = excluded.last_agent,
                success_count = successful_patterns.success_count + 1,
                last_seen = excluded.last_seen",
            params![task_hash, description, agent, Utc::now().timestamp_millis()],
        )
        .map_err(sql_error("record_pattern_success"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn top_patterns(&self, limit: usize) -> Result<Vec<SuccessfulPattern>> {
        let conn = acquire_lock(&self.conn);
        Self::query_patterns(
            &conn,
            &format!(
                "SELECT {PATTERN_COLUMNS} FROM successful_patterns
                 ORDER BY success_count DESC, id ASC
                 LIMIT ?1"
            ),
            &[&to_sql_limit(limit)],
            "top_patterns",
        )
    }

    #[instrument(skip(self))]
    fn patterns_by_hash_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<SuccessfulPattern>> {
        let pattern = format!("{}%", escape_like_wildcards(prefix));
        let conn = acquire_lock(&self.conn);
        Self::query_patterns(
            &conn,
            &format!(
                "SELECT {PATTERN_COLUMNS} FROM successful_patterns
                 WHERE task_hash LIKE ?1 ESCAPE '\\'
                 ORDER BY success_count DESC, id ASC
                 LIMIT ?2"
            ),
            &[&pattern, &to_sql_limit(limit)],
            "patterns_by_hash_prefix",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn execution(task_number: &str, agent: &str, success: bool, seconds: i64) -> TaskExecution {
        TaskExecution::new("plan.md", task_number, format!("Task {task_number}"), agent)
            .with_success(success)
            .with_timestamp(at(seconds))
    }

    #[test]
    fn test_record_and_get_execution() {
        let store = SqliteLearningStore::in_memory().unwrap();
        let exec = execution("1", "rust-pro", true, 0)
            .with_output("all good")
            .with_error("warning only")
            .with_qc_verdict(QcVerdict::Green)
            .with_files(["src/lib.rs", "src/main.rs"])
            .with_run_number(3);

        let id = store.record_execution(&exec).unwrap();
        assert!(id > 0);

        let loaded = store.get_execution(id).unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.files, vec!["src/lib.rs", "src/main.rs"]);
        assert_eq!(loaded.qc_verdict, Some(QcVerdict::Green));
        assert_eq!(loaded.error_message.as_deref(), Some("warning only"));
        assert_eq!(loaded.run_number, 3);
        assert_eq!(loaded.timestamp, at(0));

        assert!(store.get_execution(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_task_history_newest_first() {
        let store = SqliteLearningStore::in_memory().unwrap();
        store.record_execution(&execution("1", "a", false, 10)).unwrap();
        store.record_execution(&execution("1", "b", false, 30)).unwrap();
        store.record_execution(&execution("2", "c", true, 20)).unwrap();

        let history = store.task_history("plan.md", "1").unwrap();
        let agents: Vec<&str> = history.iter().map(|e| e.agent.as_str()).collect();
        assert_eq!(agents, vec!["b", "a"]);

        assert!(store.task_history("other.md", "1").unwrap().is_empty());
    }

    #[test]
    fn test_recent_executions_limit() {
        let store = SqliteLearningStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .record_execution(&execution(&i.to_string(), "a", true, i))
                .unwrap();
        }

        let recent = store.recent_executions(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].task_number, "4");
        assert_eq!(recent[1].task_number, "3");
    }

    #[test]
    fn test_agent_success_counts() {
        let store = SqliteLearningStore::in_memory().unwrap();
        for i in 0..3 {
            store.record_execution(&execution("1", "beta", true, i)).unwrap();
            store.record_execution(&execution("1", "alpha", true, i)).unwrap();
        }
        store.record_execution(&execution("1", "gamma", true, 0)).unwrap();
        store.record_execution(&execution("1", "delta", false, 0)).unwrap();

        let counts = store.agent_success_counts(2, &[]).unwrap();
        let agents: Vec<&str> = counts.iter().map(|c| c.agent.as_str()).collect();
        assert_eq!(agents, vec!["alpha", "beta"]);
        assert_eq!(counts[0].successes, 3);

        let counts = store
            .agent_success_counts(1, &["alpha".to_string()])
            .unwrap();
        let agents: Vec<&str> = counts.iter().map(|c| c.agent.as_str()).collect();
        assert_eq!(agents, vec!["beta", "gamma"]);
    }

    #[test]
    fn test_operation_success_rates() {
        let store = SqliteLearningStore::in_memory().unwrap();
        let exec_id = store.record_execution(&execution("1", "a", true, 0)).unwrap();

        let empty = store.operation_success_rates(exec_id).unwrap();
        assert_eq!(empty, OperationRates::default());

        let session = store.record_session(exec_id, "a").unwrap();
        store
            .record_tool_execution(session, &ToolExecution::new("Bash", true))
            .unwrap();
        store
            .record_tool_execution(session, &ToolExecution::new("Edit", false))
            .unwrap();
        store
            .record_file_operation(session, &FileOperation::new("write", "src/lib.rs", true))
            .unwrap();

        let rates = store.operation_success_rates(exec_id).unwrap();
        assert_eq!(rates.tool_success_rate, Some(0.5));
        assert_eq!(rates.file_success_rate, Some(1.0));
    }

    #[test]
    fn test_query_events_filters() {
        let store = SqliteLearningStore::in_memory().unwrap();
        let events = [
            ProgressEvent::new(1, "3", ProgressEventType::TestPass).with_timestamp(at(1)),
            ProgressEvent::new(1, "3", ProgressEventType::BuildFail)
                .with_timestamp(at(2))
                .with_confidence(0.4),
            ProgressEvent::new(2, "4", ProgressEventType::TestFail).with_timestamp(at(3)),
        ];
        for event in &events {
            store.insert_event(event).unwrap();
        }

        let all = store.query_events(&EventFilter::new()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].event_type, ProgressEventType::TestFail);

        let by_exec = store.query_events(&EventFilter::new().for_execution(1)).unwrap();
        assert_eq!(by_exec.len(), 2);

        let confident = store
            .query_events(&EventFilter::new().for_task("3").with_min_confidence(0.5))
            .unwrap();
        assert_eq!(confident.len(), 1);
        assert_eq!(confident[0].event_type, ProgressEventType::TestPass);

        let typed = store
            .query_events(
                &EventFilter::new()
                    .with_types([ProgressEventType::TestFail, ProgressEventType::BuildFail]),
            )
            .unwrap();
        assert_eq!(typed.len(), 2);

        let ranged = store
            .query_events(&EventFilter::new().between(at(2), at(3)).with_limit(1))
            .unwrap();
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].timestamp, Some(at(3)));
    }

    #[test]
    fn test_pattern_upsert_and_prefix_lookup() {
        let store = SqliteLearningStore::in_memory().unwrap();
        store
            .record_pattern_success("addloginhandler", "first", "a")
            .unwrap();
        store
            .record_pattern_success("addloginhandler", "second", "b")
            .unwrap();
        store.record_pattern_success("add_user", "other", "c").unwrap();

        let top = store.top_patterns(10).unwrap();
        assert_eq!(top[0].task_hash, "addloginhandler");
        assert_eq!(top[0].success_count, 2);
        assert_eq!(top[0].description, "second");
        assert_eq!(top[0].last_agent, "b");

        // The underscore is literal, not a wildcard.
        let found = store.patterns_by_hash_prefix("add_", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].task_hash, "add_user");
    }

    #[test]
    fn test_corrupt_json_fails_the_read() {
        let store = SqliteLearningStore::in_memory().unwrap();
        let id = store.record_execution(&execution("1", "a", true, 0)).unwrap();
        {
            let conn = acquire_lock(&store.conn);
            conn.execute("UPDATE task_executions SET files = '[\"a.rs\"' WHERE id = ?1", params![id])
                .unwrap();
        }

        assert!(matches!(store.get_execution(id), Err(Error::OperationFailed { .. })));
        assert!(store.recent_executions(10).is_err());
    }

    #[test]
    fn test_reopen_keeps_records() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("learning.db");

        let id = {
            let store = SqliteLearningStore::new(&path).unwrap();
            store.record_execution(&execution("1", "a", true, 0)).unwrap()
        };

        let store = SqliteLearningStore::new(&path).unwrap();
        assert!(store.get_execution(id).unwrap().is_some());
        assert_eq!(store.db_path(), Some(path.as_path()));
    }
}
