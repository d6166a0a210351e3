//! SQLite-based history and task storage.
//!
//! Provides persistent storage for:
//! - Completed work sessions (the history log)
//! - Tasks with their pomodoro counters and the active-task flag

use std::path::Path;

use chrono::{Local, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::completion::{ActiveTask, HistoryEntry, HistorySink, TaskPort};
use crate::error::{DatabaseError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub estimated_pomodoros: u32,
    pub completed_pomodoros: u32,
    pub is_completed: bool,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total_sessions: u64,
    pub today_sessions: u64,
    pub tasks_total: u64,
    pub tasks_completed: u64,
}

/// SQLite database for history and tasks.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/tikkr.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("tikkr.db"))
    }

    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS history (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                store_time   TEXT NOT NULL,
                date         TEXT NOT NULL,
                time         TEXT NOT NULL,
                session_type TEXT NOT NULL,
                task_title   TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id                  TEXT PRIMARY KEY,
                title               TEXT NOT NULL,
                estimated_pomodoros INTEGER NOT NULL DEFAULT 1,
                completed_pomodoros INTEGER NOT NULL DEFAULT 0,
                is_completed        INTEGER NOT NULL DEFAULT 0,
                is_active           INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_date ON history(date);",
        )?;
        Ok(())
    }

    // ── History ──────────────────────────────────────────────────────

    /// Record a completed session.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_history(&self, entry: &HistoryEntry) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO history (store_time, date, time, session_type, task_title)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.store_time,
                entry.date,
                entry.time,
                entry.session_type,
                entry.task_title,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent entries first.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT store_time, date, time, session_type, task_title
             FROM history
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(HistoryEntry {
                store_time: row.get(0)?,
                date: row.get(1)?,
                time: row.get(2)?,
                session_type: row.get(3)?,
                task_title: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn clear_history(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM history", [])?)
    }

    pub fn stats(&self) -> Result<HistoryStats> {
        let today = Local::now().format("%Y-%m-%d").to_string();
        let (total_sessions, today_sessions) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN date = ?1 THEN 1 ELSE 0 END), 0)
             FROM history",
            params![today],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        let (tasks_total, tasks_completed) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_completed), 0) FROM tasks",
            [],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        Ok(HistoryStats {
            total_sessions,
            today_sessions,
            tasks_total,
            tasks_completed,
        })
    }

    // ── Tasks ────────────────────────────────────────────────────────

    /// Add a task. The first task added to an empty list becomes active.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn add_task(&self, title: &str, estimated_pomodoros: u32) -> Result<TaskRecord> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
        let task = TaskRecord {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            estimated_pomodoros: estimated_pomodoros.max(1),
            completed_pomodoros: 0,
            is_completed: false,
            is_active: count == 0,
            created_at: Utc::now().to_rfc3339(),
        };
        self.conn.execute(
            "INSERT INTO tasks (id, title, estimated_pomodoros, completed_pomodoros,
                                is_completed, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.id,
                task.title,
                task.estimated_pomodoros,
                task.completed_pomodoros,
                task.is_completed,
                task.is_active,
                task.created_at,
            ],
        )?;
        Ok(task)
    }

    pub fn tasks(&self) -> Result<Vec<TaskRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, estimated_pomodoros, completed_pomodoros,
                    is_completed, is_active, created_at
             FROM tasks
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([], row_to_task)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn task(&self, id: &str) -> Result<Option<TaskRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, estimated_pomodoros, completed_pomodoros,
                    is_completed, is_active, created_at
             FROM tasks WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![id], row_to_task).optional()?)
    }

    /// Make `id` the only active task.
    pub fn activate_task(&self, id: &str) -> Result<()> {
        self.require_task(id)?;
        self.conn.execute(
            "UPDATE tasks SET is_active = (id = ?1)",
            params![id],
        )?;
        Ok(())
    }

    /// Flip the completed flag, returning the new value.
    pub fn toggle_task(&self, id: &str) -> Result<bool> {
        self.require_task(id)?;
        self.conn.execute(
            "UPDATE tasks SET is_completed = NOT is_completed WHERE id = ?1",
            params![id],
        )?;
        Ok(self
            .conn
            .query_row("SELECT is_completed FROM tasks WHERE id = ?1", params![id], |row| {
                row.get(0)
            })?)
    }

    /// Delete a task. Deleting the active task leaves no task active.
    pub fn delete_task(&self, id: &str) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    fn require_task(&self, id: &str) -> Result<()> {
        if self.task(id)?.is_none() {
            return Err(not_found(id));
        }
        Ok(())
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        estimated_pomodoros: row.get(2)?,
        completed_pomodoros: row.get(3)?,
        is_completed: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn not_found(id: &str) -> crate::error::CoreError {
    DatabaseError::NotFound {
        kind: "task",
        id: id.to_string(),
    }
    .into()
}

impl HistorySink for Database {
    fn append(&mut self, entry: &HistoryEntry) -> Result<()> {
        self.record_history(entry).map(|_| ())
    }
}

impl TaskPort for Database {
    fn active_task(&self) -> Result<Option<ActiveTask>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, title FROM tasks WHERE is_active = 1 LIMIT 1",
                [],
                |row| {
                    Ok(ActiveTask {
                        id: row.get(0)?,
                        title: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn increment_completed_sessions(&mut self, task_id: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE tasks SET completed_pomodoros = completed_pomodoros + 1 WHERE id = ?1",
            params![task_id],
        )?;
        if updated == 0 {
            return Err(not_found(task_id));
        }
        Ok(())
    }
}
