mod error;
mod schema;

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::DatabaseTarget;
use crate::models::*;

pub use error::{StoreError, StoreResult};

/// Shared handle to the single database connection.
///
/// The handle can exist before the connection does: bootstrap builds the
/// router around a [`Database::disconnected`] handle and installs the
/// connection once it opens. Until then every operation fails with
/// [`StoreError::Unavailable`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl Database {
    pub fn disconnected() -> Self {
        Self {
            conn: Arc::new(Mutex::new(None)),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Self::disconnected();
        db.install(open_file(path.as_ref())?)?;
        Ok(db)
    }

    pub fn open_memory() -> Result<Self> {
        let db = Self::disconnected();
        db.install(Connection::open_in_memory()?)?;
        Ok(db)
    }

    /// Open `target`, bring its schema up to date, and make it the live
    /// connection.
    pub fn connect(&self, target: &DatabaseTarget) -> Result<()> {
        let conn = match target {
            DatabaseTarget::Memory => Connection::open_in_memory()?,
            DatabaseTarget::File(path) => open_file(path)?,
        };
        schema::run_migrations(&conn)?;
        self.install(conn)
    }

    /// Connect on the blocking pool. Failure is logged and leaves the
    /// handle disconnected; the returned flag reports which happened.
    pub fn connect_in_background(&self, target: DatabaseTarget) -> JoinHandle<bool> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || match db.connect(&target) {
            Ok(()) => {
                tracing::info!("Connected to database at {}", target);
                true
            }
            Err(e) => {
                tracing::error!("Failed to connect to database at {}: {:#}", target, e);
                false
            }
        })
    }

    pub fn is_connected(&self) -> bool {
        self.conn.lock().map(|conn| conn.is_some()).unwrap_or(false)
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        let conn = conn
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("database is not connected"))?;
        schema::run_migrations(conn)
    }

    fn install(&self, conn: Connection) -> Result<()> {
        let mut slot = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        *slot = Some(conn);
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let conn = guard.as_ref().ok_or(StoreError::Unavailable)?;
        f(conn)
    }

    // ============================================================
    // Task operations
    // ============================================================

    pub fn create_task(&self, input: NewTask) -> StoreResult<Task> {
        let task = Task {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            completed: input.completed,
            priority: input.priority,
            created_at: now(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, title, description, completed, priority, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                (
                    task.id.to_string(),
                    &task.title,
                    &task.description,
                    task.completed,
                    task.priority.map(|p| p.as_str()),
                    timestamp(&task.created_at),
                ),
            )?;
            Ok(())
        })?;

        Ok(task)
    }

    /// Every task, oldest first.
    pub fn get_all_tasks(&self) -> StoreResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks ORDER BY rowid",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map([], |row| task_from_row(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    pub fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        self.with_conn(|conn| Ok(fetch_task(conn, id)?))
    }

    /// Apply `patch` to a stored task. Echoed `id`/`createdAt` values that
    /// differ from the stored ones fail with [`StoreError::Validation`].
    pub fn update_task(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Option<Task>> {
        self.with_conn(|conn| {
            let Some(existing) = fetch_task(conn, id)? else {
                return Ok(None);
            };
            let unchanged = patch.is_empty();
            let task = patch.apply(existing)?;
            if unchanged {
                return Ok(Some(task));
            }

            conn.execute(
                "UPDATE tasks SET title = ?, description = ?, completed = ?, priority = ?
                 WHERE id = ?",
                (
                    &task.title,
                    &task.description,
                    task.completed,
                    task.priority.map(|p| p.as_str()),
                    task.id.to_string(),
                ),
            )?;
            Ok(Some(task))
        })
    }

    /// Remove a task and return it as it was. Sessions referencing it are
    /// left in place.
    pub fn delete_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        self.with_conn(|conn| {
            let Some(task) = fetch_task(conn, id)? else {
                return Ok(None);
            };
            conn.execute("DELETE FROM tasks WHERE id = ?", [id.to_string()])?;
            Ok(Some(task))
        })
    }

    // ============================================================
    // Session operations
    // ============================================================

    pub fn create_session(&self, input: NewSession) -> StoreResult<Session> {
        let created_at = now();
        let session = Session {
            id: Uuid::new_v4(),
            task_id: input.task_id,
            duration: input.duration,
            completed_at: input.completed_at.unwrap_or(created_at),
            created_at,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, task_id, duration, completed_at, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                (
                    session.id.to_string(),
                    session.task_id.map(|id| id.to_string()),
                    session.duration,
                    timestamp(&session.completed_at),
                    timestamp(&session.created_at),
                ),
            )?;
            Ok(())
        })?;

        Ok(session)
    }

    /// Every session, oldest first, with its task resolved.
    pub fn get_all_sessions(&self) -> StoreResult<Vec<SessionWithTask>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.duration, s.completed_at, s.created_at,
                        t.id, t.title, t.description, t.completed, t.priority, t.created_at
                 FROM sessions s
                 LEFT JOIN tasks t ON t.id = s.task_id
                 ORDER BY s.rowid",
            )?;

            let sessions = stmt
                .query_map([], |row| {
                    let task = match row.get::<_, Option<String>>(4)? {
                        Some(_) => Some(task_from_row(row, 4)?),
                        None => None,
                    };
                    Ok(SessionWithTask {
                        id: uuid_at(row, 0)?,
                        task,
                        duration: row.get(1)?,
                        completed_at: datetime_at(row, 2)?,
                        created_at: datetime_at(row, 3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(sessions)
        })
    }
}

const TASK_COLUMNS: &str = "id, title, description, completed, priority, created_at";

fn open_file(path: &Path) -> Result<Connection> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

fn fetch_task(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Task>> {
    conn.query_row(
        &format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS),
        [id.to_string()],
        |row| task_from_row(row, 0),
    )
    .optional()
}

fn task_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Task> {
    Ok(Task {
        id: uuid_at(row, offset)?,
        title: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        completed: row.get(offset + 3)?,
        priority: row
            .get::<_, Option<String>>(offset + 4)?
            .as_deref()
            .and_then(Priority::from_str),
        created_at: datetime_at(row, offset + 5)?,
    })
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn datetime_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_handle_reports_unavailable() {
        let db = Database::disconnected();
        assert!(!db.is_connected());
        assert!(matches!(db.get_all_tasks(), Err(StoreError::Unavailable)));
        assert!(matches!(
            db.create_session(NewSession {
                task_id: None,
                duration: 25.0,
                completed_at: None,
            }),
            Err(StoreError::Unavailable)
        ));
    }

    #[test]
    fn migrate_requires_a_connection() {
        assert!(Database::disconnected().migrate().is_err());
    }

    #[test]
    fn timestamps_survive_a_round_trip() {
        let ts = now();
        let parsed = DateTime::parse_from_rfc3339(&timestamp(&ts))
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parsed, ts);
    }
}
