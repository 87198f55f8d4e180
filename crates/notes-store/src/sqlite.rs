// ABOUTME: SQLite-backed note gateway: schema creation, upsert, list, and lookup by id.
// ABOUTME: Opens a fresh connection per operation against the file named by the DbHandle.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use notes_core::{DbHandle, Note, NoteGateway, NotePayload};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// Fixed-width UTC format; matches what `strftime('%Y-%m-%dT%H:%M:%fZ')`
/// produces so column defaults and explicit writes sort together.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Time a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS notes (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TIMESTAMP DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);";

const NOTE_COLUMNS: &str = "id, content, created_at, updated_at";

/// Errors that can occur during SQLite gateway operations.
#[derive(Debug, Error)]
pub enum SqliteGatewayError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid timestamp in notes table: {0}")]
    Timestamp(String),
}

/// A note gateway over a single SQLite file. Holds only the path; every
/// operation opens its own connection.
#[derive(Debug, Clone)]
pub struct SqliteGateway {
    path: PathBuf,
}

impl SqliteGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(location: &str) -> Result<Connection, SqliteGatewayError> {
        let conn = Connection::open(location)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

impl NoteGateway for SqliteGateway {
    type Error = SqliteGatewayError;

    fn load(&self) -> Result<DbHandle, Self::Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let location = self.path.to_string_lossy().into_owned();
        let conn = Self::connect(&location)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!("notes database ready at {}", location);
        Ok(DbHandle::new(location))
    }

    fn upsert_note(&self, db: &DbHandle, payload: &NotePayload) -> Result<Note, Self::Error> {
        let conn = Self::connect(&db.location)?;
        let now = format_timestamp(&Utc::now());

        // updated_at never moves backwards, even if the clock does. julianday()
        // compares across the RFC 3339 and CURRENT_TIMESTAMP text forms.
        let row = conn.query_row(
            &format!(
                "INSERT INTO notes (id, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    content = excluded.content,
                    updated_at = CASE
                        WHEN julianday(notes.updated_at) > julianday(excluded.updated_at)
                        THEN notes.updated_at
                        ELSE excluded.updated_at
                    END
                 RETURNING {NOTE_COLUMNS}"
            ),
            params![payload.id, payload.content, now],
            NoteRow::from_row,
        )?;

        row.into_note()
    }

    fn list_notes(&self, db: &DbHandle) -> Result<Vec<Note>, Self::Error> {
        let conn = Self::connect(&db.location)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             ORDER BY julianday(updated_at) DESC, julianday(created_at) DESC, id ASC"
        ))?;

        let rows = stmt.query_map([], NoteRow::from_row)?;

        let mut notes = Vec::new();
        for row in rows {
            notes.push(row?.into_note()?);
        }
        Ok(notes)
    }

    fn get_note(&self, db: &DbHandle, id: &str) -> Result<Option<Note>, Self::Error> {
        let conn = Self::connect(&db.location)?;
        let row = conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
                params![id],
                NoteRow::from_row,
            )
            .optional()?;

        row.map(NoteRow::into_note).transpose()
    }
}

/// A raw row from the notes table, before timestamp parsing.
struct NoteRow {
    id: String,
    content: String,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl NoteRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    fn into_note(self) -> Result<Note, SqliteGatewayError> {
        let created_at = parse_timestamp(self.created_at.as_deref())?;
        let updated_at = parse_timestamp(self.updated_at.as_deref())?;
        Ok(Note {
            id: self.id,
            content: self.content,
            created_at,
            updated_at,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Accepts RFC 3339 and SQLite's `CURRENT_TIMESTAMP` form, for rows written
/// by other tools.
fn parse_timestamp(value: Option<&str>) -> Result<DateTime<Utc>, SqliteGatewayError> {
    let Some(value) = value else {
        return Err(SqliteGatewayError::Timestamp("NULL".to_string()));
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| SqliteGatewayError::Timestamp(value.to_string()))
}
