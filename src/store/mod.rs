use crate::error::{NotesError, Result};
use crate::types::{Flashcard, NotesPayload};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::task;

/// A persisted notes row
#[derive(Debug, Clone, Serialize)]
pub struct StoredNotes {
    pub id: i64,
    pub file_key: String,
    pub summary: String,
    pub flashcards: Vec<Flashcard>,
    pub quizzes: Vec<serde_json::Value>,
    pub full_text: String,
    pub created_at: String,
}

/// Durable store for computed notes.
///
/// Insert-only: every successful processing attempt inserts a new row, and
/// duplicate rows for the same file key across repeated attempts are
/// accepted. Reads return the most recent row for a key.
#[async_trait]
pub trait NotesStore: Send + Sync {
    async fn insert(&self, file_key: &str, payload: &NotesPayload) -> Result<i64>;

    async fn get(&self, file_key: &str) -> Result<Option<StoredNotes>>;
}

/// SQLite-backed notes store
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    /// Open a connection with the usual pragmas (WAL for concurrency,
    /// NORMAL sync for speed)
    fn open_connection(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path).map_err(NotesError::Persistence)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(conn)
    }

    /// Create the schema if it does not exist
    pub async fn init(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS notes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    file_key TEXT NOT NULL,
                    summary TEXT NOT NULL,
                    flashcards TEXT NOT NULL,
                    quizzes TEXT NOT NULL,
                    full_text TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_notes_file_key ON notes(file_key);",
            )?;
            Ok(())
        })
        .await
    }

    /// Execute a closure with a database connection in a blocking task
    async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Self::open_connection(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| NotesError::Config(format!("Blocking task failed: {}", e)))?
    }
}

#[async_trait]
impl NotesStore for SqliteStore {
    async fn insert(&self, file_key: &str, payload: &NotesPayload) -> Result<i64> {
        let file_key = file_key.to_string();
        let summary = payload.summary.clone();
        let flashcards = serde_json::to_string(&payload.flashcards)
            .map_err(|e| NotesError::Config(format!("Failed to serialize flashcards: {}", e)))?;
        let quizzes = serde_json::to_string(&payload.quizzes)
            .map_err(|e| NotesError::Config(format!("Failed to serialize quizzes: {}", e)))?;
        let full_text = payload.full_text.clone();
        let created_at = Utc::now().to_rfc3339();

        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO notes (file_key, summary, flashcards, quizzes, full_text, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![file_key, summary, flashcards, quizzes, full_text, created_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get(&self, file_key: &str) -> Result<Option<StoredNotes>> {
        let file_key = file_key.to_string();

        self.with_connection(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, file_key, summary, flashcards, quizzes, full_text, created_at \
                     FROM notes WHERE file_key = ?1 ORDER BY id DESC LIMIT 1",
                    params![file_key],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                        ))
                    },
                )
                .optional()?;

            Ok(row.map(
                |(id, file_key, summary, flashcards, quizzes, full_text, created_at)| {
                    StoredNotes {
                        id,
                        file_key,
                        summary,
                        // Lenient read: a corrupt column degrades to empty, not an error
                        flashcards: serde_json::from_str(&flashcards).unwrap_or_default(),
                        quizzes: serde_json::from_str(&quizzes).unwrap_or_default(),
                        full_text,
                        created_at,
                    }
                },
            ))
        })
        .await
    }
}
