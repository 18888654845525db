//! store.rs — append-only feedback storage.
//!
//! Two backends share the `FeedbackStore` trait: an in-memory vector for tests and
//! ephemeral runs, and SQLite for anything that should survive a restart.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// One stored unit of user-submitted feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub source: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    /// `created_at` as stored on disk and shown in prompts.
    pub fn created_at_iso(&self) -> String {
        iso8601(&self.created_at)
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix, e.g. `2025-01-02T03:04:05.678Z`.
/// Fixed width, so lexical order matches chronological order.
pub fn iso8601(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait::async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Append one record. No ordering guarantee across concurrent inserts.
    async fn insert(&self, source: &str, content: &str, created_at: DateTime<Utc>) -> Result<()>;

    /// Up to `limit` records, newest first. Ties on `created_at` go to the later insert.
    async fn query_recent(&self, limit: usize) -> Result<Vec<FeedbackRecord>>;

    fn backend_name(&self) -> &'static str;
}

pub type DynFeedbackStore = Arc<dyn FeedbackStore>;

// ------------------------------------------------------------
// In-memory backend
// ------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Vec<FeedbackRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl FeedbackStore for MemoryStore {
    async fn insert(&self, source: &str, content: &str, created_at: DateTime<Utc>) -> Result<()> {
        let mut v = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory store mutex poisoned"))?;
        v.push(FeedbackRecord {
            source: source.to_string(),
            content: content.to_string(),
            created_at,
        });
        Ok(())
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<FeedbackRecord>> {
        let v = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory store mutex poisoned"))?;
        // Walk newest insert first; the stable sort then keeps that order within ties.
        let mut rows: Vec<FeedbackRecord> = v.iter().rev().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ------------------------------------------------------------
// SQLite backend
// ------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS feedback (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    source     TEXT NOT NULL,
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_feedback_created_at ON feedback (created_at);
";

/// SQLite-backed store. The connection is shared behind a mutex and every statement runs on
/// the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at `path`, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating store directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite store at {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory sqlite store")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("initializing feedback schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow!("sqlite connection mutex poisoned"))?;
            f(&*guard)
        })
        .await
        .context("sqlite task panicked")?
    }
}

#[async_trait::async_trait]
impl FeedbackStore for SqliteStore {
    async fn insert(&self, source: &str, content: &str, created_at: DateTime<Utc>) -> Result<()> {
        let source = source.to_string();
        let content = content.to_string();
        let ts = iso8601(&created_at);
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO feedback (source, content, created_at) VALUES (?1, ?2, ?3)",
                params![source, content, ts],
            )
            .context("inserting feedback row")?;
            Ok(())
        })
        .await
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<FeedbackRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT source, content, created_at FROM feedback
                 ORDER BY created_at DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (source, content, ts) = row?;
                let created_at = DateTime::parse_from_rfc3339(&ts)
                    .with_context(|| format!("bad created_at in store: {ts}"))?
                    .with_timezone(&Utc);
                out.push(FeedbackRecord {
                    source,
                    content,
                    created_at,
                });
            }
            Ok(out)
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
