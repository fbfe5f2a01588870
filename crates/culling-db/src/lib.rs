//! SQLite persistence layer for Photocull image records.
//!
//! One durable `images` table keyed by a monotonic autoincrement id. The
//! analysis scalars are denormalized into columns for query convenience;
//! the full analysis result rides along as an opaque serialized blob that
//! callers deserialize themselves.
//!
//! Ids are assigned by the store, never reused, and immutable once
//! handed out. After insertion only `rating` and `label` may change.
//! Writers are serialized through a single connection behind a mutex so
//! id assignment stays strictly monotonic under concurrent ingestion.
//!
//! Uses WAL mode for concurrent read/write without blocking callers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default label for freshly ingested images.
pub const DEFAULT_LABEL: &str = "none";

/// A persisted image record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: i64,
    /// Storage-unique name assigned at upload time.
    pub filename: String,
    /// User-supplied name; not unique.
    pub original_filename: String,
    pub filepath: String,
    pub thumbnail_path: String,
    pub upload_timestamp: DateTime<Utc>,
    pub rating: i32,
    pub label: String,

    // Denormalized analysis scalars
    pub focus_score: f64,
    pub exposure_score: f64,
    pub quality_score: f64,
    pub face_count: i64,
    pub eyes_open: bool,
    pub perceptual_hash: String,

    /// Serialized analysis blob, opaque to the store.
    pub analysis_data: String,
}

/// Fields supplied by the ingestion pipeline when creating a record.
/// `rating` and `label` fall back to 0 / "none" when unset.
#[derive(Debug, Clone)]
pub struct NewImage<'a> {
    pub filename: &'a str,
    pub original_filename: &'a str,
    pub filepath: &'a str,
    pub thumbnail_path: &'a str,
    pub rating: Option<i32>,
    pub label: Option<&'a str>,
    pub focus_score: f64,
    pub exposure_score: f64,
    pub quality_score: f64,
    pub face_count: i64,
    pub eyes_open: bool,
    pub perceptual_hash: &'a str,
    pub analysis_data: &'a str,
}

/// Durable image store handle.
pub struct ImageStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl ImageStore {
    /// Open or create the store at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        };
        store.create_tables()?;
        Ok(store)
    }

    /// Get the database file path.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                filepath TEXT NOT NULL,
                thumbnail_path TEXT NOT NULL,
                upload_timestamp TEXT NOT NULL,
                rating INTEGER NOT NULL DEFAULT 0,
                label TEXT NOT NULL DEFAULT 'none',
                focus_score REAL NOT NULL,
                exposure_score REAL NOT NULL,
                quality_score REAL NOT NULL,
                face_count INTEGER NOT NULL,
                eyes_open INTEGER NOT NULL,
                perceptual_hash TEXT NOT NULL,
                analysis_data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_images_uploaded ON images(upload_timestamp);
            CREATE INDEX IF NOT EXISTS idx_images_rating ON images(rating);
            CREATE INDEX IF NOT EXISTS idx_images_label ON images(label);
            ",
        )?;
        Ok(())
    }

    /// Insert a new image record and return its assigned id.
    ///
    /// Durable on return: the row is committed before the id is handed
    /// back. Ids increase monotonically across concurrent inserts.
    pub fn insert(&self, img: &NewImage) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO images (
                filename, original_filename, filepath, thumbnail_path,
                upload_timestamp, rating, label,
                focus_score, exposure_score, quality_score,
                face_count, eyes_open, perceptual_hash, analysis_data
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?12, ?13, ?14
            )",
            params![
                img.filename,
                img.original_filename,
                img.filepath,
                img.thumbnail_path,
                Utc::now(),
                img.rating.unwrap_or(0),
                img.label.unwrap_or(DEFAULT_LABEL),
                img.focus_score,
                img.exposure_score,
                img.quality_score,
                img.face_count,
                img.eyes_open as i32,
                img.perceptual_hash,
                img.analysis_data,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, filename = img.filename, "image record inserted");
        Ok(id)
    }

    /// Load every record, newest upload first.
    pub fn list_all(&self) -> Result<Vec<ImageRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT
                id, filename, original_filename, filepath, thumbnail_path,
                upload_timestamp, rating, label,
                focus_score, exposure_score, quality_score,
                face_count, eyes_open, perceptual_hash, analysis_data
            FROM images ORDER BY upload_timestamp DESC, id DESC",
        )?;

        let rows = stmt.query_map([], row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| e.into())
    }

    /// Look up a single record by id.
    pub fn get(&self, id: i64) -> Result<Option<ImageRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT
                    id, filename, original_filename, filepath, thumbnail_path,
                    upload_timestamp, rating, label,
                    focus_score, exposure_score, quality_score,
                    face_count, eyes_open, perceptual_hash, analysis_data
                FROM images WHERE id = ?1",
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Update the rating for an image; when a label is supplied, both are
    /// updated in the same statement. A nonexistent id is a silent no-op.
    pub fn update_rating(&self, id: i64, rating: i32, label: Option<&str>) -> Result<()> {
        let conn = self.conn.lock();
        let changed = match label {
            Some(label) => conn.execute(
                "UPDATE images SET rating = ?1, label = ?2 WHERE id = ?3",
                params![rating, label, id],
            )?,
            None => conn.execute(
                "UPDATE images SET rating = ?1 WHERE id = ?2",
                params![rating, id],
            )?,
        };
        debug!(id, rating, rows = changed, "rating updated");
        Ok(())
    }

    /// Original filenames for a set of ids (backs CSV export).
    pub fn original_filenames(&self, ids: &[i64]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT original_filename FROM images WHERE id IN ({placeholders}) ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| e.into())
    }

    /// Number of persisted records.
    pub fn image_count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        original_filename: row.get(2)?,
        filepath: row.get(3)?,
        thumbnail_path: row.get(4)?,
        upload_timestamp: row.get(5)?,
        rating: row.get(6)?,
        label: row.get(7)?,
        focus_score: row.get(8)?,
        exposure_score: row.get(9)?,
        quality_score: row.get(10)?,
        face_count: row.get(11)?,
        eyes_open: row.get::<_, i32>(12)? != 0,
        perceptual_hash: row.get(13)?,
        analysis_data: row.get(14)?,
    })
}
