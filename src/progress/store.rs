//! Lesson progress records.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::storage::{Database, StoreError};

/// Progress for one user on one lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: i64,
    pub username: String,
    pub course_id: String,
    pub lesson_id: String,
    /// Opaque payload owned by the caller; stored as JSON.
    pub payload: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

type ProgressRow = (i64, String, String, String, Option<String>, String);

fn read_progress_row(row: &Row<'_>) -> rusqlite::Result<ProgressRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_progress(row: ProgressRow) -> Result<ProgressRecord, StoreError> {
    let (id, username, course_id, lesson_id, payload, updated_at) = row;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| StoreError::Decode(format!("updated_at for progress {id}: {e}")))?
        .with_timezone(&Utc);
    let payload = payload
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| StoreError::Decode(format!("payload for progress {id}: {e}")))?;
    Ok(ProgressRecord {
        id,
        username,
        course_id,
        lesson_id,
        payload,
        updated_at,
    })
}

/// Progress store.
///
/// The unique `(username, course_id, lesson_id)` index keeps one row per
/// lesson per user; recording again replaces that row's payload.
#[derive(Clone)]
pub struct ProgressStore {
    db: Database,
}

impl ProgressStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record progress for a lesson, replacing any earlier record for the
    /// same `(username, course_id, lesson_id)` triple.
    pub async fn record(
        &self,
        username: &str,
        course_id: &str,
        lesson_id: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<ProgressRecord, StoreError> {
        let updated_at = Utc::now();
        let encoded = payload.as_ref().map(|v| v.to_string());
        self.db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO progress (username, course_id, lesson_id, payload, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(username, course_id, lesson_id)
                     DO UPDATE SET payload = ?4, updated_at = ?5",
                    params![username, course_id, lesson_id, encoded, updated_at.to_rfc3339()],
                )
                .map(|_| ())
            })
            .map_err(StoreError::Write)?;

        self.get(username, course_id, lesson_id).await?.ok_or_else(|| {
            StoreError::Decode(format!(
                "progress row for {username}/{course_id}/{lesson_id} vanished after upsert"
            ))
        })
    }

    /// Fetch the progress record for one lesson, if any.
    pub async fn get(
        &self,
        username: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Option<ProgressRecord>, StoreError> {
        let raw = self
            .db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT id, username, course_id, lesson_id, payload, updated_at
                     FROM progress
                     WHERE username = ?1 AND course_id = ?2 AND lesson_id = ?3",
                    params![username, course_id, lesson_id],
                    read_progress_row,
                )
                .optional()
            })
            .map_err(StoreError::Read)?;
        raw.map(decode_progress).transpose()
    }

    /// All progress records for a user, ordered by course then lesson.
    pub async fn for_user(&self, username: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        let rows = self
            .db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, username, course_id, lesson_id, payload, updated_at
                     FROM progress
                     WHERE username = ?1
                     ORDER BY course_id, lesson_id",
                )?;
                let rows = stmt.query_map([username], read_progress_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(StoreError::Read)?;
        rows.into_iter().map(decode_progress).collect()
    }
}
