use crate::errors::{AppError, AppResult};
use crate::gateway::SnapshotGateway;
use crate::models::{AppSettings, Link, Snapshot, SnapshotPayload, SnapshotReceipt};
use crate::stability::StabilityScore;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// SQLite-backed snapshot store plus the settings row.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn snapshot_count(&self) -> AppResult<i64> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(1) FROM snapshots", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn latest_snapshot(&self) -> AppResult<Option<Snapshot>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT captured_at, stability_score, links_json
                 FROM snapshots
                 ORDER BY captured_at DESC, rowid DESC
                 LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((captured_at, stability_score, links_json)) = row else {
            return Ok(None);
        };
        let links: Vec<Link> = serde_json::from_str(&links_json)?;
        Ok(Some(Snapshot {
            captured_at: parse_ts(&captured_at)?,
            stability_score: StabilityScore::new(stability_score),
            links,
        }))
    }

    pub fn insert_snapshot(&self, payload: &SnapshotPayload) -> AppResult<SnapshotReceipt> {
        let links_json = serde_json::to_string(&payload.links)?;
        let conn = self.lock()?;

        let last: Option<String> = conn
            .query_row("SELECT MAX(captured_at) FROM snapshots", [], |row| row.get(0))
            .optional()?
            .flatten();
        let mut captured_at = Utc::now();
        if let Some(last) = last.as_deref().map(parse_ts).transpose()? {
            if captured_at <= last {
                captured_at = last + chrono::Duration::microseconds(1);
            }
        }

        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO snapshots (id, captured_at, stability_score, links_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                format_ts(captured_at),
                i64::from(payload.stability_score.value()),
                links_json,
            ],
        )?;

        Ok(SnapshotReceipt { id, captured_at })
    }

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'app'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<AppSettings>(&raw).unwrap_or_default()),
            None => Ok(AppSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: AppSettings = serde_json::from_value(merged)
            .map_err(|err| AppError::ValidationRejected(format!("invalid settings: {err}")))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('app', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;

        Ok(settings)
    }

    /// Parses a JSON object from user input and merges it into the settings.
    /// Malformed input is a validation rejection, not an internal failure.
    pub fn update_settings_from_str(&self, raw: &str) -> AppResult<AppSettings> {
        let update: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| AppError::ValidationRejected(format!("settings must be a JSON object: {err}")))?;
        if !update.is_object() {
            return Err(AppError::ValidationRejected("settings must be a JSON object".to_string()));
        }
        self.update_settings(update)
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }
}

#[async_trait]
impl SnapshotGateway for Database {
    async fn load_latest_snapshot(&self) -> AppResult<Option<Snapshot>> {
        self.latest_snapshot()
    }

    async fn append_snapshot(&self, payload: &SnapshotPayload) -> AppResult<SnapshotReceipt> {
        self.insert_snapshot(payload)
    }
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target), serde_json::Value::Object(update)) => {
            for (key, value) in update {
                merge_json(target.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => *target = update,
    }
}

// Fixed-width UTC timestamps keep `ORDER BY captured_at` chronological.
fn format_ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| AppError::Internal(format!("invalid timestamp '{value}': {err}")))
}
