//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;
use super::{OutcomeLog, SiteDirectory};

const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const SITE_COLUMNS: &str = "id, owner_id, name, url, created_at, updated_at";
const CHECK_COLUMNS: &str =
    "id, site_id, status_code, response_time, is_up, error_message, checked_at";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;

        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // --- Site CRUD ---

    /// Register a new site and return it.
    pub fn add_site(&self, site: &NewSite) -> Result<Site, DbError> {
        let now = Utc::now();
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO sites (owner_id, name, url, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
            params![site.owner_id, site.name.trim(), site.url.trim(), format_db_time(&now)],
        );
        if let Err(e) = inserted {
            return Err(conflict_or(e, "site name already registered for this owner"));
        }

        Ok(Site {
            id: conn.last_insert_rowid(),
            owner_id: site.owner_id,
            name: site.name.trim().to_string(),
            url: site.url.trim().to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Change a site's name and URL. The site must belong to
    /// `site.owner_id`; ownership itself never changes.
    pub fn update_site(&self, id: i64, site: &NewSite) -> Result<Site, DbError> {
        let now = Utc::now();
        {
            let conn = self.conn()?;
            let changed = conn
                .execute(
                    "UPDATE sites SET name = ?1, url = ?2, updated_at = ?3
                     WHERE id = ?4 AND owner_id = ?5",
                    params![
                        site.name.trim(),
                        site.url.trim(),
                        format_db_time(&now),
                        id,
                        site.owner_id
                    ],
                )
                .map_err(|e| conflict_or(e, "site name already registered for this owner"))?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
        }
        self.get_site(id)
    }

    /// Delete a site. Its probe history goes with it.
    pub fn delete_site(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM checks WHERE site_id = ?1", params![id])?;
        let deleted = conn.execute("DELETE FROM sites WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Count stored outcomes for a site.
    pub fn count_outcomes(&self, site_id: i64) -> Result<i64, DbError> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM checks WHERE site_id = ?1",
            params![site_id],
            |r| r.get(0),
        )?)
    }
}

impl SiteDirectory for Store {
    fn list_sites(&self) -> Result<Vec<Site>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {SITE_COLUMNS} FROM sites ORDER BY id"))?;

        let sites = stmt
            .query_map([], site_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(sites)
    }

    fn get_site(&self, id: i64) -> Result<Site, DbError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = ?1"),
            params![id],
            site_from_row,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }
}

impl OutcomeLog for Store {
    fn append_outcome(&self, outcome: &NewOutcome) -> Result<ProbeOutcome, DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO checks (site_id, status_code, response_time, is_up, error_message, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                outcome.site_id,
                outcome.status_code,
                outcome.response_time,
                outcome.is_up,
                outcome.error_message,
                format_db_time(&outcome.checked_at),
            ],
        )?;

        Ok(ProbeOutcome {
            id: conn.last_insert_rowid(),
            site_id: outcome.site_id,
            status_code: outcome.status_code,
            response_time: outcome.response_time,
            is_up: outcome.is_up,
            error_message: outcome.error_message.clone(),
            checked_at: outcome.checked_at,
        })
    }

    fn query_outcomes(
        &self,
        site_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ProbeOutcome>, DbError> {
        let conn = self.conn()?;
        let outcomes = match since {
            Some(since) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CHECK_COLUMNS} FROM checks
                     WHERE site_id = ?1 AND checked_at >= ?2 ORDER BY checked_at ASC, id ASC"
                ))?;
                let rows = stmt
                    .query_map(params![site_id, format_db_time(&since)], outcome_from_row)?
                    .collect::<SqlResult<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CHECK_COLUMNS} FROM checks
                     WHERE site_id = ?1 ORDER BY checked_at ASC, id ASC"
                ))?;
                let rows = stmt
                    .query_map(params![site_id], outcome_from_row)?
                    .collect::<SqlResult<Vec<_>>>()?;
                rows
            }
        };

        Ok(outcomes)
    }

    fn latest_outcome(&self, site_id: i64) -> Result<Option<ProbeOutcome>, DbError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {CHECK_COLUMNS} FROM checks
                     WHERE site_id = ?1 ORDER BY checked_at DESC, id DESC LIMIT 1"
                ),
                params![site_id],
                outcome_from_row,
            )
            .optional()?)
    }

    fn recent_outcomes(&self, site_id: i64, limit: u32) -> Result<Vec<ProbeOutcome>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHECK_COLUMNS} FROM checks
             WHERE site_id = ?1 ORDER BY checked_at DESC, id DESC LIMIT ?2"
        ))?;

        let outcomes = stmt
            .query_map(params![site_id, limit], outcome_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(outcomes)
    }
}

fn site_from_row(row: &Row<'_>) -> SqlResult<Site> {
    Ok(Site {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        created_at: time_column(row, 4)?,
        updated_at: time_column(row, 5)?,
    })
}

fn outcome_from_row(row: &Row<'_>) -> SqlResult<ProbeOutcome> {
    Ok(ProbeOutcome {
        id: row.get(0)?,
        site_id: row.get(1)?,
        status_code: row.get(2)?,
        response_time: row.get(3)?,
        is_up: row.get(4)?,
        error_message: row.get(5)?,
        checked_at: time_column(row, 6)?,
    })
}

fn time_column(row: &Row<'_>, idx: usize) -> SqlResult<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_db_time(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognised timestamp {:?}", raw).into(),
        )
    })
}

fn conflict_or(err: rusqlite::Error, message: &str) -> DbError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => DbError::Conflict(message.to_string()),
        _ => DbError::Sqlite(err),
    }
}

/// Format a timestamp so that text ordering matches time ordering.
fn format_db_time(t: &DateTime<Utc>) -> String {
    t.format(DB_TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [DB_TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
