//! Row encoding helpers and the savepoint wrapper used by multi-statement writes

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;

use crate::error::Result;

/// Runs `body` atomically: released on success, rolled back on error.
///
/// Outside a transaction this opens `BEGIN IMMEDIATE`, so the write lock is
/// taken before `body` reads anything and a second handle waits on
/// `busy_timeout` instead of failing on a read-to-write upgrade. Inside one it
/// nests as a named SAVEPOINT.
pub fn with_savepoint<T, F>(conn: &Connection, name: &str, body: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let outermost = conn.is_autocommit();
    let (begin, commit, rollback) = if outermost {
        (
            "BEGIN IMMEDIATE".to_string(),
            "COMMIT".to_string(),
            "ROLLBACK".to_string(),
        )
    } else {
        (
            format!("SAVEPOINT {name}"),
            format!("RELEASE SAVEPOINT {name}"),
            format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"),
        )
    };

    conn.execute_batch(&begin)?;

    match body(conn) {
        Ok(value) => {
            if let Err(e) = conn.execute_batch(&commit) {
                if outermost && !conn.is_autocommit() {
                    let _ = conn.execute_batch("ROLLBACK");
                }
                return Err(e.into());
            }
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute_batch(&rollback) {
                tracing::error!("Rollback of {} failed: {}", name, rollback_err);
            }
            Err(e)
        }
    }
}

/// Fixed-width RFC 3339 in UTC (`2026-01-02T03:04:05.678901Z`)
pub fn encode_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn encode_opt_time(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.as_ref().map(encode_time)
}

pub fn parse_time_column(s: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

pub fn parse_opt_time_column(
    s: Option<String>,
    column: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|raw| parse_time_column(raw, column)).transpose()
}

/// Ports are stored comma-joined, e.g. `22,80,443`
pub fn encode_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn parse_ports(raw: &str) -> Vec<u16> {
    raw.split(',')
        .filter(|p| !p.is_empty())
        .filter_map(|p| p.trim().parse::<u16>().ok())
        .collect()
}

/// String lists are stored as JSON arrays
pub fn encode_list(items: &[String]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

pub fn parse_list_column(raw: String, column: usize) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

/// Parses a text column into any `FromStr` enum, surfacing bad values as conversion errors
pub fn parse_enum_column<T>(raw: String, column: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}
