pub mod connection;
pub mod error;
pub mod migrations;
pub mod repositories;
pub mod seed;

pub use connection::{Database, DbConnection, DbPool};
pub use error::{DbError, DbResult};
pub use migrations::{Migration, Migrator, MIGRATIONS};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

/// Timestamps are stored with a fixed fractional width so that text ordering
/// matches chronological ordering.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let value: String = row.get(idx)?;
    Uuid::parse_str(&value).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn optional_uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let value: Option<String> = row.get(idx)?;
    value
        .map(|v| Uuid::parse_str(&v).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    value
        .parse::<DateTime<Utc>>()
        .map_err(|e| conversion_error(idx, e))
}

#[derive(Debug, thiserror::Error)]
#[error("unexpected value '{0}'")]
pub(crate) struct UnexpectedValue(String);

/// Read a text column through one of the `parse` helpers on the shared enums
pub(crate) fn enum_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let value: String = row.get(idx)?;
    parse(&value).ok_or_else(|| conversion_error(idx, UnexpectedValue(value)))
}

pub(crate) fn optional_enum_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<Option<T>> {
    let value: Option<String> = row.get(idx)?;
    value
        .map(|v| parse(&v).ok_or_else(|| conversion_error(idx, UnexpectedValue(v))))
        .transpose()
}
