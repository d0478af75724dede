use crate::infrastructure::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn initialize_database(path: &Path) -> Result<(), AppError> {
    let connection = Database::new(path).connect()?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn connect(&self) -> Result<Connection, AppError> {
        let connection = Connection::open(&self.path)?;
        connection.busy_timeout(BUSY_TIMEOUT)?;
        connection.pragma_update(None, "foreign_keys", "ON")?;
        Ok(connection)
    }
}

pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub(crate) fn format_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn conversion_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

pub(crate) fn timestamp_column(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| conversion_error(index, format!("invalid timestamp '{raw}': {error}")))
}

pub(crate) fn optional_timestamp_column(
    row: &Row<'_>,
    index: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(index)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|error| conversion_error(index, format!("invalid timestamp '{raw}': {error}")))
    })
    .transpose()
}

pub(crate) fn date_column(row: &Row<'_>, index: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(index)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|error| conversion_error(index, format!("invalid date '{raw}': {error}")))
}

pub(crate) fn optional_date_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(index)?;
    raw.map(|raw| {
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|error| conversion_error(index, format!("invalid date '{raw}': {error}")))
    })
    .transpose()
}

pub(crate) fn enum_column<T>(
    row: &Row<'_>,
    index: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(index)?;
    parse(&raw).ok_or_else(|| conversion_error(index, format!("unknown value '{raw}'")))
}

pub(crate) fn optional_enum_column<T>(
    row: &Row<'_>,
    index: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(index)?;
    raw.map(|raw| parse(&raw).ok_or_else(|| conversion_error(index, format!("unknown value '{raw}'"))))
        .transpose()
}
