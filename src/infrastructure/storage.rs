use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

pub(crate) fn parse_datetime_utc(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::InvalidConfig(format!("invalid {field_name} '{value}': {error}"))
        })
}

pub(crate) fn parse_optional_datetime_utc(
    value: Option<String>,
    field_name: &str,
) -> Result<Option<DateTime<Utc>>, InfraError> {
    value
        .map(|raw| parse_datetime_utc(&raw, field_name))
        .transpose()
}
