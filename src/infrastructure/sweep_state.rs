use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::parse_optional_datetime_utc;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persistent sweep bookkeeping: the last completed checkpoint and the
/// in-progress flag the surrounding scheduler consults before starting a new
/// sweep.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SweepState {
    pub last_check: Option<DateTime<Utc>>,
    pub in_progress: bool,
}

pub trait SweepStateRepository: Send + Sync {
    fn load(&self) -> Result<Option<SweepState>, InfraError>;
    fn save_checkpoint(&self, last_check: DateTime<Utc>) -> Result<(), InfraError>;
    fn set_in_progress(&self, in_progress: bool) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSweepStateRepository {
    db_path: PathBuf,
}

impl SqliteSweepStateRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl SweepStateRepository for SqliteSweepStateRepository {
    fn load(&self) -> Result<Option<SweepState>, InfraError> {
        let connection = self.connect()?;
        let row: Option<(Option<String>, i64)> = connection
            .query_row(
                "SELECT last_check, in_progress FROM sweep_state WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((last_check_raw, in_progress)) = row else {
            return Ok(None);
        };

        Ok(Some(SweepState {
            last_check: parse_optional_datetime_utc(last_check_raw, "sweep_state.last_check")?,
            in_progress: in_progress != 0,
        }))
    }

    fn save_checkpoint(&self, last_check: DateTime<Utc>) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO sweep_state (id, last_check, in_progress)
             VALUES (1, ?1, 0)
             ON CONFLICT(id) DO UPDATE SET last_check = excluded.last_check",
            params![last_check.to_rfc3339()],
        )?;
        Ok(())
    }

    fn set_in_progress(&self, in_progress: bool) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO sweep_state (id, last_check, in_progress)
             VALUES (1, NULL, ?1)
             ON CONFLICT(id) DO UPDATE SET in_progress = excluded.in_progress",
            params![in_progress as i64],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySweepStateRepository {
    state: Mutex<Option<SweepState>>,
}

impl SweepStateRepository for InMemorySweepStateRepository {
    fn load(&self) -> Result<Option<SweepState>, InfraError> {
        let state = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("sweep state lock poisoned: {error}")))?;
        Ok(state.clone())
    }

    fn save_checkpoint(&self, last_check: DateTime<Utc>) -> Result<(), InfraError> {
        let mut state = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("sweep state lock poisoned: {error}")))?;
        let mut next = state.clone().unwrap_or_default();
        next.last_check = Some(last_check);
        *state = Some(next);
        Ok(())
    }

    fn set_in_progress(&self, in_progress: bool) -> Result<(), InfraError> {
        let mut state = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("sweep state lock poisoned: {error}")))?;
        let mut next = state.clone().unwrap_or_default();
        next.in_progress = in_progress;
        *state = Some(next);
        Ok(())
    }
}
