pub mod bootstrap;
pub mod conflicts;
pub mod expiry_sweep;
pub mod free_slots;
pub mod sync_engine;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::models::{LinkId, TaskId};
use crate::infrastructure::error::InfraError;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Errors the application services surface to their callers. Gateway-level
/// failures are absorbed internally (logged, degraded per operation) and
/// never appear here.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("calendar link {0} not found")]
    LinkNotFound(LinkId),
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    #[error(transparent)]
    Infra(#[from] InfraError),
}
