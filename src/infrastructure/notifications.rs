use crate::domain::models::TaskId;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Boundary to the platform notification scheduler. One pending reminder per
/// task; rescheduling replaces any earlier one.
pub trait NotificationScheduler: Send + Sync {
    fn reschedule(
        &self,
        task_id: TaskId,
        title: &str,
        description: Option<&str>,
        reward: i64,
        at: DateTime<Utc>,
    ) -> Result<(), InfraError>;

    fn cancel(&self, task_id: TaskId) -> Result<(), InfraError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNotification {
    pub title: String,
    pub description: Option<String>,
    pub reward: i64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemoryNotificationScheduler {
    pending: Mutex<HashMap<TaskId, ScheduledNotification>>,
}

impl InMemoryNotificationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_for(&self, task_id: TaskId) -> Option<ScheduledNotification> {
        self.pending
            .lock()
            .expect("notification lock poisoned")
            .get(&task_id)
            .cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("notification lock poisoned").len()
    }
}

impl NotificationScheduler for InMemoryNotificationScheduler {
    fn reschedule(
        &self,
        task_id: TaskId,
        title: &str,
        description: Option<&str>,
        reward: i64,
        at: DateTime<Utc>,
    ) -> Result<(), InfraError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("notification lock poisoned: {error}")))?;
        pending.insert(
            task_id,
            ScheduledNotification {
                title: title.to_string(),
                description: description.map(ToOwned::to_owned),
                reward,
                at,
            },
        );
        Ok(())
    }

    fn cancel(&self, task_id: TaskId) -> Result<(), InfraError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("notification lock poisoned: {error}")))?;
        pending.remove(&task_id);
        Ok(())
    }
}

/// Scheduler used by the headless daemon: records intent in the log only.
#[derive(Debug, Default, Clone)]
pub struct TracingNotificationScheduler;

impl NotificationScheduler for TracingNotificationScheduler {
    fn reschedule(
        &self,
        task_id: TaskId,
        title: &str,
        _description: Option<&str>,
        reward: i64,
        at: DateTime<Utc>,
    ) -> Result<(), InfraError> {
        tracing::info!(task_id, title, reward, at = %at.to_rfc3339(), "notification rescheduled");
        Ok(())
    }

    fn cancel(&self, task_id: TaskId) -> Result<(), InfraError> {
        tracing::info!(task_id, "notification cancelled");
        Ok(())
    }
}
