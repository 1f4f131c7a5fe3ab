use crate::domain::models::{
    RecurrenceKind, RecurrenceRule, RecurrenceTrigger, ScheduledTask, TaskId,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::parse_optional_datetime_utc;
use chrono::{NaiveTime, Weekday};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

pub trait TaskStore: Send + Sync {
    fn get(&self, id: TaskId) -> Result<Option<ScheduledTask>, InfraError>;
    fn insert(&self, task: &ScheduledTask) -> Result<TaskId, InfraError>;
    fn update(&self, task: &ScheduledTask) -> Result<(), InfraError>;
    fn subtasks(&self, parent_id: TaskId) -> Result<Vec<ScheduledTask>, InfraError>;
    fn incomplete_subtask_count(&self, parent_id: TaskId) -> Result<i64, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    db_path: PathBuf,
}

impl SqliteTaskStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

const TASK_COLUMNS: &str = "id, title, description, completed, completed_at, due_at, \
     estimated_minutes, category_id, percentage, parent_id, auto_complete_parent, \
     recur_kind, recur_interval_minutes, recur_weekdays, recur_time_of_day, recur_trigger, \
     calendar_event_id";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<(ScheduledTask, Option<RawRecurrence>)> {
    let recurrence = match row.get::<_, Option<String>>(11)? {
        Some(kind) => Some(RawRecurrence {
            kind,
            interval_minutes: row.get::<_, Option<i64>>(12)?.unwrap_or(0),
            weekdays: row.get::<_, Option<String>>(13)?,
            time_of_day: row.get::<_, Option<String>>(14)?,
            trigger: row.get::<_, Option<String>>(15)?.unwrap_or_default(),
        }),
        None => None,
    };
    let task = ScheduledTask {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        completed: row.get::<_, i64>(3)? != 0,
        completed_at: None,
        due_at: None,
        estimated_minutes: row.get(6)?,
        category_id: row.get(7)?,
        percentage: row.get::<_, i64>(8)? as u8,
        parent_id: row.get(9)?,
        auto_complete_parent: row.get::<_, i64>(10)? != 0,
        recurrence: None,
        calendar_event_id: row
            .get::<_, Option<String>>(16)?
            .filter(|value| !value.trim().is_empty() && value.trim() != "0"),
    };
    Ok((task, recurrence))
}

struct RawRecurrence {
    kind: String,
    interval_minutes: i64,
    weekdays: Option<String>,
    time_of_day: Option<String>,
    trigger: String,
}

fn finish_task(
    row_values: (ScheduledTask, Option<RawRecurrence>),
    completed_at: Option<String>,
    due_at: Option<String>,
) -> Result<ScheduledTask, InfraError> {
    let (mut task, raw_recurrence) = row_values;
    task.completed_at = parse_optional_datetime_utc(completed_at, "tasks.completed_at")?;
    task.due_at = parse_optional_datetime_utc(due_at, "tasks.due_at")?;
    task.recurrence = raw_recurrence.map(recurrence_from_raw).transpose()?;
    Ok(task)
}

fn recurrence_from_raw(raw: RawRecurrence) -> Result<RecurrenceRule, InfraError> {
    let kind = RecurrenceKind::parse(&raw.kind).map_err(InfraError::InvalidConfig)?;
    let trigger = RecurrenceTrigger::parse(&raw.trigger).map_err(InfraError::InvalidConfig)?;
    let weekdays = raw
        .weekdays
        .as_deref()
        .map(parse_weekdays)
        .transpose()?
        .unwrap_or_default();
    let time_of_day = raw
        .time_of_day
        .as_deref()
        .map(|value| {
            NaiveTime::parse_from_str(value, "%H:%M").map_err(|error| {
                InfraError::InvalidConfig(format!("invalid recur_time_of_day '{value}': {error}"))
            })
        })
        .transpose()?;
    Ok(RecurrenceRule {
        kind,
        interval_minutes: raw.interval_minutes,
        weekdays,
        time_of_day,
        trigger,
    })
}

fn weekday_to_str(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

fn parse_weekdays(value: &str) -> Result<Vec<Weekday>, InfraError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part {
            "mon" => Ok(Weekday::Mon),
            "tue" => Ok(Weekday::Tue),
            "wed" => Ok(Weekday::Wed),
            "thu" => Ok(Weekday::Thu),
            "fri" => Ok(Weekday::Fri),
            "sat" => Ok(Weekday::Sat),
            "sun" => Ok(Weekday::Sun),
            other => Err(InfraError::InvalidConfig(format!(
                "invalid recur_weekdays entry: {other}"
            ))),
        })
        .collect()
}

fn weekdays_to_csv(weekdays: &[Weekday]) -> Option<String> {
    if weekdays.is_empty() {
        return None;
    }
    Some(
        weekdays
            .iter()
            .map(|weekday| weekday_to_str(*weekday))
            .collect::<Vec<_>>()
            .join(","),
    )
}

struct TaskSqlValues {
    completed_at: Option<String>,
    due_at: Option<String>,
    recur_kind: Option<&'static str>,
    recur_interval_minutes: Option<i64>,
    recur_weekdays: Option<String>,
    recur_time_of_day: Option<String>,
    recur_trigger: Option<&'static str>,
}

fn task_sql_values(task: &ScheduledTask) -> TaskSqlValues {
    TaskSqlValues {
        completed_at: task.completed_at.map(|value| value.to_rfc3339()),
        due_at: task.due_at.map(|value| value.to_rfc3339()),
        recur_kind: task.recurrence.as_ref().map(|rule| rule.kind.as_str()),
        recur_interval_minutes: task.recurrence.as_ref().map(|rule| rule.interval_minutes),
        recur_weekdays: task
            .recurrence
            .as_ref()
            .and_then(|rule| weekdays_to_csv(&rule.weekdays)),
        recur_time_of_day: task
            .recurrence
            .as_ref()
            .and_then(|rule| rule.time_of_day)
            .map(|time| time.format("%H:%M").to_string()),
        recur_trigger: task.recurrence.as_ref().map(|rule| rule.trigger.as_str()),
    }
}

impl TaskStore for SqliteTaskStore {
    fn get(&self, id: TaskId) -> Result<Option<ScheduledTask>, InfraError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                |row| {
                    let values = task_from_row(row)?;
                    let completed_at: Option<String> = row.get(4)?;
                    let due_at: Option<String> = row.get(5)?;
                    Ok((values, completed_at, due_at))
                },
            )
            .optional()?;
        row.map(|(values, completed_at, due_at)| finish_task(values, completed_at, due_at))
            .transpose()
    }

    fn insert(&self, task: &ScheduledTask) -> Result<TaskId, InfraError> {
        let connection = self.connect()?;
        let values = task_sql_values(task);
        if task.id > 0 {
            connection.execute(
                "INSERT INTO tasks (id, title, description, completed, completed_at, due_at, \
                 estimated_minutes, category_id, percentage, parent_id, auto_complete_parent, \
                 recur_kind, recur_interval_minutes, recur_weekdays, recur_time_of_day, \
                 recur_trigger, calendar_event_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.completed as i64,
                    values.completed_at,
                    values.due_at,
                    task.estimated_minutes,
                    task.category_id,
                    i64::from(task.percentage),
                    task.parent_id,
                    task.auto_complete_parent as i64,
                    values.recur_kind,
                    values.recur_interval_minutes,
                    values.recur_weekdays,
                    values.recur_time_of_day,
                    values.recur_trigger,
                    task.calendar_event_id,
                ],
            )?;
            Ok(task.id)
        } else {
            connection.execute(
                "INSERT INTO tasks (title, description, completed, completed_at, due_at, \
                 estimated_minutes, category_id, percentage, parent_id, auto_complete_parent, \
                 recur_kind, recur_interval_minutes, recur_weekdays, recur_time_of_day, \
                 recur_trigger, calendar_event_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    task.title,
                    task.description,
                    task.completed as i64,
                    values.completed_at,
                    values.due_at,
                    task.estimated_minutes,
                    task.category_id,
                    i64::from(task.percentage),
                    task.parent_id,
                    task.auto_complete_parent as i64,
                    values.recur_kind,
                    values.recur_interval_minutes,
                    values.recur_weekdays,
                    values.recur_time_of_day,
                    values.recur_trigger,
                    task.calendar_event_id,
                ],
            )?;
            Ok(connection.last_insert_rowid())
        }
    }

    fn update(&self, task: &ScheduledTask) -> Result<(), InfraError> {
        let connection = self.connect()?;
        let values = task_sql_values(task);
        connection.execute(
            "UPDATE tasks SET title = ?2, description = ?3, completed = ?4, completed_at = ?5, \
             due_at = ?6, estimated_minutes = ?7, category_id = ?8, percentage = ?9, \
             parent_id = ?10, auto_complete_parent = ?11, recur_kind = ?12, \
             recur_interval_minutes = ?13, recur_weekdays = ?14, recur_time_of_day = ?15, \
             recur_trigger = ?16, calendar_event_id = ?17 WHERE id = ?1",
            params![
                task.id,
                task.title,
                task.description,
                task.completed as i64,
                values.completed_at,
                values.due_at,
                task.estimated_minutes,
                task.category_id,
                i64::from(task.percentage),
                task.parent_id,
                task.auto_complete_parent as i64,
                values.recur_kind,
                values.recur_interval_minutes,
                values.recur_weekdays,
                values.recur_time_of_day,
                values.recur_trigger,
                task.calendar_event_id,
            ],
        )?;
        Ok(())
    }

    fn subtasks(&self, parent_id: TaskId) -> Result<Vec<ScheduledTask>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE parent_id = ?1 ORDER BY id"
        ))?;
        let rows = statement.query_map(params![parent_id], |row| {
            let values = task_from_row(row)?;
            let completed_at: Option<String> = row.get(4)?;
            let due_at: Option<String> = row.get(5)?;
            Ok((values, completed_at, due_at))
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            let (values, completed_at, due_at) = row?;
            tasks.push(finish_task(values, completed_at, due_at)?);
        }
        Ok(tasks)
    }

    fn incomplete_subtask_count(&self, parent_id: TaskId) -> Result<i64, InfraError> {
        let connection = self.connect()?;
        let count = connection.query_row(
            "SELECT COUNT(*) FROM tasks WHERE parent_id = ?1 AND completed = 0",
            params![parent_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<TaskId, ScheduledTask>>,
    next_id: AtomicI64,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl TaskStore for InMemoryTaskStore {
    fn get(&self, id: TaskId) -> Result<Option<ScheduledTask>, InfraError> {
        let tasks = self
            .tasks
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("task lock poisoned: {error}")))?;
        Ok(tasks.get(&id).cloned())
    }

    fn insert(&self, task: &ScheduledTask) -> Result<TaskId, InfraError> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("task lock poisoned: {error}")))?;
        let id = if task.id > 0 {
            task.id
        } else {
            self.next_id.fetch_add(1, Ordering::SeqCst)
        };
        let mut stored = task.clone();
        stored.id = id;
        tasks.insert(id, stored);
        Ok(id)
    }

    fn update(&self, task: &ScheduledTask) -> Result<(), InfraError> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("task lock poisoned: {error}")))?;
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    fn subtasks(&self, parent_id: TaskId) -> Result<Vec<ScheduledTask>, InfraError> {
        let tasks = self
            .tasks
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("task lock poisoned: {error}")))?;
        let mut subtasks: Vec<_> = tasks
            .values()
            .filter(|task| task.parent_id == Some(parent_id))
            .cloned()
            .collect();
        subtasks.sort_by_key(|task| task.id);
        Ok(subtasks)
    }

    fn incomplete_subtask_count(&self, parent_id: TaskId) -> Result<i64, InfraError> {
        Ok(self
            .subtasks(parent_id)?
            .iter()
            .filter(|task| !task.completed)
            .count() as i64)
    }
}
