use crate::domain::models::{CalendarLink, LinkId, LinkStatus};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::{parse_datetime_utc, parse_optional_datetime_utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

pub trait CalendarLinkStore: Send + Sync {
    fn get(&self, id: LinkId) -> Result<Option<CalendarLink>, InfraError>;
    fn get_by_event_id(&self, event_id: &str) -> Result<Option<CalendarLink>, InfraError>;
    fn list_all(&self) -> Result<Vec<CalendarLink>, InfraError>;
    fn insert(&self, link: &CalendarLink) -> Result<LinkId, InfraError>;
    fn update(&self, link: &CalendarLink) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteCalendarLinkStore {
    db_path: PathBuf,
}

impl SqliteCalendarLinkStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

const LINK_COLUMNS: &str = "id, task_id, event_id, starts_at, ends_at, reward_amount, \
     reward_percentage, category_id, status, rewarded, delete_on_claim, delete_on_expiry, \
     is_recurring, recurring_task_id, expired_at";

struct RawLinkRow {
    link: CalendarLink,
    starts_at: String,
    ends_at: String,
    status: String,
    expired_at: Option<String>,
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<RawLinkRow> {
    let placeholder = chrono::DateTime::<chrono::Utc>::MIN_UTC;
    Ok(RawLinkRow {
        link: CalendarLink {
            id: row.get(0)?,
            task_id: row.get(1)?,
            event_id: row
                .get::<_, Option<String>>(2)?
                .filter(|value| !value.trim().is_empty() && value.trim() != "0"),
            starts_at: placeholder,
            ends_at: placeholder,
            reward_amount: row.get(5)?,
            reward_percentage: row.get::<_, i64>(6)? as u8,
            category_id: row.get(7)?,
            status: LinkStatus::Pending,
            rewarded: row.get::<_, i64>(9)? != 0,
            delete_on_claim: row.get::<_, i64>(10)? != 0,
            delete_on_expiry: row.get::<_, i64>(11)? != 0,
            is_recurring: row.get::<_, i64>(12)? != 0,
            recurring_task_id: row.get(13)?,
            expired_at: None,
        },
        starts_at: row.get(3)?,
        ends_at: row.get(4)?,
        status: row.get(8)?,
        expired_at: row.get(14)?,
    })
}

fn finish_link(raw: RawLinkRow) -> Result<CalendarLink, InfraError> {
    let mut link = raw.link;
    link.starts_at = parse_datetime_utc(&raw.starts_at, "calendar_links.starts_at")?;
    link.ends_at = parse_datetime_utc(&raw.ends_at, "calendar_links.ends_at")?;
    link.status = LinkStatus::parse(&raw.status).map_err(InfraError::InvalidConfig)?;
    link.expired_at = parse_optional_datetime_utc(raw.expired_at, "calendar_links.expired_at")?;
    Ok(link)
}

impl CalendarLinkStore for SqliteCalendarLinkStore {
    fn get(&self, id: LinkId) -> Result<Option<CalendarLink>, InfraError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                &format!("SELECT {LINK_COLUMNS} FROM calendar_links WHERE id = ?1"),
                params![id],
                link_from_row,
            )
            .optional()?;
        row.map(finish_link).transpose()
    }

    fn get_by_event_id(&self, event_id: &str) -> Result<Option<CalendarLink>, InfraError> {
        let normalized = event_id.trim();
        if normalized.is_empty() || normalized == "0" {
            return Ok(None);
        }
        let connection = self.connect()?;
        let row = connection
            .query_row(
                &format!("SELECT {LINK_COLUMNS} FROM calendar_links WHERE event_id = ?1"),
                params![normalized],
                link_from_row,
            )
            .optional()?;
        row.map(finish_link).transpose()
    }

    fn list_all(&self) -> Result<Vec<CalendarLink>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(&format!("SELECT {LINK_COLUMNS} FROM calendar_links ORDER BY id"))?;
        let rows = statement.query_map([], link_from_row)?;

        let mut links = Vec::new();
        for row in rows {
            links.push(finish_link(row?)?);
        }
        Ok(links)
    }

    fn insert(&self, link: &CalendarLink) -> Result<LinkId, InfraError> {
        let connection = self.connect()?;
        let expired_at = link.expired_at.map(|value| value.to_rfc3339());
        if link.id > 0 {
            connection.execute(
                "INSERT INTO calendar_links (id, task_id, event_id, starts_at, ends_at, \
                 reward_amount, reward_percentage, category_id, status, rewarded, \
                 delete_on_claim, delete_on_expiry, is_recurring, recurring_task_id, expired_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    link.id,
                    link.task_id,
                    link.event_id,
                    link.starts_at.to_rfc3339(),
                    link.ends_at.to_rfc3339(),
                    link.reward_amount,
                    i64::from(link.reward_percentage),
                    link.category_id,
                    link.status.as_str(),
                    link.rewarded as i64,
                    link.delete_on_claim as i64,
                    link.delete_on_expiry as i64,
                    link.is_recurring as i64,
                    link.recurring_task_id,
                    expired_at,
                ],
            )?;
            Ok(link.id)
        } else {
            connection.execute(
                "INSERT INTO calendar_links (task_id, event_id, starts_at, ends_at, \
                 reward_amount, reward_percentage, category_id, status, rewarded, \
                 delete_on_claim, delete_on_expiry, is_recurring, recurring_task_id, expired_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    link.task_id,
                    link.event_id,
                    link.starts_at.to_rfc3339(),
                    link.ends_at.to_rfc3339(),
                    link.reward_amount,
                    i64::from(link.reward_percentage),
                    link.category_id,
                    link.status.as_str(),
                    link.rewarded as i64,
                    link.delete_on_claim as i64,
                    link.delete_on_expiry as i64,
                    link.is_recurring as i64,
                    link.recurring_task_id,
                    expired_at,
                ],
            )?;
            Ok(connection.last_insert_rowid())
        }
    }

    fn update(&self, link: &CalendarLink) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "UPDATE calendar_links SET task_id = ?2, event_id = ?3, starts_at = ?4, \
             ends_at = ?5, reward_amount = ?6, reward_percentage = ?7, category_id = ?8, \
             status = ?9, rewarded = ?10, delete_on_claim = ?11, delete_on_expiry = ?12, \
             is_recurring = ?13, recurring_task_id = ?14, expired_at = ?15 WHERE id = ?1",
            params![
                link.id,
                link.task_id,
                link.event_id,
                link.starts_at.to_rfc3339(),
                link.ends_at.to_rfc3339(),
                link.reward_amount,
                i64::from(link.reward_percentage),
                link.category_id,
                link.status.as_str(),
                link.rewarded as i64,
                link.delete_on_claim as i64,
                link.delete_on_expiry as i64,
                link.is_recurring as i64,
                link.recurring_task_id,
                link.expired_at.map(|value| value.to_rfc3339()),
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCalendarLinkStore {
    links: Mutex<HashMap<LinkId, CalendarLink>>,
    next_id: AtomicI64,
}

impl InMemoryCalendarLinkStore {
    pub fn new() -> Self {
        Self {
            links: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl CalendarLinkStore for InMemoryCalendarLinkStore {
    fn get(&self, id: LinkId) -> Result<Option<CalendarLink>, InfraError> {
        let links = self
            .links
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("link lock poisoned: {error}")))?;
        Ok(links.get(&id).cloned())
    }

    fn get_by_event_id(&self, event_id: &str) -> Result<Option<CalendarLink>, InfraError> {
        let normalized = event_id.trim();
        if normalized.is_empty() || normalized == "0" {
            return Ok(None);
        }
        let links = self
            .links
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("link lock poisoned: {error}")))?;
        Ok(links
            .values()
            .find(|link| link.event_id.as_deref() == Some(normalized))
            .cloned())
    }

    fn list_all(&self) -> Result<Vec<CalendarLink>, InfraError> {
        let links = self
            .links
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("link lock poisoned: {error}")))?;
        let mut all: Vec<_> = links.values().cloned().collect();
        all.sort_by_key(|link| link.id);
        Ok(all)
    }

    fn insert(&self, link: &CalendarLink) -> Result<LinkId, InfraError> {
        let mut links = self
            .links
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("link lock poisoned: {error}")))?;
        let id = if link.id > 0 {
            link.id
        } else {
            self.next_id.fetch_add(1, Ordering::SeqCst)
        };
        let mut stored = link.clone();
        stored.id = id;
        links.insert(id, stored);
        Ok(id)
    }

    fn update(&self, link: &CalendarLink) -> Result<(), InfraError> {
        let mut links = self
            .links
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("link lock poisoned: {error}")))?;
        links.insert(link.id, link.clone());
        Ok(())
    }
}
