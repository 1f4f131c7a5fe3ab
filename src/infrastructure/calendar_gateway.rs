use crate::domain::models::ExternalCalendarEvent;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use url::Url;

const PROVIDER_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const TOKEN_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// What the core wants an external event to look like. Metadata is carried
/// as provider private properties so own events can be recognized later.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

/// Boundary to the device/provider calendar. `events_in_range` spans every
/// calendar the gateway can see, not just the app's own.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    async fn has_permission(&self) -> bool;

    /// Returns the new provider event id, or `None` when the provider did
    /// not create one.
    async fn create_event(&self, draft: &EventDraft) -> Result<Option<String>, InfraError>;

    /// Returns `false` when the target event no longer exists at the
    /// provider, so the caller can fall back to a create.
    async fn update_event(&self, event_id: &str, draft: &EventDraft) -> Result<bool, InfraError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError>;

    async fn events_in_range(&self, range: DateRange)
        -> Result<Vec<ExternalCalendarEvent>, InfraError>;
}

pub struct RestCalendarGateway<S: CredentialStore> {
    client: Client,
    credentials: S,
    write_calendar_id: String,
    visible_calendar_ids: Vec<String>,
}

impl<S: CredentialStore> RestCalendarGateway<S> {
    pub fn new(
        credentials: S,
        write_calendar_id: impl Into<String>,
        visible_calendar_ids: Vec<String>,
    ) -> Self {
        let write_calendar_id = write_calendar_id.into();
        let mut visible_calendar_ids = visible_calendar_ids;
        if !visible_calendar_ids.contains(&write_calendar_id) {
            visible_calendar_ids.push(write_calendar_id.clone());
        }
        Self {
            client: Client::new(),
            credentials,
            write_calendar_id,
            visible_calendar_ids,
        }
    }

    fn access_token(&self) -> Result<Option<String>, InfraError> {
        let Some(token) = self.credentials.load_token()? else {
            return Ok(None);
        };
        if !token.is_valid_at(Utc::now(), TOKEN_LEEWAY_SECONDS) {
            return Ok(None);
        }
        Ok(Some(token.access_token))
    }

    fn require_token(&self) -> Result<String, InfraError> {
        self.access_token()?
            .ok_or_else(|| InfraError::Credential("no valid calendar credential".to_string()))
    }

    fn events_endpoint(calendar_id: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(PROVIDER_API_BASE)
            .map_err(|error| InfraError::Provider(format!("invalid provider base url: {error}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::Provider("provider base URL cannot be a base".to_string()))?;
            segments.push("calendars");
            segments.push(calendar_id);
            segments.push("events");
        }
        Ok(url)
    }

    fn event_endpoint(calendar_id: &str, event_id: &str) -> Result<Url, InfraError> {
        let mut url = Self::events_endpoint(calendar_id)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::Provider("events URL cannot be a base".to_string()))?;
            segments.push(event_id);
        }
        Ok(url)
    }

    fn provider_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("calendar provider error: http {}", status.as_u16())
        } else {
            format!("calendar provider error: http {}; body={body}", status.as_u16())
        };
        InfraError::Provider(message)
    }

    async fn list_calendar_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        range: DateRange,
    ) -> Result<Vec<ExternalCalendarEvent>, InfraError> {
        let endpoint = Self::events_endpoint(calendar_id)?;
        let mut page_token: Option<String> = None;
        let mut events = Vec::new();

        loop {
            let mut request = self
                .client
                .get(endpoint.clone())
                .bearer_auth(access_token)
                .query(&[("singleEvents", "true"), ("maxResults", "2500")])
                .query(&[
                    ("timeMin", range.start.to_rfc3339()),
                    ("timeMax", range.end.to_rfc3339()),
                ]);
            if let Some(page_token) = page_token.as_deref() {
                request = request.query(&[("pageToken", page_token)]);
            }

            let response = request.send().await.map_err(|error| {
                InfraError::Provider(format!("network error while listing events: {error}"))
            })?;
            let status = response.status();
            let body = response.text().await.map_err(|error| {
                InfraError::Provider(format!("failed reading events list response: {error}"))
            })?;
            if !status.is_success() {
                return Err(Self::provider_http_error(status, &body));
            }

            let mut parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
                InfraError::Provider(format!("invalid events list payload: {error}; body={body}"))
            })?;

            for item in parsed.items.take().unwrap_or_default() {
                if let Some(event) = item.into_external_event(calendar_id) {
                    events.push(event);
                }
            }

            match parsed.next_page_token.take() {
                Some(next_page_token) => page_token = Some(next_page_token),
                None => break,
            }
        }

        Ok(events)
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct ProviderEventDateTime {
    #[serde(rename = "dateTime")]
    date_time: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
struct ProviderExtendedProperties {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    private: HashMap<String, String>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct ProviderEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    start: ProviderEventDateTime,
    end: ProviderEventDateTime,
    #[serde(rename = "extendedProperties", skip_serializing_if = "Option::is_none")]
    extended_properties: Option<ProviderExtendedProperties>,
}

impl ProviderEvent {
    fn from_draft(draft: &EventDraft) -> Self {
        Self {
            id: None,
            summary: Some(draft.title.clone()),
            description: draft.description.clone(),
            status: Some("confirmed".to_string()),
            start: ProviderEventDateTime {
                date_time: draft.starts_at.to_rfc3339(),
            },
            end: ProviderEventDateTime {
                date_time: draft.ends_at.to_rfc3339(),
            },
            extended_properties: (!draft.metadata.is_empty()).then(|| {
                ProviderExtendedProperties {
                    private: draft.metadata.clone(),
                }
            }),
        }
    }

    fn into_external_event(self, calendar_id: &str) -> Option<ExternalCalendarEvent> {
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())?
            .to_string();
        let cancelled = self
            .status
            .as_deref()
            .map(|status| status.eq_ignore_ascii_case("cancelled"))
            .unwrap_or(false);
        if cancelled {
            return None;
        }
        let starts_at = DateTime::parse_from_rfc3339(&self.start.date_time).ok()?;
        let ends_at = DateTime::parse_from_rfc3339(&self.end.date_time).ok()?;
        Some(ExternalCalendarEvent {
            id,
            title: self.summary.unwrap_or_default(),
            starts_at: starts_at.with_timezone(&Utc),
            ends_at: ends_at.with_timezone(&Utc),
            calendar_id: Some(calendar_id.to_string()),
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<ProviderEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[async_trait]
impl<S: CredentialStore> CalendarGateway for RestCalendarGateway<S> {
    async fn has_permission(&self) -> bool {
        matches!(self.access_token(), Ok(Some(_)))
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<Option<String>, InfraError> {
        let access_token = self.require_token()?;
        let endpoint = Self::events_endpoint(&self.write_calendar_id)?;
        let payload = ProviderEvent::from_draft(draft);

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                InfraError::Provider(format!("network error while creating event: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Provider(format!("failed reading event create response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::provider_http_error(status, &body));
        }

        let parsed: ProviderEvent = serde_json::from_str(&body).map_err(|error| {
            InfraError::Provider(format!("invalid event create payload: {error}; body={body}"))
        })?;
        Ok(parsed
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()))
    }

    async fn update_event(&self, event_id: &str, draft: &EventDraft) -> Result<bool, InfraError> {
        let access_token = self.require_token()?;
        let endpoint = Self::event_endpoint(&self.write_calendar_id, event_id)?;
        let payload = ProviderEvent::from_draft(draft);

        let response = self
            .client
            .put(endpoint)
            .bearer_auth(&access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                InfraError::Provider(format!("network error while updating event: {error}"))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(false);
        }
        let body = response.text().await.map_err(|error| {
            InfraError::Provider(format!("failed reading event update response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::provider_http_error(status, &body));
        }
        Ok(true)
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError> {
        let access_token = self.require_token()?;
        let endpoint = Self::event_endpoint(&self.write_calendar_id, event_id)?;

        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|error| {
                InfraError::Provider(format!("network error while deleting event: {error}"))
            })?;

        let status = response.status();
        // Already gone is as good as deleted.
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(());
        }
        let body = response.text().await.map_err(|error| {
            InfraError::Provider(format!("failed reading event delete response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::provider_http_error(status, &body));
        }
        Ok(())
    }

    async fn events_in_range(
        &self,
        range: DateRange,
    ) -> Result<Vec<ExternalCalendarEvent>, InfraError> {
        let access_token = self.require_token()?;
        let mut events = Vec::new();
        for calendar_id in &self.visible_calendar_ids {
            events.extend(
                self.list_calendar_events(&access_token, calendar_id, range)
                    .await?,
            );
        }
        events.sort_by_key(|event| event.starts_at);
        Ok(events)
    }
}

/// In-process gateway used in offline mode and by tests. Behaves like a
/// provider with a single calendar and sequential event ids.
#[derive(Debug)]
pub struct InMemoryCalendarGateway {
    events: Mutex<HashMap<String, ExternalCalendarEvent>>,
    permission: AtomicBool,
    next_id: AtomicU64,
}

impl Default for InMemoryCalendarGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCalendarGateway {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
            permission: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    pub fn seed_event(&self, event: ExternalCalendarEvent) {
        self.events
            .lock()
            .expect("event lock poisoned")
            .insert(event.id.clone(), event);
    }

    pub fn event(&self, event_id: &str) -> Option<ExternalCalendarEvent> {
        self.events
            .lock()
            .expect("event lock poisoned")
            .get(event_id)
            .cloned()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().expect("event lock poisoned").len()
    }
}

#[async_trait]
impl CalendarGateway for InMemoryCalendarGateway {
    async fn has_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<Option<String>, InfraError> {
        let sequence = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("local-{sequence}");
        let event = ExternalCalendarEvent {
            id: id.clone(),
            title: draft.title.clone(),
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            calendar_id: None,
        };
        self.events
            .lock()
            .map_err(|error| InfraError::Provider(format!("event lock poisoned: {error}")))?
            .insert(id.clone(), event);
        Ok(Some(id))
    }

    async fn update_event(&self, event_id: &str, draft: &EventDraft) -> Result<bool, InfraError> {
        let mut events = self
            .events
            .lock()
            .map_err(|error| InfraError::Provider(format!("event lock poisoned: {error}")))?;
        match events.get_mut(event_id) {
            Some(event) => {
                event.title = draft.title.clone();
                event.starts_at = draft.starts_at;
                event.ends_at = draft.ends_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError> {
        self.events
            .lock()
            .map_err(|error| InfraError::Provider(format!("event lock poisoned: {error}")))?
            .remove(event_id);
        Ok(())
    }

    async fn events_in_range(
        &self,
        range: DateRange,
    ) -> Result<Vec<ExternalCalendarEvent>, InfraError> {
        let events = self
            .events
            .lock()
            .map_err(|error| InfraError::Provider(format!("event lock poisoned: {error}")))?;
        let mut visible: Vec<_> = events
            .values()
            .filter(|event| event.starts_at < range.end && event.ends_at > range.start)
            .cloned()
            .collect();
        visible.sort_by_key(|event| event.starts_at);
        Ok(visible)
    }
}
