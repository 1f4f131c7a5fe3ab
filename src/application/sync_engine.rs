use crate::application::{NowProvider, SyncError};
use crate::domain::models::{
    reward_for, snap_percentage, CalendarLink, CategoryId, ContactId, LinkId, LinkStatus,
    PriorityBucket, RecurrenceRule, ScheduledTask, TaskId,
};
use crate::domain::sync_plan::{plan_operation, CalendarOp, SyncFacts};
use crate::infrastructure::calendar_gateway::{CalendarGateway, EventDraft};
use crate::infrastructure::category_store::CategoryLookup;
use crate::infrastructure::config::DEFAULT_EVENT_MARKER;
use crate::infrastructure::link_store::CalendarLinkStore;
use crate::infrastructure::notifications::NotificationScheduler;
use crate::infrastructure::placeholders::PlaceholderResolver;
use crate::infrastructure::task_store::TaskStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const METADATA_LINK_ID: &str = "qc_link_id";
const METADATA_TASK_ID: &str = "qc_task_id";
const METADATA_REWARD: &str = "qc_reward";
const METADATA_PRIORITY: &str = "qc_priority";

/// One task/link edit as the UI hands it over. `delete_on_claim` and
/// `delete_on_expiry` are the values being requested now; the link still
/// carries the previous ones until the edit is persisted.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub task_id: Option<TaskId>,
    pub link_id: LinkId,
    pub title: String,
    pub description: Option<String>,
    pub percentage: u8,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub category_id: Option<CategoryId>,
    pub reactivate: bool,
    pub add_to_calendar: bool,
    pub delete_on_claim: bool,
    pub delete_on_expiry: bool,
    pub recurrence: Option<RecurrenceRule>,
    pub parent_id: Option<TaskId>,
    pub auto_complete_parent: bool,
    pub contact_id: Option<ContactId>,
    pub custom_event_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub task_id: Option<TaskId>,
    pub link_id: LinkId,
    pub operation: CalendarOp,
    pub event_id: Option<String>,
}

/// The central edit state machine: computes the required external-calendar
/// operation for an edit, executes it, and writes back consistent task/link
/// records. The external side effect deliberately happens before the durable
/// write, so a crash leaves at worst a stale local record rather than an
/// orphaned calendar event.
pub struct CalendarSyncService<G, T, L, C, N, P>
where
    G: CalendarGateway,
    T: TaskStore,
    L: CalendarLinkStore,
    C: CategoryLookup,
    N: NotificationScheduler,
    P: PlaceholderResolver,
{
    gateway: Arc<G>,
    tasks: Arc<T>,
    links: Arc<L>,
    categories: Arc<C>,
    notifications: Arc<N>,
    placeholders: Arc<P>,
    event_marker: String,
    now_provider: NowProvider,
}

impl<G, T, L, C, N, P> CalendarSyncService<G, T, L, C, N, P>
where
    G: CalendarGateway,
    T: TaskStore,
    L: CalendarLinkStore,
    C: CategoryLookup,
    N: NotificationScheduler,
    P: PlaceholderResolver,
{
    pub fn new(
        gateway: Arc<G>,
        tasks: Arc<T>,
        links: Arc<L>,
        categories: Arc<C>,
        notifications: Arc<N>,
        placeholders: Arc<P>,
    ) -> Self {
        Self {
            gateway,
            tasks,
            links,
            categories,
            notifications,
            placeholders,
            event_marker: DEFAULT_EVENT_MARKER.to_string(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_event_marker(mut self, event_marker: impl Into<String>) -> Self {
        self.event_marker = event_marker.into();
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn apply(&self, request: UpdateRequest) -> Result<SyncOutcome, SyncError> {
        let now = (self.now_provider)();

        let link = self
            .links
            .get(request.link_id)?
            .ok_or(SyncError::LinkNotFound(request.link_id))?;
        let task = match request.task_id {
            Some(task_id) => Some(
                self.tasks
                    .get(task_id)?
                    .ok_or(SyncError::TaskNotFound(task_id))?,
            ),
            None => None,
        };

        let title =
            self.placeholders
                .resolve(&request.title, request.task_id, request.contact_id)?;
        let description = request
            .description
            .as_deref()
            .map(|text| {
                self.placeholders
                    .resolve(text, request.task_id, request.contact_id)
            })
            .transpose()?;
        let custom_event_text = request
            .custom_event_text
            .as_deref()
            .map(|text| {
                self.placeholders
                    .resolve(text, request.task_id, request.contact_id)
            })
            .transpose()?;

        let percentage = snap_percentage(request.percentage);
        let category = match request.category_id {
            Some(category_id) => self.categories.get(category_id)?,
            None => None,
        };
        let level = category.as_ref().map(|category| category.level).unwrap_or(1);
        let reward_amount = reward_for(percentage, level);

        let (starts_at, ends_at) = normalize_window(request.starts_at, request.ends_at);

        let facts = SyncFacts {
            add_to_calendar: request.add_to_calendar,
            reactivate: request.reactivate,
            is_expired_now: ends_at <= now,
            was_expired_by_status: link.status == LinkStatus::Expired,
            had_event: link.has_event(),
            delete_on_claim: request.delete_on_claim,
            delete_on_expiry: request.delete_on_expiry,
            previous_delete_on_claim: link.delete_on_claim,
            previous_delete_on_expiry: link.delete_on_expiry,
            was_claimed: link.rewarded,
        };
        let mut operation = plan_operation(&facts);

        let status = next_status(request.reactivate, facts.is_expired_now, &link);

        // An identical repeated edit must not touch the provider again.
        if operation == CalendarOp::Update
            && self.is_noop_update(
                &link,
                task.as_ref(),
                &request,
                &title,
                description.as_deref(),
                starts_at,
                ends_at,
                percentage,
                reward_amount,
                status,
            )
        {
            operation = CalendarOp::None;
            debug!(link_id = link.id, "edit matches stored state; skipping sync");
            return Ok(SyncOutcome {
                task_id: request.task_id,
                link_id: link.id,
                operation,
                event_id: link.event_id,
            });
        }

        let draft = self.build_event_draft(
            &request,
            &title,
            description.as_deref(),
            custom_event_text.as_deref(),
            category.as_ref().and_then(|category| category.emoji.as_deref()),
            starts_at,
            ends_at,
            reward_amount,
        );
        let event_id = self.execute(operation, &link, &draft).await;

        let mut updated_link = link.clone();
        updated_link.task_id = request.task_id.or(link.task_id);
        updated_link.event_id = event_id.clone();
        updated_link.starts_at = starts_at;
        updated_link.ends_at = ends_at;
        updated_link.reward_amount = reward_amount;
        updated_link.reward_percentage = percentage;
        updated_link.category_id = request.category_id;
        updated_link.status = status;
        updated_link.delete_on_claim = request.delete_on_claim;
        updated_link.delete_on_expiry = request.delete_on_expiry;
        updated_link.is_recurring = request.recurrence.is_some();
        updated_link.recurring_task_id = request
            .recurrence
            .as_ref()
            .and_then(|_| request.task_id.or(link.recurring_task_id));
        if request.reactivate {
            updated_link.rewarded = false;
        }
        updated_link.expired_at = match status {
            LinkStatus::Expired => updated_link.expired_at.or(Some(now)),
            LinkStatus::Pending => None,
            LinkStatus::Claimed => updated_link.expired_at,
        };
        self.links.update(&updated_link)?;

        if let Some(mut task) = task {
            task.title = title.clone();
            task.description = description.clone();
            task.percentage = percentage;
            task.due_at = Some(starts_at);
            task.estimated_minutes = (ends_at - starts_at).num_minutes().max(1);
            task.category_id = request.category_id;
            task.parent_id = request.parent_id;
            task.auto_complete_parent = request.auto_complete_parent;
            task.recurrence = request.recurrence.clone();
            task.calendar_event_id = event_id.clone();
            self.tasks.update(&task)?;
        }

        self.update_notifications(&request, &title, description.as_deref(), reward_amount, starts_at, now);

        Ok(SyncOutcome {
            task_id: request.task_id,
            link_id: updated_link.id,
            operation,
            event_id,
        })
    }

    /// Run the planned operation against the gateway. Provider failures are
    /// absorbed here: they degrade to "no id change" and are logged, never
    /// surfaced. Without permission every branch is a no-op resolving to no
    /// event id.
    async fn execute(
        &self,
        operation: CalendarOp,
        link: &CalendarLink,
        draft: &EventDraft,
    ) -> Option<String> {
        if !self.gateway.has_permission().await {
            return None;
        }

        match operation {
            CalendarOp::None => link.event_id.clone(),
            CalendarOp::Create => self.create_event(draft).await,
            CalendarOp::Delete => {
                if let Some(event_id) = link.event_id.as_deref() {
                    if let Err(error) = self.gateway.delete_event(event_id).await {
                        warn!(link_id = link.id, event_id, %error, "event delete failed");
                    }
                }
                None
            }
            CalendarOp::Update => {
                let Some(event_id) = link.event_id.as_deref() else {
                    return self.create_event(draft).await;
                };
                match self.gateway.update_event(event_id, draft).await {
                    Ok(true) => Some(event_id.to_string()),
                    Ok(false) => {
                        // The provider purged the event out of band; heal by
                        // recreating it.
                        debug!(link_id = link.id, event_id, "event vanished; recreating");
                        self.create_event(draft).await
                    }
                    Err(error) => {
                        warn!(link_id = link.id, event_id, %error, "event update failed");
                        Some(event_id.to_string())
                    }
                }
            }
            CalendarOp::Replace => {
                if let Some(event_id) = link.event_id.as_deref() {
                    if let Err(error) = self.gateway.delete_event(event_id).await {
                        warn!(link_id = link.id, event_id, %error, "event delete failed during replace");
                    }
                }
                self.create_event(draft).await
            }
        }
    }

    async fn create_event(&self, draft: &EventDraft) -> Option<String> {
        match self.gateway.create_event(draft).await {
            Ok(event_id) => event_id,
            Err(error) => {
                warn!(%error, "event create failed");
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_event_draft(
        &self,
        request: &UpdateRequest,
        title: &str,
        description: Option<&str>,
        custom_event_text: Option<&str>,
        emoji: Option<&str>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        reward_amount: i64,
    ) -> EventDraft {
        let prefix = emoji.unwrap_or(&self.event_marker);
        let mut metadata = HashMap::new();
        metadata.insert(METADATA_LINK_ID.to_string(), request.link_id.to_string());
        if let Some(task_id) = request.task_id {
            metadata.insert(METADATA_TASK_ID.to_string(), task_id.to_string());
        }
        metadata.insert(METADATA_REWARD.to_string(), reward_amount.to_string());
        metadata.insert(
            METADATA_PRIORITY.to_string(),
            PriorityBucket::from_percentage(request.percentage)
                .as_str()
                .to_string(),
        );

        EventDraft {
            title: format!("{prefix} {title}"),
            description: custom_event_text
                .or(description)
                .map(ToOwned::to_owned),
            starts_at,
            ends_at,
            metadata,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn is_noop_update(
        &self,
        link: &CalendarLink,
        task: Option<&ScheduledTask>,
        request: &UpdateRequest,
        title: &str,
        description: Option<&str>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        percentage: u8,
        reward_amount: i64,
        status: LinkStatus,
    ) -> bool {
        if request.reactivate {
            return false;
        }
        let link_unchanged = link.starts_at == starts_at
            && link.ends_at == ends_at
            && link.reward_percentage == percentage
            && link.reward_amount == reward_amount
            && link.category_id == request.category_id
            && link.delete_on_claim == request.delete_on_claim
            && link.delete_on_expiry == request.delete_on_expiry
            && link.is_recurring == request.recurrence.is_some()
            && link.status == status;
        if !link_unchanged {
            return false;
        }
        match task {
            None => true,
            Some(task) => {
                task.title == title
                    && task.description.as_deref() == description
                    && task.percentage == percentage
                    && task.due_at == Some(starts_at)
                    && task.category_id == request.category_id
                    && task.parent_id == request.parent_id
                    && task.auto_complete_parent == request.auto_complete_parent
                    && task.recurrence == request.recurrence
                    && task.calendar_event_id == link.event_id
            }
        }
    }

    fn update_notifications(
        &self,
        request: &UpdateRequest,
        title: &str,
        description: Option<&str>,
        reward_amount: i64,
        starts_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let Some(task_id) = request.task_id else {
            return;
        };
        let result = if request.add_to_calendar && starts_at > now {
            self.notifications
                .reschedule(task_id, title, description, reward_amount, starts_at)
        } else {
            self.notifications.cancel(task_id)
        };
        if let Err(error) = result {
            warn!(task_id, %error, "notification scheduling failed");
        }
    }
}

/// Permissive window repair: an end at or before the start becomes one hour
/// after it instead of failing the edit.
fn normalize_window(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    if ends_at <= starts_at {
        warn!(
            starts_at = %starts_at.to_rfc3339(),
            ends_at = %ends_at.to_rfc3339(),
            "end not after start; correcting to one hour"
        );
        (starts_at, starts_at + Duration::hours(1))
    } else {
        (starts_at, ends_at)
    }
}

fn next_status(reactivate: bool, is_expired_now: bool, link: &CalendarLink) -> LinkStatus {
    if reactivate {
        LinkStatus::Pending
    } else if is_expired_now && !link.rewarded {
        LinkStatus::Expired
    } else if !is_expired_now {
        LinkStatus::Pending
    } else {
        link.status
    }
}
