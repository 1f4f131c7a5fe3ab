use crate::application::free_slots::FreeSlotFinder;
use crate::application::{NowProvider, SyncError};
use crate::domain::models::{
    CalendarLink, LinkStatus, RecurrenceRule, RecurrenceTrigger, ScheduledTask, WorkingHours,
};
use crate::infrastructure::calendar_gateway::{CalendarGateway, EventDraft};
use crate::infrastructure::link_store::CalendarLinkStore;
use crate::infrastructure::sweep_state::SweepStateRepository;
use crate::infrastructure::task_store::TaskStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Recurring occurrences are assumed to take one hour when searching for a
/// relocation slot.
const ASSUMED_DURATION_MINUTES: i64 = 60;
const RELOCATION_LOOKAHEAD_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub expired: usize,
    pub deleted: usize,
    pub recurring_created: usize,
}

/// Incremental sweep over all calendar links: marks newly expired ones,
/// applies deletion policy, and advances recurring tasks to their next
/// occurrence. One link failing never aborts the sweep of the rest.
pub struct ExpirySweepService<G, T, L, S>
where
    G: CalendarGateway,
    T: TaskStore,
    L: CalendarLinkStore,
    S: SweepStateRepository,
{
    gateway: Arc<G>,
    tasks: Arc<T>,
    links: Arc<L>,
    sweep_state: Arc<S>,
    slot_finder: FreeSlotFinder<G>,
    working_hours: WorkingHours,
    now_provider: NowProvider,
}

impl<G, T, L, S> ExpirySweepService<G, T, L, S>
where
    G: CalendarGateway,
    T: TaskStore,
    L: CalendarLinkStore,
    S: SweepStateRepository,
{
    pub fn new(gateway: Arc<G>, tasks: Arc<T>, links: Arc<L>, sweep_state: Arc<S>) -> Self {
        let slot_finder = FreeSlotFinder::new(Arc::clone(&gateway));
        Self {
            gateway,
            tasks,
            links,
            sweep_state,
            slot_finder,
            working_hours: WorkingHours::default(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_working_hours(mut self, working_hours: WorkingHours) -> Self {
        self.working_hours = working_hours;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// One sweep run. The scan lower bound comes from the persisted
    /// checkpoint unless `force_full_check` is set or no checkpoint exists.
    /// The in-progress flag is set for the duration and cleared, together
    /// with the new checkpoint, regardless of what happened in between.
    pub async fn sweep(&self, force_full_check: bool) -> Result<SweepSummary, SyncError> {
        let now = (self.now_provider)();
        let lower_bound = if force_full_check {
            None
        } else {
            self.sweep_state.load()?.and_then(|state| state.last_check)
        };

        self.sweep_state.set_in_progress(true)?;
        let result = self.run(lower_bound, now).await;

        // Guaranteed cleanup: checkpoint and flag are written even when the
        // scan above failed partway.
        if let Err(cleanup_error) = self.sweep_state.save_checkpoint(now) {
            error!(%cleanup_error, "failed persisting sweep checkpoint");
        }
        if let Err(cleanup_error) = self.sweep_state.set_in_progress(false) {
            error!(%cleanup_error, "failed clearing sweep flag");
        }

        if let Ok(summary) = &result {
            info!(
                expired = summary.expired,
                deleted = summary.deleted,
                recurring_created = summary.recurring_created,
                "sweep finished"
            );
        }
        result
    }

    async fn run(
        &self,
        lower_bound: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<SweepSummary, SyncError> {
        let mut summary = SweepSummary::default();
        let has_permission = self.gateway.has_permission().await;

        for link in self.links.list_all()? {
            if link.status != LinkStatus::Pending || link.rewarded {
                continue;
            }
            let in_window = match lower_bound {
                Some(lower) => link.ends_at > lower && link.ends_at <= now,
                None => link.ends_at <= now,
            };
            if !in_window {
                continue;
            }

            if let Err(link_error) = self
                .process_expired_link(&link, now, has_permission, &mut summary)
                .await
            {
                error!(link_id = link.id, %link_error, "link expiry processing failed; sweep continues");
            }
        }

        Ok(summary)
    }

    async fn process_expired_link(
        &self,
        link: &CalendarLink,
        now: DateTime<Utc>,
        has_permission: bool,
        summary: &mut SweepSummary,
    ) -> Result<(), SyncError> {
        let mut expired = link.clone();
        expired.status = LinkStatus::Expired;
        expired.expired_at = Some(now);

        if link.delete_on_expiry && has_permission {
            if let Some(event_id) = link.event_id.as_deref() {
                match self.gateway.delete_event(event_id).await {
                    Ok(()) => {
                        expired.event_id = None;
                        summary.deleted += 1;
                    }
                    // Deletion failures are counted as not deleted and the
                    // sweep moves on.
                    Err(delete_error) => {
                        warn!(link_id = link.id, event_id, %delete_error, "expiry delete failed");
                    }
                }
            }
        }

        self.links.update(&expired)?;
        summary.expired += 1;
        debug!(link_id = link.id, "link marked expired");

        let Some(task_id) = link.recurring_task_id else {
            return Ok(());
        };
        let Some(task) = self.tasks.get(task_id)? else {
            warn!(link_id = link.id, task_id, "recurring task missing; skipping advance");
            return Ok(());
        };
        let Some(rule) = task.recurrence.clone() else {
            return Ok(());
        };

        let base = match rule.trigger {
            RecurrenceTrigger::AfterExpiry => now,
            RecurrenceTrigger::FixedInterval => match task.due_at {
                Some(due_at) if due_at <= now => due_at,
                _ => return Ok(()),
            },
            // Completion-driven recurrence is advanced by the claim flow,
            // not the sweep.
            RecurrenceTrigger::AfterCompletion => return Ok(()),
        };

        self.advance_recurring(&expired, task, &rule, base, has_permission)
            .await?;
        summary.recurring_created += 1;
        Ok(())
    }

    async fn advance_recurring(
        &self,
        link: &CalendarLink,
        mut task: ScheduledTask,
        rule: &RecurrenceRule,
        base: DateTime<Utc>,
        has_permission: bool,
    ) -> Result<(), SyncError> {
        let candidate = rule.next_start_after(base);
        let slot = match self
            .slot_finder
            .find_next_available_slot(
                ASSUMED_DURATION_MINUTES,
                candidate,
                RELOCATION_LOOKAHEAD_DAYS,
                &self.working_hours,
                link.event_id.as_deref(),
            )
            .await
        {
            Ok(slot) => slot,
            Err(slot_error) => {
                warn!(link_id = link.id, %slot_error, "slot search failed; using raw candidate");
                None
            }
        };
        // Never block recurrence on slot availability.
        let starts_at = slot.map(|slot| slot.starts_at).unwrap_or(candidate);
        let ends_at = starts_at + Duration::minutes(ASSUMED_DURATION_MINUTES);

        task.due_at = Some(starts_at);
        task.completed = false;
        task.completed_at = None;
        self.tasks.update(&task)?;

        let mut next = link.clone();
        next.starts_at = starts_at;
        next.ends_at = ends_at;
        next.status = LinkStatus::Pending;
        next.expired_at = None;
        next.rewarded = false;
        self.links.update(&next)?;

        if has_permission {
            if let Some(event_id) = next.event_id.as_deref() {
                let draft = EventDraft {
                    title: task.title.clone(),
                    description: task.description.clone(),
                    starts_at,
                    ends_at,
                    metadata: HashMap::new(),
                };
                if let Err(move_error) = self.gateway.update_event(event_id, &draft).await {
                    warn!(link_id = link.id, event_id, %move_error, "event move failed; sweep continues");
                }
            }
        }

        info!(
            link_id = link.id,
            task_id = task.id,
            starts_at = %starts_at.to_rfc3339(),
            "recurring task advanced"
        );
        Ok(())
    }
}
