use crate::application::SyncError;
use crate::domain::models::{ExternalCalendarEvent, FreeSlot, WorkingHours};
use crate::infrastructure::calendar_gateway::{CalendarGateway, DateRange};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

/// Hard cap on day iteration so a caller-supplied range can never turn into
/// an unbounded scan.
pub const MAX_SCAN_DAYS: i64 = 92;
pub const DEFAULT_SUGGESTION_COUNT: usize = 5;
pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 30;

/// Free capacity of one scanned day. A day with no free capacity is reported
/// with an empty slot list, never omitted, so callers can tell "no free time"
/// from "day not scanned".
#[derive(Debug, Clone, PartialEq)]
pub struct DailyFreeTime {
    pub date: NaiveDate,
    pub slots: Vec<FreeSlot>,
}

pub struct FreeSlotFinder<G: CalendarGateway> {
    gateway: Arc<G>,
}

impl<G: CalendarGateway> FreeSlotFinder<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Scan `[start_date, end_date]` day by day within working hours and
    /// report every gap of at least `min_duration_minutes`. Events are
    /// fetched from the gateway once per call; `exclude_event_id` removes the
    /// event being edited so it does not conflict with itself.
    pub async fn find_free_time(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        min_duration_minutes: i64,
        hours: &WorkingHours,
        exclude_event_id: Option<&str>,
    ) -> Result<Vec<DailyFreeTime>, SyncError> {
        let total_days = end_date
            .signed_duration_since(start_date)
            .num_days()
            .clamp(0, MAX_SCAN_DAYS);

        let range = DateRange {
            start: utc_midnight(start_date - Duration::days(1)),
            end: utc_midnight(start_date + Duration::days(total_days + 2)),
        };
        let mut events = self.gateway.events_in_range(range).await?;
        events.sort_by_key(|event| event.starts_at);
        if let Some(excluded) = exclude_event_id {
            events.retain(|event| event.id != excluded);
        }

        let mut days = Vec::with_capacity(total_days as usize + 1);
        for offset in 0..=total_days {
            let date = start_date + Duration::days(offset);
            days.push(DailyFreeTime {
                date,
                slots: day_gaps(&events, date, hours, min_duration_minutes),
            });
        }
        Ok(days)
    }

    /// First gap of at least `duration_minutes` at or after `from`, scanning
    /// up to `max_days` ahead. On the start day, gaps beginning before `from`
    /// are discarded outright.
    pub async fn find_next_available_slot(
        &self,
        duration_minutes: i64,
        from: DateTime<Utc>,
        max_days: i64,
        hours: &WorkingHours,
        exclude_event_id: Option<&str>,
    ) -> Result<Option<FreeSlot>, SyncError> {
        let start_date = from.with_timezone(&hours.timezone).date_naive();
        let end_date = start_date + Duration::days(max_days.clamp(0, MAX_SCAN_DAYS));
        let days = self
            .find_free_time(start_date, end_date, duration_minutes, hours, exclude_event_id)
            .await?;

        for day in days {
            for slot in day.slots {
                if day.date == start_date && slot.starts_at < from {
                    continue;
                }
                if slot.duration_minutes >= duration_minutes {
                    return Ok(Some(slot));
                }
            }
        }
        Ok(None)
    }

    /// Up to `max_suggestions` gaps that can hold `duration_minutes`, each
    /// truncated to exactly the requested duration.
    pub async fn suggest_slots(
        &self,
        duration_minutes: i64,
        from: DateTime<Utc>,
        max_suggestions: usize,
        max_days: i64,
        hours: &WorkingHours,
        exclude_event_id: Option<&str>,
    ) -> Result<Vec<FreeSlot>, SyncError> {
        let start_date = from.with_timezone(&hours.timezone).date_naive();
        let end_date = start_date + Duration::days(max_days.clamp(0, MAX_SCAN_DAYS));
        let days = self
            .find_free_time(start_date, end_date, duration_minutes, hours, exclude_event_id)
            .await?;

        let mut suggestions = Vec::new();
        'scan: for day in days {
            for slot in day.slots {
                if day.date == start_date && slot.starts_at < from {
                    continue;
                }
                if slot.duration_minutes < duration_minutes {
                    continue;
                }
                suggestions.push(FreeSlot::new(
                    slot.starts_at,
                    slot.starts_at + Duration::minutes(duration_minutes),
                ));
                if suggestions.len() >= max_suggestions {
                    break 'scan;
                }
            }
        }
        Ok(suggestions)
    }
}

fn day_gaps(
    events: &[ExternalCalendarEvent],
    date: NaiveDate,
    hours: &WorkingHours,
    min_duration_minutes: i64,
) -> Vec<FreeSlot> {
    let Some((window_start, window_end)) = day_window(hours, date) else {
        return Vec::new();
    };

    let mut slots = Vec::new();
    let mut check_time = window_start;
    for event in events {
        if event.ends_at <= window_start || event.starts_at >= window_end {
            continue;
        }
        let clipped_start = event.starts_at.max(window_start);
        let clipped_end = event.ends_at.min(window_end);
        if clipped_start > check_time {
            push_gap(&mut slots, check_time, clipped_start, min_duration_minutes);
        }
        if clipped_end > check_time {
            check_time = clipped_end;
        }
    }
    push_gap(&mut slots, check_time, window_end, min_duration_minutes);
    slots
}

fn push_gap(
    slots: &mut Vec<FreeSlot>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    min_duration_minutes: i64,
) {
    if ends_at <= starts_at {
        return;
    }
    let slot = FreeSlot::new(starts_at, ends_at);
    if slot.duration_minutes >= min_duration_minutes.max(1) {
        slots.push(slot);
    }
}

/// Realize the working window of `date` as UTC instants. Returns `None` when
/// the configured hours collapse (end at or before start) on that day.
fn day_window(hours: &WorkingHours, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = resolve_local(hours.timezone, date.and_time(hours.start));
    let end = resolve_local(hours.timezone, date.and_time(hours.end));
    (end > start).then_some((start, end))
}

fn resolve_local(timezone: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(value) => value.with_timezone(&Utc),
        LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
        // DST skipped this wall-clock time; take the next valid hour.
        LocalResult::None => timezone
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|value| value.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::calendar_gateway::InMemoryCalendarGateway;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn date(value: &str) -> NaiveDate {
        value.parse().expect("valid date")
    }

    fn event(id: &str, start: &str, end: &str) -> ExternalCalendarEvent {
        ExternalCalendarEvent {
            id: id.to_string(),
            title: format!("event {id}"),
            starts_at: fixed_time(start),
            ends_at: fixed_time(end),
            calendar_id: None,
        }
    }

    fn finder_with(events: Vec<ExternalCalendarEvent>) -> FreeSlotFinder<InMemoryCalendarGateway> {
        let gateway = InMemoryCalendarGateway::new();
        for event in events {
            gateway.seed_event(event);
        }
        FreeSlotFinder::new(Arc::new(gateway))
    }

    #[tokio::test]
    async fn gaps_between_events_within_working_hours() {
        let finder = finder_with(vec![
            event("evt-1", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z"),
            event("evt-2", "2026-03-02T13:00:00Z", "2026-03-02T14:30:00Z"),
        ]);
        let days = finder
            .find_free_time(
                date("2026-03-02"),
                date("2026-03-02"),
                30,
                &WorkingHours::default(),
                None,
            )
            .await
            .expect("scan");

        assert_eq!(days.len(), 1);
        let slots = &days[0].slots;
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].starts_at, fixed_time("2026-03-02T08:00:00Z"));
        assert_eq!(slots[0].ends_at, fixed_time("2026-03-02T09:00:00Z"));
        assert_eq!(slots[1].starts_at, fixed_time("2026-03-02T10:00:00Z"));
        assert_eq!(slots[1].ends_at, fixed_time("2026-03-02T13:00:00Z"));
        assert_eq!(slots[2].starts_at, fixed_time("2026-03-02T14:30:00Z"));
        assert_eq!(slots[2].ends_at, fixed_time("2026-03-02T22:00:00Z"));
    }

    #[tokio::test]
    async fn fully_booked_day_reports_empty_entry() {
        let finder = finder_with(vec![event(
            "evt-1",
            "2026-03-02T07:00:00Z",
            "2026-03-02T23:00:00Z",
        )]);
        let days = finder
            .find_free_time(
                date("2026-03-02"),
                date("2026-03-03"),
                15,
                &WorkingHours::default(),
                None,
            )
            .await
            .expect("scan");

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date("2026-03-02"));
        assert!(days[0].slots.is_empty());
        // the next day is untouched and fully free
        assert_eq!(days[1].slots.len(), 1);
        assert_eq!(days[1].slots[0].duration_minutes, 14 * 60);
    }

    #[tokio::test]
    async fn excluded_event_does_not_block() {
        let finder = finder_with(vec![event(
            "evt-own",
            "2026-03-02T09:00:00Z",
            "2026-03-02T10:00:00Z",
        )]);
        let days = finder
            .find_free_time(
                date("2026-03-02"),
                date("2026-03-02"),
                60,
                &WorkingHours::default(),
                Some("evt-own"),
            )
            .await
            .expect("scan");
        assert_eq!(days[0].slots.len(), 1);
        assert_eq!(days[0].slots[0].duration_minutes, 14 * 60);
    }

    #[tokio::test]
    async fn overlapping_events_do_not_create_phantom_gaps() {
        let finder = finder_with(vec![
            event("evt-1", "2026-03-02T09:00:00Z", "2026-03-02T12:00:00Z"),
            event("evt-2", "2026-03-02T10:00:00Z", "2026-03-02T11:00:00Z"),
        ]);
        let days = finder
            .find_free_time(
                date("2026-03-02"),
                date("2026-03-02"),
                30,
                &WorkingHours::default(),
                None,
            )
            .await
            .expect("scan");
        let slots = &days[0].slots;
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].ends_at, fixed_time("2026-03-02T09:00:00Z"));
        assert_eq!(slots[1].starts_at, fixed_time("2026-03-02T12:00:00Z"));
    }

    #[tokio::test]
    async fn next_slot_discards_start_day_gaps_before_from() {
        let finder = finder_with(vec![event(
            "evt-1",
            "2026-03-02T10:00:00Z",
            "2026-03-02T11:00:00Z",
        )]);
        let slot = finder
            .find_next_available_slot(
                60,
                fixed_time("2026-03-02T10:00:00Z"),
                7,
                &WorkingHours::default(),
                None,
            )
            .await
            .expect("scan")
            .expect("slot found");
        // the 08:00 gap starts before `from` and is discarded wholesale
        assert_eq!(slot.starts_at, fixed_time("2026-03-02T11:00:00Z"));
    }

    #[tokio::test]
    async fn suggestions_are_truncated_and_capped() {
        let finder = finder_with(vec![
            event("evt-1", "2026-03-02T10:00:00Z", "2026-03-02T11:00:00Z"),
            event("evt-2", "2026-03-02T15:00:00Z", "2026-03-02T16:00:00Z"),
        ]);
        let suggestions = finder
            .suggest_slots(
                45,
                fixed_time("2026-03-02T07:00:00Z"),
                2,
                DEFAULT_LOOKAHEAD_DAYS,
                &WorkingHours::default(),
                None,
            )
            .await
            .expect("scan");

        assert_eq!(suggestions.len(), 2);
        for suggestion in &suggestions {
            assert_eq!(suggestion.duration_minutes, 45);
        }
        assert_eq!(suggestions[0].starts_at, fixed_time("2026-03-02T08:00:00Z"));
        assert_eq!(suggestions[1].starts_at, fixed_time("2026-03-02T11:00:00Z"));
    }

    #[tokio::test]
    async fn scan_range_is_capped() {
        let finder = finder_with(Vec::new());
        let days = finder
            .find_free_time(
                date("2026-01-01"),
                date("2030-01-01"),
                60,
                &WorkingHours::default(),
                None,
            )
            .await
            .expect("scan");
        assert_eq!(days.len(), MAX_SCAN_DAYS as usize + 1);
    }

    proptest! {
        // Gaps are never shorter than the minimum and never leave the
        // working window.
        #[test]
        fn gaps_respect_minimum_and_window(
            windows in prop::collection::vec((6i64 * 60..23 * 60, 10i64..180), 0..6),
            min_duration in 10i64..120,
        ) {
            let runtime = tokio::runtime::Runtime::new().expect("runtime");
            runtime.block_on(async move {
                let day_start = utc_midnight(date("2026-03-02"));
                let events: Vec<_> = windows
                    .iter()
                    .enumerate()
                    .map(|(index, (offset, len))| ExternalCalendarEvent {
                        id: format!("evt-{index}"),
                        title: format!("event {index}"),
                        starts_at: day_start + Duration::minutes(*offset),
                        ends_at: day_start + Duration::minutes(offset + len),
                        calendar_id: None,
                    })
                    .collect();
                let finder = finder_with(events);
                let hours = WorkingHours::default();
                let days = finder
                    .find_free_time(date("2026-03-02"), date("2026-03-02"), min_duration, &hours, None)
                    .await
                    .expect("scan");

                let window_start = day_start + Duration::hours(8);
                let window_end = day_start + Duration::hours(22);
                for day in days {
                    for slot in day.slots {
                        assert!(slot.duration_minutes >= min_duration);
                        assert!(slot.starts_at >= window_start);
                        assert!(slot.ends_at <= window_end);
                    }
                }
            });
        }
    }
}
