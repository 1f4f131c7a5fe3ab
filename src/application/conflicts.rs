use crate::application::SyncError;
use crate::domain::models::ExternalCalendarEvent;
use crate::infrastructure::calendar_gateway::{CalendarGateway, DateRange};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Reports overlaps against every calendar the gateway can see. This is a
/// warning surface for the user, deliberately broader than the working-hours
/// view the slot finder uses for automated placement.
pub struct ConflictDetector<G: CalendarGateway> {
    gateway: Arc<G>,
}

impl<G: CalendarGateway> ConflictDetector<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Events overlapping `[start, end)` under the half-open test
    /// `start < event.end && end > event.start`, fetched across the whole
    /// days the query touches.
    pub async fn find_conflicts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_event_id: Option<&str>,
    ) -> Result<Vec<ExternalCalendarEvent>, SyncError> {
        let range = DateRange {
            start: start
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .expect("midnight is always valid")
                .and_utc(),
            end: (end.date_naive() + Duration::days(1))
                .and_hms_opt(0, 0, 0)
                .expect("midnight is always valid")
                .and_utc(),
        };
        let mut conflicts: Vec<_> = self
            .gateway
            .events_in_range(range)
            .await?
            .into_iter()
            .filter(|event| Some(event.id.as_str()) != exclude_event_id)
            .filter(|event| start < event.ends_at && end > event.starts_at)
            .collect();
        conflicts.sort_by_key(|event| event.starts_at);
        Ok(conflicts)
    }

    pub async fn is_slot_free(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_event_id: Option<&str>,
    ) -> Result<bool, SyncError> {
        Ok(self
            .find_conflicts(start, end, exclude_event_id)
            .await?
            .is_empty())
    }
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

    fn event(id: &str, start: &str, end: &str) -> ExternalCalendarEvent {
        ExternalCalendarEvent {
            id: id.to_string(),
            title: format!("event {id}"),
            starts_at: fixed_time(start),
            ends_at: fixed_time(end),
            calendar_id: None,
        }
    }

    fn detector_with(events: Vec<ExternalCalendarEvent>) -> ConflictDetector<InMemoryCalendarGateway> {
        let gateway = InMemoryCalendarGateway::new();
        for event in events {
            gateway.seed_event(event);
        }
        ConflictDetector::new(Arc::new(gateway))
    }

    #[tokio::test]
    async fn overlapping_event_is_reported() {
        let detector = detector_with(vec![event(
            "evt-1",
            "2026-03-02T09:00:00Z",
            "2026-03-02T10:00:00Z",
        )]);
        let conflicts = detector
            .find_conflicts(
                fixed_time("2026-03-02T09:30:00Z"),
                fixed_time("2026-03-02T11:00:00Z"),
                None,
            )
            .await
            .expect("scan");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, "evt-1");
    }

    #[tokio::test]
    async fn touching_intervals_do_not_conflict() {
        let detector = detector_with(vec![event(
            "evt-1",
            "2026-03-02T09:00:00Z",
            "2026-03-02T10:00:00Z",
        )]);
        assert!(detector
            .is_slot_free(
                fixed_time("2026-03-02T10:00:00Z"),
                fixed_time("2026-03-02T11:00:00Z"),
                None,
            )
            .await
            .expect("scan"));
        assert!(detector
            .is_slot_free(
                fixed_time("2026-03-02T08:00:00Z"),
                fixed_time("2026-03-02T09:00:00Z"),
                None,
            )
            .await
            .expect("scan"));
    }

    #[tokio::test]
    async fn excluded_event_is_ignored() {
        let detector = detector_with(vec![event(
            "evt-own",
            "2026-03-02T09:00:00Z",
            "2026-03-02T10:00:00Z",
        )]);
        assert!(detector
            .is_slot_free(
                fixed_time("2026-03-02T09:00:00Z"),
                fixed_time("2026-03-02T10:00:00Z"),
                Some("evt-own"),
            )
            .await
            .expect("scan"));
    }

    proptest! {
        // `is_slot_free` must be exactly "no conflicts found".
        #[test]
        fn slot_free_iff_no_conflicts(
            query_offset in 0i64..1380,
            query_len in 1i64..240,
            event_offset in 0i64..1380,
            event_len in 1i64..240,
        ) {
            let runtime = tokio::runtime::Runtime::new().expect("runtime");
            runtime.block_on(async move {
                let day_start = fixed_time("2026-03-02T00:00:00Z");
                let detector = detector_with(vec![ExternalCalendarEvent {
                    id: "evt-1".to_string(),
                    title: "event".to_string(),
                    starts_at: day_start + Duration::minutes(event_offset),
                    ends_at: day_start + Duration::minutes(event_offset + event_len),
                    calendar_id: None,
                }]);

                let start = day_start + Duration::minutes(query_offset);
                let end = day_start + Duration::minutes(query_offset + query_len);
                let conflicts = detector.find_conflicts(start, end, None).await.expect("scan");
                let free = detector.is_slot_free(start, end, None).await.expect("scan");
                assert_eq!(free, conflicts.is_empty());

                let expected_overlap = query_offset < event_offset + event_len
                    && query_offset + query_len > event_offset;
                assert_eq!(!free, expected_overlap);
            });
        }
    }
}
