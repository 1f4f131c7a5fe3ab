//! Partitions a day's 24-hour timeline into labeled occupancy segments.
//!
//! Two renderers consume this: the classified variant resolves exactly one
//! [`SegmentKind`] per interval via a fixed priority order, the legacy
//! variant emits independent boolean flags. Both share the same
//! boundary/clipping/deduplication core, so their segment boundaries always
//! agree.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::models::{
    CalendarLink, CategoryId, ExternalCalendarEvent, LinkStatus, ScheduledTask, TaskId,
    MINUTES_PER_DAY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Both an own and a foreign slot cover the interval.
    Overlap,
    Completed,
    Expired,
    CurrentTask,
    ParentTask,
    Subtask,
    ExternalEvent,
    SameCategory,
    NoCategory,
    OtherCategory,
}

impl SegmentKind {
    fn priority(self) -> u8 {
        match self {
            Self::Overlap => 10,
            Self::Completed => 9,
            Self::Expired => 8,
            Self::CurrentTask => 7,
            Self::ParentTask => 6,
            Self::Subtask => 5,
            Self::ExternalEvent => 4,
            Self::SameCategory => 3,
            Self::NoCategory => 2,
            Self::OtherCategory => 1,
        }
    }
}

/// The task/category the renderer is currently editing, used to classify
/// slots relative to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighlightContext {
    pub current_task_id: Option<TaskId>,
    pub current_category_id: Option<CategoryId>,
    pub current_parent_id: Option<TaskId>,
}

/// Which segment kinds the renderer has colors enabled for. A disabled kind
/// degrades its interval to free rather than dropping it, so the timeline
/// always tiles the full day.
#[derive(Debug, Clone)]
pub struct SegmentPalette {
    pub overlap: bool,
    pub completed: bool,
    pub expired: bool,
    pub current_task: bool,
    pub parent_task: bool,
    pub subtask: bool,
    pub external_event: bool,
    pub same_category: bool,
    pub no_category: bool,
    pub other_category: bool,
}

impl Default for SegmentPalette {
    fn default() -> Self {
        Self {
            overlap: true,
            completed: true,
            expired: true,
            current_task: true,
            parent_task: true,
            subtask: true,
            external_event: true,
            same_category: true,
            no_category: true,
            other_category: true,
        }
    }
}

impl SegmentPalette {
    fn is_enabled(&self, kind: SegmentKind) -> bool {
        match kind {
            SegmentKind::Overlap => self.overlap,
            SegmentKind::Completed => self.completed,
            SegmentKind::Expired => self.expired,
            SegmentKind::CurrentTask => self.current_task,
            SegmentKind::ParentTask => self.parent_task,
            SegmentKind::Subtask => self.subtask,
            SegmentKind::ExternalEvent => self.external_event,
            SegmentKind::SameCategory => self.same_category,
            SegmentKind::NoCategory => self.no_category,
            SegmentKind::OtherCategory => self.other_category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSegment {
    pub start_hour: f32,
    pub end_hour: f32,
    pub occupied: bool,
    pub kind: Option<SegmentKind>,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagSegment {
    pub start_hour: f32,
    pub end_hour: f32,
    pub occupied: bool,
    pub is_current: bool,
    pub same_category: bool,
    pub other_own: bool,
    pub external: bool,
    pub has_overlap: bool,
}

#[derive(Debug, Clone)]
struct DaySlot {
    start_min: i64,
    end_min: i64,
    source: SlotSource,
}

#[derive(Debug, Clone)]
enum SlotSource {
    External,
    Own {
        task_id: Option<TaskId>,
        parent_id: Option<TaskId>,
        category_id: Option<CategoryId>,
        completed: bool,
        expired: bool,
    },
}

impl DaySlot {
    fn is_own(&self) -> bool {
        matches!(self.source, SlotSource::Own { .. })
    }
}

/// Classified day partition: contiguous, sorted segments tiling `[0, 24]`,
/// each labeled with the highest-priority kind of the slots covering it.
pub fn day_occupancy(
    events: &[ExternalCalendarEvent],
    links: &[CalendarLink],
    tasks: &[ScheduledTask],
    date: NaiveDate,
    now: DateTime<Utc>,
    highlight: &HighlightContext,
    palette: &SegmentPalette,
) -> Vec<TimeSegment> {
    let slots = collect_day_slots(events, links, tasks, date, now);
    let mut raw: Vec<(i64, i64, Option<(SegmentKind, Option<CategoryId>)>)> = Vec::new();

    for (start_min, end_min, covering) in day_intervals(&slots) {
        let label = match resolve_kind(&covering, highlight) {
            Some((kind, category_id)) if palette.is_enabled(kind) => Some((kind, category_id)),
            _ => None,
        };
        push_merged(&mut raw, start_min, end_min, label);
    }

    raw.into_iter()
        .map(|(start_min, end_min, label)| TimeSegment {
            start_hour: minutes_to_hour(start_min),
            end_hour: minutes_to_hour(end_min),
            occupied: label.is_some(),
            kind: label.map(|(kind, _)| kind),
            category_id: label.and_then(|(_, category_id)| category_id),
        })
        .collect()
}

/// Legacy day partition: the same boundaries, labeled with independent
/// booleans plus a derived overlap flag (two or more distinct slot types).
pub fn day_occupancy_flags(
    events: &[ExternalCalendarEvent],
    links: &[CalendarLink],
    tasks: &[ScheduledTask],
    date: NaiveDate,
    now: DateTime<Utc>,
    highlight: &HighlightContext,
) -> Vec<FlagSegment> {
    let slots = collect_day_slots(events, links, tasks, date, now);
    let mut raw: Vec<(i64, i64, Option<Flags>)> = Vec::new();

    for (start_min, end_min, covering) in day_intervals(&slots) {
        let label = (!covering.is_empty()).then(|| resolve_flags(&covering, highlight));
        push_merged(&mut raw, start_min, end_min, label);
    }

    raw.into_iter()
        .map(|(start_min, end_min, label)| {
            let flags = label.unwrap_or_default();
            FlagSegment {
                start_hour: minutes_to_hour(start_min),
                end_hour: minutes_to_hour(end_min),
                occupied: label.is_some(),
                is_current: flags.is_current,
                same_category: flags.same_category,
                other_own: flags.other_own,
                external: flags.external,
                has_overlap: flags.distinct_count() >= 2,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    is_current: bool,
    same_category: bool,
    other_own: bool,
    external: bool,
}

impl Flags {
    fn distinct_count(self) -> usize {
        [self.is_current, self.same_category, self.other_own, self.external]
            .iter()
            .filter(|flag| **flag)
            .count()
    }
}

fn collect_day_slots(
    events: &[ExternalCalendarEvent],
    links: &[CalendarLink],
    tasks: &[ScheduledTask],
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<DaySlot> {
    let day_start = date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    let mut slots = Vec::new();

    for event in events {
        let Some((start_min, end_min)) = clip_to_day(event.starts_at, event.ends_at, day_start)
        else {
            continue;
        };
        let source = match links
            .iter()
            .find(|link| link.event_id.as_deref() == Some(event.id.as_str()))
        {
            Some(link) => SlotSource::Own {
                task_id: link.task_id,
                parent_id: link
                    .task_id
                    .and_then(|id| tasks.iter().find(|task| task.id == id))
                    .and_then(|task| task.parent_id),
                category_id: link.category_id,
                completed: link.rewarded || link.status == LinkStatus::Claimed,
                expired: link.ends_at < now && !link.rewarded,
            },
            None => SlotSource::External,
        };
        slots.push(DaySlot { start_min, end_min, source });
    }

    // Tasks already mirrored by a link are represented by their event slot
    // above; adding them again would double-count one commitment.
    for task in tasks {
        let Some(due_at) = task.due_at else { continue };
        if due_at.date_naive() != date {
            continue;
        }
        if links.iter().any(|link| link.task_id == Some(task.id)) {
            continue;
        }
        let ends_at = due_at + chrono::Duration::minutes(task.duration_minutes());
        let Some((start_min, end_min)) = clip_to_day(due_at, ends_at, day_start) else {
            continue;
        };
        slots.push(DaySlot {
            start_min,
            end_min,
            source: SlotSource::Own {
                task_id: Some(task.id),
                parent_id: task.parent_id,
                category_id: task.category_id,
                completed: task.completed,
                expired: ends_at < now && !task.completed,
            },
        });
    }

    slots
}

/// Clip `[starts_at, ends_at)` to the day beginning at `day_start`, returning
/// minute offsets in `[0, 1440]`. Midnight-spanning windows are clamped to
/// the day boundary; windows fully outside the day yield `None`.
fn clip_to_day(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    day_start: DateTime<Utc>,
) -> Option<(i64, i64)> {
    let start_min = (starts_at - day_start).num_minutes().clamp(0, MINUTES_PER_DAY);
    let end_min = (ends_at - day_start).num_minutes().clamp(0, MINUTES_PER_DAY);
    (end_min > start_min).then_some((start_min, end_min))
}

fn day_intervals(slots: &[DaySlot]) -> Vec<(i64, i64, Vec<&DaySlot>)> {
    let mut cuts = vec![0, MINUTES_PER_DAY];
    for slot in slots {
        cuts.push(slot.start_min);
        cuts.push(slot.end_min);
    }
    cuts.sort_unstable();
    cuts.dedup();

    cuts.windows(2)
        .map(|pair| {
            let (start_min, end_min) = (pair[0], pair[1]);
            let covering = slots
                .iter()
                .filter(|slot| slot.start_min < end_min && slot.end_min > start_min)
                .collect();
            (start_min, end_min, covering)
        })
        .collect()
}

fn resolve_kind(
    covering: &[&DaySlot],
    highlight: &HighlightContext,
) -> Option<(SegmentKind, Option<CategoryId>)> {
    if covering.is_empty() {
        return None;
    }
    let has_own = covering.iter().any(|slot| slot.is_own());
    let has_external = covering.iter().any(|slot| !slot.is_own());
    if has_own && has_external {
        let category_id = covering.iter().find_map(|slot| match &slot.source {
            SlotSource::Own { category_id, .. } => *category_id,
            SlotSource::External => None,
        });
        return Some((SegmentKind::Overlap, category_id));
    }

    covering
        .iter()
        .map(|slot| slot_kind(slot, highlight))
        .max_by_key(|(kind, _)| kind.priority())
}

fn slot_kind(slot: &DaySlot, highlight: &HighlightContext) -> (SegmentKind, Option<CategoryId>) {
    match &slot.source {
        SlotSource::External => (SegmentKind::ExternalEvent, None),
        SlotSource::Own { task_id, parent_id, category_id, completed, expired } => {
            let kind = if *completed {
                SegmentKind::Completed
            } else if *expired {
                SegmentKind::Expired
            } else if task_id.is_some() && *task_id == highlight.current_task_id {
                SegmentKind::CurrentTask
            } else if task_id.is_some() && *task_id == highlight.current_parent_id {
                SegmentKind::ParentTask
            } else if parent_id.is_some() && *parent_id == highlight.current_task_id {
                SegmentKind::Subtask
            } else if category_id.is_some() && *category_id == highlight.current_category_id {
                SegmentKind::SameCategory
            } else if category_id.is_none() {
                SegmentKind::NoCategory
            } else {
                SegmentKind::OtherCategory
            };
            (kind, *category_id)
        }
    }
}

fn resolve_flags(covering: &[&DaySlot], highlight: &HighlightContext) -> Flags {
    let mut flags = Flags::default();
    for slot in covering {
        match &slot.source {
            SlotSource::External => flags.external = true,
            SlotSource::Own { task_id, category_id, .. } => {
                let current = task_id.is_some() && *task_id == highlight.current_task_id;
                let same = category_id.is_some()
                    && *category_id == highlight.current_category_id;
                if current {
                    flags.is_current = true;
                } else if same {
                    flags.same_category = true;
                } else {
                    flags.other_own = true;
                }
            }
        }
    }
    flags
}

fn push_merged<L: PartialEq + Copy>(
    raw: &mut Vec<(i64, i64, L)>,
    start_min: i64,
    end_min: i64,
    label: L,
) {
    if let Some(last) = raw.last_mut() {
        if last.1 == start_min && last.2 == label {
            last.1 = end_min;
            return;
        }
    }
    raw.push((start_min, end_min, label));
}

fn minutes_to_hour(minutes: i64) -> f32 {
    minutes as f32 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
    }

    fn noon() -> DateTime<Utc> {
        fixed_time("2026-03-02T12:00:00Z")
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

    fn link_for(event_id: &str, task_id: TaskId, start: &str, end: &str) -> CalendarLink {
        CalendarLink {
            id: task_id + 100,
            task_id: Some(task_id),
            event_id: Some(event_id.to_string()),
            starts_at: fixed_time(start),
            ends_at: fixed_time(end),
            reward_amount: 10,
            reward_percentage: 20,
            category_id: Some(3),
            status: LinkStatus::Pending,
            rewarded: false,
            delete_on_claim: false,
            delete_on_expiry: false,
            is_recurring: false,
            recurring_task_id: None,
            expired_at: None,
        }
    }

    fn task(id: TaskId, due: &str, minutes: i64) -> ScheduledTask {
        ScheduledTask {
            id,
            title: format!("task {id}"),
            description: None,
            completed: false,
            completed_at: None,
            due_at: Some(fixed_time(due)),
            estimated_minutes: minutes,
            category_id: Some(3),
            percentage: 40,
            parent_id: None,
            auto_complete_parent: false,
            recurrence: None,
            calendar_event_id: None,
        }
    }

    fn assert_tiles_day(starts_and_ends: &[(f32, f32)]) {
        assert!(!starts_and_ends.is_empty());
        assert_eq!(starts_and_ends[0].0, 0.0);
        assert_eq!(starts_and_ends[starts_and_ends.len() - 1].1, 24.0);
        for pair in starts_and_ends.windows(2) {
            assert_eq!(pair[0].1, pair[1].0, "segments must be contiguous");
        }
        let total: f32 = starts_and_ends.iter().map(|(s, e)| e - s).sum();
        assert!((total - 24.0).abs() < 1e-4);
    }

    #[test]
    fn empty_day_is_one_free_segment() {
        let segments = day_occupancy(
            &[],
            &[],
            &[],
            day(),
            noon(),
            &HighlightContext::default(),
            &SegmentPalette::default(),
        );
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].occupied);
        assert_eq!(segments[0].kind, None);
        assert_tiles_day(&[(segments[0].start_hour, segments[0].end_hour)]);
    }

    #[test]
    fn foreign_event_labels_external() {
        let events = vec![event("evt-1", "2026-03-02T09:00:00Z", "2026-03-02T10:30:00Z")];
        let segments = day_occupancy(
            &events,
            &[],
            &[],
            day(),
            noon(),
            &HighlightContext::default(),
            &SegmentPalette::default(),
        );
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].kind, Some(SegmentKind::ExternalEvent));
        assert_eq!(segments[1].start_hour, 9.0);
        assert_eq!(segments[1].end_hour, 10.5);
    }

    #[test]
    fn midnight_spanning_event_is_clamped() {
        let events = vec![event("evt-1", "2026-03-01T23:00:00Z", "2026-03-02T01:00:00Z")];
        let segments = day_occupancy(
            &events,
            &[],
            &[],
            day(),
            noon(),
            &HighlightContext::default(),
            &SegmentPalette::default(),
        );
        assert_eq!(segments[0].start_hour, 0.0);
        assert_eq!(segments[0].end_hour, 1.0);
        assert_eq!(segments[0].kind, Some(SegmentKind::ExternalEvent));
    }

    #[test]
    fn own_and_foreign_slots_resolve_overlap() {
        let events = vec![
            event("evt-own", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z"),
            event("evt-foreign", "2026-03-02T09:30:00Z", "2026-03-02T11:00:00Z"),
        ];
        let links = vec![link_for("evt-own", 1, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z")];
        let segments = day_occupancy(
            &events,
            &links,
            &[],
            day(),
            fixed_time("2026-03-02T08:00:00Z"),
            &HighlightContext::default(),
            &SegmentPalette::default(),
        );
        let overlap: Vec<_> = segments
            .iter()
            .filter(|segment| segment.kind == Some(SegmentKind::Overlap))
            .collect();
        assert_eq!(overlap.len(), 1);
        assert_eq!(overlap[0].start_hour, 9.5);
        assert_eq!(overlap[0].end_hour, 10.0);
    }

    #[test]
    fn linked_task_is_not_double_counted() {
        // Event and its linked task cover the same hour; if the task were
        // added as a second slot the interval would resolve as two own slots.
        let events = vec![event("evt-own", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z")];
        let links = vec![link_for("evt-own", 1, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z")];
        let tasks = vec![task(1, "2026-03-02T09:00:00Z", 60)];
        let highlight = HighlightContext {
            current_task_id: Some(1),
            ..HighlightContext::default()
        };
        let segments = day_occupancy(
            &events,
            &links,
            &tasks,
            day(),
            fixed_time("2026-03-02T08:00:00Z"),
            &highlight,
            &SegmentPalette::default(),
        );
        assert_eq!(segments[1].kind, Some(SegmentKind::CurrentTask));
        assert!(segments.iter().all(|s| s.kind != Some(SegmentKind::Overlap)));
    }

    #[test]
    fn completed_beats_expired_and_current() {
        let events = vec![event("evt-own", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z")];
        let mut link = link_for("evt-own", 1, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        link.rewarded = true;
        link.status = LinkStatus::Claimed;
        let highlight = HighlightContext {
            current_task_id: Some(1),
            ..HighlightContext::default()
        };
        let segments = day_occupancy(
            &events,
            &[link],
            &[],
            day(),
            noon(),
            &highlight,
            &SegmentPalette::default(),
        );
        assert_eq!(segments[1].kind, Some(SegmentKind::Completed));
    }

    #[test]
    fn unclaimed_past_slot_is_expired() {
        let events = vec![event("evt-own", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z")];
        let links = vec![link_for("evt-own", 1, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z")];
        let segments = day_occupancy(
            &events,
            &links,
            &[],
            day(),
            noon(),
            &HighlightContext::default(),
            &SegmentPalette::default(),
        );
        assert_eq!(segments[1].kind, Some(SegmentKind::Expired));
    }

    #[test]
    fn parent_and_subtask_classification() {
        let tasks = vec![
            {
                let mut t = task(2, "2026-03-02T13:00:00Z", 60);
                t.parent_id = Some(1);
                t
            },
            task(3, "2026-03-02T15:00:00Z", 60),
        ];
        let highlight = HighlightContext {
            current_task_id: Some(1),
            current_parent_id: Some(3),
            current_category_id: None,
        };
        let segments = day_occupancy(
            &[],
            &[],
            &tasks,
            day(),
            fixed_time("2026-03-02T08:00:00Z"),
            &highlight,
            &SegmentPalette::default(),
        );
        let kinds: Vec<_> = segments.iter().filter_map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SegmentKind::Subtask, SegmentKind::ParentTask]);
    }

    #[test]
    fn disabled_kind_degrades_to_free() {
        let events = vec![event("evt-1", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z")];
        let palette = SegmentPalette {
            external_event: false,
            ..SegmentPalette::default()
        };
        let segments = day_occupancy(
            &events,
            &[],
            &[],
            day(),
            noon(),
            &HighlightContext::default(),
            &palette,
        );
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].occupied);
        assert_tiles_day(&[(segments[0].start_hour, segments[0].end_hour)]);
    }

    #[test]
    fn flags_variant_reports_overlap_on_two_types() {
        let events = vec![
            event("evt-own", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z"),
            event("evt-foreign", "2026-03-02T09:30:00Z", "2026-03-02T11:00:00Z"),
        ];
        let links = vec![link_for("evt-own", 1, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z")];
        let highlight = HighlightContext {
            current_task_id: Some(1),
            ..HighlightContext::default()
        };
        let segments = day_occupancy_flags(
            &events,
            &links,
            &[],
            day(),
            fixed_time("2026-03-02T08:00:00Z"),
            &highlight,
        );
        let overlapping: Vec<_> = segments.iter().filter(|s| s.has_overlap).collect();
        assert_eq!(overlapping.len(), 1);
        assert!(overlapping[0].is_current);
        assert!(overlapping[0].external);
        assert_eq!(overlapping[0].start_hour, 9.5);
    }

    #[test]
    fn both_variants_share_boundaries() {
        let events = vec![
            event("evt-1", "2026-03-02T08:15:00Z", "2026-03-02T09:45:00Z"),
            event("evt-2", "2026-03-02T09:00:00Z", "2026-03-02T11:00:00Z"),
        ];
        let tasks = vec![task(5, "2026-03-02T16:00:00Z", 45)];
        let classified = day_occupancy(
            &events,
            &[],
            &tasks,
            day(),
            noon(),
            &HighlightContext::default(),
            &SegmentPalette::default(),
        );
        let flags = day_occupancy_flags(
            &events,
            &[],
            &tasks,
            day(),
            noon(),
            &HighlightContext::default(),
        );
        let classified_bounds: Vec<_> =
            classified.iter().map(|s| (s.start_hour, s.end_hour, s.occupied)).collect();
        let flag_bounds: Vec<_> =
            flags.iter().map(|s| (s.start_hour, s.end_hour, s.occupied)).collect();
        assert_eq!(classified_bounds, flag_bounds);
    }

    proptest! {
        #[test]
        fn segments_always_tile_the_day(
            windows in prop::collection::vec((-120i64..1560, 1i64..300), 0..8),
            task_offsets in prop::collection::vec((0i64..1440, 10i64..240), 0..4),
        ) {
            let day_start = day().and_hms_opt(0, 0, 0).expect("midnight").and_utc();
            let events: Vec<_> = windows
                .iter()
                .enumerate()
                .map(|(index, (offset, len))| ExternalCalendarEvent {
                    id: format!("evt-{index}"),
                    title: format!("event {index}"),
                    starts_at: day_start + chrono::Duration::minutes(*offset),
                    ends_at: day_start + chrono::Duration::minutes(offset + len),
                    calendar_id: None,
                })
                .collect();
            let tasks: Vec<_> = task_offsets
                .iter()
                .enumerate()
                .map(|(index, (offset, len))| task(
                    index as TaskId + 1,
                    &(day_start + chrono::Duration::minutes(*offset)).to_rfc3339(),
                    *len,
                ))
                .collect();

            let segments = day_occupancy(
                &events,
                &[],
                &tasks,
                day(),
                noon(),
                &HighlightContext::default(),
                &SegmentPalette::default(),
            );
            let bounds: Vec<_> = segments.iter().map(|s| (s.start_hour, s.end_hour)).collect();
            assert_tiles_day(&bounds);
            for segment in &segments {
                prop_assert!(segment.start_hour < segment.end_hour);
                prop_assert_eq!(segment.occupied, segment.kind.is_some());
            }
        }
    }
}
