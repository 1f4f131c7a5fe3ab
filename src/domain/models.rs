use chrono::{DateTime, Duration, Months, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub type TaskId = i64;
pub type LinkId = i64;
pub type CategoryId = i64;
pub type ContactId = i64;

pub const DEFAULT_ESTIMATED_MINUTES: i64 = 60;
pub const MINUTES_PER_DAY: i64 = 1440;
pub const WEEKLY_INTERVAL_MINUTES: i64 = 7 * MINUTES_PER_DAY;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub estimated_minutes: i64,
    pub category_id: Option<CategoryId>,
    pub percentage: u8,
    pub parent_id: Option<TaskId>,
    pub auto_complete_parent: bool,
    pub recurrence: Option<RecurrenceRule>,
    pub calendar_event_id: Option<String>,
}

impl ScheduledTask {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "task.title")?;
        if self.estimated_minutes <= 0 {
            return Err("task.estimated_minutes must be > 0".to_string());
        }
        if !PERCENTAGE_STEPS.contains(&self.percentage) {
            return Err(format!(
                "task.percentage must be one of {PERCENTAGE_STEPS:?}, got {}",
                self.percentage
            ));
        }
        if self.parent_id == Some(self.id) {
            return Err("task.parent_id must not reference the task itself".to_string());
        }
        if let Some(rule) = &self.recurrence {
            rule.validate()?;
        }
        Ok(())
    }

    /// Visual/scheduling duration, falling back to the one-hour default.
    pub fn duration_minutes(&self) -> i64 {
        if self.estimated_minutes > 0 {
            self.estimated_minutes
        } else {
            DEFAULT_ESTIMATED_MINUTES
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Pending,
    Expired,
    Claimed,
}

impl LinkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Expired => "expired",
            Self::Claimed => "claimed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "expired" => Ok(Self::Expired),
            "claimed" => Ok(Self::Claimed),
            other => Err(format!("invalid link status value: {other}")),
        }
    }
}

/// Local record tying a task to an external calendar event and tracking
/// reward/claim state. `event_id == None` means no external event currently
/// exists for this link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarLink {
    pub id: LinkId,
    pub task_id: Option<TaskId>,
    pub event_id: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub reward_amount: i64,
    pub reward_percentage: u8,
    pub category_id: Option<CategoryId>,
    pub status: LinkStatus,
    pub rewarded: bool,
    pub delete_on_claim: bool,
    pub delete_on_expiry: bool,
    pub is_recurring: bool,
    pub recurring_task_id: Option<TaskId>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl CalendarLink {
    pub fn validate(&self) -> Result<(), String> {
        if self.ends_at <= self.starts_at {
            return Err("link.ends_at must be after link.starts_at".to_string());
        }
        if self.status == LinkStatus::Claimed && !self.rewarded {
            return Err("link.status claimed requires link.rewarded".to_string());
        }
        if self.is_recurring && self.recurring_task_id.is_none() {
            return Err("link.is_recurring requires link.recurring_task_id".to_string());
        }
        Ok(())
    }

    pub fn has_event(&self) -> bool {
        self.event_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl RecurrenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "custom" => Ok(Self::Custom),
            other => Err(format!("invalid recurrence kind value: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceTrigger {
    AfterCompletion,
    AfterExpiry,
    FixedInterval,
}

impl RecurrenceTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AfterCompletion => "after_completion",
            Self::AfterExpiry => "after_expiry",
            Self::FixedInterval => "fixed_interval",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "after_completion" => Ok(Self::AfterCompletion),
            "after_expiry" => Ok(Self::AfterExpiry),
            "fixed_interval" => Ok(Self::FixedInterval),
            other => Err(format!("invalid recurrence trigger value: {other}")),
        }
    }
}

/// Recurrence schedule for a task. The interval is always stored in minutes:
/// daily rules store days x 1440, weekly rules store a fixed 10080, monthly
/// rules store day-of-month x 1440, custom rules store the raw minute count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurrenceRule {
    pub kind: RecurrenceKind,
    pub interval_minutes: i64,
    pub weekdays: Vec<Weekday>,
    pub time_of_day: Option<NaiveTime>,
    pub trigger: RecurrenceTrigger,
}

impl RecurrenceRule {
    pub fn daily(days: i64, trigger: RecurrenceTrigger) -> Self {
        Self {
            kind: RecurrenceKind::Daily,
            interval_minutes: days.max(1) * MINUTES_PER_DAY,
            weekdays: Vec::new(),
            time_of_day: None,
            trigger,
        }
    }

    pub fn weekly(weekdays: Vec<Weekday>, trigger: RecurrenceTrigger) -> Self {
        Self {
            kind: RecurrenceKind::Weekly,
            interval_minutes: WEEKLY_INTERVAL_MINUTES,
            weekdays,
            time_of_day: None,
            trigger,
        }
    }

    pub fn monthly(day_of_month: i64, trigger: RecurrenceTrigger) -> Self {
        Self {
            kind: RecurrenceKind::Monthly,
            interval_minutes: day_of_month.clamp(1, 31) * MINUTES_PER_DAY,
            weekdays: Vec::new(),
            time_of_day: None,
            trigger,
        }
    }

    pub fn custom(minutes: i64, trigger: RecurrenceTrigger) -> Self {
        Self {
            kind: RecurrenceKind::Custom,
            interval_minutes: minutes.max(1),
            weekdays: Vec::new(),
            time_of_day: None,
            trigger,
        }
    }

    pub fn with_time_of_day(mut self, time_of_day: NaiveTime) -> Self {
        self.time_of_day = Some(time_of_day);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.interval_minutes <= 0 {
            return Err("recurrence.interval_minutes must be > 0".to_string());
        }
        if self.kind == RecurrenceKind::Weekly && self.interval_minutes != WEEKLY_INTERVAL_MINUTES {
            return Err(format!(
                "weekly recurrence must store {WEEKLY_INTERVAL_MINUTES} minutes"
            ));
        }
        if self.kind != RecurrenceKind::Weekly && !self.weekdays.is_empty() {
            return Err("recurrence.weekdays is only valid for weekly rules".to_string());
        }
        Ok(())
    }

    /// Candidate start of the next occurrence after `base`. Daily rules add
    /// their day interval, weekly rules add seven days, monthly rules add one
    /// calendar month, custom rules add the raw minute interval. The
    /// time-of-day override, when present, replaces the clock time of the
    /// advanced instant.
    pub fn next_start_after(&self, base: DateTime<Utc>) -> DateTime<Utc> {
        let advanced = match self.kind {
            RecurrenceKind::Daily => {
                base + Duration::days((self.interval_minutes / MINUTES_PER_DAY).max(1))
            }
            RecurrenceKind::Weekly => base + Duration::days(7),
            RecurrenceKind::Monthly => base
                .checked_add_months(Months::new(1))
                .unwrap_or(base + Duration::days(30)),
            RecurrenceKind::Custom => base + Duration::minutes(self.interval_minutes),
        };
        match self.time_of_day {
            Some(time) => advanced.date_naive().and_time(time).and_utc(),
            None => advanced,
        }
    }
}

/// Read-only view of a provider event. Owned by the calendar gateway; never
/// cached beyond a single operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalCalendarEvent {
    pub id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub calendar_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreeSlot {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl FreeSlot {
    pub fn new(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self {
            starts_at,
            ends_at,
            duration_minutes: (ends_at - starts_at).num_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub level: i64,
    pub emoji: Option<String>,
    pub color: Option<String>,
}

/// Working window used for slot scanning. The timezone realizes each scan
/// day's window as UTC instants, so day boundaries track DST correctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: Tz,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(8, 0, 0).expect("valid fixed time"),
            end: NaiveTime::from_hms_opt(22, 0, 0).expect("valid fixed time"),
            timezone: chrono_tz::UTC,
        }
    }
}

impl WorkingHours {
    pub fn validate(&self) -> Result<(), String> {
        if self.end <= self.start {
            return Err("working hours end must be after start".to_string());
        }
        Ok(())
    }
}

pub const PERCENTAGE_STEPS: [u8; 5] = [20, 40, 60, 80, 100];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBucket {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl PriorityBucket {
    pub fn from_percentage(percentage: u8) -> Self {
        match snap_percentage(percentage) {
            20 => Self::VeryLow,
            40 => Self::Low,
            60 => Self::Medium,
            80 => Self::High,
            _ => Self::VeryHigh,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

/// Snap an arbitrary percentage onto the 20/40/60/80/100 steps.
pub fn snap_percentage(percentage: u8) -> u8 {
    match percentage {
        0..=20 => 20,
        21..=40 => 40,
        41..=60 => 60,
        61..=80 => 80,
        _ => 100,
    }
}

/// Reward amount for a task at the given percentage and category level.
/// Uncategorized tasks use the global level 1.
pub fn reward_for(percentage: u8, level: i64) -> i64 {
    let bucket = i64::from(snap_percentage(percentage) / 20);
    bucket * 10 * level.max(1)
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
