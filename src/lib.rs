//! QuestCal backend: keeps a gamified task list mirrored into the user's
//! calendar. The core is the sync engine deciding which provider operation
//! each edit requires, the free-slot and conflict scanners, the expiry and
//! recurrence sweep, and the day-occupancy partitioner.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::bootstrap_workspace;
pub use application::conflicts::ConflictDetector;
pub use application::expiry_sweep::{ExpirySweepService, SweepSummary};
pub use application::free_slots::{DailyFreeTime, FreeSlotFinder};
pub use application::sync_engine::{CalendarSyncService, SyncOutcome, UpdateRequest};
pub use application::SyncError;
pub use domain::occupancy::{day_occupancy, day_occupancy_flags, HighlightContext, SegmentPalette};
pub use domain::sync_plan::{plan_operation, CalendarOp, SyncFacts};
