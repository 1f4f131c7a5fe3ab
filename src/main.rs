//! Headless sweep daemon: bootstraps the workspace and runs the expiry and
//! recurrence sweep on a fixed interval. This scheduler owns the mutual
//! exclusion between periodic and manually triggered sweeps.

use questcal::application::bootstrap::bootstrap_workspace;
use questcal::application::expiry_sweep::ExpirySweepService;
use questcal::infrastructure::calendar_gateway::RestCalendarGateway;
use questcal::infrastructure::config::{
    read_busy_calendar_ids, read_quests_calendar_id, read_sweep_interval_minutes,
    read_working_hours,
};
use questcal::infrastructure::credential_store::KeyringCredentialStore;
use questcal::infrastructure::link_store::SqliteCalendarLinkStore;
use questcal::infrastructure::logging::init_logging;
use questcal::infrastructure::sweep_state::SqliteSweepStateRepository;
use questcal::infrastructure::task_store::SqliteTaskStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const WORKSPACE_ENV: &str = "QUESTCAL_HOME";
const FULL_SWEEP_ENV: &str = "QUESTCAL_FULL_SWEEP";

#[tokio::main]
async fn main() {
    let workspace_root = std::env::var_os(WORKSPACE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().expect("failed to resolve current directory"));

    let bootstrap =
        bootstrap_workspace(&workspace_root).expect("failed to bootstrap workspace");
    init_logging(&bootstrap.logs_dir).expect("failed to initialize logging");
    info!(workspace = %bootstrap.workspace_root.display(), "questcal sweep daemon starting");

    let working_hours =
        read_working_hours(&bootstrap.config_dir).expect("invalid scheduling config");
    let interval_minutes =
        read_sweep_interval_minutes(&bootstrap.config_dir).expect("invalid scheduling config");
    let quests_calendar_id =
        read_quests_calendar_id(&bootstrap.config_dir).expect("invalid calendars config");
    let busy_calendar_ids =
        read_busy_calendar_ids(&bootstrap.config_dir).expect("invalid calendars config");

    let gateway = Arc::new(RestCalendarGateway::new(
        KeyringCredentialStore::default(),
        quests_calendar_id,
        busy_calendar_ids,
    ));
    let tasks = Arc::new(SqliteTaskStore::new(&bootstrap.database_path));
    let links = Arc::new(SqliteCalendarLinkStore::new(&bootstrap.database_path));
    let sweep_state = Arc::new(SqliteSweepStateRepository::new(&bootstrap.database_path));

    let service = ExpirySweepService::new(gateway, tasks, links, sweep_state)
        .with_working_hours(working_hours);

    // A sweep must never run concurrently with another sweep; the flag in
    // sweep_state is advisory for other processes, this lock is the real
    // guard inside this one.
    let sweep_lock = Mutex::new(());
    let mut force_full_check = std::env::var_os(FULL_SWEEP_ENV).is_some();

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
    loop {
        ticker.tick().await;
        let Ok(_guard) = sweep_lock.try_lock() else {
            warn!("previous sweep still running; skipping this tick");
            continue;
        };
        match service.sweep(force_full_check).await {
            Ok(summary) => {
                info!(
                    expired = summary.expired,
                    deleted = summary.deleted,
                    recurring_created = summary.recurring_created,
                    "sweep tick complete"
                );
            }
            Err(sweep_error) => error!(%sweep_error, "sweep tick failed"),
        }
        force_full_check = false;
    }
}
