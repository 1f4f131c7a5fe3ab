use crate::infrastructure::config::ensure_default_configs;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
}

/// Prepare a workspace: config/state/logs directories, default config files,
/// and the SQLite schema. Safe to call on every start.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join("questcal.sqlite");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        logs_dir,
        database_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::read_working_hours;

    #[test]
    fn bootstrap_creates_workspace_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = bootstrap_workspace(dir.path()).expect("bootstrap");

        assert!(result.config_dir.join("app.json").exists());
        assert!(result.config_dir.join("calendars.json").exists());
        assert!(result.config_dir.join("scheduling.json").exists());
        assert!(result.database_path.exists());
        assert!(result.logs_dir.exists());
        assert!(read_working_hours(&result.config_dir).is_ok());

        // idempotent on a second run
        bootstrap_workspace(dir.path()).expect("second bootstrap");
    }
}
