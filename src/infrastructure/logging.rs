use crate::infrastructure::error::InfraError;
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();
static LOGGER_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

const DEFAULT_LOG_DIRECTIVES: &str = "info,questcal=debug";

/// Initialize tracing once: env-filtered, with a human-readable stderr layer
/// and a daily-rolled file in `logs_dir`. Subsequent calls are no-ops.
pub fn init_logging(logs_dir: &Path) -> Result<(), InfraError> {
    LOGGER_INIT
        .get_or_try_init(|| {
            std::fs::create_dir_all(logs_dir)?;

            let file_appender = tracing_appender::rolling::daily(logs_dir, "questcal.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let env_filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_DIRECTIVES))
                .map_err(|error| {
                    InfraError::InvalidConfig(format!("invalid log directives: {error}"))
                })?;

            LOGGER_GUARD
                .set(guard)
                .map_err(|_| InfraError::InvalidConfig("logger already initialized".to_string()))?;

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .with(fmt::layer().with_target(false))
                .init();

            Ok(())
        })
        .map(|_| ())
}
