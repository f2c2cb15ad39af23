pub mod db;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod registration;
pub mod scheduler;
pub mod stability;
pub mod store;
pub mod tracker;
pub mod vocabulary;

pub use crate::db::Database;
pub use crate::errors::{AppError, AppResult};
pub use crate::gateway::{MemoryGateway, SnapshotGateway};
pub use crate::models::{
    AppSettings, Event, EventKind, Link, LinkSummary, Snapshot, SnapshotPayload, SnapshotReceipt, TrackerView,
};
pub use crate::registration::{CommitOutcome, RegistrationFlow, RegistrationState};
pub use crate::stability::StabilityScore;
pub use crate::store::StateStore;
pub use crate::tracker::TrackerCore;
pub use crate::vocabulary::{vocabulary, Vocabulary};

use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Opens `<data_dir>/state.sqlite` and builds a tracker on top of it using the
/// stored settings. The tracker is not started or bootstrapped yet.
pub fn open_sqlite_tracker(app_data_dir: &Path) -> AppResult<(Arc<TrackerCore>, Arc<Database>)> {
    let db = Arc::new(Database::new(&app_data_dir.join("state.sqlite"))?);
    let settings = db.get_settings()?;
    let tracker = TrackerCore::new(db.clone(), settings);
    Ok((tracker, db))
}

pub fn init_tracing(app_data_dir: &Path, verbose: bool) -> Result<(), String> {
    let log_dir = app_data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "tracker.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
