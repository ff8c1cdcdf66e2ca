use std::path::PathBuf;
use std::sync::Arc;

use wosrewards_db::{DbPool, PlayerRegistry};
use wosrewards_job_queue::Dispatcher;

/// Shared application state passed to every route handler.
///
/// Handlers only submit and read jobs; status changes belong to the worker.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: Arc<DbPool>,
    pub dispatcher: Dispatcher,
    pub players: PlayerRegistry,
    /// Root the worker writes job artifacts under; served at `/api/jobs_data`.
    pub output_root: PathBuf,
}

impl AppState {
    /// Build a fully initialised state container from its constituent parts.
    pub fn new(db_pool: DbPool, dispatcher: Dispatcher, output_root: impl Into<PathBuf>) -> Self {
        Self {
            players: PlayerRegistry::new(db_pool.clone()),
            db_pool: Arc::new(db_pool),
            dispatcher,
            output_root: output_root.into(),
        }
    }
}
