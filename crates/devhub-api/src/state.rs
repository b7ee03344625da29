use std::sync::Arc;

use tracing::error;

use devhub_db::Database;
use devhub_gateway::dispatcher::Dispatcher;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: String, dispatcher: Dispatcher) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret,
            dispatcher,
        })
    }
}

/// Run a blocking DB call off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}

/// Writes that attach a row to the caller need the caller's profile row.
pub async fn require_profile(state: &AppState, user_id: &str) -> Result<(), ApiError> {
    let id = user_id.to_string();
    if run_db(state, move |db| db.user_exists(&id)).await? {
        Ok(())
    } else {
        Err(ApiError::NotFound("Complete your profile first"))
    }
}
