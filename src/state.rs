use std::sync::Arc;

use crate::config::Config;
use crate::store::QuizStore;
use axum::extract::FromRef;

/// Handle to whichever storage backend the process was started with.
pub type SharedStore = Arc<dyn QuizStore>;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub config: Config,
}

impl FromRef<AppState> for SharedStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
