use std::sync::Arc;

use crate::evaluation::Evaluator;
use crate::store::FlagStore;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FlagStore>,
    pub evaluator: Arc<Evaluator>,
}

impl AppState {
    pub fn new(store: FlagStore, evaluator: Evaluator) -> Self {
        Self {
            store: Arc::new(store),
            evaluator: Arc::new(evaluator),
        }
    }
}
