use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthData {
    pub status: u16,
    pub environments: usize,
    pub loaded_at: DateTime<Utc>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthData> {
    let health_data = HealthData {
        status: StatusCode::OK.as_u16(),
        environments: state.store.len(),
        loaded_at: state.store.loaded_at(),
    };
    Json(health_data)
}
