pub mod routes;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::evaluation::{EvaluationContext, Flag, Reason};

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub context: EvaluationContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub environment: String,
    pub evaluated_at: DateTime<Utc>,
    pub flags: HashMap<String, FlagState>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlagState {
    pub variation_key: String,
    pub reason: Reason,
}

/// Raw definitions for SDKs that evaluate locally.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlagsetResponse {
    pub environment: String,
    pub flags: Vec<Flag>,
}
