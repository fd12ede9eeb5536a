use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::merge::ConfigValue;
use crate::refresh::{CycleOutcome, RefreshController, RefreshStatus};
use crate::store::{ConfigSnapshot, ConfigStore};

/// Shared state of the admin API.
#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<ConfigStore>,
    pub controller: Arc<RefreshController>,
}

#[derive(Serialize)]
pub struct KeyValue {
    pub key: String,
    pub version: u64,
    pub value: ConfigValue,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub outcome: &'static str,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<RefreshStatus> {
    Json(state.controller.status())
}

pub async fn get_config(State(state): State<AdminState>) -> Json<ConfigSnapshot> {
    Json(state.store.current().as_ref().clone())
}

pub async fn get_key(
    State(state): State<AdminState>,
    Path(key): Path<String>,
) -> Result<Json<KeyValue>, (StatusCode, Json<ErrorBody>)> {
    let snapshot = state.store.current();
    match snapshot.value(&key) {
        Some(value) => Ok(Json(KeyValue {
            value: value.clone(),
            version: snapshot.version(),
            key,
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: format!("key '{}' not found in version {}", key, snapshot.version()),
            }),
        )),
    }
}

/// Run a cycle in the request and report how it went.
pub async fn post_refresh(
    State(state): State<AdminState>,
) -> (StatusCode, Json<RefreshResponse>) {
    let outcome = state.controller.refresh().await;
    let version = state.store.version();

    let (status, error) = match &outcome {
        CycleOutcome::Installed { .. } | CycleOutcome::Unchanged { .. } => (StatusCode::OK, None),
        CycleOutcome::Skipped => (
            StatusCode::CONFLICT,
            Some("a refresh is already in progress".to_string()),
        ),
        CycleOutcome::Failed { error, .. } => (StatusCode::BAD_GATEWAY, Some(error.to_string())),
    };

    (
        status,
        Json(RefreshResponse {
            outcome: outcome.label(),
            version,
            error,
        }),
    )
}
