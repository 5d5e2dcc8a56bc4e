use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::http::error::ApiError;
use crate::http::extract::{ApiPath, ApiQuery};
use crate::http::server::AppState;
use crate::newsletter::ProbeReport;
use crate::store::KvStore;

const DEFAULT_KEY_LIMIT: usize = 100;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugStatus {
    pub version: &'static str,
    pub store: &'static str,
    pub store_reachable: bool,
    pub resolver: ResolverConfig,
}

#[derive(Debug, Deserialize)]
pub struct KeysQuery {
    pub pattern: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct KeyListing {
    pub pattern: String,
    pub keys: Vec<String>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<DebugStatus> {
    let settings = state.settings();
    Json(DebugStatus {
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.backend_name(),
        store_reachable: state.store.ping().await.is_ok(),
        resolver: settings.resolver.clone(),
    })
}

pub async fn get_probe(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<ProbeReport>, ApiError> {
    let settings = state.settings();
    let report = state
        .resolver(&settings)
        .probe_report(Some(&id))
        .await
        .map_err(|e| state.api_error(e))?;
    Ok(Json(report))
}

pub async fn get_keys(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<KeysQuery>,
) -> Result<Json<KeyListing>, ApiError> {
    let pattern = query.pattern.unwrap_or_else(|| "*".to_string());
    let limit = query.limit.unwrap_or(DEFAULT_KEY_LIMIT);

    let mut keys = state
        .store
        .scan(&pattern, limit)
        .await
        .map_err(|e| state.api_error(e.into()))?;
    keys.sort();

    Ok(Json(KeyListing { pattern, keys }))
}
