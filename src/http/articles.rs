//! Newsletter API handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::http::error::ApiError;
use crate::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::http::server::AppState;
use crate::newsletter::{Article, ArticlePatch, ArticleSummary, NewNewsletter};
use crate::store::KvStore;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArticleQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub store: &'static str,
    pub version: &'static str,
}

pub async fn list_newsletters(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<ArticleSummary>>, ApiError> {
    let settings = state.settings();
    let summaries = state
        .resolver(&settings)
        .list(query.include_archived)
        .await
        .map_err(|e| state.api_error(e))?;
    Ok(Json(summaries))
}

pub async fn get_newsletter(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Article>, ApiError> {
    let settings = state.settings();
    let resolved = state
        .resolver(&settings)
        .resolve(Some(&id))
        .await
        .map_err(|e| state.api_error(e))?;
    Ok(Json(resolved.article))
}

/// `GET /api/article?id=..`; a missing `id` is a bad request.
pub async fn get_article(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ArticleQuery>,
) -> Result<Json<Article>, ApiError> {
    let settings = state.settings();
    let resolved = state
        .resolver(&settings)
        .resolve(query.id.as_deref())
        .await
        .map_err(|e| state.api_error(e))?;
    Ok(Json(resolved.article))
}

pub async fn create_newsletter(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewNewsletter>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    let settings = state.settings();
    let article = state
        .resolver(&settings)
        .create(input)
        .await
        .map_err(|e| state.api_error(e))?;
    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn update_newsletter(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(patch): ApiJson<ArticlePatch>,
) -> Result<Json<Article>, ApiError> {
    let settings = state.settings();
    let article = state
        .resolver(&settings)
        .update_flags(Some(&id), patch)
        .await
        .map_err(|e| state.api_error(e))?;
    Ok(Json(article))
}

pub async fn delete_newsletter(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let settings = state.settings();
    state
        .resolver(&settings)
        .delete(Some(&id))
        .await
        .map_err(|e| state.api_error(e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let store = state.store.backend_name();
    let (code, status) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "Store ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };

    (
        code,
        Json(HealthStatus {
            status,
            store,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
