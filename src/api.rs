use std::sync::Arc;

use chrono::Utc;
use shuttle_axum::axum::{
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::query::{ListedItem, QueryError, QueryService};
use crate::summary::Summary;

#[derive(Clone)]
pub struct AppState {
    pub query: Arc<QueryService>,
    /// Default (and maximum) number of listed items.
    pub list_limit: usize,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/", get(list_recent))
        // guids are often URLs themselves, so take the rest of the path
        .route("/summary/{*guid}", get(get_summary))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiError(QueryError);

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            QueryError::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
            other => {
                warn!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

async fn list_recent(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ListedItem>>, ApiError> {
    let limit = params
        .limit
        .map_or(state.list_limit, |n| n.min(state.list_limit));
    let rows = state.query.list_recent(limit, Utc::now()).await?;
    Ok(Json(rows))
}

async fn get_summary(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Summary>, ApiError> {
    // "/summary/https://news.ycombinator.com/item?id=1": the query belongs to the guid
    let guid = match raw {
        Some(q) => format!("{guid}?{q}"),
        None => guid,
    };
    let summary = state.query.get_summary(&guid).await?;
    Ok(Json(summary))
}
