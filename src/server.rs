use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::models::{SearchQuery, DEFAULT_MIN_YEAR};
use crate::pipeline;
use crate::session::Browser;
use crate::settings::Settings;

pub struct AppState<B> {
    pub settings: Settings,
    pub browser: B,
}

#[derive(Debug, Deserialize)]
pub struct ScrapeParams {
    device_name: String,
    product_code: Option<String>,
    min_year: Option<i32>,
}

pub fn build_router<B>(state: Arc<AppState<B>>) -> Router
where
    B: Browser + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/scrape", get(scrape::<B>))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "FDA Device Problem Extraction API",
        "endpoint": "/scrape",
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "FDA Device Scraper" }))
}

fn unprocessable(detail: String) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail }))).into_response()
}

async fn scrape<B: Browser + 'static>(
    State(state): State<Arc<AppState<B>>>,
    params: Result<Query<ScrapeParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return unprocessable(rejection.body_text()),
    };
    let query = match SearchQuery::new(
        params.device_name,
        params.product_code,
        params.min_year.unwrap_or(DEFAULT_MIN_YEAR),
    ) {
        Ok(q) => q,
        Err(e) => return unprocessable(e.to_string()),
    };

    match pipeline::run(&query, &state.browser, &state.settings).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            error!("Error during scraping: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": format!("Error scraping FDA database: {}", e) })),
            )
                .into_response()
        }
    }
}

pub async fn serve<B: Browser + 'static>(state: AppState<B>) -> Result<()> {
    let bind = state.settings.bind.clone();
    let app = build_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on {}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}
