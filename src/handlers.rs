use crate::config::Config;
use crate::errors::AppError;
use crate::models::EntityKind;
use crate::registry_client::RegistryClient;
use crate::search::{uncancellable, BatchSummary, SearchOrchestrator, SearchParams};
use crate::sink::CsvSink;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Default `size` of an advanced search.
const DEFAULT_ADVANCED_SEARCH_SIZE: u32 = 1000;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Client for the Companies House API.
    pub client: RegistryClient,
    /// Runs keyword and single-company exports.
    pub orchestrator: SearchOrchestrator,
}

#[derive(Debug, Deserialize)]
pub struct SearchQueryParams {
    pub query: Option<String>,
    pub items_per_page: Option<u32>,
    pub start_index: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AdvancedSearchParams {
    pub query: Option<String>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ExportSearchRequest {
    pub keyword: String,
    pub items_per_page: Option<u32>,
    pub start_index: Option<u32>,
}

/// Body returned by the export endpoints.
#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub summary: BatchSummary,
    /// CSV files of the run, one per table.
    pub files: Vec<String>,
}

fn required_query(query: Option<String>) -> Result<String, AppError> {
    query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest("Query parameter 'query' is required".to_string()))
}

fn export_response(summary: BatchSummary, sink: &CsvSink) -> ExportResponse {
    let files = EntityKind::ALL
        .iter()
        .map(|kind| sink.path_for(*kind).display().to_string())
        .collect();
    ExportResponse { summary, files }
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-ch-retrieval",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/search
///
/// Proxies a keyword search and returns the registry's JSON unchanged.
///
/// # Returns
///
/// * `Result<Json<serde_json::Value>, AppError>` - The raw search result, 400 when
///   `query` is missing, 502 when the registry call fails.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQueryParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let query = required_query(params.query)?;
    let defaults = SearchParams::default();

    tracing::info!("GET /search - query: {}", query);

    let result = state
        .client
        .search(
            &query,
            params.items_per_page.unwrap_or(defaults.items_per_page),
            params.start_index.unwrap_or(defaults.start_index),
        )
        .await?;

    Ok(Json(result))
}

/// GET /api/v1/advanced-search
///
/// Company search by registered-office location.
pub async fn advanced_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdvancedSearchParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let location = required_query(params.query)?;
    let size = params.size.unwrap_or(DEFAULT_ADVANCED_SEARCH_SIZE);

    tracing::info!("GET /advanced-search - location: {}, size: {}", location, size);

    let result = state
        .client
        .advanced_search_by_location(&location, size)
        .await?;

    Ok(Json(result))
}

/// POST /api/v1/exports/search
///
/// Runs a keyword search and writes every matching company to the run's CSV tables.
/// Individual company failures are reported in the summary; only a failed search
/// fails the request.
pub async fn export_search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExportSearchRequest>,
) -> Result<Json<ExportResponse>, AppError> {
    tracing::info!("POST /exports/search - keyword: {}", request.keyword);

    let defaults = SearchParams::default();
    let params = SearchParams {
        items_per_page: request.items_per_page.unwrap_or(defaults.items_per_page),
        start_index: request.start_index.unwrap_or(defaults.start_index),
    };
    let data_dir = state.config.data_dir.clone();

    let (summary, sink) = state
        .orchestrator
        .run_search(
            &request.keyword,
            params,
            |run| CsvSink::create(&data_dir, run.clone()),
            uncancellable(),
        )
        .await?;

    Ok(Json(export_response(summary, &sink)))
}

/// POST /api/v1/exports/companies/:number
///
/// Writes a single company to CSV tables prefixed by its number. Responds 502 with
/// the summary when the company profile could not be retrieved.
pub async fn export_company(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<(StatusCode, Json<ExportResponse>), AppError> {
    tracing::info!("POST /exports/companies/{}", number);

    let data_dir = state.config.data_dir.clone();
    let (summary, sink) = state
        .orchestrator
        .run_company(&number, |run| CsvSink::create(&data_dir, run.clone()))
        .await?;

    let status = if summary.failed > 0 {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };

    Ok((status, Json(export_response(summary, &sink))))
}
