//! HTTP request handlers for the analysis service.
//!
//! Submission, status polling, SSE update streams and record retrieval,
//! all delegating to the [`TaskOrchestrator`].

use crate::orchestrator::{ActiveTaskReport, LookupError, TaskKind, TaskOrchestrator};
use crate::stream::StreamEvent;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures::{Stream, StreamExt};
use marginalia_domain::{AnalysisRecord, BookId, BookSummary, DomainError, TaskSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Task orchestrator
    pub orchestrator: Arc<TaskOrchestrator>,
    /// Cancelled on shutdown; ends every open update stream
    pub shutdown: CancellationToken,
}

/// Book submission request
#[derive(Debug, Deserialize)]
pub struct BookRequest {
    /// Book identifier; surrounding whitespace is ignored
    pub book_id: String,
}

/// Response to a fetch submission
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchSubmitResponse {
    /// complete | processing
    pub status: String,
    /// Human-readable outcome
    pub message: String,
    /// Normalized book identifier
    pub book_id: String,
}

/// Response to an analysis submission
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisSubmitResponse {
    /// complete | processing | waiting_for_book | error
    pub status: String,
    /// Human-readable outcome
    pub message: String,
}

/// Body of a status query or stream event
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StatusBody {
    /// A task snapshot
    Task(TaskSnapshot),
    /// Nothing known about the book
    NotFound {
        /// Always "not_found"
        status: &'static str,
        /// Explanation
        message: &'static str,
    },
}

impl StatusBody {
    fn not_found(message: &'static str) -> Self {
        StatusBody::NotFound {
            status: "not_found",
            message,
        }
    }
}

/// Liveness response
#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    /// Liveness message
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub detail: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// The book identifier was empty
    InvalidBookId(DomainError),
    /// The record is still being produced
    InProgress(&'static str),
    /// The record does not exist
    NotFound(&'static str),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidBookId(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::InProgress(msg) => (StatusCode::ACCEPTED, msg.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.to_string()),
        };

        let body = Json(ErrorResponse { detail: message });
        (status, body).into_response()
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        AppError::InvalidBookId(e)
    }
}

/// GET / - Liveness
async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Gutenberg Book Analysis API is running".to_string(),
    })
}

/// POST /api/book - Start fetching a book
async fn submit_fetch(
    State(state): State<AppState>,
    Json(request): Json<BookRequest>,
) -> Result<Json<FetchSubmitResponse>, AppError> {
    let id = BookId::parse(&request.book_id)?;
    let submission = state.orchestrator.submit_fetch(&id);

    Ok(Json(FetchSubmitResponse {
        status: submission.status().to_string(),
        message: submission.message(TaskKind::Fetch),
        book_id: id.to_string(),
    }))
}

/// POST /api/analyze - Start analyzing a book
async fn submit_analysis(
    State(state): State<AppState>,
    Json(request): Json<BookRequest>,
) -> Result<Json<AnalysisSubmitResponse>, AppError> {
    let id = BookId::parse(&request.book_id)?;
    let submission = state.orchestrator.submit_analysis(&id);

    Ok(Json(AnalysisSubmitResponse {
        status: submission.status().to_string(),
        message: submission.message(TaskKind::Analysis),
    }))
}

/// GET /api/book-fetch-status/:book_id
async fn fetch_status(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<Json<StatusBody>, AppError> {
    let id = BookId::parse(&book_id)?;
    let body = match state.orchestrator.fetch_status(&id) {
        Some(snapshot) => StatusBody::Task(snapshot),
        None => StatusBody::not_found(TaskKind::Fetch.not_found_message()),
    };
    Ok(Json(body))
}

/// GET /api/analysis-status/:book_id
async fn analysis_status(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<Json<StatusBody>, AppError> {
    let id = BookId::parse(&book_id)?;
    let body = match state.orchestrator.analysis_status(&id) {
        Some(snapshot) => StatusBody::Task(snapshot),
        None => StatusBody::not_found(TaskKind::Analysis.not_found_message()),
    };
    Ok(Json(body))
}

fn sse_events(
    events: impl Stream<Item = StreamEvent> + Send + 'static,
    kind: TaskKind,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static> {
    let events = events.map(move |event| {
        let body = match event {
            StreamEvent::Update(snapshot) => StatusBody::Task(snapshot),
            StreamEvent::NotFound => StatusBody::not_found(kind.stream_not_found_message()),
        };
        Event::default().json_data(body)
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /api/fetch-stream/:book_id - SSE fetch updates
async fn fetch_stream(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = BookId::parse(&book_id)?;
    let events = state
        .orchestrator
        .stream_fetch_updates(id, state.shutdown.child_token());
    Ok(sse_events(events, TaskKind::Fetch))
}

/// GET /api/analysis-stream/:book_id - SSE analysis updates
async fn analysis_stream(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = BookId::parse(&book_id)?;
    let events = state
        .orchestrator
        .stream_analysis_updates(id, state.shutdown.child_token());
    Ok(sse_events(events, TaskKind::Analysis))
}

/// GET /api/book-content/:book_id - Metadata and preview, never the full text
async fn book_content(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<Json<BookSummary>, AppError> {
    let id = BookId::parse(&book_id)?;
    match state.orchestrator.book_summary(&id) {
        Ok(summary) => Ok(Json(summary)),
        Err(LookupError::InProgress) => Err(AppError::InProgress("Book fetch is still in progress")),
        Err(LookupError::NotFound) => Err(AppError::NotFound(
            "Book not found. Please fetch the book first.",
        )),
    }
}

/// GET /api/analysis/:book_id - Completed analysis
async fn analysis_record(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<Json<AnalysisRecord>, AppError> {
    let id = BookId::parse(&book_id)?;
    match state.orchestrator.analysis_record(&id) {
        Ok(record) => Ok(Json(AnalysisRecord::clone(&record))),
        Err(LookupError::InProgress) => Err(AppError::InProgress("Analysis is still in progress")),
        Err(LookupError::NotFound) => Err(AppError::NotFound(
            "Analysis not found. Please start an analysis first.",
        )),
    }
}

/// GET /api/active-tasks - Debug view of in-flight workers
async fn active_tasks(State(state): State<AppState>) -> Json<ActiveTaskReport> {
    Json(state.orchestrator.active_tasks())
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/active-tasks", get(active_tasks))
        .route("/api/book", post(submit_fetch))
        .route("/api/analyze", post(submit_analysis))
        .route("/api/book-fetch-status/:book_id", get(fetch_status))
        .route("/api/analysis-status/:book_id", get(analysis_status))
        .route("/api/fetch-stream/:book_id", get(fetch_stream))
        .route("/api/analysis-stream/:book_id", get(analysis_stream))
        .route("/api/book-content/:book_id", get(book_content))
        .route("/api/analysis/:book_id", get(analysis_record))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_body_shape() {
        let body = StatusBody::not_found(TaskKind::Analysis.not_found_message());
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"status": "not_found", "message": "No analysis found for this book ID"})
        );
    }

    #[test]
    fn test_task_body_is_the_snapshot() {
        let snapshot = TaskSnapshot::processing(10, "metadata_fetch", "Fetching book metadata...");
        let body = serde_json::to_value(StatusBody::Task(snapshot.clone())).unwrap();
        assert_eq!(body, serde_json::to_value(snapshot).unwrap());
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::InvalidBookId(DomainError::EmptyBookId).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InProgress("busy").into_response().status(),
            StatusCode::ACCEPTED
        );
        assert_eq!(
            AppError::NotFound("gone").into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
