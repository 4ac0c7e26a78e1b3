//! JSON HTTP API for the analysis pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/analyze` | Analyze a stored document by ID |
//! | `POST` | `/ai-document-question` | Ask a question about a stored document |
//! | `GET`  | `/documents/{id}/analysis/{kind}` | Read back a persisted analysis slot |
//! | `POST` | `/summarize-pdf` | Summarize an uploaded file (multipart, one-shot) |
//! | `POST` | `/ai-file-question` | Ask a question about an uploaded file (multipart, one-shot) |
//! | `POST` | `/generate-document` | Draft a legal document from a transcript |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question is required for document_qa" } }
//! ```
//!
//! Error codes: `bad_request` (400), `source_unavailable` (400), `not_found`
//! (404), `upstream_error` (502), `internal` (500). Upstream model failures
//! are reported as a gateway problem, never as a client error.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! practice-management frontends.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::completion::OpenAiClient;
use crate::config::Config;
use crate::error::PipelineError;
use crate::extract::extract;
use crate::fetch::Fetcher;
use crate::migrate::run_migrations;
use crate::models::{AnalysisKind, AnalysisRequest, SourceDocument};
use crate::pipeline::{DraftRequest, Pipeline};
use crate::store_sqlite::SqliteStore;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Starts the HTTP server.
///
/// Connects to SQLite, runs migrations, wires the pipeline, and binds to
/// `[server].bind`. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = SqliteStore::connect(&config.db).await?;
    run_migrations(store.pool()).await?;

    let store = Arc::new(store);
    let fetcher = Fetcher::new(
        &config.storage,
        Duration::from_secs(config.analysis.fetch_timeout_secs),
    );
    let llm = Arc::new(OpenAiClient::new(&config.completion)?);
    let pipeline = Arc::new(Pipeline::new(
        store,
        fetcher,
        llm,
        config.completion.clone(),
        config.analysis.clone(),
    ));

    serve(config, pipeline).await
}

/// Binds and serves an already-composed pipeline. Split out from
/// [`run_server`] so embedders can substitute stores or completion backends.
pub async fn serve(config: &Config, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let state = AppState { pipeline };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/analyze", post(handle_analyze))
        .route("/ai-document-question", post(handle_document_question))
        .route("/documents/{id}/analysis/{kind}", get(handle_get_analysis))
        .route("/summarize-pdf", post(handle_summarize_upload))
        .route("/ai-file-question", post(handle_file_question))
        .route("/generate-document", post(handle_generate_document))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state);

    info!("listening on http://{}", config.server.bind);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(msg) => bad_request(msg),
            PipelineError::DocumentNotFound(id) => AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: format!("document not found: {}", id),
            },
            PipelineError::SourceUnavailable(msg) => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "source_unavailable",
                message: msg,
            },
            PipelineError::Upstream(e) => {
                error!(error = %e, "upstream completion failure");
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "upstream_error",
                    message: e.to_string(),
                }
            }
            PipelineError::Store(e) => {
                error!(error = %e, "store failure");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message: "internal storage error".to_string(),
                }
            }
        }
    }
}

// ============ GET /health ============

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

// ============ POST /analyze ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    document_id: String,
    analysis_type: Option<String>,
    question: Option<String>,
}

/// Handler for `POST /analyze`.
///
/// Runs one full analysis of a stored document and persists the result
/// slot. `analysisType` defaults to `comprehensive`.
async fn handle_analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let kind_str = body.analysis_type.as_deref().unwrap_or("comprehensive");
    let kind = AnalysisKind::parse(kind_str)
        .ok_or_else(|| bad_request(format!("unknown analysis type: {}", kind_str)))?;

    let outcome = state
        .pipeline
        .analyze(AnalysisRequest {
            document_id: body.document_id,
            kind,
            question: body.question,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "documentId": outcome.document_id,
        "analysisType": outcome.kind.as_str(),
        "result": outcome.result,
        "analysisDate": outcome.analyzed_at.to_rfc3339(),
    })))
}

// ============ POST /ai-document-question ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentQuestionBody {
    document_id: String,
    question: Option<String>,
}

/// Handler for `POST /ai-document-question`.
///
/// Question-answering against a stored document. Persists the answer in
/// the document's `document_qa` slot.
async fn handle_document_question(
    State(state): State<AppState>,
    Json(body): Json<DocumentQuestionBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let question = body.question.clone();
    let outcome = state
        .pipeline
        .analyze(AnalysisRequest {
            document_id: body.document_id,
            kind: AnalysisKind::DocumentQa,
            question,
        })
        .await?;

    Ok(Json(json!({
        "answer": outcome.result.get("answer").cloned().unwrap_or_default(),
        "documentId": outcome.document_id,
        "question": body.question,
        "timestamp": outcome.analyzed_at.to_rfc3339(),
    })))
}

// ============ GET /documents/{id}/analysis/{kind} ============

/// Handler for `GET /documents/{id}/analysis/{kind}`.
///
/// Reads back a persisted analysis slot without triggering any model call.
async fn handle_get_analysis(
    State(state): State<AppState>,
    Path((id, kind_str)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let kind = AnalysisKind::parse(&kind_str)
        .ok_or_else(|| bad_request(format!("unknown analysis type: {}", kind_str)))?;

    let record = state
        .pipeline
        .store()
        .get_analysis(&id, kind)
        .await
        .map_err(|e| AppError::from(PipelineError::Store(e)))?
        .ok_or(AppError {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: format!("no {} analysis for document {}", kind_str, id),
        })?;

    Ok(Json(json!({
        "documentId": id,
        "analysisType": record.kind.as_str(),
        "status": record.status.as_str(),
        "result": record.result,
        "analyzedAt": record.analyzed_at.map(|dt| dt.to_rfc3339()),
        "schemaVersion": record.schema_version,
    })))
}

// ============ Multipart one-shot endpoints ============

struct UploadedFile {
    bytes: Vec<u8>,
    name: String,
    mime_type: String,
}

/// Pulls the `file` part (and an optional `question` part) out of a
/// multipart body.
async fn read_upload(
    multipart: &mut Multipart,
) -> Result<(Option<UploadedFile>, Option<String>), AppError> {
    let mut file = None;
    let mut question = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;
                file = Some(UploadedFile {
                    bytes: bytes.to_vec(),
                    name,
                    mime_type,
                });
            }
            Some("question") => {
                question = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("invalid question field: {}", e)))?,
                );
            }
            _ => {}
        }
    }
    Ok((file, question))
}

fn extract_upload(file: &UploadedFile) -> String {
    // Transient document; nothing is persisted for one-shot uploads.
    let doc = SourceDocument {
        id: Uuid::new_v4().to_string(),
        storage: None,
        mime_type: file.mime_type.clone(),
        original_name: file.name.clone(),
        byte_size: file.bytes.len() as i64,
        text_content: None,
    };
    extract(&doc, &file.bytes).text
}

/// Handler for `POST /summarize-pdf`.
///
/// One-shot summarization of an uploaded file. Long uploads are summarized
/// chunk by chunk and merged.
async fn handle_summarize_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let (file, _) = read_upload(&mut multipart).await?;
    let file = file.ok_or_else(|| bad_request("file is required"))?;
    let text = extract_upload(&file);

    let summary = state.pipeline.summarize_text(&text).await?;
    Ok(Json(json!({
        "summary": summary,
        "fileName": file.name,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// Handler for `POST /ai-file-question`.
///
/// One-shot question-answering against an uploaded file.
async fn handle_file_question(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let (file, question) = read_upload(&mut multipart).await?;
    let file = file.ok_or_else(|| bad_request("file is required"))?;
    let text = extract_upload(&file);

    let result = state
        .pipeline
        .analyze_text(
            AnalysisKind::DocumentQa,
            &text,
            question.as_deref(),
            &file.name,
        )
        .await?;

    Ok(Json(json!({
        "answer": result.get("answer").cloned().unwrap_or_default(),
        "question": question,
        "fileName": file.name,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

// ============ POST /generate-document ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    transcript: String,
    document_type: Option<String>,
    title: Option<String>,
}

/// Handler for `POST /generate-document`.
///
/// Drafts a legal document from a dictation transcript and stores the
/// draft as a new inline-text document.
async fn handle_generate_document(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let outcome = state
        .pipeline
        .draft(DraftRequest {
            transcript: body.transcript,
            document_type: body.document_type,
            title: body.title,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "documentId": outcome.document_id,
            "title": outcome.title,
            "content": outcome.content,
            "documentType": outcome.document_type,
            "createdAt": outcome.created_at.to_rfc3339(),
        })),
    ))
}
