//! Pipeline error taxonomy.
//!
//! Only two classes abort a request once it has started: upstream
//! completion-API failures and persistence failures. Extraction-format
//! problems are absorbed into content (see `extract`), and malformed model
//! output degrades in the parser instead of erroring.

use std::time::Duration;
use thiserror::Error;

/// Failure talking to the external completion service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),
    #[error("completion API rate limited (HTTP 429): {0}")]
    RateLimited(String),
    /// 4xx other than 429: the request itself was refused (bad API key,
    /// invalid model, oversized payload). Never retried.
    #[error("completion API rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("completion API server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },
    #[error("completion API returned a malformed or empty response: {0}")]
    Malformed(String),
}

/// A pipeline invocation failure, as surfaced to HTTP/CLI callers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad request parameters; rejected before any extraction or paid call.
    #[error("{0}")]
    Validation(String),
    /// The target document does not exist in the store.
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    /// Neither storage reference nor inline text resolves to content.
    #[error("document source unavailable: {0}")]
    SourceUnavailable(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("storage error: {0}")]
    Store(#[source] anyhow::Error),
}
