//! Core data models for the analysis pipeline.
//!
//! These types represent the documents, requests, and analysis results that
//! flow through extraction, prompting, and persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a document's bytes live. A document has at most one storage
/// reference; inline-text documents (transcripts, AI-generated drafts)
/// have none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageRef {
    /// Object storage (S3 or S3-compatible).
    Object { bucket: String, key: String },
    /// A file on the local filesystem.
    Local { path: PathBuf },
}

/// A stored file or inline text available for analysis.
///
/// Created by upload/intake collaborators; this pipeline only reads it and
/// writes back analysis slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub storage: Option<StorageRef>,
    pub mime_type: String,
    pub original_name: String,
    pub byte_size: i64,
    /// Inline body for documents with no backing file.
    pub text_content: Option<String>,
}

/// The closed set of LLM analysis modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum AnalysisKind {
    ClauseExtraction,
    RiskAssessment,
    ComplianceCheck,
    Comprehensive,
    DocumentQa,
    Summarization,
    ContractComparison,
}

impl AnalysisKind {
    /// The wire name used in requests, responses, and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::ClauseExtraction => "clause_extraction",
            AnalysisKind::RiskAssessment => "risk_assessment",
            AnalysisKind::ComplianceCheck => "compliance_check",
            AnalysisKind::Comprehensive => "comprehensive",
            AnalysisKind::DocumentQa => "document_qa",
            AnalysisKind::Summarization => "summarization",
            AnalysisKind::ContractComparison => "contract_comparison",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "clause_extraction" => Some(AnalysisKind::ClauseExtraction),
            "risk_assessment" => Some(AnalysisKind::RiskAssessment),
            "compliance_check" => Some(AnalysisKind::ComplianceCheck),
            "comprehensive" => Some(AnalysisKind::Comprehensive),
            "document_qa" => Some(AnalysisKind::DocumentQa),
            "summarization" => Some(AnalysisKind::Summarization),
            "contract_comparison" => Some(AnalysisKind::ContractComparison),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub document_id: String,
    pub kind: AnalysisKind,
    /// Only used (and required, non-empty) for `document_qa`.
    pub question: Option<String>,
}

/// Lifecycle of a document's analysis slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    NotAnalyzed,
    Analyzing,
    Analyzed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::NotAnalyzed => "not_analyzed",
            AnalysisStatus::Analyzing => "analyzing",
            AnalysisStatus::Analyzed => "analyzed",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_analyzed" => Some(AnalysisStatus::NotAnalyzed),
            "analyzing" => Some(AnalysisStatus::Analyzing),
            "analyzed" => Some(AnalysisStatus::Analyzed),
            "failed" => Some(AnalysisStatus::Failed),
            _ => None,
        }
    }
}

/// The persisted outcome of one analysis run. One slot per
/// (document, kind); overwritten on re-analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub kind: AnalysisKind,
    pub status: AnalysisStatus,
    /// Structured payload, or the `{"analysis": ...}` fallback wrap.
    /// Absent while `analyzing` or after a `failed` run.
    pub result: Option<serde_json::Value>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub schema_version: String,
}

/// Payload schema version stamped on every successful record.
pub const ANALYSIS_SCHEMA_VERSION: &str = "1.0";

/// How extraction of a document's bytes went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Succeeded,
    UnsupportedFormat,
    Corrupted,
}

/// Transient value produced by the extractor and consumed immediately by
/// the orchestrator. On `UnsupportedFormat`/`Corrupted`, `text` holds a
/// human-readable placeholder so the request can still proceed.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub text: String,
    pub outcome: ExtractionOutcome,
    pub diagnostic: Option<String>,
}

impl ExtractedContent {
    pub fn ok(text: String) -> Self {
        Self {
            text,
            outcome: ExtractionOutcome::Succeeded,
            diagnostic: None,
        }
    }
}
