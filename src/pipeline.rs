//! Pipeline orchestrator.
//!
//! Drives one analysis request end to end: resolve document → fetch bytes →
//! extract → (chunk + merge for long summarization) → prompt → call model →
//! parse → persist → respond. Each invocation is an independent
//! request-scoped task; the only suspension points are the storage fetch
//! and the completion call, both independently bounded by timeouts.
//!
//! Failure rules:
//! - validation failures reject before any extraction or paid model call;
//! - a source that resolves to nothing at all aborts the request;
//! - unsupported/corrupted extraction degrades to placeholder content and
//!   the request proceeds, annotated;
//! - an upstream failure marks the analysis slot `failed` (no partial
//!   payload) and aborts;
//! - malformed model output never aborts — the parser degrades it.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::completion::{CompletionClient, CompletionParams};
use crate::config::{AnalysisConfig, CompletionConfig};
use crate::error::PipelineError;
use crate::extract::extract;
use crate::fetch::Fetcher;
use crate::models::{
    AnalysisKind, AnalysisRecord, AnalysisRequest, AnalysisStatus, ExtractedContent,
    ExtractionOutcome, SourceDocument, ANALYSIS_SCHEMA_VERSION,
};
use crate::parse::parse_result;
use crate::prompt::{
    build_draft_prompt, build_prompt, chunk_summary_prompt, merge_summaries_prompt, spec_for,
    DraftKind, DRAFT_MAX_TOKENS, DRAFT_TEMPERATURE,
};
use crate::store::DocumentStore;

/// Successful analysis of a stored document.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub document_id: String,
    pub kind: AnalysisKind,
    pub result: Value,
    pub analyzed_at: DateTime<Utc>,
}

/// Request to draft a legal document from a transcript.
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub transcript: String,
    pub document_type: Option<String>,
    pub title: Option<String>,
}

/// A drafted document, persisted as a new inline-text record.
#[derive(Debug, Clone)]
pub struct DraftOutcome {
    pub document_id: String,
    pub title: String,
    pub content: String,
    pub document_type: String,
    pub created_at: DateTime<Utc>,
}

/// The analysis pipeline. All collaborators are injected at composition
/// time; there is no ambient client state.
pub struct Pipeline {
    store: Arc<dyn DocumentStore>,
    fetcher: Fetcher,
    llm: Arc<dyn CompletionClient>,
    completion: CompletionConfig,
    analysis: AnalysisConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        fetcher: Fetcher,
        llm: Arc<dyn CompletionClient>,
        completion: CompletionConfig,
        analysis: AnalysisConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            llm,
            completion,
            analysis,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    fn params_for(&self, kind: AnalysisKind) -> CompletionParams {
        let spec = spec_for(kind);
        CompletionParams {
            model: self.completion.model.clone(),
            temperature: spec.temperature,
            max_tokens: spec.max_tokens,
        }
    }

    /// Analyze a stored document and persist the result slot.
    pub async fn analyze(&self, req: AnalysisRequest) -> Result<AnalysisOutcome, PipelineError> {
        validate(&req)?;

        let doc = self
            .store
            .get(&req.document_id)
            .await
            .map_err(PipelineError::Store)?
            .ok_or_else(|| PipelineError::DocumentNotFound(req.document_id.clone()))?;

        let content = self.resolve_content(&doc).await?;
        if content.outcome != ExtractionOutcome::Succeeded {
            warn!(
                document_id = %doc.id,
                kind = %req.kind,
                "extraction degraded, proceeding with placeholder content"
            );
        }

        self.store
            .set_analysis_status(&doc.id, req.kind, AnalysisStatus::Analyzing)
            .await
            .map_err(PipelineError::Store)?;

        let result = match self.run_model(&req, &doc, &content.text).await {
            Ok(value) => value,
            Err(e) => {
                // Don't leave the slot stuck in `analyzing`; persist no
                // partial result.
                let _ = self
                    .store
                    .set_analysis_status(&doc.id, req.kind, AnalysisStatus::Failed)
                    .await;
                return Err(e);
            }
        };

        let result = annotate_degraded(result, &content);
        let analyzed_at = Utc::now();
        let record = AnalysisRecord {
            kind: req.kind,
            status: AnalysisStatus::Analyzed,
            result: Some(result.clone()),
            analyzed_at: Some(analyzed_at),
            schema_version: ANALYSIS_SCHEMA_VERSION.to_string(),
        };
        self.store
            .put_analysis(&doc.id, &record)
            .await
            .map_err(PipelineError::Store)?;

        info!(document_id = %doc.id, kind = %req.kind, "analysis complete");
        Ok(AnalysisOutcome {
            document_id: doc.id,
            kind: req.kind,
            result,
            analyzed_at,
        })
    }

    /// Analyze already-extracted text without touching the store (used for
    /// one-shot uploads).
    pub async fn analyze_text(
        &self,
        kind: AnalysisKind,
        text: &str,
        question: Option<&str>,
        document_name: &str,
    ) -> Result<Value, PipelineError> {
        if kind == AnalysisKind::DocumentQa
            && question.map(str::trim).unwrap_or_default().is_empty()
        {
            return Err(PipelineError::Validation(
                "question is required for document_qa".to_string(),
            ));
        }
        if kind == AnalysisKind::Summarization {
            let summary = self.summarize_text(text).await?;
            return Ok(serde_json::json!({ "summary": summary }));
        }
        let prompt = build_prompt(
            kind,
            text,
            question,
            document_name,
            self.analysis.max_content_chars,
        );
        let raw = self.llm.complete(&prompt, &self.params_for(kind)).await?;
        match kind {
            AnalysisKind::DocumentQa => Ok(serde_json::json!({ "answer": raw })),
            _ => Ok(parse_result(&raw)),
        }
    }

    /// Summarize text of any length: short text in one call, long text via
    /// per-chunk summaries merged into one.
    pub async fn summarize_text(&self, text: &str) -> Result<String, PipelineError> {
        let params = self.params_for(AnalysisKind::Summarization);
        let chunks = chunk_text(text, self.analysis.chunk_chars);

        // A single chunk is already within the model budget; send it whole
        // rather than applying the per-prompt content cap.
        if chunks.len() == 1 {
            let prompt = chunk_summary_prompt(&chunks[0]);
            return Ok(self.llm.complete(&prompt, &params).await?);
        }

        info!(chunks = chunks.len(), "summarizing long document chunk by chunk");
        let mut partials = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let raw = self
                .llm
                .complete(&chunk_summary_prompt(chunk), &params)
                .await?;
            partials.push(raw);
        }
        let merged = self
            .llm
            .complete(&merge_summaries_prompt(&partials), &params)
            .await?;
        Ok(merged)
    }

    /// Draft a legal document from a transcript and persist it as a new
    /// inline-text document.
    pub async fn draft(&self, req: DraftRequest) -> Result<DraftOutcome, PipelineError> {
        if req.transcript.trim().is_empty() {
            return Err(PipelineError::Validation(
                "transcript is required".to_string(),
            ));
        }

        let kind = DraftKind::parse(req.document_type.as_deref().unwrap_or("custom"));
        let title = req
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Legal Document".to_string());
        let prompt = build_draft_prompt(kind, &req.transcript, &title);
        let params = CompletionParams {
            model: self.completion.draft_model.clone(),
            temperature: DRAFT_TEMPERATURE,
            max_tokens: DRAFT_MAX_TOKENS,
        };
        let content = self.llm.complete(&prompt, &params).await?;

        let document_type = req
            .document_type
            .unwrap_or_else(|| "ai_generated".to_string());
        let created_at = Utc::now();
        let doc = SourceDocument {
            id: Uuid::new_v4().to_string(),
            storage: None,
            mime_type: "text/plain".to_string(),
            original_name: format!("{}.txt", title),
            byte_size: content.len() as i64,
            text_content: Some(content.clone()),
        };
        self.store
            .insert(&doc)
            .await
            .map_err(PipelineError::Store)?;

        info!(document_id = %doc.id, "drafted document from transcript");
        Ok(DraftOutcome {
            document_id: doc.id,
            title,
            content,
            document_type,
            created_at,
        })
    }

    /// Resolve a document to analyzable text: inline text, or fetched and
    /// extracted bytes. Extraction failures degrade; a source that resolves
    /// to nothing is fatal.
    async fn resolve_content(
        &self,
        doc: &SourceDocument,
    ) -> Result<ExtractedContent, PipelineError> {
        if let Some(text) = &doc.text_content {
            return Ok(ExtractedContent::ok(text.clone()));
        }
        match &doc.storage {
            Some(storage) => {
                let bytes = self.fetcher.fetch(storage).await?;
                Ok(extract(doc, &bytes))
            }
            None => Err(PipelineError::SourceUnavailable(format!(
                "no file path or storage location found for document {}",
                doc.id
            ))),
        }
    }

    async fn run_model(
        &self,
        req: &AnalysisRequest,
        doc: &SourceDocument,
        text: &str,
    ) -> Result<Value, PipelineError> {
        match req.kind {
            AnalysisKind::Summarization => {
                let summary = self.summarize_text(text).await?;
                Ok(serde_json::json!({ "summary": summary }))
            }
            AnalysisKind::DocumentQa => {
                let prompt = build_prompt(
                    req.kind,
                    text,
                    req.question.as_deref(),
                    &doc.original_name,
                    self.analysis.max_content_chars,
                );
                let answer = self.llm.complete(&prompt, &self.params_for(req.kind)).await?;
                Ok(serde_json::json!({
                    "answer": answer,
                    "question": req.question.clone(),
                }))
            }
            _ => {
                let prompt = build_prompt(
                    req.kind,
                    text,
                    None,
                    &doc.original_name,
                    self.analysis.max_content_chars,
                );
                let raw = self.llm.complete(&prompt, &self.params_for(req.kind)).await?;
                Ok(parse_result(&raw))
            }
        }
    }
}

fn validate(req: &AnalysisRequest) -> Result<(), PipelineError> {
    if req.document_id.trim().is_empty() {
        return Err(PipelineError::Validation(
            "document ID is required".to_string(),
        ));
    }
    if req.kind == AnalysisKind::DocumentQa
        && req.question.as_deref().map(str::trim).unwrap_or_default().is_empty()
    {
        return Err(PipelineError::Validation(
            "question is required for document_qa".to_string(),
        ));
    }
    Ok(())
}

/// When extraction degraded, mark the payload so consumers can treat it as
/// informational rather than a confident analysis.
fn annotate_degraded(result: Value, content: &ExtractedContent) -> Value {
    if content.outcome == ExtractionOutcome::Succeeded {
        return result;
    }
    match result {
        Value::Object(mut map) => {
            if let Some(diag) = &content.diagnostic {
                map.insert(
                    "extractionNote".to_string(),
                    Value::String(diag.clone()),
                );
            }
            Value::Object(map)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_qa_requires_question() {
        let req = AnalysisRequest {
            document_id: "d1".to_string(),
            kind: AnalysisKind::DocumentQa,
            question: Some("   ".to_string()),
        };
        assert!(matches!(
            validate(&req),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn other_kinds_ignore_question() {
        let req = AnalysisRequest {
            document_id: "d1".to_string(),
            kind: AnalysisKind::RiskAssessment,
            question: None,
        };
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn degraded_extraction_is_annotated() {
        let content = ExtractedContent {
            text: "[placeholder]".to_string(),
            outcome: ExtractionOutcome::Corrupted,
            diagnostic: Some("PDF content extraction failed".to_string()),
        };
        let out = annotate_degraded(serde_json::json!({"analysis": "x"}), &content);
        assert_eq!(out["extractionNote"], "PDF content extraction failed");
    }

    #[test]
    fn clean_extraction_is_not_annotated() {
        let content = ExtractedContent::ok("text".to_string());
        let out = annotate_degraded(serde_json::json!({"analysis": "x"}), &content);
        assert!(out.get("extractionNote").is_none());
    }
}
