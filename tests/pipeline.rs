//! End-to-end pipeline tests over an in-memory store and a scripted
//! completion backend: no network, no SQLite file, no real model.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use briefwork::completion::{CompletionClient, CompletionParams};
use briefwork::config::{AnalysisConfig, CompletionConfig, StorageConfig};
use briefwork::error::{PipelineError, UpstreamError};
use briefwork::fetch::Fetcher;
use briefwork::models::{
    AnalysisKind, AnalysisRequest, AnalysisStatus, SourceDocument, StorageRef,
};
use briefwork::pipeline::Pipeline;
use briefwork::prompt::Prompt;
use briefwork::store::{DocumentStore, MemoryStore};

/// Scripted backend: pops one canned response per call and records every
/// prompt it receives.
struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn prompt(&self, i: usize) -> Prompt {
        self.prompts.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        prompt: &Prompt,
        _params: &CompletionParams,
    ) -> Result<String, UpstreamError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(UpstreamError::RateLimited(msg)),
            None => panic!("scripted client ran out of responses"),
        }
    }
}

fn make_pipeline(
    store: Arc<MemoryStore>,
    llm: Arc<ScriptedClient>,
    analysis: AnalysisConfig,
) -> Pipeline {
    let fetcher = Fetcher::new(&StorageConfig::default(), Duration::from_secs(5));
    Pipeline::new(
        store,
        fetcher,
        llm,
        CompletionConfig::default(),
        analysis,
    )
}

fn inline_doc(id: &str, text: &str) -> SourceDocument {
    SourceDocument {
        id: id.to_string(),
        storage: None,
        mime_type: "text/plain".to_string(),
        original_name: "agreement.txt".to_string(),
        byte_size: text.len() as i64,
        text_content: Some(text.to_string()),
    }
}

fn request(id: &str, kind: AnalysisKind) -> AnalysisRequest {
    AnalysisRequest {
        document_id: id.to_string(),
        kind,
        question: None,
    }
}

#[tokio::test]
async fn clause_extraction_persists_structured_result() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert(&inline_doc("d1", "This Agreement may be terminated on 30 days notice."))
        .await
        .unwrap();

    let llm = ScriptedClient::new(vec![Ok(
        r#"{"clauses": [{"type": "Termination", "found": true, "riskLevel": "Medium"}], "missingClauses": []}"#,
    )]);
    let pipeline = make_pipeline(store.clone(), llm.clone(), AnalysisConfig::default());

    let outcome = pipeline
        .analyze(request("d1", AnalysisKind::ClauseExtraction))
        .await
        .unwrap();

    assert_eq!(outcome.result["clauses"][0]["type"], "Termination");
    assert_eq!(llm.call_count(), 1);

    let slot = store
        .get_analysis("d1", AnalysisKind::ClauseExtraction)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(slot.status, AnalysisStatus::Analyzed);
    assert!(slot.analyzed_at.is_some());
    assert_eq!(slot.schema_version, "1.0");
    assert_eq!(slot.result.unwrap()["clauses"][0]["riskLevel"], "Medium");
}

#[tokio::test]
async fn empty_question_rejected_before_any_model_call() {
    let store = Arc::new(MemoryStore::new());
    store.insert(&inline_doc("d1", "body")).await.unwrap();

    let llm = ScriptedClient::new(vec![Ok("never used")]);
    let pipeline = make_pipeline(store.clone(), llm.clone(), AnalysisConfig::default());

    let err = pipeline
        .analyze(AnalysisRequest {
            document_id: "d1".to_string(),
            kind: AnalysisKind::DocumentQa,
            question: Some("   ".to_string()),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(llm.call_count(), 0);
    // Nothing was written to the slot either.
    assert!(store
        .get_analysis("d1", AnalysisKind::DocumentQa)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn upstream_failure_marks_slot_failed_with_no_partial_result() {
    let store = Arc::new(MemoryStore::new());
    store.insert(&inline_doc("d1", "body")).await.unwrap();

    let llm = ScriptedClient::new(vec![Err("quota exhausted")]);
    let pipeline = make_pipeline(store.clone(), llm.clone(), AnalysisConfig::default());

    let err = pipeline
        .analyze(request("d1", AnalysisKind::RiskAssessment))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Upstream(UpstreamError::RateLimited(_))
    ));

    let slot = store
        .get_analysis("d1", AnalysisKind::RiskAssessment)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(slot.status, AnalysisStatus::Failed);
    assert!(slot.result.is_none());
}

#[tokio::test]
async fn unknown_document_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let llm = ScriptedClient::new(vec![]);
    let pipeline = make_pipeline(store, llm.clone(), AnalysisConfig::default());

    let err = pipeline
        .analyze(request("ghost", AnalysisKind::Comprehensive))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::DocumentNotFound(id) if id == "ghost"));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn long_content_is_truncated_with_notice_in_prompt() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert(&inline_doc("d1", &"x".repeat(500)))
        .await
        .unwrap();

    let llm = ScriptedClient::new(vec![Ok(r#"{"analysis": "ok"}"#)]);
    let analysis = AnalysisConfig {
        max_content_chars: 100,
        ..AnalysisConfig::default()
    };
    let pipeline = make_pipeline(store, llm.clone(), analysis);

    pipeline
        .analyze(request("d1", AnalysisKind::Comprehensive))
        .await
        .unwrap();

    let prompt = llm.prompt(0);
    assert!(prompt.user.contains(
        "[Content truncated due to length. Only the first 100 characters are shown.]"
    ));
    // Content body itself was cut to the budget.
    assert!(!prompt.user.contains(&"x".repeat(101)));
}

#[tokio::test]
async fn long_summarization_chunks_then_merges() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert(&inline_doc("d1", &"a".repeat(120)))
        .await
        .unwrap();

    // Two chunk summaries, then the merge call.
    let llm = ScriptedClient::new(vec![
        Ok("first half covers delivery terms"),
        Ok("second half covers payment terms"),
        Ok("the agreement covers delivery and payment terms"),
    ]);
    let analysis = AnalysisConfig {
        chunk_chars: 100,
        ..AnalysisConfig::default()
    };
    let pipeline = make_pipeline(store.clone(), llm.clone(), analysis);

    let outcome = pipeline
        .analyze(request("d1", AnalysisKind::Summarization))
        .await
        .unwrap();

    assert_eq!(llm.call_count(), 3);
    assert_eq!(
        outcome.result["summary"],
        "the agreement covers delivery and payment terms"
    );
    let merge = llm.prompt(2);
    assert!(merge.user.contains("Combine these summaries"));
    assert!(merge.user.contains("delivery terms"));
    assert!(merge.user.contains("payment terms"));
}

#[tokio::test]
async fn single_chunk_summarization_sends_full_text() {
    // Over the per-prompt content cap (8k) but under the chunk budget
    // (12k): the whole document goes out in one untruncated call.
    let text = format!("{}governing law of Delaware", "a".repeat(9_000));
    let store = Arc::new(MemoryStore::new());
    store.insert(&inline_doc("d1", &text)).await.unwrap();

    let llm = ScriptedClient::new(vec![Ok("one-call summary")]);
    let pipeline = make_pipeline(store, llm.clone(), AnalysisConfig::default());

    pipeline
        .analyze(request("d1", AnalysisKind::Summarization))
        .await
        .unwrap();

    assert_eq!(llm.call_count(), 1);
    let prompt = llm.prompt(0);
    assert!(prompt.user.contains("governing law of Delaware"));
    assert!(!prompt.user.contains("[Content truncated"));
}

#[tokio::test]
async fn short_summarization_is_a_single_call() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert(&inline_doc("d1", "short lease agreement"))
        .await
        .unwrap();

    let llm = ScriptedClient::new(vec![Ok("a short lease")]);
    let pipeline = make_pipeline(store, llm.clone(), AnalysisConfig::default());

    let outcome = pipeline
        .analyze(request("d1", AnalysisKind::Summarization))
        .await
        .unwrap();
    assert_eq!(llm.call_count(), 1);
    assert_eq!(outcome.result["summary"], "a short lease");
}

#[tokio::test]
async fn garbage_model_output_degrades_instead_of_failing() {
    let store = Arc::new(MemoryStore::new());
    store.insert(&inline_doc("d1", "body")).await.unwrap();

    let llm = ScriptedClient::new(vec![Ok("I could not produce JSON, sorry.")]);
    let pipeline = make_pipeline(store.clone(), llm, AnalysisConfig::default());

    let outcome = pipeline
        .analyze(request("d1", AnalysisKind::ComplianceCheck))
        .await
        .unwrap();
    assert_eq!(outcome.result["analysis"], "I could not produce JSON, sorry.");

    let slot = store
        .get_analysis("d1", AnalysisKind::ComplianceCheck)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(slot.status, AnalysisStatus::Analyzed);
}

#[tokio::test]
async fn unsupported_upload_format_degrades_and_annotates() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("memo.docx"), b"PK\x03\x04fake").unwrap();

    let store = Arc::new(MemoryStore::new());
    store
        .insert(&SourceDocument {
            id: "d1".to_string(),
            storage: Some(StorageRef::Local {
                path: "memo.docx".into(),
            }),
            mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                .to_string(),
            original_name: "memo.docx".to_string(),
            byte_size: 9,
            text_content: None,
        })
        .await
        .unwrap();

    let llm = ScriptedClient::new(vec![Ok(r#"{"analysis": "nothing to review"}"#)]);
    let storage = StorageConfig {
        s3: None,
        local_root: Some(dir.path().to_path_buf()),
    };
    let fetcher = Fetcher::new(&storage, Duration::from_secs(5));
    let pipeline = Pipeline::new(
        store,
        fetcher,
        llm.clone(),
        CompletionConfig::default(),
        AnalysisConfig::default(),
    );

    let outcome = pipeline
        .analyze(request("d1", AnalysisKind::Comprehensive))
        .await
        .unwrap();

    // The placeholder content flowed into the prompt and the result carries
    // the extraction diagnostic.
    assert!(llm.prompt(0).user.contains("Word document content extraction"));
    assert!(outcome.result["extractionNote"]
        .as_str()
        .unwrap()
        .contains("not yet implemented"));
}

#[tokio::test]
async fn missing_source_document_bytes_abort_the_request() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert(&SourceDocument {
            id: "d1".to_string(),
            storage: None,
            mime_type: "application/pdf".to_string(),
            original_name: "gone.pdf".to_string(),
            byte_size: 0,
            text_content: None,
        })
        .await
        .unwrap();

    let llm = ScriptedClient::new(vec![]);
    let pipeline = make_pipeline(store, llm.clone(), AnalysisConfig::default());

    let err = pipeline
        .analyze(request("d1", AnalysisKind::Summarization))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn rerun_overwrites_previous_result() {
    let store = Arc::new(MemoryStore::new());
    store.insert(&inline_doc("d1", "body")).await.unwrap();

    let llm = ScriptedClient::new(vec![
        Ok(r#"{"overallRiskScore": 3}"#),
        Ok(r#"{"overallRiskScore": 8}"#),
    ]);
    let pipeline = make_pipeline(store.clone(), llm, AnalysisConfig::default());

    pipeline
        .analyze(request("d1", AnalysisKind::RiskAssessment))
        .await
        .unwrap();
    pipeline
        .analyze(request("d1", AnalysisKind::RiskAssessment))
        .await
        .unwrap();

    let slot = store
        .get_analysis("d1", AnalysisKind::RiskAssessment)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(slot.result.unwrap()["overallRiskScore"], 8);
}
