//! Storage abstraction for documents and their analysis slots.
//!
//! The [`DocumentStore`] trait is the pipeline's persistence gateway. The
//! pipeline reads document metadata through it and writes back exactly one
//! analysis slot per (document, kind); everything else about document
//! lifecycle belongs to upload/intake collaborators.
//!
//! Implementations must be `Send + Sync`. [`MemoryStore`] backs tests and
//! one-shot CLI runs; the SQLite implementation lives in
//! [`store_sqlite`](crate::store_sqlite).

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AnalysisKind, AnalysisRecord, AnalysisStatus, SourceDocument};

/// Abstract document/analysis store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by ID.
    async fn get(&self, id: &str) -> Result<Option<SourceDocument>>;

    /// Insert a new document (used by drafting and one-shot CLI runs).
    async fn insert(&self, doc: &SourceDocument) -> Result<()>;

    /// Update the status of one analysis slot. `Analyzing` keeps any prior
    /// payload in place (it is about to be overwritten); `Failed` clears it
    /// so no partial result survives.
    async fn set_analysis_status(
        &self,
        id: &str,
        kind: AnalysisKind,
        status: AnalysisStatus,
    ) -> Result<()>;

    /// Overwrite one analysis slot in a single atomic write.
    async fn put_analysis(&self, id: &str, record: &AnalysisRecord) -> Result<()>;

    /// Read back one analysis slot.
    async fn get_analysis(&self, id: &str, kind: AnalysisKind)
        -> Result<Option<AnalysisRecord>>;
}

/// In-memory store for tests and one-shot CLI analysis.
pub struct MemoryStore {
    docs: RwLock<HashMap<String, SourceDocument>>,
    analyses: RwLock<HashMap<(String, AnalysisKind), AnalysisRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            analyses: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<SourceDocument>> {
        Ok(self.docs.read().unwrap().get(id).cloned())
    }

    async fn insert(&self, doc: &SourceDocument) -> Result<()> {
        self.docs
            .write()
            .unwrap()
            .insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn set_analysis_status(
        &self,
        id: &str,
        kind: AnalysisKind,
        status: AnalysisStatus,
    ) -> Result<()> {
        let mut analyses = self.analyses.write().unwrap();
        let slot = analyses
            .entry((id.to_string(), kind))
            .or_insert_with(|| AnalysisRecord {
                kind,
                status,
                result: None,
                analyzed_at: None,
                schema_version: crate::models::ANALYSIS_SCHEMA_VERSION.to_string(),
            });
        slot.status = status;
        if status == AnalysisStatus::Failed {
            slot.result = None;
        }
        Ok(())
    }

    async fn put_analysis(&self, id: &str, record: &AnalysisRecord) -> Result<()> {
        self.analyses
            .write()
            .unwrap()
            .insert((id.to_string(), record.kind), record.clone());
        Ok(())
    }

    async fn get_analysis(
        &self,
        id: &str,
        kind: AnalysisKind,
    ) -> Result<Option<AnalysisRecord>> {
        Ok(self
            .analyses
            .read()
            .unwrap()
            .get(&(id.to_string(), kind))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: &str) -> SourceDocument {
        SourceDocument {
            id: id.to_string(),
            storage: None,
            mime_type: "text/plain".to_string(),
            original_name: "inline.txt".to_string(),
            byte_size: 0,
            text_content: Some("body".to_string()),
        }
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let store = MemoryStore::new();
        store.insert(&doc("d1")).await.unwrap();
        let got = store.get("d1").await.unwrap().unwrap();
        assert_eq!(got.original_name, "inline.txt");
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_status_clears_result() {
        let store = MemoryStore::new();
        store.insert(&doc("d1")).await.unwrap();
        store
            .put_analysis(
                "d1",
                &AnalysisRecord {
                    kind: AnalysisKind::Summarization,
                    status: AnalysisStatus::Analyzed,
                    result: Some(serde_json::json!({"summary": "s"})),
                    analyzed_at: Some(Utc::now()),
                    schema_version: "1.0".to_string(),
                },
            )
            .await
            .unwrap();

        store
            .set_analysis_status("d1", AnalysisKind::Summarization, AnalysisStatus::Failed)
            .await
            .unwrap();
        let slot = store
            .get_analysis("d1", AnalysisKind::Summarization)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(slot.status, AnalysisStatus::Failed);
        assert!(slot.result.is_none());
    }

    #[tokio::test]
    async fn slots_are_independent_per_kind() {
        let store = MemoryStore::new();
        store.insert(&doc("d1")).await.unwrap();
        store
            .set_analysis_status("d1", AnalysisKind::RiskAssessment, AnalysisStatus::Analyzing)
            .await
            .unwrap();
        assert!(store
            .get_analysis("d1", AnalysisKind::ComplianceCheck)
            .await
            .unwrap()
            .is_none());
    }
}
