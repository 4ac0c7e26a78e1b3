//! SQLite-backed [`DocumentStore`].
//!
//! Each analysis slot write is a single `INSERT OR REPLACE`, so a slot can
//! never be observed half-written; concurrent re-analysis of the same
//! (document, kind) is last-write-wins.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::config::DbConfig;
use crate::models::{
    AnalysisKind, AnalysisRecord, AnalysisStatus, SourceDocument, StorageRef,
    ANALYSIS_SCHEMA_VERSION,
};
use crate::store::DocumentStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the configured database file, creating it (and any missing
    /// parent directories) on first use. WAL keeps analysis-slot reads
    /// available while another request is writing.
    pub async fn connect(db: &DbConfig) -> Result<Self> {
        if let Some(parent) = db.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // One writer plus a few concurrent slot readers is all this
        // workload needs.
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open {}", db.path.display()))?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<SourceDocument> {
    let storage_json: Option<String> = row.get("storage_json");
    let storage: Option<StorageRef> = match storage_json {
        Some(json) => Some(serde_json::from_str(&json).context("invalid storage_json")?),
        None => None,
    };
    Ok(SourceDocument {
        id: row.get("id"),
        storage,
        mime_type: row.get("mime_type"),
        original_name: row.get("original_name"),
        byte_size: row.get("byte_size"),
        text_content: row.get("text_content"),
    })
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<AnalysisRecord> {
    let kind_str: String = row.get("kind");
    let kind = AnalysisKind::parse(&kind_str)
        .ok_or_else(|| anyhow::anyhow!("unknown analysis kind in store: {}", kind_str))?;
    let status_str: String = row.get("status");
    let status = AnalysisStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown analysis status in store: {}", status_str))?;
    let result_json: Option<String> = row.get("result_json");
    let result = match result_json {
        Some(json) => Some(serde_json::from_str(&json).context("invalid result_json")?),
        None => None,
    };
    let analyzed_at: Option<i64> = row.get("analyzed_at");
    Ok(AnalysisRecord {
        kind,
        status,
        result,
        analyzed_at: analyzed_at.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        schema_version: row.get("schema_version"),
    })
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Option<SourceDocument>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_document(&r)).transpose()
    }

    async fn insert(&self, doc: &SourceDocument) -> Result<()> {
        let storage_json = doc
            .storage
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO documents
                (id, storage_json, mime_type, original_name, byte_size, text_content, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(storage_json)
        .bind(&doc.mime_type)
        .bind(&doc.original_name)
        .bind(doc.byte_size)
        .bind(&doc.text_content)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_analysis_status(
        &self,
        id: &str,
        kind: AnalysisKind,
        status: AnalysisStatus,
    ) -> Result<()> {
        // Upsert the slot; a Failed transition clears any prior payload so
        // no partial result survives.
        sqlx::query(
            r#"
            INSERT INTO analyses (document_id, kind, status, result_json, analyzed_at, schema_version)
            VALUES (?, ?, ?, NULL, NULL, ?)
            ON CONFLICT (document_id, kind) DO UPDATE SET
                status = excluded.status,
                result_json = CASE WHEN excluded.status = 'failed' THEN NULL ELSE analyses.result_json END
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(status.as_str())
        .bind(ANALYSIS_SCHEMA_VERSION)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put_analysis(&self, id: &str, record: &AnalysisRecord) -> Result<()> {
        let result_json = record
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO analyses
                (document_id, kind, status, result_json, analyzed_at, schema_version)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(record.kind.as_str())
        .bind(record.status.as_str())
        .bind(result_json)
        .bind(record.analyzed_at.map(|dt| dt.timestamp()))
        .bind(&record.schema_version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_analysis(
        &self,
        id: &str,
        kind: AnalysisKind,
    ) -> Result<Option<AnalysisRecord>> {
        let row = sqlx::query("SELECT * FROM analyses WHERE document_id = ? AND kind = ?")
            .bind(id)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_record(&r)).transpose()
    }
}
