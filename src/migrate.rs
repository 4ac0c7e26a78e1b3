use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent; safe to run at every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Documents table. `storage_json` holds the serialized StorageRef, NULL
    // for inline-text documents.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            storage_json TEXT,
            mime_type TEXT NOT NULL DEFAULT 'application/octet-stream',
            original_name TEXT NOT NULL,
            byte_size INTEGER NOT NULL DEFAULT 0,
            text_content TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One analysis slot per (document, kind), overwritten on re-analysis.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            document_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'not_analyzed',
            result_json TEXT,
            analyzed_at INTEGER,
            schema_version TEXT NOT NULL DEFAULT '1.0',
            PRIMARY KEY (document_id, kind),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_analyses_document_id ON analyses(document_id)")
        .execute(pool)
        .await?;

    Ok(())
}
