use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8790".to_string()
}

/// Where document bytes can be fetched from. S3 credentials come from
/// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` environment variables.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    pub s3: Option<S3Config>,
    /// Root directory that local-path storage references are resolved
    /// against. Absolute references are used as-is.
    #[serde(default)]
    pub local_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Completion API settings. The API key comes from `OPENAI_API_KEY`.
#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for document drafting, which benefits from the larger
    /// model tier.
    #[serde(default = "default_draft_model")]
    pub draft_model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            draft_model: default_draft_model(),
            api_base: default_api_base(),
            timeout_secs: default_completion_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_draft_model() -> String {
    "gpt-4o".to_string()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Cap on document content embedded into a single prompt.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Chunk budget for long-document summarization.
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    /// Timeout for one storage fetch (S3 object or local file).
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_content_chars: default_max_content_chars(),
            chunk_chars: default_chunk_chars(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_max_content_chars() -> usize {
    crate::prompt::DEFAULT_MAX_CONTENT_CHARS
}
fn default_chunk_chars() -> usize {
    crate::chunk::DEFAULT_CHUNK_CHARS
}
fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Default configuration for commands that never touch the database,
    /// such as one-shot file analysis.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/briefwork.db"),
            },
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            completion: CompletionConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.analysis.max_content_chars == 0 {
        anyhow::bail!("analysis.max_content_chars must be > 0");
    }
    if config.analysis.chunk_chars == 0 {
        anyhow::bail!("analysis.chunk_chars must be > 0");
    }
    if config.completion.timeout_secs == 0 {
        anyhow::bail!("completion.timeout_secs must be > 0");
    }
    if let Some(s3) = &config.storage.s3 {
        if s3.bucket.is_empty() {
            anyhow::bail!("storage.s3.bucket must not be empty");
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str("[db]\npath = \"./data/briefwork.db\"\n").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8790");
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert_eq!(config.analysis.max_content_chars, 8_000);
        assert_eq!(config.analysis.chunk_chars, 12_000);
        assert!(config.storage.s3.is_none());
    }

    #[test]
    fn s3_section_parses() {
        let config: Config = toml::from_str(
            "[db]\npath = \"x.db\"\n[storage.s3]\nbucket = \"firm-docs\"\nendpoint_url = \"http://localhost:9000\"\n",
        )
        .unwrap();
        let s3 = config.storage.s3.unwrap();
        assert_eq!(s3.bucket, "firm-docs");
        assert_eq!(s3.region, "us-east-1");
        assert_eq!(s3.endpoint_url.as_deref(), Some("http://localhost:9000"));
    }
}
