use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub upstream: UpstreamSettings,
    pub compression: CompressionSettings,
    pub summarizer: SummarizerSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    /// Base URL of the upstream messages API
    pub base_url: String,
    /// Timeout applied to each forwarded request
    pub request_timeout_secs: u64,
    /// Maximum accepted inbound body size in bytes
    pub max_request_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompressionSettings {
    /// Whether the /v1/messages route compresses payload text at all
    pub enabled: bool,
    /// Candidates below this token count are never compressed
    pub min_tokens: usize,
    /// Upper bound on cached originals before the oldest entry is evicted
    pub cache_capacity: usize,
    /// When set, the health route dumps a cache snapshot to this file
    #[serde(default)]
    pub cache_dump_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerSettings {
    /// Credential for the summarization endpoint. Absent means compression
    /// is disabled and the gateway degrades to pure pass-through.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Summarization endpoint base URL; defaults to the upstream base URL
    #[serde(default)]
    pub base_url: Option<String>,
    pub model: String,
    /// Upper bound on tokens generated per summarization call
    pub max_summary_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("application.host", "127.0.0.1")?
            .set_default("application.port", 8000)?
            .set_default("upstream.base_url", "https://api.anthropic.com")?
            .set_default("upstream.request_timeout_secs", 60)?
            .set_default("upstream.max_request_bytes", 10 * 1024 * 1024)?
            .set_default("compression.enabled", true)?
            .set_default("compression.min_tokens", 48)?
            .set_default("compression.cache_capacity", 4096)?
            .set_default("summarizer.model", "claude-3-5-haiku-latest")?
            .set_default("summarizer.max_summary_tokens", 1024)?
            .set_default("summarizer.timeout_secs", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            // Add configuration file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("TOKENGATE").separator("__"))
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;

        // The summarizer credential also honors the provider's conventional
        // environment variable; an empty value counts as absent.
        if settings.summarizer.api_key.is_none() {
            settings.summarizer.api_key = env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|key| !key.is_empty());
        }

        Ok(settings)
    }

    /// Endpoint base for summarization calls
    pub fn summarizer_base_url(&self) -> &str {
        self.summarizer
            .base_url
            .as_deref()
            .unwrap_or(&self.upstream.base_url)
    }
}
