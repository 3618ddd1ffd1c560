/*!
 * Application configuration.
 *
 * Loads, validates and saves the JSON configuration file. Command line
 * options are applied on top by the binary.
 */

use anyhow::{Context, Result, anyhow};
use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::language_utils::{self, TargetLanguage};
use crate::retry::RetryPolicy;
use crate::translation::FallbackMode;

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Spoken language of the media (ISO code)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Translation targets used when none are given on the command line
    #[serde(default)]
    pub target_languages: Vec<String>,

    /// Speech-to-text config
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: OpenAI
    #[default]
    OpenAI,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Chat model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: API root URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Max concurrent requests
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    // @field: Timeout seconds
    #[serde(default = "default_translation_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: default_model(provider_type),
            api_key: String::new(),
            endpoint: default_endpoint(provider_type),
            concurrent_requests: default_concurrent_requests(),
            timeout_secs: default_translation_timeout_secs(),
        }
    }
}

/// Speech-to-text configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranscriptionConfig {
    /// Chunk window in seconds
    #[serde(default = "default_chunk_secs")]
    pub chunk_secs: f64,

    /// Decoded sample rate
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Speech-to-text model
    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// Chunks in flight
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_transcription_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Time budget of the decode step in seconds
    #[serde(default = "default_decode_timeout_secs")]
    pub decode_timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            chunk_secs: default_chunk_secs(),
            sample_rate: default_sample_rate(),
            model: default_transcription_model(),
            concurrent_requests: default_concurrent_requests(),
            timeout_secs: default_transcription_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            ffmpeg_path: default_ffmpeg_path(),
            decode_timeout_secs: default_decode_timeout_secs(),
        }
    }
}

impl TranscriptionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_count,
            self.retry_backoff_ms,
            Duration::from_secs(self.timeout_secs),
        )
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.decode_timeout_secs)
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Text kept by units whose translation failed
    #[serde(default)]
    pub fallback: FallbackMode,

    /// Reuse translations of identical lines
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
            fallback: FallbackMode::default(),
            cache_enabled: true,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_chunk_secs() -> f64 {
    30.0
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_transcription_timeout_secs() -> u64 {
    120
}

fn default_translation_timeout_secs() -> u64 {
    60
}

fn default_decode_timeout_secs() -> u64 {
    600
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_endpoint(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::OpenAI => crate::providers::openai::OPENAI_ENDPOINT.to_string(),
        // LM Studio serves the OpenAI API on port 1234 under /v1
        TranslationProvider::LMStudio => "http://localhost:1234/v1".to_string(),
    }
}

fn default_model(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::OpenAI => "gpt-4o-mini".to_string(),
        // Users should set the model loaded in LM Studio
        TranslationProvider::LMStudio => "local-model".to_string(),
    }
}

pub fn default_system_prompt() -> String {
    "You are a professional subtitle translator. Translate the following subtitle line from {source_language} to {target_language}. Reply with the translation only, without notes or quotes.".to_string()
}

/// Configured key if set, otherwise the environment value
pub fn resolve_api_key(configured: &str, env_value: Option<String>) -> String {
    if !configured.trim().is_empty() {
        return configured.trim().to_string();
    }
    env_value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn validate_endpoint(name: &str, endpoint: &str) -> Result<()> {
    let url = Url::parse(endpoint).with_context(|| format!("Invalid {} endpoint URL: '{}'", name, endpoint))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("{} endpoint must use http or https: '{}'", name, endpoint));
    }
    Ok(())
}

impl Config {
    /// Load the config file, creating it with defaults when missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path).with_context(|| format!("Failed to open config file: {:?}", path))?;
            let config: Config = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {:?}", path))?;
        Ok(())
    }

    /// Parsed target languages
    pub fn targets(&self) -> Result<Vec<TargetLanguage>> {
        self.target_languages.iter().map(|l| TargetLanguage::parse(l)).collect()
    }

    /// English name of the source language
    pub fn source_language_name(&self) -> Result<String> {
        language_utils::get_language_name(&self.source_language)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        self.source_language_name()
            .with_context(|| format!("Invalid source language: {}", self.source_language))?;
        self.targets()?;

        let t = &self.transcription;
        if !t.chunk_secs.is_finite() || t.chunk_secs <= 0.0 || t.chunk_secs > 600.0 {
            return Err(anyhow!("transcription.chunk_secs must be in (0, 600], got {}", t.chunk_secs));
        }
        if t.sample_rate < 8_000 {
            return Err(anyhow!("transcription.sample_rate must be at least 8000, got {}", t.sample_rate));
        }
        if t.concurrent_requests == 0 || t.timeout_secs == 0 || t.decode_timeout_secs == 0 {
            return Err(anyhow!("transcription concurrency and timeouts must be positive"));
        }

        for provider in &self.translation.available_providers {
            if !provider.endpoint.is_empty() {
                validate_endpoint(&provider.provider_type, &provider.endpoint)?;
            }
            if provider.concurrent_requests == 0 {
                return Err(anyhow!("{}: concurrent_requests must be positive", provider.provider_type));
            }
        }

        if !(0.0..=2.0).contains(&self.translation.common.temperature) {
            return Err(anyhow!("translation.common.temperature must be in [0, 2]"));
        }

        if self.translation.provider == TranslationProvider::OpenAI && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for OpenAI provider (set it in the config or {})",
                API_KEY_ENV
            ));
        }

        Ok(())
    }

    /// Extra checks for commands that transcribe audio
    pub fn validate_transcription(&self) -> Result<()> {
        let endpoint = self.translation.get_transcription_endpoint();
        if endpoint.starts_with(crate::providers::openai::OPENAI_ENDPOINT)
            && self.translation.get_transcription_api_key().is_empty()
        {
            return Err(anyhow!(
                "An OpenAI API key is required for transcription (set it in the config or {})",
                API_KEY_ENV
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_languages: Vec::new(),
            transcription: TranscriptionConfig::default(),
            translation: TranslationConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    pub fn optimal_concurrent_requests(&self) -> usize {
        self.get_active_provider_config()
            .map(|p| p.concurrent_requests)
            .unwrap_or_else(default_concurrent_requests)
    }

    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        match self.get_active_provider_config() {
            Some(p) if !p.model.is_empty() => p.model.clone(),
            _ => default_model(self.provider),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        let configured = self.get_active_provider_config().map(|p| p.api_key.as_str()).unwrap_or("");
        match self.provider {
            TranslationProvider::OpenAI => resolve_api_key(configured, std::env::var(API_KEY_ENV).ok()),
            // Local servers ignore the key
            TranslationProvider::LMStudio => configured.trim().to_string(),
        }
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        match self.get_active_provider_config() {
            Some(p) if !p.endpoint.is_empty() => p.endpoint.clone(),
            _ => default_endpoint(self.provider),
        }
    }

    /// Get the per-call timeout for the active provider
    pub fn get_timeout(&self) -> Duration {
        let secs = self
            .get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or_else(default_translation_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Transcription always goes through the `openai` entry
    pub fn get_transcription_endpoint(&self) -> String {
        match self.get_provider_config(TranslationProvider::OpenAI) {
            Some(p) if !p.endpoint.is_empty() => p.endpoint.clone(),
            _ => default_endpoint(TranslationProvider::OpenAI),
        }
    }

    pub fn get_transcription_api_key(&self) -> String {
        let configured = self
            .get_provider_config(TranslationProvider::OpenAI)
            .map(|p| p.api_key.as_str())
            .unwrap_or("");
        resolve_api_key(configured, std::env::var(API_KEY_ENV).ok())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.common.retry_count, self.common.retry_backoff_ms, self.get_timeout())
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::LMStudio),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
