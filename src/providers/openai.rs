use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, StatusCode, multipart};
use serde::{Deserialize, Serialize};

use crate::chunker::AudioChunk;
use crate::errors::ProviderError;
use crate::language_utils::TargetLanguage;
use crate::providers::{RawSegment, Transcriber, Translator};

/// Public OpenAI API root
pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";

/// OpenAI-compatible client for transcription and chat translation
#[derive(Debug, Clone)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,

    /// Bearer token, optional for local servers
    api_key: Option<String>,

    /// API root, e.g. `https://api.openai.com/v1`
    endpoint: String,

    /// Speech-to-text model
    transcription_model: String,

    /// Chat model used for translation
    chat_model: String,

    /// System prompt with `{source_language}` and `{target_language}` placeholders
    system_prompt: String,

    /// Sampling temperature
    temperature: f32,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,

    /// Message body
    pub content: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// `verbose_json` transcription response
#[derive(Debug, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<RawSegment>,
}

impl OpenAI {
    /// Create a new client
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let endpoint = endpoint.into();
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            endpoint: if endpoint.is_empty() {
                OPENAI_ENDPOINT.to_string()
            } else {
                endpoint.trim_end_matches('/').to_string()
            },
            transcription_model: "whisper-1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            system_prompt: crate::app_config::default_system_prompt(),
            temperature: 0.3,
        }
    }

    /// Set the speech-to-text model
    pub fn transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = model.into();
        self
    }

    /// Set the chat model
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Set the system prompt template
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Fill the prompt template for one language pair
    pub fn render_system_prompt(&self, source_language: &str, target: &TargetLanguage) -> String {
        self.system_prompt
            .replace("{source_language}", source_language)
            .replace("{target_language}", &target.canonical_name)
    }

    /// Complete a chat request
    pub async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let response = self
            .authorize(self.client.post(self.url("chat/completions")))
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let response = check_status(response).await?;
        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Invalid chat completion response: {}", e)))
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_decode() {
        ProviderError::ParseError(e.to_string())
    } else {
        ProviderError::ConnectionError(e.to_string())
    }
}

/// Map a non-success HTTP status to the error taxonomy
pub fn map_status(status: StatusCode, body: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(body),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(body),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message: body,
        },
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    error!("OpenAI-compatible API error ({}): {}", status, error_text);
    Err(map_status(status, error_text))
}

#[async_trait]
impl Transcriber for OpenAI {
    async fn transcribe(&self, chunk: &AudioChunk, language: &str) -> Result<Vec<RawSegment>, ProviderError> {
        let bytes = chunk
            .payload
            .to_wav_bytes()
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to encode chunk audio: {}", e)))?;

        let file = multipart::Part::bytes(bytes)
            .file_name(format!("chunk-{}.wav", chunk.index))
            .mime_str("audio/wav")
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let mut form = multipart::Form::new()
            .part("file", file)
            .text("model", self.transcription_model.clone())
            .text("response_format", "verbose_json");
        if !language.is_empty() {
            form = form.text("language", language.to_string());
        }

        debug!("Uploading chunk {} ({:.1}s) for transcription", chunk.index, chunk.duration);
        let response = self
            .authorize(self.client.post(self.url("audio/transcriptions")))
            .multipart(form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let response = check_status(response).await?;
        let body = response
            .json::<TranscriptionResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Invalid transcription response: {}", e)))?;

        if body.segments.is_empty() && !body.text.trim().is_empty() {
            return Ok(vec![RawSegment::new(0.0, chunk.duration, body.text.trim())]);
        }
        Ok(body.segments)
    }
}

#[async_trait]
impl Translator for OpenAI {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target: &TargetLanguage,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: self.chat_model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self.render_system_prompt(source_language, target),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            temperature: Some(self.temperature),
        };

        let response = self.complete(request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| ProviderError::ParseError("Chat completion has no choices".to_string()))?;

        if content.is_empty() {
            return Err(ProviderError::ParseError("Chat completion is empty".to_string()));
        }
        Ok(content)
    }
}
