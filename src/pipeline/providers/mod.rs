//! Provider adapters: one interface over heterogeneous LLM backends.
//!
//! Cloud backends answer with one complete body; the local Ollama backend
//! streams NDJSON fragments that are concatenated in arrival order. Every
//! failure surfaces as a `ProviderError`, which callers treat as "this case
//! could not be answered this time".

pub mod anthropic;
pub mod gemini;
pub mod http;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider is not reachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Provider returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Malformed streaming payload: {0}")]
    MalformedStream(String),

    #[error("Provider reported an error: {0}")]
    Backend(String),

    #[error("Provider returned an empty answer")]
    EmptyResponse,

    #[error("API key missing: set {0}")]
    MissingApiKey(&'static str),
}

/// Uniform query interface over every backend.
pub trait LlmProvider {
    /// Short name used in output file names and logs.
    fn nickname(&self) -> &str;

    fn model(&self) -> &str;

    /// Send one request and return the complete raw answer text.
    fn query(&self, prompt: &str, system: &str) -> Result<String, ProviderError>;
}

/// Supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" | "local" => Some(Self::Ollama),
            "openai" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "gemini" | "google" => Some(Self::Gemini),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::OpenAi => "https://api.openai.com",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => "deepseek-r1:70b",
            Self::OpenAi => "gpt-4o",
            Self::Anthropic => "claude-3-5-sonnet-20241022",
            Self::Gemini => "gemini-2.0-flash",
        }
    }

    /// Environment variable holding the API key, if the backend needs one.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            Self::Ollama => None,
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
        }
    }

    /// Published requests-per-minute quota used when none is configured.
    pub fn default_quota(&self) -> Option<u32> {
        match self {
            Self::Gemini => Some(10),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection and decoding settings shared by all backends.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub model: String,
    pub nickname: String,
    /// Pinned to 0.0 by default so repeated iterations are comparable.
    pub temperature: f32,
    /// Context window (local backend only).
    pub num_ctx: Option<u32>,
    /// Output token cap (cloud backends).
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl ProviderSettings {
    fn require_api_key(&self, var: &'static str) -> Result<String, ProviderError> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey(var))
    }
}

/// Build the adapter for `kind`.
pub fn build_provider(
    kind: ProviderKind,
    settings: ProviderSettings,
) -> Result<Box<dyn LlmProvider>, ProviderError> {
    let provider: Box<dyn LlmProvider> = match kind {
        ProviderKind::Ollama => Box::new(OllamaProvider::new(settings)?),
        ProviderKind::OpenAi => {
            let key = settings.require_api_key("OPENAI_API_KEY")?;
            Box::new(OpenAiProvider::new(settings, key)?)
        }
        ProviderKind::Anthropic => {
            let key = settings.require_api_key("ANTHROPIC_API_KEY")?;
            Box::new(AnthropicProvider::new(settings, key)?)
        }
        ProviderKind::Gemini => {
            let key = settings.require_api_key("GEMINI_API_KEY")?;
            Box::new(GeminiProvider::new(settings, key)?)
        }
    };
    Ok(provider)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn settings(kind: ProviderKind) -> ProviderSettings {
        ProviderSettings {
            base_url: kind.default_base_url().to_string(),
            model: kind.default_model().to_string(),
            nickname: kind.as_str().to_string(),
            temperature: 0.0,
            num_ctx: Some(32768),
            max_tokens: 1000,
            timeout_secs: 30,
            api_key: None,
        }
    }

    #[test]
    fn provider_kind_roundtrip() {
        for kind in [
            ProviderKind::Ollama,
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Gemini,
        ] {
            assert_eq!(ProviderKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ProviderKind::from_str("Claude"), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::from_str("mistral"), None);
    }

    #[test]
    fn provider_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ProviderKind::OpenAi).unwrap(), "\"openai\"");
        let kind: ProviderKind = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(kind, ProviderKind::Gemini);
    }

    #[test]
    fn only_gemini_has_default_quota() {
        assert_eq!(ProviderKind::Gemini.default_quota(), Some(10));
        assert_eq!(ProviderKind::Ollama.default_quota(), None);
    }

    #[test]
    fn cloud_provider_without_key_is_rejected() {
        let err = build_provider(ProviderKind::OpenAi, settings(ProviderKind::OpenAi))
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::MissingApiKey("OPENAI_API_KEY")));

        let mut blank = settings(ProviderKind::Anthropic);
        blank.api_key = Some("  ".into());
        assert!(matches!(
            build_provider(ProviderKind::Anthropic, blank),
            Err(ProviderError::MissingApiKey(_))
        ));
    }

    #[test]
    fn local_provider_needs_no_key() {
        let provider = build_provider(ProviderKind::Ollama, settings(ProviderKind::Ollama)).unwrap();
        assert_eq!(provider.nickname(), "ollama");
        assert_eq!(provider.model(), "deepseek-r1:70b");
    }

    #[test]
    fn provider_trait_is_object_safe() {
        fn _assert_provider(_: &dyn LlmProvider) {}
    }
}
