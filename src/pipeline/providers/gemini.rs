use serde::{Deserialize, Serialize};

use super::http::{build_client, non_empty, read_json, send};
use super::{LlmProvider, ProviderError, ProviderSettings};

/// Google Gemini generateContent client.
///
/// Free-tier keys are limited to a handful of requests per minute; the
/// scheduler's throttle handles that, not this adapter.
pub struct GeminiProvider {
    settings: ProviderSettings,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl GeminiProvider {
    pub fn new(mut settings: ProviderSettings, api_key: String) -> Result<Self, ProviderError> {
        settings.base_url = settings.base_url.trim_end_matches('/').to_string();
        let client = build_client(settings.timeout_secs)?;
        Ok(Self {
            settings,
            api_key,
            client,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn build_request<'a>(
    settings: &ProviderSettings,
    prompt: &'a str,
    system: &'a str,
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part { text: system }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: settings.temperature,
            max_output_tokens: settings.max_tokens,
        },
    }
}

/// Text parts of the first candidate, concatenated.
fn extract_answer(response: GenerateContentResponse) -> Result<String, ProviderError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    non_empty(text)
}

impl LlmProvider for GeminiProvider {
    fn nickname(&self) -> &str {
        &self.settings.nickname
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn query(&self, prompt: &str, system: &str) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url, self.settings.model
        );
        let body = build_request(&self.settings, prompt, system);

        let response = send(
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
            &self.settings.base_url,
            self.settings.timeout_secs,
        )?;

        extract_answer(read_json(response)?)
    }
}
