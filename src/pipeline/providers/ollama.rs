use std::io::{BufRead, BufReader};

use serde::{Deserialize, Serialize};

use super::http::{build_client, non_empty, send};
use super::{LlmProvider, ProviderError, ProviderSettings};

/// Ollama HTTP client for local LLM inference.
///
/// Uses the streaming `/api/generate` endpoint: the body is NDJSON, one
/// fragment per line, concatenated in arrival order.
pub struct OllamaProvider {
    settings: ProviderSettings,
    client: reqwest::blocking::Client,
}

impl OllamaProvider {
    pub fn new(mut settings: ProviderSettings) -> Result<Self, ProviderError> {
        settings.base_url = settings.base_url.trim_end_matches('/').to_string();
        let client = build_client(settings.timeout_secs)?;
        Ok(Self { settings, client })
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
}

/// One NDJSON line of a streaming /api/generate response.
#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Concatenate the fragments of an NDJSON generate stream.
///
/// Stops at the first `done: true` line or at end of input. A line that is not
/// valid JSON fails the whole answer rather than silently losing a fragment.
pub fn collect_stream<R: BufRead>(reader: R) -> Result<String, ProviderError> {
    let mut answer = String::new();

    for line in reader.lines() {
        let line = line.map_err(|e| ProviderError::Http(e.to_string()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let chunk: StreamChunk = serde_json::from_str(line)
            .map_err(|e| ProviderError::MalformedStream(e.to_string()))?;

        if let Some(error) = chunk.error {
            return Err(ProviderError::Backend(error));
        }

        answer.push_str(&chunk.response);
        if chunk.done {
            break;
        }
    }

    Ok(answer)
}

impl LlmProvider for OllamaProvider {
    fn nickname(&self) -> &str {
        &self.settings.nickname
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn query(&self, prompt: &str, system: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.settings.base_url);
        let body = GenerateRequest {
            model: &self.settings.model,
            prompt,
            system,
            stream: true,
            options: GenerateOptions {
                temperature: self.settings.temperature,
                num_ctx: self.settings.num_ctx,
            },
        };

        let response = send(
            self.client.post(&url).json(&body),
            &self.settings.base_url,
            self.settings.timeout_secs,
        )?;

        non_empty(collect_stream(BufReader::new(response))?)
    }
}
