use serde::{Deserialize, Serialize};

use super::http::{build_client, non_empty, read_json, send};
use super::{LlmProvider, ProviderError, ProviderSettings};

/// OpenAI chat-completions client.
pub struct OpenAiProvider {
    settings: ProviderSettings,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl OpenAiProvider {
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
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_request<'a>(settings: &'a ProviderSettings, prompt: &'a str, system: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model: &settings.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    }
}

/// First choice's message content.
fn extract_answer(response: ChatResponse) -> Result<String, ProviderError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    non_empty(content)
}

impl LlmProvider for OpenAiProvider {
    fn nickname(&self) -> &str {
        &self.settings.nickname
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn query(&self, prompt: &str, system: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.settings.base_url);
        let body = build_request(&self.settings, prompt, system);

        let response = send(
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body),
            &self.settings.base_url,
            self.settings.timeout_secs,
        )?;

        extract_answer(read_json(response)?)
    }
}
