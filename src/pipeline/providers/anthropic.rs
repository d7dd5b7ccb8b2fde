use serde::{Deserialize, Serialize};

use super::http::{build_client, non_empty, read_json, send};
use super::{LlmProvider, ProviderError, ProviderSettings};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages client.
pub struct AnthropicProvider {
    settings: ProviderSettings,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
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
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Concatenate the text blocks of a messages response.
fn extract_answer(response: MessagesResponse) -> Result<String, ProviderError> {
    let text: String = response
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect();
    non_empty(text)
}

impl LlmProvider for AnthropicProvider {
    fn nickname(&self) -> &str {
        &self.settings.nickname
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn query(&self, prompt: &str, system: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/messages", self.settings.base_url);
        let body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system,
            messages: vec![UserMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = send(
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body),
            &self.settings.base_url,
            self.settings.timeout_secs,
        )?;

        extract_answer(read_json(response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> MessagesResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn text_blocks_are_concatenated() {
        let body = r#"{"id":"msg_1","content":[
            {"type":"text","text":"- CSF Leak: No\n"},
            {"type":"text","text":"- Infection: Yes"}]}"#;
        assert_eq!(
            extract_answer(parse(body)).unwrap(),
            "- CSF Leak: No\n- Infection: Yes"
        );
    }

    #[test]
    fn non_text_blocks_ignored() {
        let body = r#"{"content":[{"type":"thinking","thinking":"hmm"},
                      {"type":"text","text":"- Vertigo: No"}]}"#;
        assert_eq!(extract_answer(parse(body)).unwrap(), "- Vertigo: No");
    }

    #[test]
    fn missing_content_is_empty_response() {
        assert!(matches!(
            extract_answer(parse("{}")),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn request_has_system_and_token_cap() {
        let body = MessagesRequest {
            model: "claude-3-5-sonnet-20241022",
            max_tokens: 1000,
            temperature: 0.0,
            system: "sys",
            messages: vec![UserMessage {
                role: "user",
                content: "p",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"], "sys");
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
