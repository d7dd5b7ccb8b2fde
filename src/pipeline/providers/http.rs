//! Blocking HTTP plumbing shared by the provider adapters.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};

use super::ProviderError;

/// Error bodies are echoed into logs; keep them short.
const MAX_ERROR_BODY_CHARS: usize = 500;

pub fn build_client(timeout_secs: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Http(e.to_string()))
}

/// Send a request and reject non-success statuses.
pub fn send(
    request: RequestBuilder,
    base_url: &str,
    timeout_secs: u64,
) -> Result<Response, ProviderError> {
    let response = request.send().map_err(|e| {
        if e.is_connect() {
            ProviderError::Connection(base_url.to_string())
        } else if e.is_timeout() {
            ProviderError::Timeout(timeout_secs)
        } else {
            ProviderError::Http(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: truncate(&body),
        });
    }

    Ok(response)
}

/// Deserialize a complete JSON body.
pub fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    response
        .json()
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}

pub fn non_empty(answer: String) -> Result<String, ProviderError> {
    if answer.trim().is_empty() {
        Err(ProviderError::EmptyResponse)
    } else {
        Ok(answer)
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{cut}...")
    }
}
