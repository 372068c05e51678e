use std::time::Duration;

use queryseed_ai::{CompletionError, CompletionErrorKind, CompletionRequest, TextCompletion};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::{Value, json};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Blocking client for the Gemini `generateContent` endpoint.
///
/// Calls are made from the generation worker thread, never from the async
/// runtime.
pub struct GeminiCompletion {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiCompletion {
    pub fn new(api_key: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }
}

impl TextCompletion for GeminiCompletion {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
            "generationConfig": { "maxOutputTokens": request.max_tokens },
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let payload: Value = serde_json::from_str(&text).map_err(|err| {
            CompletionError::new(CompletionErrorKind::InvalidResponse, err.to_string())
        })?;
        extract_text(&payload).ok_or_else(|| {
            CompletionError::new(
                CompletionErrorKind::InvalidResponse,
                "response carried no candidate text",
            )
        })
    }
}

fn transport_error(err: reqwest::Error) -> CompletionError {
    let kind = if err.is_timeout() {
        CompletionErrorKind::Timeout
    } else if err.is_decode() {
        CompletionErrorKind::InvalidResponse
    } else {
        CompletionErrorKind::Network
    };
    CompletionError::new(kind, err.to_string())
}

/// Map an HTTP failure onto the gateway's error classes.
///
/// Gemini answers 429 both for per-minute throttling and for a spent daily
/// quota; the latter names a per-day limit in its message.
fn status_error(status: StatusCode, body: &str) -> CompletionError {
    let message = format!("HTTP {status}: {}", first_line(body));
    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS if body.contains("PerDay") => {
            CompletionErrorKind::QuotaExhausted
        }
        StatusCode::TOO_MANY_REQUESTS => CompletionErrorKind::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionErrorKind::Unauthorized,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => CompletionErrorKind::Timeout,
        StatusCode::SERVICE_UNAVAILABLE => CompletionErrorKind::RateLimited,
        _ => CompletionErrorKind::Network,
    };
    CompletionError::new(kind, message)
}

fn first_line(body: &str) -> &str {
    body.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("")
}

fn extract_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_text_is_joined() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Harbor" }, { "text": " Street" }] }
            }]
        });
        assert_eq!(extract_text(&payload).as_deref(), Some("Harbor Street"));
        assert_eq!(extract_text(&json!({ "candidates": [] })), None);
    }

    #[test]
    fn statuses_map_to_gateway_errors() {
        let daily = status_error(
            StatusCode::TOO_MANY_REQUESTS,
            "{\"error\": {\"message\": \"GenerateRequestsPerDayPerProjectPerModel\"}}",
        );
        assert_eq!(daily.kind, CompletionErrorKind::QuotaExhausted);
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow down").kind,
            CompletionErrorKind::RateLimited
        );
        assert_eq!(
            status_error(StatusCode::FORBIDDEN, "").kind,
            CompletionErrorKind::Unauthorized
        );
        assert_eq!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "").kind,
            CompletionErrorKind::Network
        );
    }
}
