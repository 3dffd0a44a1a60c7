/// OpenAI-compatible chat completion client
///
/// Posts a single user message to `{api_url}/chat/completions` and returns the
/// first choice's content. Works against any endpoint speaking the same wire
/// format.
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use super::{call_with_retry, GenerationClient, RetryPolicy, TransportError};

const RECIPE_SYSTEM_PROMPT: &str = "You are a professional chef who specializes in creating \
personalized recipes based on user preferences. Your responses should be structured as valid JSON objects.";

const CUISINE_SYSTEM_PROMPT: &str =
    "You are a culinary expert. Respond with a JSON array of cuisine recommendations.";

const DEFAULT_TEMPERATURE: f32 = 0.8;
const DEFAULT_MAX_TOKENS: u32 = 1500;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
}

impl ChatCompletionResponse {
    fn into_text(self) -> Result<String, TransportError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::MalformedEnvelope("response carried no choices".to_string()))?;

        if choice.finish_reason.as_deref() == Some("length") {
            tracing::warn!("Completion was truncated at the token limit");
        }

        match choice.message.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(TransportError::MalformedEnvelope(
                "choice carried no content".to_string(),
            )),
        }
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    model: String,
    system_prompt: &'static str,
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Client for full recipe generation
    pub fn for_recipes(api_key: Option<String>, api_url: String, model: String) -> Self {
        Self::new(api_key, api_url, model, RECIPE_SYSTEM_PROMPT)
    }

    /// Client for short cuisine advice queries
    pub fn for_cuisines(api_key: Option<String>, api_url: String, model: String) -> Self {
        Self::new(api_key, api_url, model, CUISINE_SYSTEM_PROMPT)
    }

    fn new(
        api_key: Option<String>,
        api_url: String,
        model: String,
        system_prompt: &'static str,
    ) -> Self {
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(model = %model, "No API key configured, generation will use fallbacks");
        }

        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            model,
            system_prompt,
            retry: RetryPolicy::default(),
        }
    }

    fn request_body(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self.system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }

    async fn send_once(&self, api_key: &str, prompt: &str, attempt: u32) -> Result<String, TransportError> {
        let url = format!("{}/chat/completions", self.api_url);

        tracing::debug!(model = %self.model, attempt = attempt + 1, "Calling completion API");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status,
                body: body.chars().take(200).collect(),
            });
        }

        let envelope: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedEnvelope(e.to_string()))?;

        envelope.into_text()
    }
}

#[async_trait::async_trait]
impl GenerationClient for OpenAiClient {
    async fn call(&self, prompt: &str, timeout: Duration) -> Result<String, TransportError> {
        let api_key = self.api_key.as_deref().ok_or(TransportError::Unavailable)?;

        let attempts = call_with_retry(&self.retry, |attempt| self.send_once(api_key, prompt, attempt));

        match tokio::time::timeout(timeout, attempts).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(model = %self.model, timeout_secs = timeout.as_secs(), "Completion call timed out");
                Err(TransportError::Timeout(timeout))
            }
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_is_unavailable() {
        let client = OpenAiClient::for_recipes(
            None,
            "https://api.openai.com/v1".to_string(),
            "gpt-4-turbo".to_string(),
        );
        let result = client.call("hello", Duration::from_secs(1)).await;
        assert_eq!(result, Err(TransportError::Unavailable));
    }

    #[tokio::test]
    async fn test_blank_api_key_is_unavailable() {
        let client = OpenAiClient::for_cuisines(
            Some("  ".to_string()),
            "https://api.openai.com/v1".to_string(),
            "gpt-3.5-turbo".to_string(),
        );
        let result = client.call("hello", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(TransportError::Unavailable)));
    }

    #[test]
    fn test_request_body_carries_system_and_user_messages() {
        let client = OpenAiClient::for_recipes(
            Some("sk-test".to_string()),
            "https://api.openai.com/v1/".to_string(),
            "gpt-4-turbo".to_string(),
        );
        let body = serde_json::to_value(client.request_body("make soup")).unwrap();

        assert_eq!(body["model"], "gpt-4-turbo");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "make soup");
        assert_eq!(body["max_tokens"], 1500);
        assert_eq!(client.api_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_envelope_without_choices_is_malformed() {
        let envelope: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            envelope.into_text(),
            Err(TransportError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_envelope_returns_first_choice_content() {
        let json = r#"{"id": "x", "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"title\": \"Soup\"}"}, "finish_reason": "stop"}]}"#;
        let envelope: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.into_text().unwrap(), r#"{"title": "Soup"}"#);
    }
}
