use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// One role-tagged conversation record. Everything besides `role` is kept
/// as-is, including a missing or null `content` on tool-call turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("content".to_string(), content.into());
        Self {
            role: "system".to_string(),
            fields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub top_k: Option<u32>,
}

/// A chat completion whose reply must match `schema`.
#[derive(Debug, Clone)]
pub struct StructuredRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub messages: &'a [ChatMessage],
    pub sampling: Sampling,
    pub schema_name: &'a str,
    pub schema: serde_json::Value,
}

// OpenAI-compatible chat completions format with structured outputs
#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchema<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct JsonSchema<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    cost: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse<T> {
    pub value: T,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
}

impl LlmClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for LLM API")?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
        })
    }

    pub async fn complete_structured<T: DeserializeOwned>(
        &self,
        request: &StructuredRequest<'_>,
    ) -> Result<LlmResponse<T>> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage::system(request.system));
        messages.extend(request.messages.iter().cloned());

        let body = ChatCompletionRequest {
            model: request.model,
            max_tokens: request.sampling.max_tokens,
            temperature: request.sampling.temperature,
            top_p: request.sampling.top_p,
            top_k: request.sampling.top_k,
            messages,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchema {
                    name: request.schema_name,
                    strict: true,
                    schema: &request.schema,
                },
            },
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to LLM API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error ({}): {}", status, body);
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM API response")?;

        let text = api_response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .context("LLM API response contained no message content")?;

        let value: T = serde_json::from_str(text)
            .context("LLM reply did not match the requested output schema")?;

        let (input_tokens, output_tokens, cost) = api_response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens, u.cost.unwrap_or(0.0)))
            .unwrap_or_default();

        Ok(LlmResponse {
            value,
            input_tokens,
            output_tokens,
            cost,
        })
    }
}
