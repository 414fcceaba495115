use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{EnrichmentError, FetchError, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENROUTER_TITLE: &str = "Lynx";
const OPENROUTER_REFERER: &str = "https://github.com/brendanv/lynx";

const SUMMARY_PROMPT: &str = "Please summarize the following text:";

/// Chat-completion endpoints, overridable so tests can point at a local server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUrls {
    #[serde(default = "default_openai_url")]
    pub openai: String,
    #[serde(default = "default_anthropic_url")]
    pub anthropic: String,
    #[serde(default = "default_openrouter_url")]
    pub openrouter: String,
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

impl Default for ProviderUrls {
    fn default() -> Self {
        Self {
            openai: default_openai_url(),
            anthropic: default_anthropic_url(),
            openrouter: default_openrouter_url(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    OpenRouter,
}

impl Provider {
    /// Resolve the provider for a stored model identifier and return the
    /// model name to send upstream.
    ///
    /// An explicit `provider:model` prefix wins; otherwise `vendor/model` ids
    /// go to OpenRouter, `claude-*` to Anthropic and `gpt-*`/`o<N>*` to OpenAI.
    pub fn for_model(model: &str) -> Option<(Provider, &str)> {
        let model = model.trim();
        if let Some((prefix, name)) = model.split_once(':') {
            let provider = match prefix {
                "openai" => Some(Provider::OpenAi),
                "anthropic" => Some(Provider::Anthropic),
                "openrouter" => Some(Provider::OpenRouter),
                _ => None,
            };
            if let Some(provider) = provider {
                return (!name.is_empty()).then_some((provider, name));
            }
        }

        if model.contains('/') {
            return Some((Provider::OpenRouter, model));
        }
        if model.starts_with("claude-") {
            return Some((Provider::Anthropic, model));
        }
        let is_openai = model.starts_with("gpt-")
            || model.starts_with("chatgpt-")
            || ["o1", "o3", "o4"].iter().any(|p| model.starts_with(p));
        if is_openai {
            return Some((Provider::OpenAi, model));
        }
        None
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::OpenRouter => "openrouter",
        }
    }

    fn max_summary_tokens(&self) -> u32 {
        match self {
            Provider::OpenAi => 1024,
            Provider::Anthropic => 1000,
            Provider::OpenRouter => 500,
        }
    }

    fn system_prompt(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("You are a helpful assistant that summarizes text."),
            Provider::Anthropic => None,
            Provider::OpenRouter => Some(
                "You are a helpful assistant that summarizes articles. Provide a concise summary that captures the main points and key insights.",
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagSuggestions {
    suggested_tags: Vec<String>,
}

/// HTTP client for the supported chat-completion providers.
pub struct ChatClient {
    client: Client,
    urls: ProviderUrls,
}

impl ChatClient {
    pub fn new(timeout: Duration, urls: ProviderUrls) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::from)?;
        Ok(Self { client, urls })
    }

    pub async fn summarize(
        &self,
        provider: Provider,
        text: &str,
        api_key: &str,
        model: &str,
    ) -> std::result::Result<String, EnrichmentError> {
        if text.trim().is_empty() {
            return Err(EnrichmentError::EmptyInput);
        }

        let user_message = format!("{}\n\n{}", SUMMARY_PROMPT, text);
        match provider {
            Provider::Anthropic => {
                let request = AnthropicRequest {
                    model: model.to_string(),
                    max_tokens: provider.max_summary_tokens(),
                    messages: vec![Message::new("user", user_message)],
                };
                let body = self
                    .send(
                        self.client
                            .post(&self.urls.anthropic)
                            .header("x-api-key", api_key)
                            .header("anthropic-version", ANTHROPIC_VERSION)
                            .json(&request),
                    )
                    .await?;
                let response: AnthropicResponse = serde_json::from_str(&body)
                    .map_err(|e| EnrichmentError::MalformedResponse(e.to_string()))?;
                response
                    .content
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        EnrichmentError::MalformedResponse("content not found or empty".to_string())
                    })?
                    .text
                    .ok_or_else(|| {
                        EnrichmentError::MalformedResponse("summary not found in response".to_string())
                    })
            }
            Provider::OpenAi | Provider::OpenRouter => {
                let mut messages = Vec::with_capacity(2);
                if let Some(system) = provider.system_prompt() {
                    messages.push(Message::new("system", system));
                }
                messages.push(Message::new("user", user_message));
                let request = ChatRequest {
                    model: model.to_string(),
                    messages,
                    max_tokens: Some(provider.max_summary_tokens()),
                    response_format: None,
                };
                self.chat(provider, api_key, &request).await
            }
        }
    }

    /// Ask OpenRouter to pick up to five of `existing_tags` for `text`.
    pub async fn suggest_tags(
        &self,
        text: &str,
        existing_tags: &[String],
        api_key: &str,
        model: &str,
    ) -> std::result::Result<Vec<String>, EnrichmentError> {
        if text.trim().is_empty() {
            return Err(EnrichmentError::EmptyInput);
        }

        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                Message::new("system", tagging_prompt(existing_tags)),
                Message::new("user", text),
            ],
            max_tokens: None,
            response_format: Some(tag_response_format()),
        };

        let content = self.chat(Provider::OpenRouter, api_key, &request).await?;
        let suggestions: TagSuggestions = serde_json::from_str(&content).map_err(|e| {
            EnrichmentError::MalformedResponse(format!("failed to parse tag response: {}", e))
        })?;
        Ok(suggestions.suggested_tags)
    }

    async fn chat(
        &self,
        provider: Provider,
        api_key: &str,
        request: &ChatRequest,
    ) -> std::result::Result<String, EnrichmentError> {
        let url = match provider {
            Provider::OpenRouter => &self.urls.openrouter,
            _ => &self.urls.openai,
        };
        let mut builder = self.client.post(url).bearer_auth(api_key).json(request);
        if provider == Provider::OpenRouter {
            builder = builder
                .header("X-Title", OPENROUTER_TITLE)
                .header("HTTP-Referer", OPENROUTER_REFERER);
        }

        let body = self.send(builder).await?;
        let response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| EnrichmentError::MalformedResponse(e.to_string()))?;
        response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EnrichmentError::MalformedResponse("choices not found or empty".to_string()))?
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| EnrichmentError::MalformedResponse("message content missing".to_string()))
    }

    /// Send and return the body, treating anything but 200 as a failure.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> std::result::Result<String, EnrichmentError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(EnrichmentError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn tagging_prompt(existing_tags: &[String]) -> String {
    let tags = if existing_tags.is_empty() {
        "No existing tags".to_string()
    } else {
        existing_tags.join(", ")
    };
    format!(
        r#"You are a helpful assistant that suggests relevant tags for articles based on their content.
Given the following article content, suggest up to 5 relevant tags from the user's existing tags list. Only suggest tags that already exist in the list - do not create new tags.
It is ok to suggest an empty list if none of the existing tags are relevant.
Existing tags: {}
Respond with a JSON object containing an array of suggested tag names."#,
        tags
    )
}

fn tag_response_format() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "tag_suggestions",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "suggested_tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Array of suggested tag names from the existing tags list"
                    }
                },
                "required": ["suggested_tags"],
                "additionalProperties": false
            }
        }
    })
}
