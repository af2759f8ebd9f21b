//! LLM-backed profile lookup through an OpenAI-compatible chat endpoint.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stargazer_shared::{Result, StargazerError};

use crate::pattern::find_in_text;

/// Fallback prompt used when no prompt file is configured or readable.
const DEFAULT_PROMPT: &str =
    "Find the LinkedIn profile URL for {{name}} who works at {{company}}.";

const SYSTEM_PROMPT: &str =
    "You are an expert researcher who finds LinkedIn Profile URLs.";

/// Sentinel phrase the prompt instructs the model to answer with when it
/// cannot find a profile.
const NOT_FOUND_PHRASE: &str = "No LinkedIn profile found";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Finder
// ---------------------------------------------------------------------------

/// Asks a chat model for a profile URL and validates the answer against the
/// URL patterns before believing it.
pub struct LlmFinder {
    http: reqwest::Client,
    config: LlmConfig,
    prompt_template: String,
}

impl LlmFinder {
    pub fn new(config: LlmConfig, prompt_template: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            prompt_template,
        }
    }

    /// Build a finder loading the prompt template from `path`, falling back
    /// to the built-in prompt when the file is missing or unreadable.
    pub fn with_prompt_file(config: LlmConfig, path: &Path) -> Self {
        let template = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "prompt file unavailable; using built-in prompt");
                DEFAULT_PROMPT.to_string()
            }
        };
        Self::new(config, template)
    }

    fn render_prompt(&self, name: &str, company: &str) -> String {
        self.prompt_template
            .replace("{{name}}", name)
            .replace("{{company}}", company)
    }

    /// Ask the model for a profile URL for `name` at `company`.
    ///
    /// Returns `Ok(None)` when the reply contains no recognizable profile
    /// URL, which covers the not-found phrase the prompt asks for. API and
    /// transport failures are errors.
    pub async fn find_profile(&self, name: &str, company: &str) -> Result<Option<String>> {
        let prompt = self.render_prompt(name, company);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.2,
            max_tokens: 200,
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| StargazerError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StargazerError::Llm(format!(
                "chat endpoint returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| StargazerError::Llm(format!("malformed response: {e}")))?;

        let Some(content) = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        else {
            return Err(StargazerError::Llm("response had no message content".into()));
        };

        // Never trust free text: only accept replies that contain a URL
        // matching the profile patterns. A URL wins even when the reply
        // also carries the not-found phrase.
        if let Some(url) = find_in_text(&content) {
            return Ok(Some(url));
        }
        if content.contains(NOT_FOUND_PHRASE) {
            debug!(name, "model reported no profile");
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn finder(server: &MockServer) -> LlmFinder {
        LlmFinder::new(
            LlmConfig {
                endpoint: format!("{}/v1/chat/completions", server.uri()),
                api_key: "test-key".into(),
                model: "gpt-test".into(),
            },
            DEFAULT_PROMPT.to_string(),
        )
    }

    fn chat_reply(content: &str) -> serde_json::Value {
        json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    #[test]
    fn prompt_substitution() {
        let finder = LlmFinder::new(
            LlmConfig {
                endpoint: String::new(),
                api_key: String::new(),
                model: String::new(),
            },
            DEFAULT_PROMPT.to_string(),
        );
        assert_eq!(
            finder.render_prompt("Jane Doe", "Acme"),
            "Find the LinkedIn profile URL for Jane Doe who works at Acme."
        );
    }

    #[tokio::test]
    async fn url_in_reply_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({ "model": "gpt-test" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
                "The profile is https://linkedin.com/in/jane-doe, found via their blog.",
            )))
            .mount(&server)
            .await;

        let found = finder(&server).find_profile("Jane Doe", "Acme").await.unwrap();
        assert_eq!(found.as_deref(), Some("https://linkedin.com/in/jane-doe"));
    }

    #[tokio::test]
    async fn not_found_phrase_maps_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_reply("No LinkedIn profile found for this person.")),
            )
            .mount(&server)
            .await;

        let found = finder(&server).find_profile("Jane Doe", "Acme").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn url_wins_over_not_found_phrase() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
                "No LinkedIn profile found under that exact name, but \
                 https://linkedin.com/in/jane-doe is a likely match.",
            )))
            .mount(&server)
            .await;

        let found = finder(&server).find_profile("Jane Doe", "Acme").await.unwrap();
        assert_eq!(found.as_deref(), Some("https://linkedin.com/in/jane-doe"));
    }

    #[tokio::test]
    async fn free_text_without_url_maps_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
                "I believe this person works at Acme but I cannot confirm a profile.",
            )))
            .mount(&server)
            .await;

        let found = finder(&server).find_profile("Jane Doe", "Acme").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn api_error_is_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = finder(&server).find_profile("Jane Doe", "Acme").await.unwrap_err();
        assert!(matches!(err, StargazerError::Llm(_)));
    }
}
