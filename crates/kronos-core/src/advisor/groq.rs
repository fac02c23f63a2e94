//! ============================================================================
//! Groq Completion Client - Chat completions via Groq's OpenAI-compatible API
//! ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CompletionClient;
use crate::config::GROQ_API_URL;
use crate::types::{ChatMessage, Role};

pub struct GroqClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl GroqClient {
    pub fn new(client: reqwest::Client, api_key: String, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            model: model.into(),
            api_url: GROQ_API_URL.to_string(),
        }
    }

    /// Point at another OpenAI-compatible endpoint
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn build_request(&self, system: &str, history: &[ChatMessage]) -> CompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ApiMessage {
            role: "system".to_string(),
            content: system.to_string(),
        });
        messages.extend(history.iter().map(|m| ApiMessage {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            }
            .to_string(),
            content: m.content.clone(),
        }));

        CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.7),
            max_tokens: Some(512),
        }
    }
}

#[async_trait]
impl CompletionClient for GroqClient {
    async fn complete(&self, system: &str, history: &[ChatMessage]) -> Result<String> {
        let request = self.build_request(system, history);
        debug!(
            "Calling Groq {} with {} messages ({} chars of system prompt)",
            self.model,
            request.messages.len(),
            system.len()
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to call Groq API: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Groq API error {}: {}", status, body));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse Groq response: {}", e))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("No response from Groq"))
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ApiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_puts_system_first() {
        let client = GroqClient::new(reqwest::Client::new(), "gsk_test".into(), "llama-3.1-8b-instant");
        let history = vec![
            ChatMessage::user("what's in my wallet?"),
            ChatMessage::assistant("Let me look."),
            ChatMessage::user("thanks"),
        ];

        let request = client.build_request("You are KRONOS.", &history);
        let json = serde_json::to_value(&request).unwrap();

        let roles: Vec<&str> = json["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(json["model"], "llama-3.1-8b-instant");
    }

    #[test]
    fn test_api_url_override() {
        let client = GroqClient::new(reqwest::Client::new(), "gsk_test".into(), "llama-3.1-8b-instant");
        assert_eq!(client.api_url, GROQ_API_URL);

        let client = client.with_api_url("http://127.0.0.1:8080/v1/chat/completions");
        assert_eq!(client.api_url, "http://127.0.0.1:8080/v1/chat/completions");
    }

    #[test]
    fn test_parse_completion_response() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Hi!"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "Hi!");
    }
}
