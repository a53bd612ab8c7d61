//! HTTP client for the explainer backend.
//!
//! Each backend capability is a single request/response round trip: no
//! retries, no batching, and no ordering guarantee between
//! independently issued calls. Callers treat every call as fallible.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chat::ChatGateway;

/// Failure of one gateway operation, as surfaced to the user. Carries a
/// single human-readable message; classification beyond that is not
/// part of the gateway contract.
#[derive(Debug, Error)]
pub enum RemoteCallError {
    /// The round trip itself failed: connect, timeout, or decode.
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },
    /// The spawned request task ended without producing a result.
    #[error("request was interrupted: {0}")]
    Interrupted(String),
}

#[derive(Serialize)]
struct GreetRequest {
    name: String,
}

#[derive(Deserialize)]
struct GreetResponse {
    greeting: String,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Serialize)]
struct PromptRequest {
    prompt: String,
}

#[derive(Serialize)]
struct ExplainRequest {
    contract_code: String,
    question: String,
}

#[derive(Serialize)]
struct ChatRequest {
    message: String,
}

#[derive(Deserialize)]
struct TextResponse {
    response: String,
}

#[derive(Deserialize)]
struct HistoryLengthResponse {
    length: u64,
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl BackendClient {
    /// `timeout` bounds every request so a hung backend call cannot
    /// leave the UI waiting forever; a timeout surfaces as an ordinary
    /// [`RemoteCallError`].
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// greet(name) -> greeting text. Empty names fall back to "World",
    /// mirroring the backend's demo behavior.
    pub async fn greet(&self, name: &str) -> Result<String, RemoteCallError> {
        let name = if name.trim().is_empty() { "World" } else { name };
        let response: GreetResponse = self
            .post_json(
                "/api/v1/greet",
                &GreetRequest {
                    name: name.to_string(),
                },
            )
            .await?;
        Ok(response.greeting)
    }

    /// Current value of the server-held counter. Pure read.
    pub async fn get_count(&self) -> Result<u64, RemoteCallError> {
        let response: CountResponse = self.get_json("/api/v1/count").await?;
        Ok(response.count)
    }

    /// Increment the server-held counter, returning the new value.
    pub async fn increment(&self) -> Result<u64, RemoteCallError> {
        let response: CountResponse = self.post_empty("/api/v1/count/increment").await?;
        Ok(response.count)
    }

    /// One-shot LLM prompt with no conversation context.
    pub async fn prompt(&self, prompt: &str) -> Result<String, RemoteCallError> {
        let response: TextResponse = self
            .post_json(
                "/api/v1/prompt",
                &PromptRequest {
                    prompt: prompt.to_string(),
                },
            )
            .await?;
        Ok(response.response)
    }

    pub async fn explain_smart_contract(
        &self,
        contract_code: &str,
        question: &str,
    ) -> Result<String, RemoteCallError> {
        let response: TextResponse = self
            .post_json(
                "/api/v1/explain",
                &ExplainRequest {
                    contract_code: contract_code.to_string(),
                    question: question.to_string(),
                },
            )
            .await?;
        Ok(response.response)
    }

    /// Chat message with server-side context retention.
    pub async fn send_chat_message(&self, message: &str) -> Result<String, RemoteCallError> {
        let response: TextResponse = self
            .post_json(
                "/api/v1/chat",
                &ChatRequest {
                    message: message.to_string(),
                },
            )
            .await?;
        Ok(response.response)
    }

    /// Drop the server-side conversation history. Returns the backend's
    /// confirmation text.
    pub async fn clear_chat_history(&self) -> Result<String, RemoteCallError> {
        let response: TextResponse = self.post_empty("/api/v1/chat/clear").await?;
        Ok(response.response)
    }

    /// Number of entries in the server-side history. Pure read.
    pub async fn get_chat_history_length(&self) -> Result<u64, RemoteCallError> {
        let response: HistoryLengthResponse = self.get_json("/api/v1/chat/length").await?;
        Ok(response.length)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteCallError> {
        tracing::debug!(path, "backend GET");
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).timeout(self.timeout).send().await?;
        Self::decode(path, response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RemoteCallError> {
        tracing::debug!(path, "backend POST");
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;
        Self::decode(path, response).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteCallError> {
        tracing::debug!(path, "backend POST");
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).timeout(self.timeout).send().await?;
        Self::decode(path, response).await
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, RemoteCallError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(path, status = status.as_u16(), "backend call failed");
            return Err(RemoteCallError::Backend {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatGateway for BackendClient {
    async fn send_chat_message(&self, message: &str) -> Result<String, RemoteCallError> {
        BackendClient::send_chat_message(self, message).await
    }

    async fn explain_smart_contract(
        &self,
        contract_code: &str,
        question: &str,
    ) -> Result<String, RemoteCallError> {
        BackendClient::explain_smart_contract(self, contract_code, question).await
    }

    async fn clear_chat_history(&self) -> Result<String, RemoteCallError> {
        BackendClient::clear_chat_history(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = BackendClient::new("http://127.0.0.1:4943/", Duration::from_secs(5));
        assert_eq!(client.base_url, "http://127.0.0.1:4943");
    }

    #[test]
    fn backend_errors_read_as_one_line() {
        let err = RemoteCallError::Backend {
            status: 503,
            message: "canister unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "backend returned 503: canister unavailable");
    }
}
