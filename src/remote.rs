//! Remote concierge client.
//!
//! Posts `{message, page}` to the concierge endpoint and extracts the
//! `reply` field. Non-OK statuses surface the server's `message` or `error`
//! field when present. Pure parsing in [`parse_reply`] for testability.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 8_000;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("empty_reply")]
    EmptyReply,

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for RemoteError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_REMOTE_REQUEST",
            Self::Timeout => "E_REMOTE_TIMEOUT",
            Self::Status { .. } => "E_REMOTE_STATUS",
            Self::EmptyReply => "E_REMOTE_EMPTY_REPLY",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Timeout | Self::Status { status: 429 | 500..=599, .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() { Self::Timeout } else { Self::Request(e.to_string()) }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AssistantRequest<'a> {
    pub message: &'a str,
    pub page: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantPayload {
    reply: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct RemoteClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RemoteClient {
    /// # Errors
    ///
    /// Returns [`RemoteError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, endpoint: endpoint.to_string() })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask the concierge for a reply.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] on transport failure, timeout, non-OK status
    /// or a blank reply.
    pub async fn ask(&self, message: &str, page: &str) -> Result<String, RemoteError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&AssistantRequest { message, page })
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_reply(status, &body)
    }
}

/// Interpret a concierge response. Unparseable bodies are treated as empty.
///
/// # Errors
///
/// Returns [`RemoteError::Status`] for non-2xx statuses and
/// [`RemoteError::EmptyReply`] when `reply` is missing or blank.
pub fn parse_reply(status: u16, body: &str) -> Result<String, RemoteError> {
    let payload: AssistantPayload = serde_json::from_str(body).unwrap_or_default();

    if !(200..300).contains(&status) {
        let message = payload
            .message
            .or(payload.error)
            .unwrap_or_else(|| format!("Request failed ({status})"));
        return Err(RemoteError::Status { status, message });
    }

    match payload.reply.as_deref().map(str::trim) {
        Some(reply) if !reply.is_empty() => Ok(reply.to_string()),
        _ => Err(RemoteError::EmptyReply),
    }
}

#[cfg(test)]
#[path = "remote_test.rs"]
mod tests;
